//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置 → 协调器装配
//! - 降级运行（单侧设备失败）
//! - 生命周期幂等与有界停止
//! - 模拟 e2e 测试（无需硬件）
//! - 多读者竞争下的无撕裂读取

#[cfg(test)]
mod support {
    use std::thread;
    use std::time::{Duration, Instant};

    use contracts::EdgeConfig;

    /// Small frames and fast cadences so tests finish quickly
    pub fn fast_config() -> EdgeConfig {
        let mut config = EdgeConfig::default();
        config.camera.width = 16;
        config.camera.height = 8;
        config.camera.fps = 100.0;
        config.range_finder.read_interval_ms = 5;
        config.fusion.tick_rate_hz = 100.0;
        config.lifecycle.stop_timeout_ms = 2000;
        config
    }

    pub fn wait_until<F: Fn() -> bool>(timeout: Duration, cond: F) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }
}

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::ComponentState;
    use coordinator::Coordinator;

    #[test]
    fn test_loaded_config_drives_coordinator() {
        let toml = r#"
[camera]
enabled = false

[range_finder]
read_interval_ms = 5
min_distance = 0.2
max_distance = 8.0

[fusion]
tick_rate_hz = 50
"#;
        let config = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
        let coordinator = Coordinator::with_mock_devices(config);
        coordinator.initialize().unwrap();

        let status = coordinator.status();
        assert!(!status.components["camera"].available);
        assert_eq!(status.components["camera"].detail.as_deref(), Some("disabled"));
        assert_eq!(
            status.components["range_finder"].state,
            ComponentState::Ready
        );
        assert_eq!(
            coordinator.range_finder().unwrap().config().max_distance,
            8.0
        );
    }

    #[test]
    fn test_config_round_trip_through_json() {
        let config = crate::support::fast_config();
        let json = ConfigLoader::to_json(&config).unwrap();
        let loaded = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(loaded.camera.fps, config.camera.fps);
        assert_eq!(loaded.fusion.tick_rate_hz, config.fusion.tick_rate_hz);
    }
}

#[cfg(test)]
mod degradation_tests {
    use std::thread;
    use std::time::Duration;

    use contracts::ComponentState;
    use coordinator::{Coordinator, DeviceSet};
    use ingestion::{MockCamera, MockRangeFinder};

    use crate::support::{fast_config, wait_until};

    /// Camera fails, range keeps publishing, fusion never emits
    #[test]
    fn test_camera_failure_degrades_gracefully() {
        let devices = DeviceSet::new()
            .with_camera(MockCamera::failing("cam"))
            .with_range(MockRangeFinder::new("lrf"));
        let coordinator = Coordinator::new(fast_config(), devices);

        coordinator.initialize().unwrap();
        assert!(!coordinator.camera_available());
        assert!(coordinator.range_available());

        coordinator.start().unwrap();
        assert!(coordinator.wait_for_data(Duration::from_secs(5)));

        let first = coordinator.latest_reading().unwrap();
        assert!(wait_until(Duration::from_secs(5), || {
            coordinator
                .latest_reading()
                .is_some_and(|r| r.timestamp > first.timestamp)
        }));

        thread::sleep(Duration::from_millis(100));
        let stats = coordinator.fusion_stats();
        assert_eq!(stats.records, 0);
        assert!(stats.skipped_missing > 0);
        assert!(coordinator.latest_fused().is_none());

        let status = coordinator.status();
        assert!(status.running);
        assert_eq!(status.components["camera"].state, ComponentState::Failed);
        assert_eq!(
            status.components["range_finder"].state,
            ComponentState::Running
        );

        coordinator.shutdown();
    }

    #[test]
    fn test_range_failure_keeps_camera_running() {
        let devices = DeviceSet::new()
            .with_camera(MockCamera::new("cam"))
            .with_range(MockRangeFinder::failing("lrf"));
        let coordinator = Coordinator::new(fast_config(), devices);

        coordinator.initialize().unwrap();
        coordinator.start().unwrap();

        let first = coordinator
            .camera()
            .unwrap()
            .buffer()
            .sequence();
        assert!(wait_until(Duration::from_secs(5), || {
            coordinator.camera().unwrap().buffer().sequence() > first + 3
        }));
        assert!(coordinator.latest_frame().is_some());
        assert!(coordinator.latest_reading().is_none());
        assert_eq!(coordinator.fusion_stats().records, 0);

        coordinator.shutdown();
    }

    #[test]
    fn test_parse_errors_do_not_stop_reader() {
        let range = MockRangeFinder::new("lrf").with_script(["garbage", "D:1.500", "", "1500mm"]);
        let devices = DeviceSet::new()
            .with_camera(MockCamera::new("cam"))
            .with_range(range);
        let coordinator = Coordinator::new(fast_config(), devices);
        coordinator.initialize().unwrap();
        coordinator.start().unwrap();

        let range = coordinator.range_finder().unwrap();
        assert!(wait_until(Duration::from_secs(5), || {
            let snapshot = range.metrics().snapshot();
            snapshot.parse_errors >= 2 && snapshot.samples >= 4
        }));
        assert_eq!(range.state(), ComponentState::Running);
        assert!(range
            .distance_history(10)
            .iter()
            .all(|d| (d - 1.5).abs() < 1e-9));

        coordinator.shutdown();
    }

    #[test]
    fn test_outliers_substituted_and_out_of_range_dropped() {
        let range = MockRangeFinder::new("lrf").with_script([
            "D:1.000", "D:1.000", "D:1.000", "D:1.000", "D:9.000", "D:50.000",
        ]);
        let devices = DeviceSet::new()
            .with_camera(MockCamera::new("cam"))
            .with_range(range);
        let coordinator = Coordinator::new(fast_config(), devices);
        coordinator.initialize().unwrap();
        coordinator.start().unwrap();

        let range = coordinator.range_finder().unwrap();
        assert!(wait_until(Duration::from_secs(5), || {
            let snapshot = range.metrics().snapshot();
            snapshot.outliers_substituted >= 1 && snapshot.rejected >= 1
        }));

        let history = range.distance_history(100);
        assert!(!history.is_empty());
        assert!(history.iter().all(|d| (d - 1.0).abs() < 1e-9));
        assert!((coordinator.latest_reading().unwrap().distance - 1.0).abs() < 1e-9);

        coordinator.shutdown();
    }
}

#[cfg(test)]
mod lifecycle_tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use contracts::CoordinatorState;
    use coordinator::{Coordinator, DeviceSet};
    use ingestion::{MockCamera, MockFaults, MockRangeFinder, StopOutcome};

    use crate::support::{fast_config, wait_until};

    #[test]
    fn test_stop_twice_does_not_hang() {
        let coordinator = Coordinator::with_mock_devices(fast_config());
        coordinator.initialize().unwrap();
        coordinator.start().unwrap();

        let started = Instant::now();
        let first = coordinator.stop();
        let second = coordinator.stop();

        assert_eq!(first.len(), 3);
        assert!(second.is_empty());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(coordinator.state(), CoordinatorState::Stopped);
    }

    #[test]
    fn test_concurrent_shutdown() {
        let coordinator = Arc::new(Coordinator::with_mock_devices(fast_config()));
        coordinator.initialize().unwrap();
        coordinator.start().unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                thread::spawn(move || coordinator.shutdown())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(!coordinator.is_running());
        assert!(coordinator.start().is_err());
    }

    /// A device stuck in a read is detached after the stop timeout and
    /// released once its read returns.
    #[test]
    fn test_stuck_device_bounded_stop() {
        let mut config = fast_config();
        config.lifecycle.stop_timeout_ms = 200;

        let range = MockRangeFinder::new("lrf").with_faults(MockFaults {
            read_delay: Duration::from_millis(1500),
            ..Default::default()
        });
        let probe = range.probe();
        let devices = DeviceSet::new()
            .with_camera(MockCamera::new("cam"))
            .with_range(range);
        let coordinator = Coordinator::new(config, devices);

        coordinator.initialize().unwrap();
        coordinator.start().unwrap();
        // Let the reader enter its slow query
        assert!(wait_until(Duration::from_secs(5), || probe.reads() >= 2));

        let started = Instant::now();
        let report = coordinator.stop();
        assert!(started.elapsed() < Duration::from_millis(1400));
        assert!(report.contains(&("range_finder", StopOutcome::TimedOut)));
        assert!(report.contains(&("camera", StopOutcome::Joined)));

        coordinator.shutdown();
        assert!(wait_until(Duration::from_secs(5), || probe.releases() == 1));
        assert!(!probe.is_open());
    }

    #[test]
    fn test_restart_keeps_fusion_ids_increasing() {
        let coordinator = Coordinator::with_mock_devices(fast_config());
        coordinator.initialize().unwrap();

        coordinator.start().unwrap();
        assert!(wait_until(Duration::from_secs(5), || coordinator
            .latest_fused()
            .is_some()));
        coordinator.stop();
        let before = coordinator.latest_fused().unwrap().fusion_id;

        coordinator.start().unwrap();
        assert!(wait_until(Duration::from_secs(5), || coordinator
            .latest_fused()
            .is_some_and(|r| r.fusion_id > before)));
        coordinator.shutdown();
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use contracts::{DistanceCategory, DropPolicy, SafetyLevel};
    use coordinator::{Coordinator, DeviceSet};
    use ingestion::{MockCamera, MockRangeFinder};
    use observability::FusionMetricsAggregator;

    use crate::support::{fast_config, wait_until};

    /// End-to-end test: mock devices -> sources -> fusion -> subscriber + callback
    #[tokio::test]
    async fn test_e2e_mock_pipeline() {
        let devices = DeviceSet::new()
            .with_camera(MockCamera::new("cam"))
            .with_range(MockRangeFinder::new("lrf").with_base_distance(2.5));
        let coordinator = Coordinator::new(fast_config(), devices);

        let aggregator = Arc::new(Mutex::new(FusionMetricsAggregator::new()));
        let sink = Arc::clone(&aggregator);
        coordinator.register_callback(move |record| {
            observability::record_fused_record(record);
            sink.lock().unwrap().update(record);
        });
        let rx = coordinator.subscribe(64, DropPolicy::DropOldest);

        coordinator.initialize().unwrap();
        coordinator.start().unwrap();

        let target = 10;
        let mut last_id = None;
        for _ in 0..target {
            let record = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("record within timeout")
                .unwrap();

            assert!(record.synchronized);
            assert!(record.time_diff_ms <= 100.0);
            assert!((0.0..=1.0).contains(&record.quality_score));
            assert_eq!(record.distance_category, DistanceCategory::Medium);
            assert_eq!(record.safety_level, SafetyLevel::Safe);
            assert_eq!(record.frame_meta.width, 16);
            assert_eq!(record.frame_meta.byte_len, 16 * 8 * 3);
            if let Some(last) = last_id {
                assert!(record.fusion_id > last);
            }
            last_id = Some(record.fusion_id);
        }

        coordinator.stop();
        let summary = aggregator.lock().unwrap().summary();
        assert!(summary.total_records >= target);
        assert_eq!(summary.safety_counts.get("safe"), Some(&summary.total_records));
        assert!(coordinator.fusion_history(5).len() <= 5);
        coordinator.shutdown();
    }

    #[test]
    fn test_panicking_callback_is_isolated() {
        let coordinator = Coordinator::with_mock_devices(fast_config());
        let delivered = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&delivered);

        coordinator.register_callback(|_| panic!("consumer bug"));
        coordinator.register_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        coordinator.initialize().unwrap();
        coordinator.start().unwrap();

        assert!(wait_until(Duration::from_secs(5), || {
            delivered.load(Ordering::SeqCst) >= 5
        }));
        let stats = coordinator.fusion_stats();
        assert!(stats.callback_panics >= 5);
        assert!(coordinator.fusion().state().is_running());
        coordinator.shutdown();
    }

    #[test]
    fn test_unread_subscriber_never_blocks_fusion() {
        let coordinator = Coordinator::with_mock_devices(fast_config());
        let _rx = coordinator.subscribe(1, DropPolicy::DropNewest);

        coordinator.initialize().unwrap();
        coordinator.start().unwrap();

        assert!(wait_until(Duration::from_secs(5), || {
            coordinator.fusion_stats().records >= 5
        }));
        assert!(coordinator.fusion_stats().subscriber_drops >= 3);
        coordinator.shutdown();
    }

    #[test]
    fn test_tight_tolerance_skips_unsynchronized_ticks() {
        let mut config = fast_config();
        config.range_finder.read_interval_ms = 200;
        config.fusion.sync_tolerance_ms = 10.0;
        let coordinator = Coordinator::with_mock_devices(config);
        coordinator.initialize().unwrap();
        coordinator.start().unwrap();

        assert!(wait_until(Duration::from_secs(5), || {
            coordinator.fusion_stats().unsynchronized >= 5
        }));
        coordinator.stop();

        assert!(coordinator
            .fusion_history(100)
            .iter()
            .all(|r| r.time_diff_ms <= 10.0));
        coordinator.shutdown();
    }
}

#[cfg(test)]
mod race_tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use coordinator::Coordinator;
    use rand::Rng;

    use crate::support::fast_config;

    /// Readers racing the capture thread only ever see complete frames
    #[test]
    fn test_concurrent_readers_see_whole_frames() {
        let coordinator = Arc::new(Coordinator::with_mock_devices(fast_config()));
        coordinator.initialize().unwrap();
        coordinator.start().unwrap();
        assert!(coordinator.wait_for_data(Duration::from_secs(5)));

        let done = Arc::new(AtomicBool::new(false));
        let readers: Vec<_> = (0..6)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut rng = rand::rng();
                    let mut last_seq = 0;
                    let mut seen = 0u64;
                    while !done.load(Ordering::SeqCst) {
                        if let Some(frame) = coordinator.latest_frame() {
                            assert_eq!(frame.pixel_data.len(), 16 * 8 * 3);
                            let fill = frame.pixel_data[0];
                            assert!(frame.pixel_data.iter().all(|b| *b == fill));
                            assert!(frame.sequence_number >= last_seq);
                            last_seq = frame.sequence_number;
                            seen += 1;
                        }
                        if let Some(reading) = coordinator.latest_reading() {
                            assert!(reading.distance.is_finite());
                        }
                        thread::sleep(Duration::from_micros(rng.random_range(0..500)));
                    }
                    seen
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(300));
        done.store(true, Ordering::SeqCst);
        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }
        coordinator.shutdown();
    }
}
