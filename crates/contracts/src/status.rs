//! Lifecycle states and status snapshots.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source / engine lifecycle state
///
/// `Uninitialized -> Initializing -> Running -> Stopping -> Stopped`,
/// with `Initializing -> Failed` on device open error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    #[default]
    Uninitialized,
    Initializing,
    /// Initialized and ready to start
    Ready,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl ComponentState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Coordinator lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    #[default]
    Created,
    Initialized,
    Running,
    Stopped,
}

/// Status of one component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentStatus {
    /// Component name
    pub name: String,

    /// Lifecycle state
    pub state: ComponentState,

    /// Whether the component initialized successfully
    pub available: bool,

    /// Samples published (sources) or records emitted (fusion)
    pub samples: u64,

    /// Errors absorbed by the loop
    pub errors: u64,

    /// Realized rate (Hz), if tracked
    pub rate_hz: Option<f64>,

    /// Free-form detail (e.g. the initialization error)
    pub detail: Option<String>,
}

impl ComponentStatus {
    /// Status for a component that was never constructed
    pub fn absent(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ComponentState::Uninitialized,
            available: false,
            samples: 0,
            errors: 0,
            rate_hz: None,
            detail: Some(detail.into()),
        }
    }
}

/// Coordinator status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorStatus {
    /// Whether the coordinator is running
    pub running: bool,

    /// Coordinator lifecycle state
    pub state: CoordinatorState,

    /// Per-component status (component name -> status)
    pub components: BTreeMap<String, ComponentStatus>,
}
