//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。缺省字段使用默认值。

use contracts::{ContractError, EdgeConfig};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<EdgeConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<EdgeConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<EdgeConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml_partial() {
        let content = r#"
[camera]
device_id = 2
fps = 15.0

[range_finder]
port = "/dev/ttyACM0"
baudrate = 9600
"#;
        let config = parse_toml(content).unwrap();
        assert_eq!(config.camera.device_id, 2);
        assert_eq!(config.camera.fps, 15.0);
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.range_finder.port, "/dev/ttyACM0");
        assert_eq!(config.range_finder.baudrate, 9600);
        assert_eq!(config.fusion.moving_average_window, 5);
    }

    #[test]
    fn test_parse_empty_toml_is_default() {
        let config = parse_toml("").unwrap();
        assert!(config.camera.enabled);
        assert!(config.range_finder.enabled);
        assert_eq!(config.fusion.sync_tolerance_ms, 100.0);
    }

    #[test]
    fn test_parse_json() {
        let content = r#"{"fusion": {"sync_tolerance_ms": 50.0, "tick_rate_hz": 20.0}}"#;
        let config = parse_json(content).unwrap();
        assert_eq!(config.fusion.sync_tolerance_ms, 50.0);
        assert_eq!(config.fusion.tick_rate_hz, 20.0);
    }

    #[test]
    fn test_parse_wrong_type() {
        let result = parse_toml("[camera]\nfps = \"fast\"\n");
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
