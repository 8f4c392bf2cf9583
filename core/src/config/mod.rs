pub mod settings;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: String,
    /// File name of the log inside `data_dir`
    pub log_file: String,
    /// Bytes of log between two offset index entries
    pub index_interval_bytes: u64,
    /// Largest accepted produce payload; unlimited when unset
    pub max_request_bytes: Option<u32>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9092,
            data_dir: "./data".to_string(),
            log_file: "orders.log".to_string(),
            index_interval_bytes: 4096,
            max_request_bytes: None,
        }
    }
}

impl BrokerConfig {
    pub fn log_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.log_file)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate configuration bounds
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.log_file.trim().is_empty() {
            return Err("log_file must not be empty".to_string());
        }
        if self.index_interval_bytes == 0 {
            return Err("index_interval_bytes must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.port, 9092);
        assert_eq!(config.log_path(), PathBuf::from("./data").join("orders.log"));
        assert_eq!(config.bind_address(), "0.0.0.0:9092");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = BrokerConfig {
            log_file: " ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BrokerConfig {
            index_interval_bytes: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
