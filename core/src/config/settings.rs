use super::BrokerConfig;
use crate::{Result, SolomqError};
use config::{Config, Environment};

impl BrokerConfig {
    /// Load settings from `SOLOMQ_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_environment(Environment::with_prefix("SOLOMQ"))
    }

    pub fn from_environment(environment: Environment) -> Result<Self> {
        let settings = Config::builder()
            .add_source(environment.try_parsing(true))
            .build()
            .map_err(|e| SolomqError::Config(e.to_string()))?;

        let config = settings
            .try_deserialize::<BrokerConfig>()
            .map_err(|e| SolomqError::Config(e.to_string()))?;

        config.validate().map_err(SolomqError::Config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn environment(vars: &[(&str, &str)]) -> Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix("SOLOMQ").source(Some(source))
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = BrokerConfig::from_environment(environment(&[])).unwrap();
        assert_eq!(config.port, 9092);
        assert_eq!(config.log_file, "orders.log");
        assert_eq!(config.max_request_bytes, None);
    }

    #[test]
    fn test_environment_overrides() {
        let config = BrokerConfig::from_environment(environment(&[
            ("SOLOMQ_PORT", "19092"),
            ("SOLOMQ_DATA_DIR", "/var/lib/solomq"),
            ("SOLOMQ_MAX_REQUEST_BYTES", "1048576"),
        ]))
        .unwrap();

        assert_eq!(config.port, 19092);
        assert_eq!(config.data_dir, "/var/lib/solomq");
        assert_eq!(config.max_request_bytes, Some(1_048_576));
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn test_invalid_value_is_config_error() {
        let result = BrokerConfig::from_environment(environment(&[("SOLOMQ_PORT", "not-a-port")]));
        assert!(matches!(result, Err(SolomqError::Config(_))));
    }
}
