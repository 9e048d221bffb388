use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Encoder timeout is not 0
/// - At least one encode attempt is allowed
/// - Default target size is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.encoder.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "encoder.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.compression.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "compression.max_attempts cannot be 0".to_string(),
        ));
    }

    if config.compression.target_size_kb == 0 {
        return Err(ConfigError::ValidationError(
            "compression.target_size_kb cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_validate_default_config() {
        assert_ok!(validate_config(&Config::default()));
    }

    #[test]
    fn test_validate_timeout_zero_fails() {
        let mut config = Config::default();
        config.encoder.timeout_secs = 0;
        let err = assert_err!(validate_config(&config));
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_validate_max_attempts_zero_fails() {
        let mut config = Config::default();
        config.compression.max_attempts = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_target_size_zero_fails() {
        let mut config = Config::default();
        config.compression.target_size_kb = 0;
        assert_err!(validate_config(&config));
    }
}
