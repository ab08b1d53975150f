//! Configuration validation.

use super::error::{ConfigError, ConfigResult};
use super::schema::{CourierConfig, DispatcherConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &CourierConfig) -> ConfigResult<()> {
    validate_dispatcher_config(&config.dispatcher)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_dispatcher_config(config: &DispatcherConfig) -> ConfigResult<()> {
    if config.workers == 0 && !config.no_updates {
        return Err(ConfigError::validation(
            "dispatcher.workers must be greater than 0 unless no_updates is set",
        ));
    }
    Ok(())
}

fn validate_logging_config(config: &LoggingConfig) -> ConfigResult<()> {
    if config.output == LogOutput::File && config.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is 'file'",
        ));
    }

    if let Some(module) = config.filters.keys().find(|m| m.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "logging.filters contains an empty module name: {module:?}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogLevel;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_workers() {
        let mut config = CourierConfig::default();
        config.dispatcher.workers = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Validation { .. })
        ));

        config.dispatcher.no_updates = true;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_file_output_requires_path() {
        let mut config = CourierConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some("logs/courier.log".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_filter_module() {
        let mut config = CourierConfig::default();
        config.logging.filters.insert(" ".into(), LogLevel::Debug);
        assert!(validate_config(&config).is_err());
    }
}
