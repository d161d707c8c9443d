use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0 and the request timeout is positive
/// - Rate limit is positive when enabled
/// - Upload limit is positive and the CSV delimiter is a single ASCII character
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.server.request_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "server.request_timeout_secs must be greater than 0".to_string(),
        ));
    }

    if config.rate_limit.enabled && config.rate_limit.requests_per_minute == 0 {
        return Err(ConfigError::ValidationError(
            "rate_limit.requests_per_minute must be greater than 0 when enabled".to_string(),
        ));
    }

    if config.batch.max_upload_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "batch.max_upload_bytes must be greater than 0".to_string(),
        ));
    }

    let delimiter = &config.batch.csv_delimiter;
    if delimiter.len() != 1 || !delimiter.is_ascii() {
        return Err(ConfigError::ValidationError(format!(
            "batch.csv_delimiter must be a single ASCII character, got {:?}",
            delimiter
        )));
    }

    Ok(())
}
