use crate::config::types::{Config, DownloadConfig, HttpConfig};
use crate::{ConfigError, ConfigResult};

/// Largest accepted worker count
pub const MAX_JOBS: usize = 64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_download_config(&config.download)?;
    validate_http_config(&config.http)?;
    Ok(())
}

/// Validates a worker count, whether from the file or the command line
pub fn validate_jobs(jobs: usize) -> ConfigResult<()> {
    if !(1..=MAX_JOBS).contains(&jobs) {
        return Err(ConfigError::Validation(format!(
            "jobs must be between 1 and {}, got {}",
            MAX_JOBS, jobs
        )));
    }
    Ok(())
}

/// Validates download configuration
fn validate_download_config(config: &DownloadConfig) -> ConfigResult<()> {
    validate_jobs(config.jobs)?;

    if config.attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "attempts must be >= 1, got {}",
            config.attempts
        )));
    }

    Ok(())
}

/// Validates HTTP configuration
fn validate_http_config(config: &HttpConfig) -> ConfigResult<()> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout must be >= 1 second, got {}",
            config.timeout
        )));
    }

    if config.connect_timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "connect-timeout must be >= 1 second, got {}",
            config.connect_timeout
        )));
    }

    Ok(())
}
