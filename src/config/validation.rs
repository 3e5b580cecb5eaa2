use crate::config::types::{Config, InstanceEntry, OutputConfig, ScannerConfig, UserAgentConfig};
use crate::identity::resolve;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scanner_config(&config.scanner)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_instances(&config.instances)?;
    Ok(())
}

/// Validates scan loop configuration
fn validate_scanner_config(config: &ScannerConfig) -> Result<(), ConfigError> {
    if config.cycle_interval_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "cycle_interval_secs must be >= 1, got {}",
            config.cycle_interval_secs
        )));
    }

    if config.batch_size < 1 || config.batch_size > 10_000 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be between 1 and 10000, got {}",
            config.batch_size
        )));
    }

    // Mastodon caps follower/following pages at 80 entries
    if config.page_limit < 1 || config.page_limit > 80 {
        return Err(ConfigError::Validation(format!(
            "page_limit must be between 1 and 80, got {}",
            config.page_limit
        )));
    }

    if config.max_pages < 1 || config.max_pages > 100 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be between 1 and 100, got {}",
            config.max_pages
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates target instance entries
fn validate_instances(instances: &[InstanceEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for entry in instances {
        validate_domain(&entry.domain)?;

        if !seen.insert(entry.domain.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "Instance '{}' is configured more than once",
                entry.domain
            )));
        }

        if entry.client_id.is_empty() || entry.client_secret.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Instance '{}' needs both client-id and client-secret",
                entry.domain
            )));
        }

        if entry.username.is_empty() || entry.password.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Instance '{}' needs both username and password",
                entry.domain
            )));
        }

        for seed in &entry.seeds {
            resolve(seed, &entry.domain).map_err(|e| {
                ConfigError::Validation(format!("Invalid seed for '{}': {}", entry.domain, e))
            })?;
        }
    }

    Ok(())
}

/// Validates an instance domain, allowing an explicit port (e.g., "localhost:3000")
fn validate_domain(domain: &str) -> Result<(), ConfigError> {
    let host = match domain.rsplit_once(':') {
        Some((host, port)) => {
            if port.parse::<u16>().is_err() {
                return Err(ConfigError::InvalidDomain(format!(
                    "Domain '{}' has an invalid port",
                    domain
                )));
            }
            host
        }
        None => domain,
    };

    if host.is_empty() {
        return Err(ConfigError::InvalidDomain(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !host
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidDomain(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if host.starts_with('.') || host.ends_with('.') || host.starts_with('-') || host.ends_with('-')
    {
        return Err(ConfigError::InvalidDomain(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if host.contains("..") {
        return Err(ConfigError::InvalidDomain(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
