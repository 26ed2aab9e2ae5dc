//! Configuration validation logic.

use crate::Config;
use crate::loader::ConfigError;

/// Which binary the config is validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

/// Smallest HTTP head the client will accept as a limit.
const MIN_HEADER_BYTES: usize = 256;

pub fn validate_config(config: &Config, role: Role) -> Result<(), ConfigError> {
    validate_host_port("server", &config.server)?;
    if config.password.is_empty() {
        return Err(ConfigError::Validation("password is empty".into()));
    }
    if role == Role::Client {
        match config.local.as_deref() {
            Some(local) => validate_host_port("local", local)?,
            None => {
                return Err(ConfigError::Validation(
                    "local is required for the client".into(),
                ));
            }
        }
    }

    let tunnel = &config.tunnel;
    if tunnel.relay_idle_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "tunnel.relay_idle_timeout_secs must be > 0".into(),
        ));
    }
    if tunnel.pool_keep_alive_secs == 0 {
        return Err(ConfigError::Validation(
            "tunnel.pool_keep_alive_secs must be > 0".into(),
        ));
    }
    if tunnel.relay_chunk_size == 0 {
        return Err(ConfigError::Validation(
            "tunnel.relay_chunk_size must be > 0".into(),
        ));
    }
    if tunnel.max_destination_len == 0 {
        return Err(ConfigError::Validation(
            "tunnel.max_destination_len must be > 0".into(),
        ));
    }
    if tunnel.max_header_bytes < MIN_HEADER_BYTES {
        return Err(ConfigError::Validation(format!(
            "tunnel.max_header_bytes too small (min {MIN_HEADER_BYTES})"
        )));
    }
    if tunnel.connection_backlog == 0 {
        return Err(ConfigError::Validation(
            "tunnel.connection_backlog must be > 0".into(),
        ));
    }

    if let Some(format) = config.logging.format.as_deref()
        && !matches!(format, "pretty" | "compact" | "json")
    {
        return Err(ConfigError::Validation(
            "logging.format must be one of: pretty, compact, json".into(),
        ));
    }
    if let Some(output) = config.logging.output.as_deref()
        && !matches!(output, "stdout" | "stderr")
    {
        return Err(ConfigError::Validation(
            "logging.output must be 'stdout' or 'stderr'".into(),
        ));
    }
    Ok(())
}

/// Require `host:port` with a non-empty host and a numeric port.
fn validate_host_port(field: &str, value: &str) -> Result<(), ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} is empty")));
    }
    let Some((host, port)) = value.rsplit_once(':') else {
        return Err(ConfigError::Validation(format!(
            "{field} must be host:port, got {value:?}"
        )));
    };
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(ConfigError::Validation(format!(
            "{field} must be host:port, got {value:?}"
        )));
    }
    Ok(())
}
