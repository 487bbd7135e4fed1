//! Meeting Reconciler configuration.
//!
//! Configuration is loaded from environment variables once at startup and
//! handed to each component as an immutable value. Missing or malformed
//! settings are fatal at startup only. Secrets are held in `SecretString`
//! and never appear in Debug output.

use common::duration::parse_duration;
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default reconciliation interval.
pub const DEFAULT_INTERVAL: &str = "5s";

/// Default upper bound on concurrently running transitions.
pub const DEFAULT_MAX_CONCURRENT_TRANSITIONS: usize = 32;

/// Default cap on meetings fetched per cycle.
pub const DEFAULT_MAX_DUE_BATCH: u32 = 500;

/// Default time allowed for in-flight transitions to drain on shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: &str = "30s";

/// Default push gateway retry count.
pub const DEFAULT_PUSH_RETRIES: u32 = 3;

/// Default push gateway endpoint (legacy multicast HTTP protocol).
pub const DEFAULT_PUSH_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";

/// Default per-request push gateway timeout.
pub const DEFAULT_PUSH_TIMEOUT: &str = "10s";

/// Default database holding the `meetings` and `users` collections.
pub const DEFAULT_MONGO_DATABASE: &str = "om";

/// Default store connect and per-operation timeout.
pub const DEFAULT_MONGO_TIMEOUT: &str = "10s";

/// Default command listener host.
pub const DEFAULT_LISTENER_HOST: &str = "0.0.0.0";

/// Meeting Reconciler configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pause between the end of one dispatch and the next due-set query.
    pub interval: Duration,

    /// Maximum number of transitions doing I/O at the same time.
    pub max_concurrent_transitions: usize,

    /// Maximum number of due meetings fetched per cycle.
    pub max_due_batch: u32,

    /// Time allowed for in-flight transitions to finish on shutdown.
    pub shutdown_timeout: Duration,

    /// Push gateway API key.
    pub push_api_key: SecretString,

    /// Extra attempts the push client makes for retryable failures.
    pub push_retries: u32,

    /// Push gateway send endpoint.
    pub push_endpoint: String,

    /// Per-request push gateway timeout.
    pub push_timeout: Duration,

    /// Store host, `host` or `host:port`.
    pub mongo_host: String,

    /// Store username.
    pub mongo_username: String,

    /// Store password.
    pub mongo_password: SecretString,

    /// Database holding the `meetings` and `users` collections.
    pub mongo_database: String,

    /// Database the credentials are defined in.
    pub mongo_auth_source: String,

    /// Store connect and per-operation timeout.
    pub mongo_timeout: Duration,

    /// Command listener host.
    pub listener_host: String,

    /// Command listener port.
    pub listener_port: u16,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid duration configuration: {0}")]
    InvalidDuration(String),

    #[error("Invalid numeric configuration: {0}")]
    InvalidNumber(String),

    #[error("Invalid listener port configuration: {0}")]
    InvalidListenerPort(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let interval = duration_var(vars, "RECONCILER_INTERVAL", DEFAULT_INTERVAL)?;
        if interval.is_zero() {
            return Err(ConfigError::InvalidDuration(
                "RECONCILER_INTERVAL must be greater than 0".to_string(),
            ));
        }

        let max_concurrent_transitions = positive_var(
            vars,
            "RECONCILER_MAX_CONCURRENT_TRANSITIONS",
            DEFAULT_MAX_CONCURRENT_TRANSITIONS,
        )?;

        let max_due_batch = positive_var(vars, "RECONCILER_MAX_DUE_BATCH", DEFAULT_MAX_DUE_BATCH)?;

        let shutdown_timeout = duration_var(
            vars,
            "RECONCILER_SHUTDOWN_TIMEOUT",
            DEFAULT_SHUTDOWN_TIMEOUT,
        )?;

        let push_api_key = SecretString::from(required_var(vars, "PUSH_API_KEY")?);

        let push_retries = if let Some(value_str) = vars.get("PUSH_RETRIES") {
            value_str.parse::<u32>().map_err(|e| {
                ConfigError::InvalidNumber(format!(
                    "PUSH_RETRIES must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?
        } else {
            DEFAULT_PUSH_RETRIES
        };

        let push_endpoint = vars
            .get("PUSH_ENDPOINT")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PUSH_ENDPOINT.to_string());

        let push_timeout = duration_var(vars, "PUSH_TIMEOUT", DEFAULT_PUSH_TIMEOUT)?;

        let mongo_host = required_var(vars, "MONGO_HOST")?;
        let mongo_username = required_var(vars, "MONGO_USERNAME")?;
        let mongo_password = SecretString::from(required_var(vars, "MONGO_PASSWORD")?);

        let mongo_database = vars
            .get("MONGO_DATABASE")
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_MONGO_DATABASE.to_string());

        // Credentials live in the data database unless told otherwise
        let mongo_auth_source = vars
            .get("MONGO_AUTH_SOURCE")
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| mongo_database.clone());

        let mongo_timeout = duration_var(vars, "MONGO_TIMEOUT", DEFAULT_MONGO_TIMEOUT)?;

        let listener_host = vars
            .get("LISTENER_HOST")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LISTENER_HOST.to_string());

        let listener_port_str = required_var(vars, "LISTENER_PORT")?;
        let listener_port = listener_port_str.parse::<u16>().map_err(|e| {
            ConfigError::InvalidListenerPort(format!(
                "LISTENER_PORT must be a valid port number, got '{}': {}",
                listener_port_str, e
            ))
        })?;

        Ok(Config {
            interval,
            max_concurrent_transitions,
            max_due_batch,
            shutdown_timeout,
            push_api_key,
            push_retries,
            push_endpoint,
            push_timeout,
            mongo_host,
            mongo_username,
            mongo_password,
            mongo_database,
            mongo_auth_source,
            mongo_timeout,
            listener_host,
            listener_port,
        })
    }

    /// Address the command listener binds to.
    #[must_use]
    pub fn listener_address(&self) -> String {
        format!("{}:{}", self.listener_host, self.listener_port)
    }
}

/// Required settings must be present and non-empty.
fn required_var(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn duration_var(
    vars: &HashMap<String, String>,
    name: &str,
    default: &str,
) -> Result<Duration, ConfigError> {
    let value_str = vars.get(name).map(String::as_str).unwrap_or(default);
    parse_duration(value_str).map_err(|e| {
        ConfigError::InvalidDuration(format!(
            "{} must be a duration like \"5s\" or \"1m30s\", got '{}': {}",
            name, value_str, e
        ))
    })
}

fn positive_var<T>(vars: &HashMap<String, String>, name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: T = value_str.parse().map_err(|e| {
        ConfigError::InvalidNumber(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == T::default() {
        return Err(ConfigError::InvalidNumber(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(value)
}
