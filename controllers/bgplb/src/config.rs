//! Controller configuration from environment variables.

use crate::error::ControllerError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Retry policy for failed Service reconciliations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub min_seconds: u64,
    pub max_seconds: u64,
    /// Re-deliveries after the first attempt
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_seconds: 1,
            max_seconds: 60,
            max_retries: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace Services are watched in, `None` for all namespaces
    pub namespace: Option<String>,
    /// Name of the singleton `BGPConfiguration`
    pub config_name: String,
    /// Page size for the startup Service listing
    pub list_page_size: u32,
    pub retry: RetryPolicy,
    /// Interval at which pool status is recomputed
    pub pool_resync: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            config_name: "default".to_string(),
            list_page_size: 50,
            retry: RetryPolicy::default(),
            pool_resync: Duration::from_secs(60),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value
    /// or `None` when unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = Self {
            namespace: get("WATCH_NAMESPACE"),
            config_name: get("BGPLB_CONFIG_NAME").unwrap_or(defaults.config_name),
            list_page_size: parse(&get, "BGPLB_LIST_PAGE_SIZE", defaults.list_page_size)?,
            retry: RetryPolicy {
                min_seconds: parse(&get, "BGPLB_RETRY_MIN_SECONDS", defaults.retry.min_seconds)?,
                max_seconds: parse(&get, "BGPLB_RETRY_MAX_SECONDS", defaults.retry.max_seconds)?,
                max_retries: parse(&get, "BGPLB_MAX_RETRIES", defaults.retry.max_retries)?,
            },
            pool_resync: Duration::from_secs(parse(
                &get,
                "BGPLB_POOL_RESYNC_SECONDS",
                defaults.pool_resync.as_secs(),
            )?),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ControllerError> {
        if self.list_page_size == 0 {
            return Err(ControllerError::InvalidConfig(
                "BGPLB_LIST_PAGE_SIZE must be greater than 0".to_string(),
            ));
        }
        if self.retry.min_seconds == 0 {
            return Err(ControllerError::InvalidConfig(
                "BGPLB_RETRY_MIN_SECONDS must be greater than 0".to_string(),
            ));
        }
        if self.retry.max_seconds < self.retry.min_seconds {
            return Err(ControllerError::InvalidConfig(format!(
                "BGPLB_RETRY_MAX_SECONDS ({}) must not be less than BGPLB_RETRY_MIN_SECONDS ({})",
                self.retry.max_seconds, self.retry.min_seconds
            )));
        }
        if self.pool_resync.is_zero() {
            return Err(ControllerError::InvalidConfig(
                "BGPLB_POOL_RESYNC_SECONDS must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse<T, G>(get: &G, name: &str, default: T) -> Result<T, ControllerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(value) => value.parse().map_err(|e| {
            ControllerError::InvalidConfig(format!("{name}={value:?} is invalid: {e}"))
        }),
        None => Ok(default),
    }
}
