use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::discovery::naming_provider::DEFAULT_GROUP;
use crate::error::ConfigError;

pub const DEFAULT_BIND: &str = "0.0.0.0:8050";

/// Paths the router uses on every backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendPaths {
    pub call: String,
    pub stream: String,
    pub message: String,
    pub health: String,
}

impl Default for BackendPaths {
    fn default() -> Self {
        Self {
            call: "/mcp".to_string(),
            stream: "/sse".to_string(),
            message: "/mcp/message".to_string(),
            health: "/health".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(5000),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouterConfig {
    pub bind: SocketAddr,
    pub provider_timeout: Duration,
    pub call_timeout: Duration,
    pub stream_open_timeout: Duration,
    pub stream_session_timeout: Duration,
    pub health_timeout: Duration,
    pub retry: RetrySettings,
    pub paths: BackendPaths,
    /// Naming registry base URL; `None` disables the naming provider
    pub naming_server_addr: Option<String>,
    pub naming_group: String,
    pub naming_services: Vec<String>,
    /// Catalog API base URL; `None` disables the catalog provider
    pub catalog_api_url: Option<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8050)),
            provider_timeout: Duration::from_millis(5000),
            call_timeout: Duration::from_millis(30_000),
            stream_open_timeout: Duration::from_millis(5000),
            stream_session_timeout: Duration::from_millis(30_000),
            health_timeout: Duration::from_millis(3000),
            retry: RetrySettings::default(),
            paths: BackendPaths::default(),
            naming_server_addr: None,
            naming_group: DEFAULT_GROUP.to_string(),
            naming_services: Vec::new(),
            catalog_api_url: None,
        }
    }
}

impl RouterConfig {
    /// Reads the router configuration from the process environment.
    ///
    /// Unset variables fall back to defaults; set-but-invalid ones are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            bind: parse_var("ROUTER_BIND", defaults.bind)?,
            provider_timeout: millis_var("ROUTER_PROVIDER_TIMEOUT_MS", defaults.provider_timeout)?,
            call_timeout: millis_var("ROUTER_CALL_TIMEOUT_MS", defaults.call_timeout)?,
            stream_open_timeout: millis_var(
                "ROUTER_STREAM_OPEN_TIMEOUT_MS",
                defaults.stream_open_timeout,
            )?,
            stream_session_timeout: millis_var(
                "ROUTER_STREAM_SESSION_TIMEOUT_MS",
                defaults.stream_session_timeout,
            )?,
            health_timeout: millis_var("ROUTER_HEALTH_TIMEOUT_MS", defaults.health_timeout)?,
            retry: RetrySettings {
                max_attempts: parse_var("ROUTER_RETRY_MAX_ATTEMPTS", defaults.retry.max_attempts)?
                    .max(1),
                base_delay: millis_var("ROUTER_RETRY_BASE_DELAY_MS", defaults.retry.base_delay)?,
                max_delay: millis_var("ROUTER_RETRY_MAX_DELAY_MS", defaults.retry.max_delay)?,
            },
            paths: BackendPaths {
                call: path_var("ROUTER_CALL_PATH", &defaults.paths.call),
                stream: path_var("ROUTER_STREAM_PATH", &defaults.paths.stream),
                message: path_var("ROUTER_MESSAGE_PATH", &defaults.paths.message),
                health: path_var("ROUTER_HEALTH_PATH", &defaults.paths.health),
            },
            naming_server_addr: optional_var("NAMING_SERVER_ADDR"),
            naming_group: optional_var("NAMING_GROUP").unwrap_or(defaults.naming_group),
            naming_services: optional_var("NAMING_SERVICES")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            catalog_api_url: optional_var("CATALOG_API_URL"),
        })
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_var(key) {
        None => Ok(default),
        Some(value) => value.parse::<T>().map_err(|e| ConfigError::Invalid {
            key: key.to_string(),
            value: value.clone(),
            reason: e.to_string(),
        }),
    }
}

fn millis_var(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    let millis = parse_var::<u64>(key, default.as_millis() as u64)?;
    if millis == 0 {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            value: "0".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_millis(millis))
}

fn path_var(key: &str, default: &str) -> String {
    let path = optional_var(key).unwrap_or_else(|| default.to_string());
    if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    }
}
