use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::get_ready::approvals::{ApprovalConfig, DealerScope, SortBy};

/// Distinguishes runtime behavior for different stages of the dealership service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub approvals: ApprovalConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            approvals: load_approval_config()?,
        })
    }
}

/// The dealer scope is explicit configuration; nothing is read from client-side storage.
fn load_approval_config() -> Result<ApprovalConfig, ConfigError> {
    let defaults = ApprovalConfig::default();

    let scope = match env::var("APP_DEALER_ID") {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<i64>()
            .map(DealerScope::dealer)
            .map_err(|_| ConfigError::InvalidDealerId(raw))?,
        _ => defaults.scope,
    };

    let reviewer = env::var("APP_REVIEWER")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(defaults.reviewer);

    let default_sort = match env::var("APP_APPROVAL_SORT") {
        Ok(raw) => raw
            .parse::<SortBy>()
            .map_err(|_| ConfigError::InvalidSort(raw))?,
        Err(_) => defaults.default_sort,
    };

    Ok(ApprovalConfig {
        scope,
        reviewer,
        default_sort,
    })
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidDealerId(String),
    InvalidSort(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidDealerId(value) => {
                write!(f, "APP_DEALER_ID must be an integer, got '{value}'")
            }
            ConfigError::InvalidSort(value) => write!(
                f,
                "APP_APPROVAL_SORT must be one of oldest, newest, priority, cost; got '{value}'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidDealerId(_)
            | ConfigError::InvalidSort(_) => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
