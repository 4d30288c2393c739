use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::workflows::telephonic::reminders::MAX_REMINDER_HOURS;

/// Distinguishes runtime behavior for different stages of the service.
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
    pub storage: StorageConfig,
    pub ai: AiConfig,
    pub pipeline: PipelineConfig,
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

        let recordings_dir = PathBuf::from(
            env::var("RECORDINGS_DIR").unwrap_or_else(|_| "./data/recordings".to_string()),
        );
        let public_base_url = env::var("RECORDINGS_PUBLIC_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:3000/recordings".to_string());

        let pipeline = PipelineConfig {
            max_retries: parse_var("EVALUATION_MAX_RETRIES", 3)?,
            retry_base_delay: Duration::from_millis(parse_var("EVALUATION_RETRY_BASE_MS", 2_000)?),
            reminder_interval: Duration::from_secs(parse_var("REMINDER_INTERVAL_SECS", 900)?),
            reminder_hours_before: parse_var("REMINDER_HOURS_BEFORE", 24)?,
        };
        if !(0..=MAX_REMINDER_HOURS).contains(&pipeline.reminder_hours_before) {
            return Err(ConfigError::OutOfRange {
                name: "REMINDER_HOURS_BEFORE",
                max: MAX_REMINDER_HOURS,
            });
        }

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage: StorageConfig {
                recordings_dir,
                public_base_url,
            },
            ai: AiConfig {
                transcription_url: optional_var("TRANSCRIPTION_URL"),
                scoring_url: optional_var("SCORING_URL"),
            },
            pipeline,
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { name }),
        Err(_) => Ok(default),
    }
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

/// Where call recordings are written and how they are addressed.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub recordings_dir: PathBuf,
    pub public_base_url: String,
}

/// Endpoints for the transcription and scoring services. Unset means disabled.
#[derive(Debug, Clone, Default)]
pub struct AiConfig {
    pub transcription_url: Option<String>,
    pub scoring_url: Option<String>,
}

/// Background worker and reminder sweep tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub reminder_interval: Duration,
    pub reminder_hours_before: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay: Duration::from_secs(2),
            reminder_interval: Duration::from_secs(900),
            reminder_hours_before: 24,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { name: &'static str },
    OutOfRange { name: &'static str, max: i64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { name } => {
                write!(f, "{name} must be a non-negative integer")
            }
            ConfigError::OutOfRange { name, max } => {
                write!(f, "{name} must be between 0 and {max}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::OutOfRange { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
