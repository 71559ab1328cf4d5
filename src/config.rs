/*
 * Responsibility
 * - Read environment variables once at startup (MONGODB_URI, ALLOWED_ORIGINS, PORT, ...)
 * - Presence checks only: a missing required value aborts startup
 */
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_DATABASE_NAME: &str = "immigrant_job_finder";

/// Origins allowed when `ALLOWED_ORIGINS` is not set (local dev + production frontends).
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 5] = [
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "https://bridgeai.club",
    "https://www.bridgeai.club",
    "https://bridge-ai-gamma.vercel.app",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<&str>) -> Self {
        match raw.unwrap_or("development").to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Timing of the realtime connection heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Time between two liveness sweeps.
    pub interval: Duration,
    /// A connection silent for longer than this is pruned.
    pub timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Router-wide HTTP limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    pub request_timeout: Duration,
    pub body_limit_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            body_limit_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub mongodb_uri: String,
    pub database_name: String,

    pub allowed_origins: Vec<String>,

    pub heartbeat: HeartbeatConfig,
    pub http: HttpConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values are treated the same as unset ones.
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid("PORT"))?,
            None => DEFAULT_PORT,
        };
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));

        let app_env = AppEnv::parse(get("APP_ENV").as_deref());

        let mongodb_uri = get("MONGODB_URI").ok_or(ConfigError::Missing("MONGODB_URI"))?;

        let database_name =
            get("MONGODB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string());

        let allowed_origins = match get("ALLOWED_ORIGINS") {
            Some(raw) => parse_origins(&raw),
            None => Vec::new(),
        };
        let allowed_origins = if allowed_origins.is_empty() {
            DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect()
        } else {
            allowed_origins
        };

        let defaults = HeartbeatConfig::default();
        let heartbeat = HeartbeatConfig {
            interval: seconds(&get, "HEARTBEAT_INTERVAL_SECONDS")?.unwrap_or(defaults.interval),
            timeout: seconds(&get, "HEARTBEAT_TIMEOUT_SECONDS")?.unwrap_or(defaults.timeout),
        };

        let http = HttpConfig {
            request_timeout: seconds(&get, "REQUEST_TIMEOUT_SECONDS")?
                .unwrap_or(HttpConfig::default().request_timeout),
            body_limit_bytes: match get("MAX_BODY_BYTES") {
                Some(raw) => match raw.trim().parse::<usize>() {
                    Ok(n) if n > 0 => n,
                    _ => return Err(ConfigError::Invalid("MAX_BODY_BYTES")),
                },
                None => HttpConfig::default().body_limit_bytes,
            },
        };

        Ok(Self {
            addr,
            app_env,
            mongodb_uri,
            database_name,
            allowed_origins,
            heartbeat,
            http,
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn seconds<G>(get: &G, key: &'static str) -> Result<Option<Duration>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(0) | Err(_) => Err(ConfigError::Invalid(key)),
            Ok(secs) => Ok(Some(Duration::from_secs(secs))),
        },
    }
}
