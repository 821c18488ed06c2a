use crate::error::AppError;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

/// Timing knobs for presence tracking and count broadcasts
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// A polling viewer counts only while its latest heartbeat is younger than this
    pub heartbeat_ttl: Duration,
    /// Cadence of the periodic viewer-count broadcast
    pub broadcast_interval: Duration,
    /// Cadence of the expired-heartbeat sweep (memory bound only)
    pub heartbeat_sweep_interval: Duration,
    /// Per-topic buffer of the in-process broadcast hub
    pub topic_channel_capacity: usize,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            heartbeat_ttl: Duration::from_secs(30),
            broadcast_interval: Duration::from_millis(5000),
            heartbeat_sweep_interval: Duration::from_secs(1800),
            topic_channel_capacity: 64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// `None` runs the service on in-memory stores
    pub database: Option<DatabaseConfig>,
    pub presence: PresenceConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parse_var("PORT", 8090)?;

        let database = match env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => Some(DatabaseConfig {
                url,
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
                run_migrations: parse_flag("RUN_MIGRATIONS"),
            }),
            _ => None,
        };

        let defaults = PresenceConfig::default();
        let presence = PresenceConfig {
            heartbeat_ttl: Duration::from_secs(parse_var(
                "VIEWER_HEARTBEAT_TTL_SECS",
                defaults.heartbeat_ttl.as_secs(),
            )?),
            broadcast_interval: Duration::from_millis(parse_var(
                "VIEWER_COUNT_BROADCAST_INTERVAL_MS",
                defaults.broadcast_interval.as_millis() as u64,
            )?),
            heartbeat_sweep_interval: Duration::from_secs(parse_var(
                "HEARTBEAT_SWEEP_INTERVAL_SECS",
                defaults.heartbeat_sweep_interval.as_secs(),
            )?),
            topic_channel_capacity: parse_var(
                "TOPIC_CHANNEL_CAPACITY",
                defaults.topic_channel_capacity,
            )?,
        };

        if presence.heartbeat_ttl.is_zero() {
            return Err(AppError::Config(
                "VIEWER_HEARTBEAT_TTL_SECS must be greater than 0".into(),
            ));
        }
        if presence.broadcast_interval.is_zero() || presence.heartbeat_sweep_interval.is_zero() {
            return Err(AppError::Config("broadcast and sweep intervals must be greater than 0".into()));
        }
        if presence.topic_channel_capacity == 0 {
            return Err(AppError::Config("TOPIC_CHANNEL_CAPACITY must be greater than 0".into()));
        }

        Ok(Self {
            host,
            port,
            database,
            presence,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{name} has an invalid value: {raw}"))),
        _ => Ok(default),
    }
}

fn parse_flag(name: &str) -> bool {
    env::var(name)
        .ok()
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}
