use serde::Deserialize;
use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    /// `None` when mail credentials are absent: notifications are only logged.
    pub mail: Option<MailConfig>,
    pub circuit_breaker: CircuitBreakerConfig,
    pub notify: NotifyConfig,
    pub engine: EngineConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    /// Upper bound on waiting for an event row lock.
    pub lock_timeout_ms: u64,
}

// Настройки почтового шлюза
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub api_key: String,
    pub from_email: String,
    pub gateway_url: String,
}

// Настройки Circuit Breaker
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

// Очередь уведомлений
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    pub queue_capacity: usize,
    /// Parallel sends to the mail sink.
    pub concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// How long before the start the reminder goes out.
    pub reminder_lead_hours: i64,
    /// Events starting within this window are reported as `soon`.
    pub soon_window_hours: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { reminder_lead_hours: 24, soon_window_hours: 24 }
    }
}

fn var_or(name: &'static str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_or<T: FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = var_or(name, default);
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mail = match (env::var("SENDGRID_API_KEY"), env::var("FROM_EMAIL")) {
            (Ok(api_key), Ok(from_email)) if !api_key.is_empty() => Some(MailConfig {
                api_key,
                from_email,
                gateway_url: var_or("MAIL_GATEWAY_URL", "https://api.sendgrid.com/v3"),
            }),
            _ => None,
        };

        Ok(Config {
            app: AppConfig {
                host: var_or("HOST", "0.0.0.0"),
                port: parse_or("PORT", "8000")?,
                environment: var_or("ENVIRONMENT", "development"),
                rust_log: var_or("RUST_LOG", "eventhub=debug,tower_http=debug"),
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                pool_size: parse_or("DB_POOL_SIZE", "20")?,
                lock_timeout_ms: parse_or("DB_LOCK_TIMEOUT_MS", "5000")?,
            },
            mail,
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: parse_or("CIRCUIT_BREAKER_FAILURE_THRESHOLD", "5")?,
                timeout_seconds: parse_or("CIRCUIT_BREAKER_TIMEOUT_SECONDS", "60")?,
            },
            notify: NotifyConfig {
                queue_capacity: parse_or("NOTIFY_QUEUE_CAPACITY", "1024")?,
                concurrency: parse_or("NOTIFY_CONCURRENCY", "8")?,
            },
            engine: EngineConfig {
                reminder_lead_hours: parse_or("REMINDER_LEAD_HOURS", "24")?,
                soon_window_hours: parse_or("SOON_WINDOW_HOURS", "24")?,
            },
        })
    }
}
