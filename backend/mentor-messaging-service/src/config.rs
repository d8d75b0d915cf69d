use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

/// Which persistent store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// In-process store; nothing survives a restart.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mem" | "in-memory" => Ok(StoreBackend::Memory),
            other => Err(AppError::Config(format!("unknown STORE_BACKEND '{other}'"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub port: u16,
    /// Header carrying the caller's user id, set by the identity gateway.
    pub identity_header: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub heartbeat_interval_secs: u64,
    pub client_timeout_secs: u64,
    pub connection_buffer: usize,
}

impl RealtimeConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 5,
            client_timeout_secs: 30,
            connection_buffer: 64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub preview_chars: usize,
    pub default_list_limit: i64,
}

impl NotificationConfig {
    pub const MAX_LIST_LIMIT: i64 = 200;

    /// Clamp a caller-supplied page size into `1..=MAX_LIST_LIMIT`.
    pub fn effective_limit(&self, requested: Option<i64>) -> i64 {
        requested
            .unwrap_or(self.default_list_limit)
            .clamp(1, Self::MAX_LIST_LIMIT)
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            preview_chars: 100,
            default_list_limit: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub store: StoreBackend,
    pub database: DatabaseConfig,
    pub realtime: RealtimeConfig,
    pub notifications: NotificationConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let store: StoreBackend = env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()?;

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        if store == StoreBackend::Postgres && database_url.is_none() {
            return Err(AppError::Config(
                "DATABASE_URL missing (required when STORE_BACKEND=postgres)".into(),
            ));
        }

        Ok(Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                host: env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("APP_PORT", 8085)?,
                identity_header: env::var("IDENTITY_HEADER")
                    .unwrap_or_else(|_| "x-user-id".to_string())
                    .to_ascii_lowercase(),
            },
            store,
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_var("DB_MAX_CONNECTIONS", 20)?,
                min_connections: parse_var("DB_MIN_CONNECTIONS", 2)?,
                acquire_timeout_secs: parse_var("DB_ACQUIRE_TIMEOUT_SECS", 10)?,
                run_migrations: parse_bool("DB_RUN_MIGRATIONS", true),
            },
            realtime: RealtimeConfig {
                heartbeat_interval_secs: parse_var("WS_HEARTBEAT_INTERVAL_SECS", 5)?,
                client_timeout_secs: parse_var("WS_CLIENT_TIMEOUT_SECS", 30)?,
                connection_buffer: parse_var::<usize>("WS_CONNECTION_BUFFER", 64)?.max(1),
            },
            notifications: NotificationConfig {
                preview_chars: parse_var("NOTIFICATION_PREVIEW_CHARS", 100)?,
                default_list_limit: parse_var("NOTIFICATION_LIST_LIMIT", 50)?,
            },
        })
    }

    /// Configuration for tests and local runs without any environment.
    pub fn in_memory() -> Self {
        Config {
            app: AppConfig {
                env: "test".to_string(),
                host: "127.0.0.1".to_string(),
                port: 0,
                identity_header: "x-user-id".to_string(),
            },
            store: StoreBackend::Memory,
            database: DatabaseConfig {
                url: None,
                max_connections: 1,
                min_connections: 0,
                acquire_timeout_secs: 1,
                run_migrations: false,
            },
            realtime: RealtimeConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.app.host, self.app.port)
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has invalid value '{raw}'"))),
        Err(_) => Ok(default),
    }
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(default)
}
