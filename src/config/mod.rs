use serde::Deserialize;
use std::env;
use std::str::FromStr;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub upstream: UpstreamConfig,
    pub session: SessionConfig,
    pub routes: RoutesConfig,
    pub book_status: BookStatusCodes,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

// Настройки внешнего REST API
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Всегда заканчивается ровно одним `/`.
    pub base_url: String,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

// Настройки сессий
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub backend: SessionBackendKind,
    pub redis_url: Option<String>,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackendKind {
    Memory,
    Redis,
}

// Куда перенаправлять неавторизованных и "домой"
#[derive(Debug, Clone, Deserialize)]
pub struct RoutesConfig {
    pub login_path: String,
    pub home_path: String,
}

/// Числовые коды статусов бронирования, которые API ожидает в `item[status]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BookStatusCodes {
    pub waiting: i64,
    pub returning: i64,
    pub returned: i64,
    pub cancel_waiting: i64,
}

impl Default for BookStatusCodes {
    fn default() -> Self {
        Self {
            waiting: 1,
            returning: 3,
            returned: 4,
            cancel_waiting: 5,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = BookStatusCodes::default();

        let backend = match var_or("SESSION_BACKEND", "memory").to_lowercase().as_str() {
            "memory" => SessionBackendKind::Memory,
            "redis" => SessionBackendKind::Redis,
            other => {
                return Err(ConfigError::Invalid {
                    name: "SESSION_BACKEND",
                    value: other.to_string(),
                })
            }
        };
        let redis_url = env::var("REDIS_URL").ok();
        if backend == SessionBackendKind::Redis && redis_url.is_none() {
            return Err(ConfigError::Missing("REDIS_URL"));
        }

        let log_format = match var_or("LOG_FORMAT", "pretty").to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            other => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };

        Ok(Config {
            app: AppConfig {
                host: var_or("HOST", "0.0.0.0"),
                port: parse_or("PORT", 3000)?,
                environment: var_or("ENVIRONMENT", "development"),
                rust_log: var_or("RUST_LOG", "book_portal=debug,tower_http=debug"),
                log_format,
            },
            upstream: UpstreamConfig {
                base_url: normalize_base_url(
                    &env::var("API_BASE_URL").map_err(|_| ConfigError::Missing("API_BASE_URL"))?,
                ),
                timeout_seconds: parse_or("API_TIMEOUT_SECONDS", 30)?,
                user_agent: var_or(
                    "API_USER_AGENT",
                    concat!("book-portal/", env!("CARGO_PKG_VERSION")),
                ),
            },
            session: SessionConfig {
                cookie_name: var_or("SESSION_COOKIE", "book_portal_sid"),
                backend,
                redis_url,
                ttl_seconds: parse_or("SESSION_TTL_SECONDS", 86_400)?,
            },
            routes: RoutesConfig {
                login_path: var_or("LOGIN_PATH", "/login"),
                home_path: var_or("HOME_PATH", "/"),
            },
            book_status: BookStatusCodes {
                waiting: parse_or("BOOK_STATUS_WAITING", defaults.waiting)?,
                returning: parse_or("BOOK_STATUS_RETURNING", defaults.returning)?,
                returned: parse_or("BOOK_STATUS_RETURNED", defaults.returned)?,
                cancel_waiting: parse_or("BOOK_STATUS_CANCEL_WAITING", defaults.cancel_waiting)?,
            },
        })
    }

    /// Конфигурация для тестов и локальных запусков без окружения.
    pub fn for_base_url(base_url: &str) -> Self {
        Config {
            app: AppConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                environment: "test".to_string(),
                rust_log: "book_portal=debug".to_string(),
                log_format: LogFormat::Pretty,
            },
            upstream: UpstreamConfig {
                base_url: normalize_base_url(base_url),
                timeout_seconds: 5,
                user_agent: concat!("book-portal/", env!("CARGO_PKG_VERSION")).to_string(),
            },
            session: SessionConfig {
                cookie_name: "book_portal_sid".to_string(),
                backend: SessionBackendKind::Memory,
                redis_url: None,
                ttl_seconds: 3600,
            },
            routes: RoutesConfig {
                login_path: "/login".to_string(),
                home_path: "/".to_string(),
            },
            book_status: BookStatusCodes::default(),
        }
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

pub fn normalize_base_url(raw: &str) -> String {
    format!("{}/", raw.trim().trim_end_matches('/'))
}
