use std::path::PathBuf;

use crate::rate_limit::RateLimitConfig;

pub const MIN_SECRET_LEN: usize = 32;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("JWT_SECRET must be at least 32 characters long")]
    SecretTooShort,
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime settings, read from the environment (and `.env` in debug builds).
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub cookie_secure: bool,
    pub enable_hsts: bool,
    pub cors_origins: Vec<String>,
    pub data_dir: PathBuf,
    pub database_url: Option<String>,
    pub rate_limit: RateLimitConfig,
}

fn flag(name: &str) -> bool {
    std::env::var(name).map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        use std::env;

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::SecretTooShort);
        }

        let session_ttl_hours = match env::var("SESSION_TTL_HOURS") {
            Ok(v) => match v.parse::<i64>() {
                Ok(h) if h > 0 => h,
                _ => return Err(ConfigError::Invalid { name: "SESSION_TTL_HOURS", value: v }),
            },
            Err(_) => 24,
        };

        let mut cors_origins: Vec<String> = env::var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if let Ok(front) = env::var("FRONTEND_URL") {
            if !cors_origins.contains(&front) {
                cors_origins.push(front);
            }
        }

        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            jwt_secret,
            session_ttl_hours,
            cookie_secure: flag("COOKIE_SECURE"),
            enable_hsts: flag("ENABLE_HSTS"),
            cors_origins,
            data_dir: env::var("MSGBOARD_DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("data")),
            database_url: env::var("DATABASE_URL").ok(),
            rate_limit: RateLimitConfig::from_env(),
        })
    }
}
