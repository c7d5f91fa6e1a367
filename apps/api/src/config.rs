use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgConnectOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => anyhow::bail!("APP_ENV must be 'development' or 'production', got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Every key has a local-development fallback except the optional API key
/// and Redis URL.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: PgConnectOptions,
    pub port: u16,
    pub environment: Environment,
    pub cors_origins: Vec<String>,
    pub gemini_api_key: Option<String>,
    pub redis_url: Option<String>,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    pub chat_session_capacity: usize,
    pub chat_session_ttl: Duration,
    pub chat_max_turns: usize,
    pub chat_max_tool_rounds: usize,
    pub rust_log: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: PgConnectOptions::new()
                .host(DEFAULT_DB_HOST)
                .port(DEFAULT_DB_PORT)
                .username(DEFAULT_DB_USER)
                .password(DEFAULT_DB_PASSWORD)
                .database(DEFAULT_DB_NAME),
            port: 3001,
            environment: Environment::Development,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
            gemini_api_key: None,
            redis_url: None,
            rate_limit_max: 100,
            rate_limit_window: Duration::from_secs(900),
            chat_session_capacity: 256,
            chat_session_ttl: Duration::from_secs(86_400),
            chat_max_turns: 40,
            chat_max_tool_rounds: 5,
            rust_log: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();

        let database = match get("DATABASE_URL") {
            Some(url) => PgConnectOptions::from_str(url.trim())
                .context("DATABASE_URL is not a valid PostgreSQL connection string")?,
            None => database_from_parts(&get)?,
        };

        let cors_origins = match get("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect(),
            None => defaults.cors_origins,
        };

        Ok(Config {
            database,
            port: parse_or(&get, "PORT", defaults.port)?,
            environment: match get("APP_ENV") {
                Some(raw) => raw.parse()?,
                None => defaults.environment,
            },
            cors_origins,
            gemini_api_key: get("GEMINI_API_KEY"),
            redis_url: get("REDIS_URL"),
            rate_limit_max: parse_or(&get, "RATE_LIMIT_MAX", defaults.rate_limit_max)?,
            rate_limit_window: Duration::from_secs(parse_or(
                &get,
                "RATE_LIMIT_WINDOW_SECS",
                defaults.rate_limit_window.as_secs(),
            )?),
            chat_session_capacity: parse_or(
                &get,
                "CHAT_SESSION_CAPACITY",
                defaults.chat_session_capacity,
            )?,
            chat_session_ttl: Duration::from_secs(parse_or(
                &get,
                "CHAT_SESSION_TTL_SECS",
                defaults.chat_session_ttl.as_secs(),
            )?),
            chat_max_turns: parse_or(&get, "CHAT_MAX_TURNS", defaults.chat_max_turns)?,
            chat_max_tool_rounds: parse_or(
                &get,
                "CHAT_MAX_TOOL_ROUNDS",
                defaults.chat_max_tool_rounds,
            )?,
            rust_log: get("RUST_LOG").unwrap_or(defaults.rust_log),
        })
    }
}

const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_DB_NAME: &str = "masters_dashboard";
const DEFAULT_DB_USER: &str = "postgres";
const DEFAULT_DB_PASSWORD: &str = "password";

/// Connection options from the `DB_*` keys. Values are passed through as-is,
/// so passwords may contain URL-reserved characters.
fn database_from_parts(get: &impl Fn(&str) -> Option<String>) -> Result<PgConnectOptions> {
    let host = get("DB_HOST").unwrap_or_else(|| DEFAULT_DB_HOST.to_string());
    let name = get("DB_NAME").unwrap_or_else(|| DEFAULT_DB_NAME.to_string());
    let user = get("DB_USER").unwrap_or_else(|| DEFAULT_DB_USER.to_string());
    let password = get("DB_PASSWORD").unwrap_or_else(|| DEFAULT_DB_PASSWORD.to_string());
    Ok(PgConnectOptions::new()
        .host(&host)
        .port(parse_or(get, "DB_PORT", DEFAULT_DB_PORT)?)
        .username(&user)
        .password(&password)
        .database(&name))
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
