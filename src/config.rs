use sqlx::postgres::PgConnectOptions;
use std::{env, str::FromStr};
use thiserror::Error;

/// Address the HTTP server binds to.
pub const LISTEN_ADDR: &str = "0.0.0.0:8080";

/// AppConfig
///
/// The application's configuration, read once at startup and immutable afterwards. It is
/// handed to the access gate and the router through `AppState` instead of living in globals.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and how strictly secrets are required.
    pub env: Env,
    pub database: DatabaseConfig,
    // Shared secret expected in the `X-API-Key` header. `None` means every request is rejected.
    pub api_key: Option<String>,
}

/// Env
///
/// Runtime context: pretty logs and lenient secrets locally, JSON logs and mandatory secrets
/// in production.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// DatabaseConfig
///
/// Postgres connection settings. A full `DATABASE_URL` wins over the individual parts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            name: "postgres".to_string(),
        }
    }
}

impl DatabaseConfig {
    /// from_env
    ///
    /// Reads `DATABASE_URL`, or `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD` and `DB_NAME`
    /// with local-development fallbacks.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match non_empty_var("DB_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "DB_PORT",
                value: raw,
            })?,
            None => defaults.port,
        };

        Ok(Self {
            url: non_empty_var("DATABASE_URL"),
            host: non_empty_var("DB_HOST").unwrap_or(defaults.host),
            port,
            user: non_empty_var("DB_USER").unwrap_or(defaults.user),
            password: env::var("DB_PASSWORD").unwrap_or_default(),
            name: non_empty_var("DB_NAME").unwrap_or(defaults.name),
        })
    }

    /// Builds driver connect options. Parts are passed individually so credentials need no
    /// URL escaping.
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        if let Some(url) = &self.url {
            return PgConnectOptions::from_str(url);
        }

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name))
    }
}

impl Default for AppConfig {
    /// Safe values for test state setup; no environment access.
    fn default() -> Self {
        Self {
            env: Env::Local,
            database: DatabaseConfig::default(),
            api_key: Some("test-api-key".to_string()),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the environment. Call `dotenv` first if a `.env` file
    /// should be honored.
    ///
    /// # Errors
    /// Fails when `API_KEY` is missing in production or a numeric setting does not parse.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        // An empty secret is treated as no secret at all, so an empty header can never match it.
        let api_key = non_empty_var("API_KEY");
        if api_key.is_none() && env == Env::Production {
            return Err(ConfigError::Missing("API_KEY"));
        }

        Ok(Self {
            env,
            database: DatabaseConfig::from_env()?,
            api_key,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}
