//! Configuration management for the quiz service.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database host
    pub db_host: String,
    /// Database port
    pub db_port: u16,
    /// Database user
    pub db_user: String,
    /// Database password
    pub db_password: String,
    /// Database name
    pub db_name: String,
    /// Timeout for acquiring a database connection
    pub db_connect_timeout: Duration,
    /// Generation backend endpoint
    pub backend_url: String,
    /// Model name sent with every generation request
    pub backend_model: String,
    /// Sampling temperature sent with every generation request
    pub backend_temperature: f32,
    /// Connect timeout for the backend call
    pub connect_timeout: Duration,
    /// Total timeout for the backend call
    pub request_timeout: Duration,
    /// Minimum gap between two outbound backend calls
    pub min_interval: Duration,
    /// Attempts per backend call, first one included
    pub max_attempts: u32,
    /// Upper bound for requested question counts
    pub max_questions: u32,
    /// Fallback log filter when RUST_LOG is unset
    pub log_level: String,
    /// Listen port
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_host: "localhost".to_string(),
            db_port: 5432,
            db_user: "postgres".to_string(),
            db_password: String::new(),
            db_name: "quiz".to_string(),
            db_connect_timeout: Duration::from_secs(5),
            backend_url: "http://localhost:11434/api/generate".to_string(),
            backend_model: "llama3".to_string(),
            backend_temperature: 0.7,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
            min_interval: Duration::from_millis(1000),
            max_attempts: 3,
            max_questions: 20,
            log_level: "info".to_string(),
            port: 5000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            db_host: lookup("DB_HOST").unwrap_or(defaults.db_host),
            db_port: parse_var(&lookup, "DB_PORT", defaults.db_port)?,
            db_user: lookup("DB_USER").unwrap_or(defaults.db_user),
            db_password: lookup("DB_PASSWORD").unwrap_or(defaults.db_password),
            db_name: lookup("DB_NAME").unwrap_or(defaults.db_name),
            db_connect_timeout: Duration::from_secs(parse_var(
                &lookup,
                "DB_CONNECT_TIMEOUT_SECS",
                defaults.db_connect_timeout.as_secs(),
            )?),
            backend_url: lookup("BACKEND_URL").unwrap_or(defaults.backend_url),
            backend_model: lookup("BACKEND_MODEL").unwrap_or(defaults.backend_model),
            backend_temperature: parse_var(
                &lookup,
                "BACKEND_TEMPERATURE",
                defaults.backend_temperature,
            )?,
            connect_timeout: Duration::from_secs(parse_var(
                &lookup,
                "BACKEND_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout.as_secs(),
            )?),
            request_timeout: Duration::from_secs(parse_var(
                &lookup,
                "BACKEND_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            min_interval: Duration::from_millis(parse_var(
                &lookup,
                "BACKEND_MIN_INTERVAL_MS",
                defaults.min_interval.as_millis() as u64,
            )?),
            max_attempts: parse_var(&lookup, "BACKEND_MAX_RETRIES", defaults.max_attempts)?
                .max(1),
            max_questions: parse_var(&lookup, "MAX_QUESTIONS", defaults.max_questions)?.max(1),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            port: parse_var(&lookup, "PORT", defaults.port)?,
        })
    }

    /// Postgres connection URL assembled from the DB_* settings.
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db_user, self.db_password, self.db_host, self.db_port, self.db_name
        )
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: {:?}", key, raw))),
        _ => Ok(default),
    }
}
