//! Startup configuration read from the environment.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::TimeDelta;
use storyloom_posting::application::pipeline::{
    DEFAULT_CONTENT_WAIT, DEFAULT_SELECTION_WAIT, PostingWaits,
};

use crate::error::AppError;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Connection pool size.
    pub database_max_connections: u32,
    /// Deadlines applied to posting attempts.
    pub waits: PostingWaits,
    /// Turn length applied to newly created sessions.
    pub default_turn_duration: Option<TimeDelta>,
    /// OTLP collector, when traces should be exported.
    pub otlp_endpoint: Option<String>,
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a value
    /// does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| AppError::Config("DATABASE_URL environment variable must be set".into()))?;
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned());
        let port = parse_or(&lookup, "PORT", 3000_u16)?;
        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10_u32)?;
        let selection = parse_or(&lookup, "SELECTION_WAIT_SECS", DEFAULT_SELECTION_WAIT.as_secs())?;
        let content = parse_or(&lookup, "CONTENT_WAIT_SECS", DEFAULT_CONTENT_WAIT.as_secs())?;
        let default_turn_duration = match lookup("DEFAULT_TURN_DURATION_SECS") {
            Some(raw) => {
                let secs: i64 = parse("DEFAULT_TURN_DURATION_SECS", &raw)?;
                if secs <= 0 {
                    return Err(AppError::Config(
                        "DEFAULT_TURN_DURATION_SECS must be positive".into(),
                    ));
                }
                Some(TimeDelta::seconds(secs))
            }
            None => None,
        };

        Ok(Self {
            database_url,
            host,
            port,
            database_max_connections,
            waits: PostingWaits {
                selection: Duration::from_secs(selection),
                content: Duration::from_secs(content),
            },
            default_turn_duration,
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }

    /// The socket address to listen on.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST:PORT` is not a valid address.
    pub fn listen_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AppError::Config(format!("{key} is invalid: {e}")))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => parse(key, &raw),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_when_only_database_url_is_set() {
        let config = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://db/story")])).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.waits, PostingWaits::default());
        assert_eq!(config.default_turn_duration, None);
        assert_eq!(config.otlp_endpoint, None);
    }

    #[test]
    fn test_missing_database_url_is_a_config_error() {
        let result = AppConfig::from_lookup(lookup(&[]));

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_waits_and_turn_duration_are_read_in_seconds() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/story"),
            ("SELECTION_WAIT_SECS", "30"),
            ("CONTENT_WAIT_SECS", "120"),
            ("DEFAULT_TURN_DURATION_SECS", "86400"),
        ]))
        .unwrap();

        assert_eq!(config.waits.selection, Duration::from_secs(30));
        assert_eq!(config.waits.content, Duration::from_secs(120));
        assert_eq!(config.default_turn_duration, Some(TimeDelta::days(1)));
    }

    #[test]
    fn test_unparseable_port_is_rejected() {
        let result = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/story"),
            ("PORT", "eighty"),
        ]));

        match result {
            Err(AppError::Config(message)) => assert!(message.starts_with("PORT is invalid")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_non_positive_turn_duration_is_rejected() {
        let result = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/story"),
            ("DEFAULT_TURN_DURATION_SECS", "0"),
        ]));

        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
