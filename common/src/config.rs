//! Application configuration.
//!
//! Values come from environment variables with static defaults. Services
//! call [`load_dotenv`] first so a local `.env` file can fill the gaps.

use std::time::Duration;

const DEFAULT_APP_NAME: &str = "Servicios de Jreport";
const DEFAULT_APP_VERSION: &str = "0.0.1";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Runtime configuration shared by a service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Name of the running service (used in logs and health output).
    pub service_name: String,
    /// Human readable application name.
    pub app_name: String,
    /// Application version string.
    pub app_version: String,
    /// Enables verbose logging.
    pub debug: bool,
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Seconds to wait when opening a pool against a target database.
    pub connect_timeout_secs: u64,
    /// Upper bound of connections per registered pool.
    pub max_connections: u32,
    /// Optional upper bound for a single query round trip.
    pub query_timeout_secs: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            app_name: DEFAULT_APP_NAME.to_string(),
            app_version: DEFAULT_APP_VERSION.to_string(),
            debug: true,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            query_timeout_secs: None,
        }
    }
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn load_with_service(service_name: &str) -> Self {
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// Unparsable values fall back to their defaults.
    pub fn from_lookup<F>(service_name: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            service_name: service_name.to_string(),
            app_name: lookup("APP_NAME").unwrap_or(defaults.app_name),
            app_version: lookup("APP_VERSION").unwrap_or(defaults.app_version),
            debug: lookup("DEBUG")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.debug),
            host: lookup("SERVER_HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "SERVER_PORT").unwrap_or(defaults.port),
            connect_timeout_secs: parse_var(&lookup, "DB_CONNECT_TIMEOUT_SECS")
                .unwrap_or(defaults.connect_timeout_secs),
            max_connections: parse_var(&lookup, "DB_MAX_CONNECTIONS")
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.max_connections),
            query_timeout_secs: parse_var(&lookup, "DB_QUERY_TIMEOUT_SECS")
                .filter(|n: &u64| *n > 0),
        }
    }

    /// Timeout applied when opening a pool.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Timeout applied to each query, if configured.
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_secs.map(Duration::from_secs)
    }

    /// Default log filter when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }

    /// Address the HTTP server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Loads a `.env` file from the working directory (best-effort, no error if missing).
///
/// Variables already present in the environment are left untouched.
pub fn load_dotenv() {
    let Ok(content) = std::fs::read_to_string(".env") else {
        return;
    };
    for (key, value) in parse_dotenv(&content) {
        if std::env::var(key).is_err() {
            std::env::set_var(key, value);
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim().trim_matches('"')))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = AppConfig::from_lookup("database-service", |_| None);
        assert_eq!(config.service_name, "database-service");
        assert_eq!(config.app_name, "Servicios de Jreport");
        assert_eq!(config.app_version, "0.0.1");
        assert!(config.debug);
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert_eq!(config.query_timeout(), None);
        assert_eq!(config.default_log_filter(), "debug");
    }

    #[test]
    fn test_environment_overrides() {
        let config = AppConfig::from_lookup(
            "svc",
            lookup_from(&[
                ("APP_NAME", "Reports"),
                ("DEBUG", "false"),
                ("SERVER_PORT", "9100"),
                ("DB_MAX_CONNECTIONS", "12"),
                ("DB_QUERY_TIMEOUT_SECS", "30"),
            ]),
        );
        assert_eq!(config.app_name, "Reports");
        assert!(!config.debug);
        assert_eq!(config.port, 9100);
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.query_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.default_log_filter(), "info");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = AppConfig::from_lookup(
            "svc",
            lookup_from(&[
                ("SERVER_PORT", "not-a-port"),
                ("DEBUG", "maybe"),
                ("DB_MAX_CONNECTIONS", "0"),
                ("DB_QUERY_TIMEOUT_SECS", "0"),
            ]),
        );
        assert_eq!(config.port, 8000);
        assert!(config.debug);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.query_timeout_secs, None);
    }

    #[test]
    fn test_parse_dotenv_skips_comments() {
        let parsed = parse_dotenv("# comment\n\nSERVER_PORT=9000\nAPP_NAME=\"Demo\"\nbroken\n");
        assert_eq!(parsed, vec![("SERVER_PORT", "9000"), ("APP_NAME", "Demo")]);
    }
}
