use std::env;
use std::time::Duration;
use url::Url;

use crate::validator::Limits;

pub const API_URL_VAR: &str = "PNEUMOSCAN_API_URL";
pub const TIMEOUT_VAR: &str = "PNEUMOSCAN_TIMEOUT_SECS";
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid API URL {value:?}: {source}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Unsupported URL scheme in {0:?}, expected http or https")]
    UnsupportedScheme(String),
    #[error("Invalid timeout {0:?}, expected a whole number of seconds")]
    InvalidTimeout(String),
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: Url,
    pub timeout: Duration,
    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            limits: Limits::default(),
        }
    }
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(API_URL_VAR).filter(|v| !v.trim().is_empty()) {
            config = config.with_api_url(&raw)?;
        }
        if let Some(raw) = lookup(TIMEOUT_VAR).filter(|v| !v.trim().is_empty()) {
            config = config.with_timeout_secs(parse_timeout(&raw)?);
        }

        Ok(config)
    }

    pub fn with_api_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.api_url = parse_api_url(raw)?;
        Ok(self)
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Appends `path` to the base URL, keeping any path prefix the base carries.
    pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
        let base = self.api_url.as_str().trim_end_matches('/');
        let raw = format!("{}/{}", base, path.trim_start_matches('/'));
        Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl { value: raw, source })
    }
}

pub fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl {
        value: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ConfigError::UnsupportedScheme(raw.to_string())),
    }
}

fn parse_timeout(raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ConfigError::InvalidTimeout(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.api_url.as_str(), "http://localhost:8000/");
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = Config::from_lookup(lookup(&[
            (API_URL_VAR, "https://pneumoscan.example.org"),
            (TIMEOUT_VAR, "5"),
        ]))
        .unwrap();
        assert_eq!(config.api_url.host_str(), Some("pneumoscan.example.org"));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn bad_values_are_reported() {
        assert!(matches!(
            Config::from_lookup(lookup(&[(API_URL_VAR, "not a url")])),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[(API_URL_VAR, "ftp://files.example.org")])),
            Err(ConfigError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[(TIMEOUT_VAR, "0")])),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn endpoint_keeps_the_base_path_prefix() {
        let config = Config::default()
            .with_api_url("http://gateway.local/pneumoscan/")
            .unwrap();
        assert_eq!(
            config.endpoint("/api/predict").unwrap().as_str(),
            "http://gateway.local/pneumoscan/api/predict"
        );
        let root = Config::default();
        assert_eq!(
            root.endpoint("/health").unwrap().as_str(),
            "http://localhost:8000/health"
        );
    }
}
