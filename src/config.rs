//! Client configuration loaded from the environment

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CREDENTIAL_FILE: &str = ".cache/credentials.json";
pub const DEFAULT_MOCK_LATENCY: Duration = Duration::from_millis(500);

const ENV_BASE_URL: &str = "MOVIE_STORE_API_URL";
const ENV_TIMEOUT_SECS: &str = "MOVIE_STORE_TIMEOUT_SECS";
const ENV_CREDENTIALS: &str = "MOVIE_STORE_CREDENTIALS";
const ENV_BACKEND: &str = "MOVIE_STORE_BACKEND";
const ENV_MOCK_LATENCY_MS: &str = "MOVIE_STORE_MOCK_LATENCY_MS";

/// Which transport the application talks through
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Backend {
    #[default]
    Http,
    Mock,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Backend::Http),
            "mock" => Ok(Backend::Mock),
            other => bail!("unknown backend '{}', expected 'http' or 'mock'", other),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Applied uniformly to every HTTP request
    pub timeout: Duration,
    pub credential_file: PathBuf,
    pub backend: Backend,
    pub mock_latency: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            credential_file: PathBuf::from(DEFAULT_CREDENTIAL_FILE),
            backend: Backend::default(),
            mock_latency: DEFAULT_MOCK_LATENCY,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_BASE_URL) {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds", ENV_TIMEOUT_SECS))?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(path) = lookup(ENV_CREDENTIALS) {
            config.credential_file = PathBuf::from(path);
        }
        if let Some(backend) = lookup(ENV_BACKEND) {
            config.backend = backend.parse().with_context(|| format!("Invalid {}", ENV_BACKEND))?;
        }
        if let Some(ms) = lookup(ENV_MOCK_LATENCY_MS) {
            let ms: u64 = ms
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of milliseconds", ENV_MOCK_LATENCY_MS))?;
            config.mock_latency = Duration::from_millis(ms);
        }

        Ok(config)
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
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.base_url, "http://localhost:8000/api");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.backend, Backend::Http);
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("MOVIE_STORE_API_URL", "https://movies.example.com/api/"),
            ("MOVIE_STORE_TIMEOUT_SECS", "3"),
            ("MOVIE_STORE_CREDENTIALS", "/tmp/creds.json"),
            ("MOVIE_STORE_BACKEND", "Mock"),
            ("MOVIE_STORE_MOCK_LATENCY_MS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "https://movies.example.com/api");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.credential_file, PathBuf::from("/tmp/creds.json"));
        assert_eq!(config.backend, Backend::Mock);
        assert_eq!(config.mock_latency, Duration::ZERO);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(ClientConfig::from_lookup(lookup(&[("MOVIE_STORE_TIMEOUT_SECS", "soon")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("MOVIE_STORE_BACKEND", "grpc")])).is_err());
    }
}
