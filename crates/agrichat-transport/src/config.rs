//! Gateway configuration.

use std::time::Duration;

use url::Url;

/// Base URL used when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api/chat";

/// Request timeout used when nothing is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable overriding the base URL.
pub const BASE_URL_ENV: &str = "AGRICHAT_BASE_URL";

/// Environment variable overriding the timeout, in whole seconds.
pub const TIMEOUT_ENV: &str = "AGRICHAT_TIMEOUT_SECS";

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid base URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Where and how the HTTP gateway talks to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Chat API root; always ends with `/` so relative paths join under it.
    pub base_url: Url,
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Create a config for `base_url` with the default timeout.
    ///
    /// # Errors
    /// Returns error if the URL does not parse or is not http(s).
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Override the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve from `AGRICHAT_BASE_URL` / `AGRICHAT_TIMEOUT_SECS`.
    ///
    /// # Errors
    /// Returns error if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable lookup. Blank values count as unset.
    ///
    /// # Errors
    /// Returns error if a value is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::new(get(BASE_URL_ENV).as_deref().unwrap_or(DEFAULT_BASE_URL))?;

        if let Some(raw) = get(TIMEOUT_ENV) {
            let secs: u64 = raw
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
            if secs == 0 {
                return Err(ConfigError::InvalidTimeout(raw));
            }
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let raw = raw.trim();
    let mut url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::UnsupportedScheme(url.scheme().to_string()));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.base_url.as_str(), "http://localhost:5000/api/chat/");
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let config = GatewayConfig::new("https://farm.example.com/api/chat").unwrap();
        let joined = config.base_url.join("sessions/4/messages").unwrap();
        assert_eq!(
            joined.as_str(),
            "https://farm.example.com/api/chat/sessions/4/messages"
        );
    }

    #[test]
    fn test_env_overrides() {
        let config = GatewayConfig::from_lookup(lookup(&[
            (BASE_URL_ENV, " http://10.0.0.2:8080/chat/ "),
            (TIMEOUT_ENV, "5"),
        ]))
        .unwrap();
        assert_eq!(config.base_url.as_str(), "http://10.0.0.2:8080/chat/");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config =
            GatewayConfig::from_lookup(lookup(&[(BASE_URL_ENV, "  "), (TIMEOUT_ENV, "")])).unwrap();
        assert_eq!(config, GatewayConfig::new(DEFAULT_BASE_URL).unwrap());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            GatewayConfig::new("not a url"),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            GatewayConfig::new("ftp://example.com"),
            Err(ConfigError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            GatewayConfig::from_lookup(lookup(&[(TIMEOUT_ENV, "0")])),
            Err(ConfigError::InvalidTimeout(_))
        ));
        assert!(matches!(
            GatewayConfig::from_lookup(lookup(&[(TIMEOUT_ENV, "soon")])),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }
}
