//! Client configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use reqwest::Url;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default backend API root
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api/v1/";

/// Longest storage lifetime accepted for either token
pub const MAX_TOKEN_DAYS: i64 = 3650;

/// How concurrent requests that find an expired access token renew it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// First caller renews; concurrent callers wait and reuse its result
    #[default]
    SingleFlight,
    /// Every request renews independently; last writer wins
    PerRequest,
}

impl FromStr for RefreshPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single-flight" | "single_flight" => Ok(RefreshPolicy::SingleFlight),
            "per-request" | "per_request" => Ok(RefreshPolicy::PerRequest),
            other => Err(ConfigError::Invalid {
                var: "LMS_REFRESH_POLICY".to_string(),
                reason: format!("Unknown policy '{other}' (expected single-flight or per-request)"),
            }),
        }
    }
}

/// Complete client configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend API root, always ending in `/`
    pub api_base_url: String,
    /// Where the session is persisted; in-memory only when unset
    pub session_file: Option<PathBuf>,
    /// Days the stored access token is kept
    pub access_token_days: i64,
    /// Days the stored refresh token is kept
    pub refresh_token_days: i64,
    /// Timeout for authenticated requests; unbounded when unset
    pub request_timeout: Option<Duration>,
    /// Timeout for anonymous requests (login, registration, password reset)
    pub public_timeout: Duration,
    /// Renewal coordination between concurrent requests
    pub refresh_policy: RefreshPolicy,
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `base_url_override` - Optional API base URL override (from CLI args)
    /// * `session_file_override` - Optional session file override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if a variable is present but invalid
    pub fn from_env(
        base_url_override: Option<String>,
        session_file_override: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let api_base_url = base_url_override
            .or_else(|| std::env::var("LMS_API_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let session_file = session_file_override
            .or_else(|| std::env::var("LMS_SESSION_FILE").ok().map(PathBuf::from));

        let request_timeout = std::env::var("LMS_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs);

        let refresh_policy = match std::env::var("LMS_REFRESH_POLICY") {
            Ok(value) => value.parse()?,
            Err(_) => RefreshPolicy::default(),
        };

        let config = ClientConfig {
            api_base_url: normalize_base_url(api_base_url),
            session_file,
            access_token_days: parse_env_or("LMS_ACCESS_TOKEN_DAYS", 1),
            refresh_token_days: parse_env_or("LMS_REFRESH_TOKEN_DAYS", 7),
            request_timeout,
            public_timeout: Duration::from_millis(parse_env_or("LMS_PUBLIC_TIMEOUT_MS", 5000)),
            refresh_policy,
        };
        config.validate()?;
        Ok(config)
    }

    /// Configuration pointing at `base_url` with every other value defaulted
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: normalize_base_url(base_url.into()),
            ..Self::default()
        }
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.api_base_url).map_err(|e| ConfigError::Invalid {
            var: "LMS_API_BASE_URL".to_string(),
            reason: e.to_string(),
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Invalid {
                var: "LMS_API_BASE_URL".to_string(),
                reason: format!("Unsupported scheme '{}'", url.scheme()),
            });
        }

        validate_days("LMS_ACCESS_TOKEN_DAYS", self.access_token_days)?;
        validate_days("LMS_REFRESH_TOKEN_DAYS", self.refresh_token_days)?;

        Ok(())
    }

    /// Parsed API base URL
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.api_base_url).map_err(|e| ConfigError::Invalid {
            var: "LMS_API_BASE_URL".to_string(),
            reason: e.to_string(),
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            session_file: None,
            access_token_days: 1,
            refresh_token_days: 7,
            request_timeout: None,
            public_timeout: Duration::from_millis(5000),
            refresh_policy: RefreshPolicy::default(),
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn validate_days(var: &str, days: i64) -> Result<(), ConfigError> {
    if days <= 0 {
        return Err(ConfigError::Invalid {
            var: var.to_string(),
            reason: "Must be greater than 0".to_string(),
        });
    }
    if days > MAX_TOKEN_DAYS {
        return Err(ConfigError::Invalid {
            var: var.to_string(),
            reason: format!("Must be at most {MAX_TOKEN_DAYS}"),
        });
    }
    Ok(())
}

/// Relative paths join onto the base only when it ends in `/`
fn normalize_base_url(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 7] = [
        "LMS_API_BASE_URL",
        "LMS_SESSION_FILE",
        "LMS_REQUEST_TIMEOUT_SECS",
        "LMS_REFRESH_POLICY",
        "LMS_ACCESS_TOKEN_DAYS",
        "LMS_REFRESH_TOKEN_DAYS",
        "LMS_PUBLIC_TIMEOUT_MS",
    ];

    fn clear_env() {
        for var in VARS {
            // SAFETY: tests touching the environment run under #[serial]
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        let config = ClientConfig::from_env(None, None).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.access_token_days, 1);
        assert_eq!(config.refresh_token_days, 7);
        assert_eq!(config.public_timeout, Duration::from_millis(5000));
        assert!(config.request_timeout.is_none());
        assert!(config.session_file.is_none());
        assert_eq!(config.refresh_policy, RefreshPolicy::SingleFlight);
    }

    #[test]
    #[serial]
    fn test_env_values_and_override() {
        clear_env();
        unsafe {
            std::env::set_var("LMS_API_BASE_URL", "https://lms.example.com/api/v1");
            std::env::set_var("LMS_REFRESH_POLICY", "per-request");
            std::env::set_var("LMS_REQUEST_TIMEOUT_SECS", "30");
        }

        let config = ClientConfig::from_env(None, None).unwrap();
        assert_eq!(config.api_base_url, "https://lms.example.com/api/v1/");
        assert_eq!(config.refresh_policy, RefreshPolicy::PerRequest);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));

        let config =
            ClientConfig::from_env(Some("http://localhost:9000/api/".to_string()), None).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:9000/api/");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_unknown_refresh_policy_rejected() {
        clear_env();
        unsafe { std::env::set_var("LMS_REFRESH_POLICY", "sometimes") };
        let err = ClientConfig::from_env(None, None).unwrap_err();
        assert!(err.to_string().contains("LMS_REFRESH_POLICY"));
        clear_env();
    }

    #[test]
    fn test_validation_rejects_non_http_scheme() {
        let config = ClientConfig::with_base_url("ftp://lms.example.com/");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_validation_rejects_zero_days() {
        let config = ClientConfig {
            refresh_token_days: 0,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_validation_rejects_excessive_days() {
        clear_env();
        unsafe { std::env::set_var("LMS_ACCESS_TOKEN_DAYS", "100000000") };
        let err = ClientConfig::from_env(None, None).unwrap_err();
        assert!(err.to_string().contains("LMS_ACCESS_TOKEN_DAYS"));
        clear_env();

        let config = ClientConfig {
            refresh_token_days: MAX_TOKEN_DAYS + 1,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            access_token_days: MAX_TOKEN_DAYS,
            refresh_token_days: MAX_TOKEN_DAYS,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid {
            var: "LMS_API_BASE_URL".to_string(),
            reason: "relative URL without a base".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("LMS_API_BASE_URL"));
        assert!(msg.contains("relative URL"));
    }
}
