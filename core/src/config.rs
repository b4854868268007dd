//! Client configuration.
//!
//! A client targets either a real appliance, which needs a URL and basic-auth
//! credentials, or the mock server, which accepts placeholder credentials.

use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_WAPI_VERSION: &str = "v2.12";
pub const DEFAULT_MOCK_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

const MOCK_USERNAME: &str = "admin";
const MOCK_PASSWORD: &str = "admin";

/// Settings for a [`WapiClient`](crate::WapiClient).
#[derive(Clone)]
pub struct ClientConfig {
    /// Scheme and host of the appliance, without the `/wapi` suffix.
    pub base_url: String,
    pub wapi_version: String,
    pub username: String,
    /// Never logged; `Debug` redacts it.
    pub password: String,
    /// Per-call timeout applied by the HTTP transport.
    pub timeout: Duration,
    /// Total attempts for retryable failures (5xx, network). At least 1.
    pub max_retries: u32,
    /// Pause between retry attempts.
    pub retry_delay: Duration,
    /// Verify the appliance's TLS certificate.
    pub verify_tls: bool,
    pub use_mock: bool,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("wapi_version", &self.wapi_version)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("verify_tls", &self.verify_tls)
            .field("use_mock", &self.use_mock)
            .finish()
    }
}

impl ClientConfig {
    /// Configuration for a real appliance.
    pub fn appliance(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: url.into().trim_end_matches('/').to_string(),
            wapi_version: DEFAULT_WAPI_VERSION.to_string(),
            username: username.into(),
            password: password.into(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            verify_tls: false,
            use_mock: false,
        }
    }

    /// Configuration for the mock server at `url`.
    pub fn mock(url: impl Into<String>) -> Self {
        Self {
            use_mock: true,
            ..Self::appliance(url, MOCK_USERNAME, MOCK_PASSWORD)
        }
    }

    /// Load configuration from `WAPI_*` environment variables.
    ///
    /// `WAPI_USE_MOCK` (default true) selects `WAPI_MOCK_URL`; otherwise
    /// `WAPI_URL`, `WAPI_USERNAME` and `WAPI_PASSWORD` are required. The
    /// result is validated before it is returned.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `var`.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let use_mock = var("WAPI_USE_MOCK")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(true);

        let mut config = if use_mock {
            let url = var("WAPI_MOCK_URL").unwrap_or_else(|| DEFAULT_MOCK_URL.to_string());
            Self::mock(url)
        } else {
            let url = var("WAPI_URL")
                .ok_or_else(|| Error::configuration("WAPI_URL is required when not using the mock server"))?;
            Self::appliance(
                url,
                var("WAPI_USERNAME").unwrap_or_default(),
                var("WAPI_PASSWORD").unwrap_or_default(),
            )
        };

        if let Some(version) = var("WAPI_VERSION") {
            config.wapi_version = version;
        }
        if let Some(retries) = var("WAPI_MAX_RETRIES") {
            config.max_retries = retries
                .parse()
                .map_err(|_| Error::configuration(format!("invalid WAPI_MAX_RETRIES: {retries}")))?;
        }
        if let Some(secs) = var("WAPI_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| Error::configuration(format!("invalid WAPI_TIMEOUT_SECS: {secs}")))?;
            config.timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_wapi_version(mut self, version: impl Into<String>) -> Self {
        self.wapi_version = version.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// `<base_url>/wapi/<version>`
    pub fn wapi_url(&self) -> String {
        format!("{}/wapi/{}", self.base_url, self.wapi_version)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(Error::configuration("URL is required"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::configuration(format!(
                "URL must start with http:// or https://: {}",
                self.base_url
            )));
        }
        if self.wapi_version.is_empty() {
            return Err(Error::configuration("WAPI version cannot be empty"));
        }
        if !self.use_mock && (self.username.is_empty() || self.password.is_empty()) {
            return Err(Error::configuration(
                "username and password are required for a real appliance",
            ));
        }
        if self.max_retries == 0 {
            return Err(Error::configuration("max_retries must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_vars(vars: &[(&str, &str)]) -> Result<ClientConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn empty_environment_targets_local_mock() {
        let config = from_vars(&[]).unwrap();
        assert!(config.use_mock);
        assert_eq!(config.base_url, DEFAULT_MOCK_URL);
        assert_eq!(config.wapi_version, DEFAULT_WAPI_VERSION);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = from_vars(&[
            ("WAPI_MOCK_URL", "http://mock:9000"),
            ("WAPI_VERSION", "v2.13"),
            ("WAPI_MAX_RETRIES", "5"),
            ("WAPI_TIMEOUT_SECS", "7"),
        ])
        .unwrap();
        assert_eq!(config.wapi_url(), "http://mock:9000/wapi/v2.13");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.timeout, Duration::from_secs(7));
    }

    #[test]
    fn appliance_from_environment() {
        let config = from_vars(&[
            ("WAPI_USE_MOCK", "false"),
            ("WAPI_URL", "https://gm.example.com"),
            ("WAPI_USERNAME", "admin"),
            ("WAPI_PASSWORD", "secret"),
        ])
        .unwrap();
        assert!(!config.use_mock);
        assert_eq!(config.base_url, "https://gm.example.com");
        assert_eq!(config.password, "secret");
    }

    #[test]
    fn appliance_from_environment_requires_url() {
        let err = from_vars(&[("WAPI_USE_MOCK", "no")]).unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("WAPI_URL")));
    }

    #[test]
    fn appliance_from_environment_requires_credentials() {
        let err = from_vars(&[("WAPI_USE_MOCK", "0"), ("WAPI_URL", "https://gm.example.com")])
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("username and password")));
    }

    #[test]
    fn unparsable_numbers_are_configuration_errors() {
        let err = from_vars(&[("WAPI_MAX_RETRIES", "many")]).unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg == "invalid WAPI_MAX_RETRIES: many"));

        let err = from_vars(&[("WAPI_TIMEOUT_SECS", "-1")]).unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg == "invalid WAPI_TIMEOUT_SECS: -1"));
    }

    #[test]
    fn zero_retries_from_environment_fails_validation() {
        let err = from_vars(&[("WAPI_MAX_RETRIES", "0")]).unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("at least 1")));
    }

    #[test]
    fn mock_config_uses_placeholder_credentials() {
        let config = ClientConfig::mock("http://localhost:8080/");
        assert!(config.use_mock);
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.username, "admin");
        assert_eq!(config.wapi_url(), "http://localhost:8080/wapi/v2.12");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn appliance_requires_credentials() {
        let config = ClientConfig::appliance("https://gm.example.com", "", "");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("username and password")));
    }

    #[test]
    fn appliance_requires_url() {
        let config = ClientConfig::appliance("", "admin", "secret");
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn zero_retries_is_rejected() {
        let config = ClientConfig::mock(DEFAULT_MOCK_URL).with_max_retries(0);
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn debug_redacts_password() {
        let config = ClientConfig::appliance("https://gm.example.com", "admin", "hunter2");
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<REDACTED>"));
    }

    #[test]
    fn custom_version_changes_wapi_url() {
        let config = ClientConfig::appliance("https://gm.example.com", "admin", "pw")
            .with_wapi_version("v2.13.1");
        assert_eq!(config.wapi_url(), "https://gm.example.com/wapi/v2.13.1");
    }
}
