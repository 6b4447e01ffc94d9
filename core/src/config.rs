//! Client configuration.
//!
//! `ClientConfig` is fixed for the lifetime of an `LbcClient`. It can be
//! built in code, deserialized from any serde source, or read from `LBC_*`
//! environment variables.

use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::ApiError;

pub const DEFAULT_API_URL: &str = "https://localbitcoins.com/api";
pub const DEFAULT_SITE_URL: &str = "https://localbitcoins.com";
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

pub const ENV_API_KEY: &str = "LBC_API_KEY";
pub const ENV_API_SECRET: &str = "LBC_API_SECRET";
pub const ENV_OTP: &str = "LBC_OTP";
pub const ENV_API_URL: &str = "LBC_API_URL";
pub const ENV_SITE_URL: &str = "LBC_SITE_URL";
pub const ENV_TIMEOUT_MS: &str = "LBC_TIMEOUT_MS";

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base for public and private calls, e.g. `https://localbitcoins.com/api`.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Site root serving the online-ad feeds.
    #[serde(default = "default_site_url")]
    pub site_url: String,
    pub api_key: String,
    pub api_secret: SecretString,
    /// One-time password. Stored for services that require two-factor
    /// tokens; not part of the signature.
    #[serde(default)]
    pub otp: Option<SecretString>,
    /// Passed to the transport; the client itself enforces no timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_site_url() -> String {
    DEFAULT_SITE_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_url: default_api_url(),
            site_url: default_site_url(),
            api_key: api_key.into(),
            api_secret: SecretString::from(api_secret.into()),
            otp: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_otp(mut self, otp: impl Into<String>) -> Self {
        self.otp = Some(SecretString::from(otp.into()));
        self
    }

    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = url.to_string();
        self
    }

    pub fn with_site_url(mut self, url: &str) -> Self {
        self.site_url = url.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Strip trailing slashes from the base URLs.
    pub(crate) fn normalized(mut self) -> Self {
        self.api_url = self.api_url.trim_end_matches('/').to_string();
        self.site_url = self.site_url.trim_end_matches('/').to_string();
        self
    }

    /// Load from `LBC_API_KEY`, `LBC_API_SECRET` and the optional `LBC_OTP`,
    /// `LBC_API_URL`, `LBC_SITE_URL`, `LBC_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ApiError::Configuration(format!("{name} is not set")))
        };

        let mut config = ClientConfig::new(required(ENV_API_KEY)?, required(ENV_API_SECRET)?);
        if let Some(otp) = lookup(ENV_OTP).filter(|v| !v.is_empty()) {
            config = config.with_otp(otp);
        }
        if let Some(url) = lookup(ENV_API_URL) {
            config.api_url = url;
        }
        if let Some(url) = lookup(ENV_SITE_URL) {
            config.site_url = url;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            config.timeout_ms = raw.parse().map_err(|e| {
                ApiError::Configuration(format!("{ENV_TIMEOUT_MS}={raw:?} is not a number: {e}"))
            })?;
        }
        Ok(config)
    }
}
