//! Session configuration

use crate::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// URL scheme used to reach the controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Https,
    Http,
}

impl Protocol {
    #[inline]
    #[must_use]
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Https => "https",
            Self::Http => "http",
        }
    }
}

impl FromStr for Protocol {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "https" => Ok(Self::Https),
            "http" => Ok(Self::Http),
            other => Err(SessionError::InvalidConfig(format!(
                "unknown protocol '{other}', expected http or https"
            ))),
        }
    }
}

/// Where and as whom to log in
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub host: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub protocol: Protocol,
    /// Bound on each round trip, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Verify the controller's TLS certificate
    #[serde(default = "default_validate_certs")]
    pub validate_certs: bool,
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_validate_certs() -> bool {
    true
}

impl SessionConfig {
    /// HTTPS session with default timeout
    #[must_use]
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            protocol: Protocol::Https,
            timeout_secs: default_timeout_secs(),
            validate_certs: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_validate_certs(mut self, validate: bool) -> Self {
        self.validate_certs = validate;
        self
    }

    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Base URL every request path is joined onto, with trailing slash
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}://{}/", self.protocol.scheme(), self.host.trim_end_matches('/'))
    }

    /// Check the configuration before any network use
    ///
    /// # Errors
    /// `SessionError::InvalidConfig` for an empty host or username
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.host.trim().is_empty() {
            return Err(SessionError::InvalidConfig("host is empty".to_string()));
        }
        if self.host.contains("://") {
            return Err(SessionError::InvalidConfig(
                "host must not carry a scheme; set protocol instead".to_string(),
            ));
        }
        if self.username.is_empty() {
            return Err(SessionError::InvalidConfig("username is empty".to_string()));
        }
        Ok(())
    }
}

// Password stays out of logs
impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("protocol", &self.protocol)
            .field("timeout_secs", &self.timeout_secs)
            .field("validate_certs", &self.validate_certs)
            .finish()
    }
}
