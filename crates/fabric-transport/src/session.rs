//! Authenticated controller session

use crate::config::SessionConfig;
use crate::SessionError;
use async_trait::async_trait;
use fabric_core::{ControllerFault, ControllerRequest, Method, RawResponse, Transport, TransportError};
use reqwest::header::{HeaderValue, CONTENT_TYPE, COOKIE};
use serde_json::{json, Value as JsonValue};
use std::time::Duration;

/// Login endpoint, relative to the base URL
pub const LOGIN_PATH: &str = "api/aaaLogin.json";

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "APIC-cookie";

/// Logged-in session; immutable once created
///
/// Cloning is cheap and clones share one connection pool. Wrap in `Arc` to
/// share one session across concurrent reconciliations.
#[derive(Clone)]
pub struct ApicSession {
    client: reqwest::Client,
    base_url: String,
    cookie: HeaderValue,
    timeout: Duration,
}

impl std::fmt::Debug for ApicSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApicSession")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ApicSession {
    /// Log in and keep the returned token
    ///
    /// # Errors
    /// - `SessionError::InvalidConfig` for an unusable configuration
    /// - `SessionError::AuthFailure` if the controller rejects the login
    /// - `SessionError::MalformedLogin` if the answer carries no token
    /// - `SessionError::Transport` if no answer was obtained
    pub async fn authenticate(config: &SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let client = build_client(config)?;
        let base_url = config.base_url();

        let body = json!({
            "aaaUser": { "attributes": { "name": config.username, "pwd": config.password } }
        });
        tracing::debug!("Logging in to {} as {}", base_url, config.username);

        let response = client
            .post(format!("{base_url}{LOGIN_PATH}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e, config.timeout()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(&e, config.timeout()))?;

        if !(200..300).contains(&status) {
            tracing::warn!("Login to {} rejected with status {}", base_url, status);
            return Err(SessionError::AuthFailure {
                status,
                fault: ControllerFault::from_body(&text),
                body: text,
            });
        }

        let token = parse_login(&text)?;
        tracing::info!("Authenticated to {} as {}", base_url, config.username);
        Self::from_parts(client, base_url, &token, config.timeout())
    }

    /// Session reusing a token obtained elsewhere
    ///
    /// # Errors
    /// `SessionError::InvalidConfig` for an unusable configuration or token
    pub fn with_token(config: &SessionConfig, token: &str) -> Result<Self, SessionError> {
        config.validate()?;
        let client = build_client(config)?;
        Self::from_parts(client, config.base_url(), token, config.timeout())
    }

    fn from_parts(
        client: reqwest::Client,
        base_url: String,
        token: &str,
        timeout: Duration,
    ) -> Result<Self, SessionError> {
        let mut cookie = HeaderValue::from_str(&format!("{SESSION_COOKIE}={token}"))
            .map_err(|_| SessionError::InvalidConfig("token is not a valid cookie value".to_string()))?;
        cookie.set_sensitive(true);
        Ok(Self {
            client,
            base_url,
            cookie,
            timeout,
        })
    }

    /// Base URL requests are joined onto
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a relative request path
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for ApicSession {
    async fn send(&self, request: ControllerRequest) -> Result<RawResponse, TransportError> {
        let url = self.url_for(&request.path);
        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        };
        let mut builder = builder.header(COOKIE, self.cookie.clone());
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| into_transport_error(&e, self.timeout))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| into_transport_error(&e, self.timeout))?;

        tracing::debug!("{} {} -> {}", request.method, request.path, status);
        Ok(RawResponse::new(status, body))
    }
}

fn build_client(config: &SessionConfig) -> Result<reqwest::Client, SessionError> {
    reqwest::Client::builder()
        .timeout(config.timeout())
        .danger_accept_invalid_certs(!config.validate_certs)
        .build()
        .map_err(|e| SessionError::InvalidConfig(format!("failed to create HTTP client: {e}")))
}

/// Token from a login answer: `imdata[0].aaaLogin.attributes.token`
pub(crate) fn parse_login(body: &str) -> Result<String, SessionError> {
    let malformed = || SessionError::MalformedLogin {
        body: body.to_string(),
    };
    let value: JsonValue = serde_json::from_str(body).map_err(|_| malformed())?;
    value
        .pointer("/imdata/0/aaaLogin/attributes/token")
        .and_then(JsonValue::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(malformed)
}

fn into_transport_error(error: &reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout { after: timeout }
    } else if error.is_connect() {
        TransportError::Connection(error.to_string())
    } else {
        TransportError::Request(error.to_string())
    }
}

fn map_reqwest_error(error: &reqwest::Error, timeout: Duration) -> SessionError {
    SessionError::Transport(into_transport_error(error, timeout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_extracted_from_login_answer() {
        let body = r#"{"totalCount":"1","imdata":[{"aaaLogin":{"attributes":{"token":"abc123","refreshTimeoutSeconds":"600"}}}]}"#;
        assert_eq!(parse_login(body).unwrap(), "abc123");
    }

    #[test]
    fn answer_without_token_is_malformed() {
        assert!(matches!(
            parse_login(r#"{"imdata":[]}"#),
            Err(SessionError::MalformedLogin { .. })
        ));
        assert!(matches!(parse_login("not json"), Err(SessionError::MalformedLogin { .. })));
    }

    #[test]
    fn session_from_token_joins_paths() {
        let config = SessionConfig::new("apic.example.net", "admin", "pw");
        let session = ApicSession::with_token(&config, "abc123").unwrap();
        assert_eq!(
            session.url_for("/api/mo/uni/tn-T1.json"),
            "https://apic.example.net/api/mo/uni/tn-T1.json"
        );
        assert!(!format!("{session:?}").contains("abc123"));
    }

    #[test]
    fn token_with_control_characters_is_rejected() {
        let config = SessionConfig::new("apic", "admin", "pw");
        assert!(ApicSession::with_token(&config, "bad\ntoken").is_err());
    }

    #[tokio::test]
    async fn unreachable_login_is_a_transport_failure() {
        let config = SessionConfig::new("127.0.0.1:9", "admin", "pw")
            .with_protocol(crate::Protocol::Http)
            .with_timeout_secs(2);
        let err = ApicSession::authenticate(&config).await.unwrap_err();
        assert!(matches!(err, SessionError::Transport(_)));
    }
}
