//! Session transport seam
//!
//! The engine only needs "send verb V to path P with body B → status, body".
//! Authentication and connection handling live behind this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

/// HTTP verb used against the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Idempotent read
    Get,
    /// Create-or-update
    Post,
    /// Remove
    Delete,
}

impl Method {
    /// Check if verb mutates controller state
    #[inline]
    #[must_use]
    pub fn is_mutation(self) -> bool {
        !matches!(self, Self::Get)
    }

    /// Verb as text
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request to the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerRequest {
    /// HTTP verb
    pub method: Method,
    /// Path relative to the controller base URL, query string included
    pub path: String,
    /// JSON body (writes only)
    pub body: Option<JsonValue>,
}

impl ControllerRequest {
    /// Read request
    #[inline]
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    /// Create-or-update request
    #[inline]
    #[must_use]
    pub fn post(path: impl Into<String>, body: JsonValue) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    /// Delete request
    #[inline]
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }
}

/// Status and body returned by the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw body text
    pub body: String,
}

impl RawResponse {
    /// Create response
    #[inline]
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Check for 2xx
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check for an authentication rejection
    #[inline]
    #[must_use]
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self.status, 401 | 403)
    }
}

/// Transport-level failures (no response obtained)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Round trip exceeded its bound
    #[error("request timed out after {}s", .after.as_secs())]
    Timeout { after: Duration },

    /// Connection could not be established or broke
    #[error("connection failed: {0}")]
    Connection(String),

    /// Caller abandoned the request
    #[error("request cancelled")]
    Cancelled,

    /// Request could not be built or sent
    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    /// Check if a caller could sensibly retry
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connection(_))
    }
}

/// Sends requests to one controller with an established credential
///
/// Implementations hold the credential read-only and must be shareable across
/// concurrent reconciliations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return the controller's answer
    ///
    /// # Errors
    /// Returns `TransportError` when no response was obtained
    async fn send(&self, request: ControllerRequest) -> Result<RawResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: ControllerRequest) -> Result<RawResponse, TransportError> {
        (**self).send(request).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for &T {
    async fn send(&self, request: ControllerRequest) -> Result<RawResponse, TransportError> {
        (**self).send(request).await
    }
}

/// Send one request, failing with `Timeout` once `limit` elapses
pub(crate) async fn send_bounded<T: Transport + ?Sized>(
    transport: &T,
    request: ControllerRequest,
    limit: Duration,
) -> Result<RawResponse, TransportError> {
    match tokio::time::timeout(limit, transport.send(request)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout { after: limit }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stalled;

    #[async_trait]
    impl Transport for Stalled {
        async fn send(&self, _request: ControllerRequest) -> Result<RawResponse, TransportError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(RawResponse::new(200, "{}"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_send_times_out() {
        let err = send_bounded(&Stalled, ControllerRequest::get("api/x.json"), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TransportError::Timeout {
                after: Duration::from_secs(2)
            }
        );
    }

    #[test]
    fn method_mutation_flags() {
        assert!(!Method::Get.is_mutation());
        assert!(Method::Post.is_mutation());
        assert!(Method::Delete.is_mutation());
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }

    #[test]
    fn response_status_classes() {
        assert!(RawResponse::new(200, "").is_success());
        assert!(!RawResponse::new(400, "").is_success());
        assert!(RawResponse::new(403, "").is_auth_rejection());
    }

    #[test]
    fn transport_error_retryable() {
        assert!(TransportError::Timeout {
            after: Duration::from_secs(5)
        }
        .is_retryable());
        assert!(!TransportError::Cancelled.is_retryable());
    }

    #[tokio::test]
    async fn arc_transport_delegates() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .times(1)
            .returning(|_| Ok(RawResponse::new(200, "{}")));

        let shared = Arc::new(mock);
        let response = shared.send(ControllerRequest::get("api/x.json")).await.unwrap();
        assert_eq!(response.status, 200);
    }
}
