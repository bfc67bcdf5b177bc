//! Fabric Transport
//!
//! HTTP session against one controller. The session logs in once, keeps the
//! returned token read-only, and presents it as the `APIC-cookie` cookie on
//! every request. Retry and backoff are left to callers.
//!
//! # Example
//!
//! ```rust,ignore
//! use fabric_transport::{ApicSession, SessionConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), fabric_transport::SessionError> {
//! let config = SessionConfig::new("apic.example.net", "admin", "secret");
//! let session = Arc::new(ApicSession::authenticate(&config).await?);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod config;
mod session;

pub use config::{Protocol, SessionConfig};
pub use session::{ApicSession, LOGIN_PATH, SESSION_COOKIE};

use fabric_core::{ControllerFault, ReconcileError, TransportError};

/// Errors establishing a session
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// Configuration is unusable
    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),

    /// Controller rejected the credential
    #[error("login rejected with status {status}")]
    AuthFailure {
        status: u16,
        body: String,
        fault: Option<ControllerFault>,
    },

    /// Login answered without a token
    #[error("login response carries no token")]
    MalformedLogin { body: String },

    /// No login response obtained
    #[error("login failed: {0}")]
    Transport(#[from] TransportError),
}

impl From<SessionError> for ReconcileError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::AuthFailure { status, body, fault } => Self::AuthFailure { status, body, fault },
            SessionError::MalformedLogin { body } => Self::MalformedResponse {
                url: LOGIN_PATH.to_string(),
                reason: "login response carries no token".to_string(),
                raw_response: body,
            },
            SessionError::Transport(e) => Self::Transport(e),
            SessionError::InvalidConfig(message) => Self::InvalidSession(message),
        }
    }
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_core::ErrorKind;

    #[test]
    fn login_rejection_maps_to_auth_failure() {
        let err: ReconcileError = SessionError::AuthFailure {
            status: 401,
            body: "denied".into(),
            fault: None,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::AuthFailure);
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn bad_configuration_is_local_not_a_network_failure() {
        let err: ReconcileError = SessionError::InvalidConfig("host is empty".into()).into();
        assert_eq!(err.kind(), ErrorKind::InvalidSession);
        assert!(err.is_local());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("host is empty"));
    }

    #[test]
    fn missing_token_maps_to_malformed_response() {
        let err: ReconcileError = SessionError::MalformedLogin { body: "{}".into() }.into();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }
}
