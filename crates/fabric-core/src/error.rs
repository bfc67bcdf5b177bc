//! Error types for the reconciliation engine
//!
//! Every failure is surfaced as a tagged variant with its diagnostic payload
//! (status, raw body) so callers can tell "nothing to do" from "could not
//! determine state" from "rejected by controller". The engine never recovers
//! locally.

use crate::transport::{Method, TransportError};
use fabric_address::AddressError;
use fabric_state::ControllerFault;
use serde::{Deserialize, Serialize};

/// Main reconciliation error type
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReconcileError {
    /// Malformed resource tree (local, never sent)
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    /// Session could not be set up from its configuration (local, never sent)
    #[error("invalid session configuration: {0}")]
    InvalidSession(String),

    /// Controller rejected the credential
    #[error("authentication rejected (status {status})")]
    AuthFailure {
        status: u16,
        body: String,
        fault: Option<ControllerFault>,
    },

    /// A nominally unique address matched several objects
    #[error("address {url} matched {count} objects, expected at most one")]
    AmbiguousAddress {
        url: String,
        count: usize,
        raw_response: String,
    },

    /// Network failure or timeout
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// Read answered with a non-success status
    #[error("read of {url} rejected with status {status}")]
    ReadRejected {
        url: String,
        status: u16,
        body: String,
        fault: Option<ControllerFault>,
    },

    /// Write or delete answered with a non-success status
    #[error("{method} {url} rejected with status {status}")]
    SubmissionRejected {
        method: Method,
        url: String,
        status: u16,
        body: String,
        fault: Option<ControllerFault>,
    },

    /// Body could not be decoded into the controller wire format
    #[error("malformed response from {url}: {reason}")]
    MalformedResponse {
        url: String,
        reason: String,
        raw_response: String,
    },
}

impl ReconcileError {
    /// Flat classification for callers
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAddress(_) => ErrorKind::InvalidAddress,
            Self::InvalidSession(_) => ErrorKind::InvalidSession,
            Self::AuthFailure { .. } => ErrorKind::AuthFailure,
            Self::AmbiguousAddress { .. } => ErrorKind::AmbiguousAddress,
            Self::Transport(_) => ErrorKind::TransportFailure,
            Self::ReadRejected { .. } => ErrorKind::ReadRejected,
            Self::SubmissionRejected { .. } => ErrorKind::SubmissionRejected,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
        }
    }

    /// HTTP status involved, if a response was obtained
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthFailure { status, .. }
            | Self::ReadRejected { status, .. }
            | Self::SubmissionRejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw controller body, if a response was obtained
    #[must_use]
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::AuthFailure { body, .. }
            | Self::ReadRejected { body, .. }
            | Self::SubmissionRejected { body, .. } => Some(body),
            Self::AmbiguousAddress { raw_response, .. }
            | Self::MalformedResponse { raw_response, .. } => Some(raw_response),
            Self::InvalidAddress(_) | Self::InvalidSession(_) | Self::Transport(_) => None,
        }
    }

    /// Decoded controller error record, if any
    #[must_use]
    pub fn fault(&self) -> Option<&ControllerFault> {
        match self {
            Self::AuthFailure { fault, .. }
            | Self::ReadRejected { fault, .. }
            | Self::SubmissionRejected { fault, .. } => fault.as_ref(),
            _ => None,
        }
    }

    /// Check if a caller could sensibly retry
    ///
    /// The engine itself never retries.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_retryable())
    }

    /// Check if the failure happened before anything was sent
    #[inline]
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::InvalidAddress(_) | Self::InvalidSession(_))
    }
}

/// Error classification tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidAddress,
    InvalidSession,
    AuthFailure,
    AmbiguousAddress,
    TransportFailure,
    ReadRejected,
    SubmissionRejected,
    MalformedResponse,
}

/// Result type alias for engine operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;
