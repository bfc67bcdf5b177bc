//! Mutation submitter
//!
//! At most one mutating request per reconciliation. Under dry-run the request
//! is built and reported but never sent.

use crate::error::{ReconcileError, ReconcileResult};
use crate::transport::{send_bounded, ControllerRequest, Method, Transport};
use fabric_address::ResolvedPath;
use fabric_state::{ControllerFault, Diff};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

/// Mutation requested for an instance path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation<'a> {
    /// Create or update with the computed diff
    Upsert(&'a Diff),
    /// Remove the object, if it exists
    Delete {
        /// Whether the preceding read found the object
        exists: bool,
    },
}

/// Outcome of the submission step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    /// Verb of the executed or would-be request
    pub method: Option<Method>,
    /// Payload that was or would be sent
    pub sent: Option<JsonValue>,
    /// Status, if a request was executed
    pub status: Option<u16>,
    /// Raw body, if a request was executed
    pub raw_response: Option<String>,
    /// Controller state differs (or would differ) afterwards
    pub changed: bool,
    /// A request actually went over the wire
    pub executed: bool,
}

impl Submission {
    /// Nothing to do
    #[inline]
    #[must_use]
    pub fn unchanged() -> Self {
        Self {
            method: None,
            sent: None,
            status: None,
            raw_response: None,
            changed: false,
            executed: false,
        }
    }

    fn predicted(method: Method, sent: Option<JsonValue>) -> Self {
        Self {
            method: Some(method),
            sent,
            status: None,
            raw_response: None,
            changed: true,
            executed: false,
        }
    }
}

/// Submit a mutation for an instance path
///
/// # Errors
/// - `InvalidAddress` if `path` is a listing
/// - `SubmissionRejected` if the controller answers with a non-success status
/// - `Transport` if no response was obtained in time
pub async fn submit<T: Transport + ?Sized>(
    transport: &T,
    mutation: Mutation<'_>,
    path: &ResolvedPath,
    dry_run: bool,
    timeout: Duration,
) -> ReconcileResult<Submission> {
    path.require_instance()?;

    let request = match mutation {
        Mutation::Upsert(diff) if diff.is_empty() => {
            tracing::debug!("Already convergent: {}", path.absolute_path());
            return Ok(Submission::unchanged());
        }
        Mutation::Delete { exists: false } => {
            tracing::debug!("Nothing to delete at {}", path.absolute_path());
            return Ok(Submission::unchanged());
        }
        Mutation::Upsert(diff) => ControllerRequest::post(path.absolute_path(), diff.to_payload()),
        Mutation::Delete { exists: true } => ControllerRequest::delete(path.absolute_path()),
    };

    if dry_run {
        tracing::info!("Dry run: would {} {}", request.method, request.path);
        return Ok(Submission::predicted(request.method, request.body));
    }

    let method = request.method;
    let url = request.path.clone();
    let sent = request.body.clone();
    tracing::debug!("Submitting {} {}", method, url);

    let response = send_bounded(transport, request, timeout).await?;
    if !response.is_success() {
        tracing::warn!("{} {} rejected with status {}", method, url, response.status);
        return Err(ReconcileError::SubmissionRejected {
            method,
            url,
            status: response.status,
            fault: ControllerFault::from_body(&response.body),
            body: response.body,
        });
    }

    Ok(Submission {
        method: Some(method),
        sent,
        status: Some(response.status),
        raw_response: Some(response.body),
        changed: true,
        executed: true,
    })
}
