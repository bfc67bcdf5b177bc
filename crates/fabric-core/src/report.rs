//! Result reporter
//!
//! Pure aggregation of what was read, computed and sent.

use crate::error::{ErrorKind, ReconcileError};
use crate::fetch::Snapshot;
use crate::reconciler::Mode;
use crate::submit::Submission;
use crate::transport::Method;
use fabric_address::ResolvedPath;
use fabric_state::{AttrValue, ControllerFault, DesiredConfig, Diff, ManagedObject};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Everything a caller needs to review one reconciliation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult {
    /// Requested mode
    pub mode: Mode,
    /// Rendered path of the addressed object or listing
    pub url: String,
    /// Verb of the executed or would-be mutation
    pub method: Option<Method>,
    /// Status of the last executed request
    pub status_code: Option<u16>,
    /// Body of the last executed request
    pub raw_response: Option<String>,
    /// Normalized objects as read before any mutation
    pub existing: Vec<ManagedObject>,
    /// Desired attributes after dropping nulls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed: Option<IndexMap<String, AttrValue>>,
    /// Computed diff
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_applied: Option<Diff>,
    /// Payload that was or would be sent
    pub sent: Option<JsonValue>,
    /// Controller state changed (or would change under dry-run)
    pub changed: bool,
    /// Run without mutations
    pub dry_run: bool,
    /// Failure record, filled by callers that report errors in-band
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
}

impl OperationResult {
    /// Result for a reconciliation that failed before completing
    #[must_use]
    pub fn failed(mode: Mode, url: impl Into<String>, dry_run: bool, error: &ReconcileError) -> Self {
        Self {
            mode,
            url: url.into(),
            method: None,
            status_code: error.status(),
            raw_response: error.raw_response().map(str::to_string),
            existing: Vec::new(),
            proposed: None,
            diff_applied: None,
            sent: None,
            changed: false,
            dry_run,
            error: Some(ErrorRecord::from(error)),
        }
    }

    /// Check if the reconciliation failed
    #[inline]
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Serializable view of a [`ReconcileError`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<ControllerFault>,
}

impl From<&ReconcileError> for ErrorRecord {
    fn from(error: &ReconcileError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            status: error.status(),
            raw_response: error.raw_response().map(str::to_string),
            fault: error.fault().cloned(),
        }
    }
}

/// Stage outputs of one reconciliation
#[derive(Debug)]
pub struct ReportInput<'a> {
    pub mode: Mode,
    pub path: &'a ResolvedPath,
    pub snapshot: Snapshot,
    pub desired: Option<&'a DesiredConfig>,
    pub diff: Option<Diff>,
    pub submission: Submission,
    pub dry_run: bool,
}

/// Aggregate stage outputs into the caller-facing result
#[must_use]
pub fn report(input: ReportInput<'_>) -> OperationResult {
    let ReportInput {
        mode,
        path,
        snapshot,
        desired,
        diff,
        submission,
        dry_run,
    } = input;

    // The mutation's exchange supersedes the read's when one was executed
    let (status_code, raw_response) = if submission.executed {
        (submission.status, submission.raw_response)
    } else {
        (Some(snapshot.status), Some(snapshot.raw_response))
    };

    OperationResult {
        mode,
        url: path.url(),
        method: submission.method,
        status_code,
        raw_response,
        existing: snapshot.objects,
        proposed: desired.map(|d| d.attributes().clone()),
        diff_applied: diff,
        sent: submission.sent,
        changed: submission.changed,
        dry_run,
        error: None,
    }
}
