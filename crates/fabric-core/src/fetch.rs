//! Existing-state fetcher
//!
//! One read per call, no retry. Instance reads must yield zero or one object;
//! anything more is an ambiguity and is never resolved by picking the first.

use crate::config::EngineConfig;
use crate::error::{ReconcileError, ReconcileResult};
use crate::transport::{send_bounded, ControllerRequest, RawResponse, Transport};
use fabric_address::{PathTarget, ResolvedPath};
use fabric_state::{ControllerFault, ExistingState, ManagedObject, ReadResponse, WireError};
use serde::Serialize;

/// Controller state as read for one resolved path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Rendered read URL
    pub url: String,
    /// HTTP status of the read
    pub status: u16,
    /// Raw body of the read
    pub raw_response: String,
    /// Normalized objects addressed by the path
    pub objects: Vec<ManagedObject>,
}

impl Snapshot {
    /// Existing state of an instance path
    #[must_use]
    pub fn existing(&self) -> ExistingState {
        ExistingState::from(self.objects.first().cloned())
    }

    /// Check if nothing matched
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Read URL for a path, with the engine's query options applied
///
/// `child_classes` names the child classes the caller configures; instance
/// reads then include those children.
#[must_use]
pub fn read_path(path: &ResolvedPath, config: &EngineConfig, child_classes: &[&str]) -> ResolvedPath {
    let mut read = path.clone();
    if path.is_instance() {
        if config.config_only_reads {
            read = read.with_query("rsp-prop-include", "config-only");
        }
        if !child_classes.is_empty() {
            read = read
                .with_query("rsp-subtree", "children")
                .with_query("rsp-subtree-class", child_classes.join(","));
        }
    }
    read
}

/// Fetch and normalize the objects a path addresses
///
/// # Errors
/// - `AuthFailure` on 401/403
/// - `ReadRejected` on any other non-success status or a controller fault
/// - `MalformedResponse` if the body is not in the controller wire format
/// - `AmbiguousAddress` if an instance read returns more than one object
/// - `Transport` if no response was obtained in time
pub async fn fetch<T: Transport + ?Sized>(
    transport: &T,
    path: &ResolvedPath,
    config: &EngineConfig,
    child_classes: &[&str],
) -> ReconcileResult<Snapshot> {
    let url = read_path(path, config, child_classes).url();
    tracing::debug!("Fetching existing state: {}", url);

    let response = send_bounded(transport, ControllerRequest::get(url.clone()), config.request_timeout()).await?;
    let parsed = decode_read(&url, &response)?;

    let normalizer = config.normalizer();
    let objects: Vec<ManagedObject> = select(path, parsed.objects)
        .into_iter()
        .map(|object| normalizer.normalize(object))
        .collect();

    if path.is_instance() && objects.len() > 1 {
        tracing::warn!("Ambiguous read at {}: {} objects", url, objects.len());
        return Err(ReconcileError::AmbiguousAddress {
            url,
            count: objects.len(),
            raw_response: response.body,
        });
    }

    tracing::debug!("Fetched {} object(s) from {}", objects.len(), url);
    Ok(Snapshot {
        url,
        status: response.status,
        raw_response: response.body,
        objects,
    })
}

fn decode_read(url: &str, response: &RawResponse) -> ReconcileResult<ReadResponse> {
    if response.is_auth_rejection() {
        return Err(ReconcileError::AuthFailure {
            status: response.status,
            body: response.body.clone(),
            fault: ControllerFault::from_body(&response.body),
        });
    }
    if !response.is_success() {
        return Err(ReconcileError::ReadRejected {
            url: url.to_string(),
            status: response.status,
            body: response.body.clone(),
            fault: ControllerFault::from_body(&response.body),
        });
    }

    ReadResponse::parse(&response.body).map_err(|e| match e {
        WireError::Fault(fault) => ReconcileError::ReadRejected {
            url: url.to_string(),
            status: response.status,
            body: response.body.clone(),
            fault: Some(fault),
        },
        other => ReconcileError::MalformedResponse {
            url: url.to_string(),
            reason: other.to_string(),
            raw_response: response.body.clone(),
        },
    })
}

/// Objects of the leaf class the path addresses
fn select(path: &ResolvedPath, objects: Vec<ManagedObject>) -> Vec<ManagedObject> {
    match path.target() {
        PathTarget::Instance | PathTarget::ClassListing => objects,
        // The listing parent comes back with the matching descendants nested inside
        PathTarget::SubtreeListing => objects
            .iter()
            .flat_map(|parent| parent.children.iter())
            .flat_map(|child| child.find_all(path.leaf_class()))
            .cloned()
            .collect(),
    }
}
