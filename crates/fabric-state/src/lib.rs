//! Fabric State
//!
//! Managed-object state on both sides of a reconciliation, the controller's
//! JSON wire format, and the minimal diff between them.
//!
//! # Core Concepts
//!
//! - [`AttrValue`]: Attribute text with the controller's value-equality rule
//! - [`DesiredConfig`]: What the caller wants, nulls dropped
//! - [`ExistingState`]: What the controller has (`Absent` or one object)
//! - [`Diff`]: Only what must change
//!
//! # Example
//!
//! ```rust
//! use fabric_state::{diff, DesiredConfig, ExistingState};
//!
//! let desired = DesiredConfig::new("vzBrCP").set("name", "C1").set("scope", "tenant");
//! let change = diff(&desired, &ExistingState::Absent);
//! assert_eq!(change.attributes().len(), 2);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod desired;
mod diff;
mod object;
mod value;
pub mod wire;

pub use desired::DesiredConfig;
pub use diff::{diff, Diff};
pub use object::{ExistingState, ManagedObject, Normalizer, DEFAULT_BOOKKEEPING_ATTRIBUTES};
pub use value::AttrValue;
pub use wire::{ControllerFault, ReadResponse};

/// Errors decoding controller responses
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Body is not JSON
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// No `imdata` array at top level
    #[error("response has no imdata array")]
    MissingImdata,

    /// Entry does not follow the `{"<Class>": {...}}` shape
    #[error("invalid managed object: {0}")]
    InvalidObject(String),

    /// Controller answered with an error record
    #[error("{0}")]
    Fault(ControllerFault),
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
