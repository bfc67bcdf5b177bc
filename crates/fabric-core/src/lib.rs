//! Fabric Core - idempotent reconciliation engine
//!
//! Converges one node of a controller's class-typed object tree to a desired
//! configuration:
//! - Resolves the node's address into a controller path
//! - Fetches and normalizes the existing object
//! - Computes the minimal diff
//! - Submits at most one mutation, or none under dry-run
//! - Reports everything read, computed and sent
//!
//! # Example
//!
//! ```rust,ignore
//! use fabric_core::prelude::*;
//!
//! # async fn example<T: Transport>(transport: T) -> Result<(), ReconcileError> {
//! let address = Address::root(ClassNode::keyed("fvTenant", "tn-T1", "T1")?)
//!     .child(ClassNode::keyed("vzBrCP", "brc-C1", "C1")?);
//! let desired = DesiredConfig::new("vzBrCP").set("name", "C1").set("scope", "global");
//!
//! let engine = Reconciler::new(transport, EngineConfig::default());
//! let result = engine.reconcile(ReconcileRequest::present(address, desired)).await?;
//! println!("changed: {}", result.changed);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod fetch;
pub mod reconciler;
pub mod report;
pub mod submit;
pub mod transport;

pub use catalog::{Binding, Catalog, CatalogError, ChildSpec, FieldSpec, LevelSpec, ObjectType};
pub use config::EngineConfig;
pub use error::{ErrorKind, ReconcileError, ReconcileResult};
pub use fetch::{fetch, read_path, Snapshot};
pub use reconciler::{Mode, Operation, ReconcileRequest, Reconciler};
pub use report::{report, ErrorRecord, OperationResult, ReportInput};
pub use submit::{submit, Mutation, Submission};
pub use transport::{ControllerRequest, Method, RawResponse, Transport, TransportError};

pub use fabric_address::{Address, AddressError, ClassNode, PathTarget, ResolvedPath};
pub use fabric_state::{diff, AttrValue, ControllerFault, DesiredConfig, Diff, ExistingState, ManagedObject};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the engine
    pub use crate::{
        Address, Catalog, ClassNode, DesiredConfig, EngineConfig, Mode, OperationResult,
        ReconcileError, ReconcileRequest, Reconciler, Transport,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
