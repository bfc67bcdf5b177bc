//! Fabric Address
//!
//! Class-typed addressing for nodes of a controller's hierarchical
//! configuration tree.
//!
//! # Core Concepts
//!
//! - [`ClassNode`]: One tree level (class, relative name, filter, key)
//! - [`Address`]: Ordered chain of nodes, most general first
//! - [`ResolvedPath`]: One absolute controller path plus its listing filter
//!
//! # Example
//!
//! ```rust
//! use fabric_address::{Address, ClassNode};
//!
//! let address = Address::root(ClassNode::keyed("fvTenant", "tn-T1", "T1").unwrap())
//!     .child(ClassNode::keyed("vzBrCP", "brc-C1", "C1").unwrap());
//!
//! let path = address.resolve().unwrap();
//! assert_eq!(path.absolute_path(), "api/mo/uni/tn-T1/brc-C1.json");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod node;
mod path;

pub use node::{Address, ClassNode};
pub use path::{PathTarget, ResolvedPath, TREE_ROOT};

/// Errors related to resource addressing
///
/// Always local: a malformed address is never sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// Address has no nodes
    #[error("address contains no nodes")]
    Empty,

    /// Node has no class
    #[error("node class name is empty")]
    EmptyClass,

    /// Keyed node with empty key
    #[error("empty key value for class '{class}'")]
    EmptyKey { class: String },

    /// Key would alter the rendered path
    #[error("key '{key}' of class '{class}' contains path or query syntax")]
    InvalidKey { class: String, key: String },

    /// Unkeyed node carrying a relative name
    #[error("class '{class}' has relative name '{relative_name}' but no key")]
    UnkeyedRelativeName { class: String, relative_name: String },

    /// Relative name does not embed the key
    #[error("relative name '{relative_name}' of class '{class}' does not contain key '{key}'")]
    KeyNotInRelativeName {
        class: String,
        key: String,
        relative_name: String,
    },

    /// Intermediate level unaddressed while a deeper one is addressed
    #[error("class '{missing}' has no key while deeper class '{deeper}' does")]
    Gap { missing: String, deeper: String },

    /// Desired configuration targets a class other than the address leaf
    #[error("configuration for class '{actual}' cannot be applied to a '{expected}' address")]
    ClassMismatch { expected: String, actual: String },

    /// Operation needs a single object but the address is a listing
    #[error("address of class '{class}' does not identify a single object")]
    NotAnInstance { class: String },
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
