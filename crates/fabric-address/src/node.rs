//! One level of the managed-object tree
//!
//! Provides [`ClassNode`] and the ordered chain [`Address`].

use crate::path::{PathTarget, ResolvedPath};
use crate::AddressError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// One addressable level of the controller's object tree
///
/// # Invariants
/// - A keyed node's `relative_name` embeds its `key_value`
/// - An unkeyed node has an empty `relative_name` (it addresses a class, not an instance)
/// - A key never carries path or query syntax (`/`, `?`, `#`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawClassNode")]
pub struct ClassNode {
    /// Controller object-type identifier (e.g. `fvTenant`)
    class_name: String,

    /// Path segment distinguishing this instance among its siblings
    relative_name: String,

    /// Query predicate used when listing
    filter_target: String,

    /// Caller-supplied identifying value
    key_value: Option<String>,
}

impl ClassNode {
    /// Create a node addressing one instance
    ///
    /// # Errors
    /// - `AddressError::EmptyClass` if `class_name` is empty
    /// - `AddressError::EmptyKey` if `key_value` is empty
    /// - `AddressError::InvalidKey` if `key_value` contains `/`, `?` or `#`
    /// - `AddressError::KeyNotInRelativeName` if `relative_name` does not embed `key_value`
    pub fn keyed(
        class_name: impl Into<String>,
        relative_name: impl Into<String>,
        key_value: impl Into<String>,
    ) -> Result<Self, AddressError> {
        let class_name = class_name.into();
        let relative_name = relative_name.into();
        let key_value = key_value.into();

        if class_name.is_empty() {
            return Err(AddressError::EmptyClass);
        }
        if key_value.is_empty() {
            return Err(AddressError::EmptyKey { class: class_name });
        }
        if key_value.contains(KEY_METACHARACTERS) {
            return Err(AddressError::InvalidKey {
                class: class_name,
                key: key_value,
            });
        }
        if !relative_name.contains(&key_value) {
            return Err(AddressError::KeyNotInRelativeName {
                class: class_name,
                key: key_value,
                relative_name,
            });
        }

        Ok(Self {
            class_name,
            relative_name,
            filter_target: String::new(),
            key_value: Some(key_value),
        })
    }

    /// Create a node addressing every instance of a class
    ///
    /// # Errors
    /// Returns `AddressError::EmptyClass` if `class_name` is empty
    pub fn unkeyed(class_name: impl Into<String>) -> Result<Self, AddressError> {
        let class_name = class_name.into();
        if class_name.is_empty() {
            return Err(AddressError::EmptyClass);
        }
        Ok(Self {
            class_name,
            relative_name: String::new(),
            filter_target: String::new(),
            key_value: None,
        })
    }

    /// Attach a listing predicate
    #[inline]
    #[must_use]
    pub fn with_filter(mut self, filter_target: impl Into<String>) -> Self {
        self.filter_target = filter_target.into();
        self
    }

    /// Class name
    #[inline]
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Relative name (empty for unkeyed nodes)
    #[inline]
    #[must_use]
    pub fn relative_name(&self) -> &str {
        &self.relative_name
    }

    /// Listing predicate (may be empty)
    #[inline]
    #[must_use]
    pub fn filter_target(&self) -> &str {
        &self.filter_target
    }

    /// Identifying value, if this node addresses an instance
    #[inline]
    #[must_use]
    pub fn key_value(&self) -> Option<&str> {
        self.key_value.as_deref()
    }

    /// Check if node addresses a specific instance
    #[inline]
    #[must_use]
    pub fn is_keyed(&self) -> bool {
        self.key_value.is_some()
    }
}

/// Characters that would change which object a rendered path names
const KEY_METACHARACTERS: [char; 3] = ['/', '?', '#'];

/// Serialized form of [`ClassNode`], checked on the way in
#[derive(Deserialize)]
struct RawClassNode {
    class_name: String,
    #[serde(default)]
    relative_name: String,
    #[serde(default)]
    filter_target: String,
    #[serde(default)]
    key_value: Option<String>,
}

impl TryFrom<RawClassNode> for ClassNode {
    type Error = AddressError;

    fn try_from(raw: RawClassNode) -> Result<Self, Self::Error> {
        let node = match raw.key_value {
            Some(key) => Self::keyed(raw.class_name, raw.relative_name, key)?,
            None if raw.relative_name.is_empty() => Self::unkeyed(raw.class_name)?,
            None => {
                return Err(AddressError::UnkeyedRelativeName {
                    class: raw.class_name,
                    relative_name: raw.relative_name,
                })
            }
        };
        Ok(node.with_filter(raw.filter_target))
    }
}

impl Display for ClassNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.key_value {
            Some(_) => write!(f, "{}[{}]", self.class_name, self.relative_name),
            None => write!(f, "{}[*]", self.class_name),
        }
    }
}

/// Ordered, non-empty chain of [`ClassNode`]s, most general first
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<ClassNode>")]
pub struct Address(Vec<ClassNode>);

impl Address {
    /// Create address from nodes
    ///
    /// # Errors
    /// Returns `AddressError::Empty` if `nodes` is empty
    pub fn new(nodes: Vec<ClassNode>) -> Result<Self, AddressError> {
        if nodes.is_empty() {
            return Err(AddressError::Empty);
        }
        Ok(Self(nodes))
    }

    /// Address with a single root node
    #[inline]
    #[must_use]
    pub fn root(node: ClassNode) -> Self {
        Self(vec![node])
    }

    /// Append a deeper node, returning new address
    #[inline]
    #[must_use]
    pub fn child(&self, node: ClassNode) -> Self {
        let mut new = self.clone();
        new.0.push(node);
        new
    }

    /// Nodes from root to leaf
    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &[ClassNode] {
        &self.0
    }

    /// Number of levels
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Deepest node (the one being mutated)
    ///
    /// Always `Some` for an address built through this crate.
    #[inline]
    #[must_use]
    pub fn leaf(&self) -> Option<&ClassNode> {
        self.0.last()
    }

    /// Resolve into one controller path and one listing filter
    ///
    /// Keyed nodes must form a prefix of the chain.
    ///
    /// # Errors
    /// Returns `AddressError::Gap` if an unkeyed node precedes a keyed one
    pub fn resolve(&self) -> Result<ResolvedPath, AddressError> {
        let keyed = self.0.iter().take_while(|n| n.is_keyed()).count();

        if let Some(deeper) = self.0[keyed..].iter().find(|n| n.is_keyed()) {
            return Err(AddressError::Gap {
                missing: self.0[keyed].class_name.clone(),
                deeper: deeper.class_name.clone(),
            });
        }

        let leaf = self.leaf().ok_or(AddressError::Empty)?;
        let rns: Vec<&str> = self.0[..keyed]
            .iter()
            .map(|n| n.relative_name.as_str())
            .collect();

        let target = if keyed == self.0.len() {
            PathTarget::Instance
        } else if keyed == 0 {
            PathTarget::ClassListing
        } else {
            PathTarget::SubtreeListing
        };

        Ok(ResolvedPath::new(
            target,
            &rns,
            leaf.class_name.clone(),
            leaf.filter_target.clone(),
        ))
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("/"))
    }
}

impl TryFrom<Vec<ClassNode>> for Address {
    type Error = AddressError;

    fn try_from(nodes: Vec<ClassNode>) -> Result<Self, Self::Error> {
        Self::new(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(name: &str) -> ClassNode {
        ClassNode::keyed("fvTenant", format!("tn-{name}"), name).unwrap()
    }

    fn contract(name: &str) -> ClassNode {
        ClassNode::keyed("vzBrCP", format!("brc-{name}"), name).unwrap()
    }

    #[test]
    fn keyed_node_requires_embedded_key() {
        let result = ClassNode::keyed("fvTenant", "tn-other", "T1");
        assert!(matches!(
            result,
            Err(AddressError::KeyNotInRelativeName { .. })
        ));
    }

    #[test]
    fn keyed_node_rejects_empty_key() {
        let result = ClassNode::keyed("fvTenant", "tn-", "");
        assert!(matches!(result, Err(AddressError::EmptyKey { .. })));
    }

    #[test]
    fn node_rejects_empty_class() {
        assert!(matches!(
            ClassNode::unkeyed(""),
            Err(AddressError::EmptyClass)
        ));
    }

    #[test]
    fn address_rejects_empty_chain() {
        assert!(matches!(Address::new(vec![]), Err(AddressError::Empty)));
    }

    #[test]
    fn address_leaf_and_depth() {
        let addr = Address::root(tenant("T1")).child(contract("C1"));
        assert_eq!(addr.depth(), 2);
        assert_eq!(addr.leaf().unwrap().class_name(), "vzBrCP");
    }

    #[test]
    fn resolve_instance_concatenates_relative_names() {
        let addr = Address::root(tenant("T1")).child(contract("C1"));
        let path = addr.resolve().unwrap();

        assert_eq!(path.target(), PathTarget::Instance);
        assert_eq!(path.dn(), Some("uni/tn-T1/brc-C1"));
        assert_eq!(path.absolute_path(), "api/mo/uni/tn-T1/brc-C1.json");
    }

    #[test]
    fn resolve_rejects_gap() {
        let addr = Address::root(ClassNode::unkeyed("fvTenant").unwrap()).child(contract("C1"));
        let result = addr.resolve();
        assert!(matches!(
            result,
            Err(AddressError::Gap { ref missing, ref deeper }) if missing == "fvTenant" && deeper == "vzBrCP"
        ));
    }

    #[test]
    fn resolve_class_listing() {
        let addr = Address::root(ClassNode::unkeyed("vzBrCP").unwrap());
        let path = addr.resolve().unwrap();

        assert_eq!(path.target(), PathTarget::ClassListing);
        assert_eq!(path.absolute_path(), "api/class/vzBrCP.json");
        assert!(path.dn().is_none());
    }

    #[test]
    fn resolve_subtree_listing() {
        let addr = Address::root(tenant("T1")).child(ClassNode::unkeyed("vzBrCP").unwrap());
        let path = addr.resolve().unwrap();

        assert_eq!(path.target(), PathTarget::SubtreeListing);
        assert_eq!(path.dn(), Some("uni/tn-T1"));
        assert_eq!(
            path.url(),
            "api/mo/uni/tn-T1.json?rsp-subtree=full&rsp-subtree-class=vzBrCP"
        );
    }

    #[test]
    fn list_filter_is_deepest_nodes_filter() {
        let addr = Address::root(tenant("T1").with_filter("eq(fvTenant.name, \"T1\")"))
            .child(contract("C1").with_filter("eq(vzBrCP.name, \"C1\")"));
        let path = addr.resolve().unwrap();
        assert_eq!(path.list_filter(), "eq(vzBrCP.name, \"C1\")");
    }

    #[test]
    fn keys_with_path_syntax_are_rejected() {
        for key in ["T1/brc-X", "T1?rsp-subtree=full", "T1#x"] {
            let result = ClassNode::keyed("fvTenant", format!("tn-{key}"), key);
            assert!(matches!(result, Err(AddressError::InvalidKey { .. })), "{key}");
        }
        assert!(ClassNode::keyed("infraRsDomP", "rsdomP-[uni/phys-PD1]", "phys-PD1").is_ok());
    }

    #[test]
    fn deserialized_address_is_validated() {
        assert!(matches!(
            serde_json::from_str::<Address>("[]"),
            Err(e) if e.to_string().contains("no nodes")
        ));
        assert!(serde_json::from_str::<ClassNode>(r#"{"class_name": ""}"#).is_err());
        assert!(serde_json::from_str::<ClassNode>(
            r#"{"class_name": "fvTenant", "relative_name": "tn-other", "key_value": "T1"}"#
        )
        .is_err());
        assert!(serde_json::from_str::<ClassNode>(
            r#"{"class_name": "fvTenant", "relative_name": "tn-T1"}"#
        )
        .is_err());
    }

    #[test]
    fn serialized_address_reads_back() {
        let addr = Address::root(tenant("T1").with_filter("eq(fvTenant.name, \"T1\")"))
            .child(ClassNode::unkeyed("vzBrCP").unwrap());
        let text = serde_json::to_string(&addr).unwrap();
        assert_eq!(serde_json::from_str::<Address>(&text).unwrap(), addr);
    }

    #[test]
    fn address_display() {
        let addr = Address::root(tenant("T1")).child(ClassNode::unkeyed("vzBrCP").unwrap());
        assert_eq!(addr.to_string(), "fvTenant[tn-T1]/vzBrCP[*]");
    }
}
