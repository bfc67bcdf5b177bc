//! Managed objects as reported by the controller

use crate::value::AttrValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Attributes the controller maintains for itself and no user ever configures
pub const DEFAULT_BOOKKEEPING_ATTRIBUTES: &[&str] = &[
    "childAction",
    "configIssues",
    "extMngdBy",
    "lcOwn",
    "modTs",
    "monPolDn",
    "status",
    "uid",
    "userdom",
];

/// One node of the controller's tree with its attributes and children
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedObject {
    /// Controller class
    pub class_name: String,
    /// Attribute name → value
    pub attributes: IndexMap<String, AttrValue>,
    /// Nested objects, in controller order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ManagedObject>,
}

impl ManagedObject {
    /// Create object with no attributes
    #[inline]
    #[must_use]
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            attributes: IndexMap::new(),
            children: Vec::new(),
        }
    }

    /// Set attribute, returning updated object
    #[inline]
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Append child, returning updated object
    #[inline]
    #[must_use]
    pub fn with_child(mut self, child: ManagedObject) -> Self {
        self.children.push(child);
        self
    }

    /// Attribute lookup
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    /// Distinguished name, if the controller reported one
    #[inline]
    #[must_use]
    pub fn dn(&self) -> Option<&str> {
        self.get("dn").map(AttrValue::as_str)
    }

    /// Children of one class
    pub fn children_of<'a, 'b>(&'a self, class_name: &'b str) -> impl Iterator<Item = &'a ManagedObject> + 'b
    where
        'a: 'b,
    {
        self.children.iter().filter(move |c| c.class_name == class_name)
    }

    /// All objects of a class in this subtree, depth first, self included
    #[must_use]
    pub fn find_all(&self, class_name: &str) -> Vec<&ManagedObject> {
        let mut found = Vec::new();
        self.collect_class(class_name, &mut found);
        found
    }

    fn collect_class<'a>(&'a self, class_name: &str, out: &mut Vec<&'a ManagedObject>) {
        if self.class_name == class_name {
            out.push(self);
        }
        for child in &self.children {
            child.collect_class(class_name, out);
        }
    }
}

/// Strips controller-internal bookkeeping attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalizer {
    ignored: BTreeSet<String>,
}

impl Normalizer {
    /// Normalizer ignoring the given attribute names
    #[must_use]
    pub fn new<I, S>(ignored: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignored: ignored.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if attribute is bookkeeping
    #[inline]
    #[must_use]
    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored.contains(name)
    }

    /// Normalize object and its whole subtree
    #[must_use]
    pub fn normalize(&self, mut object: ManagedObject) -> ManagedObject {
        object.attributes.retain(|name, _| !self.ignored.contains(name));
        object.children = object
            .children
            .into_iter()
            .map(|child| self.normalize(child))
            .collect();
        object
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_BOOKKEEPING_ATTRIBUTES.iter().copied())
    }
}

/// Current state of one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "object", rename_all = "snake_case")]
pub enum ExistingState {
    /// Nothing exists at the address
    Absent,
    /// Exactly one object exists
    Present(ManagedObject),
}

impl ExistingState {
    /// Check if object exists
    #[inline]
    #[must_use]
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Object, if present
    #[inline]
    #[must_use]
    pub fn object(&self) -> Option<&ManagedObject> {
        match self {
            Self::Present(object) => Some(object),
            Self::Absent => None,
        }
    }
}

impl From<Option<ManagedObject>> for ExistingState {
    fn from(object: Option<ManagedObject>) -> Self {
        object.map_or(Self::Absent, Self::Present)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract() -> ManagedObject {
        ManagedObject::new("vzBrCP")
            .with_attribute("name", "C1")
            .with_attribute("modTs", "2017-09-01T10:00:00")
            .with_attribute("uid", "15374")
            .with_child(
                ManagedObject::new("vzSubj")
                    .with_attribute("name", "S1")
                    .with_attribute("lcOwn", "local"),
            )
    }

    #[test]
    fn normalize_strips_bookkeeping_recursively() {
        let normalized = Normalizer::default().normalize(contract());

        assert!(normalized.get("modTs").is_none());
        assert!(normalized.get("uid").is_none());
        assert_eq!(normalized.get("name").unwrap().as_str(), "C1");
        assert!(normalized.children[0].get("lcOwn").is_none());
    }

    #[test]
    fn normalize_keeps_configurable_attributes() {
        let normalizer = Normalizer::new(["modTs"]);
        let normalized = normalizer.normalize(contract());
        assert!(normalized.get("uid").is_some());
        assert!(normalizer.is_ignored("modTs"));
    }

    #[test]
    fn find_all_walks_subtree() {
        let tenant = ManagedObject::new("fvTenant").with_child(contract());
        assert_eq!(tenant.find_all("vzSubj").len(), 1);
        assert_eq!(tenant.find_all("vzBrCP").len(), 1);
        assert!(tenant.find_all("fvAp").is_empty());
    }

    #[test]
    fn existing_state_from_option() {
        assert!(!ExistingState::from(None).is_present());
        assert!(ExistingState::from(Some(contract())).is_present());
    }

    #[test]
    fn children_outlive_the_class_name() {
        let object = contract();
        let found: Vec<&ManagedObject> = {
            let class = String::from("vzSubj");
            object.children_of(&class).collect()
        };
        assert_eq!(found.len(), 1);
    }

    mod properties {
        use super::*;
        use proptest::collection::{btree_map, vec};
        use proptest::prelude::*;
        use std::collections::BTreeMap;

        const NAMES: &str = "(name|descr|modTs|uid|status|lcOwn|prio)";

        fn attrs() -> impl Strategy<Value = BTreeMap<String, String>> {
            btree_map(NAMES, "[a-z0-9]{0,3}", 0..6)
        }

        fn object_from(attributes: &BTreeMap<String, String>, children: &[BTreeMap<String, String>]) -> ManagedObject {
            let leaf = |map: &BTreeMap<String, String>| {
                map.iter()
                    .fold(ManagedObject::new("vzSubj"), |o, (k, v)| o.with_attribute(k.clone(), v.clone()))
            };
            children
                .iter()
                .fold(leaf(attributes), |o, child| o.with_child(leaf(child).with_child(leaf(child))))
        }

        fn assert_stripped(
            normalizer: &Normalizer,
            original: &ManagedObject,
            normalized: &ManagedObject,
        ) -> Result<(), TestCaseError> {
            let expected: Vec<&String> = original
                .attributes
                .keys()
                .filter(|name| !normalizer.is_ignored(name))
                .collect();
            let kept: Vec<&String> = normalized.attributes.keys().collect();
            prop_assert_eq!(kept, expected);
            prop_assert_eq!(normalized.children.len(), original.children.len());
            for (before, after) in original.children.iter().zip(&normalized.children) {
                assert_stripped(normalizer, before, after)?;
            }
            Ok(())
        }

        proptest! {
            #[test]
            fn normalize_removes_exactly_the_ignored_attributes(a in attrs(), c in vec(attrs(), 0..3)) {
                let normalizer = Normalizer::default();
                let original = object_from(&a, &c);
                let normalized = normalizer.normalize(original.clone());
                assert_stripped(&normalizer, &original, &normalized)?;
            }

            #[test]
            fn normalize_is_idempotent(a in attrs(), c in vec(attrs(), 0..3)) {
                let normalizer = Normalizer::default();
                let once = normalizer.normalize(object_from(&a, &c));
                prop_assert_eq!(normalizer.normalize(once.clone()), once);
            }
        }
    }
}
