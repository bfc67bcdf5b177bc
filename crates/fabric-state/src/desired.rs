//! Caller-supplied desired configuration for one managed object

use crate::object::ManagedObject;
use crate::value::AttrValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Desired attributes for the leaf object of an address
///
/// Null-valued entries never enter the configuration: unspecified is not empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredConfig {
    class_name: String,
    attributes: IndexMap<String, AttrValue>,
    /// Attribute matching this config against existing siblings (children only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identity: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<DesiredConfig>,
}

impl DesiredConfig {
    /// Empty configuration for a class
    #[inline]
    #[must_use]
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            attributes: IndexMap::new(),
            identity: None,
            children: Vec::new(),
        }
    }

    /// Build from JSON-valued attributes, dropping nulls
    #[must_use]
    pub fn from_json<I, K>(class_name: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, JsonValue)>,
        K: Into<String>,
    {
        let mut config = Self::new(class_name);
        for (name, value) in attributes {
            config = config.set_json(name, &value);
        }
        config
    }

    /// Set attribute
    #[inline]
    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set attribute from JSON; `null` leaves the attribute unspecified
    #[must_use]
    pub fn set_json(mut self, name: impl Into<String>, value: &JsonValue) -> Self {
        if let Some(value) = AttrValue::from_json(value) {
            self.attributes.insert(name.into(), value);
        }
        self
    }

    /// Mark the attribute identifying this config among siblings
    #[inline]
    #[must_use]
    pub fn with_identity(mut self, attribute: impl Into<String>) -> Self {
        self.identity = Some(attribute.into());
        self
    }

    /// Add child configuration
    #[inline]
    #[must_use]
    pub fn with_child(mut self, child: DesiredConfig) -> Self {
        self.children.push(child);
        self
    }

    /// Class name
    #[inline]
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Desired attributes in insertion order
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &IndexMap<String, AttrValue> {
        &self.attributes
    }

    /// Identity attribute, if any
    #[inline]
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Identity value, if both attribute and value are set
    #[must_use]
    pub fn identity_value(&self) -> Option<&AttrValue> {
        self.identity.as_deref().and_then(|a| self.attributes.get(a))
    }

    /// Child configurations
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[DesiredConfig] {
        &self.children
    }

    /// Distinct child classes, in first-seen order
    #[must_use]
    pub fn child_classes(&self) -> Vec<&str> {
        let mut classes: Vec<&str> = Vec::new();
        for child in &self.children {
            if !classes.contains(&child.class_name.as_str()) {
                classes.push(&child.class_name);
            }
        }
        classes
    }

    /// Check if nothing is specified
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty()
    }

    /// View as a managed object (the "proposed" state)
    #[must_use]
    pub fn to_object(&self) -> ManagedObject {
        ManagedObject {
            class_name: self.class_name.clone(),
            attributes: self.attributes.clone(),
            children: self.children.iter().map(DesiredConfig::to_object).collect(),
        }
    }
}
