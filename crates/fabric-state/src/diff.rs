//! Minimal diff between desired and existing state
//!
//! The diff is asymmetric: it converges attributes the caller specifies and
//! never touches attributes the caller left out.

use crate::desired::DesiredConfig;
use crate::object::{ExistingState, ManagedObject};
use crate::value::AttrValue;
use crate::wire::encode_object;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Changed attributes (and child changes) for one object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    class_name: String,
    attributes: IndexMap<String, AttrValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<Diff>,
}

impl Diff {
    /// Empty diff for a class
    #[inline]
    #[must_use]
    pub fn empty(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            attributes: IndexMap::new(),
            children: Vec::new(),
        }
    }

    /// Class name
    #[inline]
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Changed attributes
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &IndexMap<String, AttrValue> {
        &self.attributes
    }

    /// Changed children
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[Diff] {
        &self.children
    }

    /// Check if already convergent
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty()
    }

    /// View as a managed object
    #[must_use]
    pub fn to_object(&self) -> ManagedObject {
        ManagedObject {
            class_name: self.class_name.clone(),
            attributes: self.attributes.clone(),
            children: self.children.iter().map(Diff::to_object).collect(),
        }
    }

    /// Write payload: the object's own class wrapped around the diff only
    #[inline]
    #[must_use]
    pub fn to_payload(&self) -> JsonValue {
        encode_object(&self.to_object())
    }
}

/// Compute the minimal diff of `desired` against `existing`
///
/// - `Absent` → every desired attribute and child
/// - `Present` → only keys whose value differs or is missing
#[must_use]
pub fn diff(desired: &DesiredConfig, existing: &ExistingState) -> Diff {
    match existing {
        ExistingState::Absent => full(desired),
        ExistingState::Present(object) => diff_object(desired, object),
    }
}

fn full(desired: &DesiredConfig) -> Diff {
    Diff {
        class_name: desired.class_name().to_string(),
        attributes: desired.attributes().clone(),
        children: desired.children().iter().map(full).collect(),
    }
}

fn diff_object(desired: &DesiredConfig, existing: &ManagedObject) -> Diff {
    let attributes = changed_attributes(desired, existing);

    let children = desired
        .children()
        .iter()
        .filter_map(|child| {
            let change = match matching_child(child, existing) {
                Some(current) => {
                    let mut change = diff_object(child, current);
                    if !change.is_empty() {
                        // The controller locates a child by its naming attribute
                        if let (Some(name), Some(value)) = (child.identity(), child.identity_value()) {
                            change.attributes.insert(name.to_string(), value.clone());
                        }
                    }
                    change
                }
                None => full(child),
            };
            (!change.is_empty()).then_some(change)
        })
        .collect();

    Diff {
        class_name: desired.class_name().to_string(),
        attributes,
        children,
    }
}

fn changed_attributes(desired: &DesiredConfig, existing: &ManagedObject) -> IndexMap<String, AttrValue> {
    desired
        .attributes()
        .iter()
        .filter(|(name, value)| existing.get(name).map_or(true, |current| !current.matches(value)))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Existing child to compare against: unique match by class and identity
fn matching_child<'a>(child: &DesiredConfig, existing: &'a ManagedObject) -> Option<&'a ManagedObject> {
    let mut candidates = existing.children_of(child.class_name()).filter(|candidate| {
        match (child.identity(), child.identity_value()) {
            (Some(name), Some(value)) => candidate.get(name).is_some_and(|v| v.matches(value)),
            _ => true,
        }
    });

    match (candidates.next(), candidates.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn existing_contract() -> ExistingState {
        ExistingState::Present(
            ManagedObject::new("vzBrCP")
                .with_attribute("name", "C1")
                .with_attribute("scope", "context")
                .with_attribute("prio", "unspecified")
                .with_attribute("descr", "web"),
        )
    }

    #[test]
    fn absent_yields_full_desired() {
        let desired = DesiredConfig::new("vzBrCP").set("name", "C1").set("scope", "tenant");
        let d = diff(&desired, &ExistingState::Absent);
        assert_eq!(d.attributes(), desired.attributes());
    }

    #[test]
    fn only_changed_keys_are_included() {
        let desired = DesiredConfig::new("vzBrCP")
            .set("name", "C1")
            .set("scope", "global")
            .set("prio", "unspecified");
        let d = diff(&desired, &existing_contract());

        let keys: Vec<_> = d.attributes().keys().cloned().collect();
        assert_eq!(keys, vec!["scope".to_string()]);
    }

    #[test]
    fn unspecified_keys_are_never_touched() {
        let desired = DesiredConfig::new("vzBrCP").set("name", "C1");
        let d = diff(&desired, &existing_contract());
        assert!(d.is_empty());
        assert!(d.attributes().get("descr").is_none());
    }

    #[test]
    fn missing_existing_key_is_a_change() {
        let desired = DesiredConfig::new("vzBrCP").set("targetDscp", "AF11");
        let d = diff(&desired, &existing_contract());
        assert_eq!(d.attributes().get("targetDscp").unwrap().as_str(), "AF11");
    }

    #[test]
    fn string_normalized_comparison() {
        let existing = ExistingState::Present(
            ManagedObject::new("vzSubj")
                .with_attribute("revFltPorts", "yes")
                .with_attribute("targetDscp", "10"),
        );
        let desired = DesiredConfig::from_json(
            "vzSubj",
            [("revFltPorts", json!(true)), ("targetDscp", json!(10))],
        );
        assert!(diff(&desired, &existing).is_empty());
    }

    #[test]
    fn payload_carries_only_diff() {
        let desired = DesiredConfig::new("vzBrCP").set("name", "C1").set("scope", "global");
        let payload = diff(&desired, &existing_contract()).to_payload();
        assert_eq!(payload, json!({"vzBrCP": {"attributes": {"scope": "global"}}}));
    }

    fn subject(filter: &str, directives: &str) -> DesiredConfig {
        DesiredConfig::new("vzSubj").set("name", "S1").with_child(
            DesiredConfig::new("vzRsSubjFiltAtt")
                .with_identity("tnVzFilterName")
                .set("tnVzFilterName", filter)
                .set("directives", directives),
        )
    }

    fn existing_subject() -> ExistingState {
        ExistingState::Present(
            ManagedObject::new("vzSubj").with_attribute("name", "S1").with_child(
                ManagedObject::new("vzRsSubjFiltAtt")
                    .with_attribute("tnVzFilterName", "F1")
                    .with_attribute("directives", ""),
            ),
        )
    }

    #[test]
    fn convergent_child_is_omitted() {
        let d = diff(&subject("F1", ""), &existing_subject());
        assert!(d.is_empty());
    }

    #[test]
    fn changed_child_keeps_identity() {
        let d = diff(&subject("F1", "log"), &existing_subject());

        assert!(d.attributes().is_empty());
        assert_eq!(d.children().len(), 1);
        let child = &d.children()[0];
        assert_eq!(child.attributes().get("tnVzFilterName").unwrap().as_str(), "F1");
        assert_eq!(child.attributes().get("directives").unwrap().as_str(), "log");
    }

    #[test]
    fn new_child_is_sent_in_full() {
        let d = diff(&subject("F2", ""), &existing_subject());
        assert_eq!(d.children().len(), 1);
        assert_eq!(d.children()[0].attributes().len(), 2);
        assert_eq!(
            d.to_payload(),
            json!({"vzSubj": {"attributes": {}, "children": [
                {"vzRsSubjFiltAtt": {"attributes": {"tnVzFilterName": "F2", "directives": ""}}}
            ]}})
        );
    }
}
