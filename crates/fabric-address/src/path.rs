//! Controller paths resolved from an [`Address`](crate::Address)

use crate::AddressError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Root of the configuration tree
pub const TREE_ROOT: &str = "uni";

/// What a resolved path points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathTarget {
    /// Exactly one managed object
    Instance,
    /// All objects of the leaf class beneath a keyed parent
    SubtreeListing,
    /// All objects of the leaf class anywhere in the tree
    ClassListing,
}

/// One absolute controller path plus its listing filter and query options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPath {
    target: PathTarget,
    dn: Option<String>,
    leaf_class: String,
    absolute_path: String,
    list_filter: String,
    query: Vec<(String, String)>,
}

impl ResolvedPath {
    pub(crate) fn new(
        target: PathTarget,
        relative_names: &[&str],
        leaf_class: String,
        list_filter: String,
    ) -> Self {
        let dn = if relative_names.is_empty() {
            None
        } else {
            Some(format!("{TREE_ROOT}/{}", relative_names.join("/")))
        };

        let absolute_path = match &dn {
            Some(dn) => format!("api/mo/{dn}.json"),
            None => format!("api/class/{leaf_class}.json"),
        };

        let mut query = Vec::new();
        match target {
            PathTarget::Instance => {}
            PathTarget::SubtreeListing => {
                query.push(("rsp-subtree".to_string(), "full".to_string()));
                query.push(("rsp-subtree-class".to_string(), leaf_class.clone()));
                if !list_filter.is_empty() {
                    query.push(("rsp-subtree-filter".to_string(), list_filter.clone()));
                }
            }
            PathTarget::ClassListing => {
                if !list_filter.is_empty() {
                    query.push(("query-target-filter".to_string(), list_filter.clone()));
                }
            }
        }

        Self {
            target,
            dn,
            leaf_class,
            absolute_path,
            list_filter,
            query,
        }
    }

    /// Path target
    #[inline]
    #[must_use]
    pub fn target(&self) -> PathTarget {
        self.target
    }

    /// Distinguished name of the addressed object, or of the listing parent
    #[inline]
    #[must_use]
    pub fn dn(&self) -> Option<&str> {
        self.dn.as_deref()
    }

    /// Class of the deepest node
    #[inline]
    #[must_use]
    pub fn leaf_class(&self) -> &str {
        &self.leaf_class
    }

    /// Absolute path without query string
    #[inline]
    #[must_use]
    pub fn absolute_path(&self) -> &str {
        &self.absolute_path
    }

    /// Deepest node's filter predicate (may be empty)
    #[inline]
    #[must_use]
    pub fn list_filter(&self) -> &str {
        &self.list_filter
    }

    /// Query options in insertion order
    #[inline]
    #[must_use]
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Add a query option, returning new path
    #[inline]
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Check if path addresses exactly one object
    #[inline]
    #[must_use]
    pub fn is_instance(&self) -> bool {
        self.target == PathTarget::Instance
    }

    /// Require an instance path
    ///
    /// # Errors
    /// Returns `AddressError::NotAnInstance` for listing paths
    pub fn require_instance(&self) -> Result<&Self, AddressError> {
        if self.is_instance() {
            Ok(self)
        } else {
            Err(AddressError::NotAnInstance {
                class: self.leaf_class.clone(),
            })
        }
    }

    /// Relative URL: absolute path plus query string
    #[must_use]
    pub fn url(&self) -> String {
        if self.query.is_empty() {
            return self.absolute_path.clone();
        }
        let pairs: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!("{}?{}", self.absolute_path, pairs.join("&"))
    }
}

impl Display for ResolvedPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_listing_filter_becomes_query_target_filter() {
        let path = ResolvedPath::new(
            PathTarget::ClassListing,
            &[],
            "vzBrCP".into(),
            "eq(vzBrCP.name, \"C1\")".into(),
        );
        assert_eq!(
            path.url(),
            "api/class/vzBrCP.json?query-target-filter=eq(vzBrCP.name, \"C1\")"
        );
    }

    #[test]
    fn instance_path_has_no_query() {
        let path = ResolvedPath::new(
            PathTarget::Instance,
            &["infra/attentp-AEP1", "rsdomP-[uni/phys-D1]"],
            "infraRsDomP".into(),
            String::new(),
        );
        assert_eq!(
            path.url(),
            "api/mo/uni/infra/attentp-AEP1/rsdomP-[uni/phys-D1].json"
        );
        assert!(path.require_instance().is_ok());
    }

    #[test]
    fn with_query_appends_in_order() {
        let path = ResolvedPath::new(
            PathTarget::Instance,
            &["tn-T1"],
            "fvTenant".into(),
            String::new(),
        )
        .with_query("rsp-prop-include", "config-only");
        assert_eq!(path.url(), "api/mo/uni/tn-T1.json?rsp-prop-include=config-only");
    }

    #[test]
    fn listing_is_not_an_instance() {
        let path = ResolvedPath::new(
            PathTarget::ClassListing,
            &[],
            "vzBrCP".into(),
            String::new(),
        );
        assert!(matches!(
            path.require_instance(),
            Err(AddressError::NotAnInstance { .. })
        ));
    }
}
