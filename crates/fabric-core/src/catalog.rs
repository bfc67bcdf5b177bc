//! Object-type catalog
//!
//! Object types are declared as data: an address template chain plus a table
//! mapping caller options onto controller attributes. A caller's option record
//! is validated against its object type exactly once, here, and turned into an
//! [`Address`] and [`DesiredConfig`].
//!
//! ```yaml
//! object_types:
//!   - name: contract
//!     address:
//!       - { class: fvTenant, rn: "tn-{tenant}", key: tenant }
//!       - { class: vzBrCP, rn: "brc-{contract}", key: contract }
//!     fields:
//!       contract: { attribute: name, aliases: [contract_name] }
//!       scope: { attribute: scope, choices: [context, global], default: context }
//! ```

use crate::reconciler::{Mode, Operation, ReconcileRequest};
use fabric_address::{Address, AddressError, ClassNode};
use fabric_state::{AttrValue, DesiredConfig};
use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::Path;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid"));

/// Errors loading a catalog or binding options against it
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid catalog YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid catalog TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("object type '{0}' declared twice")]
    DuplicateObjectType(String),

    #[error("object type '{0}' has an empty address")]
    EmptyAddress(String),

    #[error("object type '{object_type}': template '{template}' references unknown option '{placeholder}'")]
    UnknownPlaceholder {
        object_type: String,
        template: String,
        placeholder: String,
    },

    #[error("object type '{object_type}': rn of {class} does not reference its key option '{key}'")]
    KeyNotInTemplate {
        object_type: String,
        class: String,
        key: String,
    },

    #[error("object type '{object_type}': option or alias '{option}' declared twice")]
    DuplicateOption { object_type: String, option: String },

    #[error("object type '{object_type}': default of '{option}' is not a scalar among its choices")]
    InvalidDefault { object_type: String, option: String },

    #[error("unknown object type '{0}'")]
    UnknownObjectType(String),

    #[error("object type '{object_type}' has no option '{option}'")]
    UnknownOption { object_type: String, option: String },

    #[error("option '{option}' given more than once (directly or through an alias)")]
    RepeatedOption { option: String },

    #[error("option '{option}' must be one of [{choices}], got '{value}'")]
    InvalidChoice {
        option: String,
        value: String,
        choices: String,
    },

    #[error("option '{option}' must be a string, number or boolean")]
    NonScalarOption { option: String },

    #[error("option '{option}' is required for state {mode}")]
    MissingOption { option: String, mode: Mode },

    #[error("invalid address: {0}")]
    Address(#[from] AddressError),
}

/// Declarative set of object types
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
    #[serde(default)]
    pub object_types: Vec<ObjectType>,
}

/// One object type: where it lives and which options configure it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tree levels, most general first; the last one is the configured object
    pub address: Vec<LevelSpec>,
    /// Option name → leaf attribute
    #[serde(default)]
    pub fields: IndexMap<String, FieldSpec>,
    /// Leaf attribute → template rendered from options
    #[serde(default)]
    pub derived: IndexMap<String, String>,
    #[serde(default)]
    pub children: Vec<ChildSpec>,
}

/// One address level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LevelSpec {
    pub class: String,
    /// Relative-name template, e.g. `tn-{tenant}`
    pub rn: String,
    /// Listing filter template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Option holding this level's identifying value
    pub key: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

/// Mapping of one caller option onto an attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub attribute: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    /// Applied in present mode when the option is unspecified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Option value → attribute value translation
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub values: IndexMap<String, String>,
}

/// Child object configured through the parent's options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChildSpec {
    pub class: String,
    /// Attribute naming the child among its siblings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    pub fields: IndexMap<String, FieldSpec>,
}

/// Validated address and desired configuration for one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub address: Address,
    pub operation: Operation,
}

impl Binding {
    #[inline]
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.operation.mode()
    }

    /// Desired configuration, in present mode
    #[inline]
    #[must_use]
    pub fn desired(&self) -> Option<&DesiredConfig> {
        self.operation.desired()
    }

    /// Engine request for this binding
    #[must_use]
    pub fn into_request(self, dry_run: bool) -> ReconcileRequest {
        ReconcileRequest {
            address: self.address,
            operation: self.operation,
            dry_run,
        }
    }
}

impl Catalog {
    /// Parse and validate a YAML catalog
    ///
    /// # Errors
    /// `CatalogError` on syntax or validation failure
    pub fn from_yaml(text: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_yaml::from_str(text)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse and validate a TOML catalog
    ///
    /// # Errors
    /// `CatalogError` on syntax or validation failure
    pub fn from_toml(text: &str) -> Result<Self, CatalogError> {
        let catalog: Self = toml::from_str(text)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog file; `.toml` files are TOML, anything else YAML
    ///
    /// # Errors
    /// `CatalogError` if the file cannot be read or is invalid
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if path.extension().is_some_and(|ext| ext == "toml") {
            Self::from_toml(&text)
        } else {
            Self::from_yaml(&text)
        }
    }

    /// Object type by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ObjectType> {
        self.object_types.iter().find(|t| t.name == name)
    }

    /// Declared object type names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.object_types.iter().map(|t| t.name.as_str())
    }

    /// Check every object type
    ///
    /// # Errors
    /// The first validation failure found
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = IndexSet::new();
        for object_type in &self.object_types {
            if !seen.insert(object_type.name.as_str()) {
                return Err(CatalogError::DuplicateObjectType(object_type.name.clone()));
            }
            object_type.validate()?;
        }
        Ok(())
    }

    /// Bind a caller's options against an object type
    ///
    /// # Errors
    /// - `UnknownObjectType`, `UnknownOption`, `RepeatedOption` for unrecognized input
    /// - `InvalidChoice` when a value is outside the declared choices
    /// - `MissingOption` when a key option is absent in present or absent mode
    /// - `Address` when the resulting address is malformed
    pub fn bind(
        &self,
        object_type: &str,
        mode: Mode,
        options: &IndexMap<String, JsonValue>,
    ) -> Result<Binding, CatalogError> {
        self.get(object_type)
            .ok_or_else(|| CatalogError::UnknownObjectType(object_type.to_string()))?
            .bind(mode, options)
    }
}

impl ObjectType {
    /// Every recognized option name (keys and fields)
    #[must_use]
    pub fn options(&self) -> IndexSet<&str> {
        let mut names: IndexSet<&str> = self.address.iter().map(|l| l.key.as_str()).collect();
        names.extend(self.field_specs().map(|(name, _)| name));
        names
    }

    fn field_specs(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields
            .iter()
            .chain(self.children.iter().flat_map(|c| c.fields.iter()))
            .map(|(name, field)| (name.as_str(), field))
    }

    /// (canonical option, alias) pairs across levels and fields
    fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        let level_aliases = self
            .address
            .iter()
            .flat_map(|l| l.aliases.iter().map(move |a| (l.key.as_str(), a.as_str())));
        let field_aliases = self
            .field_specs()
            .flat_map(|(name, f)| f.aliases.iter().map(move |a| (name, a.as_str())));
        level_aliases.chain(field_aliases)
    }

    fn field(&self, option: &str) -> Option<&FieldSpec> {
        self.field_specs().find(|(name, _)| *name == option).map(|(_, f)| f)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.address.is_empty() {
            return Err(CatalogError::EmptyAddress(self.name.clone()));
        }

        // Options and aliases share one namespace
        let keys: IndexSet<&str> = self.address.iter().map(|l| l.key.as_str()).collect();
        let mut declared: IndexSet<&str> = IndexSet::new();
        for (name, _) in self.field_specs() {
            if !declared.insert(name) {
                return Err(self.duplicate(name));
            }
        }
        declared.extend(keys.iter().copied());
        for (_, alias) in self.aliases() {
            if !declared.insert(alias) {
                return Err(self.duplicate(alias));
            }
        }

        for (name, field) in self.field_specs() {
            if field.default.as_ref().is_some_and(|d| !AttrValue::is_scalar(d)) {
                return Err(CatalogError::InvalidDefault {
                    object_type: self.name.clone(),
                    option: name.to_string(),
                });
            }
            if let (Some(default), false) = (&field.default, field.choices.is_empty()) {
                let text = AttrValue::from_json(default).map(|v| v.as_str().to_string());
                if !text.is_some_and(|t| field.choices.contains(&t)) {
                    return Err(CatalogError::InvalidDefault {
                        object_type: self.name.clone(),
                        option: name.to_string(),
                    });
                }
            }
        }

        let options = self.options();
        let templates = self
            .address
            .iter()
            .flat_map(|l| std::iter::once(&l.rn).chain(l.filter.as_ref()))
            .chain(self.derived.values());
        for template in templates {
            if let Some(placeholder) = placeholders(template).find(|p| !options.contains(p)) {
                return Err(CatalogError::UnknownPlaceholder {
                    object_type: self.name.clone(),
                    template: template.clone(),
                    placeholder: placeholder.to_string(),
                });
            }
        }

        for level in &self.address {
            if !placeholders(&level.rn).any(|p| p == level.key) {
                return Err(CatalogError::KeyNotInTemplate {
                    object_type: self.name.clone(),
                    class: level.class.clone(),
                    key: level.key.clone(),
                });
            }
        }
        Ok(())
    }

    fn duplicate(&self, option: &str) -> CatalogError {
        CatalogError::DuplicateOption {
            object_type: self.name.clone(),
            option: option.to_string(),
        }
    }

    /// Leaf class configured by this object type
    #[must_use]
    pub fn leaf_class(&self) -> &str {
        self.address.last().map_or("", |l| l.class.as_str())
    }

    /// Bind a caller's options against this object type
    ///
    /// # Errors
    /// See [`Catalog::bind`]
    pub fn bind(&self, mode: Mode, options: &IndexMap<String, JsonValue>) -> Result<Binding, CatalogError> {
        let supplied = self.canonical_options(options)?;
        let address = self.build_address(mode, &supplied)?;

        let operation = match mode {
            Mode::Present => Operation::Present(self.build_desired(&supplied)),
            Mode::Absent => Operation::Absent,
            Mode::Query => Operation::Query,
        };

        tracing::debug!("Bound {} options for {} ({})", supplied.len(), self.name, mode);
        Ok(Binding { address, operation })
    }

    /// Canonical option name → text, nulls dropped, choices enforced
    fn canonical_options(&self, options: &IndexMap<String, JsonValue>) -> Result<HashMap<String, String>, CatalogError> {
        let known = self.options();
        let mut out = HashMap::new();

        for (given, value) in options {
            let canonical = if known.contains(given.as_str()) {
                given.as_str()
            } else {
                self.aliases()
                    .find(|(_, alias)| *alias == given.as_str())
                    .map(|(name, _)| name)
                    .ok_or_else(|| CatalogError::UnknownOption {
                        object_type: self.name.clone(),
                        option: given.clone(),
                    })?
            };

            if !AttrValue::is_scalar(value) {
                return Err(CatalogError::NonScalarOption {
                    option: canonical.to_string(),
                });
            }
            let Some(text) = AttrValue::from_json(value) else {
                continue;
            };
            let text = text.as_str().to_string();

            if let Some(field) = self.field(canonical) {
                if !field.choices.is_empty() && !field.choices.contains(&text) {
                    return Err(CatalogError::InvalidChoice {
                        option: canonical.to_string(),
                        value: text,
                        choices: field.choices.join(", "),
                    });
                }
            }

            if out.insert(canonical.to_string(), text).is_some() {
                return Err(CatalogError::RepeatedOption {
                    option: canonical.to_string(),
                });
            }
        }
        Ok(out)
    }

    fn build_address(&self, mode: Mode, supplied: &HashMap<String, String>) -> Result<Address, CatalogError> {
        let mut nodes = Vec::with_capacity(self.address.len());
        for level in &self.address {
            let node = match supplied.get(&level.key) {
                Some(key) => {
                    let rn = render_required(&level.rn, supplied, mode)?;
                    let node = ClassNode::keyed(level.class.as_str(), rn, key.as_str())?;
                    with_rendered_filter(node, level.filter.as_deref(), supplied)
                }
                None if mode.requires_instance() => {
                    return Err(CatalogError::MissingOption {
                        option: level.key.clone(),
                        mode,
                    });
                }
                None => {
                    let node = ClassNode::unkeyed(level.class.as_str())?;
                    with_rendered_filter(node, level.filter.as_deref(), supplied)
                }
            };
            nodes.push(node);
        }
        Ok(Address::new(nodes)?)
    }

    fn build_desired(&self, supplied: &HashMap<String, String>) -> DesiredConfig {
        let mut desired = DesiredConfig::new(self.leaf_class());
        for (attribute, value) in resolve_fields(&self.fields, supplied) {
            desired = desired.set(attribute, value);
        }
        for (attribute, template) in &self.derived {
            if let Some(value) = render(template, supplied) {
                desired = desired.set(attribute.clone(), value);
            }
        }

        for child in &self.children {
            // A child is configured only when the caller names it
            let named = match &child.identity {
                Some(identity) => child
                    .fields
                    .iter()
                    .any(|(name, f)| &f.attribute == identity && supplied.contains_key(name)),
                None => child.fields.keys().any(|name| supplied.contains_key(name)),
            };
            if !named {
                continue;
            }

            let mut config = DesiredConfig::new(child.class.as_str());
            if let Some(identity) = &child.identity {
                config = config.with_identity(identity.as_str());
            }
            for (attribute, value) in resolve_fields(&child.fields, supplied) {
                config = config.set(attribute, value);
            }
            desired = desired.with_child(config);
        }
        desired
    }
}

/// Attribute values for a field table, defaults and value translation applied
fn resolve_fields(fields: &IndexMap<String, FieldSpec>, supplied: &HashMap<String, String>) -> Vec<(String, String)> {
    fields
        .iter()
        .filter_map(|(name, field)| {
            let text = match supplied.get(name) {
                Some(text) => text.clone(),
                None => field
                    .default
                    .as_ref()
                    .and_then(AttrValue::from_json)
                    .map(|v| v.as_str().to_string())?,
            };
            let value = field.values.get(&text).cloned().unwrap_or(text);
            Some((field.attribute.clone(), value))
        })
        .collect()
}

fn placeholders(template: &str) -> impl Iterator<Item = &str> {
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Render a template, or `None` if any placeholder is unsupplied
fn render(template: &str, supplied: &HashMap<String, String>) -> Option<String> {
    if placeholders(template).any(|p| !supplied.contains_key(p)) {
        return None;
    }
    let rendered = PLACEHOLDER.replace_all(template, |caps: &regex::Captures<'_>| {
        supplied.get(&caps[1]).cloned().unwrap_or_default()
    });
    Some(rendered.into_owned())
}

fn render_required(template: &str, supplied: &HashMap<String, String>, mode: Mode) -> Result<String, CatalogError> {
    render(template, supplied).ok_or_else(|| CatalogError::MissingOption {
        option: placeholders(template)
            .find(|p| !supplied.contains_key(*p))
            .unwrap_or_default()
            .to_string(),
        mode,
    })
}

fn with_rendered_filter(node: ClassNode, filter: Option<&str>, supplied: &HashMap<String, String>) -> ClassNode {
    match filter.and_then(|f| render(f, supplied)) {
        Some(filter) => node.with_filter(filter),
        None => node,
    }
}
