//! Controller wire format
//!
//! Reads arrive as `{"imdata": [{"<Class>": {"attributes": {..}, "children": [..]}}], "totalCount": "<n>"}`.
//! Writes carry one class wrapped around its attributes and children.

use crate::object::ManagedObject;
use crate::value::AttrValue;
use crate::WireError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Class name the controller uses for error records
pub const ERROR_CLASS: &str = "error";

/// Parsed read response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResponse {
    /// Objects in `imdata`, in controller order
    pub objects: Vec<ManagedObject>,
    /// Reported `totalCount`, if present
    pub total_count: Option<usize>,
}

impl ReadResponse {
    /// Parse a read response body
    ///
    /// # Errors
    /// - `WireError::InvalidJson` if the body is not JSON
    /// - `WireError::MissingImdata` if there is no `imdata` array
    /// - `WireError::Fault` if the controller answered with an error record
    /// - `WireError::InvalidObject` if an entry is not a single-class object
    pub fn parse(body: &str) -> Result<Self, WireError> {
        let value: JsonValue = serde_json::from_str(body)?;
        Self::from_json(&value)
    }

    /// Parse an already decoded read response
    ///
    /// # Errors
    /// See [`ReadResponse::parse`]
    pub fn from_json(value: &JsonValue) -> Result<Self, WireError> {
        let imdata = value
            .get("imdata")
            .and_then(JsonValue::as_array)
            .ok_or(WireError::MissingImdata)?;

        if let Some(fault) = ControllerFault::from_imdata(imdata) {
            return Err(WireError::Fault(fault));
        }

        let objects = imdata
            .iter()
            .map(decode_object)
            .collect::<Result<Vec<_>, _>>()?;

        let total_count = value.get("totalCount").and_then(|c| match c {
            JsonValue::String(s) => s.parse().ok(),
            JsonValue::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
            _ => None,
        });

        Ok(Self {
            objects,
            total_count,
        })
    }
}

/// Error record returned by the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerFault {
    /// Controller error code
    pub code: String,
    /// Human-readable text
    pub text: String,
}

impl ControllerFault {
    /// Extract fault from a raw response body, if it carries one
    #[must_use]
    pub fn from_body(body: &str) -> Option<Self> {
        let value: JsonValue = serde_json::from_str(body).ok()?;
        let imdata = value.get("imdata")?.as_array()?;
        Self::from_imdata(imdata)
    }

    fn from_imdata(imdata: &[JsonValue]) -> Option<Self> {
        let attributes = imdata
            .first()?
            .get(ERROR_CLASS)?
            .get("attributes")?;
        let field = |name: &str| {
            attributes
                .get(name)
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Some(Self {
            code: field("code"),
            text: field("text"),
        })
    }
}

impl std::fmt::Display for ControllerFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "controller error {}: {}", self.code, self.text)
    }
}

/// Decode one `{"<Class>": {...}}` entry
///
/// # Errors
/// Returns `WireError::InvalidObject` if the entry is malformed
pub fn decode_object(entry: &JsonValue) -> Result<ManagedObject, WireError> {
    let map = entry
        .as_object()
        .ok_or_else(|| WireError::InvalidObject("entry is not an object".to_string()))?;

    let mut iter = map.iter();
    let (class_name, body) = match (iter.next(), iter.next()) {
        (Some(pair), None) => pair,
        _ => {
            return Err(WireError::InvalidObject(format!(
                "entry must hold exactly one class, found {}",
                map.len()
            )))
        }
    };

    let mut object = ManagedObject::new(class_name.clone());

    if let Some(attributes) = body.get("attributes") {
        let attributes = attributes.as_object().ok_or_else(|| {
            WireError::InvalidObject(format!("attributes of '{class_name}' are not an object"))
        })?;
        for (name, value) in attributes {
            if let Some(value) = AttrValue::from_json(value) {
                object.attributes.insert(name.clone(), value);
            }
        }
    }

    if let Some(children) = body.get("children") {
        let children = children.as_array().ok_or_else(|| {
            WireError::InvalidObject(format!("children of '{class_name}' are not an array"))
        })?;
        object.children = children
            .iter()
            .map(decode_object)
            .collect::<Result<_, _>>()?;
    }

    Ok(object)
}

/// Encode object as a write payload
#[must_use]
pub fn encode_object(object: &ManagedObject) -> JsonValue {
    let attributes: Map<String, JsonValue> = object
        .attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();

    let mut body = Map::new();
    body.insert("attributes".to_string(), JsonValue::Object(attributes));
    if !object.children.is_empty() {
        body.insert(
            "children".to_string(),
            JsonValue::Array(object.children.iter().map(encode_object).collect()),
        );
    }

    let mut wrapper = Map::new();
    wrapper.insert(object.class_name.clone(), JsonValue::Object(body));
    JsonValue::Object(wrapper)
}

/// Encode objects as a read response (used by fakes and fixtures)
#[must_use]
pub fn encode_read_response(objects: &[ManagedObject]) -> JsonValue {
    let mut map = Map::new();
    map.insert(
        "totalCount".to_string(),
        JsonValue::String(objects.len().to_string()),
    );
    map.insert(
        "imdata".to_string(),
        JsonValue::Array(objects.iter().map(encode_object).collect()),
    );
    JsonValue::Object(map)
}

/// Encode a controller error record
#[must_use]
pub fn encode_fault(fault: &ControllerFault) -> JsonValue {
    serde_json::json!({
        "totalCount": "1",
        "imdata": [{ ERROR_CLASS: { "attributes": { "code": fault.code, "text": fault.text } } }]
    })
}
