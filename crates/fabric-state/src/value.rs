//! Attribute values as the controller sees them
//!
//! The controller represents every attribute as text, so comparison happens
//! on a canonical string form rather than on JSON types.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};

/// One attribute value in wire (text) form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttrValue(String);

impl AttrValue {
    /// Create from wire text
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Convert a scalar JSON value to wire text
    ///
    /// Returns `None` for `null`: an unspecified value is never "set to empty".
    /// Arrays and objects have no attribute form and also yield `None`;
    /// callers accepting untrusted input check [`AttrValue::is_scalar`] first.
    #[must_use]
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(s) => Some(Self(s.clone())),
            JsonValue::Bool(true) => Some(Self("yes".to_string())),
            JsonValue::Bool(false) => Some(Self("no".to_string())),
            JsonValue::Number(n) => Some(Self(n.to_string())),
            JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
        }
    }

    /// Check if a JSON value can become an attribute (`null` included)
    #[inline]
    #[must_use]
    pub fn is_scalar(value: &JsonValue) -> bool {
        !matches!(value, JsonValue::Array(_) | JsonValue::Object(_))
    }

    /// Wire text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical comparison form
    ///
    /// Boolean-looking text folds to `yes`/`no`, numeric-looking text folds to
    /// its shortest decimal form. Everything else compares verbatim.
    #[must_use]
    pub fn canonical(&self) -> Cow<'_, str> {
        let text = self.0.as_str();

        match text.to_ascii_lowercase().as_str() {
            "true" | "yes" => return Cow::Borrowed("yes"),
            "false" | "no" => return Cow::Borrowed("no"),
            _ => {}
        }

        canonical_number(text).map_or(Cow::Borrowed(text), Cow::Owned)
    }

    /// Equality under the controller's value rule
    #[inline]
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }

    /// JSON string value for payloads
    #[inline]
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        JsonValue::String(self.0.clone())
    }
}

impl Display for AttrValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        Self(if b { "yes" } else { "no" }.to_string())
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

/// Exact decimal text for numeric-looking input
///
/// Works on the digits themselves: sign of zero, leading and trailing zeros
/// and exponent notation fold together, and no value loses precision.
fn canonical_number(text: &str) -> Option<String> {
    let (negative, unsigned) = match text.as_bytes().first().copied()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(at) => (&unsigned[..at], Some(&unsigned[at + 1..])),
        None => (unsigned, None),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));

    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part) {
        return None;
    }
    let exponent = match exponent {
        None => 0,
        Some(exp) => {
            let digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            if digits.is_empty() || digits.len() > 9 || !all_digits(digits) {
                return None;
            }
            exp.parse::<i64>().ok()?
        }
    };

    // Significant digits and the position of the decimal point within them
    let digits = format!("{int_part}{frac_part}");
    let leading = digits.len() - digits.trim_start_matches('0').len();
    let significant = digits.trim_matches('0');
    if significant.is_empty() {
        return Some("0".to_string());
    }
    let point = i64::try_from(int_part.len()).ok()? - i64::try_from(leading).ok()? + exponent;
    let len = i64::try_from(significant.len()).ok()?;

    let body = if point > 64 || point < -64 {
        let (first, rest) = significant.split_at(1);
        let exp = point - 1;
        if rest.is_empty() {
            format!("{first}e{exp}")
        } else {
            format!("{first}.{rest}e{exp}")
        }
    } else if point <= 0 {
        format!("0.{}{significant}", "0".repeat(usize::try_from(-point).ok()?))
    } else if point >= len {
        format!("{significant}{}", "0".repeat(usize::try_from(point - len).ok()?))
    } else {
        let (whole, fraction) = significant.split_at(usize::try_from(point).ok()?);
        format!("{whole}.{fraction}")
    };

    Some(if negative { format!("-{body}") } else { body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_is_unspecified() {
        assert!(AttrValue::from_json(&JsonValue::Null).is_none());
    }

    #[test]
    fn json_scalars_become_text() {
        assert_eq!(AttrValue::from_json(&json!("x")).unwrap().as_str(), "x");
        assert_eq!(AttrValue::from_json(&json!(42)).unwrap().as_str(), "42");
        assert_eq!(AttrValue::from_json(&json!(true)).unwrap().as_str(), "yes");
        assert_eq!(AttrValue::from_json(&json!(false)).unwrap().as_str(), "no");
    }

    #[test]
    fn boolean_looking_values_fold() {
        assert!(AttrValue::new("true").matches(&AttrValue::new("yes")));
        assert!(AttrValue::new("No").matches(&AttrValue::from(false)));
        assert!(!AttrValue::new("yes").matches(&AttrValue::new("no")));
    }

    #[test]
    fn numeric_looking_values_fold() {
        assert!(AttrValue::new("01").matches(&AttrValue::new("1")));
        assert!(AttrValue::new("1.0").matches(&AttrValue::from(1_i64)));
        assert!(AttrValue::new("1.5").matches(&AttrValue::new("1.50")));
        assert!(!AttrValue::new("1").matches(&AttrValue::new("2")));
    }

    #[test]
    fn text_is_compared_verbatim() {
        assert!(!AttrValue::new("AF11").matches(&AttrValue::new("af11")));
        assert!(!AttrValue::new("inf").matches(&AttrValue::new("infinity")));
        assert_eq!(AttrValue::new("level1").canonical(), "level1");
    }

    #[test]
    fn large_numbers_keep_every_digit() {
        let a = AttrValue::new("18446744073709551617");
        let b = AttrValue::new("18446744073709551616");
        assert!(!a.matches(&b));
        assert_eq!(a.canonical(), "18446744073709551617");
        assert!(!AttrValue::new("1.00000000000000001").matches(&AttrValue::new("1")));
        assert!(AttrValue::new("1.000000000000000010").matches(&AttrValue::new("1.00000000000000001")));
    }

    #[test]
    fn zero_and_exponent_forms_fold_exactly() {
        assert_eq!(AttrValue::new("-0").canonical(), "0");
        assert_eq!(AttrValue::new("000.000").canonical(), "0");
        assert_eq!(AttrValue::new("1.").canonical(), "1");
        assert_eq!(AttrValue::new(".50").canonical(), "0.5");
        assert_eq!(AttrValue::new("+7").canonical(), "7");
        assert_eq!(AttrValue::new("-0012.3400").canonical(), "-12.34");
        assert!(AttrValue::new("1e3").matches(&AttrValue::new("1000")));
        assert!(AttrValue::new("12.5E-1").matches(&AttrValue::new("1.25")));
        assert!(AttrValue::new("1e100").matches(&AttrValue::new("10e99")));
        assert!(!AttrValue::new("1e100").matches(&AttrValue::new("1e101")));
    }

    #[test]
    fn malformed_numbers_compare_verbatim() {
        for text in ["1-2", "e5", ".", "1e", "1.2.3", "--1", "1e+"] {
            assert_eq!(AttrValue::new(text).canonical(), text);
        }
    }

    #[test]
    fn structured_json_has_no_attribute_form() {
        assert!(AttrValue::from_json(&json!({"a": 1})).is_none());
        assert!(AttrValue::from_json(&json!([1, 2])).is_none());
        assert!(!AttrValue::is_scalar(&json!({"a": 1})));
        assert!(AttrValue::is_scalar(&JsonValue::Null));
        assert!(AttrValue::is_scalar(&json!(3)));
    }
}
