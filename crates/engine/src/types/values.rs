//! Raw field values as entered by the user.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Value of a single form field, as captured from the input widget.
///
/// Everything textual (names, numbers, dates, choices) stays text until a
/// rule coerces it; only checkboxes carry a native boolean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
}

/// All values of one application, keyed by field name.
pub type ValueMap = BTreeMap<String, FieldValue>;

impl FieldValue {
    /// True for text that is empty after trimming. Booleans are never blank.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Bool(_) => false,
            FieldValue::Text(s) => s.trim().is_empty(),
        }
    }

    /// The text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            FieldValue::Bool(_) => None,
        }
    }

    /// Boolean reading of the value. Checkbox widgets that report text are
    /// accepted as `"true"`/`"false"` (also `"si"`/`"no"`).
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Text(s) => match s.trim().to_lowercase().as_str() {
                "true" | "si" | "sí" | "yes" => Some(true),
                "false" | "no" => Some(false),
                _ => None,
            },
        }
    }

    /// Build a value from an answers-file JSON node.
    ///
    /// Numbers are kept as their textual representation so they run
    /// through the same coercion path as keyboard input.
    pub fn from_json(value: &serde_json::Value) -> Option<FieldValue> {
        match value {
            serde_json::Value::Bool(b) => Some(FieldValue::Bool(*b)),
            serde_json::Value::String(s) => Some(FieldValue::Text(s.clone())),
            serde_json::Value::Number(n) => Some(FieldValue::Text(n.to_string())),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// Trimmed text of a field, `None` when absent or blank.
pub fn text_of<'a>(values: &'a ValueMap, name: &str) -> Option<&'a str> {
    values
        .get(name)
        .and_then(|v| v.as_text())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_detection() {
        assert!(FieldValue::from("   ").is_blank());
        assert!(!FieldValue::from(" x ").is_blank());
        assert!(!FieldValue::from(false).is_blank());
    }

    #[test]
    fn textual_booleans() {
        assert_eq!(FieldValue::from("Si").as_bool(), Some(true));
        assert_eq!(FieldValue::from("false").as_bool(), Some(false));
        assert_eq!(FieldValue::from("maybe").as_bool(), None);
    }

    #[test]
    fn json_numbers_become_text() {
        let v = FieldValue::from_json(&serde_json::json!(12)).unwrap();
        assert_eq!(v, FieldValue::from("12"));
        assert_eq!(FieldValue::from_json(&serde_json::json!(null)), None);
    }
}
