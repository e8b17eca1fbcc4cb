//! Repeatable collection items and their editable drafts.
//!
//! A draft holds raw text exactly as typed; it only becomes an item after
//! validation in [`crate::collection`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One species line of the applicant's herd.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Animal {
    pub species: String,
    pub quantity: u32,
}

/// One forage plot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForageEntry {
    #[serde(rename = "type")]
    pub forage_type: String,
    pub variety: String,
    pub hectares: Decimal,
    #[serde(rename = "use")]
    pub usage: String,
}

/// One water source available on the property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaterSource {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimalDraft {
    #[serde(default)]
    pub species: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub quantity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForageDraft {
    #[serde(default, rename = "type")]
    pub forage_type: String,
    #[serde(default)]
    pub variety: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub hectares: String,
    #[serde(default, rename = "use")]
    pub usage: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaterSourceDraft {
    #[serde(default)]
    pub name: String,
}

impl AnimalDraft {
    pub fn new(species: impl Into<String>, quantity: impl Into<String>) -> Self {
        AnimalDraft {
            species: species.into(),
            quantity: quantity.into(),
        }
    }
}

impl ForageDraft {
    pub fn new(
        forage_type: impl Into<String>,
        variety: impl Into<String>,
        hectares: impl Into<String>,
        usage: impl Into<String>,
    ) -> Self {
        ForageDraft {
            forage_type: forage_type.into(),
            variety: variety.into(),
            hectares: hectares.into(),
            usage: usage.into(),
        }
    }
}

impl WaterSourceDraft {
    pub fn new(name: impl Into<String>) -> Self {
        WaterSourceDraft { name: name.into() }
    }
}

/// Accept either a JSON string or a JSON number for numeric draft fields.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}
