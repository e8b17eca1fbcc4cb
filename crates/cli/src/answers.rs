//! Answers documents: the values a headless run types into the wizard.
//!
//! ```json
//! {
//!   "values": { "national_id": "123456789", "is_owner": true, "hours_per_week": 12 },
//!   "animals": [ { "species": "Vaca", "quantity": 3 } ],
//!   "forage": [ { "type": "Brachiaria", "hectares": "2.5" } ],
//!   "water_sources": [ { "name": "Pozo" } ],
//!   "attachments": { "id_document": { "path": "cedula.pdf", "content_type": "application/pdf" } }
//! }
//! ```
//!
//! Attachment paths are relative to the answers file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use intake_engine::collection::CollectionItem;
use intake_engine::types::{AnimalDraft, ForageDraft, WaterSourceDraft};
use intake_engine::{Collection, CollectionKey, Collections, FieldValue};
use intake_gateway::Attachment;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Answers {
    #[serde(default)]
    pub values: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub animals: Vec<AnimalDraft>,
    #[serde(default)]
    pub forage: Vec<ForageDraft>,
    #[serde(default)]
    pub water_sources: Vec<WaterSourceDraft>,
    #[serde(default)]
    pub attachments: BTreeMap<String, AttachmentRef>,
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct AttachmentRef {
    pub path: PathBuf,
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_content_type() -> String {
    "application/octet-stream".to_string()
}

impl Answers {
    pub fn load(path: &Path) -> Result<Answers, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("error reading answers '{}': {}", path.display(), e))?;
        let mut answers = Self::from_json_str(&content)
            .map_err(|e| format!("error parsing answers '{}': {}", path.display(), e))?;
        answers.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(answers)
    }

    pub fn from_json_str(content: &str) -> Result<Answers, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// The answer for a field, if one was given.
    pub fn value(&self, field: &str) -> Result<Option<FieldValue>, String> {
        match self.values.get(field) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(raw) => FieldValue::from_json(raw).map(Some).ok_or_else(|| {
                format!("answer for '{}' must be a string, number or boolean", field)
            }),
        }
    }

    /// Answered field names the form does not declare.
    pub fn unknown_fields<'a>(&'a self, known: &[&str]) -> Vec<&'a str> {
        self.values
            .keys()
            .map(String::as_str)
            .filter(|k| !known.contains(k))
            .collect()
    }

    /// Add the items of one collection. Stops at the first rejected item.
    pub fn add_items(&self, collections: &mut Collections, key: CollectionKey) -> Result<(), String> {
        match key {
            CollectionKey::Animals => add_all(&mut collections.animals, &self.animals),
            CollectionKey::Forage => add_all(&mut collections.forage, &self.forage),
            CollectionKey::WaterSources => {
                add_all(&mut collections.water_sources, &self.water_sources)
            }
        }
    }

    /// Read every referenced attachment from disk.
    pub fn read_attachments(&self) -> Result<Vec<(String, Attachment)>, String> {
        self.attachments
            .iter()
            .map(|(slot, r)| {
                let path = self.base_dir.join(&r.path);
                let bytes = std::fs::read(&path)
                    .map_err(|e| format!("error reading attachment '{}': {}", path.display(), e))?;
                let file_name = r
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| slot.clone());
                Ok((slot.clone(), Attachment::new(file_name, r.content_type.clone(), bytes)))
            })
            .collect()
    }
}

fn add_all<T: CollectionItem>(collection: &mut Collection<T>, drafts: &[T::Draft]) -> Result<(), String> {
    for (i, draft) in drafts.iter().enumerate() {
        collection
            .add(draft.clone())
            .map_err(|e| format!("{} item {}: {}", collection.key(), i + 1, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_and_booleans_become_field_values() {
        let answers = Answers::from_json_str(
            r#"{ "values": { "hours_per_week": 12, "has_vehicle": true, "note": null } }"#,
        )
        .unwrap();
        assert_eq!(answers.value("hours_per_week").unwrap(), Some(FieldValue::from("12")));
        assert_eq!(answers.value("has_vehicle").unwrap(), Some(FieldValue::Bool(true)));
        assert_eq!(answers.value("note").unwrap(), None);
        assert_eq!(answers.value("missing").unwrap(), None);
    }

    #[test]
    fn nested_values_are_rejected() {
        let answers = Answers::from_json_str(r#"{ "values": { "email": ["a@b.c"] } }"#).unwrap();
        assert!(answers.value("email").is_err());
    }

    #[test]
    fn duplicate_items_name_the_collection() {
        let answers = Answers::from_json_str(
            r#"{ "animals": [ { "species": "Vaca", "quantity": 3 }, { "species": "vaca", "quantity": 1 } ] }"#,
        )
        .unwrap();
        let mut collections = Collections::default();
        let err = answers
            .add_items(&mut collections, CollectionKey::Animals)
            .unwrap_err();
        assert!(err.starts_with("animals item 2"), "{err}");
        assert_eq!(collections.animals.total_herd(), 3);
    }

    #[test]
    fn unknown_sections_are_errors() {
        assert!(Answers::from_json_str(r#"{ "cattle": [] }"#).is_err());
    }

    #[test]
    fn unknown_field_names_are_reported() {
        let answers =
            Answers::from_json_str(r#"{ "values": { "email": "a@b.c", "fax": "1" } }"#).unwrap();
        assert_eq!(answers.unknown_fields(&["email"]), vec!["fax"]);
    }
}
