//! Submission assembly.
//!
//! Turns the state of a finished wizard into one immutable JSON payload and
//! hands it to the collaborators: first the submission store, then (as a
//! separate, non-fatal call keyed by the receipt) the attachment store.
//!
//! Payload shape:
//!
//! ```json
//! {
//!   "form": "membership",
//!   "values": { "national_id": "123456789", "is_owner": true, ... },
//!   "animals": [ { "species": "Vaca", "quantity": 3 } ],
//!   "water_sources": [ { "name": "Pozo" } ],
//!   "total_herd": 3,
//!   "attachments": ["id_document"]
//! }
//! ```
//!
//! Blank optional fields, conditional fields whose condition does not hold,
//! and empty optional collections are left out. The SHA-256 of the compact
//! JSON (object keys sorted) is the payload fingerprint and doubles as the
//! idempotency key.

use std::collections::BTreeMap;

use intake_gateway::{Attachment, AttachmentAck, AttachmentStore, GatewayError, Receipt, SubmissionStore};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::collection::{CollectionKey, Collections};
use crate::numeric;
use crate::schema::{FieldDefinition, FieldKind, FormSchema, Requirement};
use crate::sequencer::{BlockedReason, StepGuard};
use crate::types::{FieldValue, ValueMap};

// ──────────────────────────────────────────────
// Errors and outcomes
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("submission is only possible from the last step (on step {step} of {last})")]
    NotFinalStep { step: usize, last: usize },

    #[error("step {step} is incomplete: {}", list(.reasons))]
    Incomplete {
        step: usize,
        reasons: Vec<BlockedReason>,
    },

    #[error("could not store the application: {0}")]
    Store(#[source] GatewayError),
}

fn list(reasons: &[BlockedReason]) -> String {
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Attachments could not be stored. The application itself was created.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("attachments for {receipt_id} were not stored: {source}")]
pub struct AttachmentError {
    pub receipt_id: String,
    #[source]
    pub source: GatewayError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentReport {
    /// Nothing was attached, so no upload was made.
    Skipped,
    Uploaded(AttachmentAck),
    Failed(AttachmentError),
}

/// Terminal success of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub receipt: Receipt,
    pub fingerprint: String,
    pub attachments: AttachmentReport,
}

/// Immutable snapshot handed to the submission store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionPayload {
    pub form: &'static str,
    pub body: Value,
    pub fingerprint: String,
}

// ──────────────────────────────────────────────
// Assembly
// ──────────────────────────────────────────────

/// Run the final full pass and build the payload.
///
/// Every step is checked in order, ignoring which fields were touched; the
/// first failing step is reported.
pub fn assemble_payload(
    guard: &StepGuard<'_>,
    attachment_slots: &[String],
) -> Result<SubmissionPayload, SubmissionError> {
    if let Some((step, reasons)) = guard.first_blocked() {
        return Err(SubmissionError::Incomplete { step, reasons });
    }
    let schema = guard.schema;
    let body = build_body(schema, &guard.state.values, guard.collections, attachment_slots);
    let fingerprint = fingerprint(&body);
    Ok(SubmissionPayload {
        form: schema.name,
        body,
        fingerprint,
    })
}

fn build_body(
    schema: &FormSchema,
    values: &ValueMap,
    collections: &Collections,
    attachment_slots: &[String],
) -> Value {
    let mut fields = Map::new();
    for step in &schema.steps {
        for name in &step.fields {
            let Some(def) = schema.field(name) else {
                continue;
            };
            if let Some(v) = field_json(def, values) {
                fields.insert(name.to_string(), v);
            }
        }
    }

    let mut body = Map::new();
    body.insert("form".into(), Value::String(schema.name.to_string()));
    body.insert("values".into(), Value::Object(fields));

    for spec in schema.steps.iter().flat_map(|s| s.collections.iter()) {
        if !spec.required && collections.is_empty(spec.key) {
            continue;
        }
        body.insert(spec.key.as_str().into(), collections.to_json(spec.key));
        match spec.key {
            CollectionKey::Animals => {
                body.insert("total_herd".into(), Value::from(collections.animals.total_herd()));
            }
            CollectionKey::Forage => {
                body.insert(
                    "total_hectares".into(),
                    Value::String(collections.forage.total_hectares().to_string()),
                );
            }
            CollectionKey::WaterSources => {}
        }
    }

    if !attachment_slots.is_empty() {
        body.insert(
            "attachments".into(),
            Value::Array(attachment_slots.iter().cloned().map(Value::String).collect()),
        );
    }
    Value::Object(body)
}

/// JSON for one field, or `None` when it does not belong in the payload.
fn field_json(def: &FieldDefinition, values: &ValueMap) -> Option<Value> {
    let value = values.get(def.name).filter(|v| !v.is_blank())?;
    if let Requirement::When(p) = &def.requirement {
        if !p.eval(values) {
            return None;
        }
    }
    let text = match value {
        FieldValue::Bool(b) => return Some(Value::Bool(*b)),
        FieldValue::Text(s) => s.trim(),
    };
    let json = match &def.kind {
        FieldKind::Flag { .. } => Value::Bool(value.as_bool()?),
        FieldKind::Integer { min, max } => Value::from(numeric::parse_integer(text, *min, *max).ok()?),
        FieldKind::PositiveDecimal => {
            Value::String(numeric::parse_positive_decimal(text).ok()?.to_string())
        }
        FieldKind::Choice(_) | FieldKind::Email => Value::String(text.to_lowercase()),
        _ => Value::String(text.to_string()),
    };
    Some(json)
}

/// Hex SHA-256 of the compact JSON encoding.
pub fn fingerprint(body: &Value) -> String {
    let canonical = body.to_string();
    format!("{:x}", Sha256::digest(canonical.as_bytes()))
}

// ──────────────────────────────────────────────
// Submission
// ──────────────────────────────────────────────

/// Create the application, then upload attachments keyed by its receipt.
///
/// Only the create call can fail the submission. Upload failures are
/// reported in the outcome and logged.
pub async fn submit(
    payload: &SubmissionPayload,
    attachments: &BTreeMap<String, Attachment>,
    store: &dyn SubmissionStore,
    files: &dyn AttachmentStore,
) -> Result<SubmissionOutcome, SubmissionError> {
    let receipt = store
        .create(&payload.body, &payload.fingerprint)
        .await
        .map_err(|e| {
            tracing::warn!(form = payload.form, error = %e, "submission failed");
            SubmissionError::Store(e)
        })?;
    tracing::info!(form = payload.form, receipt = %receipt.id, "application submitted");

    let report = if attachments.is_empty() {
        AttachmentReport::Skipped
    } else {
        match files.upload(&receipt.id, attachments).await {
            Ok(ack) => AttachmentReport::Uploaded(ack),
            Err(source) => {
                tracing::warn!(receipt = %receipt.id, error = %source, "attachment upload failed");
                AttachmentReport::Failed(AttachmentError {
                    receipt_id: receipt.id.clone(),
                    source,
                })
            }
        }
    };

    Ok(SubmissionOutcome {
        receipt,
        fingerprint: payload.fingerprint.clone(),
        attachments: report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Predicate;

    #[test]
    fn fingerprint_ignores_insertion_order() {
        let a = serde_json::json!({"b": 1, "a": [1, 2]});
        let mut m = Map::new();
        m.insert("a".into(), serde_json::json!([1, 2]));
        m.insert("b".into(), serde_json::json!(1));
        assert_eq!(fingerprint(&a), fingerprint(&Value::Object(m)));
        assert_eq!(fingerprint(&a).len(), 64);
    }

    #[test]
    fn field_values_are_typed_by_kind() {
        let mut values = ValueMap::new();
        values.insert("hours".into(), FieldValue::from(" 12 "));
        values.insert("km".into(), FieldValue::from("2,50"));
        values.insert("email".into(), FieldValue::from("Ana@Example.org"));
        values.insert("terms".into(), FieldValue::from("si"));

        let hours = FieldDefinition::new("hours", "Hours", FieldKind::Integer { min: 1, max: 40 });
        let km = FieldDefinition::new("km", "Km", FieldKind::PositiveDecimal);
        let email = FieldDefinition::new("email", "Email", FieldKind::Email);
        let terms = FieldDefinition::new("terms", "Terms", FieldKind::Flag { must_accept: true });

        assert_eq!(field_json(&hours, &values), Some(serde_json::json!(12)));
        assert_eq!(field_json(&km, &values), Some(serde_json::json!("2.5")));
        assert_eq!(field_json(&email, &values), Some(serde_json::json!("ana@example.org")));
        assert_eq!(field_json(&terms, &values), Some(serde_json::json!(true)));
    }

    #[test]
    fn inapplicable_conditional_fields_are_dropped() {
        let owner = FieldDefinition::new("owner_name", "Owner", FieldKind::Text)
            .required_when(Predicate::IsFalse("is_owner"));
        let mut values = ValueMap::new();
        values.insert("owner_name".into(), FieldValue::from("Luis"));
        values.insert("is_owner".into(), FieldValue::Bool(true));
        assert_eq!(field_json(&owner, &values), None);

        values.insert("is_owner".into(), FieldValue::Bool(false));
        assert_eq!(field_json(&owner, &values), Some(serde_json::json!("Luis")));
    }

    #[test]
    fn blank_optional_fields_are_dropped() {
        let address = FieldDefinition::new("address", "Address", FieldKind::Text);
        let mut values = ValueMap::new();
        values.insert("address".into(), FieldValue::from("  "));
        assert_eq!(field_json(&address, &values), None);
    }
}
