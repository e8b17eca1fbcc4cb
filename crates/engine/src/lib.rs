//! Wizard orchestration and validation engine for multi-step application forms.
//!
//! A [`Wizard`] walks an applicant through the steps of a [`FormSchema`]:
//! it validates fields as they change ([`rules`]), asks the remote registry
//! whether national ids and emails are already taken ([`uniqueness`]),
//! auto-fills identity fields from the national directory ([`autofill`]),
//! manages repeatable item lists ([`collection`]), gates forward navigation
//! ([`sequencer`]) and finally assembles and submits the application
//! ([`assemble`]).
//!
//! All remote work goes through the collaborator traits of `intake_gateway`.
//! The engine never blocks on them: operations hand out tickets, the caller
//! runs them, and the wizard drops any answer that no longer matches its
//! current state.

pub mod adapter;
pub mod assemble;
pub mod autofill;
pub mod collection;
pub mod config;
pub mod forms;
pub mod geo;
pub mod numeric;
pub mod predicate;
pub mod rules;
pub mod schema;
pub mod sequencer;
pub mod state;
pub mod types;
pub mod uniqueness;
pub mod wizard;

pub use assemble::{
    AttachmentError, AttachmentReport, SubmissionError, SubmissionOutcome, SubmissionPayload,
};
pub use autofill::{IdentityAttribute, LookupStatus, LookupTicket};
pub use collection::{Collection, CollectionError, CollectionKey, Collections, ItemId};
pub use config::{ConfigError, EngineConfig};
pub use geo::{GeoLevel, GeoLevels, OptionsTicket};
pub use rules::{Clock, FixedClock, RuleContext, SystemClock};
pub use schema::{FieldDefinition, FieldKind, FormSchema, Requirement, SchemaError};
pub use sequencer::{BlockedReason, Transition};
pub use state::ApplicationState;
pub use types::{FieldValue, FieldViolation, RuleViolation, ValueMap, WizardError};
pub use uniqueness::{ProbeTicket, TriggerPolicy, UniquenessStatus};
pub use wizard::{Effects, Wizard};

/// Redacted form of a national id or email for log lines.
///
/// Keeps the last two characters of an id, or the first character and the
/// domain of an email; everything else becomes `*`.
pub fn mask_key(key: &str) -> String {
    let key = key.trim();
    if let Some((local, domain)) = key.split_once('@') {
        let first: String = local.chars().take(1).collect();
        return format!("{}***@{}", first, domain);
    }
    let n = key.chars().count();
    if n <= 2 {
        return "*".repeat(n);
    }
    let tail: String = key.chars().skip(n - 2).collect();
    format!("{}{}", "*".repeat(n - 2), tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_masked_for_logs() {
        assert_eq!(mask_key("123456789"), "*******89");
        assert_eq!(mask_key("ana.mora@example.org"), "a***@example.org");
        assert_eq!(mask_key("7"), "*");
        assert_eq!(mask_key(""), "");
    }
}
