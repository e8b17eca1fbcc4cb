//! Built-in application forms.
//!
//! Both forms open with the same applicant block, keyed by the national id
//! that drives the identity directory lookup.

mod membership;
mod volunteer;

use intake_gateway::ProbeKind;

use crate::autofill::IdentityAttribute;
use crate::schema::{FieldDefinition, FieldKind, FormSchema, LookupBinding};

pub use membership::membership;
pub use volunteer::volunteer;

/// Names accepted by [`by_name`], in display order.
pub const NAMES: &[&str] = &["membership", "volunteer"];

/// Resolve a built-in form by name.
pub fn by_name(name: &str) -> Option<FormSchema> {
    match name {
        "membership" => Some(membership()),
        "volunteer" => Some(volunteer()),
        _ => None,
    }
}

pub fn catalog() -> Vec<FormSchema> {
    NAMES.iter().filter_map(|n| by_name(n)).collect()
}

const APPLICANT_FIELDS: [&str; 8] = [
    "national_id",
    "first_name",
    "first_surname",
    "second_surname",
    "birth_date",
    "phone",
    "email",
    "address",
];

fn applicant_fields() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::new("national_id", "National ID", FieldKind::NationalId)
            .required()
            .min_length(9)
            .max_length(12)
            .unique(ProbeKind::NationalId),
        FieldDefinition::new("first_name", "First name", FieldKind::Text)
            .required()
            .max_length(60),
        FieldDefinition::new("first_surname", "First surname", FieldKind::Text)
            .required()
            .max_length(60),
        FieldDefinition::new("second_surname", "Second surname", FieldKind::Text).max_length(60),
        FieldDefinition::new("birth_date", "Date of birth", FieldKind::BirthDate).required(),
        FieldDefinition::new("phone", "Phone", FieldKind::Phone).required(),
        FieldDefinition::new("email", "Email", FieldKind::Email)
            .required()
            .max_length(120)
            .unique(ProbeKind::Email),
        FieldDefinition::new("address", "Address", FieldKind::Text).max_length(200),
    ]
}

fn identity_lookup() -> LookupBinding {
    LookupBinding {
        key_field: "national_id",
        dependents: vec![
            (IdentityAttribute::FirstName, "first_name"),
            (IdentityAttribute::FirstSurname, "first_surname"),
            (IdentityAttribute::SecondSurname, "second_surname"),
            (IdentityAttribute::BirthDate, "birth_date"),
            (IdentityAttribute::Phone, "phone"),
            (IdentityAttribute::Email, "email"),
            (IdentityAttribute::Address, "address"),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_forms_are_consistent() {
        for schema in catalog() {
            assert_eq!(schema.check(), Ok(()), "form {}", schema.name);
        }
        assert_eq!(catalog().len(), NAMES.len());
    }

    #[test]
    fn unknown_form_names_resolve_to_none() {
        assert!(by_name("membership").is_some());
        assert!(by_name("Membership").is_none());
    }
}
