//! Volunteer registration.

use crate::predicate::Predicate;
use crate::rules::phone_digits;
use crate::schema::{FieldDefinition, FieldKind, FormSchema, StepDefinition};
use crate::types::{text_of, RuleViolation, ValueMap};

use super::{applicant_fields, identity_lookup, APPLICANT_FIELDS};

pub const AREAS_OF_INTEREST: &[&str] = &["field_support", "training", "events", "administration"];

/// The emergency contact cannot be the applicant's own number.
fn differs_from_applicant_phone(text: &str, values: &ValueMap) -> Option<RuleViolation> {
    let own = text_of(values, "phone").map(phone_digits)?;
    (own == phone_digits(text)).then(|| RuleViolation::Custom {
        message: "must differ from your own phone".to_string(),
    })
}

pub fn volunteer() -> FormSchema {
    let mut fields = applicant_fields();
    fields.extend([
        FieldDefinition::new(
            "area_of_interest",
            "Area of interest",
            FieldKind::Choice(AREAS_OF_INTEREST),
        )
        .required(),
        FieldDefinition::new(
            "hours_per_week",
            "Hours per week",
            FieldKind::Integer { min: 1, max: 40 },
        )
        .required(),
        FieldDefinition::new("has_vehicle", "Has a vehicle", FieldKind::Flag { must_accept: false })
            .required()
            .default_value(false),
        FieldDefinition::new("license_number", "Driver's license", FieldKind::Text)
            .required_when(Predicate::IsTrue("has_vehicle"))
            .max_length(20),
        FieldDefinition::new("emergency_contact_name", "Emergency contact", FieldKind::Text)
            .required()
            .max_length(100),
        FieldDefinition::new(
            "emergency_contact_phone",
            "Emergency contact phone",
            FieldKind::Phone,
        )
        .required()
        .check(differs_from_applicant_phone),
        FieldDefinition::new(
            "accepts_terms",
            "I accept the volunteer code of conduct",
            FieldKind::Flag { must_accept: true },
        )
        .required(),
    ]);

    FormSchema {
        name: "volunteer",
        title: "Volunteer registration",
        fields,
        steps: vec![
            StepDefinition::new(1, "Applicant", APPLICANT_FIELDS.to_vec()),
            StepDefinition::new(
                2,
                "Availability",
                vec!["area_of_interest", "hours_per_week", "has_vehicle", "license_number"],
            ),
            StepDefinition::new(
                3,
                "Emergency contact",
                vec!["emergency_contact_name", "emergency_contact_phone", "accepts_terms"],
            ),
        ],
        lookup: Some(identity_lookup()),
        geo: None,
        attachment_slots: Vec::new(),
    }
}
