//! Value types and error taxonomy shared by every engine component.

pub mod items;
pub mod values;

use serde::Serialize;

pub use items::{Animal, AnimalDraft, ForageDraft, ForageEntry, WaterSource, WaterSourceDraft};
pub use values::{text_of, FieldValue, ValueMap};

// ──────────────────────────────────────────────
// Field-level violations
// ──────────────────────────────────────────────

/// Why a single field value is rejected.
///
/// Always returned as data, never raised: the `Display` impl is the
/// user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RuleViolation {
    #[error("this field is required")]
    Required,
    #[error("must be at least {min} characters")]
    TooShort { min: usize },
    #[error("must be at most {max} characters")]
    TooLong { max: usize },
    #[error("enter a valid email address")]
    InvalidEmail,
    #[error("national id must contain digits only")]
    InvalidNationalId,
    #[error("enter a valid phone number")]
    InvalidPhone,
    #[error("enter a number")]
    NotANumber,
    #[error("enter a whole number")]
    NotAWholeNumber,
    #[error("must be greater than zero")]
    NotPositive,
    #[error("must be between {min} and {max}")]
    OutOfRange { min: i64, max: i64 },
    #[error("enter a date as YYYY-MM-DD")]
    InvalidDate,
    #[error("date cannot be in the future")]
    FutureDate,
    #[error("applicant must be at least {min_years} years old")]
    Underage { min_years: u8 },
    #[error("must be accepted to continue")]
    MustAccept,
    #[error("choose one of the listed options")]
    UnknownOption,
    #[error("{message}")]
    Custom { message: String },
}

/// A violation tied to the field and step it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub step: usize,
    pub field: String,
    pub violation: RuleViolation,
}

// ──────────────────────────────────────────────
// Wizard misuse
// ──────────────────────────────────────────────

/// Errors from addressing the wizard with names or ids it does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("unknown attachment slot: {0}")]
    UnknownSlot(String),
    #[error("field '{0}' is not a uniqueness-checked field")]
    NotUniquenessField(String),
    #[error("form has no identity lookup")]
    NoLookup,
    #[error("form has no geographic hierarchy")]
    NoGeoHierarchy,
}
