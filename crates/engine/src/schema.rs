//! Statically declared form schemas.
//!
//! A [`FormSchema`] is the field-definition table of one application form:
//! every field carries its own kind (which selects the built-in validator),
//! its requiredness (possibly conditional), length limits, defaults and
//! whether it is checked for uniqueness. Steps list the fields and
//! collections they own. Schemas are built once by the functions in
//! [`crate::forms`] and checked for internal consistency with
//! [`FormSchema::check`] before a wizard accepts them.

use std::collections::{BTreeMap, BTreeSet};

use intake_gateway::ProbeKind;

use crate::autofill::IdentityAttribute;
use crate::collection::CollectionKey;
use crate::geo::GeoLevels;
use crate::predicate::Predicate;
use crate::rules::{self, RuleContext};
use crate::types::{FieldValue, FieldViolation, RuleViolation, ValueMap};

/// Cross-field validator run after the built-in rules pass.
pub type CrossCheck = fn(&str, &ValueMap) -> Option<RuleViolation>;

// ──────────────────────────────────────────────
// Fields
// ──────────────────────────────────────────────

/// Input kind; selects the built-in validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    NationalId,
    Email,
    Phone,
    /// ISO date subject to the configured minimum age.
    BirthDate,
    Integer { min: i64, max: i64 },
    PositiveDecimal,
    Flag { must_accept: bool },
    Choice(&'static [&'static str]),
    /// Id of a node of the geographic hierarchy.
    GeoArea,
}

/// When a field must be filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Always,
    Optional,
    /// Required only while the predicate over sibling fields holds.
    When(Predicate),
}

impl Requirement {
    pub fn is_required(&self, values: &ValueMap) -> bool {
        match self {
            Requirement::Always => true,
            Requirement::Optional => false,
            Requirement::When(p) => p.eval(values),
        }
    }

    /// True for requirements that can flip with sibling values.
    pub fn is_conditional(&self) -> bool {
        matches!(self, Requirement::When(_))
    }
}

/// Declarative description of one field.
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub requirement: Requirement,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub default: Option<FieldValue>,
    /// Quiet period before an on-change uniqueness probe; falls back to config.
    pub debounce_ms: Option<u64>,
    pub uniqueness: Option<ProbeKind>,
    pub check: Option<CrossCheck>,
}

impl FieldDefinition {
    /// New optional field without limits.
    pub fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        FieldDefinition {
            name,
            label,
            kind,
            requirement: Requirement::Optional,
            min_length: None,
            max_length: None,
            default: None,
            debounce_ms: None,
            uniqueness: None,
            check: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.requirement = Requirement::Always;
        self
    }

    pub fn required_when(mut self, predicate: Predicate) -> Self {
        self.requirement = Requirement::When(predicate);
        self
    }

    pub fn min_length(mut self, n: usize) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        self.max_length = Some(n);
        self
    }

    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = Some(ms);
        self
    }

    /// Check this field's value against the remote registry.
    pub fn unique(mut self, kind: ProbeKind) -> Self {
        self.uniqueness = Some(kind);
        self
    }

    pub fn check(mut self, check: CrossCheck) -> Self {
        self.check = Some(check);
        self
    }
}

// ──────────────────────────────────────────────
// Steps and bindings
// ──────────────────────────────────────────────

/// A collection owned by a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSpec {
    pub key: CollectionKey,
    /// Needs at least one committed item to pass the step guard.
    pub required: bool,
}

/// One wizard step (numbered from 1).
#[derive(Debug, Clone)]
pub struct StepDefinition {
    pub number: usize,
    pub title: &'static str,
    pub fields: Vec<&'static str>,
    pub collections: Vec<CollectionSpec>,
}

impl StepDefinition {
    pub fn new(number: usize, title: &'static str, fields: Vec<&'static str>) -> Self {
        StepDefinition {
            number,
            title,
            fields,
            collections: Vec::new(),
        }
    }

    pub fn collection(mut self, key: CollectionKey, required: bool) -> Self {
        self.collections.push(CollectionSpec { key, required });
        self
    }
}

/// Binds a lookup key field to the fields its directory record fills.
#[derive(Debug, Clone)]
pub struct LookupBinding {
    pub key_field: &'static str,
    pub dependents: Vec<(IdentityAttribute, &'static str)>,
}

impl LookupBinding {
    pub fn dependent_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.dependents.iter().map(|(_, f)| *f)
    }
}

// ──────────────────────────────────────────────
// Schema
// ──────────────────────────────────────────────

/// Internal inconsistencies found by [`FormSchema::check`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("form '{form}' has no steps")]
    NoSteps { form: String },
    #[error("field '{0}' is declared more than once")]
    DuplicateField(String),
    #[error("step {expected} is missing or out of order (found {found})")]
    StepNumbering { expected: usize, found: usize },
    #[error("step {step} lists unknown field '{field}'")]
    UnknownStepField { step: usize, field: String },
    #[error("field '{0}' is not placed in any step")]
    FieldWithoutStep(String),
    #[error("field '{0}' is placed in more than one step")]
    FieldInSeveralSteps(String),
    #[error("collection '{0}' is placed in more than one step")]
    DuplicateCollection(String),
    #[error("requirement of '{field}' reads unknown field '{reference}'")]
    UnknownPredicateField { field: String, reference: String },
    #[error("binding refers to unknown field '{0}'")]
    UnknownBindingField(String),
    #[error("attachment slot '{0}' is declared more than once")]
    DuplicateSlot(String),
}

/// The complete, immutable definition of one application form.
#[derive(Debug, Clone)]
pub struct FormSchema {
    pub name: &'static str,
    pub title: &'static str,
    pub fields: Vec<FieldDefinition>,
    pub steps: Vec<StepDefinition>,
    pub lookup: Option<LookupBinding>,
    pub geo: Option<GeoLevels>,
    pub attachment_slots: Vec<&'static str>,
}

impl FormSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn step(&self, number: usize) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.number == number)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Step number that owns the field.
    pub fn step_of(&self, field: &str) -> Option<usize> {
        self.steps
            .iter()
            .find(|s| s.fields.iter().any(|f| *f == field))
            .map(|s| s.number)
    }

    /// Fields whose requirement predicate reads `name`.
    pub fn dependents_of(&self, name: &str) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| match &f.requirement {
                Requirement::When(p) => p.references().contains(&name),
                _ => false,
            })
            .map(|f| f.name)
            .collect()
    }

    /// Fields that must be re-validated after `name` changes: the field
    /// itself, conditional dependents, and fields with cross checks.
    pub fn revalidation_set(&self, name: &str) -> Vec<&'static str> {
        let mut out: Vec<&'static str> = Vec::new();
        if let Some(def) = self.field(name) {
            out.push(def.name);
        }
        for dep in self.dependents_of(name) {
            if !out.contains(&dep) {
                out.push(dep);
            }
        }
        for def in self.fields.iter().filter(|f| f.check.is_some()) {
            if !out.contains(&def.name) {
                out.push(def.name);
            }
        }
        out
    }

    /// Initial values for a fresh application.
    pub fn defaults(&self) -> ValueMap {
        self.fields
            .iter()
            .filter_map(|f| f.default.clone().map(|v| (f.name.to_string(), v)))
            .collect()
    }

    /// Validate one field by name. Unknown names are never invalid.
    pub fn validate_field(
        &self,
        name: &str,
        values: &ValueMap,
        ctx: &RuleContext,
    ) -> Option<RuleViolation> {
        let def = self.field(name)?;
        rules::validate(def, values.get(name), values, ctx)
    }

    /// Validate every field of the form, in step order.
    pub fn validate_all(&self, values: &ValueMap, ctx: &RuleContext) -> Vec<FieldViolation> {
        let mut out = Vec::new();
        for step in &self.steps {
            for name in &step.fields {
                if let Some(violation) = self.validate_field(name, values, ctx) {
                    out.push(FieldViolation {
                        step: step.number,
                        field: name.to_string(),
                        violation,
                    });
                }
            }
        }
        out
    }

    /// Check the schema for internal consistency.
    pub fn check(&self) -> Result<(), SchemaError> {
        if self.steps.is_empty() {
            return Err(SchemaError::NoSteps {
                form: self.name.to_string(),
            });
        }

        let mut names = BTreeSet::new();
        for f in &self.fields {
            if !names.insert(f.name) {
                return Err(SchemaError::DuplicateField(f.name.to_string()));
            }
        }

        let mut placement: BTreeMap<&str, usize> = BTreeMap::new();
        let mut collections = BTreeSet::new();
        for (i, step) in self.steps.iter().enumerate() {
            if step.number != i + 1 {
                return Err(SchemaError::StepNumbering {
                    expected: i + 1,
                    found: step.number,
                });
            }
            for field in &step.fields {
                if !names.contains(field) {
                    return Err(SchemaError::UnknownStepField {
                        step: step.number,
                        field: field.to_string(),
                    });
                }
                if placement.insert(*field, step.number).is_some() {
                    return Err(SchemaError::FieldInSeveralSteps(field.to_string()));
                }
            }
            for c in &step.collections {
                if !collections.insert(c.key) {
                    return Err(SchemaError::DuplicateCollection(c.key.as_str().to_string()));
                }
            }
        }
        if let Some(orphan) = self.fields.iter().find(|f| !placement.contains_key(f.name)) {
            return Err(SchemaError::FieldWithoutStep(orphan.name.to_string()));
        }

        for f in &self.fields {
            if let Requirement::When(p) = &f.requirement {
                if let Some(unknown) = p.references().into_iter().find(|r| !names.contains(r)) {
                    return Err(SchemaError::UnknownPredicateField {
                        field: f.name.to_string(),
                        reference: unknown.to_string(),
                    });
                }
            }
        }

        let mut bound: Vec<&'static str> = Vec::new();
        if let Some(lookup) = &self.lookup {
            bound.push(lookup.key_field);
            bound.extend(lookup.dependent_fields());
        }
        if let Some(geo) = &self.geo {
            bound.extend(geo.fields());
        }
        if let Some(unknown) = bound.into_iter().find(|b| !names.contains(b)) {
            return Err(SchemaError::UnknownBindingField(unknown.to_string()));
        }

        let mut slots = BTreeSet::new();
        for slot in &self.attachment_slots {
            if !slots.insert(slot) {
                return Err(SchemaError::DuplicateSlot(slot.to_string()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> FormSchema {
        FormSchema {
            name: "tiny",
            title: "Tiny",
            fields: vec![
                FieldDefinition::new("is_owner", "Owner?", FieldKind::Flag { must_accept: false })
                    .required()
                    .default_value(true),
                FieldDefinition::new("owner_name", "Owner name", FieldKind::Text)
                    .required_when(Predicate::IsFalse("is_owner")),
            ],
            steps: vec![StepDefinition::new(1, "Only", vec!["is_owner", "owner_name"])],
            lookup: None,
            geo: None,
            attachment_slots: vec![],
        }
    }

    #[test]
    fn consistent_schema_passes() {
        assert_eq!(tiny().check(), Ok(()));
    }

    #[test]
    fn defaults_come_from_definitions() {
        let d = tiny().defaults();
        assert_eq!(d.get("is_owner"), Some(&FieldValue::Bool(true)));
        assert!(!d.contains_key("owner_name"));
    }

    #[test]
    fn dependents_follow_predicates() {
        let s = tiny();
        assert_eq!(s.dependents_of("is_owner"), vec!["owner_name"]);
        assert_eq!(s.revalidation_set("is_owner"), vec!["is_owner", "owner_name"]);
    }

    #[test]
    fn unknown_predicate_reference_rejected() {
        let mut s = tiny();
        s.fields[1].requirement = Requirement::When(Predicate::IsFalse("is_tenant"));
        assert_eq!(
            s.check(),
            Err(SchemaError::UnknownPredicateField {
                field: "owner_name".into(),
                reference: "is_tenant".into()
            })
        );
    }

    #[test]
    fn orphan_and_duplicate_fields_rejected() {
        let mut s = tiny();
        s.steps[0].fields.pop();
        assert_eq!(s.check(), Err(SchemaError::FieldWithoutStep("owner_name".into())));

        let mut s = tiny();
        s.fields.push(FieldDefinition::new("is_owner", "again", FieldKind::Text));
        assert_eq!(s.check(), Err(SchemaError::DuplicateField("is_owner".into())));
    }

    #[test]
    fn step_numbers_must_be_contiguous() {
        let mut s = tiny();
        s.steps[0].number = 2;
        assert_eq!(
            s.check(),
            Err(SchemaError::StepNumbering {
                expected: 1,
                found: 2
            })
        );
    }
}
