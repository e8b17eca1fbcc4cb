//! Predicates over sibling field values.
//!
//! Conditional requiredness ("owner phone is required when the applicant is
//! not the owner") is expressed as a small predicate tree evaluated against
//! the full value map. Each predicate can also report the fields it reads, so
//! the wizard knows which dependents to re-validate when one of them changes.

use std::fmt;

use crate::types::{text_of, ValueMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// The field holds boolean `true`. Unset reads as neither true nor false.
    IsTrue(&'static str),
    /// The field holds boolean `false`.
    IsFalse(&'static str),
    /// The field's trimmed text equals the literal (case-insensitive).
    Equals(&'static str, &'static str),
    /// The field has a non-blank value.
    Filled(&'static str),
    Not(Box<Predicate>),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    pub fn not(inner: Predicate) -> Predicate {
        Predicate::Not(Box::new(inner))
    }

    /// Evaluate against the current values. Pure and total.
    pub fn eval(&self, values: &ValueMap) -> bool {
        match self {
            Predicate::IsTrue(field) => values.get(*field).and_then(|v| v.as_bool()) == Some(true),
            Predicate::IsFalse(field) => {
                values.get(*field).and_then(|v| v.as_bool()) == Some(false)
            }
            Predicate::Equals(field, literal) => {
                text_of(values, field).is_some_and(|t| t.eq_ignore_ascii_case(literal))
            }
            Predicate::Filled(field) => values.get(*field).is_some_and(|v| !v.is_blank()),
            Predicate::Not(inner) => !inner.eval(values),
            Predicate::All(preds) => preds.iter().all(|p| p.eval(values)),
            Predicate::Any(preds) => preds.iter().any(|p| p.eval(values)),
        }
    }

    /// Every field name this predicate reads, in first-seen order.
    pub fn references(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references(&self, out: &mut Vec<&'static str>) {
        match self {
            Predicate::IsTrue(f)
            | Predicate::IsFalse(f)
            | Predicate::Equals(f, _)
            | Predicate::Filled(f) => {
                if !out.contains(f) {
                    out.push(f);
                }
            }
            Predicate::Not(inner) => inner.collect_references(out),
            Predicate::All(preds) | Predicate::Any(preds) => {
                for p in preds {
                    p.collect_references(out);
                }
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::IsTrue(field) => write!(f, "{} is true", field),
            Predicate::IsFalse(field) => write!(f, "{} is false", field),
            Predicate::Equals(field, literal) => write!(f, "{} = '{}'", field, literal),
            Predicate::Filled(field) => write!(f, "{} is filled", field),
            Predicate::Not(inner) => write!(f, "not ({})", inner),
            Predicate::All(preds) => join(f, preds, " and "),
            Predicate::Any(preds) => join(f, preds, " or "),
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, preds: &[Predicate], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, p) in preds.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", p)?;
    }
    f.write_str(")")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldValue;

    fn values(pairs: &[(&str, FieldValue)]) -> ValueMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn is_false_ignores_unset_fields() {
        let empty = ValueMap::new();
        assert!(!Predicate::IsFalse("is_owner").eval(&empty));
        assert!(!Predicate::IsTrue("is_owner").eval(&empty));

        let v = values(&[("is_owner", FieldValue::Bool(false))]);
        assert!(Predicate::IsFalse("is_owner").eval(&v));
    }

    #[test]
    fn equals_is_trimmed_and_case_insensitive() {
        let v = values(&[("production_type", FieldValue::from(" Dairy "))]);
        assert!(Predicate::Equals("production_type", "dairy").eval(&v));
        assert!(!Predicate::Equals("production_type", "beef").eval(&v));
    }

    #[test]
    fn combinators() {
        let v = values(&[
            ("has_vehicle", FieldValue::Bool(true)),
            ("license_number", FieldValue::from("")),
        ]);
        let p = Predicate::All(vec![
            Predicate::IsTrue("has_vehicle"),
            Predicate::not(Predicate::Filled("license_number")),
        ]);
        assert!(p.eval(&v));
        assert!(Predicate::Any(vec![Predicate::IsFalse("has_vehicle"), p.clone()]).eval(&v));
    }

    #[test]
    fn references_are_deduplicated() {
        let p = Predicate::Any(vec![
            Predicate::IsFalse("is_owner"),
            Predicate::not(Predicate::Filled("is_owner")),
            Predicate::IsTrue("lives_on_property"),
        ]);
        assert_eq!(p.references(), vec!["is_owner", "lives_on_property"]);
    }

    #[test]
    fn display_reads_like_a_condition() {
        let p = Predicate::All(vec![
            Predicate::IsFalse("is_owner"),
            Predicate::not(Predicate::Filled("owner_name")),
        ]);
        assert_eq!(p.to_string(), "(is_owner is false and not (owner_name is filled))");
    }
}
