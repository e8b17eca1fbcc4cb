//! The mutable state of one application in progress.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{FieldValue, RuleViolation, ValueMap};

/// Everything the user has entered so far, plus per-field bookkeeping.
///
/// Owned by exactly one [`crate::wizard::Wizard`] and mutated only through
/// its operations. `errors` always reflects the latest validation of each
/// field; whether an error is *shown* depends on `touched` and on whether
/// advancing from the field's step has been attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationState {
    /// Current step, 1-based.
    pub step: usize,
    pub values: ValueMap,
    pub errors: BTreeMap<String, RuleViolation>,
    pub touched: BTreeSet<String>,
    /// Fields whose current value came from the identity directory.
    pub from_directory: BTreeSet<String>,
    /// Steps where the user tried to advance.
    pub attempted: BTreeSet<usize>,
}

impl ApplicationState {
    /// Fresh state on step 1 holding the schema defaults.
    pub fn new(defaults: ValueMap) -> Self {
        ApplicationState {
            step: 1,
            values: defaults,
            errors: BTreeMap::new(),
            touched: BTreeSet::new(),
            from_directory: BTreeSet::new(),
            attempted: BTreeSet::new(),
        }
    }

    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn error(&self, name: &str) -> Option<&RuleViolation> {
        self.errors.get(name)
    }

    pub fn is_touched(&self, name: &str) -> bool {
        self.touched.contains(name)
    }

    pub fn is_from_directory(&self, name: &str) -> bool {
        self.from_directory.contains(name)
    }

    /// Error to display for a field living on `step`.
    pub fn visible_error(&self, name: &str, step: usize) -> Option<&RuleViolation> {
        if self.touched.contains(name) || self.attempted.contains(&step) {
            self.errors.get(name)
        } else {
            None
        }
    }

    /// Record the result of validating one field.
    pub fn set_error(&mut self, name: &str, violation: Option<RuleViolation>) {
        match violation {
            Some(v) => {
                self.errors.insert(name.to_string(), v);
            }
            None => {
                self.errors.remove(name);
            }
        }
    }

    /// Forget everything about a field: value, error, touched and origin.
    pub fn clear_field(&mut self, name: &str) {
        self.values.remove(name);
        self.errors.remove(name);
        self.touched.remove(name);
        self.from_directory.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_stay_hidden_until_touched_or_attempted() {
        let mut state = ApplicationState::new(ValueMap::new());
        state.set_error("first_name", Some(RuleViolation::Required));
        assert_eq!(state.visible_error("first_name", 1), None);

        state.attempted.insert(1);
        assert_eq!(state.visible_error("first_name", 1), Some(&RuleViolation::Required));

        state.attempted.clear();
        state.touched.insert("first_name".into());
        assert_eq!(state.visible_error("first_name", 1), Some(&RuleViolation::Required));
    }

    #[test]
    fn clear_field_drops_all_bookkeeping() {
        let mut state = ApplicationState::new(ValueMap::new());
        state.values.insert("phone".into(), FieldValue::from("8888-1234"));
        state.touched.insert("phone".into());
        state.from_directory.insert("phone".into());
        state.set_error("phone", Some(RuleViolation::InvalidPhone));

        state.clear_field("phone");
        assert!(state.value("phone").is_none());
        assert!(state.error("phone").is_none());
        assert!(!state.is_touched("phone"));
        assert!(!state.is_from_directory("phone"));
    }
}
