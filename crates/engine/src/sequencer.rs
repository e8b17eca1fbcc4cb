//! Step sequencing and the forward-navigation guard.
//!
//! The guard of a step is the conjunction of three checks: every field of
//! the step passes its rules (conditional requiredness included), no
//! uniqueness-checked field is a known duplicate or has an unanswered check
//! after the user touched it, and every required collection holds at least
//! one committed item. The guard is a pure function of the wizard state; it
//! reads today's date once through the [`RuleContext`] it is given.

use std::fmt;

use intake_gateway::ProbeKind;
use serde::Serialize;

use crate::collection::{CollectionKey, Collections};
use crate::rules::RuleContext;
use crate::schema::FormSchema;
use crate::state::ApplicationState;
use crate::types::RuleViolation;
use crate::uniqueness::{UniquenessChecker, UniquenessStatus};

/// Why a step cannot be left forwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockedReason {
    InvalidField {
        field: String,
        violation: RuleViolation,
    },
    Duplicate {
        field: String,
        kind: ProbeKind,
    },
    CheckPending {
        field: String,
    },
    EmptyCollection {
        collection: CollectionKey,
    },
}

impl fmt::Display for BlockedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockedReason::InvalidField { field, violation } => write!(f, "{}: {}", field, violation),
            BlockedReason::Duplicate { field, kind } => {
                write!(f, "{}: this {} is already registered", field, kind_label(*kind))
            }
            BlockedReason::CheckPending { field } => {
                write!(f, "{}: still checking availability", field)
            }
            BlockedReason::EmptyCollection { collection } => {
                write!(f, "{}: add at least one item", collection)
            }
        }
    }
}

fn kind_label(kind: ProbeKind) -> &'static str {
    match kind {
        ProbeKind::NationalId => "national id",
        ProbeKind::Email => "email",
    }
}

/// How strictly in-flight checks are judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardMode {
    /// Navigation: an unanswered check only blocks fields the user touched.
    Interactive,
    /// Final submission pass: every unanswered check blocks.
    Final,
}

/// Read-only view over everything the guard inspects.
pub struct StepGuard<'a> {
    pub schema: &'a FormSchema,
    pub state: &'a ApplicationState,
    pub collections: &'a Collections,
    pub uniqueness: &'a UniquenessChecker,
    pub ctx: RuleContext,
}

impl StepGuard<'_> {
    /// All reasons `step` is blocked, in field order. Empty means it may advance.
    pub fn evaluate(&self, step: usize, mode: GuardMode) -> Vec<BlockedReason> {
        let Some(def) = self.schema.step(step) else {
            return Vec::new();
        };
        let mut reasons = Vec::new();
        for name in &def.fields {
            if let Some(violation) = self.schema.validate_field(name, &self.state.values, &self.ctx) {
                reasons.push(BlockedReason::InvalidField {
                    field: name.to_string(),
                    violation,
                });
            }
            if let Some(kind) = self.uniqueness.kind(name) {
                match self.uniqueness.status(name) {
                    UniquenessStatus::Duplicate => reasons.push(BlockedReason::Duplicate {
                        field: name.to_string(),
                        kind,
                    }),
                    _ if self.uniqueness.is_pending(name)
                        && (mode == GuardMode::Final || self.state.is_touched(name)) =>
                    {
                        reasons.push(BlockedReason::CheckPending {
                            field: name.to_string(),
                        })
                    }
                    _ => {}
                }
            }
        }
        for spec in def.collections.iter().filter(|c| c.required) {
            if self.collections.is_empty(spec.key) {
                reasons.push(BlockedReason::EmptyCollection {
                    collection: spec.key,
                });
            }
        }
        reasons
    }

    pub fn can_advance(&self, step: usize) -> bool {
        self.evaluate(step, GuardMode::Interactive).is_empty()
    }

    /// First step (in order) that fails the final pass, with its reasons.
    pub fn first_blocked(&self) -> Option<(usize, Vec<BlockedReason>)> {
        self.schema.steps.iter().find_map(|s| {
            let reasons = self.evaluate(s.number, GuardMode::Final);
            (!reasons.is_empty()).then_some((s.number, reasons))
        })
    }
}

/// Result of asking to move forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transition {
    Advanced { from: usize, to: usize },
    Blocked { step: usize, reasons: Vec<BlockedReason> },
    /// The last step's guard holds; the application can be submitted.
    ReadyToSubmit,
}

/// Moves the step index of an [`ApplicationState`] within `1..=step_count`.
#[derive(Debug, Clone, Copy)]
pub struct StepSequencer {
    step_count: usize,
}

impl StepSequencer {
    pub fn new(step_count: usize) -> Self {
        StepSequencer { step_count }
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn is_last(&self, state: &ApplicationState) -> bool {
        state.step >= self.step_count
    }

    /// Try to advance given the guard's verdict for the current step.
    /// Marks the step as attempted either way.
    pub fn next(&self, state: &mut ApplicationState, reasons: Vec<BlockedReason>) -> Transition {
        let from = state.step;
        state.attempted.insert(from);
        if !reasons.is_empty() {
            tracing::debug!(step = from, blocked = reasons.len(), "step guard blocked");
            return Transition::Blocked {
                step: from,
                reasons,
            };
        }
        if self.is_last(state) {
            return Transition::ReadyToSubmit;
        }
        state.step = from + 1;
        tracing::debug!(from, to = state.step, "advanced");
        Transition::Advanced {
            from,
            to: state.step,
        }
    }

    /// Go back one step. Never validates; a no-op on step 1.
    pub fn prev(&self, state: &mut ApplicationState) -> usize {
        if state.step > 1 {
            state.step -= 1;
        }
        state.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueMap;

    #[test]
    fn blocked_next_marks_attempt_without_moving() {
        let seq = StepSequencer::new(3);
        let mut state = ApplicationState::new(ValueMap::new());
        let reasons = vec![BlockedReason::CheckPending {
            field: "email".into(),
        }];
        let t = seq.next(&mut state, reasons.clone());
        assert_eq!(t, Transition::Blocked { step: 1, reasons });
        assert_eq!(state.step, 1);
        assert!(state.attempted.contains(&1));
    }

    #[test]
    fn next_and_prev_stay_in_bounds() {
        let seq = StepSequencer::new(2);
        let mut state = ApplicationState::new(ValueMap::new());
        assert_eq!(seq.prev(&mut state), 1);
        assert_eq!(seq.next(&mut state, vec![]), Transition::Advanced { from: 1, to: 2 });
        assert_eq!(seq.next(&mut state, vec![]), Transition::ReadyToSubmit);
        assert_eq!(state.step, 2);
        assert_eq!(seq.prev(&mut state), 1);
    }

    #[test]
    fn unanswered_check_blocks_touched_fields_or_the_final_pass() {
        use crate::uniqueness::UniquenessSettings;
        use time::macros::date;

        let schema = crate::forms::membership();
        let mut state = ApplicationState::new(schema.defaults());
        let collections = Collections::default();
        let mut uniqueness = UniquenessChecker::new(UniquenessSettings::default());
        uniqueness.register("email", ProbeKind::Email, None);
        let _ticket = uniqueness.on_change("email", "ana@example.org", true);

        let pending = BlockedReason::CheckPending {
            field: "email".into(),
        };
        let ctx = RuleContext {
            today: date!(2026 - 10 - 19),
            min_age_years: 18,
        };
        let reasons = |state: &ApplicationState, mode| {
            StepGuard {
                schema: &schema,
                state,
                collections: &collections,
                uniqueness: &uniqueness,
                ctx,
            }
            .evaluate(1, mode)
        };
        assert!(!reasons(&state, GuardMode::Interactive).contains(&pending));
        assert!(reasons(&state, GuardMode::Final).contains(&pending));

        state.touched.insert("email".into());
        assert!(reasons(&state, GuardMode::Interactive).contains(&pending));
    }

    #[test]
    fn reasons_render_for_people() {
        let r = BlockedReason::Duplicate {
            field: "email".into(),
            kind: ProbeKind::Email,
        };
        assert_eq!(r.to_string(), "email: this email is already registered");
        let r = BlockedReason::EmptyCollection {
            collection: CollectionKey::Animals,
        };
        assert_eq!(r.to_string(), "animals: add at least one item");
    }
}
