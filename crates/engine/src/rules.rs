//! Field rule engine.
//!
//! `validate` maps one field definition, its raw value, and all sibling
//! values to an optional [`RuleViolation`]. It is pure and synchronous so it
//! can run on every keystroke. The only time-dependent input, today's date,
//! is passed in through [`RuleContext`] and read from a [`Clock`] once per
//! validation pass.

use std::sync::OnceLock;

use regex::Regex;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime};

use crate::numeric;
use crate::schema::{FieldDefinition, FieldKind};
use crate::types::{FieldValue, RuleViolation, ValueMap};

/// Adult age used when the configuration does not say otherwise.
pub const DEFAULT_MIN_AGE_YEARS: u8 = 18;

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$";

// ──────────────────────────────────────────────
// Clock
// ──────────────────────────────────────────────

/// Source of "today" for age rules.
pub trait Clock: Send + Sync {
    fn today(&self) -> Date;
}

/// Wall clock, UTC calendar date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> Date {
        OffsetDateTime::now_utc().date()
    }
}

/// A clock pinned to one date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Date);

impl Clock for FixedClock {
    fn today(&self) -> Date {
        self.0
    }
}

// ──────────────────────────────────────────────
// Context
// ──────────────────────────────────────────────

/// Per-pass inputs that are not field values.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext {
    pub today: Date,
    pub min_age_years: u8,
}

impl RuleContext {
    /// Snapshot the clock for one validation pass.
    pub fn from_clock(clock: &dyn Clock, min_age_years: u8) -> Self {
        RuleContext {
            today: clock.today(),
            min_age_years,
        }
    }
}

// ──────────────────────────────────────────────
// Validation
// ──────────────────────────────────────────────

/// Validate one field.
///
/// `value` is the field's own value (absent when never entered); `values`
/// is the full map so conditional requiredness and cross-field checks can
/// look at siblings.
pub fn validate(
    def: &FieldDefinition,
    value: Option<&FieldValue>,
    values: &ValueMap,
    ctx: &RuleContext,
) -> Option<RuleViolation> {
    let value = match value {
        Some(v) if !v.is_blank() => v,
        _ => {
            return if def.requirement.is_required(values) {
                Some(RuleViolation::Required)
            } else {
                None
            };
        }
    };

    if let FieldKind::Flag { must_accept } = def.kind {
        return match value.as_bool() {
            Some(false) if must_accept => Some(RuleViolation::MustAccept),
            Some(_) => None,
            None => Some(RuleViolation::UnknownOption),
        };
    }

    let text = match value {
        FieldValue::Text(s) => s.trim(),
        FieldValue::Bool(_) => return Some(RuleViolation::UnknownOption),
    };

    let len = text.chars().count();
    if let Some(min) = def.min_length {
        if len < min {
            return Some(RuleViolation::TooShort { min });
        }
    }
    if let Some(max) = def.max_length {
        if len > max {
            return Some(RuleViolation::TooLong { max });
        }
    }

    if let Some(violation) = check_kind(&def.kind, text, ctx) {
        return Some(violation);
    }

    def.check.and_then(|check| check(text, values))
}

fn check_kind(kind: &FieldKind, text: &str, ctx: &RuleContext) -> Option<RuleViolation> {
    match kind {
        FieldKind::Text | FieldKind::GeoArea | FieldKind::Flag { .. } => None,
        FieldKind::NationalId => {
            (!text.chars().all(|c| c.is_ascii_digit())).then_some(RuleViolation::InvalidNationalId)
        }
        FieldKind::Email => (!is_email(text)).then_some(RuleViolation::InvalidEmail),
        FieldKind::Phone => (!is_phone(text)).then_some(RuleViolation::InvalidPhone),
        FieldKind::BirthDate => check_birth_date(text, ctx),
        FieldKind::Integer { min, max } => numeric::parse_integer(text, *min, *max).err(),
        FieldKind::PositiveDecimal => numeric::parse_positive_decimal(text).err(),
        FieldKind::Choice(options) => {
            let chosen = text.to_lowercase();
            (!options.iter().any(|o| *o == chosen)).then_some(RuleViolation::UnknownOption)
        }
    }
}

/// Well-formed email address.
pub fn is_email(text: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EMAIL_PATTERN).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(text.trim()))
}

/// 8 to 15 digits, optionally with a leading `+` and spaces, dashes or parentheses.
pub fn is_phone(text: &str) -> bool {
    let body = text.trim();
    let body = body.strip_prefix('+').unwrap_or(body);
    if !body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')'))
    {
        return false;
    }
    let digits = body.chars().filter(|c| c.is_ascii_digit()).count();
    (8..=15).contains(&digits)
}

/// Digits of a phone number without separators, for comparisons.
pub fn phone_digits(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Parse an ISO 8601 calendar date (`YYYY-MM-DD`).
pub fn parse_date(text: &str) -> Option<Date> {
    Date::parse(text.trim(), format_description!("[year]-[month]-[day]")).ok()
}

fn check_birth_date(text: &str, ctx: &RuleContext) -> Option<RuleViolation> {
    let birth = match parse_date(text) {
        Some(d) => d,
        None => return Some(RuleViolation::InvalidDate),
    };
    if birth > ctx.today {
        return Some(RuleViolation::FutureDate);
    }
    if birth > age_cutoff(ctx.today, ctx.min_age_years) {
        return Some(RuleViolation::Underage {
            min_years: ctx.min_age_years,
        });
    }
    None
}

/// Latest birth date that is at least `years` old on `today`.
///
/// When `today` is Feb 29 and the target year is not a leap year the
/// cutoff is Feb 28, so a Feb 29 birthday comes of age on Mar 1.
pub fn age_cutoff(today: Date, years: u8) -> Date {
    let year = today.year() - i32::from(years);
    today.replace_year(year).unwrap_or_else(|_| {
        Date::from_calendar_date(year, Month::February, 28).unwrap_or(Date::MIN)
    })
}
