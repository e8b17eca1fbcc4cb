//! Identity autofill from the national directory.
//!
//! One controller watches the form's lookup key. A held result (pending or
//! terminal) belongs to exactly one key; the moment the key changes, the
//! controller drops it and tells the wizard to clear the dependent fields,
//! before any new lookup can resolve.

use std::time::Duration;

use intake_gateway::{GatewayError, IdentityDirectory, IdentityRecord};
use serde::Serialize;

use crate::mask_key;

/// Attribute of an [`IdentityRecord`] that can fill a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityAttribute {
    FirstName,
    FirstSurname,
    SecondSurname,
    Phone,
    Email,
    BirthDate,
    Address,
}

impl IdentityAttribute {
    /// The attribute's value in `record`, when present and non-blank.
    pub fn read(&self, record: &IdentityRecord) -> Option<String> {
        let raw = match self {
            IdentityAttribute::FirstName => Some(record.first_name.as_str()),
            IdentityAttribute::FirstSurname => record.surnames.first().map(String::as_str),
            IdentityAttribute::SecondSurname => record.surnames.get(1).map(String::as_str),
            IdentityAttribute::Phone => record.phone.as_deref(),
            IdentityAttribute::Email => record.email.as_deref(),
            IdentityAttribute::BirthDate => record.birth_date.as_deref(),
            IdentityAttribute::Address => record.address.as_deref(),
        };
        raw.map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

/// Lookup state machine: `Idle → Pending → {Found, NotFound, Error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LookupStatus {
    Idle,
    Pending { key: String },
    Found { key: String },
    NotFound { key: String },
    Error { key: String },
}

impl LookupStatus {
    /// Key the held result belongs to.
    pub fn key(&self) -> Option<&str> {
        match self {
            LookupStatus::Idle => None,
            LookupStatus::Pending { key }
            | LookupStatus::Found { key }
            | LookupStatus::NotFound { key }
            | LookupStatus::Error { key } => Some(key),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, LookupStatus::Pending { .. })
    }
}

#[derive(Debug, Clone)]
pub struct LookupSettings {
    pub min_key_len: usize,
    pub timeout: Duration,
}

impl Default for LookupSettings {
    fn default() -> Self {
        LookupSettings {
            min_key_len: 9,
            timeout: Duration::from_secs(8),
        }
    }
}

/// A directory lookup issued for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTicket {
    pub key: String,
    pub generation: u64,
    pub timeout: Duration,
}

impl LookupTicket {
    pub async fn execute(
        &self,
        directory: &dyn IdentityDirectory,
    ) -> Result<Option<IdentityRecord>, GatewayError> {
        match tokio::time::timeout(self.timeout, directory.lookup(&self.key)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout {
                millis: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

/// What a key edit requires of the wizard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyChange {
    /// The held result was invalidated; dependents must be cleared.
    pub reset: bool,
    pub ticket: Option<LookupTicket>,
}

/// Outcome of applying a lookup answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResolution {
    Found(IdentityRecord),
    NotFound,
    Failed,
}

#[derive(Debug, Clone)]
pub struct AutofillController {
    settings: LookupSettings,
    status: LookupStatus,
    generation: u64,
}

impl AutofillController {
    pub fn new(settings: LookupSettings) -> Self {
        AutofillController {
            settings,
            status: LookupStatus::Idle,
            generation: 0,
        }
    }

    pub fn status(&self) -> &LookupStatus {
        &self.status
    }

    pub fn min_key_len(&self) -> usize {
        self.settings.min_key_len
    }

    /// True when `key` is long enough to be looked up.
    pub fn reaches_minimum(&self, key: &str) -> bool {
        key.trim().chars().count() >= self.settings.min_key_len
    }

    /// The key field changed to `key`.
    ///
    /// `valid` says whether the key passes its field rules. A lookup is
    /// issued once the key is valid and reaches the minimum length.
    pub fn on_key_change(&mut self, key: &str, valid: bool) -> KeyChange {
        let key = key.trim();
        let mut change = KeyChange::default();
        if let Some(held) = self.status.key() {
            if held == key {
                return change;
            }
            tracing::debug!(
                from = %mask_key(held),
                to = %mask_key(key),
                "lookup key changed, clearing autofilled fields"
            );
            self.status = LookupStatus::Idle;
            self.generation += 1;
            change.reset = true;
        }
        if valid && self.reaches_minimum(key) {
            change.ticket = Some(self.begin(key));
        }
        change
    }

    /// The key field lost focus. Retries after a failed lookup; never
    /// repeats a pending or answered one.
    pub fn on_key_blur(&mut self, key: &str, valid: bool) -> Option<LookupTicket> {
        let key = key.trim();
        if !valid || !self.reaches_minimum(key) {
            return None;
        }
        match &self.status {
            LookupStatus::Idle => Some(self.begin(key)),
            LookupStatus::Error { key: held } if held == key => Some(self.begin(key)),
            _ => None,
        }
    }

    fn begin(&mut self, key: &str) -> LookupTicket {
        self.generation += 1;
        self.status = LookupStatus::Pending {
            key: key.to_string(),
        };
        LookupTicket {
            key: key.to_string(),
            generation: self.generation,
            timeout: self.settings.timeout,
        }
    }

    /// Apply a lookup answer. `None` when the ticket is stale.
    pub fn complete(
        &mut self,
        ticket: &LookupTicket,
        result: Result<Option<IdentityRecord>, GatewayError>,
    ) -> Option<LookupResolution> {
        let pending_for_ticket =
            self.status.is_pending() && self.status.key() == Some(ticket.key.as_str());
        if ticket.generation != self.generation || !pending_for_ticket {
            tracing::debug!(key = %mask_key(&ticket.key), "discarding stale lookup response");
            return None;
        }

        let key = ticket.key.clone();
        let resolution = match result {
            Ok(Some(record)) => {
                self.status = LookupStatus::Found { key };
                LookupResolution::Found(record)
            }
            Ok(None) => {
                self.status = LookupStatus::NotFound { key };
                LookupResolution::NotFound
            }
            Err(err) => {
                tracing::warn!(
                    key = %mask_key(&ticket.key),
                    error = %err,
                    "identity lookup failed, fields stay editable"
                );
                self.status = LookupStatus::Error { key };
                LookupResolution::Failed
            }
        };
        Some(resolution)
    }

    pub fn reset(&mut self) {
        self.generation += 1;
        self.status = LookupStatus::Idle;
    }
}
