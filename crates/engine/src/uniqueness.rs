//! Remote uniqueness checks for national ids and emails.
//!
//! Every edit of a checked field bumps that field's generation. A probe is
//! described by a [`ProbeTicket`] carrying the key and the generation it was
//! issued for; the wizard only lets the ticket start, and only applies its
//! answer, while that generation is still current and the field still holds
//! the same key. Older answers are dropped, so the last key typed always wins.
//!
//! Failures fail open: a transport error or timeout leaves the status
//! `Unknown`, which never blocks the user.

use std::collections::BTreeMap;
use std::time::Duration;

use intake_gateway::{GatewayError, ProbeKind, UniquenessProbe};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::mask_key;

/// When probes fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPolicy {
    /// Only when the field loses focus.
    OnBlur,
    /// On blur, and also on change after a quiet period.
    #[default]
    Debounced,
}

/// Result of the latest applied probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UniquenessStatus {
    /// Never checked, superseded, or the check failed.
    #[default]
    Unknown,
    Available,
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct UniquenessSettings {
    pub trigger: TriggerPolicy,
    pub debounce: Duration,
    pub timeout: Duration,
    /// National ids shorter than this are never probed.
    pub national_id_min_len: usize,
}

impl Default for UniquenessSettings {
    fn default() -> Self {
        UniquenessSettings {
            trigger: TriggerPolicy::Debounced,
            debounce: Duration::from_millis(400),
            timeout: Duration::from_secs(8),
            national_id_min_len: 9,
        }
    }
}

#[derive(Debug, Clone)]
struct FieldCheck {
    kind: ProbeKind,
    debounce: Duration,
    status: UniquenessStatus,
    /// Key that produced `status`.
    resolved_key: Option<String>,
    last_requested: Option<String>,
    loading: bool,
    /// A ticket for the current generation is out and has not been answered.
    pending: bool,
    generation: u64,
}

/// A probe waiting to be started.
///
/// Holds no borrow of the wizard; the async half only needs a
/// [`UniquenessProbe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTicket {
    pub field: &'static str,
    pub kind: ProbeKind,
    /// Normalised key to ask about.
    pub key: String,
    pub generation: u64,
    pub ready_at: Instant,
    pub timeout: Duration,
}

impl ProbeTicket {
    /// Sleep until the quiet period has elapsed. Returns at once for blur tickets.
    pub async fn wait_quiet(&self) {
        tokio::time::sleep_until(self.ready_at).await;
    }

    /// Ask the registry, bounded by the ticket's timeout.
    pub async fn execute(&self, probe: &dyn UniquenessProbe) -> Result<bool, GatewayError> {
        match tokio::time::timeout(self.timeout, probe.exists(self.kind, &self.key)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout {
                millis: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

/// Per-field uniqueness bookkeeping for one wizard.
#[derive(Debug, Clone)]
pub struct UniquenessChecker {
    settings: UniquenessSettings,
    fields: BTreeMap<&'static str, FieldCheck>,
}

impl UniquenessChecker {
    pub fn new(settings: UniquenessSettings) -> Self {
        UniquenessChecker {
            settings,
            fields: BTreeMap::new(),
        }
    }

    /// Start tracking a field. `debounce_ms` overrides the default quiet period.
    pub fn register(&mut self, field: &'static str, kind: ProbeKind, debounce_ms: Option<u64>) {
        let debounce = debounce_ms
            .map(Duration::from_millis)
            .unwrap_or(self.settings.debounce);
        self.fields.insert(
            field,
            FieldCheck {
                kind,
                debounce,
                status: UniquenessStatus::Unknown,
                resolved_key: None,
                last_requested: None,
                loading: false,
                pending: false,
                generation: 0,
            },
        );
    }

    pub fn is_tracked(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn kind(&self, field: &str) -> Option<ProbeKind> {
        self.fields.get(field).map(|c| c.kind)
    }

    pub fn status(&self, field: &str) -> UniquenessStatus {
        self.fields.get(field).map(|c| c.status).unwrap_or_default()
    }

    pub fn is_loading(&self, field: &str) -> bool {
        self.fields.get(field).is_some_and(|c| c.loading)
    }

    /// A check was issued for the field's current value and has not been
    /// answered yet, whether or not its request has started.
    pub fn is_pending(&self, field: &str) -> bool {
        self.fields.get(field).is_some_and(|c| c.pending)
    }

    /// Fields currently tracked, in name order.
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }

    /// The field's value changed to `key` (raw text).
    ///
    /// Any in-flight probe is superseded. When `eligible` (the value passes
    /// its own rules) and the policy allows on-change probes, a debounced
    /// ticket is returned.
    pub fn on_change(&mut self, field: &str, key: &str, eligible: bool) -> Option<ProbeTicket> {
        let trigger = self.settings.trigger;
        let timeout = self.settings.timeout;
        let min_len = self.settings.national_id_min_len;
        let (name, check) = self.entry(field)?;
        let key = check.kind.normalize(key);

        check.generation += 1;
        check.loading = false;
        check.pending = false;
        if check.resolved_key.as_deref() != Some(key.as_str()) {
            check.status = UniquenessStatus::Unknown;
            check.resolved_key = None;
        } else if check.status != UniquenessStatus::Unknown {
            // Back to a key whose answer we already hold.
            return None;
        }

        if !eligible || !long_enough(check.kind, &key, min_len) || trigger == TriggerPolicy::OnBlur {
            return None;
        }
        let ready_at = Instant::now() + check.debounce;
        Some(Self::ticket(name, check, key, ready_at, timeout))
    }

    /// The field lost focus holding `key`. Fires immediately unless the
    /// same key is already resolved or in flight.
    pub fn on_blur(&mut self, field: &str, key: &str, eligible: bool) -> Option<ProbeTicket> {
        let timeout = self.settings.timeout;
        let min_len = self.settings.national_id_min_len;
        let (name, check) = self.entry(field)?;
        let key = check.kind.normalize(key);
        if !eligible || !long_enough(check.kind, &key, min_len) {
            return None;
        }
        if check.resolved_key.as_deref() == Some(key.as_str())
            && check.status != UniquenessStatus::Unknown
        {
            return None;
        }
        if check.loading && check.last_requested.as_deref() == Some(key.as_str()) {
            return None;
        }
        check.generation += 1;
        check.loading = false;
        Some(Self::ticket(name, check, key, Instant::now(), timeout))
    }

    /// Forget the field's status and drop any issued or running check.
    pub fn supersede(&mut self, field: &str) {
        if let Some((_, check)) = self.entry(field) {
            check.generation += 1;
            check.status = UniquenessStatus::Unknown;
            check.resolved_key = None;
            check.loading = false;
            check.pending = false;
        }
    }

    fn entry(&mut self, field: &str) -> Option<(&'static str, &mut FieldCheck)> {
        self.fields
            .iter_mut()
            .find(|(name, _)| **name == field)
            .map(|(name, check)| (*name, check))
    }

    fn ticket(
        field: &'static str,
        check: &mut FieldCheck,
        key: String,
        ready_at: Instant,
        timeout: Duration,
    ) -> ProbeTicket {
        check.pending = true;
        ProbeTicket {
            field,
            kind: check.kind,
            key,
            generation: check.generation,
            ready_at,
            timeout,
        }
    }

    /// True while `ticket` is the newest one issued for its field.
    pub fn is_current(&self, ticket: &ProbeTicket) -> bool {
        self.fields
            .get(ticket.field)
            .is_some_and(|c| c.generation == ticket.generation)
    }

    /// Mark the ticket's request as in flight. Returns false for a
    /// superseded ticket, which must not be executed.
    pub fn start(&mut self, ticket: &ProbeTicket) -> bool {
        if !self.is_current(ticket) {
            tracing::debug!(field = ticket.field, "debounced probe superseded before start");
            return false;
        }
        if let Some(check) = self.fields.get_mut(ticket.field) {
            check.loading = true;
            check.last_requested = Some(ticket.key.clone());
        }
        true
    }

    /// Apply a probe answer.
    ///
    /// `current_key` is the field's value at resolution time, read from the
    /// state container. Returns false when the answer was stale and dropped.
    pub fn complete(
        &mut self,
        ticket: &ProbeTicket,
        result: Result<bool, GatewayError>,
        current_key: Option<&str>,
    ) -> bool {
        let current = self.is_current(ticket);
        let Some(check) = self.fields.get_mut(ticket.field) else {
            return false;
        };
        let same_key = current_key
            .map(|k| check.kind.normalize(k))
            .is_some_and(|k| k == ticket.key);
        if !current || !same_key {
            tracing::debug!(
                field = ticket.field,
                key = %mask_key(&ticket.key),
                "discarding stale uniqueness response"
            );
            return false;
        }

        check.loading = false;
        check.pending = false;
        match result {
            Ok(exists) => {
                check.status = if exists {
                    UniquenessStatus::Duplicate
                } else {
                    UniquenessStatus::Available
                };
                check.resolved_key = Some(ticket.key.clone());
                tracing::debug!(
                    field = ticket.field,
                    kind = %ticket.kind,
                    status = ?check.status,
                    "uniqueness resolved"
                );
            }
            Err(err) => {
                check.status = UniquenessStatus::Unknown;
                check.resolved_key = None;
                tracing::warn!(
                    field = ticket.field,
                    kind = %ticket.kind,
                    key = %mask_key(&ticket.key),
                    error = %err,
                    "uniqueness check failed, continuing without it"
                );
            }
        }
        true
    }

    /// Drop every status and supersede anything in flight.
    pub fn reset(&mut self) {
        for check in self.fields.values_mut() {
            check.generation += 1;
            check.status = UniquenessStatus::Unknown;
            check.resolved_key = None;
            check.last_requested = None;
            check.loading = false;
            check.pending = false;
        }
    }
}

fn long_enough(kind: ProbeKind, key: &str, national_id_min_len: usize) -> bool {
    match kind {
        ProbeKind::NationalId => key.chars().count() >= national_id_min_len,
        ProbeKind::Email => !key.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_gateway::MemoryGateway;

    fn checker() -> UniquenessChecker {
        let mut c = UniquenessChecker::new(UniquenessSettings::default());
        c.register("email", ProbeKind::Email, None);
        c
    }

    #[tokio::test]
    async fn last_key_wins_when_answers_arrive_out_of_order() {
        let gateway = MemoryGateway::new().with_registered(ProbeKind::Email, "taken@example.org");
        let mut c = checker();

        let a = c.on_blur("email", "taken@example.org", true).unwrap();
        assert!(c.start(&a));
        let b = c.on_change("email", "free@example.org", true).unwrap();
        assert!(!c.is_loading("email"));
        assert!(c.start(&b));

        let answer_b = b.execute(&gateway).await;
        assert!(c.complete(&b, answer_b, Some("free@example.org")));
        let answer_a = a.execute(&gateway).await;
        assert!(!c.complete(&a, answer_a, Some("free@example.org")));

        assert_eq!(c.status("email"), UniquenessStatus::Available);
        assert!(!c.is_loading("email"));
    }

    #[tokio::test]
    async fn transport_failure_fails_open() {
        let gateway = MemoryGateway::new().with_failures(intake_gateway::FailureSwitches {
            probes: true,
            ..Default::default()
        });
        let mut c = checker();
        let t = c.on_blur("email", "ana@example.org", true).unwrap();
        assert!(c.start(&t));
        assert!(c.is_loading("email"));
        let answer = t.execute(&gateway).await;
        assert!(answer.is_err());
        assert!(c.complete(&t, answer, Some("ana@example.org")));
        assert_eq!(c.status("email"), UniquenessStatus::Unknown);
        assert!(!c.is_loading("email"));

        // blur on the same key retries after a failure
        assert!(c.on_blur("email", "ana@example.org", true).is_some());
    }

    #[test]
    fn resolved_key_is_not_probed_again_on_blur() {
        let mut c = checker();
        let t = c.on_blur("email", "Ana@Example.org", true).unwrap();
        assert_eq!(t.key, "ana@example.org");
        c.start(&t);
        c.complete(&t, Ok(false), Some("ana@example.org "));
        assert!(c.on_blur("email", "ana@example.org", true).is_none());
    }

    #[test]
    fn ineligible_values_are_never_probed() {
        let mut c = checker();
        assert!(c.on_change("email", "ana@", false).is_none());
        assert!(c.on_blur("email", "ana@", false).is_none());
    }

    #[test]
    fn short_national_ids_are_not_probed() {
        let mut c = UniquenessChecker::new(UniquenessSettings::default());
        c.register("national_id", ProbeKind::NationalId, None);
        assert!(c.on_change("national_id", "12345678", true).is_none());
        assert!(c.on_change("national_id", "123456789", true).is_some());
    }

    #[test]
    fn on_blur_policy_skips_change_tickets() {
        let mut c = UniquenessChecker::new(UniquenessSettings {
            trigger: TriggerPolicy::OnBlur,
            ..Default::default()
        });
        c.register("national_id", ProbeKind::NationalId, None);
        assert!(c.on_change("national_id", "123456789", true).is_none());
        assert!(c.on_blur("national_id", "123456789", true).is_some());
    }

    #[test]
    fn issued_check_stays_pending_until_answered() {
        let mut c = checker();
        let t = c.on_change("email", "ana@example.org", true).unwrap();
        assert!(c.is_pending("email"));
        assert!(!c.is_loading("email"));
        assert!(c.start(&t));
        assert!(c.complete(&t, Ok(false), Some("ana@example.org")));
        assert!(!c.is_pending("email"));

        // an ineligible edit leaves nothing outstanding
        assert!(c.on_change("email", "ana@", false).is_none());
        assert!(!c.is_pending("email"));
    }

    #[test]
    fn supersede_drops_status_and_outstanding_tickets() {
        let mut c = checker();
        let t = c.on_blur("email", "ana@example.org", true).unwrap();
        c.start(&t);
        c.complete(&t, Ok(true), Some("ana@example.org"));
        assert_eq!(c.status("email"), UniquenessStatus::Duplicate);

        let again = c.on_change("email", "ana.m@example.org", true).unwrap();
        c.supersede("email");
        assert_eq!(c.status("email"), UniquenessStatus::Unknown);
        assert!(!c.is_pending("email"));
        assert!(!c.start(&again));
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_supersedes_earlier_edits() {
        let mut c = UniquenessChecker::new(UniquenessSettings::default());
        c.register("national_id", ProbeKind::NationalId, Some(300));

        let first = c.on_change("national_id", "123456789", true).unwrap();
        tokio::time::advance(Duration::from_millis(100)).await;
        let second = c.on_change("national_id", "123456780", true).unwrap();

        first.wait_quiet().await;
        assert!(!c.start(&first));

        second.wait_quiet().await;
        assert_eq!(Instant::now() - first.ready_at, Duration::from_millis(100));
        assert!(c.start(&second));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_registry_times_out() {
        struct Slow;
        #[async_trait::async_trait]
        impl UniquenessProbe for Slow {
            async fn exists(&self, _: ProbeKind, _: &str) -> Result<bool, GatewayError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(true)
            }
        }

        let mut c = checker();
        let t = c.on_blur("email", "ana@example.org", true).unwrap();
        c.start(&t);
        let answer = t.execute(&Slow).await;
        assert_eq!(answer, Err(GatewayError::Timeout { millis: 8000 }));
        c.complete(&t, answer, Some("ana@example.org"));
        assert_eq!(c.status("email"), UniquenessStatus::Unknown);
        assert!(!c.is_loading("email"));
    }
}
