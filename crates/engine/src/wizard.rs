//! The wizard: one explicit state container per application.
//!
//! [`Wizard`] owns the [`ApplicationState`], the collections, and the
//! bookkeeping of the uniqueness checker, autofill controller and geographic
//! cascade. Every mutation goes through one of its methods, which re-validate
//! whatever the change can affect and return the asynchronous work it calls
//! for as [`Effects`].
//!
//! Async work is split in three: the wizard *begins* it by handing out a
//! ticket, the caller *executes* the ticket against a collaborator (no borrow
//! of the wizard is held), and the wizard *completes* it, comparing the ticket
//! against its current state so that stale answers are dropped. Callers that
//! do not need to interleave work can use [`Wizard::settle`].

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use intake_gateway::{
    Attachment, AttachmentStore, GatewayError, GeoArea, GeoCatalog, IdentityDirectory,
    IdentityRecord, SubmissionStore, UniquenessProbe,
};

use crate::assemble::{self, SubmissionError, SubmissionOutcome, SubmissionPayload};
use crate::autofill::{AutofillController, LookupResolution, LookupStatus, LookupTicket};
use crate::collection::Collections;
use crate::config::EngineConfig;
use crate::geo::{GeoCascade, GeoLevel, OptionsTicket};
use crate::rules::{Clock, RuleContext, SystemClock};
use crate::schema::{FormSchema, SchemaError};
use crate::sequencer::{BlockedReason, GuardMode, StepGuard, StepSequencer, Transition};
use crate::state::ApplicationState;
use crate::types::{FieldValue, RuleViolation, WizardError};
use crate::uniqueness::{ProbeTicket, UniquenessChecker, UniquenessStatus};

/// Asynchronous work requested by a wizard operation.
#[must_use = "tickets must be executed and completed, or the work is silently skipped"]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Effects {
    pub probes: Vec<ProbeTicket>,
    pub lookups: Vec<LookupTicket>,
    pub options: Vec<OptionsTicket>,
}

impl Effects {
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty() && self.lookups.is_empty() && self.options.is_empty()
    }

    pub fn extend(&mut self, other: Effects) {
        self.probes.extend(other.probes);
        self.lookups.extend(other.lookups);
        self.options.extend(other.options);
    }
}

pub struct Wizard {
    schema: FormSchema,
    clock: Arc<dyn Clock>,
    min_age_years: u8,
    sequencer: StepSequencer,
    state: ApplicationState,
    collections: Collections,
    uniqueness: UniquenessChecker,
    autofill: Option<AutofillController>,
    geo: Option<GeoCascade>,
    attachments: BTreeMap<String, Attachment>,
}

impl Wizard {
    /// Open a wizard on step 1 with the schema's defaults.
    pub fn new(schema: FormSchema, config: &EngineConfig) -> Result<Self, SchemaError> {
        schema.check()?;

        let mut uniqueness = UniquenessChecker::new(config.uniqueness_settings());
        for def in &schema.fields {
            if let Some(kind) = def.uniqueness {
                uniqueness.register(def.name, kind, def.debounce_ms);
            }
        }
        let autofill = schema
            .lookup
            .as_ref()
            .map(|_| AutofillController::new(config.lookup_settings()));
        let geo = schema.geo.map(GeoCascade::new);

        let mut wizard = Wizard {
            sequencer: StepSequencer::new(schema.step_count()),
            state: ApplicationState::new(schema.defaults()),
            schema,
            clock: Arc::new(SystemClock),
            min_age_years: config.rules.min_age_years,
            collections: Collections::default(),
            uniqueness,
            autofill,
            geo,
            attachments: BTreeMap::new(),
        };
        wizard.revalidate_all();
        tracing::debug!(form = wizard.schema.name, "wizard opened");
        Ok(wizard)
    }

    /// Replace the clock used for age rules.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self.revalidate_all();
        self
    }

    // ── Read access ─────────────────────────────────────────────────────────

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn state(&self) -> &ApplicationState {
        &self.state
    }

    pub fn step(&self) -> usize {
        self.state.step
    }

    pub fn is_last_step(&self) -> bool {
        self.sequencer.is_last(&self.state)
    }

    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.state.value(name)
    }

    /// Latest validation result, shown or not.
    pub fn error(&self, name: &str) -> Option<&RuleViolation> {
        self.state.error(name)
    }

    /// Error to display: only once the field is touched or its step attempted.
    pub fn visible_error(&self, name: &str) -> Option<&RuleViolation> {
        let step = self.schema.step_of(name)?;
        self.state.visible_error(name, step)
    }

    pub fn is_from_directory(&self, name: &str) -> bool {
        self.state.is_from_directory(name)
    }

    pub fn uniqueness_status(&self, name: &str) -> UniquenessStatus {
        self.uniqueness.status(name)
    }

    pub fn is_checking(&self, name: &str) -> bool {
        self.uniqueness.is_loading(name)
    }

    pub fn lookup_status(&self) -> Option<&LookupStatus> {
        self.autofill.as_ref().map(|a| a.status())
    }

    pub fn collections(&self) -> &Collections {
        &self.collections
    }

    /// Collections are edited directly; the step guard reads them on demand.
    pub fn collections_mut(&mut self) -> &mut Collections {
        &mut self.collections
    }

    pub fn attachments(&self) -> &BTreeMap<String, Attachment> {
        &self.attachments
    }

    pub fn geo_options(&self, level: GeoLevel) -> &[GeoArea] {
        self.geo.as_ref().map(|g| g.options(level)).unwrap_or(&[])
    }

    // ── Field events ────────────────────────────────────────────────────────

    /// The user changed a field.
    pub fn set_value(
        &mut self,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<Effects, WizardError> {
        let name = self.field_name(name)?;
        let value = value.into();
        if self.state.values.get(name) == Some(&value) {
            return Ok(Effects::default());
        }

        let ctx = self.ctx();
        let mut effects = Effects::default();
        self.state.values.insert(name.to_string(), value);
        self.state.from_directory.remove(name);

        if let Some(level) = self.schema.geo.and_then(|g| g.level_of(name)) {
            self.cascade(level, &ctx, &mut effects);
        }
        if self.is_lookup_key(name) {
            self.lookup_key_changed(&ctx, &mut effects);
        }
        let affected = self.schema.revalidation_set(name);
        self.revalidate(&affected, &ctx);
        if self.uniqueness.is_tracked(name) {
            let eligible = self.passes_rules(name, &ctx);
            let key = self.text(name);
            effects
                .probes
                .extend(self.uniqueness.on_change(name, &key, eligible));
        }
        Ok(effects)
    }

    /// The field lost focus: mark it touched and fire on-blur checks.
    pub fn blur(&mut self, name: &str) -> Result<Effects, WizardError> {
        let name = self.field_name(name)?;
        let ctx = self.ctx();
        let mut effects = Effects::default();
        self.state.touched.insert(name.to_string());
        self.revalidate(&[name], &ctx);

        let key = self.text(name);
        let valid = self.passes_rules(name, &ctx);
        if self.is_lookup_key(name) {
            if let Some(autofill) = self.autofill.as_mut() {
                effects.lookups.extend(autofill.on_key_blur(&key, valid));
            }
        }
        if self.uniqueness.is_tracked(name) {
            effects
                .probes
                .extend(self.uniqueness.on_blur(name, &key, valid));
        }
        Ok(effects)
    }

    // ── Uniqueness ──────────────────────────────────────────────────────────

    /// Begin a probe after its quiet period. False means the ticket was
    /// superseded and must be dropped unexecuted.
    pub fn start_probe(&mut self, ticket: &ProbeTicket) -> bool {
        if ticket.kind.normalize(&self.text(ticket.field)) != ticket.key {
            return false;
        }
        self.uniqueness.start(ticket)
    }

    /// Apply a probe answer if it still matches the field's current value.
    pub fn complete_probe(
        &mut self,
        ticket: &ProbeTicket,
        result: Result<bool, GatewayError>,
    ) -> bool {
        let current = self.text(ticket.field);
        self.uniqueness.complete(ticket, result, Some(&current))
    }

    /// Probe a field's current value right away and return the status.
    pub async fn check_uniqueness(
        &mut self,
        name: &str,
        probe: &dyn UniquenessProbe,
    ) -> Result<UniquenessStatus, WizardError> {
        let name = self.field_name(name)?;
        if !self.uniqueness.is_tracked(name) {
            return Err(WizardError::NotUniquenessField(name.to_string()));
        }
        let ctx = self.ctx();
        let key = self.text(name);
        let eligible = self.passes_rules(name, &ctx);
        if let Some(ticket) = self.uniqueness.on_blur(name, &key, eligible) {
            if self.start_probe(&ticket) {
                let answer = ticket.execute(probe).await;
                self.complete_probe(&ticket, answer);
            }
        }
        Ok(self.uniqueness.status(name))
    }

    /// Give up on work without running it. Abandoned uniqueness checks
    /// leave their fields `Unknown`, as if the registry were unreachable.
    pub fn abandon(&mut self, effects: Effects) {
        for ticket in effects.probes {
            if self.uniqueness.is_current(&ticket) {
                self.uniqueness.supersede(ticket.field);
            }
        }
    }

    // ── Autofill ────────────────────────────────────────────────────────────

    /// Apply a directory answer. Populated fields may need probing.
    pub fn complete_lookup(
        &mut self,
        ticket: &LookupTicket,
        result: Result<Option<IdentityRecord>, GatewayError>,
    ) -> Effects {
        let mut effects = Effects::default();
        let Some(autofill) = self.autofill.as_mut() else {
            return effects;
        };
        if let Some(LookupResolution::Found(record)) = autofill.complete(ticket, result) {
            let ctx = self.ctx();
            self.populate(&record, &ctx, &mut effects);
        }
        effects
    }

    /// Blur the lookup key field and run the lookup it triggers.
    ///
    /// Returns the remaining work (probes for the key and for autofilled
    /// fields); the resulting state is available from [`Wizard::lookup_status`].
    pub async fn lookup_identity(
        &mut self,
        directory: &dyn IdentityDirectory,
    ) -> Result<Effects, WizardError> {
        let key_field = self
            .schema
            .lookup
            .as_ref()
            .map(|l| l.key_field)
            .ok_or(WizardError::NoLookup)?;
        let effects = self.blur(key_field)?;
        let mut follow_up = Effects {
            probes: effects.probes,
            ..Effects::default()
        };
        for ticket in effects.lookups {
            let answer = ticket.execute(directory).await;
            follow_up.extend(self.complete_lookup(&ticket, answer));
        }
        Ok(follow_up)
    }

    fn is_lookup_key(&self, name: &str) -> bool {
        self.schema
            .lookup
            .as_ref()
            .is_some_and(|l| l.key_field == name)
    }

    fn lookup_key_changed(&mut self, ctx: &RuleContext, effects: &mut Effects) {
        let Some(binding) = self.schema.lookup.as_ref() else {
            return;
        };
        let key_field = binding.key_field;
        let key = self.text(key_field);
        let valid = self.passes_rules(key_field, ctx);
        let Some(autofill) = self.autofill.as_mut() else {
            return;
        };
        let change = autofill.on_key_change(&key, valid);
        if change.reset {
            self.clear_dependents(ctx);
        }
        effects.lookups.extend(change.ticket);
    }

    /// Cleared dependents keep no error until they are edited again; the
    /// step guard still validates them from scratch.
    fn clear_dependents(&mut self, ctx: &RuleContext) {
        let Some(binding) = self.schema.lookup.as_ref() else {
            return;
        };
        let dependents: Vec<&'static str> = binding.dependent_fields().collect();
        let mut others: Vec<&'static str> = Vec::new();
        for field in &dependents {
            self.state.clear_field(field);
            self.uniqueness.supersede(field);
            for name in self.schema.revalidation_set(field) {
                if !dependents.contains(&name) && !others.contains(&name) {
                    others.push(name);
                }
            }
        }
        self.revalidate(&others, ctx);
    }

    fn populate(&mut self, record: &IdentityRecord, ctx: &RuleContext, effects: &mut Effects) {
        let Some(binding) = self.schema.lookup.as_ref() else {
            return;
        };
        let mut filled = Vec::new();
        for (attribute, field) in &binding.dependents {
            if let Some(v) = attribute.read(record) {
                self.state.values.insert(field.to_string(), FieldValue::Text(v));
                self.state.from_directory.insert(field.to_string());
                filled.push(*field);
            }
        }
        let mut affected: Vec<&'static str> = Vec::new();
        for field in &filled {
            for name in self.schema.revalidation_set(field) {
                if !affected.contains(&name) {
                    affected.push(name);
                }
            }
        }
        self.revalidate(&affected, ctx);
        for field in filled {
            if self.uniqueness.is_tracked(field) {
                let eligible = self.passes_rules(field, ctx);
                let key = self.text(field);
                effects
                    .probes
                    .extend(self.uniqueness.on_change(field, &key, eligible));
            }
        }
        tracing::debug!(fields = affected.len(), "autofilled from directory");
    }

    // ── Geographic cascade ──────────────────────────────────────────────────

    /// Ticket for the top-level option list.
    pub fn load_regions(&self) -> Result<OptionsTicket, WizardError> {
        self.geo
            .as_ref()
            .map(|g| g.load_regions())
            .ok_or(WizardError::NoGeoHierarchy)
    }

    pub fn complete_options(
        &mut self,
        ticket: &OptionsTicket,
        result: Result<Vec<GeoArea>, GatewayError>,
    ) -> bool {
        let parent = match (&self.geo, ticket.level.parent()) {
            (Some(geo), Some(parent)) => Some(self.text(geo.levels().field(parent))),
            _ => None,
        };
        match self.geo.as_mut() {
            Some(geo) => geo.complete(ticket, result, parent.as_deref()),
            None => false,
        }
    }

    fn cascade(&mut self, level: GeoLevel, ctx: &RuleContext, effects: &mut Effects) {
        let Some(geo) = self.geo.as_mut() else {
            return;
        };
        let selected = self
            .state
            .values
            .get(geo.levels().field(level))
            .and_then(|v| v.as_text())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let (cleared, ticket) = geo.select(level, selected.as_deref());
        for field in &cleared {
            self.state.clear_field(field);
        }
        self.revalidate(&cleared, ctx);
        effects.options.extend(ticket);
    }

    // ── Attachments ─────────────────────────────────────────────────────────

    pub fn attach(&mut self, slot: &str, file: Attachment) -> Result<(), WizardError> {
        if !self.schema.attachment_slots.iter().any(|s| *s == slot) {
            return Err(WizardError::UnknownSlot(slot.to_string()));
        }
        self.attachments.insert(slot.to_string(), file);
        Ok(())
    }

    pub fn detach(&mut self, slot: &str) -> Option<Attachment> {
        self.attachments.remove(slot)
    }

    // ── Navigation ──────────────────────────────────────────────────────────

    fn guard(&self, ctx: RuleContext) -> StepGuard<'_> {
        StepGuard {
            schema: &self.schema,
            state: &self.state,
            collections: &self.collections,
            uniqueness: &self.uniqueness,
            ctx,
        }
    }

    /// Why the current step cannot be left forwards (empty when it can).
    pub fn blocked_reasons(&self) -> Vec<BlockedReason> {
        self.guard(self.ctx())
            .evaluate(self.state.step, GuardMode::Interactive)
    }

    pub fn can_advance(&self) -> bool {
        self.blocked_reasons().is_empty()
    }

    /// Final-pass reasons for every step that would not pass, in step order.
    pub fn review(&self) -> Vec<(usize, Vec<BlockedReason>)> {
        let guard = self.guard(self.ctx());
        (1..=self.sequencer.step_count())
            .map(|step| (step, guard.evaluate(step, GuardMode::Final)))
            .filter(|(_, reasons)| !reasons.is_empty())
            .collect()
    }

    /// Try to move forward. On the last step a passing guard yields
    /// [`Transition::ReadyToSubmit`]; call [`Wizard::finish`] next.
    pub fn next(&mut self) -> Transition {
        let ctx = self.ctx();
        let step = self.state.step;
        if let Some(def) = self.schema.step(step) {
            let fields = def.fields.clone();
            self.revalidate(&fields, &ctx);
        }
        let reasons = self.guard(ctx).evaluate(step, GuardMode::Interactive);
        self.sequencer.next(&mut self.state, reasons)
    }

    /// Step back. Values are kept and nothing is re-validated.
    pub fn prev(&mut self) -> usize {
        self.sequencer.prev(&mut self.state)
    }

    // ── Submission ──────────────────────────────────────────────────────────

    /// Run the final full pass and build the payload.
    pub fn assemble(&self) -> Result<SubmissionPayload, SubmissionError> {
        let slots: Vec<String> = self.attachments.keys().cloned().collect();
        assemble::assemble_payload(&self.guard(self.ctx()), &slots)
    }

    /// Submit from the last step.
    ///
    /// On success the wizard is reset for the next application. On failure
    /// the step index and all state are kept so the user can retry.
    pub async fn finish(
        &mut self,
        store: &dyn SubmissionStore,
        files: &dyn AttachmentStore,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        if !self.is_last_step() {
            return Err(SubmissionError::NotFinalStep {
                step: self.state.step,
                last: self.sequencer.step_count(),
            });
        }
        self.state.attempted.insert(self.state.step);
        let payload = self.assemble()?;
        let outcome = assemble::submit(&payload, &self.attachments, store, files).await?;
        self.reset();
        Ok(outcome)
    }

    /// Back to step 1 with defaults, dropping everything else.
    pub fn reset(&mut self) {
        self.state = ApplicationState::new(self.schema.defaults());
        self.collections.clear();
        self.uniqueness.reset();
        if let Some(a) = self.autofill.as_mut() {
            a.reset();
        }
        if let Some(g) = self.geo.as_mut() {
            g.reset();
        }
        self.attachments.clear();
        self.revalidate_all();
    }

    // ── Driving ─────────────────────────────────────────────────────────────

    /// Execute every ticket, and any follow-up work, to completion.
    ///
    /// Probes honour their quiet period and are dropped when superseded.
    pub async fn settle<G>(&mut self, effects: Effects, gateway: &G)
    where
        G: IdentityDirectory + UniquenessProbe + GeoCatalog,
    {
        let mut queue = VecDeque::from([effects]);
        while let Some(batch) = queue.pop_front() {
            for ticket in batch.options {
                let answer = ticket.execute(gateway).await;
                self.complete_options(&ticket, answer);
            }
            for ticket in batch.lookups {
                let answer = ticket.execute(gateway).await;
                let follow_up = self.complete_lookup(&ticket, answer);
                if !follow_up.is_empty() {
                    queue.push_back(follow_up);
                }
            }
            for ticket in batch.probes {
                ticket.wait_quiet().await;
                if self.start_probe(&ticket) {
                    let answer = ticket.execute(gateway).await;
                    self.complete_probe(&ticket, answer);
                }
            }
        }
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn ctx(&self) -> RuleContext {
        RuleContext::from_clock(self.clock.as_ref(), self.min_age_years)
    }

    fn field_name(&self, name: &str) -> Result<&'static str, WizardError> {
        self.schema
            .field(name)
            .map(|d| d.name)
            .ok_or_else(|| WizardError::UnknownField(name.to_string()))
    }

    /// Trimmed text of a field, empty when unset.
    fn text(&self, name: &str) -> String {
        self.state
            .values
            .get(name)
            .and_then(|v| v.as_text())
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }

    /// Non-blank and accepted by the field's own rules.
    fn passes_rules(&self, name: &str, ctx: &RuleContext) -> bool {
        self.state.values.get(name).is_some_and(|v| !v.is_blank())
            && self
                .schema
                .validate_field(name, &self.state.values, ctx)
                .is_none()
    }

    fn revalidate(&mut self, names: &[&'static str], ctx: &RuleContext) {
        for name in names {
            let violation = self.schema.validate_field(name, &self.state.values, ctx);
            self.state.set_error(name, violation);
        }
    }

    fn revalidate_all(&mut self) {
        let ctx = self.ctx();
        let names: Vec<&'static str> = self.schema.fields.iter().map(|f| f.name).collect();
        self.revalidate(&names, &ctx);
    }
}
