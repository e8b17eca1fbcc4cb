//! In-memory gateway implementing every collaborator trait.
//!
//! Used as the reference backend for the conformance suite and as the
//! default collaborator in engine tests. Failures can be injected per
//! collaborator to exercise fail-open and non-fatal paths.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::record::{Attachment, AttachmentAck, GeoArea, IdentityRecord, ProbeKind, Receipt};
use crate::traits::{AttachmentStore, GeoCatalog, IdentityDirectory, SubmissionStore, UniquenessProbe};

/// A stored application, as seen by the in-memory store.
#[derive(Debug, Clone)]
pub struct StoredSubmission {
    pub receipt: Receipt,
    pub idempotency_key: String,
    pub payload: serde_json::Value,
}

/// Which collaborator calls should fail with a transport error.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailureSwitches {
    pub lookups: bool,
    pub probes: bool,
    pub submissions: bool,
    pub uploads: bool,
}

#[derive(Default)]
struct Inner {
    identities: BTreeMap<String, IdentityRecord>,
    registered: BTreeSet<(ProbeKind, String)>,
    regions: Vec<GeoArea>,
    subregions: BTreeMap<String, Vec<GeoArea>>,
    districts: BTreeMap<String, Vec<GeoArea>>,
    submissions: Vec<StoredSubmission>,
    uploads: BTreeMap<String, BTreeMap<String, Attachment>>,
    failures: FailureSwitches,
    next_receipt: u64,
}

/// In-memory implementation of all five collaborator traits.
#[derive(Default)]
pub struct MemoryGateway {
    inner: Mutex<Inner>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> Result<MutexGuard<'_, Inner>, GatewayError> {
        self.inner
            .lock()
            .map_err(|_| GatewayError::Backend("memory gateway state poisoned".to_string()))
    }

    fn with_inner(self, f: impl FnOnce(&mut Inner)) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            f(&mut inner);
        }
        self
    }

    /// Seed a directory record, keyed by its national id.
    pub fn with_identity(self, record: IdentityRecord) -> Self {
        self.with_inner(|i| {
            i.identities.insert(record.national_id.clone(), record);
        })
    }

    /// Mark a key as already registered for the given probe kind.
    pub fn with_registered(self, kind: ProbeKind, key: &str) -> Self {
        let normalized = kind.normalize(key);
        self.with_inner(|i| {
            i.registered.insert((kind, normalized));
        })
    }

    /// Seed a region together with its subregions.
    pub fn with_region(self, region: GeoArea, subregions: Vec<GeoArea>) -> Self {
        self.with_inner(|i| {
            i.subregions.insert(region.id.clone(), subregions);
            i.regions.push(region);
        })
    }

    /// Seed the districts of a subregion.
    pub fn with_districts(self, subregion_id: &str, districts: Vec<GeoArea>) -> Self {
        let subregion_id = subregion_id.to_string();
        self.with_inner(|i| {
            i.districts.insert(subregion_id, districts);
        })
    }

    pub fn with_failures(self, failures: FailureSwitches) -> Self {
        self.with_inner(|i| i.failures = failures)
    }

    /// Replace the failure switches on a shared gateway.
    pub fn set_failures(&self, failures: FailureSwitches) -> Result<(), GatewayError> {
        self.inner()?.failures = failures;
        Ok(())
    }

    /// Register a key after construction (e.g. another applicant finished first).
    pub fn register(&self, kind: ProbeKind, key: &str) -> Result<(), GatewayError> {
        self.inner()?.registered.insert((kind, kind.normalize(key)));
        Ok(())
    }

    pub fn submissions(&self) -> Vec<StoredSubmission> {
        self.inner().map(|i| i.submissions.clone()).unwrap_or_default()
    }

    /// Slots uploaded for a receipt, in slot order.
    pub fn uploaded_slots(&self, receipt_id: &str) -> Vec<String> {
        self.inner()
            .ok()
            .and_then(|i| i.uploads.get(receipt_id).map(|m| m.keys().cloned().collect()))
            .unwrap_or_default()
    }
}

#[async_trait]
impl IdentityDirectory for MemoryGateway {
    async fn lookup(&self, key: &str) -> Result<Option<IdentityRecord>, GatewayError> {
        let inner = self.inner()?;
        if inner.failures.lookups {
            return Err(GatewayError::Transport("directory unreachable".to_string()));
        }
        Ok(inner.identities.get(key.trim()).cloned())
    }
}

#[async_trait]
impl UniquenessProbe for MemoryGateway {
    async fn exists(&self, kind: ProbeKind, key: &str) -> Result<bool, GatewayError> {
        let inner = self.inner()?;
        if inner.failures.probes {
            return Err(GatewayError::Transport("registry unreachable".to_string()));
        }
        Ok(inner.registered.contains(&(kind, kind.normalize(key))))
    }
}

#[async_trait]
impl SubmissionStore for MemoryGateway {
    async fn create(
        &self,
        payload: &serde_json::Value,
        idempotency_key: &str,
    ) -> Result<Receipt, GatewayError> {
        let mut inner = self.inner()?;
        if inner.failures.submissions {
            return Err(GatewayError::Transport("submission store unreachable".to_string()));
        }
        if let Some(existing) = inner
            .submissions
            .iter()
            .find(|s| s.idempotency_key == idempotency_key)
        {
            tracing::debug!(receipt = %existing.receipt.id, "idempotent replay of submission");
            return Ok(existing.receipt.clone());
        }

        inner.next_receipt += 1;
        let receipt = Receipt {
            id: format!("app-{:06}", inner.next_receipt),
        };
        inner.submissions.push(StoredSubmission {
            receipt: receipt.clone(),
            idempotency_key: idempotency_key.to_string(),
            payload: payload.clone(),
        });
        Ok(receipt)
    }
}

#[async_trait]
impl AttachmentStore for MemoryGateway {
    async fn upload(
        &self,
        receipt_id: &str,
        files: &BTreeMap<String, Attachment>,
    ) -> Result<AttachmentAck, GatewayError> {
        let mut inner = self.inner()?;
        if inner.failures.uploads {
            return Err(GatewayError::Transport("attachment store unreachable".to_string()));
        }
        if !inner.submissions.iter().any(|s| s.receipt.id == receipt_id) {
            return Err(GatewayError::ReceiptNotFound {
                receipt_id: receipt_id.to_string(),
            });
        }
        let slots = inner.uploads.entry(receipt_id.to_string()).or_default();
        for (slot, file) in files {
            slots.insert(slot.clone(), file.clone());
        }
        Ok(AttachmentAck {
            receipt_id: receipt_id.to_string(),
            slots: files.keys().cloned().collect(),
        })
    }
}

#[async_trait]
impl GeoCatalog for MemoryGateway {
    async fn list_regions(&self) -> Result<Vec<GeoArea>, GatewayError> {
        Ok(self.inner()?.regions.clone())
    }

    async fn list_subregions(&self, region_id: &str) -> Result<Vec<GeoArea>, GatewayError> {
        self.inner()?
            .subregions
            .get(region_id)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownArea {
                id: region_id.to_string(),
            })
    }

    async fn list_districts(&self, subregion_id: &str) -> Result<Vec<GeoArea>, GatewayError> {
        let inner = self.inner()?;
        let known = inner.subregions.values().flatten().any(|s| s.id == subregion_id);
        match inner.districts.get(subregion_id) {
            Some(districts) => Ok(districts.clone()),
            None if known => Ok(Vec::new()),
            None => Err(GatewayError::UnknownArea {
                id: subregion_id.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> IdentityRecord {
        IdentityRecord {
            national_id: "123456789".to_string(),
            first_name: "Ana".to_string(),
            surnames: vec!["Mora".to_string(), "Solis".to_string()],
            phone: None,
            email: None,
            birth_date: Some("1990-04-12".to_string()),
            address: None,
        }
    }

    #[tokio::test]
    async fn lookup_trims_key() {
        let gw = MemoryGateway::new().with_identity(person());
        let found = gw.lookup(" 123456789 ").await.unwrap();
        assert_eq!(found.map(|r| r.first_name), Some("Ana".to_string()));
        assert_eq!(gw.lookup("000000000").await.unwrap(), None);
    }

    #[tokio::test]
    async fn email_registration_is_case_insensitive() {
        let gw = MemoryGateway::new().with_registered(ProbeKind::Email, "Ana@Example.org");
        assert!(gw.exists(ProbeKind::Email, "ana@example.org ").await.unwrap());
        assert!(!gw.exists(ProbeKind::NationalId, "ana@example.org").await.unwrap());
    }

    #[tokio::test]
    async fn injected_probe_failure_is_transient() {
        let gw = MemoryGateway::new().with_failures(FailureSwitches {
            probes: true,
            ..FailureSwitches::default()
        });
        let err = gw.exists(ProbeKind::Email, "a@b.cr").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn districts_of_known_subregion_without_entries_is_empty() {
        let gw = MemoryGateway::new().with_region(
            GeoArea::new("1", "San Jose"),
            vec![GeoArea::new("101", "Central")],
        );
        assert!(gw.list_districts("101").await.unwrap().is_empty());
        assert!(matches!(
            gw.list_districts("999").await,
            Err(GatewayError::UnknownArea { .. })
        ));
    }
}
