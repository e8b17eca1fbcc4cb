use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::record::{Attachment, AttachmentAck, GeoArea, IdentityRecord, ProbeKind, Receipt};

/// The national identity directory.
///
/// Returns `Ok(None)` when the key is well-formed but unknown. Any `Err` is
/// treated by the engine as a miss: autofill does not happen and the user
/// fills the dependent fields by hand.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` so lookups can run on any runtime
/// flavour while the wizard keeps ownership of its state.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn lookup(&self, key: &str) -> Result<Option<IdentityRecord>, GatewayError>;
}

/// Answers "is this key already registered?".
///
/// Transport failures must be reported as `Err`; the engine maps them to an
/// unknown status so the user is never blocked by an outage.
#[async_trait]
pub trait UniquenessProbe: Send + Sync {
    async fn exists(&self, kind: ProbeKind, key: &str) -> Result<bool, GatewayError>;
}

/// Receives a finished application.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Create the application record.
    ///
    /// `idempotency_key` is the payload fingerprint. Stores that honour it
    /// MUST return the original receipt when the same key is presented again
    /// instead of creating a second record.
    async fn create(
        &self,
        payload: &serde_json::Value,
        idempotency_key: &str,
    ) -> Result<Receipt, GatewayError>;
}

/// Stores binaries for an already-created application.
///
/// Called strictly after a successful [`SubmissionStore::create`]; a failure
/// here never invalidates the created record.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn upload(
        &self,
        receipt_id: &str,
        files: &BTreeMap<String, Attachment>,
    ) -> Result<AttachmentAck, GatewayError>;
}

/// Three-level cascading geographic catalog (region → subregion → district).
#[async_trait]
pub trait GeoCatalog: Send + Sync {
    async fn list_regions(&self) -> Result<Vec<GeoArea>, GatewayError>;

    /// Returns `Err(GatewayError::UnknownArea)` for an unknown region id.
    async fn list_subregions(&self, region_id: &str) -> Result<Vec<GeoArea>, GatewayError>;

    /// Returns `Err(GatewayError::UnknownArea)` for an unknown subregion id.
    async fn list_districts(&self, subregion_id: &str) -> Result<Vec<GeoArea>, GatewayError>;
}
