//! Fixture-file gateway.
//!
//! Reads directory records, already-registered keys and the geographic tree
//! from one JSON document, and keeps submissions in memory:
//!
//! ```json
//! {
//!   "identities": [
//!     { "national_id": "123456789", "first_name": "Ana", "surnames": ["Mora", "Solis"] }
//!   ],
//!   "registered": { "id": ["111111111"], "email": ["taken@example.org"] },
//!   "regions": [
//!     { "id": "1", "name": "Norte", "subregions": [
//!       { "id": "1-1", "name": "Upala", "districts": [ { "id": "1-1-1", "name": "Aguas Claras" } ] }
//!     ] }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use intake_gateway::{
    Attachment, AttachmentAck, AttachmentStore, GatewayError, GeoArea, GeoCatalog,
    IdentityDirectory, IdentityRecord, MemoryGateway, ProbeKind, Receipt, StoredSubmission,
    SubmissionStore, UniquenessProbe,
};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("could not read fixture '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid fixture document: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FixtureFile {
    #[serde(default)]
    identities: Vec<IdentityRecord>,
    #[serde(default)]
    registered: BTreeMap<ProbeKind, Vec<String>>,
    #[serde(default)]
    regions: Vec<RegionFixture>,
}

#[derive(Debug, Deserialize)]
struct RegionFixture {
    id: String,
    name: String,
    #[serde(default)]
    subregions: Vec<SubregionFixture>,
}

#[derive(Debug, Deserialize)]
struct SubregionFixture {
    id: String,
    name: String,
    #[serde(default)]
    districts: Vec<GeoArea>,
}

/// Every collaborator served from a fixture document.
pub struct FixtureGateway {
    inner: MemoryGateway,
}

impl FixtureGateway {
    pub fn from_path(path: &Path) -> Result<Self, FixtureError> {
        let content = std::fs::read_to_string(path).map_err(|source| FixtureError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, FixtureError> {
        let file: FixtureFile = serde_json::from_str(content)?;
        Ok(Self::from_file(file))
    }

    /// A gateway with no records, no registered keys and no areas.
    pub fn empty() -> Self {
        Self::from_file(FixtureFile::default())
    }

    fn from_file(file: FixtureFile) -> Self {
        let mut gw = MemoryGateway::new();
        for record in file.identities {
            gw = gw.with_identity(record);
        }
        for (kind, keys) in &file.registered {
            for key in keys {
                gw = gw.with_registered(*kind, key);
            }
        }
        for region in file.regions {
            let mut subregions = Vec::with_capacity(region.subregions.len());
            for sub in region.subregions {
                gw = gw.with_districts(&sub.id, sub.districts);
                subregions.push(GeoArea::new(sub.id, sub.name));
            }
            gw = gw.with_region(GeoArea::new(region.id, region.name), subregions);
        }
        FixtureGateway { inner: gw }
    }

    /// Applications created during this run.
    pub fn submissions(&self) -> Vec<StoredSubmission> {
        self.inner.submissions()
    }
}

#[async_trait]
impl IdentityDirectory for FixtureGateway {
    async fn lookup(&self, key: &str) -> Result<Option<IdentityRecord>, GatewayError> {
        self.inner.lookup(key).await
    }
}

#[async_trait]
impl UniquenessProbe for FixtureGateway {
    async fn exists(&self, kind: ProbeKind, key: &str) -> Result<bool, GatewayError> {
        self.inner.exists(kind, key).await
    }
}

#[async_trait]
impl SubmissionStore for FixtureGateway {
    async fn create(
        &self,
        payload: &serde_json::Value,
        idempotency_key: &str,
    ) -> Result<Receipt, GatewayError> {
        self.inner.create(payload, idempotency_key).await
    }
}

#[async_trait]
impl AttachmentStore for FixtureGateway {
    async fn upload(
        &self,
        receipt_id: &str,
        files: &BTreeMap<String, Attachment>,
    ) -> Result<AttachmentAck, GatewayError> {
        self.inner.upload(receipt_id, files).await
    }
}

#[async_trait]
impl GeoCatalog for FixtureGateway {
    async fn list_regions(&self) -> Result<Vec<GeoArea>, GatewayError> {
        self.inner.list_regions().await
    }

    async fn list_subregions(&self, region_id: &str) -> Result<Vec<GeoArea>, GatewayError> {
        self.inner.list_subregions(region_id).await
    }

    async fn list_districts(&self, subregion_id: &str) -> Result<Vec<GeoArea>, GatewayError> {
        self.inner.list_districts(subregion_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "identities": [
            { "national_id": "123456789", "first_name": "Ana", "surnames": ["Mora"] }
        ],
        "registered": { "email": ["Taken@Example.org"] },
        "regions": [
            { "id": "1", "name": "Norte", "subregions": [
                { "id": "1-1", "name": "Upala", "districts": [ { "id": "1-1-1", "name": "Aguas Claras" } ] }
            ] }
        ]
    }"#;

    #[tokio::test]
    async fn serves_every_section() {
        let gw = FixtureGateway::from_json_str(DOC).unwrap();
        let ana = gw.lookup("123456789").await.unwrap().unwrap();
        assert_eq!(ana.first_name, "Ana");
        assert!(gw.lookup("999999999").await.unwrap().is_none());

        assert!(gw.exists(ProbeKind::Email, "taken@example.org").await.unwrap());
        assert!(!gw.exists(ProbeKind::NationalId, "123456789").await.unwrap());

        assert_eq!(gw.list_regions().await.unwrap().len(), 1);
        assert_eq!(gw.list_subregions("1").await.unwrap()[0].id, "1-1");
        assert_eq!(gw.list_districts("1-1").await.unwrap()[0].name, "Aguas Claras");
    }

    #[test]
    fn unknown_sections_are_rejected() {
        let err = FixtureGateway::from_json_str(r#"{ "people": [] }"#).err();
        assert!(matches!(err, Some(FixtureError::Parse(_))));
    }

    #[tokio::test]
    async fn empty_fixture_still_accepts_submissions() {
        let gw = FixtureGateway::empty();
        let receipt = gw.create(&serde_json::json!({"form": "volunteer"}), "k1").await.unwrap();
        assert_eq!(gw.submissions()[0].receipt, receipt);
    }
}
