//! HTTP gateway for the association's REST API.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` so the async
//! runtime is never blocked. Endpoints, relative to `base_url`:
//!
//! | collaborator        | request                                          |
//! |---------------------|--------------------------------------------------|
//! | identity lookup     | `GET identities/{key}` (404 = not found)         |
//! | uniqueness probe    | `GET registry/{kind}/{key}` → `{"exists": bool}` |
//! | submission          | `POST applications` + `Idempotency-Key` header   |
//! | attachments         | `POST applications/{receipt}/attachments`        |
//! | geographic catalog  | `GET geo/regions`, `geo/regions/{id}/subregions`, `geo/subregions/{id}/districts` |
//!
//! Attachment bytes travel base64-encoded inside the JSON body.

use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::Engine;
use intake_gateway::{
    Attachment, AttachmentAck, AttachmentStore, GatewayError, GeoArea, GeoCatalog,
    IdentityDirectory, IdentityRecord, ProbeKind, Receipt, SubmissionStore, UniquenessProbe,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::GatewayConfig;

/// Every collaborator backed by one REST service.
#[derive(Clone)]
pub struct HttpGateway {
    base_url: String,
    auth_token: Option<String>,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
struct ExistsResponse {
    exists: bool,
}

enum Method {
    Get,
    Post(serde_json::Value, Option<String>),
}

impl HttpGateway {
    /// Build from the `[gateway]` config section. `base_url` is required.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                GatewayError::Backend(
                    "gateway base_url is not configured (set [gateway] base_url or INTAKE_GATEWAY_BASE_URL)"
                        .to_string(),
                )
            })?;
        Ok(HttpGateway {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            agent: ureq::Agent::new_with_defaults(),
        })
    }

    /// Absolute URL for path segments, each percent-encoded.
    pub fn url(&self, segments: &[&str]) -> String {
        let path: Vec<String> = segments.iter().map(|s| encode_segment(s)).collect();
        format!("{}/{}", self.base_url, path.join("/"))
    }

    async fn call<T>(&self, url: String, method: Method) -> Result<T, GatewayError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let agent = self.agent.clone();
        let auth = self.auth_token.as_ref().map(|t| format!("Bearer {}", t));

        tokio::task::spawn_blocking(move || {
            let response = match method {
                Method::Get => {
                    let mut request = agent.get(&url);
                    if let Some(ref auth) = auth {
                        request = request.header("Authorization", auth);
                    }
                    request.call()
                }
                Method::Post(body, idempotency_key) => {
                    let mut request = agent.post(&url);
                    if let Some(ref auth) = auth {
                        request = request.header("Authorization", auth);
                    }
                    if let Some(ref key) = idempotency_key {
                        request = request.header("Idempotency-Key", key);
                    }
                    request.send_json(&body)
                }
            }
            .map_err(map_ureq_error)?;

            response
                .into_body()
                .read_json::<T>()
                .map_err(|e| GatewayError::Backend(format!("failed to parse response as JSON: {}", e)))
        })
        .await
        .map_err(|e| GatewayError::Backend(format!("task join error: {}", e)))?
    }
}

fn map_ureq_error(err: ureq::Error) -> GatewayError {
    match err {
        ureq::Error::StatusCode(status) => GatewayError::Rejected {
            status,
            message: format!("HTTP {}", status),
        },
        other => GatewayError::Transport(other.to_string()),
    }
}

fn is_not_found(err: &GatewayError) -> bool {
    matches!(err, GatewayError::Rejected { status: 404, .. })
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn encode_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// JSON body of an attachment upload.
fn attachment_body(files: &BTreeMap<String, Attachment>) -> serde_json::Value {
    let engine = base64::engine::general_purpose::STANDARD;
    let slots: serde_json::Map<String, serde_json::Value> = files
        .iter()
        .map(|(slot, file)| {
            (
                slot.clone(),
                serde_json::json!({
                    "file_name": file.file_name,
                    "content_type": file.content_type,
                    "data": engine.encode(&file.bytes),
                }),
            )
        })
        .collect();
    serde_json::json!({ "files": slots })
}

#[async_trait]
impl IdentityDirectory for HttpGateway {
    async fn lookup(&self, key: &str) -> Result<Option<IdentityRecord>, GatewayError> {
        match self
            .call::<IdentityRecord>(self.url(&["identities", key.trim()]), Method::Get)
            .await
        {
            Ok(record) => Ok(Some(record)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl UniquenessProbe for HttpGateway {
    async fn exists(&self, kind: ProbeKind, key: &str) -> Result<bool, GatewayError> {
        let key = kind.normalize(key);
        let url = self.url(&["registry", kind.as_str(), &key]);
        let answer: ExistsResponse = self.call(url, Method::Get).await?;
        Ok(answer.exists)
    }
}

#[async_trait]
impl SubmissionStore for HttpGateway {
    async fn create(
        &self,
        payload: &serde_json::Value,
        idempotency_key: &str,
    ) -> Result<Receipt, GatewayError> {
        let method = Method::Post(payload.clone(), Some(idempotency_key.to_string()));
        self.call(self.url(&["applications"]), method).await
    }
}

#[async_trait]
impl AttachmentStore for HttpGateway {
    async fn upload(
        &self,
        receipt_id: &str,
        files: &BTreeMap<String, Attachment>,
    ) -> Result<AttachmentAck, GatewayError> {
        let url = self.url(&["applications", receipt_id, "attachments"]);
        match self.call(url, Method::Post(attachment_body(files), None)).await {
            Err(e) if is_not_found(&e) => Err(GatewayError::ReceiptNotFound {
                receipt_id: receipt_id.to_string(),
            }),
            other => other,
        }
    }
}

#[async_trait]
impl GeoCatalog for HttpGateway {
    async fn list_regions(&self) -> Result<Vec<GeoArea>, GatewayError> {
        self.call(self.url(&["geo", "regions"]), Method::Get).await
    }

    async fn list_subregions(&self, region_id: &str) -> Result<Vec<GeoArea>, GatewayError> {
        let url = self.url(&["geo", "regions", region_id, "subregions"]);
        self.call(url, Method::Get).await.map_err(|e| unknown_area(e, region_id))
    }

    async fn list_districts(&self, subregion_id: &str) -> Result<Vec<GeoArea>, GatewayError> {
        let url = self.url(&["geo", "subregions", subregion_id, "districts"]);
        self.call(url, Method::Get)
            .await
            .map_err(|e| unknown_area(e, subregion_id))
    }
}

fn unknown_area(err: GatewayError, id: &str) -> GatewayError {
    if is_not_found(&err) {
        GatewayError::UnknownArea { id: id.to_string() }
    } else {
        err
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
