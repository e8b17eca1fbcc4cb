use std::fmt;

use serde::{Deserialize, Serialize};

/// A person as known to the national identity directory.
///
/// Only `first_name` and at least one surname are guaranteed; richer
/// registries also return contact and address data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub national_id: String,
    pub first_name: String,
    pub surnames: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// ISO 8601 calendar date (`YYYY-MM-DD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Which registry a uniqueness probe asks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    #[serde(rename = "id")]
    NationalId,
    Email,
}

impl ProbeKind {
    /// Wire name used by the directory API.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::NationalId => "id",
            ProbeKind::Email => "email",
        }
    }

    /// Canonical form of a key for comparison: trimmed, and lowercased for
    /// emails (mailbox names are compared case-insensitively by registries).
    pub fn normalize(&self, key: &str) -> String {
        match self {
            ProbeKind::NationalId => key.trim().to_string(),
            ProbeKind::Email => key.trim().to_lowercase(),
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acknowledgement returned by the submission store for a created application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Opaque identifier; attachments are keyed by it.
    pub id: String,
}

/// One binary attached to an application slot (e.g. `id_document`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Attachment {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

/// Acknowledgement returned by the attachment store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentAck {
    pub receipt_id: String,
    /// Slots accepted, in slot-name order.
    pub slots: Vec<String>,
}

/// A node of the three-level geographic hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoArea {
    pub id: String,
    pub name: String,
}

impl GeoArea {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        GeoArea {
            id: id.into(),
            name: name.into(),
        }
    }
}
