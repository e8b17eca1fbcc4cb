//! Collaborator contracts for the intake engine.
//!
//! The engine consumes five external services: the national identity
//! directory, the uniqueness registry, the submission store, the attachment
//! store and the geographic catalog. This crate holds their traits, the
//! records crossing the boundary, the shared [`GatewayError`], an in-memory
//! implementation, and a conformance suite for submission backends.

pub mod conformance;
mod error;
pub mod memory;
mod record;
mod traits;

pub use error::GatewayError;
pub use memory::{FailureSwitches, MemoryGateway, StoredSubmission};
pub use record::{Attachment, AttachmentAck, GeoArea, IdentityRecord, ProbeKind, Receipt};
pub use traits::{AttachmentStore, GeoCatalog, IdentityDirectory, SubmissionStore, UniquenessProbe};
