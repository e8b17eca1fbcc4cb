/// All errors that can be returned by a collaborator implementation.
///
/// The engine never lets these escape to field level: lookups and probes
/// map every variant to a fail-open state, while submission surfaces them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The remote could not be reached or the connection dropped mid-request.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete within the configured bound.
    #[error("request timed out after {millis} ms")]
    Timeout { millis: u64 },

    /// The remote answered but refused the request.
    #[error("remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// A geographic parent id that the catalog does not know.
    #[error("unknown geographic area: {id}")]
    UnknownArea { id: String },

    /// Attachments were addressed to a receipt the store never issued.
    #[error("receipt not found: {receipt_id}")]
    ReceiptNotFound { receipt_id: String },

    /// A backend-specific error (serialization, poisoned state, etc.).
    #[error("gateway backend error: {0}")]
    Backend(String),
}

impl GatewayError {
    /// True for failures that say nothing about the data itself.
    ///
    /// Lookup and uniqueness callers treat these as "unknown" and let the
    /// user continue.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport(_) | GatewayError::Timeout { .. } | GatewayError::Backend(_)
        )
    }
}
