//! Conformance test suite for submission backends.
//!
//! Any backend that receives finished applications implements both
//! [`SubmissionStore`] and [`AttachmentStore`]. This suite checks the
//! contract the engine relies on:
//!
//! - **Submission**: receipts are issued, distinct applications get distinct
//!   receipts, a repeated idempotency key replays the original receipt
//! - **Attachments**: uploads are keyed by receipt, unknown receipts are
//!   rejected with the correct error variant
//!
//! # Usage
//!
//! ```ignore
//! use intake_gateway::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async { connect_test_store().await }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod attachment;
mod submission;

use std::fmt;
use std::future::Future;

use crate::{AttachmentStore, SubmissionStore};

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "submission", "attachment").
    pub category: String,
    pub name: String,
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        let (passed, message) = match result {
            Ok(()) => (true, None),
            Err(msg) => (false, Some(msg)),
        };
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed,
            message,
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in self.results.iter().filter(|r| !r.passed) {
            writeln!(
                f,
                "  FAIL [{}/{}]: {}",
                r.category,
                r.name,
                r.message.as_deref().unwrap_or("(no message)")
            )?;
        }
        Ok(())
    }
}

/// Run the full conformance suite against a submission backend.
///
/// The `factory` is called once per test to create a fresh, empty backend.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: SubmissionStore + AttachmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(submission::run_submission_tests(&factory).await);
    results.extend(attachment::run_attachment_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

fn sample_payload(form: &str, national_id: &str) -> serde_json::Value {
    serde_json::json!({
        "form": form,
        "values": { "national_id": national_id, "first_name": "Ana" },
        "animals": [ { "species": "Vaca", "quantity": 3 } ],
        "total_herd": 3
    })
}
