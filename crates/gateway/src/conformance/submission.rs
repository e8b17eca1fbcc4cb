use std::future::Future;

use super::{sample_payload, TestResult};
use crate::{AttachmentStore, SubmissionStore};

pub(super) async fn run_submission_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: SubmissionStore + AttachmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "submission",
            "create_issues_non_empty_receipt",
            create_issues_non_empty_receipt(factory).await,
        ),
        TestResult::from_result(
            "submission",
            "distinct_keys_get_distinct_receipts",
            distinct_keys_get_distinct_receipts(factory).await,
        ),
        TestResult::from_result(
            "submission",
            "repeated_key_replays_receipt",
            repeated_key_replays_receipt(factory).await,
        ),
    ]
}

// ── 1. create returns a receipt with an opaque, non-empty id ────────────────

async fn create_issues_non_empty_receipt<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let receipt = s
        .create(&sample_payload("membership", "123456789"), "key-1")
        .await
        .map_err(|e| e.to_string())?;
    if receipt.id.trim().is_empty() {
        return Err("receipt id is empty".to_string());
    }
    Ok(())
}

// ── 2. two different applications never share a receipt ─────────────────────

async fn distinct_keys_get_distinct_receipts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let a = s
        .create(&sample_payload("membership", "111111111"), "key-a")
        .await
        .map_err(|e| e.to_string())?;
    let b = s
        .create(&sample_payload("membership", "222222222"), "key-b")
        .await
        .map_err(|e| e.to_string())?;
    if a.id == b.id {
        return Err(format!("both applications received receipt \"{}\"", a.id));
    }
    Ok(())
}

// ── 3. a retried submission with the same key is not created twice ──────────

async fn repeated_key_replays_receipt<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let payload = sample_payload("volunteer", "333333333");
    let first = s.create(&payload, "key-retry").await.map_err(|e| e.to_string())?;
    let second = s.create(&payload, "key-retry").await.map_err(|e| e.to_string())?;
    if first != second {
        return Err(format!(
            "expected replayed receipt \"{}\", got \"{}\"",
            first.id, second.id
        ));
    }
    Ok(())
}
