use std::collections::BTreeMap;
use std::future::Future;

use super::{sample_payload, TestResult};
use crate::{Attachment, AttachmentStore, GatewayError, SubmissionStore};

pub(super) async fn run_attachment_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: SubmissionStore + AttachmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "attachment",
            "upload_acknowledges_every_slot",
            upload_acknowledges_every_slot(factory).await,
        ),
        TestResult::from_result(
            "attachment",
            "upload_to_unknown_receipt_rejected",
            upload_to_unknown_receipt_rejected(factory).await,
        ),
        TestResult::from_result(
            "attachment",
            "empty_upload_is_acknowledged",
            empty_upload_is_acknowledged(factory).await,
        ),
    ]
}

fn two_files() -> BTreeMap<String, Attachment> {
    let mut files = BTreeMap::new();
    files.insert(
        "id_document".to_string(),
        Attachment::new("cedula.pdf", "application/pdf", b"%PDF-1.4".to_vec()),
    );
    files.insert(
        "property_deed".to_string(),
        Attachment::new("deed.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47]),
    );
    files
}

// ── 1. every uploaded slot is acknowledged against the receipt ──────────────

async fn upload_acknowledges_every_slot<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStore + AttachmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let receipt = s
        .create(&sample_payload("membership", "123456789"), "key-files")
        .await
        .map_err(|e| e.to_string())?;
    let ack = s
        .upload(&receipt.id, &two_files())
        .await
        .map_err(|e| e.to_string())?;
    if ack.receipt_id != receipt.id {
        return Err(format!(
            "ack addressed to \"{}\", expected \"{}\"",
            ack.receipt_id, receipt.id
        ));
    }
    if ack.slots != vec!["id_document".to_string(), "property_deed".to_string()] {
        return Err(format!("unexpected acknowledged slots {:?}", ack.slots));
    }
    Ok(())
}

// ── 2. unknown receipts yield ReceiptNotFound with the offending id ─────────

async fn upload_to_unknown_receipt_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AttachmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.upload("never-issued", &two_files()).await {
        Err(GatewayError::ReceiptNotFound { receipt_id }) if receipt_id == "never-issued" => {
            Ok(())
        }
        other => Err(format!("expected ReceiptNotFound, got {:?}", other)),
    }
}

// ── 3. an application without files can still be "uploaded" ────────────────

async fn empty_upload_is_acknowledged<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SubmissionStore + AttachmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let receipt = s
        .create(&sample_payload("volunteer", "444444444"), "key-empty")
        .await
        .map_err(|e| e.to_string())?;
    let ack = s
        .upload(&receipt.id, &BTreeMap::new())
        .await
        .map_err(|e| e.to_string())?;
    if !ack.slots.is_empty() {
        return Err(format!("expected no slots, got {:?}", ack.slots));
    }
    Ok(())
}
