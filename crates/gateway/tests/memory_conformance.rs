//! Runs the backend conformance suite against the in-memory gateway.

use intake_gateway::conformance::run_conformance_suite;
use intake_gateway::MemoryGateway;

#[tokio::test]
async fn memory_gateway_passes_conformance() {
    let report = run_conformance_suite(|| async { MemoryGateway::new() }).await;
    assert_eq!(report.failed, 0, "{report}");
    assert_eq!(report.total, 6);
}
