//! Common test utilities for workflow integration tests.

use workflow_tests::WorkflowTestContext;

/// Create a new workflow test context with the whole stack running.
///
/// This is the main entry point for workflow tests.
pub async fn setup() -> WorkflowTestContext {
    WorkflowTestContext::new()
        .await
        .expect("Failed to create workflow test context")
}
