//! QA worker: critique, unit-test generation, and test execution.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::Capability;
use crate::dispatch::{BackendFamily, CapabilityDispatcher};
use crate::errors::DispatchError;
use crate::tools::TestRunner;

/// Reviews code, generates a unit-test file for it, executes the tests
/// through the bounded test-runner tool, and reports all three together.
pub struct QaWorker {
    dispatcher: Arc<CapabilityDispatcher>,
    test_runner: TestRunner,
}

impl QaWorker {
    pub fn new(dispatcher: Arc<CapabilityDispatcher>, test_runner: TestRunner) -> Self {
        Self {
            dispatcher,
            test_runner,
        }
    }
}

#[async_trait]
impl Capability for QaWorker {
    async fn execute(&self, input: &str) -> Result<String, DispatchError> {
        info!("performing full QA cycle: critique, test generation, execution");

        let critique_prompt = format!(
            "Critically review the following code. Identify potential bugs, \
             inefficiencies, style violations, and areas with poor logging or \
             error handling. Provide a clear, actionable list of \
             feedback.\n\n```\n{input}\n```"
        );
        let critique = self
            .dispatcher
            .invoke(BackendFamily::Gemini, &critique_prompt)
            .await?;

        let test_prompt = format!(
            "Based on the following code, generate a complete and runnable \
             unit test file using the standard `unittest` framework. The code \
             must be self-contained, executable, and import all necessary \
             modules. Do not use placeholder comments.\n\n\
             --- Code to Test ---\n```\n{input}\n```"
        );
        let unit_tests = self
            .dispatcher
            .invoke(BackendFamily::Gemini, &test_prompt)
            .await?;

        let (passed, output) = self.test_runner.run(&unit_tests).await;
        let verdict = if passed { "PASSED" } else { "FAILED" };
        info!(verdict, "QA cycle complete");

        Ok(format!(
            "--- QA Critique ---\n{critique}\n\n\
             --- Generated Unit Tests ---\n```\n{unit_tests}\n```\n\n\
             --- Test Execution Results ---\n\
             **Result:** {verdict}\n\n\
             **Output:**\n```\n{output}\n```"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Credentials};
    use crate::dispatch::client::ScriptedClient;
    use crate::ledger::InteractionLedger;
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn qa_report_combines_critique_tests_and_verdict() {
        let dir = tempdir().unwrap();
        let config = Arc::new(Config::for_project(
            dir.path(),
            Credentials {
                gemini: Some("key-g".to_string()),
                ..Credentials::default()
            },
        ));
        let ledger = Arc::new(InteractionLedger::new(dir.path().to_path_buf()));
        let client = Arc::new(
            ScriptedClient::new("unused")
                .on("Critically review", &["two bugs found"])
                .on("unit test file", &["import unittest"]),
        );
        let dispatcher = Arc::new(CapabilityDispatcher::new(config, ledger, client));
        // The runtime is deliberately missing, so execution fails closed.
        let runner = TestRunner::new("crucible-no-such-python", Duration::from_secs(5));
        let qa = QaWorker::new(dispatcher, runner);

        let report = qa.execute("def f(): pass").await.unwrap();
        assert!(report.contains("--- QA Critique ---\ntwo bugs found"));
        assert!(report.contains("import unittest"));
        assert!(report.contains("**Result:** FAILED"));
    }
}
