//! Evaluation orchestration.
//!
//! One evaluation runs linearly: extract the package name, stage the
//! workspace, invoke the evaluator, classify the result file, tear down.
//! The workspace guard releases on every exit path, so concurrent
//! evaluations only ever touch their own staging directories.

use crate::classify::{classify, normalize_log};
use crate::error::Result;
use crate::evaluator::{EvalCommand, ExplainLevel, PolicyEvaluator};
use crate::logger::{debug_from_variables, DebugGateLogger, LogSink};
use crate::policy;
use crate::workspace::Workspace;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Violation-shaped message returned when the policy declares no package.
pub const NO_PACKAGE_MESSAGE: &str = "No package name could be inferred from the policy. Cannot continue execution. Ensure that policy contains a package name defined";

/// Inputs to one evaluation, immutable for its duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationInput {
    /// Policy document text.
    pub policy: String,

    /// Provenance document (JSON) the policy is evaluated against.
    pub provenance: String,

    /// Opaque unique identifier keying the staging workspace.
    pub invocation_id: String,

    /// Caller-supplied variables; holds the debug toggle.
    pub variables: HashMap<String, String>,
}

/// Result of one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    /// Evaluator exit code (0 when no subprocess ran).
    pub exit_code: i32,

    /// Full captured evaluator output.
    pub raw_output: String,

    /// Formatted violation messages, in evaluator order.
    pub violations: Vec<String>,

    /// Diagnostic log for the caller.
    pub log: String,
}

impl EvaluationOutcome {
    /// Whether the evaluation reported no violations at all.
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Policy gate tying workspace staging, evaluator invocation, and output
/// classification together.
pub struct PolicyGate {
    base_dir: PathBuf,
    evaluator: Arc<dyn PolicyEvaluator>,
    sinks: Vec<Arc<dyn LogSink>>,
}

impl PolicyGate {
    pub fn new(base_dir: PathBuf, evaluator: Arc<dyn PolicyEvaluator>) -> Self {
        PolicyGate {
            base_dir,
            evaluator,
            sinks: Vec::new(),
        }
    }

    /// Attach task-facing log sinks fed through the debug gate.
    pub fn with_sinks(mut self, sinks: Vec<Arc<dyn LogSink>>) -> Self {
        self.sinks = sinks;
        self
    }

    /// Run one evaluation to completion.
    ///
    /// Only workspace staging and subprocess launch faults abort the call;
    /// a non-zero evaluator exit and unparseable output both produce a
    /// normal outcome. The staging directory is gone by the time this
    /// returns, on every path.
    pub async fn evaluate(&self, input: &EvaluationInput) -> Result<EvaluationOutcome> {
        let debug = debug_from_variables(&input.variables);
        let logger = DebugGateLogger::new(debug, self.sinks.clone());

        let Some(package) = policy::package_name(&input.policy) else {
            logger.log_always(NO_PACKAGE_MESSAGE).await;
            return Ok(EvaluationOutcome {
                exit_code: 0,
                raw_output: String::new(),
                violations: vec![NO_PACKAGE_MESSAGE.to_string()],
                log: NO_PACKAGE_MESSAGE.to_string(),
            });
        };

        let workspace = Workspace::stage(
            &self.base_dir,
            &input.invocation_id,
            &input.policy,
            &input.provenance,
        )?;

        logger
            .log_always(&format!(
                "Created evaluation workspace {}",
                workspace.root().display()
            ))
            .await;
        logger
            .log(&format!("Policy under evaluation:\n{}", input.policy))
            .await;
        if logger.debug_enabled() {
            logger
                .log(&format!(
                    "Provenance document:\n{}",
                    pretty_provenance(&input.provenance)
                ))
                .await;
        }

        let command = EvalCommand {
            input_path: workspace.input_path().to_path_buf(),
            policy_path: workspace.policy_path().to_path_buf(),
            package,
            explain: if debug {
                ExplainLevel::Full
            } else {
                ExplainLevel::Notes
            },
        };

        logger.log_always("Starting policy evaluation").await;
        info!(
            invocation_id = %input.invocation_id,
            query = %command.query(),
            "Policy evaluation in progress"
        );

        let output = self.evaluator.invoke(&command).await?;

        logger
            .log_always(&format!(
                "Policy evaluation finished with exit code {}",
                output.exit_code
            ))
            .await;

        // The evaluator's full transcript lives in the result file; the
        // classifier works from there rather than the captured stream.
        workspace.write_result(&output.raw)?;
        let raw = workspace.read_result()?;

        if !output.clean() {
            let message = format!(
                "Policy evaluation failed with exit code {}. Review the evaluation log for details.",
                output.exit_code
            );
            logger.log_always(&message).await;
            return Ok(EvaluationOutcome {
                exit_code: output.exit_code,
                raw_output: raw.clone(),
                violations: vec![message],
                log: normalize_log(&raw),
            });
        }

        let classified = classify(&raw);
        Ok(EvaluationOutcome {
            exit_code: output.exit_code,
            raw_output: raw,
            violations: classified.violations,
            log: classified.log,
        })
    }
}

fn pretty_provenance(provenance: &str) -> String {
    serde_json::from_str::<Value>(provenance)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| provenance.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::RULE_NOT_DEFINED_MESSAGE;
    use crate::fakes::{MemorySink, ScriptedEvaluator};

    fn input(policy: &str, invocation_id: &str) -> EvaluationInput {
        EvaluationInput {
            policy: policy.to_string(),
            provenance: "{}".to_string(),
            invocation_id: invocation_id.to_string(),
            variables: HashMap::new(),
        }
    }

    fn debug_input(policy: &str, invocation_id: &str) -> EvaluationInput {
        let mut request = input(policy, invocation_id);
        request
            .variables
            .insert("system.debug".to_string(), "true".to_string());
        request
    }

    fn base_entries(base: &std::path::Path) -> usize {
        std::fs::read_dir(base).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_violations_extracted_from_result() {
        let base = tempfile::tempdir().expect("tempdir");
        let evaluator = Arc::new(ScriptedEvaluator::new(
            0,
            "Result:\n[\n  \"missing signature\"\n]\n",
        ));
        let gate = PolicyGate::new(base.path().to_path_buf(), evaluator.clone());

        let outcome = gate
            .evaluate(&input(
                "package images.provenance\nviolations[\"missing signature\"] { true }",
                "inv-a",
            ))
            .await
            .expect("evaluate");

        assert_eq!(outcome.violations, vec!["\"missing signature\""]);
        assert_eq!(outcome.exit_code, 0);
        assert!(!outcome.passed());

        let commands = evaluator.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].query(), "data.images.provenance.violations");
        assert_eq!(commands[0].explain, ExplainLevel::Notes);
    }

    #[tokio::test]
    async fn test_workspace_removed_after_success() {
        let base = tempfile::tempdir().expect("tempdir");
        let evaluator = Arc::new(ScriptedEvaluator::new(0, "[]"));
        let gate = PolicyGate::new(base.path().to_path_buf(), evaluator);

        let outcome = gate
            .evaluate(&input("package a.b\n", "inv-b"))
            .await
            .expect("evaluate");

        assert!(outcome.passed());
        assert_eq!(base_entries(base.path()), 0, "workspace must be torn down");
    }

    #[tokio::test]
    async fn test_missing_package_aborts_without_workspace() {
        let base = tempfile::tempdir().expect("tempdir");
        let evaluator = Arc::new(ScriptedEvaluator::new(0, "[]"));
        let gate = PolicyGate::new(base.path().to_path_buf(), evaluator.clone());

        let outcome = gate
            .evaluate(&input("violations[msg] { msg := \"x\" }", "inv-c"))
            .await
            .expect("evaluate");

        assert_eq!(outcome.violations, vec![NO_PACKAGE_MESSAGE.to_string()]);
        assert_eq!(outcome.log, NO_PACKAGE_MESSAGE);
        assert!(evaluator.commands().is_empty(), "no subprocess may launch");
        assert_eq!(base_entries(base.path()), 0, "no workspace may be created");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_informational() {
        let base = tempfile::tempdir().expect("tempdir");
        let evaluator = Arc::new(ScriptedEvaluator::new(2, "parse error: unexpected token\n"));
        let gate = PolicyGate::new(base.path().to_path_buf(), evaluator);

        let outcome = gate
            .evaluate(&input("package a.b\n", "inv-d"))
            .await
            .expect("non-zero exit must not abort");

        assert_eq!(outcome.exit_code, 2);
        assert_eq!(outcome.violations.len(), 1);
        assert!(outcome.violations[0].contains("exit code 2"));
        assert!(outcome.log.contains("parse error"));
        assert_eq!(base_entries(base.path()), 0, "workspace must be torn down");
    }

    #[tokio::test]
    async fn test_undefined_rule_yields_synthetic_message() {
        let base = tempfile::tempdir().expect("tempdir");
        let evaluator = Arc::new(ScriptedEvaluator::new(0, "undefined\n"));
        let gate = PolicyGate::new(base.path().to_path_buf(), evaluator);

        let outcome = gate
            .evaluate(&input("package a.b\n", "inv-e"))
            .await
            .expect("evaluate");

        assert_eq!(
            outcome.violations,
            vec![RULE_NOT_DEFINED_MESSAGE.to_string()]
        );
    }

    #[tokio::test]
    async fn test_debug_requests_full_explain_and_logs_provenance() {
        let base = tempfile::tempdir().expect("tempdir");
        let evaluator = Arc::new(ScriptedEvaluator::new(0, "[]"));
        let sink = Arc::new(MemorySink::new());
        let gate = PolicyGate::new(base.path().to_path_buf(), evaluator.clone())
            .with_sinks(vec![sink.clone()]);

        gate.evaluate(&debug_input("package a.b\n", "inv-f"))
            .await
            .expect("evaluate");

        assert_eq!(evaluator.commands()[0].explain, ExplainLevel::Full);
        assert!(sink
            .messages()
            .iter()
            .any(|m| m.starts_with("Provenance document:")));
    }

    #[tokio::test]
    async fn test_without_debug_only_always_messages_reach_sinks() {
        let base = tempfile::tempdir().expect("tempdir");
        let evaluator = Arc::new(ScriptedEvaluator::new(0, "[]"));
        let sink = Arc::new(MemorySink::new());
        let gate = PolicyGate::new(base.path().to_path_buf(), evaluator)
            .with_sinks(vec![sink.clone()]);

        gate.evaluate(&input("package a.b\n", "inv-g"))
            .await
            .expect("evaluate");

        let messages = sink.messages();
        assert!(messages.iter().any(|m| m == "Starting policy evaluation"));
        assert!(!messages.iter().any(|m| m.starts_with("Policy under evaluation:")));
    }

    #[tokio::test]
    async fn test_identical_inputs_different_ids_agree() {
        let base = tempfile::tempdir().expect("tempdir");
        let evaluator = Arc::new(ScriptedEvaluator::new(
            0,
            "[\n  \"unsigned layer\",\n  \"stale attestation\"\n]\n",
        ));
        let gate = PolicyGate::new(base.path().to_path_buf(), evaluator);

        let first = gate
            .evaluate(&input("package a.b\n", "inv-h1"))
            .await
            .expect("first run");
        let second = gate
            .evaluate(&input("package a.b\n", "inv-h2"))
            .await
            .expect("second run");

        assert_eq!(first.violations, second.violations);
        assert_eq!(first.violations.len(), 2);
    }
}
