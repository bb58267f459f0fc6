//! External policy evaluator invocation.
//!
//! The evaluator is a black-box subprocess. Orchestration code talks to it
//! through the `PolicyEvaluator` trait so tests can inject a scripted
//! implementation instead of spawning real processes.

use crate::error::{EvalError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Verbosity requested from the external evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplainLevel {
    /// Terse explanation, the default.
    Notes,

    /// Full explanation, requested when debug mode is enabled.
    Full,
}

impl ExplainLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExplainLevel::Notes => "notes",
            ExplainLevel::Full => "full",
        }
    }
}

/// One evaluator invocation: staged file paths plus the evaluation target.
///
/// The package name must already have passed the declaration pattern, so it
/// contains identifier characters and dots only.
#[derive(Debug, Clone)]
pub struct EvalCommand {
    /// Path of the staged provenance document.
    pub input_path: PathBuf,

    /// Path of the staged policy document.
    pub policy_path: PathBuf,

    /// Package whose `violations` rule is evaluated.
    pub package: String,

    /// Requested explanation verbosity.
    pub explain: ExplainLevel,
}

impl EvalCommand {
    /// The evaluation target expression, `data.<package>.violations`.
    pub fn query(&self) -> String {
        format!("data.{}.violations", self.package)
    }
}

/// Captured result of one evaluator run.
#[derive(Debug, Clone)]
pub struct EvalOutput {
    /// Exit code (0 = clean run).
    pub exit_code: i32,

    /// Merged stdout and stderr.
    pub raw: String,
}

impl EvalOutput {
    /// Whether the evaluator exited cleanly.
    pub fn clean(&self) -> bool {
        self.exit_code == 0
    }
}

/// Capability interface over the external evaluator.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    /// Run the evaluator and capture its output.
    ///
    /// A non-zero exit is a normal `EvalOutput`, not an error; only spawn
    /// failures and timeouts are errors.
    async fn invoke(&self, command: &EvalCommand) -> Result<EvalOutput>;
}

/// Subprocess evaluator wrapping the `opa` command-line tool.
pub struct OpaEvaluator {
    binary_path: String,
    timeout: Duration,
}

impl OpaEvaluator {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(binary_path: impl Into<String>, timeout: Duration) -> Self {
        OpaEvaluator {
            binary_path: binary_path.into(),
            timeout,
        }
    }

    /// Default: use `opa` from PATH with the default timeout.
    pub fn default_path() -> Self {
        OpaEvaluator::new("opa", Self::DEFAULT_TIMEOUT)
    }

    fn build_command(&self, command: &EvalCommand) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        // Arguments are passed as a vector, never through a shell, so staged
        // paths and the package name are not shell-interpreted.
        cmd.arg("eval")
            .arg("--format")
            .arg("pretty")
            .arg("--explain")
            .arg(command.explain.as_str())
            .arg("--input")
            .arg(&command.input_path)
            .arg("--data")
            .arg(&command.policy_path)
            .arg(command.query())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl PolicyEvaluator for OpaEvaluator {
    async fn invoke(&self, command: &EvalCommand) -> Result<EvalOutput> {
        debug!(
            query = %command.query(),
            explain = command.explain.as_str(),
            "Invoking policy evaluator"
        );

        let child = self
            .build_command(command)
            .spawn()
            .map_err(|source| EvalError::Spawn {
                command: self.binary_path.clone(),
                source,
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| EvalError::Timeout(self.timeout))?
            .map_err(|source| EvalError::Spawn {
                command: self.binary_path.clone(),
                source,
            })?;

        let exit_code = output.status.code().unwrap_or(-1);

        // Both streams land in one captured transcript so diagnostic text is
        // never lost.
        let mut raw = String::from_utf8_lossy(&output.stdout).to_string();
        raw.push_str(&String::from_utf8_lossy(&output.stderr));

        debug!(exit_code, "Policy evaluator finished");

        Ok(EvalOutput { exit_code, raw })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_command(explain: ExplainLevel) -> EvalCommand {
        EvalCommand {
            input_path: PathBuf::from("/ws/input.json"),
            policy_path: PathBuf::from("/ws/policy.rego"),
            package: "images.provenance".to_string(),
            explain,
        }
    }

    fn command_args(evaluator: &OpaEvaluator, command: &EvalCommand) -> Vec<String> {
        evaluator
            .build_command(command)
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_query_targets_violations_rule() {
        let cmd = sample_command(ExplainLevel::Notes);
        assert_eq!(cmd.query(), "data.images.provenance.violations");
    }

    #[test]
    fn test_command_line_shape() {
        let evaluator = OpaEvaluator::default_path();
        let args = command_args(&evaluator, &sample_command(ExplainLevel::Full));
        assert_eq!(args[0], "eval");
        assert!(args.contains(&"--explain".to_string()));
        assert!(args.contains(&"full".to_string()));
        assert!(args.contains(&"/ws/input.json".to_string()));
        assert!(args.contains(&"/ws/policy.rego".to_string()));
        assert_eq!(args.last().unwrap(), "data.images.provenance.violations");
    }

    #[test]
    fn test_explain_levels() {
        assert_eq!(ExplainLevel::Notes.as_str(), "notes");
        assert_eq!(ExplainLevel::Full.as_str(), "full");
    }

    #[test]
    fn test_eval_output_clean() {
        assert!(EvalOutput { exit_code: 0, raw: String::new() }.clean());
        assert!(!EvalOutput { exit_code: 2, raw: String::new() }.clean());
    }

    #[tokio::test]
    async fn test_invoke_reports_nonzero_exit_with_output() {
        // `sh` stands in for the evaluator binary; it rejects the opa-style
        // arguments, which exercises the non-fatal non-zero-exit contract.
        let evaluator = OpaEvaluator::new("sh", Duration::from_secs(10));
        let output = evaluator
            .invoke(&sample_command(ExplainLevel::Notes))
            .await
            .expect("invoke should not error on a non-zero exit");
        assert_ne!(output.exit_code, 0);
        assert!(!output.raw.is_empty(), "diagnostic text should be captured");
    }

    #[tokio::test]
    async fn test_invoke_missing_binary_is_spawn_error() {
        let evaluator = OpaEvaluator::new("definitely-not-a-real-binary", Duration::from_secs(5));
        let err = evaluator
            .invoke(&sample_command(ExplainLevel::Notes))
            .await
            .expect_err("spawn should fail");
        assert!(matches!(err, EvalError::Spawn { .. }));
    }
}
