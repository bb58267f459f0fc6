//! Per-invocation staging workspace.
//!
//! Each evaluation stages its inputs into a directory of its own, keyed by
//! the invocation identifier so concurrent evaluations never share files.
//! The directory is removed when the `Workspace` is dropped, which covers
//! every exit path of an evaluation including error propagation.

use crate::error::{EvalError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const POLICY_FILE: &str = "policy.rego";
const INPUT_FILE: &str = "input.json";
const RESULT_FILE: &str = "result.txt";

/// Staged filesystem state for one evaluation.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    policy_path: PathBuf,
    input_path: PathBuf,
    result_path: PathBuf,
}

impl Workspace {
    /// Create the workspace directory and write both inputs into it.
    ///
    /// The directory name embeds the invocation id, so two invocations with
    /// distinct ids can never collide under the same base directory.
    pub fn stage(
        base: &Path,
        invocation_id: &str,
        policy: &str,
        provenance: &str,
    ) -> Result<Self> {
        let root = base.join(format!("policy-eval-{}", sanitize_id(invocation_id)));

        fs::create_dir_all(&root).map_err(|source| EvalError::WorkspaceCreate {
            path: root.clone(),
            source,
        })?;

        let workspace = Workspace {
            policy_path: root.join(POLICY_FILE),
            input_path: root.join(INPUT_FILE),
            result_path: root.join(RESULT_FILE),
            root,
        };

        write_staged(&workspace.policy_path, policy)?;
        write_staged(&workspace.input_path, provenance)?;

        debug!(root = %workspace.root.display(), "Staged evaluation workspace");
        Ok(workspace)
    }

    /// Workspace root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the staged policy document.
    pub fn policy_path(&self) -> &Path {
        &self.policy_path
    }

    /// Path of the staged provenance document.
    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// Path of the evaluator result file.
    pub fn result_path(&self) -> &Path {
        &self.result_path
    }

    /// Write the captured evaluator output into the result file.
    pub fn write_result(&self, raw: &str) -> Result<()> {
        fs::write(&self.result_path, raw).map_err(|source| EvalError::ResultWrite {
            path: self.result_path.clone(),
            source,
        })
    }

    /// Read back the full result file contents.
    pub fn read_result(&self) -> Result<String> {
        fs::read_to_string(&self.result_path).map_err(|source| EvalError::ResultRead {
            path: self.result_path.clone(),
            source,
        })
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        // A teardown fault must not mask an already-computed result, so the
        // failure is logged and suppressed.
        if let Err(e) = fs::remove_dir_all(&self.root) {
            warn!(
                root = %self.root.display(),
                error = %e,
                "Failed to remove evaluation workspace"
            );
        }
    }
}

fn write_staged(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|source| EvalError::StageWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Restrict an invocation id to path-safe characters.
fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
