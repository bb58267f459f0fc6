//! In-memory fakes for the evaluator and log-sink traits (testing only)
//!
//! Provides `ScriptedEvaluator` and `MemorySink` so orchestration can be
//! exercised without spawning processes or talking to remote sinks.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::evaluator::{EvalCommand, EvalOutput, PolicyEvaluator};
use crate::logger::LogSink;

// ---------------------------------------------------------------------------
// ScriptedEvaluator
// ---------------------------------------------------------------------------

/// Evaluator returning a canned exit code and output, recording every
/// command it receives.
#[derive(Debug)]
pub struct ScriptedEvaluator {
    exit_code: i32,
    raw: String,
    commands: Mutex<Vec<EvalCommand>>,
}

impl ScriptedEvaluator {
    pub fn new(exit_code: i32, raw: impl Into<String>) -> Self {
        ScriptedEvaluator {
            exit_code,
            raw: raw.into(),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Commands received so far.
    pub fn commands(&self) -> Vec<EvalCommand> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl PolicyEvaluator for ScriptedEvaluator {
    async fn invoke(&self, command: &EvalCommand) -> Result<EvalOutput> {
        self.commands.lock().unwrap().push(command.clone());
        Ok(EvalOutput {
            exit_code: self.exit_code,
            raw: self.raw.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// Log sink collecting messages into a `Vec`, optionally failing every
/// append to exercise the swallow path.
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<String>>,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every append fails.
    pub fn failing() -> Self {
        MemorySink {
            messages: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Messages appended so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn append(&self, message: &str) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("sink unavailable");
        }
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}
