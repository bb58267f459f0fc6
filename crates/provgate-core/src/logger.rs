//! Debug-gated log forwarding.
//!
//! Every message goes to the primary diagnostic channel (`tracing`).
//! Forwarding to the injected task-facing sinks happens only for
//! always-logged messages or when debug mode is on, and a sink failure is
//! never allowed to fail the evaluation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Variables-map key gating debug verbosity.
pub const DEBUG_VARIABLE: &str = "system.debug";

/// A task-facing log destination.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Append one message. Failures are reported to the caller, which
    /// swallows them.
    async fn append(&self, message: &str) -> anyhow::Result<()>;
}

/// Logger that fans messages out to the configured sinks behind a runtime
/// debug gate.
#[derive(Clone)]
pub struct DebugGateLogger {
    debug: bool,
    sinks: Vec<Arc<dyn LogSink>>,
}

impl DebugGateLogger {
    pub fn new(debug: bool, sinks: Vec<Arc<dyn LogSink>>) -> Self {
        DebugGateLogger { debug, sinks }
    }

    /// Whether debug verbosity is on for this evaluation.
    pub fn debug_enabled(&self) -> bool {
        self.debug
    }

    /// Forward to the sinks only when debug mode is on.
    pub async fn log(&self, message: &str) {
        self.write(message, false).await;
    }

    /// Forward to the sinks regardless of the debug gate.
    pub async fn log_always(&self, message: &str) {
        self.write(message, true).await;
    }

    async fn write(&self, message: &str, always: bool) {
        info!("{message}");

        if !(always || self.debug) {
            return;
        }
        for sink in &self.sinks {
            if let Err(e) = sink.append(message).await {
                warn!(error = %e, "Log sink rejected message");
            }
        }
    }
}

/// Read the debug flag from a variables map: true only when the debug key is
/// present and parses as boolean `true`.
pub fn debug_from_variables(variables: &HashMap<String, String>) -> bool {
    variables
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(DEBUG_VARIABLE))
        .map(|(_, value)| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
