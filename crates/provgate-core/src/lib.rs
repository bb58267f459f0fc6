//! Provenance Gate Core
//!
//! Evaluates a declarative policy against an artifact-provenance document by
//! orchestrating an external evaluator:
//! - Stages inputs into an isolated per-invocation workspace
//! - Invokes the evaluator with deterministic arguments
//! - Classifies the captured output into violation messages
//! - Guarantees workspace teardown on every path

pub mod classify;
pub mod error;
pub mod evaluator;
pub mod fakes;
pub mod logger;
pub mod orchestrator;
pub mod policy;
pub mod telemetry;
pub mod workspace;

// Re-export key types
pub use classify::{classify, normalize_log, Classified, RULE_NOT_DEFINED_MESSAGE};
pub use error::{EvalError, Result};
pub use evaluator::{EvalCommand, EvalOutput, ExplainLevel, OpaEvaluator, PolicyEvaluator};
pub use logger::{debug_from_variables, DebugGateLogger, LogSink, DEBUG_VARIABLE};
pub use orchestrator::{EvaluationInput, EvaluationOutcome, PolicyGate, NO_PACKAGE_MESSAGE};
pub use policy::package_name;
pub use telemetry::init_tracing;
pub use workspace::Workspace;
