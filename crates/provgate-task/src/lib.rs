//! Provenance Gate Task Collaborators
//!
//! Bridges the evaluation core to its hosting pipeline: validates the
//! inbound task property bag into typed properties and appends evaluation
//! messages to the remote timeline feed.

pub mod error;
pub mod feed;
pub mod properties;

// Re-export key types
pub use error::{Result, TaskError};
pub use feed::TimelineFeedLogger;
pub use properties::{RequestType, TaskProperties};
