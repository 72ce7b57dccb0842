//! Engine-boundary error kinds.
//!
//! The engine never panics through its API; every failure surfaces as one
//! of these tagged variants.

use thiserror::Error;

use crate::constraints::ViolationCode;
use crate::index::IndexError;
use crate::items::SlotClass;
use crate::profile::ValidationError;

/// Errors surfaced by [`crate::engine::Engine`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// Context or profile failed validation.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// No template matches the occasion and dressiness target.
    #[error("no template matches occasion '{occasion}' at dressiness {dressiness}")]
    NoTemplate { occasion: String, dressiness: u8 },

    /// Hard constraints pruned every path.
    #[error("no bundle satisfies the hard constraints ({code:?})")]
    NoBundle {
        /// The dominant violation along the pruned paths.
        code: ViolationCode,
        /// Where pruning eliminated the last candidate.
        slot: Option<SlotClass>,
        /// The co-ord group implicated, when the code concerns one.
        group_id: Option<String>,
    },

    /// The deadline expired before any complete bundle existed.
    #[error("deadline exceeded before any complete bundle")]
    Deadline,

    /// Retrieval failed.
    #[error("candidate index failure")]
    Index(#[from] IndexError),

    /// Inflight-request limit reached; the host should shed load.
    #[error("engine at capacity")]
    Busy,

    /// Invariant violation inside the engine.
    #[error("internal error (ruleset v{ruleset_version}, trace {trace_id}): {message}")]
    Internal {
        ruleset_version: u64,
        trace_id: String,
        message: String,
    },
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::InvalidInput {
            reason: err.to_string(),
        }
    }
}
