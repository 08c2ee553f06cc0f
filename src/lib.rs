//! # Flow-space base calling by bounded tree search
//!
//! This crate decodes noisy per-flow signal measurements from a
//! sequencing instrument into a discrete base sequence. A generative
//! phasing model predicts the expected signal for any hypothesized
//! sequence; a bounded beam search finds the sequence whose prediction
//! best matches the measurements; interchangeable normalization
//! strategies use the evolving prediction as a moving reference to strip
//! systematic signal distortion; and a forced re-walk of the decided
//! sequence produces per-base confidence metrics.
//!
//! ## Core loop
//!
//! 1. **Model**: derive per-nucleotide, per-flow transition probabilities
//!    from the three phasing rates (carry-forward, incomplete extension,
//!    droop)
//! 2. **Decode**: expand/prune/select over a fixed pool of at most 8
//!    windowed path hypotheses
//! 3. **Normalize**: correct raw measurements against the current
//!    prediction, then decode again over a grown flow range
//! 4. **Recalibrate** (optional): apply empirical per-(flow, nucleotide,
//!    homopolymer) corrections during state advancement
//!
//! ## Usage Example
//!
//! ```
//! use flowcall::{Decoder, FlowOrder, PhasingParams, ReadBuffer};
//!
//! let order = FlowOrder::new("TACG", 8)?;
//! let mut engine = Decoder::new(order);
//! engine.set_phasing(PhasingParams::ideal());
//!
//! let mut read = ReadBuffer::new();
//! read.set_data(&[1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0], 8);
//! engine.solve(&mut read, 8, 0);
//! assert_eq!(read.sequence_string(), "TCTA");
//! # Ok::<(), flowcall::EngineError>(())
//! ```
//!
//! The engine processes one read at a time and allocates nothing per
//! call; parallelizing across reads is the caller's concern (one engine
//! per worker).

#![warn(missing_docs, missing_debug_implementations)]

// Core modules - each implements one component of the engine
pub mod calib; // Recalibration table adapter
pub mod flow; // Nucleotides and the flow order
pub mod model; // Phasing rates and transition tables
pub mod normalize; // Signal normalization strategies
pub mod read; // Per-read input/output buffers
pub mod search; // Path pool, beam decode, QV metrics

// Re-exports for convenience
pub use calib::{RecalibrationModel, MAX_HP};
pub use flow::{FlowOrder, Nuc};
pub use model::{PhasingParams, TransitionModel};
pub use normalize::PidLoop;
pub use read::ReadBuffer;
pub use search::Decoder;

use thiserror::Error;

/// Errors surfaced while configuring the engine.
///
/// The decode path itself never fails: bad measurements are sanitized,
/// degenerate numeric situations fall back to neutral corrections, and
/// internal invariant violations are treated as programming errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Flow order cycle string or flow count was empty.
    #[error("flow order is empty")]
    EmptyFlowOrder,

    /// Flow order cycle contained a non-nucleotide character.
    #[error("invalid nucleotide {0:?} in flow order")]
    InvalidFlowChar(char),

    /// A phasing rate was outside `[0, 1)`.
    #[error("phasing rate {name} = {value} outside [0, 1)")]
    InvalidRate {
        /// Which rate was rejected (`cf`, `ie` or `dr`).
        name: &'static str,
        /// The offending value.
        value: f64,
    },

    /// Recalibration tables do not cover the required index space.
    #[error("recalibration table shape mismatch: {0}")]
    TableShape(String),

    /// A state query addressed a flow past the processing limit.
    #[error("query flow {query_flow} out of range (limit {max_flows})")]
    QueryFlowOutOfRange {
        /// The requested flow.
        query_flow: usize,
        /// The flow limit in effect.
        max_flows: usize,
    },
}
