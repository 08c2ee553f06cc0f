//! Per-read input/output buffers
//!
//! A [`ReadBuffer`] is owned by the caller, populated from instrument
//! measurements, and handed to the engine which mutates it in place. The
//! engine never retains a reference after a call returns, so one buffer
//! can be reused across reads and one engine can serve them sequentially.

use tracing::warn;

use crate::flow::Nuc;

/// All per-flow and per-base data for a single read.
///
/// Every per-flow vector has length `num_flows`; the sequence and the two
/// per-base quality arrays grow with the decode.
#[derive(Debug, Clone, Default)]
pub struct ReadBuffer {
    /// Scaling factor applied by key normalization (1 when not used).
    pub key_normalizer: f32,
    /// Measured, possibly key-normalized flow signal.
    pub raw_measurements: Vec<f32>,
    /// Measured signal under the best normalization so far.
    pub normalized_measurements: Vec<f32>,
    /// Model-predicted phased signal for the solved sequence.
    pub prediction: Vec<f32>,
    /// Decoded base sequence. Output of the solver, input to simulation.
    pub sequence: Vec<Nuc>,
    /// Additive correction applied to obtain the normalized signal.
    pub additive_correction: Vec<f32>,
    /// Multiplicative correction applied to obtain the normalized signal.
    pub multiplicative_correction: Vec<f32>,
    /// Fraction of live in-phase template per flow.
    pub state_inphase: Vec<f32>,
    /// Fraction of live template per flow.
    pub state_total: Vec<f32>,
    /// Per-base residual score of the called hypothesis.
    pub penalty_residual: Vec<f32>,
    /// Per-base penalty gap to the best alternative hypothesis.
    pub penalty_mismatch: Vec<f32>,
}

impl ReadBuffer {
    /// Empty buffer; call [`ReadBuffer::set_data`] before decoding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load raw measurements, padding or truncating to `num_flows`.
    ///
    /// Non-finite measurements are sanitized to zero with a warning rather
    /// than failing the read.
    pub fn set_data(&mut self, measurements: &[f32], num_flows: usize) {
        self.raw_measurements.clear();
        self.raw_measurements
            .extend(measurements.iter().take(num_flows).copied());
        self.raw_measurements.resize(num_flows, 0.0);

        let mut bad_flows = 0usize;
        for value in &mut self.raw_measurements {
            if !value.is_finite() {
                *value = 0.0;
                bad_flows += 1;
            }
        }
        if bad_flows > 0 {
            warn!(bad_flows, "non-finite measurements sanitized to zero");
        }

        self.key_normalizer = 1.0;
        self.reset_outputs(num_flows);
    }

    /// Load raw measurements and key-normalize them: scale so that the
    /// mean of the key's 1-mer flows becomes 1.
    ///
    /// `key_flows` holds the known homopolymer count per key flow. When the
    /// key contributes no positive 1-mer signal, the scale stays neutral.
    pub fn set_data_key_normalized(
        &mut self,
        measurements: &[f32],
        num_flows: usize,
        key_flows: &[u32],
    ) {
        self.set_data(measurements, num_flows);

        let mut onemer_sum = 0.0f32;
        let mut onemer_count = 0u32;
        for (flow, &count) in key_flows.iter().enumerate().take(num_flows) {
            if count == 1 {
                onemer_sum += self.raw_measurements[flow];
                onemer_count += 1;
            }
        }

        self.key_normalizer = 1.0;
        if onemer_sum > 0.0 && onemer_count > 0 {
            self.key_normalizer = onemer_count as f32 / onemer_sum;
        }

        for flow in 0..num_flows {
            self.raw_measurements[flow] *= self.key_normalizer;
            self.normalized_measurements[flow] = self.raw_measurements[flow];
        }
    }

    fn reset_outputs(&mut self, num_flows: usize) {
        self.normalized_measurements.clear();
        self.normalized_measurements
            .extend_from_slice(&self.raw_measurements);
        self.prediction.clear();
        self.prediction.resize(num_flows, 0.0);
        self.sequence.clear();
        self.sequence.reserve(2 * num_flows);
        self.additive_correction.clear();
        self.additive_correction.resize(num_flows, 0.0);
        self.multiplicative_correction.clear();
        self.multiplicative_correction.resize(num_flows, 1.0);
        self.state_inphase.clear();
        self.state_inphase.resize(num_flows, 1.0);
        self.state_total.clear();
        self.state_total.resize(num_flows, 1.0);
        self.penalty_residual.clear();
        self.penalty_mismatch.clear();
    }

    /// Number of flows this buffer currently holds.
    #[inline]
    pub fn num_flows(&self) -> usize {
        self.raw_measurements.len()
    }

    /// Decoded sequence rendered as an ASCII string.
    pub fn sequence_string(&self) -> String {
        self.sequence.iter().map(|nuc| nuc.to_char()).collect()
    }
}
