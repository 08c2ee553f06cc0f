//! Empirical recalibration tables
//!
//! A precomputed correction model for the systematic bias left over by the
//! phasing model: for every (flow, nucleotide, homopolymer length) cell a
//! multiplicative and an additive coefficient applied to the predicted
//! signal. The tables are consumed, never generated, by this crate; they
//! are shared read-only across reads.

use crate::flow::Nuc;
use crate::EngineError;

/// Longest homopolymer the engine will call; recalibration tables index
/// homopolymer lengths capped at this value.
pub const MAX_HP: usize = 23;

/// Read-only recalibration lookup, indexed `[flow][nuc][hp]` with `hp`
/// capped at [`MAX_HP`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecalibrationModel {
    gain: Vec<Vec<Vec<f32>>>,
    offset: Vec<Vec<Vec<f32>>>,
}

impl RecalibrationModel {
    /// Build a model from a multiplicative (`gain`) and an additive
    /// (`offset`) table, validating that both cover `num_flows` flows,
    /// all four nucleotides and homopolymer lengths up to [`MAX_HP`].
    pub fn new(
        gain: Vec<Vec<Vec<f32>>>,
        offset: Vec<Vec<Vec<f32>>>,
        num_flows: usize,
    ) -> Result<Self, EngineError> {
        for (name, table) in [("gain", &gain), ("offset", &offset)] {
            if table.len() != num_flows {
                return Err(EngineError::TableShape(format!(
                    "{name} table covers {} flows, expected {num_flows}",
                    table.len()
                )));
            }
            for (flow, per_nuc) in table.iter().enumerate() {
                if per_nuc.len() < 4 {
                    return Err(EngineError::TableShape(format!(
                        "{name} table at flow {flow} covers {} nucleotides, expected 4",
                        per_nuc.len()
                    )));
                }
                for (nuc, per_hp) in per_nuc.iter().enumerate().take(4) {
                    if per_hp.len() <= MAX_HP {
                        return Err(EngineError::TableShape(format!(
                            "{name} table at flow {flow} nuc {nuc} covers {} homopolymer \
                             lengths, expected {}",
                            per_hp.len(),
                            MAX_HP + 1
                        )));
                    }
                }
            }
        }
        Ok(Self { gain, offset })
    }

    /// Identity model: unit gain, zero offset everywhere. Useful as a
    /// neutral stand-in and in tests.
    pub fn identity(num_flows: usize) -> Self {
        Self {
            gain: vec![vec![vec![1.0; MAX_HP + 1]; 4]; num_flows],
            offset: vec![vec![vec![0.0; MAX_HP + 1]; 4]; num_flows],
        }
    }

    /// Number of flows the tables cover.
    #[inline]
    pub fn num_flows(&self) -> usize {
        self.gain.len()
    }

    /// Multiplicative coefficient for `(flow, nuc, hp)`, `hp` capped.
    #[inline]
    pub fn gain_at(&self, flow: usize, nuc: Nuc, hp: usize) -> f32 {
        self.gain[flow][nuc.index()][hp.min(MAX_HP)]
    }

    /// Additive coefficient for `(flow, nuc, hp)`, `hp` capped.
    #[inline]
    pub fn offset_at(&self, flow: usize, nuc: Nuc, hp: usize) -> f32 {
        self.offset[flow][nuc.index()][hp.min(MAX_HP)]
    }

    /// Set one `(gain, offset)` cell. Intended for callers assembling
    /// models programmatically.
    pub fn set_cell(&mut self, flow: usize, nuc: Nuc, hp: usize, gain: f32, offset: f32) {
        let hp = hp.min(MAX_HP);
        self.gain[flow][nuc.index()][hp] = gain;
        self.offset[flow][nuc.index()][hp] = offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_caps_homopolymer_length() {
        let mut model = RecalibrationModel::identity(4);
        model.set_cell(2, Nuc::C, MAX_HP, 1.1, -0.05);

        assert_eq!(model.gain_at(2, Nuc::C, MAX_HP), 1.1);
        assert_eq!(model.gain_at(2, Nuc::C, MAX_HP + 7), 1.1);
        assert_eq!(model.offset_at(2, Nuc::C, 40), -0.05);
        assert_eq!(model.gain_at(2, Nuc::C, 1), 1.0);
    }

    #[test]
    fn shape_validation_rejects_short_tables() {
        let gain = vec![vec![vec![1.0; MAX_HP + 1]; 4]; 3];
        let offset = vec![vec![vec![0.0; MAX_HP + 1]; 4]; 4];
        assert!(matches!(
            RecalibrationModel::new(gain, offset, 4),
            Err(EngineError::TableShape(_))
        ));

        let gain = vec![vec![vec![1.0; 2]; 4]; 4];
        let offset = vec![vec![vec![0.0; MAX_HP + 1]; 4]; 4];
        assert!(RecalibrationModel::new(gain, offset, 4).is_err());
    }
}
