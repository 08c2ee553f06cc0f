//! Phasing-state queries
//!
//! Re-simulates a decided sequence to report the phasing-state vector at
//! chosen points. Consumed by calibration-table training pipelines, which
//! need to know how the live mass was distributed when a given flow
//! incorporated.

use crate::flow::Nuc;
use crate::read::ReadBuffer;
use crate::search::Decoder;
use crate::EngineError;

impl Decoder {
    /// State vector at the incorporation event happening at `query_flow`.
    ///
    /// Returns the state values (sized `max_flows`) and the homopolymer
    /// length incorporating at that flow. When `query_flow` sees no
    /// incorporation, or the sequence ends first, the state is all zero
    /// and the homopolymer length is 0.
    pub fn query_state(
        &mut self,
        read: &ReadBuffer,
        max_flows: usize,
        query_flow: usize,
    ) -> Result<(Vec<f32>, usize), EngineError> {
        let num_flows = self.flow_order.num_flows();
        let max_flows = max_flows.min(num_flows);
        if query_flow >= max_flows {
            return Err(EngineError::QueryFlowOutOfRange {
                query_flow,
                max_flows,
            });
        }

        self.pool.slots[0].initialize();
        let mut query = vec![0.0f32; max_flows];
        let mut incorporating: Option<Nuc> = None;

        for i in 0..read.sequence.len() {
            if self.pool.slots[0].flow > query_flow {
                break;
            }
            let nuc = read.sequence[i];
            if self.pool.slots[0].flow == query_flow
                && incorporating.is_some_and(|seen| seen != nuc)
            {
                break;
            }
            self.advance_slot_in_place(0, nuc, num_flows);
            if self.pool.slots[0].flow == query_flow && incorporating.is_none() {
                incorporating = Some(nuc);
            }
        }

        let slot = &self.pool.slots[0];
        let until_flow = slot.window_end.min(max_flows);
        let current_hp = if slot.flow == query_flow {
            query[slot.window_start..until_flow]
                .copy_from_slice(&slot.state[slot.window_start..until_flow]);
            slot.last_hp
        } else {
            0
        };

        Ok((query, current_hp))
    }

    /// State vectors and homopolymer lengths at every homopolymer boundary
    /// of `read.sequence`, plus the simulated prediction left in the read.
    pub fn query_all_states(
        &mut self,
        read: &mut ReadBuffer,
        max_flows: usize,
    ) -> (Vec<Vec<f32>>, Vec<usize>) {
        let num_flows = self.flow_order.num_flows();
        let max_flows = max_flows.min(num_flows);

        self.pool.slots[0].initialize();

        let mut states: Vec<Vec<f32>> = Vec::with_capacity(read.sequence.len());
        let mut hp_lengths: Vec<usize> = Vec::new();

        if read.sequence.is_empty() {
            return (states, hp_lengths);
        }

        let mut last_nuc: Option<Nuc> = None;
        for i in 0..read.sequence.len() {
            if self.pool.slots[0].flow >= max_flows {
                break;
            }
            let nuc = read.sequence[i];
            if last_nuc.is_some_and(|last| last != nuc) {
                hp_lengths.push(self.pool.slots[0].last_hp);
                states.push(self.pool.slots[0].state.clone());
            }
            self.advance_slot_in_place(0, nuc, max_flows);
            last_nuc = Some(nuc);
        }
        hp_lengths.push(self.pool.slots[0].last_hp);
        states.push(self.pool.slots[0].state.clone());

        self.pool.slots[0].transfer_prediction(read);
        (states, hp_lengths)
    }
}
