//! Per-base confidence metrics
//!
//! A forced re-walk of an already-decided sequence: exactly one hypothesis
//! stays active, but at every called base all four next-base alternatives
//! are expanded with the decode penalty. The gap between the called
//! hypothesis and its best alternative, and the called hypothesis's own
//! residual, become per-base quality predictors; the walk also records the
//! per-flow in-phase and total live fractions.

use crate::calib::MAX_HP;
use crate::flow::Nuc;
use crate::read::ReadBuffer;
use crate::search::{Decoder, SENTINEL_PENALTY};

impl Decoder {
    /// Compute per-base QV metrics for `read.sequence`.
    ///
    /// Fills `read.penalty_residual`, `read.penalty_mismatch` (one entry
    /// per called base), `read.state_inphase`, `read.state_total` and
    /// leaves the re-walked prediction in `read.prediction`. A read with
    /// an empty sequence is left untouched apart from `state_total`.
    pub fn compute_qv_metrics(&mut self, read: &mut ReadBuffer) {
        let num_flows = self.flow_order.num_flows();
        read.state_total.clear();
        read.state_total.resize(num_flows, 1.0);

        if read.sequence.is_empty() {
            return;
        }

        read.penalty_mismatch.clear();
        read.penalty_mismatch.resize(read.sequence.len(), 0.0);
        read.penalty_residual.clear();
        read.penalty_residual.resize(read.sequence.len(), 0.0);

        if self.recalibrate_predictions {
            self.pool.reset_calibration();
        }

        // One parent plus four child slots; the called child becomes the
        // next parent by index exchange.
        let mut parent_idx = 0usize;
        let mut child_idx = [1usize, 2, 3, 4];
        self.pool.slots[parent_idx].initialize();

        let mut recent_state_inphase = 1.0f32;
        let mut recent_state_total = 1.0f32;

        let mut base = 0usize;
        for solution_flow in 0..num_flows {
            while base < read.sequence.len()
                && read.sequence[base] == self.flow_order.nuc_at(solution_flow)
            {
                let mut penalty = [0.0f32; 4];
                let mut called_nuc = 0usize;

                for (n, nuc) in Nuc::ALL.into_iter().enumerate() {
                    let cidx = child_idx[n];
                    self.advance_child(cidx, parent_idx, nuc, num_flows);

                    if nuc == self.flow_order.nuc_at(solution_flow) {
                        called_nuc = n;
                    }

                    let (child, parent) = self.pool.pair_mut(cidx, parent_idx);

                    if child.flow >= num_flows
                        || parent.last_hp >= MAX_HP
                        || parent.sequence.len() >= 2 * num_flows - 10
                    {
                        penalty[n] = SENTINEL_PENALTY;
                        continue;
                    }

                    for flow in parent.window_start..child.window_end {
                        let residual =
                            read.normalized_measurements[flow] - child.prediction[flow];
                        if residual <= 0.0 || flow < child.flow {
                            penalty[n] += residual * residual;
                        }
                    }
                }

                let called_slot = child_idx[called_nuc];
                assert_eq!(
                    self.pool.slots[called_slot].flow, solution_flow,
                    "forced re-walk desynchronized from the flow order"
                );

                recent_state_inphase = self.pool.slots[called_slot].state[solution_flow];
                recent_state_total = 0.0;
                let (ws, we) = (
                    self.pool.slots[called_slot].window_start,
                    self.pool.slots[called_slot].window_end,
                );
                for flow in ws..we {
                    recent_state_total += self.pool.slots[called_slot].state[flow];
                }

                // Residual score and the gap to the best alternative base.
                read.penalty_mismatch[base] = -1.0;
                read.penalty_residual[base] = 0.0;

                let parent_window_start = self.pool.slots[parent_idx].window_start;
                if solution_flow > parent_window_start {
                    read.penalty_residual[base] =
                        penalty[called_nuc] / (solution_flow - parent_window_start) as f32;
                }
                for n in 0..4 {
                    if n == called_nuc {
                        continue;
                    }
                    let gap = penalty[called_nuc] - penalty[n];
                    read.penalty_mismatch[base] = read.penalty_mismatch[base].max(gap);
                }

                // Patch the called child's prediction outside its window.
                {
                    let (child, parent) = self.pool.pair_mut(called_slot, parent_idx);
                    child.prediction[..parent.window_start]
                        .copy_from_slice(&parent.prediction[..parent.window_start]);
                    for flow in child.window_end..num_flows {
                        child.prediction[flow] = 0.0;
                    }
                }

                // The called child is the starting point for the next base.
                std::mem::swap(&mut parent_idx, &mut child_idx[called_nuc]);
                base += 1;
            }

            read.state_inphase[solution_flow] = recent_state_inphase.max(0.01);
            read.state_total[solution_flow] = recent_state_total.max(0.01);
        }

        self.pool.slots[parent_idx].transfer_prediction(read);
    }
}
