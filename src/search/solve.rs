//! Beam decode and simulation
//!
//! The decode loop keeps at most [`NUM_PATHS`](super::NUM_PATHS) partial
//! hypotheses alive. Each round it evicts stragglers, expands the hypothesis
//! with the best path metric by all four bases, admits the children that
//! survive the pruning rules, and scores the expanded hypothesis as a
//! complete solution. The best-scoring complete solution seen so far is
//! what the read ends up with.

use crate::flow::Nuc;
use crate::read::ReadBuffer;
use crate::search::{
    Decoder, DOT_THRESHOLD, EXTEND_THRESHOLD, MAX_PATH_DELAY, NEGATIVE_MULTIPLIER, NUM_PATHS,
    REJECTION_PENALTY, SELECTION_CEILING, SENTINEL_PENALTY,
};
use crate::calib::MAX_HP;

impl Decoder {
    /// Generate the predicted signal for `read.sequence`.
    ///
    /// Advances a single hypothesis through the sequence and moves its
    /// prediction into the read buffer. With `track_state` set, the
    /// in-phase state fraction is recorded per incorporating flow.
    pub fn simulate(&mut self, read: &mut ReadBuffer, max_flows: usize, track_state: bool) {
        let num_flows = self.flow_order.num_flows();
        let max_flows = max_flows.min(num_flows);

        self.pool.slots[0].initialize();

        for i in 0..read.sequence.len() {
            if self.pool.slots[0].flow >= max_flows {
                break;
            }
            let nuc = read.sequence[i];
            self.advance_slot_in_place(0, nuc, num_flows);
            // The slot's own sequence feeds diagonal progression.
            self.pool.slots[0].sequence.push(nuc);
            let flow = self.pool.slots[0].flow;
            if track_state && flow < max_flows {
                read.state_inphase[flow] = self.pool.slots[0].state[flow];
            }
        }

        self.pool.slots[0].transfer_prediction(read);
    }

    /// Tree-search decode of `read.normalized_measurements` into
    /// `read.sequence` and `read.prediction`, processing flows up to
    /// `max_flows`.
    ///
    /// With `restart_flows > 0` the solver does not re-decide the first
    /// `restart_flows` flows: it simulates through the existing
    /// `read.sequence` instead and resumes searching from there. If the
    /// existing sequence ends more than 10 flows before the restart point
    /// the read is left as-is apart from the simulated prediction.
    pub fn solve(&mut self, read: &mut ReadBuffer, max_flows: usize, restart_flows: usize) {
        let num_flows = self.flow_order.num_flows();
        assert!(
            max_flows <= num_flows,
            "solve limit {max_flows} exceeds flow order length {num_flows}"
        );

        if self.recalibrate_predictions {
            self.pool.reset_calibration();
        }
        for p in 1..NUM_PATHS {
            self.pool.slots[p].active = false;
        }
        self.pool.slots[0].initialize();
        self.pool.slots[0].active = true;

        let mut space_on_stack = NUM_PATHS - 1;
        // Squared distance of the best complete solution to the measurements.
        let mut sum_of_squares_upper_bound = 1e20f32;

        if restart_flows > 0 {
            let restart_flows = restart_flows.min(num_flows);

            for i in 0..read.sequence.len() {
                if self.pool.slots[0].flow >= restart_flows {
                    break;
                }
                let nuc = read.sequence[i];
                self.advance_slot_in_place(0, nuc, num_flows);
                if self.pool.slots[0].flow < num_flows {
                    self.pool.slots[0].sequence.push(nuc);
                }
            }

            if self.pool.slots[0].flow + 10 < restart_flows {
                // The read ended before the restart point; nothing to re-solve.
                self.pool.slots[0].transfer_prediction(read);
                return;
            }

            let slot = &mut self.pool.slots[0];
            for flow in 0..slot.window_start {
                let residual = read.normalized_measurements[flow] - slot.prediction[flow];
                slot.residual_left_of_window += residual * residual;
            }
        }

        read.sequence.clear();
        read.sequence.reserve(2 * num_flows);
        read.prediction.iter_mut().for_each(|p| *p = 0.0);

        // Main loop: select, expand, prune until no hypothesis remains.
        loop {
            // Step 1: make room. Kill hypotheses lagging hopelessly behind
            // the most advanced one, then free slots by worst per-flow
            // metric until at least four are open.
            if space_on_stack < NUM_PATHS - 3 {
                let mut longest_path = 0;
                for slot in &self.pool.slots {
                    if slot.active {
                        longest_path = longest_path.max(slot.flow);
                    }
                }
                if longest_path > MAX_PATH_DELAY {
                    for slot in &mut self.pool.slots {
                        if slot.active && slot.flow < longest_path - MAX_PATH_DELAY {
                            slot.active = false;
                            space_on_stack += 1;
                        }
                    }
                }
            }

            while space_on_stack < 4 {
                let mut worst_metric = -0.1f32;
                let mut worst = None;
                for (p, slot) in self.pool.slots.iter().enumerate() {
                    if slot.active && slot.per_flow_metric > worst_metric {
                        worst_metric = slot.per_flow_metric;
                        worst = Some(p);
                    }
                }
                // Structurally impossible to miss: at most 7 slots are
                // occupied and at least one has a positive metric.
                let worst =
                    worst.expect("path pool exhausted with no evictable hypothesis");
                self.pool.slots[worst].active = false;
                space_on_stack += 1;
            }

            // Step 2: select the hypothesis with the best path metric.
            let mut parent_idx = None;
            let mut min_path_metric = SELECTION_CEILING;
            for (p, slot) in self.pool.slots.iter().enumerate() {
                if slot.active && slot.path_metric < min_path_metric {
                    min_path_metric = slot.path_metric;
                    parent_idx = Some(p);
                }
            }
            let Some(parent_idx) = parent_idx else {
                break;
            };

            // Step 3: expand by all four bases and compute penalties.
            debug_assert!(space_on_stack >= 4);
            let mut children = [0usize; 4];
            let mut filled = 0;
            for (p, slot) in self.pool.slots.iter().enumerate() {
                if !slot.active {
                    children[filled] = p;
                    filled += 1;
                    if filled == 4 {
                        break;
                    }
                }
            }
            assert_eq!(filled, 4, "fewer than four free slots after pruning");

            let mut penalty = [0.0f32; 4];

            for (n, nuc) in Nuc::ALL.into_iter().enumerate() {
                let child_idx = children[n];
                self.advance_child(child_idx, parent_idx, nuc, max_flows);
                let (child, parent) = self.pool.pair_mut(child_idx, parent_idx);

                // Easy termination rules.
                if child.flow >= max_flows
                    || child.last_hp > MAX_HP
                    || parent.sequence.len() >= 2 * num_flows - 10
                {
                    penalty[n] = SENTINEL_PENALTY;
                    continue;
                }

                child.path_metric = parent.residual_left_of_window;
                child.residual_left_of_window = parent.residual_left_of_window;

                let mut penalty_negative = 0.0f32;
                let mut penalty_early = 0.0f32;

                for flow in parent.window_start..child.window_end {
                    let residual = read.normalized_measurements[flow] - child.prediction[flow];
                    let squared = residual * residual;

                    if flow < child.window_start {
                        child.residual_left_of_window += squared;
                        child.path_metric += squared;
                    } else if residual <= 0.0 {
                        child.path_metric += squared;
                    }

                    if residual <= 0.0 {
                        penalty_negative += squared;
                    } else if flow < child.flow {
                        penalty_early += squared;
                    }
                }

                penalty[n] = penalty_early + NEGATIVE_MULTIPLIER * penalty_negative;
                let combined = penalty_early + penalty_negative;

                if child.flow > 0 {
                    child.per_flow_metric =
                        (child.path_metric + 0.5 * combined) / child.flow as f32;
                }
            }

            // The greedy choice: lowest penalty, ties to the lowest base
            // index.
            let mut best_nuc = 0;
            for n in 1..4 {
                if penalty[best_nuc] > penalty[n] {
                    best_nuc = n;
                }
            }

            // Step 4: admit the children worth keeping.
            for (n, nuc) in Nuc::ALL.into_iter().enumerate() {
                if penalty[n] >= REJECTION_PENALTY {
                    continue;
                }

                let child_idx = children[n];
                let (child, parent) = self.pool.pair_mut(child_idx, parent_idx);

                if child.path_metric > sum_of_squares_upper_bound {
                    continue;
                }
                if penalty[n] - penalty[best_nuc] >= EXTEND_THRESHOLD {
                    continue;
                }

                // A hypothesis that keeps incorporating into flows showing
                // almost none of the expected signal is drifting; two in a
                // row kills it.
                let dot_signal = (read.normalized_measurements[child.flow]
                    - parent.prediction[child.flow])
                    / child.state[child.flow];
                child.dot_counter = if dot_signal < DOT_THRESHOLD {
                    parent.dot_counter + 1
                } else {
                    0
                };
                if child.dot_counter > 1 {
                    continue;
                }

                child.active = true;
                space_on_stack -= 1;

                // Patch the prediction outside the active window: left of
                // it the parent's values are final, right of it nothing
                // has been produced yet.
                child.prediction[..parent.window_start]
                    .copy_from_slice(&parent.prediction[..parent.window_start]);
                for flow in child.window_end..max_flows {
                    child.prediction[flow] = 0.0;
                }

                child.sequence.clear();
                child.sequence.extend_from_slice(&parent.sequence);
                child.sequence.push(nuc);
            }

            // Step 5: score the parent as a complete solution and free its
            // slot.
            let parent = &mut self.pool.slots[parent_idx];
            let mut sum_of_squares = parent.residual_left_of_window;
            for flow in parent.window_start..max_flows {
                let residual = read.normalized_measurements[flow] - parent.prediction[flow];
                sum_of_squares += residual * residual;
            }

            if sum_of_squares < sum_of_squares_upper_bound {
                parent.transfer_solution(read);
                sum_of_squares_upper_bound = sum_of_squares;
            }

            parent.active = false;
            space_on_stack += 1;
        }
    }
}
