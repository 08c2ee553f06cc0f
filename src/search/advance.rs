//! Path state advancement
//!
//! Both advancement variants share one algorithm: find the next flow that
//! expects the incorporated nucleotide, propagate the windowed phasing
//! state to it, and fold the new emission mass into the prediction. The
//! branching variant writes a child slot from a fixed parent (tree
//! expansion); the in-place variant mutates a single slot (simulation).

use crate::calib::{RecalibrationModel, MAX_HP};
use crate::flow::{FlowOrder, Nuc};
use crate::model::TransitionModel;
use crate::search::{Decoder, PathSlot, STATE_WINDOW_CUTOFF};

impl Decoder {
    /// Extend `parent` by one `nuc` into the `child` slot.
    pub(crate) fn advance_child(
        &mut self,
        child_idx: usize,
        parent_idx: usize,
        nuc: Nuc,
        max_flow: usize,
    ) {
        let recal = if self.recalibrate_predictions {
            self.recal.as_deref()
        } else {
            None
        };
        let diagonal = self.diagonal_states;
        let order = &self.flow_order;
        let model = &self.model;
        let (child, parent) = self.pool.pair_mut(child_idx, parent_idx);
        advance_into(child, parent, nuc, max_flow, order, model, recal, diagonal);
    }

    /// Extend the slot at `slot_idx` by one `nuc` in place.
    pub(crate) fn advance_slot_in_place(&mut self, slot_idx: usize, nuc: Nuc, max_flow: usize) {
        let recal = if self.recalibrate_predictions {
            self.recal.as_deref()
        } else {
            None
        };
        let diagonal = self.diagonal_states;
        let order = &self.flow_order;
        let model = &self.model;
        let slot = &mut self.pool.slots[slot_idx];
        advance_in_place(slot, nuc, max_flow, order, model, recal, diagonal);
    }
}

/// Branching advancement: `child` becomes `parent` extended by `nuc`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn advance_into(
    child: &mut PathSlot,
    parent: &PathSlot,
    nuc: Nuc,
    max_flow: usize,
    order: &FlowOrder,
    model: &TransitionModel,
    recal: Option<&RecalibrationModel>,
    diagonal: bool,
) {
    // Diagonal progression forces one flow of advancement per base,
    // capping homopolymers at length one.
    let diagonal_shift = usize::from(diagonal && !parent.sequence.is_empty());

    // Advance the in-phase flow to the next one expecting `nuc`.
    child.flow = parent.flow + diagonal_shift;
    while child.flow < max_flow && order.nuc_at(child.flow) != nuc {
        child.flow += 1;
    }

    if child.flow == parent.flow {
        child.last_hp = parent.last_hp + 1;
    } else {
        child.last_hp = 1;
    }
    let calib_hp = child.last_hp.min(MAX_HP);

    child.window_start = parent.window_start + diagonal_shift;
    child.window_end = (parent.window_end + diagonal_shift).min(max_flow);

    // Log the recalibration coefficients along this path: zero-mer
    // coefficients for the flows skipped over, the homopolymer-dependent
    // one at the incorporation flow.
    if let Some(recal) = recal {
        child.calib_gain.copy_from_slice(&parent.calib_gain);
        for flow in parent.flow + 1..child.flow {
            child.calib_gain[flow] = recal.gain_at(flow, order.nuc_at(flow), 0);
        }
        if child.flow < max_flow {
            child.calib_gain[child.flow] =
                recal.gain_at(child.flow, order.nuc_at(child.flow), calib_hp);
        }
    }

    let base = model.base(nuc);
    let stay = model.stay(nuc);

    if parent.flow != child.flow || parent.flow == 0 {
        // This base begins a new homopolymer: propagate the live mass
        // through the window, trimming the left edge as values fall below
        // the cutoff and growing the right edge while mass still arrives.
        let mut alive = 0.0f32;
        if parent.window_start < child.state.len() {
            child.state[parent.window_start] = 0.0;
        }

        let mut flow = parent.window_start + diagonal_shift;
        while flow < child.window_end {
            if flow - diagonal_shift < parent.window_end {
                alive += parent.state[flow - diagonal_shift];
            }
            child.state[flow] = alive * base[flow];
            alive *= stay[flow];

            if flow == child.window_start && child.state[flow] < STATE_WINDOW_CUTOFF {
                child.window_start += 1;
            }
            if flow == child.window_end - 1
                && child.window_end < max_flow
                && alive > STATE_WINDOW_CUTOFF
            {
                child.window_end += 1;
            }
            flow += 1;
        }
    } else {
        // The base merely prolongs the current homopolymer; the window did
        // not move, so the state carries over unchanged.
        let (ws, we) = (child.window_start, child.window_end);
        child.state[ws..we].copy_from_slice(&parent.state[ws..we]);
    }

    // Fold the emission mass into the prediction. Correction coefficients
    // depend on the resulting homopolymer length, so at the incorporation
    // flow the parent's already-recalibrated value must first be inverted
    // with the previous length's coefficients.
    for flow in parent.window_start..parent.window_end {
        match recal {
            Some(recal) if flow <= child.flow => {
                if flow < child.flow || child.last_hp > MAX_HP {
                    child.prediction[flow] =
                        parent.prediction[flow] + child.calib_gain[flow] * child.state[flow];
                } else {
                    let nuc_here = order.nuc_at(flow);
                    let prior_gain = recal.gain_at(flow, nuc_here, child.last_hp - 1);
                    let mut uncalibrated = parent.prediction[flow];
                    if child.last_hp > 1 && prior_gain > 0.0 {
                        uncalibrated = (parent.prediction[flow]
                            - recal.offset_at(flow, nuc_here, child.last_hp - 1))
                            / prior_gain;
                    }
                    child.prediction[flow] = (uncalibrated + child.state[flow])
                        * child.calib_gain[flow]
                        + recal.offset_at(flow, nuc_here, calib_hp);
                }
            }
            _ => {
                child.prediction[flow] = parent.prediction[flow] + child.state[flow];
            }
        }
    }
    for flow in parent.window_end..child.window_end {
        match recal {
            Some(recal) if flow <= child.flow => {
                child.prediction[flow] = child.state[flow] * child.calib_gain[flow];
                if flow == child.flow {
                    child.prediction[flow] +=
                        recal.offset_at(flow, order.nuc_at(flow), calib_hp);
                }
            }
            _ => {
                child.prediction[flow] = child.state[flow];
            }
        }
    }
}

/// In-place advancement: `slot` is extended by `nuc`, accumulating into
/// its own prediction.
#[allow(clippy::too_many_arguments)]
pub(crate) fn advance_in_place(
    slot: &mut PathSlot,
    nuc: Nuc,
    max_flow: usize,
    order: &FlowOrder,
    model: &TransitionModel,
    recal: Option<&RecalibrationModel>,
    diagonal: bool,
) {
    let old_flow = slot.flow;

    if diagonal && !slot.sequence.is_empty() {
        slot.flow += 1;
        slot.window_end = (slot.window_end + 1).min(max_flow);
        for flow in (slot.window_start + 1..slot.window_end).rev() {
            slot.state[flow] = slot.state[flow - 1];
        }
        slot.state[slot.window_start] = 0.0;
        slot.window_start += 1;
    }
    let old_window_start = slot.window_start;
    let old_window_end = slot.window_end;

    while slot.flow < max_flow && order.nuc_at(slot.flow) != nuc {
        slot.flow += 1;
    }
    if slot.flow == max_flow {
        // The base does not fit any more.
        return;
    }

    if old_flow == slot.flow {
        slot.last_hp += 1;
    } else {
        slot.last_hp = 1;
    }
    let calib_hp = slot.last_hp.min(MAX_HP);

    if let Some(recal) = recal {
        for flow in old_flow + 1..slot.flow {
            slot.calib_gain[flow] = recal.gain_at(flow, order.nuc_at(flow), 0);
        }
        slot.calib_gain[slot.flow] = recal.gain_at(slot.flow, order.nuc_at(slot.flow), calib_hp);
    }

    let base = model.base(nuc);
    let stay = model.stay(nuc);

    if old_flow != slot.flow || old_flow == 0 {
        let mut alive = 0.0f32;
        let mut flow = old_window_start;
        while flow < slot.window_end {
            if flow < old_window_end {
                alive += slot.state[flow];
            }
            slot.state[flow] = alive * base[flow];
            alive *= stay[flow];

            if flow == slot.window_start && slot.state[flow] < STATE_WINDOW_CUTOFF {
                slot.window_start += 1;
            }
            if flow == slot.window_end - 1
                && slot.window_end < max_flow
                && alive > STATE_WINDOW_CUTOFF
            {
                slot.window_end += 1;
            }
            flow += 1;
        }
    }

    for flow in old_window_start..slot.window_end {
        match recal {
            Some(recal) if flow <= slot.flow => {
                if flow < slot.flow || slot.last_hp > MAX_HP {
                    slot.prediction[flow] += slot.calib_gain[flow] * slot.state[flow];
                } else {
                    let nuc_here = order.nuc_at(flow);
                    let prior_gain = recal.gain_at(flow, nuc_here, slot.last_hp - 1);
                    let mut uncalibrated = slot.prediction[flow];
                    if slot.last_hp > 1 && prior_gain > 0.0 {
                        uncalibrated = (slot.prediction[flow]
                            - recal.offset_at(flow, nuc_here, slot.last_hp - 1))
                            / prior_gain;
                    }
                    slot.prediction[flow] = (uncalibrated + slot.state[flow])
                        * slot.calib_gain[flow]
                        + recal.offset_at(flow, nuc_here, calib_hp);
                }
            }
            _ => {
                slot.prediction[flow] += slot.state[flow];
            }
        }
    }
}
