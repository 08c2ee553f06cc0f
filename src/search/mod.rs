//! Tree-search decoder
//!
//! The [`Decoder`] owns everything needed to process one read at a time:
//! the flow order, the derived transition tables, a fixed pool of path
//! hypotheses, the PID normalization loops and an optional recalibration
//! model. It exposes decoding ([`Decoder::solve`]), simulation
//! ([`Decoder::simulate`]), the iterative normalize+solve drivers, QV
//! metric generation and phasing-state queries.
//!
//! Everything is single-threaded and allocation-free per call; for
//! concurrent use, give each worker its own engine.

mod advance;
mod path;
mod qv;
mod query;
mod solve;

use std::sync::Arc;

use crate::calib::RecalibrationModel;
use crate::flow::FlowOrder;
use crate::model::{PhasingParams, TransitionModel};
use crate::normalize::{
    self, PidLoop, DEFAULT_WINDOW_SIZE, D_GAIN, I_GAIN, MAX_WINDOW_SIZE, MIN_WINDOW_SIZE, P_GAIN,
};
use crate::read::ReadBuffer;
use crate::EngineError;

pub(crate) use path::{PathPool, PathSlot};

// Search tuning. These are empirically tuned against reference output and
// have material effect on decode accuracy; change them only deliberately.

/// Number of co-resident path hypotheses.
pub(crate) const NUM_PATHS: usize = 8;
/// A child whose penalty trails the best child's by this much is dropped.
pub(crate) const EXTEND_THRESHOLD: f32 = 0.2;
/// Extra weight on negative (over-predicted) residuals.
pub(crate) const NEGATIVE_MULTIPLIER: f32 = 2.0;
/// Fraction of expected signal below which a flow counts as a "dot".
pub(crate) const DOT_THRESHOLD: f32 = 0.3;
/// State values below this are dropped from the window.
pub(crate) const STATE_WINDOW_CUTOFF: f32 = 1e-6;
/// Hypotheses lagging more than this many flows behind the front are
/// assumed lost and evicted.
pub(crate) const MAX_PATH_DELAY: usize = 40;
/// Sentinel penalty marking a child for deletion.
pub(crate) const SENTINEL_PENALTY: f32 = 25.0;
/// Children at or above this penalty are never admitted.
pub(crate) const REJECTION_PENALTY: f32 = 20.0;
/// Hypotheses at or above this path metric are never selected for
/// expansion.
pub(crate) const SELECTION_CEILING: f32 = 1000.0;

/// Flow-space base-calling engine.
///
/// One instance decodes one read at a time end-to-end using its
/// preallocated path pool; it owns no cross-call state tied to a specific
/// read. The recalibration model, when attached, is shared read-only.
#[derive(Debug)]
pub struct Decoder {
    flow_order: FlowOrder,
    model: TransitionModel,
    pool: PathPool,
    window_size: usize,

    recal: Option<Arc<RecalibrationModel>>,
    recalibrate_predictions: bool,
    skip_recal_during_normalization: bool,
    diagonal_states: bool,

    pid_offset: PidLoop,
    pid_gain: PidLoop,
}

impl Decoder {
    /// Engine over `flow_order` with the default normalization window.
    pub fn new(flow_order: FlowOrder) -> Self {
        Self::with_window_size(flow_order, DEFAULT_WINDOW_SIZE)
    }

    /// Engine over `flow_order` with an explicit normalization window
    /// size, clamped to the accepted range.
    pub fn with_window_size(flow_order: FlowOrder, window_size: usize) -> Self {
        let num_flows = flow_order.num_flows();
        Self {
            model: TransitionModel::new(num_flows),
            pool: PathPool::new(NUM_PATHS, num_flows),
            window_size: window_size.clamp(MIN_WINDOW_SIZE, MAX_WINDOW_SIZE),
            recal: None,
            recalibrate_predictions: false,
            skip_recal_during_normalization: false,
            diagonal_states: false,
            pid_offset: PidLoop::new(P_GAIN, I_GAIN, D_GAIN),
            pid_gain: PidLoop::new(P_GAIN, I_GAIN, D_GAIN),
            flow_order,
        }
    }

    /// The flow order this engine decodes against.
    pub fn flow_order(&self) -> &FlowOrder {
        &self.flow_order
    }

    /// Current normalization window size.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Set the normalization window size, clamped to the accepted range.
    pub fn set_normalization_window_size(&mut self, window_size: usize) {
        self.window_size = window_size.clamp(MIN_WINDOW_SIZE, MAX_WINDOW_SIZE);
    }

    /// Set the phasing rates; the transition tables are recomputed only
    /// when the triple actually changed. Returns `true` on recompute.
    pub fn set_phasing(&mut self, params: PhasingParams) -> bool {
        self.model.set_parameters(&self.flow_order, params)
    }

    /// Direct access to the derived transition tables.
    pub fn transition_model(&self) -> &TransitionModel {
        &self.model
    }

    /// Force at least one flow of advancement per incorporated base,
    /// capping every homopolymer at length one.
    pub fn set_diagonal_progression(&mut self, diagonal: bool) {
        self.diagonal_states = diagonal;
    }

    /// Attach a recalibration model and enable its use. The model must
    /// cover this engine's flow count.
    pub fn set_recalibration(
        &mut self,
        model: Arc<RecalibrationModel>,
    ) -> Result<(), EngineError> {
        if model.num_flows() != self.flow_order.num_flows() {
            return Err(EngineError::TableShape(format!(
                "recalibration model covers {} flows, engine has {}",
                model.num_flows(),
                self.flow_order.num_flows()
            )));
        }
        self.recal = Some(model);
        self.recalibrate_predictions = true;
        Ok(())
    }

    /// Re-enable recalibration if a model is attached. Returns whether
    /// recalibration is now active.
    pub fn enable_recalibration(&mut self) -> bool {
        self.recalibrate_predictions = self.recal.is_some();
        self.recalibrate_predictions
    }

    /// Disable recalibration and drop the attached model.
    pub fn disable_recalibration(&mut self) {
        self.recal = None;
        self.recalibrate_predictions = false;
    }

    /// Whether recalibration is applied during state advancement.
    pub fn recalibration_active(&self) -> bool {
        self.recalibrate_predictions
    }

    /// Suppress recalibration during the iterative normalization passes of
    /// the drivers, re-enabling it only for their final full-range solve.
    pub fn skip_recal_during_normalization(&mut self, skip: bool) {
        self.skip_recal_during_normalization = skip;
    }

    /// Correct for a uniform multiplicative scaling against the current
    /// prediction. Returns the divisor applied.
    pub fn ratio_normalize(&self, read: &mut ReadBuffer, start_flow: usize, end_flow: usize) -> f32 {
        normalize::ratio_normalize(read, start_flow, end_flow)
    }

    /// Correct for flow-varying additive and multiplicative distortion
    /// with windowed medians.
    pub fn windowed_normalize(&self, read: &mut ReadBuffer, num_steps: usize) {
        normalize::windowed_normalize(read, num_steps, self.window_size);
    }

    /// Correct for flow-varying gain and offset distortion with the PID
    /// control loops over the first `num_samples` flows.
    pub fn pid_normalize(&mut self, read: &mut ReadBuffer, num_samples: usize) {
        normalize::pid_normalize(read, &mut self.pid_offset, &mut self.pid_gain, num_samples);
    }

    /// Gain-only PID correction; returns the mean gain over
    /// `[start_flow, end_flow)`. Used during phase-parameter estimation.
    pub fn pid_normalize_range(
        &mut self,
        read: &mut ReadBuffer,
        start_flow: usize,
        end_flow: usize,
    ) -> f32 {
        normalize::pid_normalize_range(read, &mut self.pid_gain, start_flow, end_flow)
    }

    /// Adaptive normalization: windowed-median normalize and re-solve over
    /// a growing flow range, one window per iteration.
    pub fn normalize_and_solve_adaptive(&mut self, read: &mut ReadBuffer, max_flows: usize) {
        let window_size = self.window_size;
        if self.skip_recal_during_normalization {
            self.recalibrate_predictions = false;
        }

        let mut solve_flows = 0;
        let mut num_steps = 1;
        while solve_flows < max_flows {
            solve_flows = ((num_steps + 1) * window_size).min(max_flows);
            self.solve(read, solve_flows, 0);
            normalize::windowed_normalize(read, num_steps, window_size);
            num_steps += 1;
        }

        self.enable_recalibration();
        self.solve(read, max_flows, 0);
    }

    /// Gain normalization: ratio-normalize and re-solve over seven fixed
    /// flow increments. Less accurate than the windowed driver.
    pub fn normalize_and_solve_gain(&mut self, read: &mut ReadBuffer, max_flows: usize) {
        if self.skip_recal_during_normalization {
            self.recalibrate_predictions = false;
        }

        for iteration in 0..7 {
            let solve_flows = 100 + 20 * iteration;
            if solve_flows < max_flows {
                self.solve(read, solve_flows, 0);
                normalize::ratio_normalize(read, 11, solve_flows - 20);
            }
        }

        self.enable_recalibration();
        self.solve(read, max_flows, 0);
    }

    /// Sliding-window adaptive normalization: like the adaptive driver but
    /// each solve fast-forwards through the prefix decided 100 flows ago.
    pub fn normalize_and_solve_sliding(&mut self, read: &mut ReadBuffer, max_flows: usize) {
        let window_size = self.window_size;
        if self.skip_recal_during_normalization {
            self.recalibrate_predictions = false;
        }

        let mut solve_flows = 0;
        let mut num_steps = 1;
        while solve_flows < max_flows {
            solve_flows = ((num_steps + 1) * window_size).min(max_flows);
            let restart_flows = solve_flows.saturating_sub(100);
            self.solve(read, solve_flows, restart_flows);
            normalize::windowed_normalize(read, num_steps, window_size);
            num_steps += 1;
        }

        self.enable_recalibration();
        self.solve(read, max_flows, 0);
    }

}
