use crate::flow::Nuc;
use crate::read::ReadBuffer;

/// One candidate (partial) sequence hypothesis.
///
/// The phasing-state vector is sized for the full run but only
/// `[window_start, window_end)` holds meaningful values; everything
/// outside is implicitly zero. Slots live in a [`PathPool`] and are
/// addressed by index; `active` marks occupancy.
#[derive(Debug, Clone)]
pub(crate) struct PathSlot {
    /// Whether this slot currently holds a live hypothesis.
    pub active: bool,

    /// In-phase flow of the last incorporated base.
    pub flow: usize,
    /// Probability mass of the last base incorporating at each flow.
    pub state: Vec<f32>,
    /// First flow (inclusive) with non-negligible state.
    pub window_start: usize,
    /// Last flow (exclusive) with non-negligible state.
    pub window_end: usize,
    /// Model-predicted phased signal for this hypothesis.
    pub prediction: Vec<f32>,
    /// Base sequence of this hypothesis.
    pub sequence: Vec<Nuc>,
    /// Length of the trailing homopolymer in `sequence`.
    pub last_hp: usize,

    /// Primary tree-search metric (accumulated one-sided residual).
    pub path_metric: f32,
    /// Residual accumulated left of the state window.
    pub residual_left_of_window: f32,
    /// Path metric normalized per flow; eviction-only signal.
    pub per_flow_metric: f32,
    /// Consecutive extreme-mismatch ("dot") incorporations so far.
    pub dot_counter: u32,

    /// Multiplicative recalibration coefficient per in-phase flow.
    pub calib_gain: Vec<f32>,
}

impl PathSlot {
    fn new(num_flows: usize) -> Self {
        Self {
            active: false,
            flow: 0,
            state: vec![0.0; num_flows],
            window_start: 0,
            window_end: 1,
            prediction: vec![0.0; num_flows],
            sequence: Vec::with_capacity(2 * num_flows),
            last_hp: 0,
            path_metric: 0.0,
            residual_left_of_window: 0.0,
            per_flow_metric: 0.0,
            dot_counter: 0,
            calib_gain: vec![1.0; num_flows],
        }
    }

    /// Reset to the empty sequence, the starting point for simulation and
    /// search.
    pub fn initialize(&mut self) {
        self.flow = 0;
        self.state.fill(0.0);
        self.state[0] = 1.0;
        self.window_start = 0;
        self.window_end = 1;
        self.prediction.fill(0.0);
        self.sequence.clear();
        self.last_hp = 0;
        self.path_metric = 0.0;
        self.residual_left_of_window = 0.0;
        self.per_flow_metric = 0.0;
        self.dot_counter = 0;
    }

    /// Move this hypothesis's sequence and prediction into the read
    /// buffer, taking the buffer's previous contents in exchange so both
    /// sides keep their allocations.
    pub fn transfer_solution(&mut self, read: &mut ReadBuffer) {
        std::mem::swap(&mut read.prediction, &mut self.prediction);
        std::mem::swap(&mut read.sequence, &mut self.sequence);
    }

    /// Prediction-only variant of [`PathSlot::transfer_solution`].
    pub fn transfer_prediction(&mut self, read: &mut ReadBuffer) {
        std::mem::swap(&mut read.prediction, &mut self.prediction);
    }
}

/// Fixed-capacity arena of path slots, preallocated once per engine and
/// reused across reads. Never grown.
#[derive(Debug, Clone)]
pub(crate) struct PathPool {
    pub slots: Vec<PathSlot>,
}

impl PathPool {
    pub fn new(capacity: usize, num_flows: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| PathSlot::new(num_flows)).collect(),
        }
    }

    /// Disjoint mutable/shared access to two distinct slots.
    pub fn pair_mut(&mut self, target: usize, source: usize) -> (&mut PathSlot, &PathSlot) {
        assert_ne!(target, source, "a slot cannot be advanced onto itself");
        if target < source {
            let (left, right) = self.slots.split_at_mut(source);
            (&mut left[target], &right[0])
        } else {
            let (left, right) = self.slots.split_at_mut(target);
            (&mut right[0], &left[source])
        }
    }

    /// Restore neutral recalibration coefficients in every slot.
    pub fn reset_calibration(&mut self) {
        for slot in &mut self.slots {
            slot.calib_gain.fill(1.0);
        }
    }
}
