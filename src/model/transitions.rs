use crate::flow::{FlowOrder, Nuc};
use crate::model::PhasingParams;

/// Per-nucleotide, per-flow transition probabilities derived from the
/// phasing rates.
///
/// For each flow the model tracks a per-nucleotide "availability" that is
/// reset to 1 when that nucleotide flows and decays multiplicatively by
/// the carry-forward rate on every subsequent flow. `base` is the mass
/// that incorporates (emits signal) at a flow; `stay` is the mass that
/// remains live without incorporating. Droop removes mass into a dead
/// state entirely.
///
/// Recomputation is skipped when the rate triple is unchanged.
#[derive(Debug, Clone)]
pub struct TransitionModel {
    base: [Vec<f32>; 4],
    stay: [Vec<f32>; 4],
    rates: Option<PhasingParams>,
}

impl TransitionModel {
    /// Allocate tables for `num_flows` flows. No rates are set yet.
    pub fn new(num_flows: usize) -> Self {
        Self {
            base: std::array::from_fn(|_| vec![0.0; num_flows]),
            stay: std::array::from_fn(|_| vec![0.0; num_flows]),
            rates: None,
        }
    }

    /// Recompute the tables for `params` against `flow_order`.
    ///
    /// Returns `true` when the tables were actually recomputed, `false` on
    /// a cache hit.
    pub fn set_parameters(&mut self, flow_order: &FlowOrder, params: PhasingParams) -> bool {
        if self.rates == Some(params) {
            return false;
        }

        let mut availability = [0.0f64; 4];
        for flow in 0..flow_order.num_flows() {
            availability[flow_order.int_at(flow)] = 1.0;
            for nuc in 0..4 {
                let avail = availability[nuc];
                // With dr == 0 the stay term reduces to 1 - base, which is
                // exactly the droop-free model.
                self.base[nuc][flow] = (avail * (1.0 - params.dr) * (1.0 - params.ie)) as f32;
                self.stay[nuc][flow] =
                    ((1.0 - avail) + avail * (1.0 - params.dr) * params.ie) as f32;
                availability[nuc] *= params.cf;
            }
        }

        self.rates = Some(params);
        true
    }

    /// Incorporation probability row for `nuc`.
    #[inline]
    pub fn base(&self, nuc: Nuc) -> &[f32] {
        &self.base[nuc.index()]
    }

    /// Live-without-incorporating probability row for `nuc`.
    #[inline]
    pub fn stay(&self, nuc: Nuc) -> &[f32] {
        &self.stay[nuc.index()]
    }

    /// The rates the tables were last computed for.
    pub fn rates(&self) -> Option<PhasingParams> {
        self.rates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> FlowOrder {
        FlowOrder::new("TACG", 12).unwrap()
    }

    #[test]
    fn zero_rates_give_indicator_tables() {
        let order = order();
        let mut model = TransitionModel::new(order.num_flows());
        model.set_parameters(&order, PhasingParams::ideal());

        for nuc in Nuc::ALL {
            for flow in 0..order.num_flows() {
                let expected = if order.nuc_at(flow) == nuc { 1.0 } else { 0.0 };
                assert_eq!(model.base(nuc)[flow], expected, "{nuc:?} flow {flow}");
                assert_eq!(model.stay(nuc)[flow], 1.0 - expected);
            }
        }
    }

    #[test]
    fn base_is_zero_before_first_occurrence() {
        let order = order();
        let mut model = TransitionModel::new(order.num_flows());
        model
            .set_parameters(&order, PhasingParams::new(0.02, 0.01, 0.001).unwrap());

        // Flow order TACG: G first flows at index 3.
        for flow in 0..3 {
            assert_eq!(model.base(Nuc::G)[flow], 0.0);
        }
        assert!(model.base(Nuc::G)[3] > 0.0);
    }

    #[test]
    fn incomplete_extension_strictly_decreases_base() {
        let order = order();
        let mut low = TransitionModel::new(order.num_flows());
        low.set_parameters(&order, PhasingParams::new(0.01, 0.005, 0.0).unwrap());
        let mut high = TransitionModel::new(order.num_flows());
        high.set_parameters(&order, PhasingParams::new(0.01, 0.05, 0.0).unwrap());

        for nuc in Nuc::ALL {
            let first = (0..order.num_flows())
                .find(|&f| order.nuc_at(f) == nuc)
                .unwrap();
            for flow in first..order.num_flows() {
                if low.base(nuc)[flow] > 0.0 {
                    assert!(
                        high.base(nuc)[flow] < low.base(nuc)[flow],
                        "{nuc:?} flow {flow}"
                    );
                }
            }
        }
    }

    #[test]
    fn unchanged_rates_hit_the_cache() {
        let order = order();
        let mut model = TransitionModel::new(order.num_flows());
        let params = PhasingParams::new(0.01, 0.008, 0.0005).unwrap();
        assert!(model.set_parameters(&order, params));
        assert!(!model.set_parameters(&order, params));
        assert!(model.set_parameters(&order, PhasingParams::ideal()));
    }
}
