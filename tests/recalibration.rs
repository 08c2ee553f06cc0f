use std::sync::Arc;

use flowcall::{Nuc, RecalibrationModel, MAX_HP};

use test_helpers::*;

#[test]
fn identity_tables_change_nothing() {
    let counts = [1, 0, 2, 1, 0, 1, 1, 0, 1, 2, 0, 1, 1, 0, 0, 1];

    let mut plain = phased_engine(8);
    let order = plain.flow_order().clone();
    let sequence = sequence_from_counts(&order, &counts);
    let mut plain_read = noiseless_read(&mut plain, &sequence);
    plain.solve(&mut plain_read, order.num_flows(), 0);

    let mut recal = phased_engine(8);
    recal
        .set_recalibration(Arc::new(RecalibrationModel::identity(order.num_flows())))
        .expect("model covers the flow order");
    let mut recal_read = noiseless_read(&mut recal, &sequence);
    recal.solve(&mut recal_read, order.num_flows(), 0);

    assert_eq!(plain_read.sequence, recal_read.sequence);
    for flow in 0..order.num_flows() {
        assert!(
            (plain_read.prediction[flow] - recal_read.prediction[flow]).abs() < 1e-6,
            "prediction diverged at flow {flow}"
        );
    }
}

#[test]
fn gain_cells_scale_the_simulated_prediction() {
    let mut engine = ideal_engine(4);
    let order = engine.flow_order().clone();

    // Boost the 1-mer response of the nucleotide flowing at flow 2.
    let mut model = RecalibrationModel::identity(order.num_flows());
    model.set_cell(2, order.nuc_at(2), 1, 1.25, 0.0);
    engine
        .set_recalibration(Arc::new(model))
        .expect("model covers the flow order");

    let sequence = sequence_from_counts(&order, &[1, 0, 1, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    let mut read = noiseless_read(&mut engine, &sequence);
    // noiseless_read simulated with recalibration active, so the signal
    // itself carries the boosted 1-mer.
    assert!((read.raw_measurements[2] - 1.25).abs() < 1e-6);
    assert!((read.raw_measurements[0] - 1.0).abs() < 1e-6);
    assert!((read.raw_measurements[4] - 1.0).abs() < 1e-6);
}

#[test]
fn recalibrated_decode_still_recovers_the_sequence() {
    let counts = [1, 1, 0, 2, 1, 0, 1, 1, 0, 1, 2, 0, 1, 0, 1, 1];

    let mut engine = phased_engine(8);
    let order = engine.flow_order().clone();
    let mut model = RecalibrationModel::identity(order.num_flows());
    for flow in 0..order.num_flows() {
        for nuc in Nuc::ALL {
            for hp in 1..=MAX_HP {
                model.set_cell(flow, nuc, hp, 1.02, 0.01);
            }
        }
    }
    engine
        .set_recalibration(Arc::new(model))
        .expect("model covers the flow order");

    let sequence = sequence_from_counts(&order, &counts);
    // Simulate with recalibration on: the signal embeds the bias model.
    let mut read = noiseless_read(&mut engine, &sequence);
    engine.solve(&mut read, order.num_flows(), 0);

    assert_eq!(read.sequence, sequence);
}

#[test]
fn disabling_recalibration_drops_the_model() {
    let mut engine = ideal_engine(2);
    let num_flows = engine.flow_order().num_flows();
    engine
        .set_recalibration(Arc::new(RecalibrationModel::identity(num_flows)))
        .expect("model covers the flow order");
    assert!(engine.recalibration_active());

    engine.disable_recalibration();
    assert!(!engine.recalibration_active());
    // With no model attached, enabling is a no-op.
    assert!(!engine.enable_recalibration());
}

#[test]
fn attach_rejects_mismatched_flow_counts() {
    let mut engine = ideal_engine(2);
    let result = engine.set_recalibration(Arc::new(RecalibrationModel::identity(4)));
    assert!(result.is_err());
    assert!(!engine.recalibration_active());
}
