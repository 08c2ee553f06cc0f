//! Iterated normalize+solve drivers against distorted clean signal.

use test_helpers::*;

/// Apply a deterministic gain and offset distortion to a read's raw
/// signal, as an instrument drift stand-in.
fn distort(read: &mut flowcall::ReadBuffer, gain: f32, offset: f32) {
    let num_flows = read.num_flows();
    let raw: Vec<f32> = read
        .raw_measurements
        .iter()
        .map(|&value| value * gain + offset)
        .collect();
    read.set_data(&raw, num_flows);
}

#[test]
fn adaptive_driver_recovers_distorted_reads() {
    let mut engine = phased_engine(16);
    let order = engine.flow_order().clone();
    let counts = [
        1, 0, 2, 1, 0, 1, 1, 0, 1, 2, 0, 1, 1, 0, 0, 1, 2, 1, 0, 1, 0, 1, 1, 0, 1, 0, 2, 1, 1,
        0, 1, 0,
    ];
    let sequence = sequence_from_counts(&order, &counts);

    let mut read = noiseless_read(&mut engine, &sequence);
    distort(&mut read, 1.06, 0.04);

    engine.normalize_and_solve_adaptive(&mut read, order.num_flows());

    assert_eq!(
        read.sequence, sequence,
        "decoded {:?}",
        read.sequence_string()
    );
}

#[test]
fn sliding_driver_recovers_distorted_reads() {
    let mut engine = phased_engine(16);
    let order = engine.flow_order().clone();
    let counts = [
        1, 1, 0, 2, 1, 0, 1, 1, 0, 1, 2, 0, 1, 0, 1, 1, 0, 1, 1, 2, 0, 1, 0, 1, 1, 0, 1, 0, 2,
        1, 0, 1,
    ];
    let sequence = sequence_from_counts(&order, &counts);

    let mut read = noiseless_read(&mut engine, &sequence);
    distort(&mut read, 0.95, 0.02);

    engine.normalize_and_solve_sliding(&mut read, order.num_flows());

    assert_eq!(read.sequence, sequence);
}

#[test]
fn gain_driver_recovers_scaled_reads() {
    let mut engine = ideal_engine(40);
    let order = engine.flow_order().clone();
    let counts: Vec<u32> = (0..order.num_flows() as u32)
        .map(|flow| match flow % 5 {
            0 | 2 => 1,
            3 => 2,
            _ => 0,
        })
        .collect();
    let sequence = sequence_from_counts(&order, &counts);

    let mut read = noiseless_read(&mut engine, &sequence);
    distort(&mut read, 1.08, 0.0);

    engine.normalize_and_solve_gain(&mut read, order.num_flows());

    assert_eq!(read.sequence, sequence);
}

#[test]
fn pid_normalization_tracks_a_constant_gain_error() {
    let mut engine = ideal_engine(50);
    let order = engine.flow_order().clone();
    let counts: Vec<u32> = (0..order.num_flows() as u32)
        .map(|flow| (flow % 2 == 0) as u32)
        .collect();
    let sequence = sequence_from_counts(&order, &counts);

    let mut read = noiseless_read(&mut engine, &sequence);
    // Keep the true prediction as the reference, scale only the signal.
    let raw: Vec<f32> = read.raw_measurements.iter().map(|&v| v * 1.1).collect();
    read.raw_measurements.copy_from_slice(&raw);
    read.sequence = sequence.clone();
    engine.simulate(&mut read, order.num_flows(), false);

    engine.pid_normalize(&mut read, order.num_flows());

    let last = order.num_flows() - 1;
    let settled_gain = read.multiplicative_correction[last - 1];
    assert!(
        (settled_gain - 1.1).abs() < 0.05,
        "gain settled at {settled_gain}"
    );
    assert!(read.multiplicative_correction.iter().all(|&g| g > 0.0));
}

#[test]
fn pid_range_normalization_reports_the_mean_gain() {
    let mut engine = ideal_engine(50);
    let order = engine.flow_order().clone();
    let counts: Vec<u32> = (0..order.num_flows() as u32)
        .map(|flow| (flow % 2 == 0) as u32)
        .collect();
    let sequence = sequence_from_counts(&order, &counts);

    let mut read = noiseless_read(&mut engine, &sequence);
    let raw: Vec<f32> = read.raw_measurements.iter().map(|&v| v * 1.15).collect();
    read.raw_measurements.copy_from_slice(&raw);
    read.sequence = sequence.clone();
    engine.simulate(&mut read, order.num_flows(), false);

    let num_flows = order.num_flows();
    let mean_gain = engine.pid_normalize_range(&mut read, num_flows - 60, num_flows);

    assert!(
        (mean_gain - 1.15).abs() < 0.05,
        "mean gain over the tail was {mean_gain}"
    );
}
