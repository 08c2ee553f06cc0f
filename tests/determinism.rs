use std::collections::HashSet;

use blake3::Hasher;
use flowcall::ReadBuffer;

use test_helpers::*;

fn fingerprint(read: &ReadBuffer) -> blake3::Hash {
    let mut hasher = Hasher::new();
    hasher.update(read.sequence_string().as_bytes());
    for value in &read.prediction {
        hasher.update(&value.to_le_bytes());
    }
    for value in &read.normalized_measurements {
        hasher.update(&value.to_le_bytes());
    }
    hasher.finalize()
}

#[test]
fn decoding_is_deterministic() {
    let mut fingerprints = HashSet::new();

    for _ in 0..5 {
        let mut engine = phased_engine(8);
        let order = engine.flow_order().clone();
        let counts = [1, 0, 2, 1, 0, 1, 1, 0, 1, 2, 0, 1, 1, 0, 0, 1];
        let sequence = sequence_from_counts(&order, &counts);

        let mut read = noiseless_read(&mut engine, &sequence);
        // Mild deterministic distortion so normalization has work to do.
        for (flow, value) in read.raw_measurements.iter_mut().enumerate() {
            *value = *value * 1.04 + 0.01 * ((flow % 3) as f32);
        }
        let raw = read.raw_measurements.clone();
        read.set_data(&raw, order.num_flows());

        engine.normalize_and_solve_adaptive(&mut read, order.num_flows());
        fingerprints.insert(fingerprint(&read));
    }

    assert_eq!(fingerprints.len(), 1, "outputs diverged across runs");
}
