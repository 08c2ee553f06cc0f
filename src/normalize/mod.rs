//! Signal normalization strategies
//!
//! All strategies correct the raw measurements against the *current*
//! prediction, so normalization and decoding can be iterated: each pass
//! uses the previous decode's prediction as its moving reference.
//!
//! Three interchangeable strategies are provided: a single global ratio
//! ([`ratio_normalize`]), a windowed median with interpolation
//! ([`windowed_normalize`]) and a PID control loop
//! ([`pid_normalize`] / [`pid_normalize_range`]).

mod pid;

pub use pid::{PidLoop, D_GAIN, INIT_GAIN, INIT_OFFSET, I_GAIN, P_GAIN};

use crate::read::ReadBuffer;

/// Smallest accepted windowed-normalization window, in flows.
pub const MIN_WINDOW_SIZE: usize = 20;
/// Largest accepted windowed-normalization window, in flows.
pub const MAX_WINDOW_SIZE: usize = 60;
/// Default windowed-normalization window, in flows.
pub const DEFAULT_WINDOW_SIZE: usize = 38;

/// Predictions below this are treated as empty flows when estimating the
/// additive offset.
const CLEAN_ZERO_LIMIT: f32 = 0.3;
/// Gain estimation uses flows whose prediction lies in
/// `(CLEAN_ONE_LOWER, CLEAN_ONE_UPPER]`.
const CLEAN_ONE_LOWER: f32 = 0.5;
const CLEAN_ONE_UPPER: f32 = 4.0;
/// A window must contribute more than this many clean flows for its median
/// to replace the running correction.
const MIN_MEDIAN_SET: usize = 5;

/// Correct for a uniform multiplicative scaling.
///
/// The divisor is the ratio of summed raw measurements to summed
/// predictions over flows with prediction in the clean 1-mer band,
/// restricted to `[start_flow, end_flow)`. When the band is empty (or a
/// sum is non-positive) the divisor falls back to 1 and the pass is a
/// no-op. Returns the divisor.
pub fn ratio_normalize(read: &mut ReadBuffer, start_flow: usize, end_flow: usize) -> f32 {
    let num_flows = read.raw_measurements.len();

    let mut raw_sum = 0.0f32;
    let mut prediction_sum = 0.0f32;
    for flow in start_flow..end_flow.min(num_flows) {
        let prediction = read.prediction[flow];
        if prediction > CLEAN_ONE_LOWER && prediction <= CLEAN_ONE_UPPER {
            raw_sum += read.raw_measurements[flow];
            prediction_sum += prediction;
        }
    }

    let mut divisor = 1.0f32;
    if raw_sum > 0.0 && prediction_sum > 0.0 {
        divisor = raw_sum / prediction_sum;
    }

    for flow in 0..num_flows {
        read.normalized_measurements[flow] = read.raw_measurements[flow] / divisor;
    }
    read.additive_correction.iter_mut().for_each(|c| *c = 0.0);
    read
        .multiplicative_correction
        .iter_mut()
        .for_each(|c| *c = divisor);

    divisor
}

/// Correct for flow-varying additive and multiplicative distortion.
///
/// Two independent passes partition the flows into `num_steps` windows of
/// `window_size` flows. Each window estimates its correction as the median
/// residual (offset pass, empty flows only) or median ratio (gain pass,
/// 1-mer flows with positive signal), and the correction is linearly
/// interpolated between consecutive window midpoints when applied.
pub fn windowed_normalize(read: &mut ReadBuffer, num_steps: usize, window_size: usize) {
    let num_flows = read.raw_measurements.len();
    let mut median_set: Vec<f32> = Vec::with_capacity(window_size);

    // Estimate and correct for additive offset.
    let mut next_normalizer = 0.0f32;
    let mut estim_flow = 0usize;
    let mut apply_flow = 0usize;

    for step in 0..num_steps {
        let window_end = estim_flow + window_size;
        let window_middle = estim_flow + window_size / 2;
        if window_middle > num_flows {
            break;
        }

        let mut normalizer = next_normalizer;

        median_set.clear();
        while estim_flow < window_end && estim_flow < num_flows {
            if read.prediction[estim_flow] < CLEAN_ZERO_LIMIT {
                median_set.push(read.raw_measurements[estim_flow] - read.prediction[estim_flow]);
            }
            estim_flow += 1;
        }
        if median_set.len() > MIN_MEDIAN_SET {
            let middle = median_set.len() / 2;
            median_set.select_nth_unstable_by(middle, f32::total_cmp);
            next_normalizer = median_set[middle];
            if step == 0 {
                normalizer = next_normalizer;
            }
        }

        let delta = (next_normalizer - normalizer) / window_size as f32;
        while apply_flow < window_middle && apply_flow < num_flows {
            read.normalized_measurements[apply_flow] =
                read.raw_measurements[apply_flow] - normalizer;
            read.additive_correction[apply_flow] = normalizer;
            normalizer += delta;
            apply_flow += 1;
        }
    }
    while apply_flow < num_flows {
        read.normalized_measurements[apply_flow] =
            read.raw_measurements[apply_flow] - next_normalizer;
        read.additive_correction[apply_flow] = next_normalizer;
        apply_flow += 1;
    }

    // Estimate and correct for multiplicative scaling.
    let mut next_normalizer = 1.0f32;
    let mut estim_flow = 0usize;
    let mut apply_flow = 0usize;

    for step in 0..num_steps {
        let window_end = estim_flow + window_size;
        let window_middle = estim_flow + window_size / 2;
        if window_middle > num_flows {
            break;
        }

        let mut normalizer = next_normalizer;

        median_set.clear();
        while estim_flow < window_end && estim_flow < num_flows {
            if read.prediction[estim_flow] > CLEAN_ONE_LOWER
                && read.normalized_measurements[estim_flow] > 0.0
            {
                median_set
                    .push(read.normalized_measurements[estim_flow] / read.prediction[estim_flow]);
            }
            estim_flow += 1;
        }
        if median_set.len() > MIN_MEDIAN_SET {
            let middle = median_set.len() / 2;
            median_set.select_nth_unstable_by(middle, f32::total_cmp);
            next_normalizer = median_set[middle];
            if step == 0 {
                normalizer = next_normalizer;
            }
        }

        let delta = (next_normalizer - normalizer) / window_size as f32;
        while apply_flow < window_middle && apply_flow < num_flows {
            read.normalized_measurements[apply_flow] /= normalizer;
            read.multiplicative_correction[apply_flow] = normalizer;
            normalizer += delta;
            apply_flow += 1;
        }
    }
    while apply_flow < num_flows {
        read.normalized_measurements[apply_flow] /= next_normalizer;
        read.multiplicative_correction[apply_flow] = next_normalizer;
        apply_flow += 1;
    }
}

/// Correct for flow-varying gain and offset with two PID control loops.
///
/// The offset loop is fed the instantaneous residual on empty flows, the
/// gain loop the signal/prediction ratio on clean 1-mer flows; both coast
/// on flows that offer no clean observation. Flows past `num_samples` are
/// copied through uncorrected.
pub fn pid_normalize(
    read: &mut ReadBuffer,
    offset_loop: &mut PidLoop,
    gain_loop: &mut PidLoop,
    num_samples: usize,
) {
    let num_flows = read.raw_measurements.len();

    offset_loop.initialize(INIT_OFFSET);
    gain_loop.initialize(INIT_GAIN);

    let mut flow = 0usize;
    while flow < num_samples.min(num_flows) {
        let raw = read.raw_measurements[flow];
        let prediction = read.prediction[flow];

        let offset = if prediction < CLEAN_ZERO_LIMIT {
            offset_loop.step(raw - prediction)
        } else {
            offset_loop.coast()
        };
        let leveled = raw - offset;
        read.additive_correction[flow] = offset;

        let gain = if prediction > CLEAN_ONE_LOWER && prediction <= CLEAN_ONE_UPPER && leveled > 0.0
        {
            gain_loop.step(leveled / prediction)
        } else {
            gain_loop.coast()
        };
        read.normalized_measurements[flow] = leveled / gain;
        read.multiplicative_correction[flow] = gain;

        flow += 1;
    }

    while flow < num_flows {
        read.normalized_measurements[flow] = read.raw_measurements[flow];
        read.additive_correction[flow] = 0.0;
        read.multiplicative_correction[flow] = 1.0;
        flow += 1;
    }
}

/// Gain-only PID pass returning the mean gain over `[start_flow, end_flow)`.
///
/// Used while estimating phasing parameters, where a single averaged gain
/// over the sub-range of interest is wanted alongside the correction.
pub fn pid_normalize_range(
    read: &mut ReadBuffer,
    gain_loop: &mut PidLoop,
    start_flow: usize,
    end_flow: usize,
) -> f32 {
    let span = end_flow.saturating_sub(start_flow);

    gain_loop.initialize(INIT_GAIN);

    let mut gain_sum = 0.0f32;
    for flow in 0..read.raw_measurements.len() {
        let raw = read.raw_measurements[flow];
        let prediction = read.prediction[flow];
        let gain = if prediction > CLEAN_ONE_LOWER && prediction <= CLEAN_ONE_UPPER && raw > 0.0 {
            gain_loop.step(raw / prediction)
        } else {
            gain_loop.coast()
        };
        if flow >= start_flow && flow < end_flow {
            gain_sum += gain;
        }
        read.additive_correction[flow] = 0.0;
        read.normalized_measurements[flow] = raw / gain;
        read.multiplicative_correction[flow] = gain;
    }

    if span > 0 {
        gain_sum / span as f32
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn read_with(raw: Vec<f32>, prediction: Vec<f32>) -> ReadBuffer {
        let num_flows = raw.len();
        let mut read = ReadBuffer::new();
        read.set_data(&raw, num_flows);
        read.prediction.copy_from_slice(&prediction);
        read
    }

    #[test]
    fn ratio_normalize_is_noop_without_clean_flows() {
        // No prediction in (0.5, 4]: all zero-mers.
        let mut read = read_with(vec![0.1, 0.2, 0.05, 0.1], vec![0.0; 4]);
        let divisor = ratio_normalize(&mut read, 0, 4);
        assert_eq!(divisor, 1.0);
        assert_eq!(read.normalized_measurements, read.raw_measurements);
    }

    #[test_case(0.4, false ; "prediction below the clean band")]
    #[test_case(1.0, true ; "prediction inside the clean band")]
    #[test_case(4.5, false ; "prediction above the clean band")]
    fn ratio_normalize_band_membership(prediction: f32, corrects: bool) {
        let mut read = read_with(vec![prediction * 1.25; 8], vec![prediction; 8]);
        let divisor = ratio_normalize(&mut read, 0, 8);
        if corrects {
            assert!((divisor - 1.25).abs() < 1e-5);
        } else {
            assert_eq!(divisor, 1.0);
        }
    }

    #[test]
    fn windowed_normalize_removes_constant_offset() {
        // All-empty prediction, constant +0.2 offset on the signal.
        let num_flows = 40;
        let mut read = read_with(vec![0.2; num_flows], vec![0.0; num_flows]);
        windowed_normalize(&mut read, 4, 10);

        for flow in 0..num_flows {
            assert!(
                read.normalized_measurements[flow].abs() < 1e-5,
                "flow {flow} left uncorrected: {}",
                read.normalized_measurements[flow]
            );
            assert!((read.additive_correction[flow] - 0.2).abs() < 1e-5);
        }
    }

    #[test]
    fn windowed_normalize_estimates_gain_on_onemers() {
        // Alternating 0-mer / 1-mer prediction, signal scaled by 1.2.
        let num_flows = 60;
        let prediction: Vec<f32> = (0..num_flows)
            .map(|f| if f % 2 == 0 { 0.0 } else { 1.0 })
            .collect();
        let raw: Vec<f32> = prediction.iter().map(|p| p * 1.2).collect();
        let mut read = read_with(raw, prediction);
        windowed_normalize(&mut read, 3, 20);

        for flow in (1..num_flows).step_by(2) {
            assert!(
                (read.normalized_measurements[flow] - 1.0).abs() < 1e-4,
                "flow {flow}: {}",
                read.normalized_measurements[flow]
            );
        }
    }
}
