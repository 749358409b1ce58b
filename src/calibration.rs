//! Raw codes to volts, sample indices to seconds.

use crate::waveform::{Timing, VoltageScaling};

/// `voltage[i] = (raw[i] - zero_code) * y_mult + y_zero`
pub fn to_voltage(raw: &[i32], scaling: &VoltageScaling) -> Vec<f64> {
    raw.iter()
        .map(|&code| (f64::from(code) - scaling.zero_code) * scaling.y_mult + scaling.y_zero)
        .collect()
}

/// `time[i] = x_zero + i * x_incr` for `i` in `0..sample_count`.
pub fn generate_time_axis(sample_count: usize, timing: &Timing) -> Vec<f64> {
    (0..sample_count)
        .map(|i| timing.x_zero + i as f64 * timing.x_incr)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_voltage() {
        let scaling = VoltageScaling {
            y_mult: 2.0,
            y_zero: 0.0,
            zero_code: 0.0,
        };
        assert_eq!(to_voltage(&[0, 50, -50], &scaling), vec![0.0, 100.0, -100.0]);
    }

    #[test]
    fn test_to_voltage_with_offsets() {
        let scaling = VoltageScaling {
            y_mult: 0.5,
            y_zero: 1.0,
            zero_code: 10.0,
        };
        assert_eq!(to_voltage(&[10, 12, 8], &scaling), vec![1.0, 2.0, 0.0]);
        assert!(to_voltage(&[], &scaling).is_empty());
    }

    #[test]
    fn test_time_axis() {
        let timing = Timing {
            x_incr: 1e-6,
            x_zero: 0.0,
        };
        assert_eq!(
            generate_time_axis(5, &timing),
            vec![0.0, 1e-6, 2e-6, 3e-6, 4e-6]
        );
    }

    #[test]
    fn test_time_axis_pretrigger_offset() {
        let timing = Timing {
            x_incr: 0.25,
            x_zero: -1.0,
        };
        assert_eq!(generate_time_axis(3, &timing), vec![-1.0, -0.75, -0.5]);
        assert!(generate_time_axis(0, &timing).is_empty());
    }

    #[test]
    fn test_repeated_calls_agree() {
        let timing = Timing {
            x_incr: 4e-10,
            x_zero: -2e-6,
        };
        assert_eq!(generate_time_axis(1000, &timing), generate_time_axis(1000, &timing));
    }
}
