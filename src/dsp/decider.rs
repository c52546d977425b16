//! Spatial-Temporal Masking Decision
//!
//! Decides per bin and per frame whether a time-frequency bin is kept.
//!
//! # Tests
//! - **Spatial**: the left/right sub-band signals must correlate at least as
//!   well as a source on the edge of the accepted sector would.
//! - **Temporal**: the bin's frame power must not sit more than
//!   `SCALING_FACTOR` below its remembered short-time power.
//!
//! # Memory
//! The short-time power is an exponentially weighted average updated once
//! per bin per frame, after both tests and whatever they decided. It starts
//! at zero, so nothing is temporally rejected on the first frame.

use super::bins::{Bin, PerBin};
use super::utils::{frame_power, normalised_correlation};
use crate::config::{FORGETTING_FACTOR, SCALING_FACTOR};

/// Outcome of the two masking tests for one bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    /// Rejected by the spatial test (takes precedence when both reject).
    SpatialReject,
    TemporalReject,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinDecision {
    pub verdict: Verdict,
    pub correlation: f32,
    /// Instantaneous power of the averaged channels.
    pub power: f32,
    /// Remembered power the temporal test compared against (before update).
    pub reference_power: f32,
}

impl BinDecision {
    #[inline]
    pub fn is_accepted(&self) -> bool {
        self.verdict == Verdict::Accepted
    }
}

pub struct MaskingDecider {
    thresholds: PerBin<f32>,
    short_time_power: PerBin<f32>,
}

impl MaskingDecider {
    pub fn new(thresholds: PerBin<f32>) -> Self {
        Self {
            thresholds,
            short_time_power: PerBin::splat(0.0),
        }
    }

    pub fn thresholds(&self) -> &PerBin<f32> {
        &self.thresholds
    }

    pub fn short_time_power(&self) -> &PerBin<f32> {
        &self.short_time_power
    }

    #[inline]
    fn spatial_reject(&self, correlation: f32, bin: Bin) -> bool {
        correlation.abs() < self.thresholds[bin]
    }

    #[inline]
    fn temporal_reject(&self, power: f32, bin: Bin) -> bool {
        power < self.short_time_power[bin] * SCALING_FACTOR
    }

    /// Runs both tests on one bin's sub-band signals and advances its memory.
    pub fn decide(&mut self, bin: Bin, left: &[f32], right: &[f32]) -> BinDecision {
        let correlation = normalised_correlation(left, right);
        let power = frame_power(left, right);
        let reference_power = self.short_time_power[bin];

        let verdict = if self.spatial_reject(correlation, bin) {
            Verdict::SpatialReject
        } else if self.temporal_reject(power, bin) {
            Verdict::TemporalReject
        } else {
            Verdict::Accepted
        };

        self.short_time_power[bin] =
            (1.0 - FORGETTING_FACTOR) * reference_power + FORGETTING_FACTOR * power;

        BinDecision {
            verdict,
            correlation,
            power,
            reference_power,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const LEN: usize = 256;

    fn tone(amp: f32, phase: f32) -> Vec<f32> {
        (0..LEN)
            .map(|i| amp * (2.0 * std::f32::consts::PI * 8.0 * i as f32 / LEN as f32 + phase).sin())
            .collect()
    }

    fn bin(i: usize) -> Bin {
        Bin::new(i).unwrap()
    }

    #[test]
    fn test_coherent_bin_accepted() {
        let mut decider = MaskingDecider::new(PerBin::splat(0.9));
        let x = tone(1.0, 0.0);
        let d = decider.decide(bin(3), &x, &x);
        assert!(d.is_accepted());
        assert_abs_diff_eq!(d.correlation, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_anti_phase_counts_as_coherent() {
        let mut decider = MaskingDecider::new(PerBin::splat(0.9));
        let x = tone(1.0, 0.0);
        let y = tone(1.0, std::f32::consts::PI);
        assert!(decider.decide(bin(0), &x, &y).is_accepted());
    }

    #[test]
    fn test_decorrelated_bin_rejected_spatially() {
        let mut decider = MaskingDecider::new(PerBin::splat(0.5));
        let d = decider.decide(bin(0), &tone(1.0, 0.0), &tone(1.0, std::f32::consts::FRAC_PI_2));
        assert_eq!(d.verdict, Verdict::SpatialReject);
    }

    #[test]
    fn test_first_frame_never_temporally_rejected() {
        let mut decider = MaskingDecider::new(PerBin::splat(0.0));
        let x = tone(1e-4, 0.0);
        assert!(decider.decide(bin(10), &x, &x).is_accepted());
    }

    #[test]
    fn test_memory_sequencing() {
        let mut decider = MaskingDecider::new(PerBin::splat(0.0));
        let b = bin(5);
        let p0 = 0.5f32;
        decider.short_time_power[b] = p0;

        // amplitude 0.01 => power 0.5e-4, far below 0.01 * p0
        let quiet = tone(0.01, 0.0);
        let d = decider.decide(b, &quiet, &quiet);
        assert_eq!(d.verdict, Verdict::TemporalReject);
        assert_abs_diff_eq!(d.reference_power, p0);

        let p1 = d.power;
        assert_abs_diff_eq!(p1, 0.5e-4, epsilon = 1e-7);
        let expected = (1.0 - 0.04) * p0 + 0.04 * p1;
        assert_abs_diff_eq!(decider.short_time_power()[b], expected, epsilon = 1e-7);

        // next decision is made against the updated memory
        let d = decider.decide(b, &quiet, &quiet);
        assert_abs_diff_eq!(d.reference_power, expected, epsilon = 1e-7);
    }

    #[test]
    fn test_memory_updates_when_rejected() {
        let mut decider = MaskingDecider::new(PerBin::splat(1.0));
        let b = bin(44);
        let d = decider.decide(b, &tone(1.0, 0.0), &tone(1.0, std::f32::consts::FRAC_PI_2));
        assert_eq!(d.verdict, Verdict::SpatialReject);
        assert!(decider.short_time_power()[b] > 0.0);
    }

    #[test]
    fn test_spatial_takes_precedence() {
        let mut decider = MaskingDecider::new(PerBin::splat(0.5));
        let b = bin(1);
        decider.short_time_power[b] = 100.0;
        let d = decider.decide(b, &tone(0.01, 0.0), &tone(0.01, std::f32::consts::FRAC_PI_2));
        assert_eq!(d.verdict, Verdict::SpatialReject);
    }

    #[test]
    fn test_other_bins_untouched() {
        let mut decider = MaskingDecider::new(PerBin::splat(0.0));
        let x = tone(1.0, 0.0);
        decider.decide(bin(2), &x, &x);
        assert_eq!(decider.short_time_power()[bin(3)], 0.0);
        assert!(decider.thresholds().iter().all(|t| *t == 0.0));
    }
}
