//! Spatial Acceptance Thresholds
//!
//! A plane wave arriving `theta` away from broadside reaches the two
//! microphones `d * sin(theta) / c` apart. For a narrow band centred at `f`
//! the normalised correlation of the two channels is then
//! `cos(2 * pi * f * d * sin(theta) / c)`.
//!
//! The threshold of a bin is the correlation produced by a source sitting
//! exactly on the edge of the accepted sector. Sources further out
//! decorrelate more and fall below it.
//!
//! Once the edge delay reaches a quarter period the edge no longer separates
//! anything and the threshold drops to zero, so high bins on widely spaced
//! microphones are never spatially rejected.

use super::bins::PerBin;
use crate::config::{NON_MASKING_ANGLE_DEG, SPEED_OF_SOUND};

/// Correlation a source on the sector edge produces at `center_hz`.
pub fn edge_correlation(center_hz: f32, microphone_distance: f32, half_angle_deg: f32) -> f32 {
    let delay = microphone_distance * half_angle_deg.to_radians().sin() / SPEED_OF_SOUND;
    let phase = 2.0 * std::f32::consts::PI * center_hz * delay;
    phase.min(std::f32::consts::FRAC_PI_2).cos().max(0.0)
}

/// Per-bin thresholds for the fixed acceptance half-angle.
///
/// `centers` must hold one centre frequency per bin.
pub fn calculate_thresholds(centers: &[f32], microphone_distance: f32) -> PerBin<f32> {
    debug_assert_eq!(centers.len(), super::bins::BIN_COUNT);
    PerBin::from_fn(|b| edge_correlation(centers[b], microphone_distance, NON_MASKING_ANGLE_DEG))
}
