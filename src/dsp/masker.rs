//! Frame Masker
//!
//! Turns a bin decision into a gain and applies it to that bin's left and
//! right sub-band samples. Accepted bins are enhanced; rejected bins are
//! attenuated by the policy chosen at construction.

use super::decider::{BinDecision, Verdict};
use super::utils::SILENCE_POWER;
use crate::config::{BinauralConfig, MaskingMethod, SCALING_FACTOR};

/// Attenuation policy for rejected bins, bound once per stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Attenuation {
    /// Multiply by the reciprocal of the rejecting test's factor.
    Factor { spatial_gain: f32, temporal_gain: f32 },
    /// Scale by how far the bin sits from the temporal acceptance level
    /// `SCALING_FACTOR * reference_power`: spatial rejects by
    /// `level / power`, temporal rejects by `power / level`. Both at most 1.
    Relative,
    /// Zero the bin.
    Full,
}

impl Attenuation {
    pub fn from_config(cfg: &BinauralConfig) -> Self {
        match cfg.method {
            MaskingMethod::Factor => Attenuation::Factor {
                spatial_gain: 1.0 / cfg.spatial_masking_factor,
                temporal_gain: 1.0 / cfg.temporal_masking_factor,
            },
            MaskingMethod::Relative => Attenuation::Relative,
            MaskingMethod::Full => Attenuation::Full,
        }
    }

    /// Gain for a rejected bin. Always finite and in `[0, 1]` for the
    /// non-factor policies.
    pub fn gain(&self, decision: &BinDecision) -> f32 {
        match *self {
            Attenuation::Full => 0.0,
            Attenuation::Factor {
                spatial_gain,
                temporal_gain,
            } => match decision.verdict {
                Verdict::SpatialReject => spatial_gain,
                _ => temporal_gain,
            },
            Attenuation::Relative => relative_gain(decision),
        }
    }
}

#[inline]
fn relative_gain(decision: &BinDecision) -> f32 {
    let power = decision.power;
    if power.is_nan() || power <= SILENCE_POWER {
        return 0.0;
    }
    let level = SCALING_FACTOR * decision.reference_power;
    let ratio = match decision.verdict {
        // below the acceptance level: the deeper the drop, the smaller the gain
        Verdict::TemporalReject => power / level,
        _ => level / power,
    };
    if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub struct FrameMasker {
    attenuation: Attenuation,
    enhance_factor: f32,
}

impl FrameMasker {
    pub fn new(attenuation: Attenuation, enhance_factor: f32) -> Self {
        Self {
            attenuation,
            enhance_factor,
        }
    }

    pub fn gain_for(&self, decision: &BinDecision) -> f32 {
        if decision.is_accepted() {
            self.enhance_factor
        } else {
            self.attenuation.gain(decision)
        }
    }

    /// Applies the decision to one bin of both channels in place.
    pub fn apply(&self, decision: &BinDecision, left: &mut [f32], right: &mut [f32]) {
        let gain = self.gain_for(decision);
        if gain == 0.0 {
            left.fill(0.0);
            right.fill(0.0);
        } else if gain != 1.0 {
            for v in left.iter_mut().chain(right.iter_mut()) {
                *v *= gain;
            }
        }
    }
}
