use crate::error::{MaskingError, MaskingResult};
use serde::{Deserialize, Serialize};

// =============================================================================
// Fixed algorithm parameters
// =============================================================================

/// Window shift in seconds; the analysis window is twice this long.
pub const FRAME_RATE_SECONDS: f32 = 0.050;

/// Half-angle of the accepted sector, in degrees.
pub const NON_MASKING_ANGLE_DEG: f32 = 10.0;

/// Weight of the current frame in the temporal power memory.
pub const FORGETTING_FACTOR: f32 = 0.04;

/// Temporal reference below the remembered power (0.01 ~ -40 dB).
pub const SCALING_FACTOR: f32 = 0.01;

/// Speed of sound in air (m/s).
pub const SPEED_OF_SOUND: f32 = 343.0;

/// Binaural means two channels, never more.
pub const CHANNELS: usize = 2;

// =============================================================================
// Masking method
// =============================================================================

/// How rejected time-frequency bins are attenuated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MaskingMethod {
    /// Divide by the factor of whichever test rejected the bin.
    #[serde(rename = "factor")]
    Factor,
    /// Scale by the bin's power relative to its remembered power.
    #[serde(rename = "relative")]
    #[default]
    Relative,
    /// Remove the bin entirely.
    #[serde(rename = "full")]
    Full,
}

impl MaskingMethod {
    pub fn name(&self) -> &'static str {
        match self {
            MaskingMethod::Factor => "factor",
            MaskingMethod::Relative => "relative",
            MaskingMethod::Full => "full",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MaskingMethod::Factor => "Divide spatially and temporally masked bins by fixed factors",
            MaskingMethod::Relative => "Scale masked bins by their power relative to recent power",
            MaskingMethod::Full => "Zero masked bins",
        }
    }

    /// Legacy numeric tag (FACTOR = 0, RELATIVE = 1, FULL = 3).
    pub fn code(&self) -> u8 {
        match self {
            MaskingMethod::Factor => 0,
            MaskingMethod::Relative => 1,
            MaskingMethod::Full => 3,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "factor" => Some(MaskingMethod::Factor),
            "relative" => Some(MaskingMethod::Relative),
            "full" => Some(MaskingMethod::Full),
            _ => None,
        }
    }
}

// =============================================================================
// Stage configuration
// =============================================================================

/// Construction parameters of a binaural masking stage.
///
/// Immutable once a stage is built from it. The window size is derived from
/// the sample rate and is not configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinauralConfig {
    pub sample_rate: u32,
    /// Distance between the two microphones in metres.
    pub microphone_distance: f32,
    pub low_freq: f32,
    pub high_freq: f32,
    pub channels: usize,
    pub method: MaskingMethod,
    /// Spatially rejected bins are divided by this (FACTOR method).
    pub spatial_masking_factor: f32,
    /// Temporally rejected bins are divided by this (FACTOR method).
    pub temporal_masking_factor: f32,
    /// Accepted bins are multiplied by this; must be >= 1.
    pub enhance_factor: f32,
}

impl Default for BinauralConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            microphone_distance: 0.18,
            low_freq: 100.0,
            high_freq: 7000.0,
            channels: CHANNELS,
            method: MaskingMethod::default(),
            spatial_masking_factor: 1.0,
            temporal_masking_factor: 1.0,
            enhance_factor: 1.0,
        }
    }
}

impl BinauralConfig {
    pub fn new(
        sample_rate: u32,
        microphone_distance: f32,
        low_freq: f32,
        high_freq: f32,
        method: MaskingMethod,
    ) -> Self {
        Self {
            sample_rate,
            microphone_distance,
            low_freq,
            high_freq,
            method,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> MaskingResult<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_json(&self) -> MaskingResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> MaskingResult<()> {
        if self.channels != CHANNELS {
            return Err(MaskingError::Config(format!(
                "binaural masking needs exactly {} channels, got {}",
                CHANNELS, self.channels
            )));
        }
        if self.sample_rate == 0 {
            return Err(MaskingError::Config("sample rate must be > 0".into()));
        }
        if !self.microphone_distance.is_finite() || self.microphone_distance <= 0.0 {
            return Err(MaskingError::Config(format!(
                "microphone distance must be a positive length, got {}",
                self.microphone_distance
            )));
        }
        let nyquist = self.sample_rate as f32 / 2.0;
        if self.low_freq.is_nan()
            || self.high_freq.is_nan()
            || self.low_freq < 0.0
            || self.high_freq > nyquist
        {
            return Err(MaskingError::Config(format!(
                "frequency range {}..{} Hz outside 0..{} Hz",
                self.low_freq, self.high_freq, nyquist
            )));
        }
        if self.low_freq >= self.high_freq {
            return Err(MaskingError::Config(format!(
                "low frequency {} Hz must be below high frequency {} Hz",
                self.low_freq, self.high_freq
            )));
        }
        let factors = [self.spatial_masking_factor, self.temporal_masking_factor];
        if factors.iter().any(|f| f.is_nan() || *f <= 0.0) {
            return Err(MaskingError::Config("masking factors must be positive".into()));
        }
        if !self.enhance_factor.is_finite() || self.enhance_factor < 1.0 {
            return Err(MaskingError::Config(format!(
                "enhance factor must be >= 1, got {}",
                self.enhance_factor
            )));
        }
        Ok(())
    }

    /// Analysis window length: twice the frame rate, rounded up to a power of two.
    pub fn window_size(&self) -> usize {
        window_size_for(self.sample_rate)
    }

    pub fn fft_order(&self) -> u32 {
        self.window_size().trailing_zeros()
    }
}

pub fn window_size_for(sample_rate: u32) -> usize {
    let samples = (2.0 * FRAME_RATE_SECONDS * sample_rate as f32).ceil() as usize;
    samples.max(1).next_power_of_two()
}
