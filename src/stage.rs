//! Binaural Spatial-Temporal Masking Stage
//!
//! Implements binaural masking in the manner of Kim, Kumar & Stern (2011),
//! "Binaural sound source separation motivated by auditory processing".
//!
//! # Differences from the paper
//! - Accepted time-frequency bins are enhanced, not only rejected ones
//!   degraded; the stage targets low-power signals.
//! - Rejected bins can be removed (FULL), divided by per-test factors
//!   (FACTOR) or scaled relative to their remembered power (RELATIVE).
//! - A mel-scaled filter bank replaces the gammatone bank.
//!
//! # Lifecycle
//! A host calls, once per frame and in frame order:
//! 1. `frame_analysis` for each channel,
//! 2. `process_parametrisation` once for the stereo pair,
//! 3. `frame_synthesis` for each channel.
//!
//! One instance serves exactly one stereo stream. Both filter banks and the
//! per-bin power memory are owned by the instance and mutated through
//! `&mut self`.

use crate::config::{BinauralConfig, MaskingMethod, CHANNELS, NON_MASKING_ANGLE_DEG};
use crate::dsp::bins::{slot_range, Bin, PerBin, BIN_COUNT, SLOT_COUNT};
use crate::dsp::decider::{MaskingDecider, Verdict};
use crate::dsp::filter_bank::MelFilterBank;
use crate::dsp::masker::{Attenuation, FrameMasker};
use crate::dsp::thresholds::calculate_thresholds;
use crate::dsp::utils::gain_to_db;
use crate::error::{MaskingError, MaskingResult};
use log::{debug, info};

/// Frame-based processing driven by a short-time host.
pub trait ShortTimeProcess {
    /// Frame length the process accepts.
    fn window_size(&self) -> usize;

    /// Analysis buffer length required for a frame of `frame_length` samples.
    fn analysis_length(&self, frame_length: usize) -> usize;

    /// Fills `analysis` from one input frame of `channel`.
    fn frame_analysis(
        &mut self,
        in_frame: &[f32],
        analysis: &mut [f32],
        channel: usize,
    ) -> MaskingResult<()>;

    /// Modifies every channel's analysis buffer in place.
    /// `data_channels` are the time-domain frames the analysis came from.
    fn process_parametrisation(
        &mut self,
        analysis_frames: &mut [Vec<f32>],
        data_channels: &[Vec<f32>],
    ) -> MaskingResult<()>;

    /// Rebuilds one output frame of `channel` from its analysis buffer.
    fn frame_synthesis(
        &mut self,
        out_frame: &mut [f32],
        analysis: &[f32],
        channel: usize,
    ) -> MaskingResult<()>;
}

/// Per-frame decision counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub accepted: usize,
    pub spatial_rejects: usize,
    pub temporal_rejects: usize,
}

impl FrameReport {
    pub fn rejected(&self) -> usize {
        self.spatial_rejects + self.temporal_rejects
    }
}

pub struct BinauralMasking {
    config: BinauralConfig,
    window_size: usize,
    filter_banks: [MelFilterBank; CHANNELS],
    decider: MaskingDecider,
    masker: FrameMasker,
    last_report: FrameReport,
    frames_processed: u64,
}

impl BinauralMasking {
    pub fn new(
        sample_rate: u32,
        microphone_distance: f32,
        low_freq: f32,
        high_freq: f32,
        method: MaskingMethod,
    ) -> MaskingResult<Self> {
        Self::from_config(BinauralConfig::new(
            sample_rate,
            microphone_distance,
            low_freq,
            high_freq,
            method,
        ))
    }

    pub fn from_config(config: BinauralConfig) -> MaskingResult<Self> {
        config.validate()?;
        let window_size = config.window_size();

        let make_bank = || {
            MelFilterBank::new(
                config.sample_rate,
                window_size,
                config.low_freq,
                config.high_freq,
                BIN_COUNT,
            )
        };
        let filter_banks = [make_bank()?, make_bank()?];

        let thresholds =
            calculate_thresholds(filter_banks[0].center_frequencies(), config.microphone_distance);
        let masker = FrameMasker::new(Attenuation::from_config(&config), config.enhance_factor);

        let (t_min, t_max) = thresholds
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &t| (lo.min(t), hi.max(t)));
        info!(
            "binaural masking: {} Hz, window {} (2^{}), {} bins {:.0}..{:.0} Hz, mic {:.3} m, method {} ({}), thresholds {:.3}..{:.3}, enhance {:+.1} dB",
            config.sample_rate,
            window_size,
            config.fft_order(),
            BIN_COUNT,
            config.low_freq,
            config.high_freq,
            config.microphone_distance,
            config.method.name(),
            config.method.code(),
            t_min,
            t_max,
            gain_to_db(config.enhance_factor),
        );

        Ok(Self {
            window_size,
            filter_banks,
            decider: MaskingDecider::new(thresholds),
            masker,
            last_report: FrameReport::default(),
            frames_processed: 0,
            config,
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Half-angle of the accepted sector in degrees.
    pub fn non_masking_angle(&self) -> f32 {
        NON_MASKING_ANGLE_DEG
    }

    pub fn microphone_distance(&self) -> f32 {
        self.config.microphone_distance
    }

    /// Divisor applied to spatially rejected bins by the FACTOR method.
    /// Samples are divided by this value; it is not the gain `1 / factor`.
    pub fn spatial_masking_factor(&self) -> f32 {
        self.config.spatial_masking_factor
    }

    /// Divisor applied to temporally rejected bins by the FACTOR method.
    /// Samples are divided by this value; it is not the gain `1 / factor`.
    pub fn temporal_masking_factor(&self) -> f32 {
        self.config.temporal_masking_factor
    }

    pub fn masking_method(&self) -> MaskingMethod {
        self.config.method
    }

    pub fn config(&self) -> &BinauralConfig {
        &self.config
    }

    pub fn fft_order(&self) -> u32 {
        self.config.fft_order()
    }

    pub fn thresholds(&self) -> &PerBin<f32> {
        self.decider.thresholds()
    }

    pub fn short_time_power(&self) -> &PerBin<f32> {
        self.decider.short_time_power()
    }

    pub fn center_frequencies(&self) -> &[f32] {
        self.filter_banks[0].center_frequencies()
    }

    /// Decision counts of the most recent `process_parametrisation` call.
    pub fn last_report(&self) -> FrameReport {
        self.last_report
    }

    // -------------------------------------------------------------------------
    // Preconditions
    // -------------------------------------------------------------------------

    fn check_channel(channel: usize) -> MaskingResult<()> {
        if channel >= CHANNELS {
            return Err(MaskingError::precondition("channel", CHANNELS, channel));
        }
        Ok(())
    }

    fn check_frame(&self, frame_length: usize) -> MaskingResult<()> {
        if frame_length != self.window_size {
            return Err(MaskingError::precondition(
                "frame length",
                self.window_size,
                frame_length,
            ));
        }
        Ok(())
    }

    fn check_analysis(&self, analysis_length: usize) -> MaskingResult<()> {
        let expected = self.analysis_length(self.window_size);
        if analysis_length != expected {
            return Err(MaskingError::precondition(
                "analysis length",
                expected,
                analysis_length,
            ));
        }
        Ok(())
    }
}

impl ShortTimeProcess for BinauralMasking {
    fn window_size(&self) -> usize {
        self.window_size
    }

    fn analysis_length(&self, frame_length: usize) -> usize {
        SLOT_COUNT * frame_length
    }

    fn frame_analysis(
        &mut self,
        in_frame: &[f32],
        analysis: &mut [f32],
        channel: usize,
    ) -> MaskingResult<()> {
        Self::check_channel(channel)?;
        self.check_frame(in_frame.len())?;
        self.check_analysis(analysis.len())?;
        self.filter_banks[channel].decompose(in_frame, analysis)
    }

    fn process_parametrisation(
        &mut self,
        analysis_frames: &mut [Vec<f32>],
        data_channels: &[Vec<f32>],
    ) -> MaskingResult<()> {
        if analysis_frames.len() != CHANNELS {
            return Err(MaskingError::precondition(
                "analysis channel count",
                CHANNELS,
                analysis_frames.len(),
            ));
        }
        for frame in analysis_frames.iter() {
            self.check_analysis(frame.len())?;
        }
        if !data_channels.is_empty() && data_channels.len() != CHANNELS {
            return Err(MaskingError::precondition(
                "data channel count",
                CHANNELS,
                data_channels.len(),
            ));
        }
        for data in data_channels {
            self.check_frame(data.len())?;
        }

        let n = self.window_size;
        let (left, right) = analysis_frames.split_at_mut(1);
        let (left, right) = (&mut left[0], &mut right[0]);

        let mut report = FrameReport::default();
        for bin in Bin::all() {
            let range = slot_range(bin.index(), n);
            let left_band = &mut left[range.clone()];
            let right_band = &mut right[range];

            let decision = self.decider.decide(bin, left_band, right_band);
            match decision.verdict {
                Verdict::Accepted => report.accepted += 1,
                Verdict::SpatialReject => report.spatial_rejects += 1,
                Verdict::TemporalReject => report.temporal_rejects += 1,
            }
            self.masker.apply(&decision, left_band, right_band);
        }

        self.frames_processed += 1;
        debug!(
            "frame {}: {} accepted, {} spatial, {} temporal",
            self.frames_processed, report.accepted, report.spatial_rejects, report.temporal_rejects
        );
        self.last_report = report;
        Ok(())
    }

    fn frame_synthesis(
        &mut self,
        out_frame: &mut [f32],
        analysis: &[f32],
        channel: usize,
    ) -> MaskingResult<()> {
        Self::check_channel(channel)?;
        self.check_frame(out_frame.len())?;
        self.check_analysis(analysis.len())?;

        out_frame.fill(0.0);
        for slot in analysis.chunks_exact(self.window_size) {
            for (o, &s) in out_frame.iter_mut().zip(slot) {
                *o += s;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::bins::RESIDUAL_SLOT;

    fn stage(method: MaskingMethod) -> BinauralMasking {
        BinauralMasking::new(16000, 0.05, 100.0, 4000.0, method).unwrap()
    }

    #[test]
    fn test_accessors() {
        let s = stage(MaskingMethod::default());
        assert_eq!(s.non_masking_angle(), 10.0);
        assert_eq!(s.microphone_distance(), 0.05);
        assert_eq!(s.spatial_masking_factor(), 1.0);
        assert_eq!(s.temporal_masking_factor(), 1.0);
        assert_eq!(s.masking_method(), MaskingMethod::Relative);
        assert_eq!(s.window_size(), 2048);
        assert_eq!(s.fft_order(), 11);
        assert_eq!(s.thresholds().as_slice().len(), BIN_COUNT);
        assert!(s.short_time_power().iter().all(|p| *p == 0.0));
        assert_eq!(s.center_frequencies().len(), BIN_COUNT);
    }

    #[test]
    fn test_analysis_length_precondition() {
        let mut s = stage(MaskingMethod::Full);
        let frame = vec![0.0; 2048];
        let mut short = vec![0.0; BIN_COUNT * 2048];
        let err = s.frame_analysis(&frame, &mut short, 0).unwrap_err();
        assert!(matches!(err, MaskingError::PreconditionViolation { .. }));
    }

    #[test]
    fn test_frame_length_precondition() {
        let mut s = stage(MaskingMethod::Full);
        let frame = vec![0.0; 1024];
        let mut analysis = vec![0.0; SLOT_COUNT * 1024];
        assert!(matches!(
            s.frame_analysis(&frame, &mut analysis, 0),
            Err(MaskingError::PreconditionViolation { .. })
        ));
        let mut out = vec![0.0; 1024];
        assert!(s.frame_synthesis(&mut out, &analysis, 1).is_err());
    }

    #[test]
    fn test_channel_precondition() {
        let mut s = stage(MaskingMethod::Full);
        let frame = vec![0.0; 2048];
        let mut analysis = vec![0.0; SLOT_COUNT * 2048];
        assert!(matches!(
            s.frame_analysis(&frame, &mut analysis, 2),
            Err(MaskingError::PreconditionViolation {
                what: "channel",
                expected: CHANNELS,
                got: 2,
            })
        ));
        let mut out = vec![0.0; 2048];
        assert!(matches!(
            s.frame_synthesis(&mut out, &analysis, 3),
            Err(MaskingError::PreconditionViolation { got: 3, .. })
        ));
    }

    #[test]
    fn test_parametrisation_data_channel_count() {
        let mut s = stage(MaskingMethod::Full);
        let n = 2048;
        let analysis = vec![vec![0.0; SLOT_COUNT * n]; 2];
        for count in [1, 3] {
            let mut frames = analysis.clone();
            let data = vec![vec![0.0; n]; count];
            assert!(matches!(
                s.process_parametrisation(&mut frames, &data),
                Err(MaskingError::PreconditionViolation {
                    what: "data channel count",
                    expected: CHANNELS,
                    got,
                }) if got == count
            ));
        }
        let mut frames = analysis.clone();
        let data = vec![vec![0.0; n]; CHANNELS];
        assert!(s.process_parametrisation(&mut frames, &data).is_ok());
        assert!(s.process_parametrisation(&mut frames, &[]).is_ok());
    }

    #[test]
    fn test_parametrisation_needs_two_channels() {
        let mut s = stage(MaskingMethod::Full);
        let mut one = vec![vec![0.0; SLOT_COUNT * 2048]];
        assert!(s.process_parametrisation(&mut one, &[]).is_err());
        let mut mismatched = vec![vec![0.0; SLOT_COUNT * 2048], vec![0.0; 10]];
        assert!(s.process_parametrisation(&mut mismatched, &[]).is_err());
        assert!(s.short_time_power().iter().all(|p| *p == 0.0));
    }

    #[test]
    fn test_synthesis_sums_slots() {
        let mut s = stage(MaskingMethod::Full);
        let n = 2048;
        let mut analysis = vec![0.0; SLOT_COUNT * n];
        for slot in 0..SLOT_COUNT {
            analysis[slot_range(slot, n)].fill(1.0);
        }
        analysis[slot_range(RESIDUAL_SLOT, n)].fill(0.5);
        let mut out = vec![0.0; n];
        s.frame_synthesis(&mut out, &analysis, 0).unwrap();
        assert!(out.iter().all(|v| (*v - 45.5).abs() < 1e-4));
    }

    #[test]
    fn test_memory_updates_once_per_frame() {
        let mut s = stage(MaskingMethod::Relative);
        let n = 2048;
        let mut frames = vec![vec![0.25; SLOT_COUNT * n], vec![0.25; SLOT_COUNT * n]];
        s.process_parametrisation(&mut frames, &[]).unwrap();
        // power of a constant 0.25 slot is 0.0625
        for p in s.short_time_power().iter() {
            assert!((p - 0.04 * 0.0625).abs() < 1e-7);
        }
        assert_eq!(s.last_report().accepted + s.last_report().rejected(), BIN_COUNT);
    }
}
