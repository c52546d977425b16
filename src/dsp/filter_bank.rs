//! Mel-scaled FFT Filter Bank
//!
//! Splits one time-domain frame into mel-spaced sub-band signals plus a
//! residual, such that the sum of every slot reproduces the input frame.
//!
//! # Design Notes
//! - Band edges are linearly spaced on the HTK mel scale between the low and
//!   high frequency. Band `m` is a triangle from edge `m` up to edge `m + 1`
//!   and back down to edge `m + 2`; neighbouring triangles sum to one.
//! - Each band is extracted by weighting the frame's spectrum and running an
//!   inverse FFT. The residual is whatever the bands did not take, so the
//!   decomposition is exactly invertible by summation.
//! - FFT plans and scratch buffers are allocated in `new()`; `decompose()`
//!   does not allocate.

use crate::error::{MaskingError, MaskingResult};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Mel value of `hz` on the HTK scale.
#[inline]
pub fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

#[inline]
pub fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0f32.powf(mel / 2595.0) - 1.0)
}

/// Non-zero part of one band's triangular spectral weight.
struct MelBand {
    first_bin: usize,
    weights: Vec<f32>,
}

pub struct MelFilterBank {
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    window_size: usize,
    bands: Vec<MelBand>,
    centers: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl MelFilterBank {
    pub fn new(
        sample_rate: u32,
        window_size: usize,
        low_freq: f32,
        high_freq: f32,
        bins: usize,
    ) -> MaskingResult<Self> {
        if window_size < 2 || !window_size.is_power_of_two() {
            return Err(MaskingError::Construction(format!(
                "window size {} is not a power of two",
                window_size
            )));
        }
        if bins == 0 || low_freq.is_nan() || high_freq.is_nan() || low_freq >= high_freq {
            return Err(MaskingError::Construction(format!(
                "cannot place {} bands in {}..{} Hz",
                bins, low_freq, high_freq
            )));
        }

        let sr = sample_rate as f32;
        let nyq = window_size / 2;
        let bin_hz = sr / window_size as f32;

        let mel_low = hz_to_mel(low_freq);
        let mel_high = hz_to_mel(high_freq);
        let edges: Vec<f32> = (0..bins + 2)
            .map(|i| mel_to_hz(mel_low + (mel_high - mel_low) * i as f32 / (bins + 1) as f32))
            .collect();

        let mut bands = Vec::with_capacity(bins);
        for m in 0..bins {
            let (lo, center, hi) = (edges[m], edges[m + 1], edges[m + 2]);
            let mut first_bin = None;
            let mut weights = Vec::new();
            for k in 0..=nyq {
                let f = k as f32 * bin_hz;
                let w = if f <= lo || f >= hi {
                    0.0
                } else if f <= center {
                    (f - lo) / (center - lo)
                } else {
                    (hi - f) / (hi - center)
                };
                if w > 0.0 {
                    first_bin.get_or_insert(k);
                    weights.push(w);
                } else if first_bin.is_some() {
                    break;
                }
            }
            let Some(first_bin) = first_bin else {
                return Err(MaskingError::Construction(format!(
                    "band {} around {:.1} Hz is narrower than the {:.1} Hz FFT resolution",
                    m, center, bin_hz
                )));
            };
            bands.push(MelBand { first_bin, weights });
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(window_size);
        let ifft = planner.plan_fft_inverse(window_size);

        Ok(Self {
            fft,
            ifft,
            window_size,
            bands,
            centers: edges[1..=bins].to_vec(),
            spectrum: vec![Complex::new(0.0, 0.0); window_size],
            scratch: vec![Complex::new(0.0, 0.0); window_size],
        })
    }

    #[inline]
    pub fn bins(&self) -> usize {
        self.bands.len()
    }

    #[inline]
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Centre frequency (Hz) of every band, ascending.
    pub fn center_frequencies(&self) -> &[f32] {
        &self.centers
    }

    /// Writes band `m` at `out[m * n..(m + 1) * n]` and the residual in the
    /// last slot. `out` must hold `(bins + 1) * n` samples.
    pub fn decompose(&mut self, frame: &[f32], out: &mut [f32]) -> MaskingResult<()> {
        let n = self.window_size;
        let nyq = n / 2;
        if frame.len() != n {
            return Err(MaskingError::precondition(
                "filter bank frame length",
                n,
                frame.len(),
            ));
        }
        let expected = (self.bins() + 1) * n;
        if out.len() != expected {
            return Err(MaskingError::precondition(
                "filter bank output length",
                expected,
                out.len(),
            ));
        }

        for (dst, &x) in self.spectrum.iter_mut().zip(frame) {
            *dst = Complex::new(x, 0.0);
        }
        self.fft.process(&mut self.spectrum);

        let (band_out, residual) = out.split_at_mut(self.bins() * n);
        residual.copy_from_slice(frame);

        let norm = 1.0 / n as f32;
        for (band, slot) in self.bands.iter().zip(band_out.chunks_exact_mut(n)) {
            self.scratch.fill(Complex::new(0.0, 0.0));
            for (j, &w) in band.weights.iter().enumerate() {
                let k = band.first_bin + j;
                self.scratch[k] = self.spectrum[k] * w;
                if k != 0 && k != nyq {
                    self.scratch[n - k] = self.spectrum[n - k] * w;
                }
            }
            self.ifft.process(&mut self.scratch);
            for i in 0..n {
                let v = self.scratch[i].re * norm;
                slot[i] = v;
                residual[i] -= v;
            }
        }
        Ok(())
    }
}
