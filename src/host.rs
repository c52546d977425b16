//! Streaming Short-Time Host
//!
//! Drives a `ShortTimeProcess` sample by sample: buffers stereo input,
//! hands windowed frames to the process in the fixed
//! analysis → parametrisation → synthesis order, and overlap-adds the
//! returned frames back into a continuous stream.
//!
//! # Design Notes
//! - sqrt-Hann analysis and synthesis windows at 50% hop; the overlap-add is
//!   normalised by the accumulated squared window.
//! - Latency is one window: the output queue is primed with that many zeros.
//! - All buffers are allocated in `new()`.
//! - A frame the process refuses is logged and replaced by silence.

use crate::config::CHANNELS;
use crate::dsp::utils::make_sqrt_hann_window;
use crate::error::MaskingResult;
use crate::stage::ShortTimeProcess;
use log::warn;
use ringbuf::{Consumer, Producer, RingBuffer};

// Ring buffer capacity multiplier relative to window size.
const RINGBUF_CAP_MULT: usize = 4;
// OLA normalization floor.
const OLA_NORM_EPS: f32 = 1e-6;

/// Input queue and overlap-add state of one channel.
struct HostChannel {
    win_size: usize,
    hop_size: usize,
    overlap: Vec<f32>,
    ola_norm: Vec<f32>,
    input_producer: Producer<f32>,
    input_consumer: Consumer<f32>,
    output_producer: Producer<f32>,
    output_consumer: Consumer<f32>,
}

impl HostChannel {
    fn new(win_size: usize, hop_size: usize) -> Self {
        let buf_cap = win_size * RINGBUF_CAP_MULT;
        let (in_prod, in_cons) = RingBuffer::<f32>::new(buf_cap).split();
        let (mut out_prod, out_cons) = RingBuffer::<f32>::new(buf_cap).split();
        for _ in 0..win_size {
            let _ = out_prod.push(0.0);
        }
        Self {
            win_size,
            hop_size,
            overlap: vec![0.0; win_size],
            ola_norm: vec![0.0; win_size],
            input_producer: in_prod,
            input_consumer: in_cons,
            output_producer: out_prod,
            output_consumer: out_cons,
        }
    }

    fn push_input(&mut self, x: f32) {
        let _ = self.input_producer.push(x);
    }

    fn input_len(&self) -> usize {
        self.input_consumer.len()
    }

    fn peek_windowed(&self, window: &[f32], out: &mut [f32]) {
        for (i, val) in self.input_consumer.iter().take(self.win_size).enumerate() {
            out[i] = *val * window[i];
        }
    }

    fn discard_input(&mut self, n: usize) {
        self.input_consumer.discard(n);
    }

    fn pop_output(&mut self) -> f32 {
        self.output_consumer.pop().unwrap_or(0.0)
    }

    fn overlap_add(&mut self, frame: &[f32], window: &[f32]) {
        let n = self.win_size;
        for i in 0..n {
            let w = window[i];
            self.overlap[i] += frame[i] * w;
            self.ola_norm[i] += w * w;
        }
        for i in 0..self.hop_size {
            let _ = self
                .output_producer
                .push(self.overlap[i] / self.ola_norm[i].max(OLA_NORM_EPS));
        }
        self.overlap.copy_within(self.hop_size..n, 0);
        self.ola_norm.copy_within(self.hop_size..n, 0);
        for i in (n - self.hop_size)..n {
            self.overlap[i] = 0.0;
            self.ola_norm[i] = 0.0;
        }
    }
}

/// Stereo streaming driver for a frame-based process.
pub struct StreamingHost<P: ShortTimeProcess> {
    process: P,
    channels: [HostChannel; CHANNELS],
    window: Vec<f32>,
    win_size: usize,
    hop_size: usize,
    frames_in: Vec<Vec<f32>>,
    analysis: Vec<Vec<f32>>,
    frame_out: Vec<f32>,
    frames_out: [Vec<f32>; CHANNELS],
    failed_frames: u64,
}

impl<P: ShortTimeProcess> StreamingHost<P> {
    pub fn new(process: P) -> Self {
        let win_size = process.window_size();
        let hop_size = (win_size / 2).max(1);
        let analysis_len = process.analysis_length(win_size);

        Self {
            channels: [
                HostChannel::new(win_size, hop_size),
                HostChannel::new(win_size, hop_size),
            ],
            window: make_sqrt_hann_window(win_size),
            win_size,
            hop_size,
            frames_in: vec![vec![0.0; win_size]; CHANNELS],
            analysis: vec![vec![0.0; analysis_len]; CHANNELS],
            frame_out: vec![0.0; win_size],
            frames_out: [vec![0.0; win_size], vec![0.0; win_size]],
            failed_frames: 0,
            process,
        }
    }

    /// Input-to-output delay in samples.
    pub fn latency(&self) -> usize {
        self.win_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn process(&self) -> &P {
        &self.process
    }

    pub fn into_process(self) -> P {
        self.process
    }

    /// Frames replaced by silence because the process returned an error.
    pub fn failed_frames(&self) -> u64 {
        self.failed_frames
    }

    pub fn process_sample(&mut self, left: f32, right: f32) -> (f32, f32) {
        self.channels[0].push_input(left);
        self.channels[1].push_input(right);

        if self.channels.iter().all(|c| c.input_len() >= self.win_size) {
            for (ch, frame) in self.channels.iter().zip(self.frames_in.iter_mut()) {
                ch.peek_windowed(&self.window, frame);
            }

            if let Err(err) = self.run_frame() {
                warn!("short-time process rejected frame: {}", err);
                self.failed_frames += 1;
                for out in &mut self.frames_out {
                    out.fill(0.0);
                }
            }

            for (ch, out) in self.channels.iter_mut().zip(self.frames_out.iter()) {
                ch.overlap_add(out, &self.window);
                ch.discard_input(self.hop_size);
            }
        }

        (self.channels[0].pop_output(), self.channels[1].pop_output())
    }

    /// Processes two equally long blocks in place.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (out_l, out_r) = self.process_sample(*l, *r);
            *l = out_l;
            *r = out_r;
        }
    }

    fn run_frame(&mut self) -> MaskingResult<()> {
        for ch in 0..CHANNELS {
            self.process
                .frame_analysis(&self.frames_in[ch], &mut self.analysis[ch], ch)?;
        }
        self.process
            .process_parametrisation(&mut self.analysis, &self.frames_in)?;
        for ch in 0..CHANNELS {
            self.process
                .frame_synthesis(&mut self.frame_out, &self.analysis[ch], ch)?;
            self.frames_out[ch].copy_from_slice(&self.frame_out);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MaskingError;

    /// Passes frames straight through, or fails every frame.
    struct Passthrough {
        n: usize,
        fail: bool,
    }

    impl ShortTimeProcess for Passthrough {
        fn window_size(&self) -> usize {
            self.n
        }
        fn analysis_length(&self, frame_length: usize) -> usize {
            frame_length
        }
        fn frame_analysis(
            &mut self,
            in_frame: &[f32],
            analysis: &mut [f32],
            _: usize,
        ) -> MaskingResult<()> {
            analysis.copy_from_slice(in_frame);
            Ok(())
        }
        fn process_parametrisation(
            &mut self,
            _: &mut [Vec<f32>],
            _: &[Vec<f32>],
        ) -> MaskingResult<()> {
            if self.fail {
                return Err(MaskingError::precondition("test", 0, 1));
            }
            Ok(())
        }
        fn frame_synthesis(
            &mut self,
            out_frame: &mut [f32],
            analysis: &[f32],
            _: usize,
        ) -> MaskingResult<()> {
            out_frame.copy_from_slice(analysis);
            Ok(())
        }
    }

    #[test]
    fn test_passthrough_is_delayed_copy() {
        let n = 64;
        let mut host = StreamingHost::new(Passthrough { n, fail: false });
        assert_eq!(host.latency(), n);

        let input: Vec<f32> = (0..1024).map(|i| (i as f32 * 0.05).sin()).collect();
        let mut output = Vec::with_capacity(input.len());
        for &x in &input {
            output.push(host.process_sample(x, -x));
        }

        for t in (2 * n)..input.len() {
            assert!((output[t].0 - input[t - n]).abs() < 1e-4, "left mismatch at {}", t);
            assert!((output[t].1 + input[t - n]).abs() < 1e-4, "right mismatch at {}", t);
        }
        assert_eq!(host.failed_frames(), 0);
    }

    #[test]
    fn test_single_sample_window() {
        let mut host = StreamingHost::new(Passthrough { n: 1, fail: false });
        assert_eq!(host.hop_size(), 1);
        let input: Vec<f32> = (0..16).map(|i| i as f32 * 0.1).collect();
        let mut left = input.clone();
        let mut right = input.clone();
        host.process_block(&mut left, &mut right);
        assert!(left.iter().chain(right.iter()).all(|v| v.is_finite()));
        assert_eq!(host.failed_frames(), 0);
    }

    #[test]
    fn test_failed_frames_are_silent() {
        let n = 32;
        let mut host = StreamingHost::new(Passthrough { n, fail: true });
        let mut left = vec![1.0; 256];
        let mut right = vec![1.0; 256];
        host.process_block(&mut left, &mut right);
        assert!(left.iter().chain(right.iter()).all(|v| *v == 0.0));
        assert!(host.failed_frames() > 0);
    }
}
