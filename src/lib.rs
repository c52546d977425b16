//! Binaural spatial-temporal masking.
//!
//! Splits a stereo frame into 45 mel sub-bands per channel, keeps the bands
//! whose left/right signals are coherent enough to come from a narrow sector
//! in front of the microphone pair and are not far below their recent
//! energy, and attenuates the rest.
//!
//! `BinauralMasking` is the frame-level stage; `StreamingHost` wraps any
//! `ShortTimeProcess` into a sample-in/sample-out stereo processor.

pub mod config;
pub mod dsp;
mod error;
pub mod host;
pub mod stage;

pub use config::{BinauralConfig, MaskingMethod};
pub use error::{MaskingError, MaskingResult};
pub use host::StreamingHost;
pub use stage::{BinauralMasking, FrameReport, ShortTimeProcess};
