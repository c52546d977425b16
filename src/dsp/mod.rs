pub mod bins;
pub mod decider;
pub mod filter_bank;
pub mod masker;
pub mod thresholds;
pub mod utils;

pub use bins::{Bin, PerBin, BIN_COUNT, RESIDUAL_SLOT, SLOT_COUNT};
pub use decider::{BinDecision, MaskingDecider, Verdict};
pub use filter_bank::MelFilterBank;
pub use masker::{Attenuation, FrameMasker};
pub use thresholds::calculate_thresholds;
