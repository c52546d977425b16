//! Sub-band Bin Indexing
//!
//! Fixed-size per-bin storage and the validated bin index used to address it.
//!
//! # Design Notes
//! - The mel bank always has `BIN_COUNT` bands; the analysis buffer carries one
//!   extra residual slot after them.
//! - `PerBin` is array-backed, so its length can never drift from `BIN_COUNT`.

use std::ops::{Index, IndexMut};

/// Number of mel-scaled sub-bands.
pub const BIN_COUNT: usize = 45;

/// Sub-band slots per analysis buffer (bands plus the residual).
pub const SLOT_COUNT: usize = BIN_COUNT + 1;

/// Slot index of the filter-bank residual.
pub const RESIDUAL_SLOT: usize = BIN_COUNT;

/// Validated index of a mel sub-band, `0..BIN_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bin(usize);

impl Bin {
    pub fn new(index: usize) -> Option<Self> {
        (index < BIN_COUNT).then_some(Self(index))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0
    }

    /// All bins in ascending frequency order.
    pub fn all() -> impl Iterator<Item = Bin> {
        (0..BIN_COUNT).map(Bin)
    }
}

/// One value per sub-band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerBin<T>([T; BIN_COUNT]);

impl<T: Copy> PerBin<T> {
    pub fn splat(value: T) -> Self {
        Self([value; BIN_COUNT])
    }

    pub fn from_fn(f: impl FnMut(usize) -> T) -> Self {
        Self(std::array::from_fn(f))
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }
}

impl<T> Index<Bin> for PerBin<T> {
    type Output = T;

    #[inline]
    fn index(&self, bin: Bin) -> &T {
        &self.0[bin.0]
    }
}

impl<T> IndexMut<Bin> for PerBin<T> {
    #[inline]
    fn index_mut(&mut self, bin: Bin) -> &mut T {
        &mut self.0[bin.0]
    }
}

/// Sample range of `slot` inside an analysis buffer of `frame_length`-sample slots.
#[inline]
pub fn slot_range(slot: usize, frame_length: usize) -> std::ops::Range<usize> {
    let start = slot * frame_length;
    start..start + frame_length
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_bounds() {
        assert!(Bin::new(0).is_some());
        assert!(Bin::new(BIN_COUNT - 1).is_some());
        assert!(Bin::new(BIN_COUNT).is_none());
        assert_eq!(Bin::all().count(), BIN_COUNT);
    }

    #[test]
    fn test_per_bin_indexing() {
        let mut values = PerBin::splat(0.0f32);
        let bin = Bin::new(7).unwrap();
        values[bin] = 3.5;
        assert_eq!(values[bin], 3.5);
        assert_eq!(values.as_slice().len(), BIN_COUNT);
        assert_eq!(values.iter().filter(|v| **v != 0.0).count(), 1);
    }

    #[test]
    fn test_slot_range() {
        assert_eq!(slot_range(0, 8), 0..8);
        assert_eq!(slot_range(RESIDUAL_SLOT, 8), 360..368);
    }
}
