//! Index width abstraction
//!
//! Trees store vertex, material, triangle and node indices at a fixed width.
//! Sixteen bits covers most meshes and halves the record size; thirty-two bits
//! is there for the rest.

use crate::error::{KdopError, KdopResult};

/// An unsigned integer type usable as a tree index
pub trait KdopIndex:
    Copy + Eq + Ord + std::hash::Hash + std::fmt::Debug + Default + bytemuck::Pod + Send + Sync + 'static
{
    /// Size of the index in bytes, as recorded in archives
    const WIDTH: u32;

    /// Largest representable index
    const MAX_VALUE: usize;

    /// Convert from `usize`, `None` if the value does not fit
    fn from_usize(value: usize) -> Option<Self>;

    /// Widen to `usize`
    fn to_usize(self) -> usize;

    /// Checked conversion reporting overflow as [`KdopError::IndexOverflow`]
    fn checked(what: &'static str, value: usize) -> KdopResult<Self> {
        Self::from_usize(value).ok_or(KdopError::IndexOverflow {
            what,
            value,
            max: Self::MAX_VALUE,
        })
    }
}

impl KdopIndex for u16 {
    const WIDTH: u32 = 2;
    const MAX_VALUE: usize = Self::MAX as usize;

    #[inline]
    fn from_usize(value: usize) -> Option<Self> {
        Self::try_from(value).ok()
    }

    #[inline]
    fn to_usize(self) -> usize {
        usize::from(self)
    }
}

impl KdopIndex for u32 {
    const WIDTH: u32 = 4;
    const MAX_VALUE: usize = Self::MAX as usize;

    #[inline]
    fn from_usize(value: usize) -> Option<Self> {
        Self::try_from(value).ok()
    }

    #[inline]
    fn to_usize(self) -> usize {
        self as usize
    }
}
