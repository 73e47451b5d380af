use std::alloc::Layout;
use std::mem;

use crate::{Error, Result};

/// Every slot in the arena starts at a multiple of this and spans a multiple of this.
pub(crate) const SLOT_ALIGN: usize = mem::size_of::<usize>();

/// The exact number of arena bytes a slot occupies, always a non-zero multiple of
/// [`SLOT_ALIGN`].
///
/// Free slots are bucketed by size class, so any two types that round up to the same size
/// class can take turns occupying the same slot.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub(crate) struct SizeClass {
    bytes: usize,
}

impl SizeClass {
    /// Determines the size class of a memory layout.
    ///
    /// Returns the size class together with the number of padding bytes added on top of the
    /// layout size to reach it.
    ///
    /// Zero-sized layouts still occupy one word so that every slot has its own address.
    pub(crate) fn of(layout: Layout) -> Result<(Self, usize)> {
        if layout.align() > SLOT_ALIGN {
            return Err(Error::UnsupportedAlignment {
                align: layout.align(),
                max: SLOT_ALIGN,
            });
        }

        // A Layout size never exceeds isize::MAX when rounded up to its alignment, so rounding
        // up to a word cannot overflow usize.
        let bytes = layout.size().max(1).next_multiple_of(SLOT_ALIGN);

        // Cannot underflow - we only ever round up.
        let adjustment = bytes.wrapping_sub(layout.size());

        Ok((Self { bytes }, adjustment))
    }

    pub(crate) fn of_type<T>() -> Result<(Self, usize)> {
        Self::of(Layout::new::<T>())
    }

    #[must_use]
    #[inline]
    pub(crate) fn bytes(self) -> usize {
        self.bytes
    }
}
