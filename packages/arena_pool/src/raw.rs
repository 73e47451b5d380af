use std::alloc::Layout;
use std::num::NonZero;
use std::ptr::NonNull;

use tracing::{error, warn};

use crate::pal::PlatformFacade;
use crate::{Arena, Error, FreeList, GroupTag, PoolState, Result, SizeClass};

/// A claimed piece of arena memory, not yet (or no longer) holding a live value.
///
/// A slot is not `Clone` - it is consumed when it is handed back to the pool, so safe code
/// cannot return the same claim twice.
#[derive(Debug)]
pub(crate) struct Slot {
    ptr: NonNull<u8>,
    offset: usize,
    size: SizeClass,
    tag: GroupTag,
}

impl Slot {
    #[must_use]
    #[inline]
    pub(crate) fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    #[must_use]
    #[inline]
    pub(crate) fn tag(&self) -> &GroupTag {
        &self.tag
    }

    /// A second claim on the same memory, as a repeated release would present it.
    #[cfg(test)]
    pub(crate) fn forge_copy(&self) -> Self {
        Self {
            ptr: self.ptr,
            offset: self.offset,
            size: self.size,
            tag: self.tag.clone(),
        }
    }
}

// SAFETY: A slot is an exclusive claim on a piece of arena memory. It does not provide access
// to that memory by itself, whoever writes through the pointer is responsible for that.
unsafe impl Send for Slot {}

/// The bookkeeping half of an arena pool: bump cursor, free list and counters.
///
/// This type does not construct or destroy values, it only hands out and takes back slots.
/// It is not thread-safe by itself - [`ArenaPool`][crate::ArenaPool] wraps it in a mutex.
#[derive(Debug)]
pub(crate) struct RawArenaPool {
    tag: GroupTag,

    /// `None` if the arena could not be reserved, in which case the pool is inert forever.
    arena: Option<Arena>,

    /// Offset of the first never-used byte. Equal to the number of bytes handed out by the bump
    /// path, as slots are packed back to back.
    cursor: usize,

    free_list: FreeList,

    /// Number of slots currently claimed.
    live: usize,

    /// Padding bytes added by rounding slot sizes up to the slot alignment.
    adjustment_bytes: usize,
}

impl RawArenaPool {
    /// Creates a pool bound to `tag`, reserving `page_count` usable pages plus a guard page.
    ///
    /// A reservation failure does not fail construction - the pool is created in the inert
    /// state instead and refuses every allocation.
    pub(crate) fn new(tag: GroupTag, page_count: NonZero<usize>, platform: PlatformFacade) -> Self {
        let arena = match Arena::reserve(platform, page_count) {
            Ok(arena) => Some(arena),
            Err(reservation_error) => {
                error!(
                    %tag,
                    %reservation_error,
                    page_count = page_count.get(),
                    "arena reservation failed, pool is inert"
                );
                None
            }
        };

        Self {
            tag,
            arena,
            cursor: 0,
            free_list: FreeList::new(),
            live: 0,
            adjustment_bytes: 0,
        }
    }

    /// Claims a slot large enough for `layout`, reusing a released slot of the same size class
    /// if there is one and bump-allocating otherwise.
    ///
    /// On failure the pool state is unchanged.
    pub(crate) fn claim(&mut self, tag: &str, layout: Layout) -> Result<Slot> {
        let Some(arena) = &self.arena else {
            return Err(Error::Inert);
        };

        if self.tag != tag {
            warn!(expected = %self.tag, actual = tag, "allocation refused: group tag mismatch");

            return Err(Error::TagMismatch {
                expected: self.tag.clone(),
                actual: GroupTag::from(tag),
            });
        }

        let (size, adjustment) = SizeClass::of(layout)?;

        let offset = if let Some(offset) = self.free_list.take(size) {
            offset
        } else {
            if arena.would_cross_guard(self.cursor, size.bytes()) {
                warn!(
                    %tag,
                    requested = size.bytes(),
                    used = self.cursor,
                    max = arena.usable_bytes(),
                    "allocation refused: arena capacity exhausted"
                );

                return Err(Error::CapacityExhausted {
                    requested: size.bytes(),
                    used: self.cursor,
                    max: arena.usable_bytes(),
                });
            }

            let offset = self.cursor;

            // Cannot overflow - we just checked that the slot ends inside the usable region.
            self.cursor = self.cursor.wrapping_add(size.bytes());

            self.adjustment_bytes = self
                .adjustment_bytes
                .checked_add(adjustment)
                .expect("padding cannot exceed the size of virtual memory");

            offset
        };

        self.live = self
            .live
            .checked_add(1)
            .expect("live slots cannot exceed the size of virtual memory");

        Ok(Slot {
            ptr: arena.slot_ptr(offset),
            offset,
            size,
            tag: self.tag.clone(),
        })
    }

    /// Checks that `slot` was issued by this pool and may be handed back to it.
    ///
    /// A release while no slot is live can only be a repeated release of the same slot and is
    /// refused with [`Error::CorruptionSuspected`], before the caller gets to destroy the
    /// occupant a second time.
    pub(crate) fn validate(&self, slot: &Slot) -> Result<()> {
        let Some(arena) = &self.arena else {
            error!(tag = %self.tag, offset = slot.offset, "release refused: pool is inert");
            return Err(Error::Inert);
        };

        if slot.tag != self.tag {
            error!(expected = %self.tag, actual = %slot.tag, "release refused: group tag mismatch");

            return Err(Error::TagMismatch {
                expected: self.tag.clone(),
                actual: slot.tag.clone(),
            });
        }

        let issued = arena.is_slot_at(slot.ptr, slot.offset)
            && slot
                .offset
                .checked_add(slot.size.bytes())
                .is_some_and(|end| end <= self.cursor);

        if !issued {
            error!(
                tag = %self.tag,
                offset = slot.offset,
                size = slot.size.bytes(),
                "release refused: slot was not issued by this pool"
            );

            return Err(Error::ForeignSlot {
                offset: slot.offset,
                size: slot.size.bytes(),
            });
        }

        if self.live == 0 {
            error!(
                tag = %self.tag,
                offset = slot.offset,
                "release refused: live allocation count would go below zero"
            );

            return Err(Error::CorruptionSuspected);
        }

        Ok(())
    }

    /// Takes back a slot whose occupant has already been destroyed (or was never constructed)
    /// and makes it available for reuse by later claims of the same size class.
    ///
    /// The slot is refused, and not recycled, if it fails [`validate()`][Self::validate] or if
    /// the live count would go below zero.
    pub(crate) fn reclaim(&mut self, slot: Slot) -> Result<()> {
        self.validate(&slot)?;

        // Cannot underflow - validate() refuses the release when nothing is live.
        self.live = self.live.wrapping_sub(1);

        self.free_list.give(slot.size, slot.offset);

        Ok(())
    }

    #[must_use]
    pub(crate) fn state(&self) -> PoolState {
        if self.arena.is_some() {
            PoolState::Active
        } else {
            PoolState::Inert
        }
    }

    #[must_use]
    #[inline]
    pub(crate) fn live_count(&self) -> usize {
        self.live
    }

    #[must_use]
    #[inline]
    pub(crate) fn bucket_count(&self) -> usize {
        self.free_list.bucket_count()
    }

    #[must_use]
    #[inline]
    pub(crate) fn free_slot_count(&self) -> usize {
        self.free_list.slot_count()
    }

    #[must_use]
    #[inline]
    pub(crate) fn used_bytes(&self) -> usize {
        self.cursor
    }

    #[must_use]
    #[inline]
    pub(crate) fn adjustment_bytes(&self) -> usize {
        self.adjustment_bytes
    }

    #[must_use]
    pub(crate) fn max_bytes(&self) -> usize {
        self.arena.as_ref().map_or(0, Arena::usable_bytes)
    }

    #[must_use]
    pub(crate) fn mapped_bytes(&self) -> usize {
        self.arena.as_ref().map_or(0, Arena::mapped_bytes)
    }
}
