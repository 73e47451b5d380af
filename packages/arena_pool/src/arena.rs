use std::io;
use std::num::NonZero;
use std::ptr::NonNull;

use tracing::{debug, error};

use crate::pal::{Platform, PlatformFacade};
use crate::{Error, Result};

/// A single contiguous virtual memory reservation of `page_count + 1` pages.
///
/// The first `page_count` pages are the usable region. The final page is the guard page, with
/// all access permissions removed so that any write running past the usable region faults
/// immediately instead of corrupting unrelated memory.
///
/// The arena never grows or shrinks. The whole reservation is returned to the operating system
/// when the arena is dropped.
#[derive(Debug)]
pub(crate) struct Arena {
    base: NonNull<u8>,

    /// Bytes that may be handed out to slots.
    usable_bytes: usize,

    /// Usable bytes plus the guard page.
    mapped_bytes: usize,

    platform: PlatformFacade,
}

impl Arena {
    /// Reserves the arena and locks down its guard page.
    ///
    /// If the guard page cannot be protected, the reservation is released again - an arena
    /// without a guard page is never handed out.
    pub(crate) fn reserve(platform: PlatformFacade, page_count: NonZero<usize>) -> Result<Self> {
        let page_size = platform.page_size().get();

        let (usable_bytes, mapped_bytes) = page_count
            .get()
            .checked_mul(page_size)
            .and_then(|usable| Some((usable, usable.checked_add(page_size)?)))
            .ok_or_else(|| Error::Reservation {
                bytes: usize::MAX,
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "requested page count exceeds the size of virtual memory",
                ),
            })?;

        let base = platform
            .reserve(mapped_bytes)
            .map_err(|source| Error::Reservation {
                bytes: mapped_bytes,
                source,
            })?;

        // SAFETY: The guard page is the last page of the region we just reserved.
        let guard = unsafe { base.add(usable_bytes) };

        if let Err(source) = platform.protect_no_access(guard, page_size) {
            if let Err(release_error) = platform.release(base, mapped_bytes) {
                error!(%release_error, mapped_bytes, "failed to release unguarded arena");
            }

            return Err(Error::Reservation {
                bytes: mapped_bytes,
                source,
            });
        }

        debug!(
            usable_bytes,
            mapped_bytes, page_size, "reserved arena with trailing guard page"
        );

        Ok(Self {
            base,
            usable_bytes,
            mapped_bytes,
            platform,
        })
    }

    #[must_use]
    #[inline]
    pub(crate) fn usable_bytes(&self) -> usize {
        self.usable_bytes
    }

    #[must_use]
    #[inline]
    pub(crate) fn mapped_bytes(&self) -> usize {
        self.mapped_bytes
    }

    /// Whether `len` bytes starting at `offset` would reach past the usable region into the
    /// guard page (or beyond).
    #[must_use]
    #[inline]
    pub(crate) fn would_cross_guard(&self, offset: usize, len: usize) -> bool {
        offset
            .checked_add(len)
            .is_none_or(|end| end > self.usable_bytes)
    }

    /// Address of the slot that starts `offset` bytes into the usable region.
    ///
    /// # Panics
    ///
    /// Panics if the offset is not inside the usable region.
    #[must_use]
    pub(crate) fn slot_ptr(&self, offset: usize) -> NonNull<u8> {
        assert!(
            offset < self.usable_bytes,
            "offset {offset} is outside the usable region of {} bytes",
            self.usable_bytes
        );

        // SAFETY: We just verified the offset stays within the usable region of our reservation.
        unsafe { self.base.add(offset) }
    }

    /// Whether `ptr` is the address of the slot at `offset`.
    #[must_use]
    pub(crate) fn is_slot_at(&self, ptr: NonNull<u8>, offset: usize) -> bool {
        offset < self.usable_bytes && self.slot_ptr(offset) == ptr
    }
}

impl Drop for Arena {
    #[cfg_attr(test, mutants::skip)] // Leaking the reservation has no observable effect in tests.
    fn drop(&mut self) {
        match self.platform.release(self.base, self.mapped_bytes) {
            Ok(()) => debug!(mapped_bytes = self.mapped_bytes, "released arena"),
            Err(release_error) => {
                error!(%release_error, mapped_bytes = self.mapped_bytes, "failed to release arena");
            }
        }
    }
}

// SAFETY: The arena exclusively owns its reservation. The base pointer is never used to create
// references by the arena itself; callers synchronize access to slot contents.
unsafe impl Send for Arena {}

// SAFETY: All `&self` methods only read the immutable fields and perform address arithmetic.
unsafe impl Sync for Arena {}
