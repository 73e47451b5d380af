use std::alloc::{self, Layout};
use std::io;
use std::num::NonZero;
use std::ptr::NonNull;

use new_zealand::nz;

use crate::pal::Platform;

const PAGE_SIZE: NonZero<usize> = nz!(4096);

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
#[cfg_attr(test, allow(dead_code, reason = "only the primary PAL under Miri"))]
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform = BuildTargetPlatform;

/// Platform used under Miri and on targets without a native virtual memory implementation.
///
/// Memory comes from the Rust global allocator. The guard page is still set aside but it is
/// not hardware-protected, so overruns into it go unnoticed.
#[derive(Debug, Default)]
pub(crate) struct BuildTargetPlatform;

impl BuildTargetPlatform {
    fn layout(len: usize) -> io::Result<Layout> {
        if len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot reserve an empty region",
            ));
        }

        Layout::from_size_align(len, PAGE_SIZE.get())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
    }
}

impl Platform for BuildTargetPlatform {
    fn page_size(&self) -> NonZero<usize> {
        PAGE_SIZE
    }

    fn reserve(&self, len: usize) -> io::Result<NonNull<u8>> {
        let layout = Self::layout(len)?;

        // SAFETY: The layout has a non-zero size.
        let region = unsafe { alloc::alloc_zeroed(layout) };

        NonNull::new(region).ok_or_else(|| io::Error::from(io::ErrorKind::OutOfMemory))
    }

    fn protect_no_access(&self, _region: NonNull<u8>, _len: usize) -> io::Result<()> {
        Ok(())
    }

    fn release(&self, region: NonNull<u8>, len: usize) -> io::Result<()> {
        let layout = Self::layout(len)?;

        // SAFETY: The region was allocated by `reserve()` with the same length (trait contract),
        // which yields the same layout.
        unsafe { alloc::dealloc(region.as_ptr(), layout) };

        Ok(())
    }
}
