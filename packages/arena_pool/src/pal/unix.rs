use std::io;
use std::num::NonZero;
use std::ptr::{self, NonNull};
use std::sync::OnceLock;

use crate::pal::Platform;

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform = BuildTargetPlatform;

/// Virtual memory operations on the real operating system that the build is targeting.
///
/// You would only use a different platform in unit tests that need to use a mock platform.
/// Even then, whenever possible, unit tests should use the real platform for maximum realism.
#[derive(Debug, Default)]
pub(crate) struct BuildTargetPlatform;

// Real OS calls are excluded from coverage measurement because their error paths require
// OS-level failures that are impractical to trigger in tests.
#[cfg_attr(coverage_nightly, coverage(off))]
impl Platform for BuildTargetPlatform {
    fn page_size(&self) -> NonZero<usize> {
        static PAGE_SIZE: OnceLock<NonZero<usize>> = OnceLock::new();

        *PAGE_SIZE.get_or_init(|| {
            // SAFETY: No safety requirements.
            let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };

            usize::try_from(page_size)
                .ok()
                .and_then(NonZero::new)
                .expect("the operating system always reports a positive page size")
        })
    }

    fn reserve(&self, len: usize) -> io::Result<NonNull<u8>> {
        // SAFETY: We request a fresh anonymous mapping at an address of the kernel's choosing,
        // so no existing memory is affected.
        let region = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if region == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        NonNull::new(region.cast::<u8>())
            .ok_or_else(|| io::Error::other("mmap returned a null mapping"))
    }

    fn protect_no_access(&self, region: NonNull<u8>, len: usize) -> io::Result<()> {
        // SAFETY: The region is page-aligned and lies inside a mapping we own (trait contract).
        let result = unsafe { libc::mprotect(region.as_ptr().cast(), len, libc::PROT_NONE) };

        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    fn release(&self, region: NonNull<u8>, len: usize) -> io::Result<()> {
        // SAFETY: The region is an entire mapping we own (trait contract) and nothing
        // references it anymore.
        let result = unsafe { libc::munmap(region.as_ptr().cast(), len) };

        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}
