use std::io;
use std::num::NonZero;
use std::ptr::NonNull;
use std::sync::OnceLock;

use windows::Win32::System::Memory::{
    MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_NOACCESS, PAGE_PROTECTION_FLAGS, PAGE_READWRITE,
    VirtualAlloc, VirtualFree, VirtualProtect,
};
use windows::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

use crate::pal::Platform;

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform = BuildTargetPlatform;

/// Virtual memory operations on the real operating system that the build is targeting.
#[derive(Debug, Default)]
pub(crate) struct BuildTargetPlatform;

#[cfg_attr(coverage_nightly, coverage(off))]
impl Platform for BuildTargetPlatform {
    fn page_size(&self) -> NonZero<usize> {
        static PAGE_SIZE: OnceLock<NonZero<usize>> = OnceLock::new();

        *PAGE_SIZE.get_or_init(|| {
            let mut info = SYSTEM_INFO::default();

            // SAFETY: We pass a valid pointer to a SYSTEM_INFO that lives for the call.
            unsafe { GetSystemInfo(&raw mut info) };

            usize::try_from(info.dwPageSize)
                .ok()
                .and_then(NonZero::new)
                .expect("the operating system always reports a positive page size")
        })
    }

    fn reserve(&self, len: usize) -> io::Result<NonNull<u8>> {
        // SAFETY: We request a fresh allocation at an address of the system's choosing,
        // so no existing memory is affected.
        let region = unsafe { VirtualAlloc(None, len, MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE) };

        NonNull::new(region.cast::<u8>()).ok_or_else(io::Error::last_os_error)
    }

    fn protect_no_access(&self, region: NonNull<u8>, len: usize) -> io::Result<()> {
        let mut previous = PAGE_PROTECTION_FLAGS::default();

        // SAFETY: The region is page-aligned and lies inside an allocation we own
        // (trait contract). The out-parameter is valid for the duration of the call.
        unsafe {
            VirtualProtect(
                region.as_ptr().cast_const().cast(),
                len,
                PAGE_NOACCESS,
                &raw mut previous,
            )
        }
        .map_err(io::Error::from)
    }

    fn release(&self, region: NonNull<u8>, _len: usize) -> io::Result<()> {
        // SAFETY: The region is an entire allocation we own (trait contract) and nothing
        // references it anymore. MEM_RELEASE requires a size of zero.
        unsafe { VirtualFree(region.as_ptr().cast(), 0, MEM_RELEASE) }.map_err(io::Error::from)
    }
}
