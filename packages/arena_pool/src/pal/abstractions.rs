use std::fmt::Debug;
use std::io;
use std::num::NonZero;
use std::ptr::NonNull;

/// Virtual memory operations the arena needs from the operating system.
///
/// The methods take raw region pointers but are not `unsafe` because the only caller is the
/// arena, which only ever passes back regions it obtained from [`reserve()`][Self::reserve]
/// on the same platform.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Platform: Debug + Send + Sync + 'static {
    /// Size of a virtual memory page. Queried from the operating system once per process.
    fn page_size(&self) -> NonZero<usize>;

    /// Reserves and commits `len` bytes of process-private, zero-initialized, read-write memory.
    ///
    /// `len` is always a non-zero multiple of the page size.
    fn reserve(&self, len: usize) -> io::Result<NonNull<u8>>;

    /// Removes all access permissions from `len` bytes starting at `region`, which is
    /// page-aligned and lies inside a region returned by [`reserve()`][Self::reserve].
    fn protect_no_access(&self, region: NonNull<u8>, len: usize) -> io::Result<()>;

    /// Returns an entire region obtained from [`reserve()`][Self::reserve] to the operating system.
    fn release(&self, region: NonNull<u8>, len: usize) -> io::Result<()>;
}
