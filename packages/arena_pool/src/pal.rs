//! Platform Abstraction Layer (PAL). All virtual memory calls go through here so that the
//! allocator core can be exercised against a mock platform in unit tests.

mod abstractions;
pub(crate) use abstractions::*;

mod facade;
pub(crate) use facade::*;

#[cfg(all(unix, not(miri)))]
mod unix;
#[cfg(all(unix, not(miri)))]
pub(crate) use unix::*;

#[cfg(all(windows, not(miri)))]
mod windows;
#[cfg(all(windows, not(miri)))]
pub(crate) use windows::*;

// The fallback module is compiled in test mode on all platforms, under Miri, and as the primary
// implementation on unsupported platforms. We only glob-import it when it is the primary
// implementation, otherwise it must be accessed via the explicit path `fallback::`.
#[cfg(any(test, miri, not(any(unix, windows))))]
pub(crate) mod fallback;

#[cfg(any(miri, not(any(unix, windows))))]
pub(crate) use fallback::*;
