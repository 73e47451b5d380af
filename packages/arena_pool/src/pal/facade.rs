use std::fmt::{self, Debug};
use std::io;
use std::num::NonZero;
use std::ptr::NonNull;
#[cfg(test)]
use std::sync::Arc;

#[cfg(test)]
use crate::pal::MockPlatform;
use crate::pal::{BUILD_TARGET_PLATFORM, BuildTargetPlatform, Platform};

/// Enum to hide the real/mock choice behind a single wrapper type.
#[derive(Clone)]
pub(crate) enum PlatformFacade {
    Real(&'static BuildTargetPlatform),

    #[cfg(test)]
    Mock(Arc<MockPlatform>),
}

impl PlatformFacade {
    pub(crate) fn real() -> Self {
        Self::Real(&BUILD_TARGET_PLATFORM)
    }

    #[cfg(test)]
    pub(crate) fn from_mock(mock: MockPlatform) -> Self {
        Self::Mock(Arc::new(mock))
    }
}

impl Platform for PlatformFacade {
    fn page_size(&self) -> NonZero<usize> {
        match self {
            Self::Real(p) => p.page_size(),
            #[cfg(test)]
            Self::Mock(p) => p.page_size(),
        }
    }

    fn reserve(&self, len: usize) -> io::Result<NonNull<u8>> {
        match self {
            Self::Real(p) => p.reserve(len),
            #[cfg(test)]
            Self::Mock(p) => p.reserve(len),
        }
    }

    fn protect_no_access(&self, region: NonNull<u8>, len: usize) -> io::Result<()> {
        match self {
            Self::Real(p) => p.protect_no_access(region, len),
            #[cfg(test)]
            Self::Mock(p) => p.protect_no_access(region, len),
        }
    }

    fn release(&self, region: NonNull<u8>, len: usize) -> io::Result<()> {
        match self {
            Self::Real(p) => p.release(region, len),
            #[cfg(test)]
            Self::Mock(p) => p.release(region, len),
        }
    }
}

impl From<&'static BuildTargetPlatform> for PlatformFacade {
    fn from(p: &'static BuildTargetPlatform) -> Self {
        Self::Real(p)
    }
}

#[cfg(test)]
impl From<MockPlatform> for PlatformFacade {
    fn from(p: MockPlatform) -> Self {
        Self::Mock(Arc::new(p))
    }
}

#[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
impl Debug for PlatformFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real(p) => p.fmt(f),
            #[cfg(test)]
            Self::Mock(p) => p.fmt(f),
        }
    }
}
