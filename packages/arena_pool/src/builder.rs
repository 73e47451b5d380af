use std::cell::Cell;
use std::marker::PhantomData;
use std::num::NonZero;

use new_zealand::nz;

use crate::pal::PlatformFacade;
use crate::{ArenaPool, GroupTag};

/// Builder for creating an instance of [`ArenaPool`].
///
/// The group tag is mandatory. The arena size defaults to a single usable page.
///
/// # Examples
///
/// ```
/// use arena_pool::ArenaPool;
///
/// let pool = ArenaPool::builder().group_tag("USER").build();
///
/// assert_eq!(pool.group_tag(), "USER");
/// ```
///
/// # Thread safety
///
/// The builder is thread-mobile ([`Send`]) but not thread-safe ([`Sync`]).
#[derive(Debug)]
#[must_use]
pub struct ArenaPoolBuilder {
    tag: Option<GroupTag>,
    page_count: NonZero<usize>,
    platform: PlatformFacade,

    // Prevents Sync while allowing Send - builders are thread-mobile but not thread-safe
    _not_sync: PhantomData<Cell<()>>,
}

impl ArenaPoolBuilder {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            tag: None,
            page_count: nz!(1),
            platform: PlatformFacade::real(),
            _not_sync: PhantomData,
        }
    }

    /// Sets the group tag the pool is bound to. Every allocation must present the same tag.
    ///
    /// # Examples
    ///
    /// ```
    /// use arena_pool::{ArenaPool, GroupTag};
    ///
    /// let tag = GroupTag::from("ROOM");
    /// let pool = ArenaPool::builder().group_tag(tag.clone()).build();
    ///
    /// assert_eq!(*pool.group_tag(), tag);
    /// ```
    #[inline]
    pub fn group_tag(mut self, tag: impl Into<GroupTag>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Sets the number of usable pages in the arena. A guard page is always added on top.
    ///
    /// # Examples
    ///
    /// ```
    /// use arena_pool::ArenaPool;
    /// use new_zealand::nz;
    ///
    /// let pool = ArenaPool::builder()
    ///     .group_tag("USER")
    ///     .page_count(nz!(8))
    ///     .build();
    ///
    /// assert_eq!(pool.mapped_bytes(), pool.max_bytes() / 8 * 9);
    /// ```
    #[inline]
    pub fn page_count(mut self, page_count: NonZero<usize>) -> Self {
        self.page_count = page_count;
        self
    }

    #[cfg(test)]
    pub(crate) fn platform(mut self, platform: PlatformFacade) -> Self {
        self.platform = platform;
        self
    }

    /// Builds the pool, reserving its arena.
    ///
    /// If the arena cannot be reserved, the pool is still returned but in the
    /// [`Inert`][crate::PoolState::Inert] state.
    ///
    /// # Panics
    ///
    /// Panics if no group tag has been set using [`group_tag`](Self::group_tag).
    #[must_use]
    pub fn build(self) -> ArenaPool {
        let tag = self
            .tag
            .expect("group tag must be set before building an ArenaPool");

        ArenaPool::new_inner(tag, self.page_count, self.platform)
    }
}
