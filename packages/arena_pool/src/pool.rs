use std::alloc::Layout;
use std::fmt;
use std::num::NonZero;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use parking_lot::Mutex;
use scopeguard::ScopeGuard;

use crate::pal::PlatformFacade;
use crate::{ArenaPoolBuilder, Error, GroupTag, Pooled, RawArenaPool, Result, Slot};

/// Whether a pool was able to reserve its arena.
///
/// A pool starts out [`Active`][PoolState::Active] unless its arena reservation fails, in
/// which case it is [`Inert`][PoolState::Inert] for its entire lifetime and every allocation
/// fails with [`Error::Inert`]. There is no transition between the two states.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum PoolState {
    /// The arena is reserved and allocations are served from it.
    Active,

    /// The arena could not be reserved. Every allocation fails.
    Inert,
}

/// A thread-safe typed object pool backed by a single fixed-size virtual memory arena.
///
/// The arena is reserved once, when the pool is created, as `page_count` usable pages followed
/// by one guard page whose access permissions are removed. Writing past the usable region
/// therefore faults immediately instead of silently corrupting memory.
///
/// Values are placed into slots carved out of the arena. The first allocation of each size
/// class takes fresh memory from a bump cursor; when the last [`Pooled`] handle to a value is
/// dropped, the value is dropped in place and its slot goes onto a free list keyed by size
/// class, to be reused by the next allocation of the same size class. Memory is never returned
/// to the operating system before the pool itself goes away.
///
/// Every pool is bound to a [`GroupTag`] and every allocation must present the same tag.
///
/// This type is a cloneable handle to a shared pool. The pool (and its arena) stays alive as
/// long as any pool handle or any [`Pooled`] handle to one of its values exists.
///
/// # Slot reuse across types
///
/// Slots are keyed purely by size class (size rounded up to the pointer width). Two unrelated
/// types of the same size class may occupy the same memory at different times. Do not keep raw
/// pointers obtained via [`Pooled::ptr()`] after the handle is gone - the memory behind them
/// may already hold a value of a different type.
///
/// # Capacity
///
/// The arena has a fixed capacity. Allocation never blocks: if a new slot is needed and the
/// usable region has no room left, the allocation fails with [`Error::CapacityExhausted`]
/// and the pool is left unchanged.
///
/// # Example
///
/// ```rust
/// use arena_pool::ArenaPool;
/// use new_zealand::nz;
///
/// let pool = ArenaPool::new("USER", nz!(1));
///
/// let name = pool.allocate("USER", "kim".to_string()).unwrap();
/// let age = pool.allocate("USER", 10_u32).unwrap();
///
/// assert_eq!(*name, "kim");
/// assert_eq!(*age, 10);
/// assert_eq!(pool.live_count(), 2);
///
/// // A mismatching group tag is refused.
/// assert!(pool.allocate("ROOM", 20_u32).is_err());
///
/// drop(name);
/// drop(age);
/// assert_eq!(pool.live_count(), 0);
/// ```
///
/// # Thread safety
///
/// The pool is thread-safe. Slot selection and bookkeeping happen under a lock; constructing
/// and dropping values happens outside it.
#[derive(Clone)]
pub struct ArenaPool {
    inner: Arc<PoolShared>,
}

struct PoolShared {
    /// Copy of the tag the core is bound to, readable without taking the lock.
    tag: GroupTag,

    core: Mutex<RawArenaPool>,
}

impl ArenaPool {
    /// Creates a pool bound to `tag` with an arena of `page_count` usable pages.
    ///
    /// If the arena cannot be reserved, the pool is created in the [`Inert`][PoolState::Inert]
    /// state and every allocation fails.
    ///
    /// # Example
    ///
    /// ```rust
    /// use arena_pool::{ArenaPool, PoolState};
    /// use new_zealand::nz;
    ///
    /// let pool = ArenaPool::new("ROOM", nz!(4));
    ///
    /// assert_eq!(pool.state(), PoolState::Active);
    /// assert_eq!(pool.group_tag(), "ROOM");
    /// ```
    #[must_use]
    pub fn new(tag: impl Into<GroupTag>, page_count: NonZero<usize>) -> Self {
        Self::builder().group_tag(tag).page_count(page_count).build()
    }

    /// Creates a builder for configuring and constructing an [`ArenaPool`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use arena_pool::ArenaPool;
    /// use new_zealand::nz;
    ///
    /// let pool = ArenaPool::builder()
    ///     .group_tag("SESSION")
    ///     .page_count(nz!(2))
    ///     .build();
    /// ```
    #[inline]
    pub fn builder() -> ArenaPoolBuilder {
        ArenaPoolBuilder::new()
    }

    pub(crate) fn new_inner(
        tag: GroupTag,
        page_count: NonZero<usize>,
        platform: PlatformFacade,
    ) -> Self {
        Self {
            inner: Arc::new(PoolShared {
                core: Mutex::new(RawArenaPool::new(tag.clone(), page_count, platform)),
                tag,
            }),
        }
    }

    /// Moves `value` into the pool and returns a shared handle to it.
    ///
    /// When the last clone of the returned handle is dropped, the value is dropped in place and
    /// its slot is kept for reuse by later allocations of the same size class.
    ///
    /// # Errors
    ///
    /// * [`Error::TagMismatch`] if `tag` is not the tag the pool is bound to.
    /// * [`Error::Inert`] if the pool could not reserve its arena.
    /// * [`Error::CapacityExhausted`] if a new slot is needed and the arena has no room left.
    /// * [`Error::UnsupportedAlignment`] if `T` needs stricter alignment than the pointer width.
    ///
    /// On error, `value` is dropped and the pool is unchanged.
    ///
    /// # Example
    ///
    /// ```rust
    /// use arena_pool::{ArenaPool, Error};
    /// use new_zealand::nz;
    ///
    /// let pool = ArenaPool::new("USER", nz!(1));
    ///
    /// let user = pool.allocate("USER", (30_u32, "jin")).unwrap();
    /// assert_eq!(user.0, 30);
    ///
    /// let refused = pool.allocate("ROOM", (40_u32, "lee"));
    /// assert!(matches!(refused, Err(Error::TagMismatch { .. })));
    /// ```
    pub fn allocate<T>(&self, tag: &str, value: T) -> Result<Pooled<T>> {
        self.allocate_with(tag, || value)
    }

    /// Claims a slot for a `T` and constructs the value directly into it by calling `make`.
    ///
    /// Nothing is constructed if the allocation fails. The constructor runs outside the pool
    /// lock, so a slow constructor does not hold up allocations on other threads. If the
    /// constructor panics, the slot is returned to the pool before the panic continues.
    ///
    /// # Errors
    ///
    /// Same as [`allocate()`][Self::allocate].
    ///
    /// # Example
    ///
    /// ```rust
    /// use arena_pool::ArenaPool;
    /// use new_zealand::nz;
    ///
    /// let pool = ArenaPool::new("ROOM", nz!(1));
    ///
    /// let room = pool
    ///     .allocate_with("ROOM", || format!("room_{}", 101))
    ///     .unwrap();
    ///
    /// assert_eq!(*room, "room_101");
    /// ```
    pub fn allocate_with<T>(&self, tag: &str, make: impl FnOnce() -> T) -> Result<Pooled<T>> {
        let slot = self.inner.core.lock().claim(tag, Layout::new::<T>())?;

        // If `make` panics, hand the (still empty) slot back before unwinding further.
        let slot = scopeguard::guard(slot, |slot| self.reclaim(slot));

        let ptr = slot.ptr().cast::<T>();
        let value = make();

        // SAFETY: The slot is claimed exclusively for us, lies inside the usable region of the
        // arena, spans at least size_of::<T>() bytes and is aligned for T (size_class ensures
        // T's alignment does not exceed the slot alignment).
        unsafe {
            ptr.write(value);
        }

        Ok(Pooled::new(ScopeGuard::into_inner(slot), ptr, self.clone()))
    }

    /// Drops the value in `slot` and makes the slot available for reuse.
    ///
    /// This is called by [`Pooled`] when the last handle to a value is dropped.
    ///
    /// # Safety
    ///
    /// `ptr` must point to the live `T` occupying `slot` and nothing may access that value
    /// after this call.
    ///
    /// # Panics
    ///
    /// Panics if the pool's live allocation count would go below zero - this means the pool's
    /// bookkeeping is corrupt and continuing could hand out memory that is still in use. The
    /// occupant is not dropped in that case.
    pub(crate) unsafe fn release<T>(&self, slot: Slot, ptr: NonNull<T>) {
        let validation = self.inner.core.lock().validate(&slot);

        match validation {
            Ok(()) => {}
            // Destroying the occupant again would be a double drop.
            Err(Error::CorruptionSuspected) => {
                panic!(
                    "arena pool '{}' is corrupt: {}",
                    self.inner.tag,
                    Error::CorruptionSuspected
                );
            }
            // A slot that does not belong to us keeps its occupant and is not recycled. The
            // core has already logged why.
            Err(_) => return,
        }

        // The slot is returned even if the destructor panics.
        let slot = scopeguard::guard(slot, |slot| self.reclaim(slot));

        // SAFETY: The caller guarantees `ptr` points to the live T occupying `slot` and that
        // nothing will access it again. We validated above that the slot is ours.
        unsafe {
            ptr::drop_in_place(ptr.as_ptr());
        }

        drop(slot);
    }

    fn reclaim(&self, slot: Slot) {
        let result = self.inner.core.lock().reclaim(slot);

        // Other errors are already logged by the core and mean the slot is simply not recycled.
        assert!(
            !matches!(result, Err(Error::CorruptionSuspected)),
            "arena pool '{}' is corrupt: {}",
            self.inner.tag,
            Error::CorruptionSuspected
        );
    }

    /// The group tag this pool is bound to.
    #[must_use]
    #[inline]
    pub fn group_tag(&self) -> &GroupTag {
        &self.inner.tag
    }

    /// Whether the pool has an arena to allocate from.
    #[must_use]
    pub fn state(&self) -> PoolState {
        self.inner.core.lock().state()
    }

    /// Number of values currently alive in the pool.
    ///
    /// # Example
    ///
    /// ```rust
    /// use arena_pool::ArenaPool;
    /// use new_zealand::nz;
    ///
    /// let pool = ArenaPool::new("USER", nz!(1));
    ///
    /// let a = pool.allocate("USER", 1_u64).unwrap();
    /// let b = a.clone();
    /// assert_eq!(pool.live_count(), 1);
    ///
    /// drop(a);
    /// assert_eq!(pool.live_count(), 1);
    ///
    /// drop(b);
    /// assert_eq!(pool.live_count(), 0);
    /// ```
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.inner.core.lock().live_count()
    }

    /// Number of distinct size classes the free list has buckets for.
    ///
    /// A bucket is created the first time a slot of its size class is released and is kept
    /// from then on, even when it is empty.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.inner.core.lock().bucket_count()
    }

    /// Number of released slots waiting to be reused, across all size classes.
    #[must_use]
    pub fn free_slot_count(&self) -> usize {
        self.inner.core.lock().free_slot_count()
    }

    /// Number of arena bytes taken by the bump cursor so far, padding included.
    ///
    /// Reusing released slots does not change this.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.inner.core.lock().used_bytes()
    }

    /// Total padding added by rounding value sizes up to the pointer width.
    ///
    /// # Example
    ///
    /// ```rust
    /// use arena_pool::ArenaPool;
    /// use new_zealand::nz;
    ///
    /// let pool = ArenaPool::new("USER", nz!(1));
    ///
    /// let _bytes = pool.allocate("USER", [0_u8; 3]).unwrap();
    ///
    /// assert_eq!(pool.adjustment_bytes(), size_of::<usize>() - 3);
    /// assert_eq!(pool.used_bytes(), size_of::<usize>());
    /// ```
    #[must_use]
    pub fn adjustment_bytes(&self) -> usize {
        self.inner.core.lock().adjustment_bytes()
    }

    /// Size of the usable region of the arena: the page count times the page size.
    ///
    /// Zero for an inert pool.
    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.inner.core.lock().max_bytes()
    }

    /// Size of the whole arena reservation, guard page included.
    ///
    /// Zero for an inert pool.
    #[must_use]
    pub fn mapped_bytes(&self) -> usize {
        self.inner.core.lock().mapped_bytes()
    }
}

impl fmt::Debug for ArenaPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.core.lock();

        f.debug_struct("ArenaPool")
            .field("tag", &self.inner.tag)
            .field("state", &core.state())
            .field("live_count", &core.live_count())
            .field("used_bytes", &core.used_bytes())
            .field("max_bytes", &core.max_bytes())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::io;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use new_zealand::nz;
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::pal::MockPlatform;

    assert_impl_all!(ArenaPool: Send, Sync, Clone, fmt::Debug);
    assert_impl_all!(PoolState: Send, Sync, Copy);

    fn inert_pool() -> ArenaPool {
        let mut platform = MockPlatform::new();
        platform.expect_page_size().return_const(nz!(4096_usize));
        platform
            .expect_reserve()
            .once()
            .returning(|_| Err(io::Error::from(io::ErrorKind::OutOfMemory)));

        ArenaPool::builder()
            .group_tag("USER")
            .platform(PlatformFacade::from_mock(platform))
            .build()
    }

    #[test]
    fn inert_pool_fails_every_allocation() {
        let pool = inert_pool();

        assert_eq!(pool.state(), PoolState::Inert);

        for _ in 0..3 {
            assert!(matches!(pool.allocate("USER", 1_u64), Err(Error::Inert)));
        }

        assert_eq!(pool.live_count(), 0);
        assert_eq!(pool.used_bytes(), 0);
        assert_eq!(pool.max_bytes(), 0);
    }

    #[test]
    fn constructor_is_not_called_on_failure() {
        let pool = ArenaPool::new("USER", nz!(1));
        let mut called = false;

        let result = pool.allocate_with("ROOM", || {
            called = true;
            1_u64
        });

        assert!(result.is_err());
        assert!(!called);
    }

    #[test]
    fn panicking_constructor_returns_slot() {
        let pool = ArenaPool::new("USER", nz!(1));

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            pool.allocate_with("USER", || -> u64 { panic!("constructor failed") })
        }));

        assert!(result.is_err());
        assert_eq!(pool.live_count(), 0);
        assert_eq!(pool.free_slot_count(), 1);
        assert_eq!(pool.used_bytes(), 8);

        // The slot is reused by the next allocation.
        let _value = pool.allocate("USER", 2_u64).unwrap();
        assert_eq!(pool.free_slot_count(), 0);
        assert_eq!(pool.used_bytes(), 8);
    }

    #[test]
    fn panicking_destructor_returns_slot() {
        struct Explosive;

        impl Drop for Explosive {
            fn drop(&mut self) {
                panic!("destructor failed");
            }
        }

        let pool = ArenaPool::new("USER", nz!(1));
        let value = pool.allocate("USER", Explosive).unwrap();

        let result = panic::catch_unwind(AssertUnwindSafe(move || drop(value)));

        assert!(result.is_err());
        assert_eq!(pool.live_count(), 0);
        assert_eq!(pool.free_slot_count(), 1);
    }

    #[test]
    fn release_of_foreign_tag_is_refused() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Counted;

        impl Drop for Counted {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::Relaxed);
            }
        }

        let users = ArenaPool::new("USER", nz!(1));
        let rooms = ArenaPool::new("ROOM", nz!(1));

        let slot = users.inner.core.lock().claim("USER", Layout::new::<Counted>()).unwrap();
        let ptr = slot.ptr().cast::<Counted>();

        // SAFETY: The slot was just claimed for a Counted.
        unsafe {
            ptr.write(Counted);
        }

        // SAFETY: The slot holds the live Counted we just wrote and we never touch it again.
        unsafe {
            rooms.release(slot, ptr);
        }

        assert_eq!(DROPS.load(Ordering::Relaxed), 0);
        assert_eq!(rooms.free_slot_count(), 0);
        assert_eq!(rooms.bucket_count(), 0);
        assert_eq!(users.live_count(), 1);
    }

    #[test]
    fn release_of_slot_from_other_arena_is_refused() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Counted;

        impl Drop for Counted {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::Relaxed);
            }
        }

        let first = ArenaPool::new("USER", nz!(1));
        let second = ArenaPool::new("USER", nz!(1));

        let slot = first.inner.core.lock().claim("USER", Layout::new::<Counted>()).unwrap();
        let ptr = slot.ptr().cast::<Counted>();

        // SAFETY: The slot was just claimed for a Counted.
        unsafe {
            ptr.write(Counted);
        }

        // SAFETY: The slot holds the live Counted we just wrote and we never touch it again.
        unsafe {
            second.release(slot, ptr);
        }

        assert_eq!(DROPS.load(Ordering::Relaxed), 0);
        assert_eq!(second.free_slot_count(), 0);
        assert_eq!(first.live_count(), 1);
    }

    #[test]
    fn repeated_release_panics_without_dropping_again() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Counted;

        impl Drop for Counted {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::Relaxed);
            }
        }

        let pool = ArenaPool::new("USER", nz!(1));

        let slot = pool.inner.core.lock().claim("USER", Layout::new::<Counted>()).unwrap();
        let forged = slot.forge_copy();
        let ptr = slot.ptr().cast::<Counted>();

        // SAFETY: The slot was just claimed for a Counted.
        unsafe {
            ptr.write(Counted);
        }

        // SAFETY: The slot holds the live Counted we just wrote.
        unsafe {
            pool.release(slot, ptr);
        }

        assert_eq!(DROPS.load(Ordering::Relaxed), 1);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            // SAFETY: Not upheld on purpose, the occupant is already gone. The pool must
            // detect this before touching it.
            unsafe {
                pool.release(forged, ptr);
            }
        }));

        assert!(result.is_err());
        assert_eq!(DROPS.load(Ordering::Relaxed), 1);
        assert_eq!(pool.live_count(), 0);
        assert_eq!(pool.free_slot_count(), 1);
    }

    #[test]
    fn debug_output_names_tag() {
        let pool = ArenaPool::new("USER", nz!(1));

        let output = format!("{pool:?}");

        assert!(output.contains("USER"));
        assert!(output.contains("Active"));
    }
}
