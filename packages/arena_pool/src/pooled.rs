use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::{ArenaPool, Slot};

/// A shared handle to a value stored in an [`ArenaPool`].
///
/// Cloning the handle creates another reference to the same value. When the last handle is
/// dropped, the value is dropped in place and its slot becomes available for reuse by later
/// allocations of the same size class.
///
/// The handle keeps the pool alive, so the arena cannot be released while any handle exists.
///
/// # Example
///
/// ```rust
/// use arena_pool::ArenaPool;
/// use new_zealand::nz;
///
/// let pool = ArenaPool::new("USER", nz!(1));
/// let name = pool.allocate("USER", "jin".to_string()).unwrap();
///
/// let also_name = name.clone();
/// assert_eq!(name.len(), 3);
///
/// drop(name);
/// assert_eq!(*also_name, "jin");
/// ```
pub struct Pooled<T> {
    inner: Arc<PooledInner<T>>,
}

struct PooledInner<T> {
    ptr: NonNull<T>,

    /// Taken exactly once, when the last handle goes away.
    slot: ManuallyDrop<Slot>,

    /// Keeps the arena alive for as long as the value exists.
    pool: ArenaPool,
}

impl<T> Pooled<T> {
    /// `ptr` must point to a live `T` that occupies `slot`.
    pub(crate) fn new(slot: Slot, ptr: NonNull<T>, pool: ArenaPool) -> Self {
        Self {
            inner: Arc::new(PooledInner {
                ptr,
                slot: ManuallyDrop::new(slot),
                pool,
            }),
        }
    }

    /// Returns a pointer to the value inside the arena.
    ///
    /// The pointer is valid for as long as any handle to the value exists. Once the last handle
    /// is gone, the memory may be reused for a value of a different type.
    ///
    /// # Example
    ///
    /// ```rust
    /// use arena_pool::ArenaPool;
    /// use new_zealand::nz;
    ///
    /// let pool = ArenaPool::new("USER", nz!(1));
    /// let value = pool.allocate("USER", 42_u64).unwrap();
    ///
    /// // SAFETY: The handle is still alive and nobody is mutating the value.
    /// assert_eq!(unsafe { value.ptr().read() }, 42);
    /// ```
    #[must_use]
    #[inline]
    pub fn ptr(&self) -> NonNull<T> {
        self.inner.ptr
    }

    /// Returns an exclusive reference to the value if this is the only handle to it.
    ///
    /// # Example
    ///
    /// ```rust
    /// use arena_pool::ArenaPool;
    /// use new_zealand::nz;
    ///
    /// let pool = ArenaPool::new("USER", nz!(1));
    /// let mut score = pool.allocate("USER", 10_u32).unwrap();
    ///
    /// *score.get_mut().unwrap() += 5;
    /// assert_eq!(*score, 15);
    ///
    /// let shared = score.clone();
    /// assert!(score.get_mut().is_none());
    /// # drop(shared);
    /// ```
    #[must_use]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        let inner = Arc::get_mut(&mut self.inner)?;

        // SAFETY: We are the only handle to the value and we hold it exclusively for the
        // lifetime of the returned reference.
        Some(unsafe { inner.ptr.as_mut() })
    }

    /// The pool the value lives in.
    #[must_use]
    #[inline]
    pub fn pool(&self) -> &ArenaPool {
        &self.inner.pool
    }
}

impl<T> Clone for Pooled<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: The value stays alive and in place for as long as any handle exists and
        // shared handles never hand out exclusive references.
        unsafe { self.inner.ptr.as_ref() }
    }
}

impl<T> Drop for PooledInner<T> {
    fn drop(&mut self) {
        // SAFETY: Arc guarantees this runs once, so the slot has not been taken before and
        // is never touched again afterwards.
        let slot = unsafe { ManuallyDrop::take(&mut self.slot) };

        // SAFETY: The pointer refers to the live T in this slot and this was the last handle.
        unsafe {
            self.pool.release(slot, self.ptr);
        }
    }
}

// SAFETY: The value is reachable from every thread holding a handle, through `&T` from any of
// them and dropped on whichever thread lets go last, so both Send and Sync are required of T.
unsafe impl<T: Send + Sync> Send for PooledInner<T> {}

// SAFETY: Same reasoning as Send. The slot and pool parts are thread-safe on their own.
unsafe impl<T: Send + Sync> Sync for PooledInner<T> {}

impl<T: fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("value", &**self)
            .field("tag", self.inner.slot.tag())
            .finish_non_exhaustive()
    }
}
