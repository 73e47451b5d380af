use std::io;

use thiserror::Error;

use crate::GroupTag;

/// Errors reported by an [`ArenaPool`][crate::ArenaPool].
///
/// None of these are raised as panics by the allocation path - a failed allocation is an
/// ordinary `Err` that leaves the pool unchanged. The only fatal condition is
/// [`CorruptionSuspected`][Error::CorruptionSuspected] surfacing from an item handle being
/// dropped, which panics because continuing would risk silent memory corruption.
///
/// Writing past the end of the usable region is deliberately absent from this list: the
/// trailing guard page turns such a write into an immediate access violation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The arena could not be reserved (or its guard page could not be protected) when the pool
    /// was created. The pool is permanently inert.
    #[error("failed to reserve an arena of {bytes} bytes")]
    Reservation {
        /// The total number of bytes requested from the operating system, guard page included.
        bytes: usize,

        /// The error reported by the operating system.
        #[source]
        source: io::Error,
    },

    /// The pool has no arena because reservation failed when the pool was created.
    #[error("the pool is inert because its arena could not be reserved")]
    Inert,

    /// The group tag presented by the caller does not match the tag the pool is bound to.
    #[error("group tag '{actual}' does not match the pool's group tag '{expected}'")]
    TagMismatch {
        /// The tag the pool is bound to.
        expected: GroupTag,

        /// The tag that was presented.
        actual: GroupTag,
    },

    /// Serving the request would require more bytes than the arena has left.
    #[error(
        "arena capacity exhausted: {requested} more bytes requested with {used} of {max} bytes in use"
    )]
    CapacityExhausted {
        /// The aligned size of the slot that was requested.
        requested: usize,

        /// The number of arena bytes already handed out by the bump cursor.
        used: usize,

        /// The usable size of the arena.
        max: usize,
    },

    /// The type requires a stricter alignment than the arena guarantees for its slots.
    #[error("alignment of {align} bytes exceeds the maximum supported slot alignment of {max}")]
    UnsupportedAlignment {
        /// The alignment required by the type.
        align: usize,

        /// The alignment every arena slot satisfies.
        max: usize,
    },

    /// The slot being released does not describe memory issued by this pool.
    #[error("slot at offset {offset} with size {size} was not issued by this pool")]
    ForeignSlot {
        /// Offset of the slot from the start of the arena it claims to belong to.
        offset: usize,

        /// Size class of the slot.
        size: usize,
    },

    /// Releasing the slot would have taken the live allocation count below zero, which can only
    /// happen through a double release or a corrupted pool.
    #[error("live allocation count would go below zero - double release or pool corruption")]
    CorruptionSuspected,
}

/// A specialized `Result` type for arena pool operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;
