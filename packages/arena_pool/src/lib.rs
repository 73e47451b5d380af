#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! This package provides [`ArenaPool`], a typed object pool carved out of a single fixed-size
//! virtual memory arena.
//!
//! The arena is reserved once, up front, as a number of usable pages followed by a guard page
//! with all access removed. Objects are placed into word-aligned slots inside the usable region
//! and the slots of dropped objects are recycled for later objects of the same size.
//!
//! # Features
//!
//! - **Fixed footprint**: The arena never grows. When it is full, allocation fails instead of
//!   reaching for more memory.
//! - **Overrun detection**: Writing past the end of the usable region hits the guard page and
//!   faults immediately.
//! - **Size-class recycling**: Released slots are reused by any type of the same size class.
//! - **Group tags**: Each pool is bound to a [`GroupTag`] and refuses allocations that present a
//!   different tag.
//! - **Shared handles**: Values are accessed through reference-counted [`Pooled`] handles and
//!   dropped in place when the last handle goes away.
//! - **Thread-safe**: A pool can be shared and used from any number of threads.
//!
//! # Example
//!
//! ```rust
//! use arena_pool::ArenaPool;
//! use new_zealand::nz;
//!
//! #[derive(Debug)]
//! struct User {
//!     age: u32,
//!     name: String,
//! }
//!
//! let pool = ArenaPool::new("USER", nz!(1));
//!
//! let kim = pool
//!     .allocate(
//!         "USER",
//!         User {
//!             age: 10,
//!             name: "kim".to_string(),
//!         },
//!     )
//!     .unwrap();
//!
//! assert_eq!(kim.age, 10);
//! assert_eq!(kim.name, "kim");
//! assert_eq!(pool.live_count(), 1);
//!
//! let kim_address = kim.ptr().cast::<u8>();
//! drop(kim);
//!
//! // The slot is recycled for the next value of the same size.
//! let lee = pool
//!     .allocate(
//!         "USER",
//!         User {
//!             age: 20,
//!             name: "lee".to_string(),
//!         },
//!     )
//!     .unwrap();
//!
//! assert_eq!(lee.ptr().cast::<u8>(), kim_address);
//! ```
//!
//! # Failure modes
//!
//! Allocation returns an [`Error`] instead of panicking. A pool whose arena could not be
//! reserved stays usable as a value but refuses every allocation, see [`PoolState`].

mod arena;
mod builder;
mod error;
mod free_list;
mod pal;
mod pool;
mod pooled;
mod raw;
mod size_class;
mod tag;

pub(crate) use arena::*;
pub use builder::*;
pub use error::Error;
pub(crate) use error::Result;
pub(crate) use free_list::*;
pub use pool::*;
pub use pooled::*;
pub(crate) use raw::*;
pub(crate) use size_class::*;
pub use tag::*;
