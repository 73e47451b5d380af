//! Integration tests for `arena_pool` against the real platform.
//!
//! These exercise the public API only, with the arena backed by real virtual memory.

use std::num::NonZero;
use std::sync::atomic::{AtomicUsize, Ordering};

use arena_pool::{ArenaPool, Error, PoolState};
use new_zealand::nz;

#[derive(Debug)]
struct User {
    age: u32,
    name: String,
}

#[test]
fn released_slot_is_reused_at_same_address() {
    let pool = ArenaPool::new("USER", nz!(1));

    let first = pool.allocate("USER", [1_u64; 8]).unwrap();
    let first_address = first.ptr().cast::<u8>();
    let used_after_first = pool.used_bytes();

    drop(first);
    assert_eq!(pool.bucket_count(), 1);
    assert_eq!(pool.free_slot_count(), 1);

    let second = pool.allocate("USER", [2_u64; 8]).unwrap();

    assert_eq!(second.ptr().cast::<u8>(), first_address);
    assert_eq!(pool.used_bytes(), used_after_first);
    assert_eq!(pool.bucket_count(), 1);
    assert_eq!(pool.free_slot_count(), 0);
    assert_eq!(*second, [2_u64; 8]);
}

#[test]
fn same_size_types_take_turns_in_one_slot() {
    struct Pair {
        left: u32,
        right: u32,
    }

    let pool = ArenaPool::new("USER", nz!(1));

    let pair = pool.allocate("USER", Pair { left: 1, right: 2 }).unwrap();
    let neighbor = pool.allocate("USER", 0xABCD_u64).unwrap();
    let pair_address = pair.ptr().cast::<u8>();

    drop(pair);

    let number = pool.allocate("USER", 0x1234_5678_u64).unwrap();

    assert_eq!(number.ptr().cast::<u8>(), pair_address);
    assert_eq!(*number, 0x1234_5678);
    assert_eq!(*neighbor, 0xABCD);

    drop(number);

    let pair = pool.allocate("USER", Pair { left: 3, right: 4 }).unwrap();

    assert_eq!(pair.ptr().cast::<u8>(), pair_address);
    assert_eq!((pair.left, pair.right), (3, 4));
    assert_eq!(*neighbor, 0xABCD);
    assert_eq!(pool.bucket_count(), 1);
}

#[test]
fn values_of_different_sizes_get_separate_buckets() {
    let pool = ArenaPool::new("USER", nz!(1));

    let a = pool.allocate("USER", 1_u64).unwrap();
    let b = pool.allocate("USER", [2_u64; 2]).unwrap();
    let c = pool.allocate("USER", [3_u64; 3]).unwrap();
    let d = pool.allocate("USER", [4_u64; 4]).unwrap();

    assert_eq!(pool.live_count(), 4);
    assert_eq!(pool.used_bytes(), (1 + 2 + 3 + 4) * size_of::<u64>());

    drop(a);
    drop(b);
    drop(c);
    drop(d);

    assert_eq!(pool.live_count(), 0);
    assert_eq!(pool.bucket_count(), 4);
    assert_eq!(pool.free_slot_count(), 4);
}

#[test]
fn full_arena_refuses_without_side_effects() {
    const BLOCK: usize = 64;

    let pool = ArenaPool::new("USER", nz!(1));
    let capacity = pool.max_bytes() / BLOCK;

    let mut blocks = (0..capacity)
        .map(|_| pool.allocate("USER", [0_u8; BLOCK]).unwrap())
        .collect::<Vec<_>>();

    assert_eq!(pool.used_bytes(), pool.max_bytes());

    let refused = pool.allocate("USER", [0_u8; BLOCK]);

    assert!(matches!(
        refused,
        Err(Error::CapacityExhausted { requested: BLOCK, .. })
    ));
    assert_eq!(pool.used_bytes(), pool.max_bytes());
    assert_eq!(pool.live_count(), capacity);
    assert_eq!(pool.free_slot_count(), 0);
    assert_eq!(pool.bucket_count(), 0);

    // A released slot can still be handed out from a full arena.
    drop(blocks.pop());
    let reused = pool.allocate("USER", [7_u8; BLOCK]).unwrap();

    assert_eq!(*reused, [7_u8; BLOCK]);
    assert_eq!(pool.live_count(), capacity);

    // A different size class has nowhere to go.
    assert!(matches!(
        pool.allocate("USER", [0_u8; BLOCK / 2]),
        Err(Error::CapacityExhausted { .. })
    ));
}

#[test]
fn mismatching_tag_is_always_refused() {
    let pool = ArenaPool::new("USER", nz!(1));

    for age in 0..100 {
        let result = pool.allocate(
            "ROOM",
            User {
                age,
                name: "lee".to_string(),
            },
        );

        let Err(Error::TagMismatch { expected, actual }) = result else {
            panic!("allocation with a foreign tag was not refused");
        };
        assert_eq!(expected, "USER");
        assert_eq!(actual, "ROOM");
    }

    assert_eq!(pool.live_count(), 0);
    assert_eq!(pool.used_bytes(), 0);
}

#[test]
fn tag_comparison_is_exact() {
    let pool = ArenaPool::new("USER", nz!(1));

    assert!(pool.allocate("user", 1_u8).is_err());
    assert!(pool.allocate("USER ", 1_u8).is_err());
    assert!(pool.allocate("", 1_u8).is_err());
    assert!(pool.allocate("USER", 1_u8).is_ok());
}

#[test]
fn over_aligned_type_is_refused() {
    #[repr(align(64))]
    struct CacheLine {
        _value: u8,
    }

    let pool = ArenaPool::new("USER", nz!(1));

    let result = pool.allocate("USER", CacheLine { _value: 1 });

    assert!(matches!(
        result,
        Err(Error::UnsupportedAlignment { align: 64, .. })
    ));
    assert_eq!(pool.used_bytes(), 0);
}

#[test]
fn unreservable_arena_makes_pool_inert() {
    let pool = ArenaPool::new("USER", NonZero::new(usize::MAX).unwrap());

    assert_eq!(pool.state(), PoolState::Inert);
    assert_eq!(pool.max_bytes(), 0);
    assert_eq!(pool.mapped_bytes(), 0);
    assert!(matches!(pool.allocate("USER", 1_u64), Err(Error::Inert)));
}

#[test]
fn destructors_run_once_per_value() {
    static DROPS: AtomicUsize = AtomicUsize::new(0);

    struct Counted {
        _payload: String,
    }

    impl Drop for Counted {
        fn drop(&mut self) {
            DROPS.fetch_add(1, Ordering::Relaxed);
        }
    }

    let pool = ArenaPool::new("USER", nz!(1));

    for round in 0..10 {
        let handles = (0..5)
            .map(|i| {
                pool.allocate(
                    "USER",
                    Counted {
                        _payload: format!("{round}-{i}"),
                    },
                )
                .unwrap()
            })
            .collect::<Vec<_>>();

        drop(handles);
    }

    assert_eq!(DROPS.load(Ordering::Relaxed), 50);
    assert_eq!(pool.live_count(), 0);

    // Every round after the first reused the slots of the previous one.
    assert_eq!(pool.free_slot_count(), 5);
}

#[test]
fn records_with_heap_data_survive_slot_churn() {
    let pool = ArenaPool::new("USER", nz!(1));

    let kim = pool
        .allocate(
            "USER",
            User {
                age: 10,
                name: "kim".to_string(),
            },
        )
        .unwrap();

    for age in 0..20 {
        let temp = pool
            .allocate(
                "USER",
                User {
                    age,
                    name: format!("temp{age}"),
                },
            )
            .unwrap();
        assert_eq!(temp.name, format!("temp{age}"));
    }

    assert_eq!(kim.age, 10);
    assert_eq!(kim.name, "kim");
    assert_eq!(pool.live_count(), 1);
    assert_eq!(pool.free_slot_count(), 1);
}

#[test]
fn padding_is_reported_for_odd_sizes() {
    let pool = ArenaPool::new("USER", nz!(1));

    let _three = pool.allocate("USER", [0_u8; 3]).unwrap();
    let _word = pool.allocate("USER", 0_usize).unwrap();

    assert_eq!(pool.adjustment_bytes(), size_of::<usize>() - 3);
    assert_eq!(pool.used_bytes(), 2 * size_of::<usize>());
}
