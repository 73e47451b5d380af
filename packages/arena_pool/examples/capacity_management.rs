//! Demonstrates how a fixed-size arena behaves as it fills up and how released slots are
//! recycled.

use arena_pool::{ArenaPool, Error};
use new_zealand::nz;

const BLOCK_SIZE: usize = 256;

fn main() {
    let pool = ArenaPool::builder()
        .group_tag("BLOCKS")
        .page_count(nz!(1))
        .build();

    println!(
        "arena: {} usable bytes, {} mapped bytes including the guard page",
        pool.max_bytes(),
        pool.mapped_bytes()
    );

    let mut blocks = Vec::new();

    loop {
        match pool.allocate("BLOCKS", [0_u8; BLOCK_SIZE]) {
            Ok(block) => blocks.push(block),
            Err(Error::CapacityExhausted {
                requested,
                used,
                max,
            }) => {
                println!("arena full: wanted {requested} bytes, {used} of {max} already used");
                break;
            }
            Err(error) => {
                println!("unexpected failure: {error}");
                return;
            }
        }
    }

    println!("allocated {} blocks", blocks.len());

    // Releasing a block makes its slot available again, even though the arena is full.
    blocks.truncate(blocks.len().saturating_sub(2));
    println!("free slots after releasing two: {}", pool.free_slot_count());

    match pool.allocate("BLOCKS", [1_u8; BLOCK_SIZE]) {
        Ok(block) => blocks.push(block),
        Err(error) => println!("unexpected failure: {error}"),
    }

    println!(
        "live: {}, free slots: {}, used bytes: {}",
        pool.live_count(),
        pool.free_slot_count(),
        pool.used_bytes()
    );
}
