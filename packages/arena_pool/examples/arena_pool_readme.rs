//! Basic usage of `ArenaPool`, matching the package documentation.

use arena_pool::ArenaPool;
use new_zealand::nz;

#[derive(Debug)]
struct User {
    age: u32,
    name: String,
}

#[derive(Debug)]
struct Room {
    number: u32,
    capacity: u32,
}

fn main() {
    let users = ArenaPool::new("USER", nz!(1));

    let kim = users
        .allocate(
            "USER",
            User {
                age: 10,
                name: "kim".to_string(),
            },
        )
        .expect("fresh pool has room for one user");

    println!("{} is {} years old", kim.name, kim.age);
    println!(
        "live: {}, used: {} of {} bytes",
        users.live_count(),
        users.used_bytes(),
        users.max_bytes()
    );

    // Pools refuse allocations made with somebody else's tag.
    let room = users.allocate(
        "ROOM",
        Room {
            number: 101,
            capacity: 4,
        },
    );

    match room {
        Ok(room) => println!("unexpectedly allocated {room:?}"),
        Err(error) => println!("refused: {error}"),
    }

    let rooms = ArenaPool::new("ROOM", nz!(1));
    let room = rooms
        .allocate(
            "ROOM",
            Room {
                number: 101,
                capacity: 4,
            },
        )
        .expect("fresh pool has room for one room");

    println!("room {} fits {} people", room.number, room.capacity);

    drop(kim);
    println!(
        "after release - live: {}, free slots: {}",
        users.live_count(),
        users.free_slot_count()
    );
}
