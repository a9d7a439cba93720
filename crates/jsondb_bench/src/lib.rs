//! Benchmark utilities.

#![warn(missing_docs)]

use jsondb_core::{Collection, Database, Value};
use rand::Rng;

const NAMES: [&str; 8] = ["Ann", "Bob", "Cid", "Dan", "Eve", "Fay", "Gus", "Hal"];

/// Generates a player document with random scores and tags.
pub fn random_player(rng: &mut impl Rng) -> Value {
    let mut player = Value::object();
    player.insert("name", NAMES[rng.gen_range(0..NAMES.len())]);
    player.insert("score", rng.gen_range(0..10_000i64));
    player.insert("level", rng.gen_range(0..20i64));
    player.insert("active", rng.gen_bool(0.5));
    let tags: Vec<Value> = (0..rng.gen_range(0..4))
        .map(|i| Value::from(format!("tag-{i}")))
        .collect();
    player.insert("tags", tags);
    let mut stats = Value::object();
    stats.insert("wins", rng.gen_range(0..500i64));
    stats.insert("ratio", rng.gen::<f64>());
    player.insert("stats", stats);
    player
}

/// Generates a nested object `depth` levels deep with `width` members per
/// level.
pub fn nested_document(depth: usize, width: usize) -> Value {
    if depth == 0 {
        return Value::from("leaf");
    }
    (0..width)
        .map(|i| (format!("key_{i}"), nested_document(depth - 1, width)))
        .collect()
}

/// Opens an in-memory database whose `players` collection holds `count`
/// random players with integer identifiers.
pub fn populated(count: usize) -> Database {
    let db = Database::open_in_memory().expect("Failed to open database");
    {
        let players = db.collection("players").expect("Failed to open collection");
        fill(&players, count);
    }
    db
}

/// Stores `count` random players in one transaction.
pub fn fill(players: &Collection<'_>, count: usize) {
    let mut rng = rand::thread_rng();
    players
        .database()
        .transaction(|txn| {
            for i in 0..count {
                let id = i64::try_from(i).expect("count fits i64");
                players.put_in(txn, id, &random_player(&mut rng))?;
            }
            Ok(())
        })
        .expect("Failed to populate players");
}
