//! Benchmark utilities.

use optimist_core::Entity;
use rand::Rng;

/// Generate `count` random deltas in `-range..range`.
pub fn random_deltas(count: usize, range: i64) -> Vec<i64> {
    let mut rng = rand::thread_rng();
    (0..count).map(|_| rng.gen_range(-range..range)).collect()
}

/// Generate `count` integer entities starting at zero.
pub fn generate_entities(count: usize) -> Vec<Entity<i64>> {
    (0..count).map(|_| Entity::new(0)).collect()
}

/// Generate a text entity with a payload of `size` bytes.
pub fn text_entity(size: usize) -> Entity<String> {
    Entity::new("x".repeat(size))
}
