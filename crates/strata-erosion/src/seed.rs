//! Deterministic per-chunk random streams.
//!
//! Every erosion run draws its random numbers from a ChaCha stream derived
//! from the world seed and the chunk being eroded, so the same chunk always
//! erodes the same way regardless of request order or thread.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Derive a u64 seed for a chunk from the world seed and chunk coordinates.
pub fn derive_chunk_seed(world_seed: u64, chunk_x: i32, chunk_y: i32) -> u64 {
    let mut hasher = DefaultHasher::new();
    world_seed.hash(&mut hasher);
    chunk_x.hash(&mut hasher);
    chunk_y.hash(&mut hasher);
    hasher.finish()
}

/// Derive a deterministic RNG for a specific chunk.
pub fn chunk_rng(world_seed: u64, chunk_x: i32, chunk_y: i32) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(derive_chunk_seed(world_seed, chunk_x, chunk_y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    #[test]
    fn test_derive_chunk_seed_deterministic() {
        assert_eq!(derive_chunk_seed(999, 4, -2), derive_chunk_seed(999, 4, -2));
    }

    #[test]
    fn test_adjacent_chunks_get_different_seeds() {
        assert_ne!(derive_chunk_seed(42, 0, 0), derive_chunk_seed(42, 0, 1));
        assert_ne!(derive_chunk_seed(42, 1, 0), derive_chunk_seed(42, 0, 1));
    }

    #[test]
    fn test_world_seed_changes_stream() {
        assert_ne!(derive_chunk_seed(0, 5, 5), derive_chunk_seed(1, 5, 5));
    }

    #[test]
    fn test_chunk_rng_sequences_match() {
        let mut a = chunk_rng(42, 10, 20);
        let mut b = chunk_rng(42, 10, 20);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }
}
