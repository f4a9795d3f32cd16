//! Deterministic hashing helpers. The hashing data structures in the standard library are
//! randomly seeded, so iteration order and seed offsets would differ from run to run. We use
//! `rustc_hash` for lookup tables and `xxh3` for string hashes that feed random seeds.
//!
//! `HashMap<K, V, S>` does not have a `new` method with a non-default hasher. Use
//! `HashMap::default()` instead.

use xxhash_rust::xxh3::xxh3_64;

pub use rustc_hash::FxHashMap as HashMap;

/// A convenience method to compute a stable hash of a `&str`. Used to derive per-country
/// random seed offsets so that draws do not depend on worker scheduling.
pub fn hash_str(data: &str) -> u64 {
    xxh3_64(data.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_strings() {
        let a = hash_str("FR");
        let b = hash_str("FR");
        let c = hash_str("DE");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn hash_map_default() {
        let mut map: HashMap<&str, u32> = HashMap::default();
        map.insert("fr", 1);
        assert_eq!(map.get("fr"), Some(&1));
    }
}
