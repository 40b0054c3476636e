//! Hash containers used throughout the engine.
//!
//! `FixedHashState` provides stable hash results through a fixed seed;
//! `NoOpHashState` passes `u64`-shaped keys straight through, which is all a
//! [`TypeId`] needs.

use core::any::TypeId;
use core::hash::{BuildHasher, Hasher};

use foldhash::fast::{FixedState, FoldHasher};

// -----------------------------------------------------------------------------
// FixedHasher

/// A fixed hash seed.
const FIXED_HASH_STATE: FixedState = FixedState::with_seed(0x6A09_E667_F3BC_C908);

/// A fixed hasher provided hash results that only depend on the input.
pub type FixedHasher = FoldHasher<'static>;

/// Fixed hash state based upon a random but fixed seed.
#[derive(Copy, Clone, Default, Debug)]
pub struct FixedHashState;

impl BuildHasher for FixedHashState {
    type Hasher = FixedHasher;

    #[inline(always)]
    fn build_hasher(&self) -> Self::Hasher {
        FIXED_HASH_STATE.build_hasher()
    }
}

/// The engine's default map type: [`hashbrown::HashMap`] with a fixed seed.
pub type HashMap<K, V> = hashbrown::HashMap<K, V, FixedHashState>;

/// The engine's default set type.
pub type HashSet<K> = hashbrown::HashSet<K, FixedHashState>;

// -----------------------------------------------------------------------------
// NoOpHasher

/// A no-op hash that directly passes the value through `u64`.
#[derive(Copy, Clone, Default, Debug)]
pub struct NoOpHasher {
    hash: u64,
}

impl Hasher for NoOpHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.hash
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes.iter().rev() {
            self.hash = self.hash.rotate_left(8).wrapping_add(*byte as u64);
        }
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.hash = i;
    }
}

/// Build state for [`NoOpHasher`].
#[derive(Copy, Clone, Default, Debug)]
pub struct NoOpHashState;

impl BuildHasher for NoOpHashState {
    type Hasher = NoOpHasher;

    #[inline(always)]
    fn build_hasher(&self) -> Self::Hasher {
        NoOpHasher { hash: 0 }
    }
}

// -----------------------------------------------------------------------------
// TypeIdMap

/// A specialized map container with [`TypeId`] as the fixed key type.
///
/// [`TypeId`] values are already high-quality hashes, so the map skips
/// re-hashing them. The interface exposes no `HashMap` specifics, which
/// keeps the underlying implementation swappable.
pub struct TypeIdMap<V>(hashbrown::HashMap<TypeId, V, NoOpHashState>);

impl<V> TypeIdMap<V> {
    /// Creates an empty `TypeIdMap`.
    #[inline]
    pub const fn new() -> Self {
        Self(hashbrown::HashMap::with_hasher(NoOpHashState))
    }

    /// Whether the map contains the given key.
    #[inline]
    pub fn contains(&self, key: &TypeId) -> bool {
        self.0.contains_key(key)
    }

    /// Returns a reference to the value for `key`.
    #[inline]
    pub fn get(&self, key: &TypeId) -> Option<&V> {
        self.0.get(key)
    }

    /// Returns a mutable reference to the value for `key`.
    #[inline]
    pub fn get_mut(&mut self, key: &TypeId) -> Option<&mut V> {
        self.0.get_mut(key)
    }

    /// Inserts a value, returning the previous one if present.
    #[inline]
    pub fn insert(&mut self, key: TypeId, value: V) -> Option<V> {
        self.0.insert(key, value)
    }

    /// Inserts the value produced by `make` only if `key` is vacant.
    ///
    /// Returns `true` if the value was inserted.
    pub fn try_insert(&mut self, key: TypeId, make: impl FnOnce() -> V) -> bool {
        match self.0.entry(key) {
            hashbrown::hash_map::Entry::Occupied(_) => false,
            hashbrown::hash_map::Entry::Vacant(entry) => {
                entry.insert(make());
                true
            }
        }
    }

    /// Iterates over the values.
    #[inline]
    pub fn values(&self) -> impl ExactSizeIterator<Item = &V> {
        self.0.values()
    }
}

impl<V> Default for TypeIdMap<V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use core::any::TypeId;

    use super::TypeIdMap;

    #[test]
    fn try_insert_is_first_writer_wins() {
        let mut map = TypeIdMap::new();
        assert!(map.try_insert(TypeId::of::<u8>(), || 1));
        assert!(!map.try_insert(TypeId::of::<u8>(), || 2));
        assert_eq!(map.get(&TypeId::of::<u8>()), Some(&1));
    }

    #[test]
    fn fixed_hash_is_stable() {
        use core::hash::{BuildHasher, Hash, Hasher};

        use super::FixedHashState;

        let hash = |value: u32| {
            let mut hasher = FixedHashState.build_hasher();
            value.hash(&mut hasher);
            hasher.finish()
        };
        assert_eq!(hash(7), hash(7));
        assert_ne!(hash(7), hash(8));
    }
}
