//! Fixed-size bit sets used for component masks and entity sets.
//!
//! A [`Bitset`] is a thin domain wrapper over [`FixedBitSet`] with the exact
//! surface the rest of the crate needs: constant-time get/set, popcount,
//! ascending iteration of set indices, and the set-algebra operations the
//! query candidacy test is built from. The same type serves both roles in
//! the system: masks over the component-id space and membership sets over
//! the entity-id space.

use std::hash::{Hash, Hasher};

use fixedbitset::FixedBitSet;

/// A fixed-size set of bits.
///
/// The size is chosen at construction and never changes. Indices are `u32`
/// to match entity and component ids. Out-of-range indices are a caller
/// bug; bounds are the caller's responsibility on the hot paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitset {
    /// The packed bits.
    bits: FixedBitSet,

    /// Number of addressable bits.
    size: u32,
}

impl Bitset {
    /// Create a new set of `size` bits, all clear.
    pub fn new(size: u32) -> Self {
        Self {
            bits: FixedBitSet::with_capacity(size as usize),
            size,
        }
    }

    /// Create a set of `size` bits with the given indices set.
    pub fn from_ids(size: u32, ids: impl IntoIterator<Item = u32>) -> Self {
        let mut set = Self::new(size);
        for id in ids {
            set.insert(id);
        }
        set
    }

    /// Number of addressable bits.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Whether the bit at `index` is set.
    #[inline]
    pub fn get(&self, index: u32) -> bool {
        self.bits.contains(index as usize)
    }

    /// Set or clear the bit at `index`.
    #[inline]
    pub fn set(&mut self, index: u32, value: bool) -> &mut Self {
        self.bits.set(index as usize, value);
        self
    }

    /// Set the bit at `index`.
    #[inline]
    pub fn insert(&mut self, index: u32) {
        self.bits.insert(index as usize);
    }

    /// Clear the bit at `index`.
    #[inline]
    pub fn remove(&mut self, index: u32) {
        self.bits.set(index as usize, false);
    }

    /// Clear every bit.
    #[inline]
    pub fn clear(&mut self) {
        self.bits.clear();
    }

    /// Number of set bits.
    #[inline]
    pub fn count_ones(&self) -> u32 {
        self.bits.count_ones(..) as u32
    }

    /// Whether no bit is set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.is_clear()
    }

    /// Ascending iteration over the set indices.
    #[inline]
    pub fn ones(&self) -> impl Iterator<Item = u32> + '_ {
        self.bits.ones().map(|index| index as u32)
    }

    /// In-place union with another set of the same size.
    #[inline]
    pub fn union_with(&mut self, other: &Bitset) {
        self.bits.union_with(&other.bits);
    }

    /// In-place intersection with another set of the same size.
    #[inline]
    pub fn intersect_with(&mut self, other: &Bitset) {
        self.bits.intersect_with(&other.bits);
    }

    /// Whether every bit set here is also set in `other`.
    #[inline]
    pub fn is_subset(&self, other: &Bitset) -> bool {
        self.bits.is_subset(&other.bits)
    }

    /// Whether no bit is set in both this set and `other`.
    #[inline]
    pub fn is_disjoint(&self, other: &Bitset) -> bool {
        self.bits.is_disjoint(&other.bits)
    }
}

/// Hash by size and set indices so equal sets hash equally regardless of
/// the backing block layout. Lets masks key hash maps directly.
impl Hash for Bitset {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.size.hash(state);
        for index in self.bits.ones() {
            index.hash(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::Bitset;

    #[test]
    fn set_get_clear() {
        // Given
        let mut set = Bitset::new(64);

        // When
        set.insert(0);
        set.insert(33);
        set.set(63, true);

        // Then
        assert!(set.get(0));
        assert!(set.get(33));
        assert!(set.get(63));
        assert!(!set.get(1));
        assert_eq!(set.count_ones(), 3);

        // And When
        set.remove(33);
        assert!(!set.get(33));
        set.clear();

        // Then
        assert!(set.is_empty());
        assert_eq!(set.count_ones(), 0);
    }

    #[test]
    fn from_ids_sets_exactly_given_bits() {
        // Given
        let set = Bitset::from_ids(16, [3, 7, 11]);

        // Then
        assert_eq!(set.ones().collect::<Vec<_>>(), vec![3, 7, 11]);
    }

    #[test]
    fn ones_is_ascending() {
        // Given
        let set = Bitset::from_ids(128, [99, 2, 64, 31]);

        // Then
        assert_eq!(set.ones().collect::<Vec<_>>(), vec![2, 31, 64, 99]);
    }

    #[test]
    fn union_and_intersection() {
        // Given
        let mut a = Bitset::from_ids(32, [1, 2, 3]);
        let b = Bitset::from_ids(32, [3, 4]);

        // When
        a.union_with(&b);

        // Then
        assert_eq!(a.ones().collect::<Vec<_>>(), vec![1, 2, 3, 4]);

        // And When
        a.intersect_with(&Bitset::from_ids(32, [2, 3, 9]));

        // Then
        assert_eq!(a.ones().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn subset_and_disjoint() {
        // Given
        let small = Bitset::from_ids(32, [1, 2]);
        let large = Bitset::from_ids(32, [1, 2, 3]);
        let other = Bitset::from_ids(32, [8, 9]);

        // Then
        assert!(small.is_subset(&large));
        assert!(!large.is_subset(&small));
        assert!(small.is_disjoint(&other));
        assert!(!small.is_disjoint(&large));
    }

    #[test]
    fn equal_sets_key_a_map() {
        // Given
        let mut map = HashMap::new();
        map.insert(Bitset::from_ids(16, [1, 5]), "a");

        // Then
        assert_eq!(map.get(&Bitset::from_ids(16, [5, 1])), Some(&"a"));
        assert_eq!(map.get(&Bitset::from_ids(16, [1])), None);
    }

    #[test]
    fn clone_is_independent() {
        // Given
        let original = Bitset::from_ids(8, [0, 4]);

        // When
        let mut copy = original.clone();
        copy.insert(7);

        // Then
        assert!(!original.get(7));
        assert!(copy.get(7));
        assert_eq!(original.count_ones(), 2);
    }
}
