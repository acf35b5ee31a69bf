//! Fixed-size bit-vectors over states or choices
//!
//! [`BitVector`] is used throughout the workspace to represent sets of states
//! (e.g. visited states, target states) and sets of choices (e.g. the choices
//! that are legal in a family or the choices exercised by a policy).

use std::fmt::{self, Display};

use fixedbitset::FixedBitSet;

/// Boolean vector of a fixed length
///
/// The length is fixed at construction time. Reading an index outside of the
/// vector returns `false`, setting an index outside of the vector panics.
///
/// # Example
///
/// ```
/// use qsynth_model::bitvector::BitVector;
///
/// let mut bv = BitVector::new(4, false);
/// bv.set(1, true);
/// bv.set(3, true);
///
/// assert!(bv.get(1));
/// assert!(!bv.get(2));
/// assert_eq!(bv.iter_ones().collect::<Vec<_>>(), vec![1, 3]);
/// assert_eq!(bv.to_string(), "{1, 3}");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BitVector {
    bits: FixedBitSet,
}

impl BitVector {
    /// Create a new bit-vector of length `len` with all bits set to `init`
    pub fn new(len: usize, init: bool) -> Self {
        let mut bits = FixedBitSet::with_capacity(len);
        if init {
            bits.insert_range(..);
        }
        Self { bits }
    }

    /// Create a bit-vector of length `len` in which exactly the given indices
    /// are set
    pub fn from_indices(len: usize, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut bv = Self::new(len, false);
        for i in indices {
            bv.set(i, true);
        }
        bv
    }

    /// Number of bits in the vector
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Check whether the vector has length 0
    pub fn is_empty(&self) -> bool {
        self.bits.len() == 0
    }

    /// Read the bit at `index`
    pub fn get(&self, index: usize) -> bool {
        self.bits.contains(index)
    }

    /// Set the bit at `index` to `value`
    ///
    /// Panics if `index` is out of bounds.
    pub fn set(&mut self, index: usize, value: bool) {
        self.bits.set(index, value);
    }

    /// Iterate over the indices of all set bits in ascending order
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.ones()
    }

    /// Number of set bits
    pub fn count_ones(&self) -> usize {
        self.bits.count_ones(..)
    }

    /// Check whether no bit is set
    pub fn is_all_zero(&self) -> bool {
        self.bits.is_clear()
    }
}

impl Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ones = self
            .iter_ones()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{{{ones}}}")
    }
}

#[cfg(test)]
mod tests {
    use super::BitVector;

    #[test]
    fn test_new_all_set() {
        let bv = BitVector::new(5, true);
        assert_eq!(bv.len(), 5);
        assert_eq!(bv.count_ones(), 5);
        assert!((0..5).all(|i| bv.get(i)));
        assert!(!bv.get(5));
    }

    #[test]
    fn test_new_all_clear() {
        let bv = BitVector::new(3, false);
        assert!(bv.is_all_zero());
        assert!(!bv.is_empty());
        assert_eq!(bv.to_string(), "{}");
    }

    #[test]
    #[should_panic]
    fn test_set_out_of_bounds_panics() {
        let mut bv = BitVector::new(2, false);
        bv.set(2, true);
    }
}
