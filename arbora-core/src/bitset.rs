//! Fixed-width bitsets identifying clades by leaf membership.
//!
//! A [`TaxonBits`] holds one bit per taxon, stored little-endian across
//! 32-bit words: bit `i` lives in word `i / 32` at position `i % 32`. Two
//! bitsets are only comparable or combinable when they share a width; the
//! CCD guarantees this by minting every bitset from one taxon index.
//!
//! The canonical key — set-bit indices ascending, comma-joined — round-trips
//! through [`TaxonBits::from_key`] and is what external surfaces print.
//! Internally the type hashes over its word array, so it can key a map
//! directly.

use crate::error::{ArboraError, Result};

const WORD_BITS: usize = 32;

/// A fixed-width bit vector over the taxon range `[0, len)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaxonBits {
    words: Vec<u32>,
    len: usize,
}

impl TaxonBits {
    /// Creates an all-zero bitset of width `len`.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD_BITS)],
            len,
        }
    }

    /// Creates a bitset of width `len` with the single bit `index` set.
    #[must_use]
    pub fn singleton(len: usize, index: usize) -> Self {
        let mut bits = Self::new(len);
        bits.set(index);
        bits
    }

    /// Creates an all-ones bitset of width `len`.
    #[must_use]
    pub fn full(len: usize) -> Self {
        let mut bits = Self::new(len);
        bits.set_range(0, len);
        bits
    }

    /// Returns the width in bits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&word| word == 0)
    }

    /// Returns whether every bit in `[0, len)` is set.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.cardinality() == self.len
    }

    /// Sets bit `index`.
    ///
    /// # Panics
    /// Panics if `index >= len`.
    pub fn set(&mut self, index: usize) {
        assert!(index < self.len, "bit {index} out of range 0..{}", self.len);
        self.words[index / WORD_BITS] |= 1 << (index % WORD_BITS);
    }

    /// Clears bit `index`.
    ///
    /// # Panics
    /// Panics if `index >= len`.
    pub fn clear(&mut self, index: usize) {
        assert!(index < self.len, "bit {index} out of range 0..{}", self.len);
        self.words[index / WORD_BITS] &= !(1 << (index % WORD_BITS));
    }

    /// Reads bit `index`; bits at or beyond the width read as zero.
    #[must_use]
    pub fn get(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        self.words[index / WORD_BITS] & (1 << (index % WORD_BITS)) != 0
    }

    /// Sets every bit in `[lo, hi)`.
    ///
    /// # Panics
    /// Panics if `hi > len` or `lo > hi`.
    pub fn set_range(&mut self, lo: usize, hi: usize) {
        assert!(lo <= hi && hi <= self.len, "range {lo}..{hi} out of bounds");
        for index in lo..hi {
            self.words[index / WORD_BITS] |= 1 << (index % WORD_BITS);
        }
    }

    /// In-place union with `other`.
    pub fn or(&mut self, other: &Self) {
        debug_assert_eq!(self.len, other.len, "bitset widths must match");
        for (word, &rhs) in self.words.iter_mut().zip(&other.words) {
            *word |= rhs;
        }
    }

    /// In-place intersection with `other`.
    pub fn and(&mut self, other: &Self) {
        debug_assert_eq!(self.len, other.len, "bitset widths must match");
        for (word, &rhs) in self.words.iter_mut().zip(&other.words) {
            *word &= rhs;
        }
    }

    /// In-place symmetric difference with `other`.
    pub fn xor(&mut self, other: &Self) {
        debug_assert_eq!(self.len, other.len, "bitset widths must match");
        for (word, &rhs) in self.words.iter_mut().zip(&other.words) {
            *word ^= rhs;
        }
    }

    /// Returns the union of two bitsets as a new value.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.or(other);
        out
    }

    /// Returns whether the two bitsets share no set bit.
    #[must_use]
    pub fn is_disjoint(&self, other: &Self) -> bool {
        debug_assert_eq!(self.len, other.len, "bitset widths must match");
        self.words
            .iter()
            .zip(&other.words)
            .all(|(&lhs, &rhs)| lhs & rhs == 0)
    }

    /// Counts the set bits.
    #[must_use]
    pub fn cardinality(&self) -> usize {
        self.words
            .iter()
            .map(|word| word.count_ones() as usize)
            .sum()
    }

    /// Returns the index of the first set bit at or after `from`.
    #[must_use]
    pub fn next_set_bit(&self, from: usize) -> Option<usize> {
        if from >= self.len {
            return None;
        }
        let mut word_index = from / WORD_BITS;
        // Mask off bits below `from` in the first word, then skip zero words.
        let mut word = self.words[word_index] & (u32::MAX << (from % WORD_BITS));
        loop {
            if word != 0 {
                let bit = word_index * WORD_BITS + word.trailing_zeros() as usize;
                return (bit < self.len).then_some(bit);
            }
            word_index += 1;
            if word_index >= self.words.len() {
                return None;
            }
            word = self.words[word_index];
        }
    }

    /// Iterates over the set bits in ascending order.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        let mut cursor = 0;
        std::iter::from_fn(move || {
            let bit = self.next_set_bit(cursor)?;
            cursor = bit + 1;
            Some(bit)
        })
    }

    /// Renders the canonical key: set-bit indices ascending, comma-joined.
    #[must_use]
    pub fn key(&self) -> String {
        let mut out = String::new();
        for bit in self.ones() {
            if !out.is_empty() {
                out.push(',');
            }
            out.push_str(&bit.to_string());
        }
        out
    }

    /// Reconstructs a bitset of width `len` from its canonical key.
    ///
    /// # Errors
    /// Returns [`ArboraError::ParseFailure`] when the key contains a
    /// non-numeric field or an index at or beyond `len`.
    pub fn from_key(key: &str, len: usize) -> Result<Self> {
        let mut bits = Self::new(len);
        if key.is_empty() {
            return Ok(bits);
        }
        for field in key.split(',') {
            let index: usize = field.trim().parse().map_err(|_| ArboraError::ParseFailure {
                format: "bitset key".into(),
                message: format!("`{field}` is not a bit index"),
            })?;
            if index >= len {
                return Err(ArboraError::ParseFailure {
                    format: "bitset key".into(),
                    message: format!("bit index {index} exceeds width {len}"),
                });
            }
            bits.set(index);
        }
        Ok(bits)
    }
}
