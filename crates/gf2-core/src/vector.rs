//! Fixed-length GF(2) vectors.

use core::ops::Range;

use serde::{Deserialize, Serialize};

use crate::{tail_mask, words_for, Gf2Error, WORD_BITS};

/// Vector over GF(2) with `len` bits packed little-endian into `u64` words.
///
/// Bits beyond `len` in the last word are always zero, so equality compares
/// only the meaningful bits.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBitVector")]
pub struct BitVector {
    len: usize,
    words: Vec<u64>,
}

#[derive(Deserialize)]
struct RawBitVector {
    len: usize,
    words: Vec<u64>,
}

impl TryFrom<RawBitVector> for BitVector {
    type Error = Gf2Error;

    fn try_from(raw: RawBitVector) -> Result<Self, Self::Error> {
        let expected = words_for(raw.len);
        if raw.words.len() != expected {
            return Err(Gf2Error::CorruptStorage(format!(
                "{}-bit vector needs {expected} words, found {}",
                raw.len,
                raw.words.len()
            )));
        }
        if raw.words.last().is_some_and(|&w| w & !tail_mask(raw.len) != 0) {
            return Err(Gf2Error::CorruptStorage(format!(
                "{}-bit vector has bits set past its end",
                raw.len
            )));
        }
        Ok(Self {
            len: raw.len,
            words: raw.words,
        })
    }
}

impl BitVector {
    /// Returns the all-zero vector of length `len`.
    pub fn zeros(len: usize) -> Self {
        Self {
            len,
            words: vec![0u64; words_for(len)],
        }
    }

    /// Builds a vector from its bits, index 0 first.
    pub fn from_bits<I: IntoIterator<Item = bool>>(bits: I) -> Self {
        let mut words = Vec::new();
        let mut len = 0usize;
        for bit in bits {
            if len % WORD_BITS == 0 {
                words.push(0u64);
            }
            if bit {
                words[len / WORD_BITS] |= 1u64 << (len % WORD_BITS);
            }
            len += 1;
        }
        Self { len, words }
    }

    /// Builds a vector of length `len` from packed words, discarding bits past `len`.
    pub fn from_words(len: usize, words: &[u64]) -> Self {
        let mut out = Self::zeros(len);
        for (dst, src) in out.words.iter_mut().zip(words) {
            *dst = *src;
        }
        out.mask_tail();
        out
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true for the zero-length vector.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Packed backing words.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Reads bit `index`.
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.len, "bit index {index} out of range");
        (self.words[index / WORD_BITS] >> (index % WORD_BITS)) & 1 == 1
    }

    /// Writes bit `index`.
    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < self.len, "bit index {index} out of range");
        let mask = 1u64 << (index % WORD_BITS);
        if value {
            self.words[index / WORD_BITS] |= mask;
        } else {
            self.words[index / WORD_BITS] &= !mask;
        }
    }

    /// Iterates over the bits, index 0 first.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns true if no bit is set.
    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Adds `other` into `self`.
    pub fn xor_assign(&mut self, other: &Self) -> Result<(), Gf2Error> {
        if self.len != other.len {
            return Err(Gf2Error::DimensionMismatch {
                op: "vector add",
                left: (1, self.len),
                right: (1, other.len),
            });
        }
        for (d, s) in self.words.iter_mut().zip(&other.words) {
            *d ^= *s;
        }
        Ok(())
    }

    /// Inner product `<self, other>` over GF(2).
    pub fn dot(&self, other: &Self) -> Result<bool, Gf2Error> {
        if self.len != other.len {
            return Err(Gf2Error::DimensionMismatch {
                op: "dot",
                left: (1, self.len),
                right: (1, other.len),
            });
        }
        let parity = self
            .words
            .iter()
            .zip(&other.words)
            .fold(0u32, |acc, (a, b)| acc ^ (a & b).count_ones());
        Ok(parity & 1 == 1)
    }

    /// Returns the vector with its index order reversed (`i -> len - 1 - i`).
    pub fn reversed(&self) -> Self {
        Self::from_bits((0..self.len).rev().map(|i| self.get(i)))
    }

    /// Copies the bits in `range` into a new vector.
    pub fn slice(&self, range: Range<usize>) -> Self {
        assert!(range.end <= self.len, "slice {range:?} out of range");
        Self::from_bits(range.map(|i| self.get(i)))
    }

    /// Clears every bit in `range`.
    pub fn clear_range(&mut self, range: Range<usize>) {
        assert!(range.end <= self.len, "range {range:?} out of range");
        for i in range {
            self.set(i, false);
        }
    }

    /// Overwrites `self[offset..offset + src.len()]` with `src`.
    pub fn place(&mut self, offset: usize, src: &Self) -> Result<(), Gf2Error> {
        if offset + src.len > self.len {
            return Err(Gf2Error::DimensionMismatch {
                op: "vector place",
                left: (1, self.len),
                right: (1, offset + src.len),
            });
        }
        for (i, bit) in src.iter().enumerate() {
            self.set(offset + i, bit);
        }
        Ok(())
    }

    fn mask_tail(&mut self) {
        if let Some(last) = self.words.last_mut() {
            *last &= tail_mask(self.len);
        }
    }
}

impl FromIterator<bool> for BitVector {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self::from_bits(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Stored {
        len: usize,
        words: Vec<u64>,
    }

    fn load(len: usize, words: Vec<u64>) -> Result<BitVector, bincode::Error> {
        let bytes = bincode::serialize(&Stored { len, words }).unwrap();
        bincode::deserialize(&bytes)
    }

    #[test]
    fn deserialize_checks_word_count_and_tail() {
        let v = BitVector::from_bits((0..70).map(|i| i % 5 == 0));
        let bytes = bincode::serialize(&v).unwrap();
        assert_eq!(bincode::deserialize::<BitVector>(&bytes).unwrap(), v);

        let err = load(8, vec![]).unwrap_err();
        assert!(err.to_string().contains("8-bit vector needs 1 words, found 0"));
        assert!(load(8, vec![0, 0]).is_err());
        assert!(load(3, vec![0b1000]).is_err());
        assert_eq!(load(3, vec![0b101]).unwrap(), BitVector::from_bits([true, false, true]));
    }

    #[test]
    fn from_bits_packs_lsb_first() {
        let v = BitVector::from_bits([true, false, true, true]);
        assert_eq!(v.len(), 4);
        assert_eq!(v.words(), &[0b1101]);
    }

    #[test]
    fn from_words_masks_tail() {
        let v = BitVector::from_words(3, &[u64::MAX]);
        assert_eq!(v.words(), &[0b111]);
        assert_eq!(v, BitVector::from_bits([true; 3]));
    }

    #[test]
    fn reversed_mirrors_indices() {
        let v = BitVector::from_bits((0..70).map(|i| i % 3 == 0));
        let r = v.reversed();
        for i in 0..70 {
            assert_eq!(r.get(i), v.get(69 - i));
        }
        assert_eq!(r.reversed(), v);
    }

    #[test]
    fn slice_and_place_are_consistent() {
        let v = BitVector::from_bits((0..100).map(|i| i % 7 < 3));
        let part = v.slice(60..90);
        let mut w = BitVector::zeros(100);
        w.place(60, &part).unwrap();
        for i in 0..100 {
            let expected = (60..90).contains(&i) && v.get(i);
            assert_eq!(w.get(i), expected);
        }
        assert!(w.place(90, &part).is_err());
    }

    #[test]
    fn clear_range_and_xor() {
        let mut v = BitVector::from_bits([true; 10]);
        v.clear_range(2..5);
        assert_eq!(v.count_ones(), 7);
        let u = v.clone();
        v.xor_assign(&u).unwrap();
        assert!(v.is_zero());
        assert!(v.xor_assign(&BitVector::zeros(11)).is_err());
    }

    #[test]
    fn dot_is_parity_of_and() {
        let a = BitVector::from_bits([true, true, false, true]);
        let b = BitVector::from_bits([true, false, true, true]);
        assert!(!a.dot(&b).unwrap());
        let c = BitVector::from_bits([true, false, false, false]);
        assert!(a.dot(&c).unwrap());
    }
}
