//! Dense linear algebra over GF(2) used by the LowMC parameter generator.
//!
//! This crate provides the two value types the generator works with:
//! - [`BitVector`], a fixed-length vector of bits.
//! - [`BitMatrix`], a dense row-major binary matrix with rank, inversion,
//!   products and the index manipulations needed by the key-schedule reduction.
//!
//! Both types pack bits into 64-bit words, bit `j` of a row living in word
//! `j / 64` at position `j % 64`. Matrices are intentionally dense; the
//! dimensions involved are at most a few hundred bits.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod matrix;
mod vector;

pub use crate::error::Gf2Error;
pub use crate::matrix::BitMatrix;
pub use crate::vector::BitVector;

/// Number of bits stored per backing word.
pub const WORD_BITS: usize = 64;

#[inline]
pub(crate) const fn words_for(bits: usize) -> usize {
    bits.div_ceil(WORD_BITS)
}

#[inline]
pub(crate) const fn tail_mask(bits: usize) -> u64 {
    match bits % WORD_BITS {
        0 => u64::MAX,
        used => (1u64 << used) - 1,
    }
}
