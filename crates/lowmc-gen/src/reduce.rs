//! Key-schedule reduction.
//!
//! The per-round key additions `K[i+1]·key` are pulled backwards through the
//! inverse linear layers. Only the `3·s` state bits feeding the S-boxes are
//! non-linear; everything that lands on the remaining bits can be added once,
//! before the first round. What is left per round is a `3·s`-bit contribution,
//! collected into a single compact matrix.
//!
//! All computations use the row-vector convention of the consuming engine:
//! the state is a row vector and round `i` maps `x ↦ x · Lᵀ[i]`.

use core::ops::Range;

use gf2_core::{BitMatrix, BitVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use crate::error::GenError;
use crate::instance::Instance;
use crate::params::InstanceParams;

/// Zero columns placed in front of every round block of the non-linear part.
pub const ROUND_BLOCK_PADDING: usize = 2;

/// Width of one round block in the non-linear part: `3·sbox_count + 2`.
///
/// `None` if the width does not fit in a `usize`.
pub const fn round_block_width(sbox_count: usize) -> Option<usize> {
    match sbox_count.checked_mul(3) {
        Some(bits) => bits.checked_add(ROUND_BLOCK_PADDING),
        None => None,
    }
}

/// State bits `3·sbox_count` fed through the S-boxes, if they fit a `block_size`-bit state.
pub(crate) fn sbox_bits(sbox_count: usize, block_size: usize) -> Result<usize, GenError> {
    sbox_count
        .checked_mul(3)
        .filter(|&bits| bits <= block_size)
        .ok_or_else(|| {
            GenError::UnsupportedConfiguration(format!(
                "{sbox_count} S-boxes do not fit a {block_size}-bit state"
            ))
        })
}

/// Size-reduced key schedule derived from an [`Instance`] and an S-box count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReducedInstance {
    /// Dimensions of the source instance.
    pub params: InstanceParams,
    /// Number of 3-bit S-boxes per round.
    pub sbox_count: usize,
    /// `k × n` key matrix applied once before the first round.
    pub linear_part_key_matrix: BitMatrix,
    /// `k × (3s+2)·r` key matrix, one block of `3s + 2` columns per round.
    pub non_linear_part_key_matrix: BitMatrix,
    /// `n`-bit constant added once before the first round.
    pub linear_part_constant: BitVector,
    /// `(3s+2)·r`-bit constant, laid out like the non-linear key matrix.
    pub non_linear_part_constant: BitVector,
}

impl ReducedInstance {
    /// Columns of the non-linear part holding the S-box contribution of `round`.
    ///
    /// `None` past the last round.
    pub fn round_columns(&self, round: usize) -> Option<Range<usize>> {
        if round >= self.params.rounds {
            return None;
        }
        let width = round_block_width(self.sbox_count)?;
        let start = round.checked_mul(width)?.checked_add(ROUND_BLOCK_PADDING)?;
        Some(start..start.checked_add(width - ROUND_BLOCK_PADDING)?)
    }
}

/// Folds round keys and constants through the inverse linear layers.
#[derive(Clone, Copy, Debug)]
pub struct KeyScheduleReducer {
    sbox_count: usize,
}

impl KeyScheduleReducer {
    /// Reducer for `sbox_count` S-boxes acting on the top `3·sbox_count` state bits.
    pub fn new(sbox_count: usize) -> Self {
        Self { sbox_count }
    }

    /// Computes the reduced form of `instance`.
    ///
    /// Requires `block_size == key_size` and `3·sbox_count ≤ block_size`.
    pub fn reduce(&self, instance: &Instance) -> Result<ReducedInstance, GenError> {
        let params = instance.params();
        let InstanceParams {
            block_size: n,
            key_size: k,
            rounds,
        } = params;
        let s = self.sbox_count;
        if n != k {
            return Err(GenError::UnsupportedConfiguration(format!(
                "reduced key schedule needs block size == key size, got {params}"
            )));
        }
        let linear_bits = n - sbox_bits(s, n)?;
        let total_width = round_block_width(s)
            .and_then(|width| width.checked_mul(rounds).map(|total| (width, total)));
        let Some((width, total_width)) = total_width else {
            return Err(GenError::UnsupportedConfiguration(format!(
                "non-linear part for {s} S-boxes over {rounds} rounds is too wide"
            )));
        };

        let span = info_span!("reduce", %params, sbox_count = s);
        let _guard = span.enter();

        let key_t: Vec<BitMatrix> = instance
            .round_key_matrices()
            .iter()
            .map(BitMatrix::transpose)
            .collect();
        let inverses = instance
            .linear_layers()
            .iter()
            .map(|l| l.transpose().invert())
            .collect::<Result<Vec<_>, _>>()?;

        let mut folded_keys = Vec::with_capacity(rounds);
        let mut folded_constants = Vec::with_capacity(rounds);
        for (i, inverse) in inverses.iter().enumerate() {
            folded_keys.push(key_t[i + 1].mul(inverse)?);
            folded_constants.push(inverse.left_apply(&instance.round_constants()[i])?);
        }

        let masked: Vec<BitMatrix> = inverses
            .iter()
            .map(|inverse| {
                let mut m = inverse.clone();
                m.clear_rows(linear_bits..n);
                m
            })
            .collect();

        let mut non_linear_key = BitMatrix::zero(k, total_width);
        let mut non_linear_constant = BitVector::zeros(total_width);
        let mut linear_key = BitMatrix::zero(k, n);
        let mut linear_constant = BitVector::zeros(n);

        for round in 0..rounds {
            let mut acc = folded_keys[round].clone();
            let mut acc_constant = folded_constants[round].clone();

            for source in round + 1..rounds {
                let mut x = folded_keys[source].clone();
                let mut c = folded_constants[source].clone();
                for j in (round..source).rev() {
                    x = x.mul(&masked[j])?;
                    c = masked[j].left_apply(&c)?;
                }
                acc.xor_assign(&x)?;
                acc_constant.xor_assign(&c)?;
            }

            if s > 0 {
                let offset = round * width + ROUND_BLOCK_PADDING;
                non_linear_key.place_columns(offset, &acc.columns(linear_bits..n))?;
                non_linear_constant.place(offset, &acc_constant.slice(linear_bits..n))?;
            }

            if round == 0 {
                acc.clear_columns(linear_bits..n);
                acc_constant.clear_range(linear_bits..n);
                linear_key = acc;
                linear_constant = acc_constant;
            }
            debug!(round, "accumulated round contribution");
        }

        linear_key.xor_assign(&key_t[0])?;

        Ok(ReducedInstance {
            params,
            sbox_count: s,
            linear_part_key_matrix: linear_key,
            non_linear_part_key_matrix: non_linear_key,
            linear_part_constant: linear_constant,
            non_linear_part_constant: non_linear_constant,
        })
    }
}
