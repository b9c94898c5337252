//! Dense GF(2) matrices of arbitrary dimension.

use core::ops::Range;

use serde::{Deserialize, Serialize};

use crate::{tail_mask, words_for, BitVector, Gf2Error, WORD_BITS};

/// `rows × cols` binary matrix, stored row-major with `ceil(cols / 64)` words per row.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBitMatrix")]
pub struct BitMatrix {
    rows: usize,
    cols: usize,
    stride: usize,
    words: Vec<u64>,
}

#[derive(Deserialize)]
struct RawBitMatrix {
    rows: usize,
    cols: usize,
    stride: usize,
    words: Vec<u64>,
}

impl TryFrom<RawBitMatrix> for BitMatrix {
    type Error = Gf2Error;

    fn try_from(raw: RawBitMatrix) -> Result<Self, Self::Error> {
        let corrupt = |detail: String| {
            Gf2Error::CorruptStorage(format!("{}x{} matrix: {detail}", raw.rows, raw.cols))
        };
        if raw.stride != words_for(raw.cols) {
            return Err(corrupt(format!("row stride {} is wrong", raw.stride)));
        }
        if raw.rows.checked_mul(raw.stride) != Some(raw.words.len()) {
            return Err(corrupt(format!("{} words stored", raw.words.len())));
        }
        let tail = !tail_mask(raw.cols);
        if raw.stride > 0
            && raw
                .words
                .chunks(raw.stride)
                .any(|row| row[raw.stride - 1] & tail != 0)
        {
            return Err(corrupt("bits set past the last column".to_owned()));
        }
        Ok(Self {
            rows: raw.rows,
            cols: raw.cols,
            stride: raw.stride,
            words: raw.words,
        })
    }
}

impl BitMatrix {
    /// Returns the `rows × cols` zero matrix.
    pub fn zero(rows: usize, cols: usize) -> Self {
        let stride = words_for(cols);
        Self {
            rows,
            cols,
            stride,
            words: vec![0u64; rows * stride],
        }
    }

    /// Returns the `n × n` identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut mat = Self::zero(n, n);
        for i in 0..n {
            mat.set(i, i, true);
        }
        mat
    }

    /// Builds a matrix by evaluating `f(row, col)` for every cell, row-major.
    pub fn from_fn<F: FnMut(usize, usize) -> bool>(rows: usize, cols: usize, mut f: F) -> Self {
        let mut mat = Self::zero(rows, cols);
        for row in 0..rows {
            for col in 0..cols {
                if f(row, col) {
                    mat.set(row, col, true);
                }
            }
        }
        mat
    }

    /// Stacks equally long vectors as the rows of a matrix.
    pub fn from_row_vectors(rows: &[BitVector]) -> Result<Self, Gf2Error> {
        let cols = rows.first().map_or(0, BitVector::len);
        let mut mat = Self::zero(rows.len(), cols);
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(Gf2Error::DimensionMismatch {
                    op: "from_row_vectors",
                    left: (1, cols),
                    right: (1, row.len()),
                });
            }
            mat.row_words_mut(idx).copy_from_slice(row.words());
        }
        Ok(mat)
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Shape as `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Returns true if the matrix is square.
    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Reads the bit at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> bool {
        assert!(
            row < self.rows && col < self.cols,
            "cell ({row}, {col}) out of range"
        );
        (self.words[row * self.stride + col / WORD_BITS] >> (col % WORD_BITS)) & 1 == 1
    }

    /// Writes the bit at `(row, col)`.
    pub fn set(&mut self, row: usize, col: usize, value: bool) {
        assert!(
            row < self.rows && col < self.cols,
            "cell ({row}, {col}) out of range"
        );
        let word = &mut self.words[row * self.stride + col / WORD_BITS];
        let mask = 1u64 << (col % WORD_BITS);
        if value {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }

    /// Packed words of row `row` (little-endian bit order).
    pub fn row_words(&self, row: usize) -> &[u64] {
        let start = row * self.stride;
        &self.words[start..start + self.stride]
    }

    fn row_words_mut(&mut self, row: usize) -> &mut [u64] {
        let start = row * self.stride;
        &mut self.words[start..start + self.stride]
    }

    /// Copies row `row` into a vector.
    pub fn row(&self, row: usize) -> BitVector {
        BitVector::from_words(self.cols, self.row_words(row))
    }

    /// Copies column `col` into a vector.
    pub fn column(&self, col: usize) -> BitVector {
        (0..self.rows).map(|row| self.get(row, col)).collect()
    }

    fn row_is_set(&self, row: usize, col: usize) -> bool {
        (self.words[row * self.stride + col / WORD_BITS] >> (col % WORD_BITS)) & 1 == 1
    }

    /// Swaps rows `a` and `b`.
    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for w in 0..self.stride {
            self.words.swap(a * self.stride + w, b * self.stride + w);
        }
    }

    /// Adds row `src` into row `dst` (`row[dst] ^= row[src]`).
    pub fn xor_row_into(&mut self, src: usize, dst: usize) {
        for w in 0..self.stride {
            let value = self.words[src * self.stride + w];
            self.words[dst * self.stride + w] ^= value;
        }
    }

    /// Rank by forward elimination.
    ///
    /// Column `c` is processed in order; once `c` reaches the row count the rank is
    /// capped at `rows`, and a column without a pivot ends the scan with rank `c`.
    pub fn rank(&self) -> usize {
        let mut mat = self.clone();
        let n = mat.rows;
        for c in 0..mat.cols {
            if c >= n {
                return n;
            }
            let Some(pivot) = (c..n).find(|&r| mat.row_is_set(r, c)) else {
                return c;
            };
            mat.swap_rows(pivot, c);
            for r in c + 1..n {
                if mat.row_is_set(r, c) {
                    mat.xor_row_into(c, r);
                }
            }
        }
        mat.cols
    }

    /// Returns true if `rank() == min(rows, cols)`.
    pub fn is_full_rank(&self) -> bool {
        self.rank() >= self.rows.min(self.cols)
    }

    /// Inverts a square matrix by Gauss-Jordan elimination.
    pub fn invert(&self) -> Result<Self, Gf2Error> {
        if !self.is_square() {
            return Err(Gf2Error::NotSquare {
                rows: self.rows,
                cols: self.cols,
            });
        }
        let n = self.rows;
        let mut left = self.clone();
        let mut right = Self::identity(n);

        for col in 0..n {
            let Some(pivot) = (col..n).find(|&r| left.row_is_set(r, col)) else {
                return Err(Gf2Error::RankDeficient {
                    rank: self.rank(),
                    dimension: n,
                });
            };
            left.swap_rows(pivot, col);
            right.swap_rows(pivot, col);
            for row in 0..n {
                if row != col && left.row_is_set(row, col) {
                    left.xor_row_into(col, row);
                    right.xor_row_into(col, row);
                }
            }
        }

        Ok(right)
    }

    /// Multiplies two matrices (`self * rhs`).
    pub fn mul(&self, rhs: &Self) -> Result<Self, Gf2Error> {
        if self.cols != rhs.rows {
            return Err(Gf2Error::DimensionMismatch {
                op: "mul",
                left: self.shape(),
                right: rhs.shape(),
            });
        }
        let mut result = Self::zero(self.rows, rhs.cols);
        for row in 0..self.rows {
            for (segment_idx, segment) in self.row_words(row).iter().enumerate() {
                let mut bits = *segment;
                while bits != 0 {
                    let source_row = segment_idx * WORD_BITS + bits.trailing_zeros() as usize;
                    let start = source_row * rhs.stride;
                    let source = &rhs.words[start..start + rhs.stride];
                    for (acc, s) in result.row_words_mut(row).iter_mut().zip(source) {
                        *acc ^= *s;
                    }
                    bits &= bits - 1;
                }
            }
        }
        Ok(result)
    }

    /// Applies the matrix to a column vector (`self * v`).
    pub fn apply(&self, v: &BitVector) -> Result<BitVector, Gf2Error> {
        if v.len() != self.cols {
            return Err(Gf2Error::DimensionMismatch {
                op: "apply",
                left: self.shape(),
                right: (v.len(), 1),
            });
        }
        let mut out = BitVector::zeros(self.rows);
        for row in 0..self.rows {
            let parity = self
                .row_words(row)
                .iter()
                .zip(v.words())
                .fold(0u32, |acc, (a, b)| acc ^ (a & b).count_ones());
            if parity & 1 == 1 {
                out.set(row, true);
            }
        }
        Ok(out)
    }

    /// Multiplies a row vector from the left (`v * self`).
    pub fn left_apply(&self, v: &BitVector) -> Result<BitVector, Gf2Error> {
        if v.len() != self.rows {
            return Err(Gf2Error::DimensionMismatch {
                op: "left_apply",
                left: (1, v.len()),
                right: self.shape(),
            });
        }
        let mut acc = vec![0u64; self.stride];
        for (segment_idx, segment) in v.words().iter().enumerate() {
            let mut bits = *segment;
            while bits != 0 {
                let row = segment_idx * WORD_BITS + bits.trailing_zeros() as usize;
                for (a, s) in acc.iter_mut().zip(self.row_words(row)) {
                    *a ^= *s;
                }
                bits &= bits - 1;
            }
        }
        Ok(BitVector::from_words(self.cols, &acc))
    }

    /// Returns the transpose.
    pub fn transpose(&self) -> Self {
        Self::from_fn(self.cols, self.rows, |row, col| self.get(col, row))
    }

    /// Adds `other` into `self` entrywise.
    pub fn xor_assign(&mut self, other: &Self) -> Result<(), Gf2Error> {
        if self.shape() != other.shape() {
            return Err(Gf2Error::DimensionMismatch {
                op: "add",
                left: self.shape(),
                right: other.shape(),
            });
        }
        for (d, s) in self.words.iter_mut().zip(&other.words) {
            *d ^= *s;
        }
        Ok(())
    }

    /// Zeroes every row in `range`.
    pub fn clear_rows(&mut self, range: Range<usize>) {
        assert!(range.end <= self.rows, "row range {range:?} out of range");
        let (start, end) = (range.start * self.stride, range.end * self.stride);
        self.words[start..end].fill(0);
    }

    /// Zeroes every column in `range`.
    pub fn clear_columns(&mut self, range: Range<usize>) {
        assert!(range.end <= self.cols, "column range {range:?} out of range");
        for row in 0..self.rows {
            for col in range.clone() {
                self.set(row, col, false);
            }
        }
    }

    /// Copies the columns in `range` into a new `rows × range.len()` matrix.
    pub fn columns(&self, range: Range<usize>) -> Self {
        assert!(range.end <= self.cols, "column range {range:?} out of range");
        Self::from_fn(self.rows, range.len(), |row, col| {
            self.get(row, range.start + col)
        })
    }

    /// Overwrites the block of columns starting at `offset` with `src`.
    pub fn place_columns(&mut self, offset: usize, src: &Self) -> Result<(), Gf2Error> {
        if src.rows != self.rows || offset + src.cols > self.cols {
            return Err(Gf2Error::DimensionMismatch {
                op: "place_columns",
                left: self.shape(),
                right: (src.rows, offset + src.cols),
            });
        }
        for row in 0..src.rows {
            for col in 0..src.cols {
                self.set(row, offset + col, src.get(row, col));
            }
        }
        Ok(())
    }

    /// Conjugates with the anti-diagonal permutation: `out[i][j] = self[rows-1-i][cols-1-j]`.
    pub fn reversed(&self) -> Self {
        let (rows, cols) = self.shape();
        Self::from_fn(rows, cols, |row, col| {
            self.get(rows - 1 - row, cols - 1 - col)
        })
    }

    /// Returns true if every entry is zero.
    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    fn random_matrix(rng: &mut ChaCha20Rng, rows: usize, cols: usize) -> BitMatrix {
        BitMatrix::from_fn(rows, cols, |_, _| rng.gen::<bool>())
    }

    fn random_invertible(rng: &mut ChaCha20Rng, n: usize) -> BitMatrix {
        loop {
            let candidate = random_matrix(rng, n, n);
            if candidate.is_full_rank() {
                return candidate;
            }
        }
    }

    #[test]
    fn identity_has_full_rank() {
        for n in [1, 8, 63, 64, 65, 130] {
            assert_eq!(BitMatrix::identity(n).rank(), n);
        }
    }

    #[test]
    fn rank_of_zero_matrix_is_zero() {
        assert_eq!(BitMatrix::zero(5, 9).rank(), 0);
        assert_eq!(BitMatrix::zero(9, 5).rank(), 0);
    }

    #[test]
    fn rank_caps_at_row_count_for_wide_matrices() {
        // [I_3 | 1...1]: rank 3 even though there are more columns.
        let wide = BitMatrix::from_fn(3, 7, |r, c| r == c || c >= 3);
        assert_eq!(wide.rank(), 3);
    }

    #[test]
    fn rank_stops_at_first_missing_pivot() {
        let mut m = BitMatrix::identity(4);
        m.clear_columns(2..3);
        assert_eq!(m.rank(), 2);
    }

    #[test]
    fn inversion_roundtrip() {
        let mut rng = ChaCha20Rng::from_seed([1u8; 32]);
        for n in [1, 8, 64, 100, 128] {
            let m = random_invertible(&mut rng, n);
            let inv = m.invert().expect("invertible");
            assert_eq!(m.mul(&inv).unwrap(), BitMatrix::identity(n));
            assert_eq!(inv.mul(&m).unwrap(), BitMatrix::identity(n));
            assert_eq!(inv.invert().unwrap(), m);
        }
    }

    #[test]
    fn invert_rejects_singular_and_rectangular() {
        let mut m = BitMatrix::identity(6);
        m.clear_rows(3..4);
        assert_eq!(
            m.invert(),
            Err(Gf2Error::RankDeficient {
                rank: 3,
                dimension: 6
            })
        );
        assert!(matches!(
            BitMatrix::zero(3, 4).invert(),
            Err(Gf2Error::NotSquare { rows: 3, cols: 4 })
        ));
    }

    #[test]
    fn apply_inverse_recovers_input() {
        let mut rng = ChaCha20Rng::from_seed([2u8; 32]);
        let m = random_invertible(&mut rng, 96);
        let inv = m.invert().unwrap();
        let v: BitVector = (0..96).map(|_| rng.gen::<bool>()).collect();
        let out = m.apply(&v).unwrap();
        assert_eq!(inv.apply(&out).unwrap(), v);
    }

    #[test]
    fn left_apply_matches_transposed_apply() {
        let mut rng = ChaCha20Rng::from_seed([3u8; 32]);
        let m = random_matrix(&mut rng, 70, 130);
        let v: BitVector = (0..70).map(|_| rng.gen::<bool>()).collect();
        assert_eq!(
            m.left_apply(&v).unwrap(),
            m.transpose().apply(&v).unwrap()
        );
    }

    #[test]
    fn mul_matches_naive_definition() {
        let mut rng = ChaCha20Rng::from_seed([4u8; 32]);
        let a = random_matrix(&mut rng, 20, 70);
        let b = random_matrix(&mut rng, 70, 9);
        let prod = a.mul(&b).unwrap();
        for i in 0..20 {
            for j in 0..9 {
                let expected = (0..70).fold(false, |acc, t| acc ^ (a.get(i, t) & b.get(t, j)));
                assert_eq!(prod.get(i, j), expected);
            }
        }
        assert!(b.mul(&a).is_err());
    }

    #[test]
    fn transpose_of_product_reverses_order() {
        let mut rng = ChaCha20Rng::from_seed([5u8; 32]);
        let a = random_matrix(&mut rng, 12, 30);
        let b = random_matrix(&mut rng, 30, 17);
        let lhs = a.mul(&b).unwrap().transpose();
        let rhs = b.transpose().mul(&a.transpose()).unwrap();
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn column_blocks_roundtrip() {
        let mut rng = ChaCha20Rng::from_seed([6u8; 32]);
        let m = random_matrix(&mut rng, 10, 100);
        let block = m.columns(60..90);
        let mut target = BitMatrix::zero(10, 100);
        target.place_columns(60, &block).unwrap();
        let mut expected = m.clone();
        expected.clear_columns(0..60);
        expected.clear_columns(90..100);
        assert_eq!(target, expected);
        assert!(target.place_columns(80, &block).is_err());
    }

    #[test]
    fn reversed_is_anti_diagonal_conjugation() {
        let mut rng = ChaCha20Rng::from_seed([7u8; 32]);
        let m = random_matrix(&mut rng, 16, 16);
        let p = BitMatrix::from_fn(16, 16, |r, c| r + c == 15);
        let expected = p.mul(&m).unwrap().mul(&p).unwrap();
        assert_eq!(m.reversed(), expected);
    }

    #[test]
    fn from_row_vectors_rejects_ragged_rows() {
        let rows = vec![BitVector::zeros(4), BitVector::zeros(5)];
        assert!(BitMatrix::from_row_vectors(&rows).is_err());
        let rows = vec![BitVector::from_bits([true, false]), BitVector::from_bits([false, true])];
        assert_eq!(BitMatrix::from_row_vectors(&rows).unwrap(), BitMatrix::identity(2));
    }

    #[derive(serde::Serialize)]
    struct Stored {
        rows: usize,
        cols: usize,
        stride: usize,
        words: Vec<u64>,
    }

    fn load(rows: usize, cols: usize, stride: usize, words: Vec<u64>) -> bool {
        let bytes = bincode::serialize(&Stored {
            rows,
            cols,
            stride,
            words,
        })
        .unwrap();
        bincode::deserialize::<BitMatrix>(&bytes).is_ok()
    }

    #[test]
    fn deserialize_checks_storage_layout() {
        let mut rng = ChaCha20Rng::from_seed([8u8; 32]);
        let m = random_matrix(&mut rng, 5, 70);
        let bytes = bincode::serialize(&m).unwrap();
        assert_eq!(bincode::deserialize::<BitMatrix>(&bytes).unwrap(), m);

        assert!(load(2, 8, 1, vec![1, 2]));
        assert!(!load(2, 8, 1, vec![1]));
        assert!(!load(2, 8, 2, vec![1, 2, 3, 4]));
        assert!(!load(2, 8, 1, vec![1, 0x100]));
        assert!(!load(usize::MAX, 8, 1, vec![]));
        assert!(load(0, 0, 0, vec![]));
    }

    proptest! {
        #[test]
        fn prop_rank_bounded_by_min_dimension(
            rows in 1usize..24,
            cols in 1usize..24,
            seed in any::<u64>(),
        ) {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let m = random_matrix(&mut rng, rows, cols);
            prop_assert!(m.rank() <= rows.min(cols));
        }

        #[test]
        fn prop_rank_invariant_under_row_operations(
            n in 2usize..20,
            a in 0usize..20,
            b in 0usize..20,
            seed in any::<u64>(),
        ) {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let m = random_matrix(&mut rng, n, n + 3);
            let (a, b) = (a % n, b % n);
            let mut swapped = m.clone();
            swapped.swap_rows(a, b);
            prop_assert_eq!(swapped.rank(), m.rank());
            if a != b {
                let mut combined = m.clone();
                combined.xor_row_into(a, b);
                prop_assert_eq!(combined.rank(), m.rank());
            }
        }

        #[test]
        fn prop_double_inverse_is_identity(n in 1usize..40, seed in any::<u64>()) {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let m = random_invertible(&mut rng, n);
            let inv = m.invert().unwrap();
            prop_assert_eq!(inv.invert().unwrap(), m.clone());
            prop_assert_eq!(m.mul(&inv).unwrap(), BitMatrix::identity(n));
        }
    }
}
