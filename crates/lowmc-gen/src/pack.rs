//! Word-packed matrix layout consumed by the bit-sliced engine.
//!
//! Each row is cut into runs of `width` bits; run `t` becomes the word
//! `Σ bit[t·width + j] · 2^j`, so column `t·width` is the least significant
//! bit. Rows are padded with zero words up to a stride that keeps every row
//! 16-byte aligned, or 32-byte aligned once a row is wider than 128 bits.

use gf2_core::{BitMatrix, BitVector, WORD_BITS};
use serde::{Deserialize, Serialize};

use crate::error::GenError;

/// Rows wider than this many bits use the 32-byte alignment.
pub const WIDE_ROW_BITS: usize = 128;

/// Word size of the packed layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WordWidth {
    /// `uint8_t` words.
    W8,
    /// `uint16_t` words.
    W16,
    /// `uint32_t` words.
    W32,
    /// `uint64_t` words.
    #[default]
    W64,
}

impl WordWidth {
    /// Bits per word.
    pub const fn bits(self) -> usize {
        match self {
            Self::W8 => 8,
            Self::W16 => 16,
            Self::W32 => 32,
            Self::W64 => 64,
        }
    }

    /// Bytes per word.
    pub const fn bytes(self) -> usize {
        self.bits() / 8
    }

    /// Parses a bit count.
    pub fn from_bits(bits: usize) -> Option<Self> {
        match bits {
            8 => Some(Self::W8),
            16 => Some(Self::W16),
            32 => Some(Self::W32),
            64 => Some(Self::W64),
            _ => None,
        }
    }

    const fn mask(self) -> u64 {
        match self {
            Self::W64 => u64::MAX,
            other => (1u64 << other.bits()) - 1,
        }
    }
}

/// `ceil(cols / width)`.
pub fn words_per_row(cols: usize, width: WordWidth) -> usize {
    cols.div_ceil(width.bits())
}

/// Row stride in words for rows of `words_per_row` used words.
pub fn row_stride(words_per_row: usize, width: WordWidth) -> usize {
    let bytes = words_per_row * width.bytes();
    let align = if words_per_row > WIDE_ROW_BITS / width.bits() {
        32
    } else {
        16
    };
    bytes.next_multiple_of(align) / width.bytes()
}

/// Packed, padded, row-major form of a GF(2) matrix or vector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPackedMatrix")]
pub struct PackedMatrix {
    rows: usize,
    cols: usize,
    width: WordWidth,
    words_per_row: usize,
    row_stride: usize,
    data: Vec<u64>,
}

#[derive(Deserialize)]
struct RawPackedMatrix {
    rows: usize,
    cols: usize,
    width: WordWidth,
    words_per_row: usize,
    row_stride: usize,
    data: Vec<u64>,
}

impl TryFrom<RawPackedMatrix> for PackedMatrix {
    type Error = GenError;

    fn try_from(raw: RawPackedMatrix) -> Result<Self, Self::Error> {
        let corrupt = |detail: String| {
            GenError::MalformedArtifact(format!(
                "packed {}x{} matrix: {detail}",
                raw.rows, raw.cols
            ))
        };
        let wpr = words_per_row(raw.cols, raw.width);
        if raw.words_per_row != wpr || raw.row_stride != row_stride(wpr, raw.width) {
            return Err(corrupt(format!(
                "layout {}/{} does not match {}-bit words",
                raw.words_per_row,
                raw.row_stride,
                raw.width.bits()
            )));
        }
        if raw.rows.checked_mul(raw.row_stride) != Some(raw.data.len()) {
            return Err(corrupt(format!("{} words stored", raw.data.len())));
        }
        let mask = raw.width.mask();
        let tail_bits = raw.cols % raw.width.bits();
        let last_mask = if tail_bits == 0 {
            mask
        } else {
            (1u64 << tail_bits) - 1
        };
        let bad_row = raw.data.chunks(raw.row_stride.max(1)).any(|row| {
            row.iter().enumerate().any(|(t, &word)| {
                let allowed = match t + 1 {
                    n if n < wpr => mask,
                    n if n == wpr => last_mask,
                    _ => 0,
                };
                word & !allowed != 0
            })
        });
        if bad_row {
            return Err(corrupt("bits set outside the used columns".to_owned()));
        }
        Ok(Self {
            rows: raw.rows,
            cols: raw.cols,
            width: raw.width,
            words_per_row: raw.words_per_row,
            row_stride: raw.row_stride,
            data: raw.data,
        })
    }
}

impl PackedMatrix {
    /// Packs `matrix` as is.
    pub fn encode(matrix: &BitMatrix, width: WordWidth) -> Self {
        let (rows, cols) = matrix.shape();
        let wpr = words_per_row(cols, width);
        let stride = row_stride(wpr, width);
        let mut data = vec![0u64; rows * stride];
        for row in 0..rows {
            let src = matrix.row_words(row);
            for (t, slot) in data[row * stride..row * stride + wpr].iter_mut().enumerate() {
                *slot = extract_run(src, t, width);
            }
        }
        Self {
            rows,
            cols,
            width,
            words_per_row: wpr,
            row_stride: stride,
            data,
        }
    }

    /// Packs the transpose of `matrix`, for engines that multiply from the right.
    pub fn encode_transposed(matrix: &BitMatrix, width: WordWidth) -> Self {
        Self::encode(&matrix.transpose(), width)
    }

    /// Packs a vector as a single row.
    pub fn encode_vector(vector: &BitVector, width: WordWidth) -> Self {
        let wpr = words_per_row(vector.len(), width);
        let stride = row_stride(wpr, width);
        let mut data = vec![0u64; stride];
        for (t, slot) in data[..wpr].iter_mut().enumerate() {
            *slot = extract_run(vector.words(), t, width);
        }
        Self {
            rows: 1,
            cols: vector.len(),
            width,
            words_per_row: wpr,
            row_stride: stride,
            data,
        }
    }

    /// Row count.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Column count in bits.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Word size.
    pub fn width(&self) -> WordWidth {
        self.width
    }

    /// Words carrying data in each row.
    pub fn words_per_row(&self) -> usize {
        self.words_per_row
    }

    /// Words per row including alignment padding.
    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    /// All words, row-major, `rows × row_stride` of them.
    pub fn data(&self) -> &[u64] {
        &self.data
    }

    /// Words of row `row`, padding included.
    pub fn row(&self, row: usize) -> &[u64] {
        &self.data[row * self.row_stride..(row + 1) * self.row_stride]
    }

    /// Unpacks into a matrix.
    pub fn decode(&self) -> BitMatrix {
        let w = self.width.bits();
        BitMatrix::from_fn(self.rows, self.cols, |row, col| {
            (self.data[row * self.row_stride + col / w] >> (col % w)) & 1 == 1
        })
    }

    /// Memory image: every word little-endian, `width / 8` bytes each.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let size = self.width.bytes();
        self.data
            .iter()
            .flat_map(|word| word.to_le_bytes().into_iter().take(size))
            .collect()
    }
}

fn extract_run(src: &[u64], run: usize, width: WordWidth) -> u64 {
    let bit = run * width.bits();
    (src[bit / WORD_BITS] >> (bit % WORD_BITS)) & width.mask()
}
