use thiserror::Error;

/// Errors raised by GF(2) matrix and vector operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Gf2Error {
    /// Operand shapes do not fit the requested operation.
    #[error("{op}: incompatible dimensions {left:?} and {right:?}")]
    DimensionMismatch {
        /// Name of the failing operation.
        op: &'static str,
        /// Shape of the left operand as `(rows, cols)`.
        left: (usize, usize),
        /// Shape of the right operand as `(rows, cols)`.
        right: (usize, usize),
    },

    /// A square matrix was required.
    #[error("matrix is not square ({rows}x{cols})")]
    NotSquare {
        /// Row count.
        rows: usize,
        /// Column count.
        cols: usize,
    },

    /// The matrix does not have full rank.
    #[error("matrix is rank deficient (rank {rank} < {dimension})")]
    RankDeficient {
        /// Rank found during elimination.
        rank: usize,
        /// Rank required for the operation.
        dimension: usize,
    },

    /// Deserialized storage does not match the declared dimensions.
    #[error("corrupt storage: {0}")]
    CorruptStorage(String),
}
