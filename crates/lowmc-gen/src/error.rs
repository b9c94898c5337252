//! Error type shared by the generator pipeline.

use std::io;

use gf2_core::Gf2Error;
use thiserror::Error;

use crate::params::InstanceParams;

/// Errors raised while sampling, reducing, packing or persisting parameters.
#[derive(Debug, Error)]
pub enum GenError {
    /// A persisted instance was generated for a different configuration.
    #[error("instance mismatch: expected {expected}, found {found}")]
    ConfigurationMismatch {
        /// Requested configuration.
        expected: InstanceParams,
        /// Configuration recorded in the snapshot.
        found: InstanceParams,
    },

    /// A matrix operation required full rank or compatible shapes.
    #[error("linear algebra failure: {0}")]
    RankDeficient(#[from] Gf2Error),

    /// The requested configuration is not supported by this code path.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// Rejection sampling did not find a full-rank matrix.
    #[error("no full-rank {rows}x{cols} matrix after {attempts} attempts")]
    SamplingExhausted {
        /// Requested row count.
        rows: usize,
        /// Requested column count.
        cols: usize,
        /// Attempts made before giving up.
        attempts: usize,
    },

    /// An instance violates its structural invariants.
    #[error("invalid instance: {0}")]
    InvalidInstance(String),

    /// A packed artifact is internally inconsistent.
    #[error("malformed artifact: {0}")]
    MalformedArtifact(String),

    /// Snapshot encoding or decoding failed.
    #[error("serialization failed: {0}")]
    Serialization(#[from] bincode::Error),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_names_both_configurations() {
        let err = GenError::ConfigurationMismatch {
            expected: InstanceParams::new(128, 128, 20),
            found: InstanceParams::new(256, 256, 38),
        };
        let s = err.to_string();
        assert!(s.contains("128/128/20"));
        assert!(s.contains("256/256/38"));
    }

    #[test]
    fn gf2_errors_convert() {
        let err: GenError = Gf2Error::NotSquare { rows: 2, cols: 3 }.into();
        assert!(matches!(err, GenError::RankDeficient(_)));
    }
}
