//! Raw LowMC instance: linear layers, round-key matrices and round constants.

use gf2_core::{BitMatrix, BitVector};
use serde::{Deserialize, Serialize};

use crate::error::GenError;
use crate::params::InstanceParams;

/// Complete sampled parameter set for one `(block_size, key_size, rounds)` configuration.
///
/// Instances are never modified after construction; transformations such as
/// [`Instance::oriented`] return new values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    params: InstanceParams,
    linear_layers: Vec<BitMatrix>,
    round_key_matrices: Vec<BitMatrix>,
    round_constants: Vec<BitVector>,
}

impl Instance {
    /// Assembles an instance, checking counts and shapes (not rank).
    pub fn new(
        params: InstanceParams,
        linear_layers: Vec<BitMatrix>,
        round_key_matrices: Vec<BitMatrix>,
        round_constants: Vec<BitVector>,
    ) -> Result<Self, GenError> {
        let instance = Self {
            params,
            linear_layers,
            round_key_matrices,
            round_constants,
        };
        instance.check_shapes()?;
        Ok(instance)
    }

    /// Dimensions of the instance.
    pub fn params(&self) -> InstanceParams {
        self.params
    }

    /// `rounds` linear layers, each `n × n`.
    pub fn linear_layers(&self) -> &[BitMatrix] {
        &self.linear_layers
    }

    /// `rounds + 1` round-key matrices, each `n × k`; index 0 is applied before round 1.
    pub fn round_key_matrices(&self) -> &[BitMatrix] {
        &self.round_key_matrices
    }

    /// `rounds` round constants of `n` bits.
    pub fn round_constants(&self) -> &[BitVector] {
        &self.round_constants
    }

    /// Checks shapes and that every matrix has full rank.
    pub fn validate(&self) -> Result<(), GenError> {
        self.check_shapes()?;
        let named = self
            .linear_layers
            .iter()
            .enumerate()
            .map(|(i, m)| (format!("linear layer {i}"), m))
            .chain(
                self.round_key_matrices
                    .iter()
                    .enumerate()
                    .map(|(i, m)| (format!("round key matrix {i}"), m)),
            );
        for (name, matrix) in named {
            if !matrix.is_full_rank() {
                return Err(GenError::InvalidInstance(format!(
                    "{name} has rank {} < {}",
                    matrix.rank(),
                    matrix.rows().min(matrix.cols())
                )));
            }
        }
        Ok(())
    }

    /// Returns the instance re-indexed by the anti-diagonal permutation `P`.
    ///
    /// Matrices become `P·M·P` and constants `P·c`, i.e. bit `i` maps to bit
    /// `n - 1 - i`. This is the bit order of the consuming engine.
    pub fn oriented(&self) -> Self {
        Self {
            params: self.params,
            linear_layers: self.linear_layers.iter().map(BitMatrix::reversed).collect(),
            round_key_matrices: self
                .round_key_matrices
                .iter()
                .map(BitMatrix::reversed)
                .collect(),
            round_constants: self
                .round_constants
                .iter()
                .map(BitVector::reversed)
                .collect(),
        }
    }

    pub(crate) fn check_shapes(&self) -> Result<(), GenError> {
        let InstanceParams {
            block_size: n,
            key_size: k,
            rounds: r,
        } = self.params;

        expect_len("linear layers", self.linear_layers.len(), r)?;
        expect_len("round key matrices", self.round_key_matrices.len(), r + 1)?;
        expect_len("round constants", self.round_constants.len(), r)?;

        for (i, m) in self.linear_layers.iter().enumerate() {
            expect_shape(&format!("linear layer {i}"), m, (n, n))?;
        }
        for (i, m) in self.round_key_matrices.iter().enumerate() {
            expect_shape(&format!("round key matrix {i}"), m, (n, k))?;
        }
        for (i, c) in self.round_constants.iter().enumerate() {
            if c.len() != n {
                return Err(GenError::InvalidInstance(format!(
                    "round constant {i} has {} bits, expected {n}",
                    c.len()
                )));
            }
        }
        Ok(())
    }
}

fn expect_len(what: &str, found: usize, expected: usize) -> Result<(), GenError> {
    if found == expected {
        Ok(())
    } else {
        Err(GenError::InvalidInstance(format!(
            "{found} {what}, expected {expected}"
        )))
    }
}

fn expect_shape(what: &str, m: &BitMatrix, expected: (usize, usize)) -> Result<(), GenError> {
    if m.shape() == expected {
        Ok(())
    } else {
        Err(GenError::InvalidInstance(format!(
            "{what} is {:?}, expected {expected:?}",
            m.shape()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_instance(n: usize, rounds: usize) -> Instance {
        Instance::new(
            InstanceParams::new(n, n, rounds),
            vec![BitMatrix::identity(n); rounds],
            vec![BitMatrix::identity(n); rounds + 1],
            vec![BitVector::zeros(n); rounds],
        )
        .expect("well-formed")
    }

    #[test]
    fn new_rejects_wrong_counts() {
        let err = Instance::new(
            InstanceParams::new(8, 8, 2),
            vec![BitMatrix::identity(8); 2],
            vec![BitMatrix::identity(8); 2],
            vec![BitVector::zeros(8); 2],
        )
        .unwrap_err();
        assert!(err.to_string().contains("round key matrices"));
    }

    #[test]
    fn new_rejects_wrong_shapes() {
        let err = Instance::new(
            InstanceParams::new(8, 4, 1),
            vec![BitMatrix::identity(8)],
            vec![BitMatrix::zero(8, 4), BitMatrix::zero(4, 8)],
            vec![BitVector::zeros(8)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("round key matrix 1"));
    }

    #[test]
    fn validate_reports_rank_deficient_matrix() {
        let mut layers = vec![BitMatrix::identity(8); 2];
        layers[1].clear_rows(7..8);
        let instance = Instance::new(
            InstanceParams::new(8, 8, 2),
            layers,
            vec![BitMatrix::identity(8); 3],
            vec![BitVector::zeros(8); 2],
        )
        .unwrap();
        let err = instance.validate().unwrap_err();
        assert!(err.to_string().contains("linear layer 1 has rank 7 < 8"));
        assert!(identity_instance(8, 2).validate().is_ok());
    }

    #[test]
    fn oriented_is_an_involution() {
        let mut constants = vec![BitVector::zeros(8); 1];
        constants[0].set(0, true);
        let instance = Instance::new(
            InstanceParams::new(8, 8, 1),
            vec![BitMatrix::from_fn(8, 8, |r, c| r <= c)],
            vec![BitMatrix::identity(8); 2],
            constants,
        )
        .unwrap();
        let oriented = instance.oriented();
        assert!(oriented.round_constants()[0].get(7));
        assert!(oriented.linear_layers()[0].get(7, 0));
        assert!(!oriented.linear_layers()[0].get(0, 7));
        assert_eq!(oriented.oriented(), instance);
    }
}
