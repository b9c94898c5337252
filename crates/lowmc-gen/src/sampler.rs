//! Rejection sampling of full-rank matrices and constants from a single bit source.

use gf2_core::{BitMatrix, BitVector};
use tracing::{debug, info, info_span};

use crate::bitstream::{BitSource, BitStream};
use crate::error::GenError;
use crate::instance::Instance;
use crate::params::InstanceParams;

/// Configuration for the sampler.
#[derive(Clone, Copy, Debug)]
pub struct SamplerConfig {
    /// Upper bound on candidates drawn for a single full-rank matrix.
    pub max_attempts: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self { max_attempts: 1024 }
    }
}

/// Instance sampler parametrized by a bit source.
///
/// Every structure drawn by one sampler consumes the same continuous bit
/// sequence, so the order of calls determines the result.
pub struct InstanceSampler<S: BitSource> {
    source: S,
    config: SamplerConfig,
}

impl InstanceSampler<BitStream> {
    /// Sampler over a fresh reference [`BitStream`].
    pub fn reference() -> Self {
        Self::new(BitStream::new())
    }
}

impl<S: BitSource> InstanceSampler<S> {
    /// Creates a sampler with default configuration.
    pub fn new(source: S) -> Self {
        Self {
            source,
            config: SamplerConfig::default(),
        }
    }

    /// Creates a sampler with explicit configuration.
    pub fn with_config(source: S, config: SamplerConfig) -> Self {
        Self { source, config }
    }

    /// Returns a mutable reference to the configuration.
    pub fn config_mut(&mut self) -> &mut SamplerConfig {
        &mut self.config
    }

    /// Consumes the sampler, returning the bit source at its current position.
    pub fn into_source(self) -> S {
        self.source
    }

    /// Draws `len` bits as a vector, without any check.
    pub fn sample_vector(&mut self, len: usize) -> BitVector {
        (0..len).map(|_| self.source.next_bit()).collect()
    }

    /// Draws `rows × cols` matrices row-major until one has rank `min(rows, cols)`.
    ///
    /// Rejected candidates are discarded; the next candidate continues from the
    /// same position of the bit source.
    pub fn sample_full_rank_matrix(
        &mut self,
        rows: usize,
        cols: usize,
    ) -> Result<BitMatrix, GenError> {
        let target = rows.min(cols);
        for attempt in 1..=self.config.max_attempts {
            let source = &mut self.source;
            let candidate = BitMatrix::from_fn(rows, cols, |_, _| source.next_bit());
            let rank = candidate.rank();
            if rank >= target {
                return Ok(candidate);
            }
            debug!(rows, cols, rank, attempt, "rejected rank-deficient candidate");
        }
        Err(GenError::SamplingExhausted {
            rows,
            cols,
            attempts: self.config.max_attempts,
        })
    }

    /// Samples a complete instance.
    ///
    /// Draw order: `rounds` linear layers (`n × n`), then `rounds` constants
    /// (`n` bits), then `rounds + 1` round-key matrices (`n × k`).
    pub fn sample_instance(&mut self, params: InstanceParams) -> Result<Instance, GenError> {
        let span = info_span!("sample_instance", %params);
        let _guard = span.enter();

        let InstanceParams {
            block_size: n,
            key_size: k,
            rounds,
        } = params;
        if n == 0 || k == 0 {
            return Err(GenError::UnsupportedConfiguration(format!(
                "block and key size must be positive, got {params}"
            )));
        }

        let linear_layers = (0..rounds)
            .map(|_| self.sample_full_rank_matrix(n, n))
            .collect::<Result<Vec<_>, _>>()?;
        let round_constants = (0..rounds).map(|_| self.sample_vector(n)).collect();
        let round_key_matrices = (0..=rounds)
            .map(|_| self.sample_full_rank_matrix(n, k))
            .collect::<Result<Vec<_>, _>>()?;

        let instance = Instance::new(params, linear_layers, round_key_matrices, round_constants)?;
        info!("sampled instance");
        Ok(instance)
    }
}

/// Samples the reference instance for `params` from a fresh [`BitStream`].
pub fn sample_reference_instance(params: InstanceParams) -> Result<Instance, GenError> {
    InstanceSampler::reference().sample_instance(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Emits `zero_bits` zeros, then alternates so that each row of an
    /// 8-bit-wide matrix is a distinct unit vector.
    struct ScriptedSource {
        zero_bits: usize,
        emitted: usize,
        width: usize,
    }

    impl BitSource for ScriptedSource {
        fn next_bit(&mut self) -> bool {
            let pos = self.emitted;
            self.emitted += 1;
            if pos < self.zero_bits {
                return false;
            }
            let cell = pos - self.zero_bits;
            let (row, col) = (cell / self.width, cell % self.width);
            row % self.width == col
        }
    }

    struct ZeroSource;

    impl BitSource for ZeroSource {
        fn next_bit(&mut self) -> bool {
            false
        }
    }

    #[test]
    fn rejection_skips_zero_matrices_on_the_same_stream() {
        let source = ScriptedSource {
            zero_bits: 3 * 64,
            emitted: 0,
            width: 8,
        };
        let mut sampler = InstanceSampler::new(source);
        let m = sampler.sample_full_rank_matrix(8, 8).unwrap();
        assert_eq!(m, BitMatrix::identity(8));
        // three rejected 8x8 candidates plus the accepted one
        assert_eq!(sampler.into_source().emitted, 4 * 64);
    }

    #[test]
    fn all_zero_source_exhausts_attempts() {
        let mut sampler = InstanceSampler::with_config(ZeroSource, SamplerConfig { max_attempts: 5 });
        let err = sampler.sample_full_rank_matrix(4, 6).unwrap_err();
        assert!(matches!(
            err,
            GenError::SamplingExhausted {
                rows: 4,
                cols: 6,
                attempts: 5
            }
        ));
    }

    #[test]
    fn sampled_matrices_have_full_rank() {
        let mut sampler = InstanceSampler::reference();
        for (rows, cols) in [(16, 16), (10, 24), (24, 10)] {
            let m = sampler.sample_full_rank_matrix(rows, cols).unwrap();
            assert_eq!(m.shape(), (rows, cols));
            assert_eq!(m.rank(), rows.min(cols));
        }
    }

    #[test]
    fn instance_draw_order_is_layers_constants_keys() {
        let params = InstanceParams::new(16, 16, 2);
        let instance = sample_reference_instance(params).unwrap();

        let mut manual = InstanceSampler::reference();
        let l0 = manual.sample_full_rank_matrix(16, 16).unwrap();
        let l1 = manual.sample_full_rank_matrix(16, 16).unwrap();
        let c0 = manual.sample_vector(16);
        let c1 = manual.sample_vector(16);
        let k0 = manual.sample_full_rank_matrix(16, 16).unwrap();

        assert_eq!(instance.linear_layers(), &[l0, l1]);
        assert_eq!(instance.round_constants(), &[c0, c1]);
        assert_eq!(instance.round_key_matrices()[0], k0);
        assert_eq!(instance.round_key_matrices().len(), 3);
        instance.validate().unwrap();
    }

    #[test]
    fn zero_sized_configuration_is_rejected() {
        let err = sample_reference_instance(InstanceParams::new(0, 8, 1)).unwrap_err();
        assert!(matches!(err, GenError::UnsupportedConfiguration(_)));
    }
}
