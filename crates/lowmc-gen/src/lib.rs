//! Deterministic generation of LowMC cipher parameters.
//!
//! The pipeline is strictly sequential:
//! 1. [`BitStream`] yields the fixed self-shrinking-generator sequence.
//! 2. [`InstanceSampler`] turns it into full-rank linear layers, round
//!    constants and round-key matrices ([`Instance`]).
//! 3. [`KeyScheduleReducer`] folds the key schedule through the inverse
//!    linear layers ([`ReducedInstance`]).
//! 4. [`PackedMatrix`] encodes everything into the word layout of the
//!    bit-sliced engine, collected in a [`ParameterArtifact`].
//!
//! [`InstanceStore`] caches raw instances so sampling can be skipped.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod artifact;
mod bitstream;
pub mod csource;
mod error;
mod instance;
mod pack;
mod params;
mod reduce;
mod sampler;
pub mod store;

pub use artifact::{
    build_artifact, constant_name, generate_artifact, key_matrix_name, linear_layer_name,
    ArtifactConfig, Descriptor, PackedObject, ParameterArtifact, ReducedRefs, RoundEntry, RoundObjects,
    RoundTable, LINEAR_PART_CONSTANT, LINEAR_PART_KEY_MATRIX, NON_LINEAR_PART_CONSTANT,
    NON_LINEAR_PART_KEY_MATRIX,
};
pub use bitstream::{BitSource, BitStream};
pub use error::GenError;
pub use gf2_core::{BitMatrix, BitVector, Gf2Error};
pub use instance::Instance;
pub use pack::{row_stride, words_per_row, PackedMatrix, WordWidth, WIDE_ROW_BITS};
pub use params::InstanceParams;
pub use reduce::{round_block_width, KeyScheduleReducer, ReducedInstance, ROUND_BLOCK_PADDING};
pub use sampler::{sample_reference_instance, InstanceSampler, SamplerConfig};
pub use store::InstanceStore;
