//! Packed parameter artifact: every matrix and constant the engine links against,
//! a per-round lookup table and the top-level descriptor.

use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use crate::error::GenError;
use crate::instance::Instance;
use crate::pack::{PackedMatrix, WordWidth};
use crate::params::InstanceParams;
use crate::reduce::{sbox_bits, KeyScheduleReducer};
use crate::sampler::sample_reference_instance;

/// Symbol of the reduced linear-part key matrix.
pub const LINEAR_PART_KEY_MATRIX: &str = "precomputed_round_key_matrix_linear_part";
/// Symbol of the reduced non-linear-part key matrix.
pub const NON_LINEAR_PART_KEY_MATRIX: &str = "precomputed_round_key_matrix_non_linear_part";
/// Symbol of the reduced linear-part constant.
pub const LINEAR_PART_CONSTANT: &str = "precomputed_constant_linear_part";
/// Symbol of the reduced non-linear-part constant.
pub const NON_LINEAR_PART_CONSTANT: &str = "precomputed_constant_non_linear_part";

/// Symbol of linear layer `i`.
pub fn linear_layer_name(i: usize) -> String {
    format!("L_{i}")
}

/// Symbol of round-key matrix `i`.
pub fn key_matrix_name(i: usize) -> String {
    format!("K_{i}")
}

/// Symbol of round constant `i`.
pub fn constant_name(i: usize) -> String {
    format!("C_{i}")
}

/// Options controlling artifact construction.
#[derive(Clone, Copy, Debug)]
pub struct ArtifactConfig {
    /// Number of 3-bit S-boxes per round.
    pub sbox_count: usize,
    /// Word size of the packed layout.
    pub width: WordWidth,
    /// Whether to include the reduced key schedule.
    pub reduced: bool,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            sbox_count: InstanceParams::DEFAULT_SBOX_COUNT,
            width: WordWidth::default(),
            reduced: true,
        }
    }
}

/// A packed matrix together with the symbol it is emitted under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedObject {
    /// Symbol name.
    pub name: String,
    /// Packed contents.
    pub matrix: PackedMatrix,
}

/// Objects used by one round, as indices into [`ParameterArtifact::objects`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundEntry {
    /// Round-key matrix `K_{i+1}`, added after the round.
    pub key_matrix: usize,
    /// Linear layer `L_i`.
    pub linear_layer: usize,
    /// Round constant `C_i`.
    pub constant: usize,
}

/// Packed objects of one round, resolved from its [`RoundEntry`].
#[derive(Clone, Copy, Debug)]
pub struct RoundObjects<'a> {
    /// Round-key matrix `K_{i+1}`.
    pub key_matrix: &'a PackedObject,
    /// Linear layer `L_i`.
    pub linear_layer: &'a PackedObject,
    /// Round constant `C_i`.
    pub constant: &'a PackedObject,
}

/// Round index to round objects.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundTable {
    entries: Vec<RoundEntry>,
}

impl RoundTable {
    /// Entry for `round`, or `None` past the last round.
    pub fn get(&self, round: usize) -> Option<&RoundEntry> {
        self.entries.get(round)
    }

    /// Number of rounds.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true for a zero-round table.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in round order.
    pub fn iter(&self) -> impl Iterator<Item = &RoundEntry> {
        self.entries.iter()
    }
}

/// Symbols of the reduced key schedule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReducedRefs {
    /// Linear-part key matrix.
    pub linear_key_matrix: String,
    /// Non-linear-part key matrix.
    pub non_linear_key_matrix: String,
    /// Linear-part constant.
    pub linear_constant: String,
    /// Non-linear-part constant.
    pub non_linear_constant: String,
}

/// Top-level record describing the parameter set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    /// S-boxes per round.
    pub sbox_count: usize,
    /// Block size in bits.
    pub block_size: usize,
    /// Number of rounds.
    pub rounds: usize,
    /// Key size in bits.
    pub key_size: usize,
    /// Whitening key matrix `K_0`.
    pub key_matrix: String,
    /// Reduced key schedule, when generated.
    pub reduced: Option<ReducedRefs>,
}

/// Everything emitted for one configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterArtifact {
    /// Descriptor record.
    pub descriptor: Descriptor,
    /// Round lookup table.
    pub rounds: RoundTable,
    /// Packed objects in emission order.
    pub objects: Vec<PackedObject>,
}

impl ParameterArtifact {
    /// Looks up a packed object by symbol.
    pub fn object(&self, name: &str) -> Option<&PackedMatrix> {
        self.objects
            .iter()
            .find(|obj| obj.name == name)
            .map(|obj| &obj.matrix)
    }

    /// Packed objects of `round`, or `None` past the last round.
    pub fn round(&self, round: usize) -> Option<RoundObjects<'_>> {
        let entry = self.rounds.get(round)?;
        Some(RoundObjects {
            key_matrix: self.objects.get(entry.key_matrix)?,
            linear_layer: self.objects.get(entry.linear_layer)?,
            constant: self.objects.get(entry.constant)?,
        })
    }

    /// Packed objects of every round, in round order.
    pub fn round_objects(&self) -> impl Iterator<Item = RoundObjects<'_>> {
        (0..self.rounds.len()).map_while(|round| self.round(round))
    }

    /// Dimensions of the source instance.
    pub fn params(&self) -> InstanceParams {
        InstanceParams::new(
            self.descriptor.block_size,
            self.descriptor.key_size,
            self.descriptor.rounds,
        )
    }

    /// Serializes the artifact with `bincode`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, GenError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserializes an artifact with `bincode`, checking that every reference resolves.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GenError> {
        let artifact: Self = bincode::deserialize(bytes)?;
        artifact.check_references()?;
        Ok(artifact)
    }

    fn check_references(&self) -> Result<(), GenError> {
        let d = &self.descriptor;
        if self.rounds.len() != d.rounds {
            return Err(GenError::MalformedArtifact(format!(
                "round table has {} entries for {} rounds",
                self.rounds.len(),
                d.rounds
            )));
        }
        for (round, entry) in self.rounds.iter().enumerate() {
            let indices = [entry.key_matrix, entry.linear_layer, entry.constant];
            if let Some(bad) = indices.into_iter().find(|&i| i >= self.objects.len()) {
                return Err(GenError::MalformedArtifact(format!(
                    "round {round} references object {bad} of {}",
                    self.objects.len()
                )));
            }
        }
        let mut names = vec![&d.key_matrix];
        if let Some(refs) = &d.reduced {
            names.extend([
                &refs.linear_key_matrix,
                &refs.non_linear_key_matrix,
                &refs.linear_constant,
                &refs.non_linear_constant,
            ]);
        }
        match names.into_iter().find(|name| self.object(name).is_none()) {
            Some(missing) => Err(GenError::MalformedArtifact(format!(
                "descriptor references missing object {missing}"
            ))),
            None => Ok(()),
        }
    }
}

/// Builds the packed artifact for `instance`.
///
/// The instance is validated and re-indexed into the engine's bit order first.
/// Linear layers and key matrices are emitted transposed (the engine multiplies
/// row vectors from the left). Nothing is produced unless every step succeeds.
pub fn build_artifact(
    instance: &Instance,
    config: &ArtifactConfig,
) -> Result<ParameterArtifact, GenError> {
    let params = instance.params();
    let span = info_span!("build_artifact", %params, sbox_count = config.sbox_count);
    let _guard = span.enter();

    instance.validate()?;
    sbox_bits(config.sbox_count, params.block_size)?;
    let oriented = instance.oriented();
    let reduced = if config.reduced {
        Some(KeyScheduleReducer::new(config.sbox_count).reduce(&oriented)?)
    } else {
        None
    };

    let width = config.width;
    let mut objects = Vec::new();
    for (i, l) in oriented.linear_layers().iter().enumerate() {
        objects.push(PackedObject {
            name: linear_layer_name(i),
            matrix: PackedMatrix::encode_transposed(l, width),
        });
    }
    for (i, k) in oriented.round_key_matrices().iter().enumerate() {
        objects.push(PackedObject {
            name: key_matrix_name(i),
            matrix: PackedMatrix::encode_transposed(k, width),
        });
    }
    for (i, c) in oriented.round_constants().iter().enumerate() {
        objects.push(PackedObject {
            name: constant_name(i),
            matrix: PackedMatrix::encode_vector(c, width),
        });
    }

    let reduced_refs = reduced.map(|r| {
        objects.push(PackedObject {
            name: LINEAR_PART_KEY_MATRIX.to_owned(),
            matrix: PackedMatrix::encode(&r.linear_part_key_matrix, width),
        });
        objects.push(PackedObject {
            name: NON_LINEAR_PART_KEY_MATRIX.to_owned(),
            matrix: PackedMatrix::encode(&r.non_linear_part_key_matrix, width),
        });
        objects.push(PackedObject {
            name: LINEAR_PART_CONSTANT.to_owned(),
            matrix: PackedMatrix::encode_vector(&r.linear_part_constant, width),
        });
        objects.push(PackedObject {
            name: NON_LINEAR_PART_CONSTANT.to_owned(),
            matrix: PackedMatrix::encode_vector(&r.non_linear_part_constant, width),
        });
        ReducedRefs {
            linear_key_matrix: LINEAR_PART_KEY_MATRIX.to_owned(),
            non_linear_key_matrix: NON_LINEAR_PART_KEY_MATRIX.to_owned(),
            linear_constant: LINEAR_PART_CONSTANT.to_owned(),
            non_linear_constant: NON_LINEAR_PART_CONSTANT.to_owned(),
        }
    });

    // Objects start with L_0.., then K_0..=K_r, then C_0..
    let key_base = params.rounds;
    let constant_base = key_base + params.rounds + 1;
    let rounds = RoundTable {
        entries: (0..params.rounds)
            .map(|i| RoundEntry {
                key_matrix: key_base + i + 1,
                linear_layer: i,
                constant: constant_base + i,
            })
            .collect(),
    };

    let artifact = ParameterArtifact {
        descriptor: Descriptor {
            sbox_count: config.sbox_count,
            block_size: params.block_size,
            rounds: params.rounds,
            key_size: params.key_size,
            key_matrix: key_matrix_name(0),
            reduced: reduced_refs,
        },
        rounds,
        objects,
    };
    info!(objects = artifact.objects.len(), "built parameter artifact");
    Ok(artifact)
}

/// Samples the reference instance for `params` and builds its artifact.
pub fn generate_artifact(
    params: InstanceParams,
    config: &ArtifactConfig,
) -> Result<ParameterArtifact, GenError> {
    let instance = sample_reference_instance(params)?;
    build_artifact(&instance, config)
}
