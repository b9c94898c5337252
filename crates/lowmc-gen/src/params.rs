//! Instance dimensions and the named LowMC parameter sets.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Dimensions that fully determine a sampled instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceParams {
    /// State size `n` in bits.
    pub block_size: usize,
    /// Key size `k` in bits.
    pub key_size: usize,
    /// Number of rounds `r`.
    pub rounds: usize,
}

impl InstanceParams {
    /// LowMC with a 128-bit block and key, 20 rounds.
    pub const LOWMC_128_128_20: Self = Self::new(128, 128, 20);
    /// LowMC with a 192-bit block and key, 30 rounds.
    pub const LOWMC_192_192_30: Self = Self::new(192, 192, 30);
    /// LowMC with a 256-bit block and key, 38 rounds.
    pub const LOWMC_256_256_38: Self = Self::new(256, 256, 38);

    /// S-box count used with every named parameter set.
    pub const DEFAULT_SBOX_COUNT: usize = 10;

    /// Creates a parameter triple.
    pub const fn new(block_size: usize, key_size: usize, rounds: usize) -> Self {
        Self {
            block_size,
            key_size,
            rounds,
        }
    }

    /// Looks up a named parameter set such as `"128-128-20"`.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "128-128-20" => Some(Self::LOWMC_128_128_20),
            "192-192-30" => Some(Self::LOWMC_192_192_30),
            "256-256-38" => Some(Self::LOWMC_256_256_38),
            _ => None,
        }
    }

    /// Base name `{n}_{k}_{r}` used for emitted files and symbols.
    pub fn tag(&self) -> String {
        format!("{}_{}_{}", self.block_size, self.key_size, self.rounds)
    }
}

impl Default for InstanceParams {
    fn default() -> Self {
        Self::LOWMC_128_128_20
    }
}

impl fmt::Display for InstanceParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.block_size, self.key_size, self.rounds)
    }
}
