//! Persistence of raw instances so that sampling can be skipped on later runs.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::GenError;
use crate::instance::Instance;
use crate::params::InstanceParams;
use crate::sampler::sample_reference_instance;

/// Version tag written into every snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    params: InstanceParams,
    instance: Instance,
}

/// Serializes an instance into a tagged `bincode` snapshot.
pub fn to_bytes(instance: &Instance) -> Result<Vec<u8>, GenError> {
    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        params: instance.params(),
        instance: instance.clone(),
    };
    Ok(bincode::serialize(&snapshot)?)
}

/// Deserializes a snapshot, requiring it to match `expected`.
pub fn from_bytes(bytes: &[u8], expected: InstanceParams) -> Result<Instance, GenError> {
    let snapshot: Snapshot = bincode::deserialize(bytes)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(GenError::InvalidInstance(format!(
            "unsupported snapshot version {}",
            snapshot.version
        )));
    }
    if snapshot.params != expected {
        return Err(GenError::ConfigurationMismatch {
            expected,
            found: snapshot.params,
        });
    }
    if snapshot.instance.params() != snapshot.params {
        return Err(GenError::InvalidInstance(format!(
            "snapshot tagged {} holds a {} instance",
            snapshot.params,
            snapshot.instance.params()
        )));
    }
    snapshot.instance.check_shapes()?;
    Ok(snapshot.instance)
}

/// Directory-backed store of instance snapshots, one file per configuration.
#[derive(Clone, Debug)]
pub struct InstanceStore {
    root: PathBuf,
}

impl InstanceStore {
    /// Creates a store rooted at `root`; the directory is created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// File holding the snapshot for `params`.
    pub fn path_for(&self, params: InstanceParams) -> PathBuf {
        self.root
            .join(format!("matrices_and_constants_{}.bin", params.tag()))
    }

    /// Writes the snapshot for `instance`, replacing any previous one.
    pub fn save(&self, instance: &Instance) -> Result<PathBuf, GenError> {
        let path = self.path_for(instance.params());
        save_to(&path, instance)?;
        Ok(path)
    }

    /// Loads the snapshot for `params`.
    pub fn load(&self, params: InstanceParams) -> Result<Instance, GenError> {
        load_from(&self.path_for(params), params)
    }

    /// Loads the snapshot for `params`, sampling and saving it if absent.
    pub fn load_or_sample(&self, params: InstanceParams) -> Result<Instance, GenError> {
        let path = self.path_for(params);
        if path.exists() {
            debug!(path = %path.display(), "reusing stored instance");
            return load_from(&path, params);
        }
        let instance = sample_reference_instance(params)?;
        save_to(&path, &instance)?;
        Ok(instance)
    }
}

/// Writes a snapshot of `instance` to `path`.
pub fn save_to(path: &Path, instance: &Instance) -> Result<(), GenError> {
    let bytes = to_bytes(instance)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    info!(path = %path.display(), params = %instance.params(), "stored instance");
    Ok(())
}

/// Reads the snapshot at `path`, requiring it to match `expected`.
pub fn load_from(path: &Path, expected: InstanceParams) -> Result<Instance, GenError> {
    let bytes = fs::read(path)?;
    from_bytes(&bytes, expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_roundtrip() {
        let params = InstanceParams::new(16, 16, 2);
        let instance = sample_reference_instance(params).unwrap();
        let bytes = to_bytes(&instance).unwrap();
        assert_eq!(from_bytes(&bytes, params).unwrap(), instance);
    }

    #[test]
    fn snapshot_rejects_other_configuration() {
        let instance = sample_reference_instance(InstanceParams::new(16, 16, 2)).unwrap();
        let bytes = to_bytes(&instance).unwrap();
        let err = from_bytes(&bytes, InstanceParams::new(16, 16, 3)).unwrap_err();
        assert!(matches!(
            err,
            GenError::ConfigurationMismatch { expected, found }
                if expected.rounds == 3 && found.rounds == 2
        ));
    }

    #[derive(Serialize)]
    struct StoredVector {
        len: usize,
        words: Vec<u64>,
    }

    #[derive(Serialize)]
    struct StoredInstance {
        params: InstanceParams,
        linear_layers: Vec<gf2_core::BitMatrix>,
        round_key_matrices: Vec<gf2_core::BitMatrix>,
        round_constants: Vec<StoredVector>,
    }

    #[derive(Serialize)]
    struct StoredSnapshot {
        version: u32,
        params: InstanceParams,
        instance: StoredInstance,
    }

    fn snapshot_with_constant_words(words: Vec<u64>) -> Vec<u8> {
        let params = InstanceParams::new(8, 8, 1);
        let instance = sample_reference_instance(params).unwrap();
        bincode::serialize(&StoredSnapshot {
            version: SNAPSHOT_VERSION,
            params,
            instance: StoredInstance {
                params,
                linear_layers: instance.linear_layers().to_vec(),
                round_key_matrices: instance.round_key_matrices().to_vec(),
                round_constants: vec![StoredVector { len: 8, words }],
            },
        })
        .unwrap()
    }

    #[test]
    fn snapshot_with_corrupt_vector_storage_is_rejected() {
        let params = InstanceParams::new(8, 8, 1);
        let ok = from_bytes(&snapshot_with_constant_words(vec![0x5a]), params).unwrap();
        assert_eq!(ok.round_constants()[0].words(), &[0x5a]);

        for words in [vec![], vec![0, 0], vec![0x100]] {
            let err = from_bytes(&snapshot_with_constant_words(words), params).unwrap_err();
            assert!(matches!(err, GenError::Serialization(_)), "{err}");
            assert!(err.to_string().contains("corrupt storage"));
        }
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        let err = from_bytes(&[1, 2, 3], InstanceParams::default()).unwrap_err();
        assert!(matches!(err, GenError::Serialization(_)));
    }

    #[test]
    fn store_samples_once_then_reuses() {
        let dir = tempfile::tempdir().unwrap();
        let store = InstanceStore::new(dir.path().join("cache"));
        let params = InstanceParams::new(12, 12, 1);
        assert!(matches!(store.load(params), Err(GenError::Io(_))));

        let first = store.load_or_sample(params).unwrap();
        let path = store.path_for(params);
        assert!(path.ends_with("matrices_and_constants_12_12_1.bin"));
        assert!(path.exists());
        assert_eq!(store.load(params).unwrap(), first);
        assert_eq!(store.load_or_sample(params).unwrap(), first);
    }
}
