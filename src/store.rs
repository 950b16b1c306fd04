//! Model artifact storage
//!
//! The classifier only sees the [`ModelStore`] trait: one artifact under one
//! fixed key, saved whole and loaded whole. The file store writes to a unique
//! temporary file and renames it over the target, so a concurrent reader sees
//! either the previous artifact or the new one, never a partial write.
//!
//! Saves to the same path are serialized process-wide, across every
//! `FileModelStore` pointing at it.

use crate::classifier::ModelArtifact;
use crate::error::DelayError;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// Default artifact file name
pub const DEFAULT_MODEL_FILE: &str = "flight_delay_logreg_model.json";

/// Persistence for the fitted model artifact
pub trait ModelStore {
    /// Replace the stored artifact
    fn save(&self, artifact: &ModelArtifact) -> Result<(), DelayError>;

    /// Read the stored artifact; `StorageNotFound` before the first save
    fn load(&self) -> Result<ModelArtifact, DelayError>;

    /// Human-readable location, for logs and error messages
    fn location(&self) -> String;
}

/// Save locks, one per target path
static SAVE_LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

/// Lock shared by every store in this process that targets `path`
fn save_lock(path: &Path) -> Arc<Mutex<()>> {
    let key = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut locks = SAVE_LOCKS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    Arc::clone(locks.entry(key).or_default())
}

/// JSON artifact on the local filesystem
#[derive(Debug)]
pub struct FileModelStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl Default for FileModelStore {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_FILE)
    }
}

impl FileModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            write_lock: save_lock(&path),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_MODEL_FILE.to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()))
    }

    fn write_atomically(&self, temp_path: &Path, contents: &[u8]) -> Result<(), DelayError> {
        let mut file = File::create(temp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(temp_path, &self.path)?;
        Ok(())
    }
}

impl ModelStore for FileModelStore {
    fn save(&self, artifact: &ModelArtifact) -> Result<(), DelayError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_vec_pretty(artifact)?;
        let temp_path = self.temp_path();

        if let Err(e) = self.write_atomically(&temp_path, &contents) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        info!(path = %self.path.display(), model_id = %artifact.model_id, "model artifact saved");
        Ok(())
    }

    fn load(&self) -> Result<ModelArtifact, DelayError> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DelayError::StorageNotFound(self.location()));
            }
            Err(e) => return Err(e.into()),
        };

        let artifact: ModelArtifact = serde_json::from_slice(&contents)?;
        debug!(path = %self.path.display(), model_id = %artifact.model_id, "model artifact read");
        Ok(artifact)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Process-local store, for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryModelStore {
    artifact: RwLock<Option<ModelArtifact>>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelStore for MemoryModelStore {
    fn save(&self, artifact: &ModelArtifact) -> Result<(), DelayError> {
        let mut slot = self
            .artifact
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(artifact.clone());
        Ok(())
    }

    fn load(&self) -> Result<ModelArtifact, DelayError> {
        let slot = self
            .artifact
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.clone()
            .ok_or_else(|| DelayError::StorageNotFound(self.location()))
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::SolverConfig;
    use crate::schema::FeatureSchema;
    use crate::types::ClassWeights;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn artifact(intercept: f64) -> ModelArtifact {
        ModelArtifact {
            model_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            feature_columns: FeatureSchema::names().into_iter().map(String::from).collect(),
            coefficients: vec![0.5; 10],
            intercept,
            class_weights: ClassWeights {
                on_time: 0.2,
                delayed: 0.8,
            },
            solver: SolverConfig::default(),
            n_samples: 100,
            n_iter: 7,
            converged: true,
        }
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileModelStore::new(dir.path().join("model.json"));
        let saved = artifact(-1.25);

        store.save(&saved).unwrap();
        assert!(store.exists());
        assert_eq!(store.load().unwrap(), saved);
    }

    #[test]
    fn test_file_store_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FileModelStore::new(dir.path().join("missing.json"));

        match store.load() {
            Err(DelayError::StorageNotFound(location)) => {
                assert!(location.ends_with("missing.json"))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_file_store_replaces_wholesale() {
        let dir = TempDir::new().unwrap();
        let store = FileModelStore::new(dir.path().join("nested").join("model.json"));

        let first = artifact(1.0);
        let second = artifact(2.0);
        store.save(&first).unwrap();
        store.save(&second).unwrap();

        assert_eq!(store.load().unwrap(), second);

        // No temporary files are left behind
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_stores_on_one_path_share_a_lock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shared.json");

        let first = FileModelStore::new(&path);
        let second = FileModelStore::new(&path);
        let other = FileModelStore::new(dir.path().join("other.json"));

        assert!(Arc::ptr_eq(&first.write_lock, &second.write_lock));
        assert!(!Arc::ptr_eq(&first.write_lock, &other.write_lock));
    }

    #[test]
    fn test_concurrent_saves_from_separate_stores() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        let saved: Vec<ModelArtifact> = (0..8).map(|i| artifact(i as f64)).collect();

        std::thread::scope(|scope| {
            for a in &saved {
                let path = path.clone();
                scope.spawn(move || FileModelStore::new(path).save(a).unwrap());
            }
        });

        let loaded = FileModelStore::new(&path).load().unwrap();
        assert!(saved.contains(&loaded));

        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_file_store_corrupt_artifact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, "{ not json").unwrap();

        let store = FileModelStore::new(&path);
        assert!(matches!(store.load(), Err(DelayError::JsonError(_))));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryModelStore::new();
        assert!(matches!(store.load(), Err(DelayError::StorageNotFound(_))));

        let saved = artifact(0.0);
        store.save(&saved).unwrap();
        assert_eq!(store.load().unwrap(), saved);
    }
}
