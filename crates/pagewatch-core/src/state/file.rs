// # File State Store
//
// File-based implementation of StateStore with crash recovery.
//
// ## Purpose
//
// Persists the state map between runs on a local disk, for deployments that
// do not use a remote document store.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of the previous state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "targets": {
//     "3f2a9c01d4e5b6a7": {
//       "appear": { "vacancy": false },
//       "vanish": { "full": true },
//       "status": "unavailable"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::config::StateStoreConfig;
use crate::traits::state_store::{StateStore, StateStoreFactory};
use crate::watch::StateMap;

/// State file format version
/// Used for future migration if format changes
const STATE_FILE_VERSION: &str = "1.0";

/// File-based state store with crash recovery
///
/// # Crash Recovery
///
/// - **Atomic writes**: New state written to temporary file, then renamed
/// - **Backup**: Previous state kept in `.backup` file
/// - **Corruption detection**: JSON validation on load
/// - **Automatic recovery**: Falls back to backup if main file corrupted
///
/// # Example
///
/// ```rust,no_run
/// use pagewatch_core::state::FileStateStore;
/// use pagewatch_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/var/lib/pagewatch/state.json").await?;
///     let states = store.load().await?;
///     store.save(&states).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
}

/// Serializable state file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StateFileFormat {
    version: String,
    #[serde(default)]
    targets: StateMap,
}

impl FileStateStore {
    /// Create a file state store
    ///
    /// Creates parent directories if needed. Nothing is read until
    /// [`StateStore::load`].
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::state_store(format!(
                        "Failed to create state directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        Ok(Self { path })
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load state from file with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load main state file
    /// 2. If it does not parse, try loading backup (and restore it)
    /// 3. If backup is missing or also corrupted, start with empty state
    async fn load_state_with_recovery(path: &Path) -> Result<StateMap, Error> {
        let content = match Self::read_file(path).await? {
            Some(content) => content,
            None => {
                tracing::debug!("State file does not exist: {}", path.display());
                return Ok(StateMap::new());
            }
        };

        let parse_error = match Self::parse(path, &content) {
            Ok(states) => {
                tracing::debug!("Loaded state from file: {} records", states.len());
                return Ok(states);
            }
            Err(e) => e,
        };

        tracing::warn!(
            "State file appears corrupted: {}. Attempting recovery from backup.",
            parse_error
        );

        let backup_path = Self::backup_path(path);
        let backup = match Self::read_file(&backup_path).await? {
            Some(content) => content,
            None => {
                tracing::warn!("No backup file found. Starting with empty state.");
                return Ok(StateMap::new());
            }
        };

        match Self::parse(&backup_path, &backup) {
            Ok(states) => {
                tracing::info!("Recovered state from backup: {} records", states.len());

                if let Err(restore_err) = Self::restore_from_backup(path, &backup_path).await {
                    tracing::error!(
                        "Failed to restore state file from backup: {}",
                        restore_err
                    );
                }

                Ok(states)
            }
            Err(backup_err) => {
                tracing::error!(
                    "Backup also corrupted: {}. Starting with empty state.",
                    backup_err
                );
                Ok(StateMap::new())
            }
        }
    }

    /// Read a file, `None` if it does not exist
    async fn read_file(path: &Path) -> Result<Option<String>, Error> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::state_store(format!(
                "Failed to read state file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn parse(path: &Path, content: &str) -> Result<StateMap, Error> {
        let state_file: StateFileFormat = serde_json::from_str(content).map_err(|e| {
            Error::state_store(format!(
                "Failed to parse state file {}: {}",
                path.display(),
                e
            ))
        })?;

        if state_file.version != STATE_FILE_VERSION {
            tracing::warn!(
                "State file version mismatch: expected {}, got {}. \
                Attempting to load anyway.",
                STATE_FILE_VERSION,
                state_file.version
            );
        }

        Ok(state_file.targets)
    }

    /// Write state to file atomically
    async fn write_state(&self, states: &StateMap) -> Result<(), Error> {
        let state_file = StateFileFormat {
            version: STATE_FILE_VERSION.to_string(),
            targets: states.clone(),
        };

        let json = serde_json::to_string_pretty(&state_file)
            .map_err(|e| Error::state_store(format!("Failed to serialize state: {}", e)))?;

        // Write to temporary file first
        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        // Create backup of current file (if it exists)
        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        // Atomic rename (temp -> actual)
        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("State written to file: {}", self.path.display());
        Ok(())
    }

    /// Restore state file from backup
    async fn restore_from_backup(path: &Path, backup_path: &Path) -> Result<(), Error> {
        fs::copy(backup_path, path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to restore from backup {} to {}: {}",
                backup_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!("Restored state file from backup");
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<StateMap, Error> {
        Self::load_state_with_recovery(&self.path).await
    }

    async fn save(&self, states: &StateMap) -> Result<(), Error> {
        self.write_state(states).await
    }

    fn store_name(&self) -> &'static str {
        "file"
    }
}

/// Factory for [`FileStateStore`]
pub struct FileStateStoreFactory;

#[async_trait]
impl StateStoreFactory for FileStateStoreFactory {
    async fn create(&self, config: &StateStoreConfig) -> Result<Box<dyn StateStore>, Error> {
        match config {
            StateStoreConfig::File { path } => Ok(Box::new(FileStateStore::new(path).await?)),
            other => Err(Error::config(format!(
                "File state store cannot be built from {} configuration",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::{KeywordPresence, Status, TargetId, TargetState};
    use tempfile::tempdir;

    fn states_with(status: Status) -> StateMap {
        let mut states = StateMap::new();
        states.insert(
            TargetId::derive("Example Heights", "https://example.com"),
            TargetState::new(
                [("vacancy", status == Status::Available)].into_iter().collect(),
                KeywordPresence::new(),
                status,
            ),
        );
        states
    }

    #[tokio::test]
    async fn test_file_store_basic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStateStore::new(&path).await.unwrap();

        // Missing file loads as empty
        assert!(store.load().await.unwrap().is_empty());

        let states = states_with(Status::Available);
        store.save(&states).await.unwrap();
        assert!(path.exists());

        // New instance sees the persisted map
        let store2 = FileStateStore::new(&path).await.unwrap();
        assert_eq!(store2.load().await.unwrap(), states);
    }

    #[tokio::test]
    async fn test_file_format_has_version_and_targets() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = FileStateStore::new(&path).await.unwrap();
        store.save(&states_with(Status::Unavailable)).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(raw["version"], "1.0");
        let record = raw["targets"].as_object().unwrap().values().next().unwrap();
        assert_eq!(record["status"], "unavailable");
    }

    #[tokio::test]
    async fn test_file_store_corruption_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStateStore::new(&path).await.unwrap();
        let first = states_with(Status::Unavailable);
        store.save(&first).await.unwrap();

        // Second write moves the first into the backup
        store.save(&states_with(Status::Available)).await.unwrap();
        assert!(FileStateStore::backup_path(&path).exists());

        fs::write(&path, b"corrupted json data").await.unwrap();

        let recovered = store.load().await.unwrap();
        assert_eq!(recovered, first, "Backup should contain previous state");
    }

    #[tokio::test]
    async fn test_corruption_without_backup_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"{ not json").await.unwrap();

        let store = FileStateStore::new(&path).await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_factory_rejects_other_config() {
        let result = FileStateStoreFactory.create(&StateStoreConfig::Memory).await;
        assert!(result.is_err());
    }
}
