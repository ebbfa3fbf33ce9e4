//! State management for declared resources
//!
//! Manages the `.fleetscale/state.json` file which records the resource set
//! of the last applied provisioning pass.

use crate::error::{CloudError, Result};
use crate::provider::{ResourceConfig, ResourceSet};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;
pub const STATE_DIR: &str = ".fleetscale";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const STATE_STAGING: &str = "state.json.tmp";
const LOCK_FILE: &str = "lock.json";

/// Resource set of the last successful apply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedState {
    pub version: u32,

    /// Time of the last apply
    pub updated_at: DateTime<Utc>,

    /// Resources indexed by type:id
    pub resources: HashMap<String, RecordedResource>,
}

impl Default for AppliedState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: HashMap::new(),
        }
    }
}

impl AppliedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the recorded resources with `applied`.
    ///
    /// Resources whose payload did not change keep their creation time.
    pub fn record(&mut self, applied: &ResourceSet) {
        let now = Utc::now();
        let mut next = HashMap::with_capacity(applied.len());

        for (key, resource) in &applied.resources {
            let state = match self.resources.remove(key) {
                Some(mut existing) => {
                    if existing.config != resource.config {
                        existing.config = resource.config.clone();
                        existing.updated_at = now;
                    }
                    existing
                }
                None => RecordedResource::from_config(resource, now),
            };
            next.insert(key.clone(), state);
        }

        self.resources = next;
        self.updated_at = now;
    }

    /// Look up a recorded resource by `type:id`
    pub fn get_resource(&self, key: &str) -> Option<&RecordedResource> {
        self.resources.get(key)
    }
}

/// One resource as it was last applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedResource {
    /// Logical resource ID
    pub id: String,

    /// Resource type
    pub resource_type: String,

    /// Provider that received the declaration
    pub provider: String,

    /// Request payload as applied
    pub config: serde_json::Value,

    /// When the resource was first applied
    pub created_at: DateTime<Utc>,

    /// Last payload change
    pub updated_at: DateTime<Utc>,
}

impl RecordedResource {
    fn from_config(resource: &ResourceConfig, now: DateTime<Utc>) -> Self {
        Self {
            id: resource.id.clone(),
            resource_type: resource.resource_type.clone(),
            provider: resource.provider.clone(),
            config: resource.config.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Reads and writes `.fleetscale/state.json` under a project directory
pub struct StateManager {
    state_dir: PathBuf,
    lock_timeout: Duration,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            state_dir: project_root.as_ref().join(STATE_DIR),
            lock_timeout: Duration::hours(1),
        }
    }

    /// Age after which a lock is treated as abandoned
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone()
    }

    fn file(&self, name: &str) -> PathBuf {
        self.state_dir.join(name)
    }

    /// Last applied state. No state file means nothing was applied yet.
    pub async fn load(&self) -> Result<AppliedState> {
        let path = self.file(STATE_FILE);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No state at {}, starting empty", path.display());
                return Ok(AppliedState::new());
            }
            Err(e) => return Err(e.into()),
        };

        let state: AppliedState = serde_json::from_str(&content)?;
        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "{} has version {}, this build reads up to {}",
                path.display(),
                state.version,
                STATE_VERSION
            )));
        }
        tracing::debug!("Loaded {} recorded resources", state.resources.len());
        Ok(state)
    }

    /// Write the state through a temporary file. The previous state is kept
    /// as `state.json.backup`.
    pub async fn save(&self, state: &AppliedState) -> Result<()> {
        fs::create_dir_all(&self.state_dir).await?;

        let path = self.file(STATE_FILE);
        if fs::try_exists(&path).await? {
            fs::copy(&path, self.file(STATE_BACKUP)).await?;
        }

        let staging = self.file(STATE_STAGING);
        fs::write(&staging, serde_json::to_string_pretty(state)?).await?;
        fs::rename(&staging, &path).await?;

        tracing::debug!("Recorded {} resources", state.resources.len());
        Ok(())
    }

    /// Take the apply lock. A lock older than the timeout is taken over.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        fs::create_dir_all(&self.state_dir).await?;
        let lock_path = self.file(LOCK_FILE);

        if let Ok(content) = fs::read_to_string(&lock_path).await {
            let held: LockInfo = serde_json::from_str(&content)?;
            if Utc::now() - held.acquired_at < self.lock_timeout {
                return Err(CloudError::LockError(format!(
                    "held by {} (pid {}) since {}",
                    held.holder, held.pid, held.acquired_at
                )));
            }
            tracing::warn!(
                "Taking over lock abandoned by {} (pid {})",
                held.holder,
                held.pid
            );
        }

        let info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };
        fs::write(&lock_path, serde_json::to_string_pretty(&info)?).await?;

        tracing::debug!("Acquired lock {}", lock_path.display());
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// Apply lock, removed on release or drop
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        match fs::remove_file(&self.lock_path).await {
            Ok(()) => {
                tracing::debug!("Released lock {}", self.lock_path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::resource_type;
    use serde_json::json;
    use tempfile::tempdir;

    fn key_pair_set(name: &str) -> ResourceSet {
        let mut set = ResourceSet::new();
        set.add(ResourceConfig::new(
            resource_type::KEY_PAIR,
            "AsgKeyPair",
            "synth",
            json!({ "key_name": name }),
        ));
        set
    }

    #[tokio::test]
    async fn test_state_save_load() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut state = AppliedState::new();
        state.record(&key_pair_set("test-key-pair"));
        manager.save(&state).await.unwrap();

        let loaded = manager.load().await.unwrap();
        assert_eq!(loaded.resources.len(), 1);
        assert!(loaded.resources.contains_key("key-pair:AsgKeyPair"));
    }

    #[tokio::test]
    async fn test_empty_state() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let state = manager.load().await.unwrap();
        assert!(state.resources.is_empty());
    }

    #[tokio::test]
    async fn test_second_save_keeps_backup() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let state = AppliedState::new();
        manager.save(&state).await.unwrap();
        manager.save(&state).await.unwrap();

        assert!(manager.state_dir().join(STATE_BACKUP).exists());
        assert!(!manager.state_dir().join(STATE_STAGING).exists());
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_until_released() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let lock = manager.acquire_lock().await.unwrap();
        assert!(matches!(
            manager.acquire_lock().await,
            Err(CloudError::LockError(_))
        ));

        lock.release().await.unwrap();
        let again = manager.acquire_lock().await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_stale_lock_is_taken_over() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path()).with_lock_timeout(Duration::zero());

        let _held = manager.acquire_lock().await.unwrap();
        assert!(manager.acquire_lock().await.is_ok());
    }

    #[tokio::test]
    async fn test_newer_state_version_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        let mut state = AppliedState::new();
        state.version = STATE_VERSION + 1;
        manager.save(&state).await.unwrap();

        assert!(matches!(
            manager.load().await,
            Err(CloudError::StateError(_))
        ));
    }

    #[test]
    fn test_record_keeps_created_at_for_unchanged_payload() {
        let mut state = AppliedState::new();
        state.record(&key_pair_set("a"));
        let created = state.resources["key-pair:AsgKeyPair"].created_at;

        state.record(&key_pair_set("a"));
        assert_eq!(state.resources["key-pair:AsgKeyPair"].created_at, created);

        state.record(&key_pair_set("b"));
        let changed = &state.resources["key-pair:AsgKeyPair"];
        assert_eq!(changed.created_at, created);
        assert_eq!(changed.config, json!({ "key_name": "b" }));
    }
}
