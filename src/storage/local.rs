//! Local filesystem store.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! └── targets/
//!     └── {id}.json
//! ```
//!
//! Writes go to a temp file that is renamed over the record, so a crash
//! never leaves a half-written record behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::{StoredTarget, TargetStore, validate_target_id};

const TARGETS_DIR: &str = "targets";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root_dir: PathBuf,
}

impl LocalStore {
    /// Create a new LocalStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    fn path(&self, id: &str) -> Result<PathBuf> {
        validate_target_id(id)?;
        Ok(self.root_dir.join(TARGETS_DIR).join(format!("{id}.json")))
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl TargetStore for LocalStore {
    async fn load(&self, id: &str) -> Result<Option<StoredTarget>> {
        let path = self.path(id)?;
        match self.read_bytes(&path).await? {
            Some(bytes) => Ok(Some(StoredTarget::from_json(&bytes)?)),
            None => {
                log::debug!("No stored record for target {}", id);
                Ok(None)
            }
        }
    }

    async fn save(&self, target: &StoredTarget) -> Result<()> {
        let path = self.path(&target.id)?;
        let bytes = serde_json::to_vec_pretty(target)?;
        self.write_bytes(&path, &bytes).await?;
        log::info!(
            "Saved {} record for target {}",
            target.auth.kind(),
            target.id
        );
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let path = self.path(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let dir = self.root_dir.join(TARGETS_DIR);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            if validate_target_id(id).is_ok() {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}
