//! Durable state storage
//!
//! One pretty-printed JSON file per resource record, grouped by stack:
//! `<root>/<stack>/<resource-id>.json`. Writes go through a temp file and
//! an atomic rename, so a crash never leaves a half-written record and
//! parallel writers to distinct identifiers cannot corrupt each other.

use crate::error::{Result, StateError};
use crate::record::StateRecord;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// File-backed store of state records, sharded per stack and resource
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn stack_dir(&self, stack: &str) -> PathBuf {
        self.root.join(stack)
    }

    fn record_path(&self, stack: &str, id: &str) -> PathBuf {
        self.stack_dir(stack).join(format!("{id}.json"))
    }

    /// Load all records for a stack. A stack that has never been applied
    /// yields an empty map.
    pub async fn load(&self, stack: &str) -> Result<BTreeMap<String, StateRecord>> {
        let dir = self.stack_dir(stack);
        if !dir.exists() {
            tracing::debug!(stack, "no state directory, returning empty state");
            return Ok(BTreeMap::new());
        }

        let mut records = BTreeMap::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path).await?;
            let record: StateRecord =
                serde_json::from_str(&content).map_err(|e| StateError::Corrupt {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
            records.insert(record.id.clone(), record);
        }

        tracing::debug!(stack, records = records.len(), "loaded state");
        Ok(records)
    }

    /// Persist one record. Atomic per identifier: the content lands in a
    /// temp file first and is renamed into place.
    pub async fn save(&self, stack: &str, record: &StateRecord) -> Result<()> {
        let dir = self.stack_dir(stack);
        fs::create_dir_all(&dir).await?;

        let path = self.record_path(stack, &record.id);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(record)?;
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;

        tracing::debug!(
            stack,
            id = %record.id,
            status = %record.status,
            version = record.version,
            "saved state record"
        );
        Ok(())
    }

    /// Remove a record. Removing an absent record is not an error.
    pub async fn remove(&self, stack: &str, id: &str) -> Result<()> {
        let path = self.record_path(stack, id);
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(stack, id, "removed state record");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
