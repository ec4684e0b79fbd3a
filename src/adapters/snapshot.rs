use crate::domain::model::SessionSnapshot;
use crate::domain::ports::SnapshotStore;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

/// Snapshot store writing one JSON file per transfer. Saves are whole-file
/// overwrites, so repeated autosaves of the same state are idempotent.
#[derive(Debug, Clone)]
pub struct LocalSnapshotStore {
    base_path: String,
}

impl LocalSnapshotStore {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }

    fn snapshot_path(&self, transfer_id: &str) -> PathBuf {
        Path::new(&self.base_path).join(format!("transfer-{}.json", transfer_id))
    }
}

#[async_trait]
impl SnapshotStore for LocalSnapshotStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let path = self.snapshot_path(&snapshot.transfer_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(snapshot)?;
        fs::write(&path, data)?;
        tracing::debug!("Snapshot saved to {}", path.display());
        Ok(())
    }

    async fn load(&self, transfer_id: &str) -> Result<Option<SessionSnapshot>> {
        let path = self.snapshot_path(transfer_id);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&data)?))
    }
}
