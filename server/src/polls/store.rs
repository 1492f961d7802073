//! Poll Store
//!
//! Durable map of poll-creation message ID → poll metadata, persisted as a
//! single JSON file that is rewritten whole on every update.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// File name of the store inside the storage directory.
pub const POLL_STORE_FILE: &str = "poll_store.json";

/// Metadata of a poll sent from this account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollRecord {
    pub question: String,
    pub options: Vec<String>,
    /// Per-poll message secret used to derive the vote encryption key.
    pub enc_key: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum PollStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Poll metadata store.
///
/// Writes hold the exclusive lock for the whole flush so readers never
/// observe a record that is not yet on disk.
#[derive(Debug)]
pub struct PollStore {
    path: PathBuf,
    records: RwLock<HashMap<String, PollRecord>>,
}

impl PollStore {
    /// Open the store at `path`.
    ///
    /// A missing, unreadable, or corrupt file yields an empty store; the
    /// failure is logged and startup continues.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                error!(path = %parent.display(), error = %e, "Failed to create poll store directory");
            }
        }

        let records = match load(&path).await {
            Ok(records) => {
                info!(path = %path.display(), polls = records.len(), "Poll store loaded");
                records
            }
            Err(PollStoreError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "Poll store file not found, starting empty");
                HashMap::new()
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to load poll store, starting empty");
                HashMap::new()
            }
        };

        Self {
            path,
            records: RwLock::new(records),
        }
    }

    /// Store `record` under `message_id`, replacing any previous record, and
    /// flush the full set to disk. A flush failure is logged; the in-memory
    /// record is kept.
    pub async fn put(&self, message_id: impl Into<String>, record: PollRecord) {
        let message_id = message_id.into();
        let mut records = self.records.write().await;
        records.insert(message_id.clone(), record);

        if let Err(e) = flush(&self.path, &records).await {
            error!(
                message_id = %message_id,
                path = %self.path.display(),
                error = %e,
                "Failed to persist poll store"
            );
        }
    }

    pub async fn get(&self, message_id: &str) -> Option<PollRecord> {
        self.records.read().await.get(message_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

async fn load(path: &Path) -> Result<HashMap<String, PollRecord>, PollStoreError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Write to a sibling temp file, fsync it, then rename over the target.
///
/// On failure the temp file is removed and the previous file is untouched.
async fn flush(path: &Path, records: &HashMap<String, PollRecord>) -> Result<(), PollStoreError> {
    let bytes = serde_json::to_vec_pretty(records)?;
    let tmp = path.with_extension("json.tmp");

    let result = replace_with(&tmp, path, &bytes).await;
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&tmp).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %tmp.display(), error = %e, "Failed to remove poll store temp file");
            }
        }
    }
    result
}

async fn replace_with(tmp: &Path, path: &Path, bytes: &[u8]) -> Result<(), PollStoreError> {
    {
        let mut file = tokio::fs::File::create(tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
    }
    tokio::fs::rename(tmp, path).await?;
    Ok(())
}
