//! File-based StateStore implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use churn_core::{ChurnState, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::fs;
use uuid::Uuid;

use super::{DEFAULT_TTL_DAYS, Result, StateStore};

/// On-disk envelope carrying the sliding expiry next to the record.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredState {
    expires_at: Timestamp,
    state: ChurnState,
}

/// File-based implementation of [`StateStore`].
///
/// Each player is stored as `{user}.json` under `base_dir`. Every save writes
/// its own uniquely named temporary file and renames it into place, so a
/// crash or an overlapping save for the same player never publishes a
/// half-written record. Overlapping saves are last-write-wins.
pub struct FileStateStore {
    base_dir: PathBuf,
    ttl: Duration,
}

impl FileStateStore {
    /// Create a store rooted at `base_dir`, creating the directory if needed.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        Self::with_ttl(base_dir, Duration::days(DEFAULT_TTL_DAYS))
    }

    pub fn with_ttl(base_dir: impl AsRef<Path>, ttl: Duration) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir, ttl })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn state_path(&self, user_id: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", encode_key(user_id)))
    }
}

/// Keep `[A-Za-z0-9_-]` as-is and percent-encode every other byte so player
/// ids can never escape the store directory.
fn encode_key(user_id: &str) -> String {
    let mut encoded = String::with_capacity(user_id.len());
    for byte in user_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, user_id: &str) -> Result<ChurnState> {
        let path = self.state_path(user_id);

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ChurnState::default());
            }
            Err(e) => return Err(e.into()),
        };

        let stored: StoredState = serde_json::from_slice(&bytes)?;
        if stored.expires_at <= Utc::now() {
            tracing::debug!(
                target: "pipeline::store",
                user_id,
                "record expired, starting fresh"
            );
            return Ok(ChurnState::default());
        }

        tracing::debug!(target: "pipeline::store", user_id, path = %path.display(), "loaded state");
        Ok(stored.state)
    }

    async fn save(&self, user_id: &str, state: &ChurnState) -> Result<()> {
        let path = self.state_path(user_id);
        let temp_path = path.with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));

        let stored = StoredState {
            expires_at: Utc::now() + self.ttl,
            state: state.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&stored)?;

        let written = match fs::write(&temp_path, bytes).await {
            Ok(()) => fs::rename(&temp_path, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::debug!(target: "pipeline::store", user_id, path = %path.display(), "saved state");
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<()> {
        match fs::remove_file(self.state_path(user_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
