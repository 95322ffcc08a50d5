//! JSON-file stats repository.
//!
//! The whole table is held in memory and rewritten as one snapshot after
//! every outcome. Writes go to a sibling temp file that is renamed over the
//! target, so a crash leaves either the old or the new snapshot.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::duel::model::{GuildId, UserId};
use crate::error::StatsError;
use crate::stats::memory::InMemoryStatsRepository;
use crate::stats::{OutcomeRecord, StatsRepository, UserStats};

/// Snapshot format version written by this build.
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    users: Vec<UserStats>,
}

/// Stats persisted to a JSON file.
#[derive(Debug)]
pub struct JsonFileStatsRepository {
    path: PathBuf,
    table: InMemoryStatsRepository,
    write_lock: Mutex<()>,
}

impl JsonFileStatsRepository {
    /// Opens the store at `path`, starting empty if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Io`] if the file exists but cannot be read, and
    /// [`StatsError::Corrupt`] if it does not hold a snapshot this build
    /// understands.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StatsError> {
        let path = path.into();
        let table = match tokio::fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => InMemoryStatsRepository::new(),
            Ok(raw) => {
                let snapshot: Snapshot =
                    serde_json::from_str(&raw).map_err(|e| StatsError::Corrupt {
                        path: path.clone(),
                        message: e.to_string(),
                    })?;
                if snapshot.version != SNAPSHOT_VERSION {
                    return Err(StatsError::Corrupt {
                        path,
                        message: format!(
                            "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                            snapshot.version
                        ),
                    });
                }
                info!(path = %path.display(), users = snapshot.users.len(), "loaded stats snapshot");
                InMemoryStatsRepository::with_entries(snapshot.users)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no stats snapshot yet, starting empty");
                InMemoryStatsRepository::new()
            }
            Err(e) => return Err(StatsError::Io(e)),
        };
        Ok(Self {
            path,
            table,
            write_lock: Mutex::new(()),
        })
    }

    /// Location of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self) -> Result<(), StatsError> {
        let mut users = self.table.snapshot();
        users.sort_by_key(|s| (s.guild, s.user));
        let body = serde_json::to_vec_pretty(&Snapshot {
            version: SNAPSHOT_VERSION,
            users,
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl StatsRepository for JsonFileStatsRepository {
    /// Applies the outcome and rewrites the snapshot.
    ///
    /// On a write failure the in-memory table keeps the update, and the next
    /// successful write persists it.
    async fn record_outcome(&self, record: &OutcomeRecord) -> Result<(), StatsError> {
        let _guard = self.write_lock.lock().await;
        self.table.apply(record);
        self.persist().await
    }

    async fn get_stats(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> Result<Option<UserStats>, StatsError> {
        Ok(self.table.stats(guild, user))
    }

    async fn get_leaderboard(
        &self,
        guild: GuildId,
        limit: usize,
    ) -> Result<Vec<UserStats>, StatsError> {
        Ok(self.table.leaderboard(guild, limit))
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;
    use crate::duel::model::SessionId;
    use crate::stats::{DamageTally, DuelResult};

    fn draw() -> OutcomeRecord {
        OutcomeRecord {
            guild: GuildId(3),
            session_id: SessionId::new(),
            challenger: UserId(1),
            opponent: UserId(2),
            result: DuelResult::Draw,
            challenger_damage: DamageTally { dealt: 100, taken: 100 },
            opponent_damage: DamageTally { dealt: 100, taken: 100 },
            finished_at: DateTime::from_timestamp(0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileStatsRepository::open(dir.path().join("stats.json"))
            .await
            .unwrap();
        assert!(repo.get_leaderboard(GuildId(3), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_outcome_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        {
            let repo = JsonFileStatsRepository::open(&path).await.unwrap();
            repo.record_outcome(&draw()).await.unwrap();
        }
        assert!(!dir.path().join("stats.json.tmp").exists());

        let repo = JsonFileStatsRepository::open(&path).await.unwrap();
        let stats = repo.get_stats(GuildId(3), UserId(2)).await.unwrap().unwrap();
        assert_eq!(stats.draws, 1);
        assert_eq!(stats.total_damage_taken, 100);
    }

    #[tokio::test]
    async fn test_garbage_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = JsonFileStatsRepository::open(&path).await.unwrap_err();
        assert!(matches!(err, StatsError::Corrupt { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_future_version_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        std::fs::write(&path, r#"{"version": 9, "users": []}"#).unwrap();
        let err = JsonFileStatsRepository::open(&path).await.unwrap_err();
        assert!(err.to_string().contains("version 9"), "{err}");
    }

    #[tokio::test]
    async fn test_unwritable_target_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("stats.json");
        let repo = JsonFileStatsRepository::open(&path).await.unwrap();
        let err = repo.record_outcome(&draw()).await.unwrap_err();
        assert!(matches!(err, StatsError::Io(_)), "{err}");
        let stats = repo.get_stats(GuildId(3), UserId(1)).await.unwrap();
        assert!(stats.is_some());
    }
}
