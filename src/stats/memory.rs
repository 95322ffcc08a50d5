//! In-memory stats repository.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::duel::model::{GuildId, UserId};
use crate::error::StatsError;
use crate::stats::{OutcomeRecord, StatsRepository, UserStats, apply_outcome, rank};

/// Process-local stats, lost on exit.
#[derive(Debug, Default)]
pub struct InMemoryStatsRepository {
    entries: DashMap<(GuildId, UserId), UserStats>,
    writes: Mutex<()>,
}

impl InMemoryStatsRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the repository with existing records.
    #[must_use]
    pub fn with_entries(entries: impl IntoIterator<Item = UserStats>) -> Self {
        let repo = Self::new();
        for stats in entries {
            repo.entries.insert((stats.guild, stats.user), stats);
        }
        repo
    }

    /// Every record, in no particular order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<UserStats> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }

    /// Applies a record synchronously. Shared with the file-backed store.
    pub(crate) fn apply(&self, record: &OutcomeRecord) {
        let _serialized = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        let load = |user| {
            self.entries
                .get(&(record.guild, user))
                .map_or_else(|| UserStats::new(record.guild, user), |e| e.value().clone())
        };
        let mut challenger = load(record.challenger);
        let mut opponent = load(record.opponent);
        apply_outcome(&mut challenger, &mut opponent, record);
        self.entries.insert((record.guild, record.challenger), challenger);
        self.entries.insert((record.guild, record.opponent), opponent);
    }

    pub(crate) fn stats(&self, guild: GuildId, user: UserId) -> Option<UserStats> {
        self.entries.get(&(guild, user)).map(|e| e.value().clone())
    }

    pub(crate) fn leaderboard(&self, guild: GuildId, limit: usize) -> Vec<UserStats> {
        let scoped = self
            .entries
            .iter()
            .filter(|e| e.key().0 == guild)
            .map(|e| e.value().clone())
            .collect();
        rank(scoped, limit)
    }
}

#[async_trait]
impl StatsRepository for InMemoryStatsRepository {
    async fn record_outcome(&self, record: &OutcomeRecord) -> Result<(), StatsError> {
        self.apply(record);
        Ok(())
    }

    async fn get_stats(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> Result<Option<UserStats>, StatsError> {
        Ok(self.stats(guild, user))
    }

    async fn get_leaderboard(
        &self,
        guild: GuildId,
        limit: usize,
    ) -> Result<Vec<UserStats>, StatsError> {
        Ok(self.leaderboard(guild, limit))
    }
}
