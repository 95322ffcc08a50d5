//! Player statistics
//!
//! The engine writes one [`OutcomeRecord`] per combat-resolved duel through
//! [`StatsRepository::record_outcome`] and otherwise only reads. Stats are
//! partitioned by guild.

pub mod file;
pub mod memory;

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::duel::model::{GuildId, SessionId, Timestamp, UserId};
use crate::error::StatsError;

pub use file::JsonFileStatsRepository;
pub use memory::InMemoryStatsRepository;

/// Experience needed per level.
pub const EXPERIENCE_PER_LEVEL: u64 = 100;

/// Base experience for fighting a duel.
const BASE_EXPERIENCE: i64 = 10;

/// Aggregated record for one user in one guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    /// Player
    pub user: UserId,
    /// Guild scope
    pub guild: GuildId,
    /// Duels won
    pub wins: u64,
    /// Duels lost
    pub losses: u64,
    /// Duels drawn
    pub draws: u64,
    /// Combat-resolved duels fought
    pub duels_played: u64,
    /// Consecutive wins up to the latest duel
    pub win_streak: u64,
    /// Longest win streak ever
    pub best_win_streak: u64,
    /// Damage dealt across all duels
    pub total_damage_dealt: u64,
    /// Damage taken across all duels
    pub total_damage_taken: u64,
    /// Accumulated experience
    pub experience: u64,
    /// Derived from experience
    pub level: u64,
}

impl UserStats {
    /// Empty record.
    #[must_use]
    pub const fn new(guild: GuildId, user: UserId) -> Self {
        Self {
            user,
            guild,
            wins: 0,
            losses: 0,
            draws: 0,
            duels_played: 0,
            win_streak: 0,
            best_win_streak: 0,
            total_damage_dealt: 0,
            total_damage_taken: 0,
            experience: 0,
            level: 1,
        }
    }

    /// Wins over duels played, `0.0` before the first duel.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn win_rate(&self) -> f64 {
        if self.duels_played == 0 {
            0.0
        } else {
            self.wins as f64 / self.duels_played as f64
        }
    }
}

/// Result of a combat-resolved duel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DuelResult {
    /// One side won.
    Win {
        /// The winner
        winner: UserId,
        /// The loser
        loser: UserId,
    },
    /// Nobody won.
    Draw,
}

/// Damage totals for one side of a finished duel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageTally {
    /// Health removed from the other side
    pub dealt: u32,
    /// Health lost
    pub taken: u32,
}

/// Everything the repository learns about one finished duel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// Guild scope
    pub guild: GuildId,
    /// Finished session
    pub session_id: SessionId,
    /// Issuer of the challenge
    pub challenger: UserId,
    /// Receiver of the challenge
    pub opponent: UserId,
    /// Verdict
    pub result: DuelResult,
    /// Challenger damage totals
    pub challenger_damage: DamageTally,
    /// Opponent damage totals
    pub opponent_damage: DamageTally,
    /// When the duel finished
    pub finished_at: Timestamp,
}

impl OutcomeRecord {
    /// Winner, unless drawn.
    #[must_use]
    pub const fn winner(&self) -> Option<UserId> {
        match self.result {
            DuelResult::Win { winner, .. } => Some(winner),
            DuelResult::Draw => None,
        }
    }

    /// Loser, unless drawn.
    #[must_use]
    pub const fn loser(&self) -> Option<UserId> {
        match self.result {
            DuelResult::Win { loser, .. } => Some(loser),
            DuelResult::Draw => None,
        }
    }

    /// Whether the duel was drawn.
    #[must_use]
    pub const fn is_draw(&self) -> bool {
        matches!(self.result, DuelResult::Draw)
    }
}

/// Durable store of per-guild player statistics.
#[async_trait]
pub trait StatsRepository: Send + Sync + std::fmt::Debug {
    /// Applies one finished duel to both participants' records.
    ///
    /// # Errors
    ///
    /// Returns a [`StatsError`] when the backing store cannot be updated.
    async fn record_outcome(&self, record: &OutcomeRecord) -> Result<(), StatsError>;

    /// Record for `user` in `guild`, if they ever fought there.
    ///
    /// # Errors
    ///
    /// Returns a [`StatsError`] when the backing store cannot be read.
    async fn get_stats(&self, guild: GuildId, user: UserId)
    -> Result<Option<UserStats>, StatsError>;

    /// Top `limit` players in `guild`; see [`leaderboard_order`].
    ///
    /// # Errors
    ///
    /// Returns a [`StatsError`] when the backing store cannot be read.
    async fn get_leaderboard(
        &self,
        guild: GuildId,
        limit: usize,
    ) -> Result<Vec<UserStats>, StatsError>;
}

// ============================================================================
// Shared rules
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Standing {
    Win,
    Loss,
    Draw,
}

/// Level for an experience total.
#[must_use]
pub const fn level_for(experience: u64) -> u64 {
    experience / EXPERIENCE_PER_LEVEL + 1
}

/// Experience gained by a player of `own_level` after fighting
/// `opponent_level`.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
const fn experience_gain(own_level: u64, opponent_level: u64, standing: Standing) -> u64 {
    let bonus = match standing {
        Standing::Win => 5,
        Standing::Draw => 2,
        Standing::Loss => 1,
    };
    let gap = opponent_level as i64 - own_level as i64;
    let gain = BASE_EXPERIENCE + 2 * gap + bonus;
    if gain < 1 { 1 } else { gain as u64 }
}

/// Applies `record` to both participants' stats.
///
/// Experience is computed from the levels both players held before the duel.
pub fn apply_outcome(challenger: &mut UserStats, opponent: &mut UserStats, record: &OutcomeRecord) {
    let (challenger_standing, opponent_standing) = match record.result {
        DuelResult::Draw => (Standing::Draw, Standing::Draw),
        DuelResult::Win { winner, .. } if winner == record.challenger => {
            (Standing::Win, Standing::Loss)
        }
        DuelResult::Win { .. } => (Standing::Loss, Standing::Win),
    };
    let challenger_level = challenger.level;
    let opponent_level = opponent.level;

    apply_one(
        challenger,
        challenger_standing,
        record.challenger_damage,
        experience_gain(challenger_level, opponent_level, challenger_standing),
    );
    apply_one(
        opponent,
        opponent_standing,
        record.opponent_damage,
        experience_gain(opponent_level, challenger_level, opponent_standing),
    );
}

fn apply_one(stats: &mut UserStats, standing: Standing, damage: DamageTally, gain: u64) {
    stats.duels_played += 1;
    match standing {
        Standing::Win => {
            stats.wins += 1;
            stats.win_streak += 1;
            stats.best_win_streak = stats.best_win_streak.max(stats.win_streak);
        }
        Standing::Loss => {
            stats.losses += 1;
            stats.win_streak = 0;
        }
        Standing::Draw => {
            stats.draws += 1;
            stats.win_streak = 0;
        }
    }
    stats.total_damage_dealt += u64::from(damage.dealt);
    stats.total_damage_taken += u64::from(damage.taken);
    stats.experience += gain;
    stats.level = level_for(stats.experience);
}

/// Leaderboard ordering: wins, then win streak, then level (all descending),
/// then user id ascending.
#[must_use]
pub fn leaderboard_order(a: &UserStats, b: &UserStats) -> Ordering {
    b.wins
        .cmp(&a.wins)
        .then_with(|| b.win_streak.cmp(&a.win_streak))
        .then_with(|| b.level.cmp(&a.level))
        .then_with(|| a.user.cmp(&b.user))
}

/// Filters, sorts and truncates a guild's records into a leaderboard.
#[must_use]
pub fn rank(mut entries: Vec<UserStats>, limit: usize) -> Vec<UserStats> {
    entries.retain(|s| s.duels_played > 0);
    entries.sort_by(leaderboard_order);
    entries.truncate(limit);
    entries
}
