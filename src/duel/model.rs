//! Duel data model
//!
//! Identities, participants, sessions, and the immutable move records
//! appended to a session's log.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Point in time as seen by the engine. Callers supply it with every intent.
pub type Timestamp = DateTime<Utc>;

/// Opaque platform user identity.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Guild (server) scope that stats are partitioned by.
#[derive(
    Debug, Clone, Copy, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GuildId(pub u64);

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique duel session identifier.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Challenge issued, waiting on the opponent.
    Pending,
    /// Combat in progress.
    Active,
    /// Terminal.
    Finished,
}

/// Winner of a combat-resolved duel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The challenger won.
    ChallengerWin,
    /// The opponent won.
    OpponentWin,
    /// Nobody won.
    Draw,
}

impl Verdict {
    /// Verdict by health comparison: higher health wins, equal is a draw.
    #[must_use]
    pub const fn by_health(challenger: u32, opponent: u32) -> Self {
        if challenger > opponent {
            Self::ChallengerWin
        } else if opponent > challenger {
            Self::OpponentWin
        } else {
            Self::Draw
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Not finished yet.
    None,
    /// The challenger knocked the opponent out.
    ChallengerWin,
    /// The opponent knocked the challenger out.
    OpponentWin,
    /// Both participants hit zero health on the same move.
    Draw,
    /// The opponent refused the challenge.
    Declined,
    /// The challenger withdrew the challenge.
    Cancelled,
    /// Nobody answered the challenge in time.
    Expired,
    /// The duel ran past its duration limit and was decided on health.
    TimedOut {
        /// Result of the health comparison
        verdict: Verdict,
    },
}

impl Outcome {
    /// Outcome for a knockout verdict.
    #[must_use]
    pub const fn from_verdict(verdict: Verdict) -> Self {
        match verdict {
            Verdict::ChallengerWin => Self::ChallengerWin,
            Verdict::OpponentWin => Self::OpponentWin,
            Verdict::Draw => Self::Draw,
        }
    }

    /// The combat verdict, if combat decided this outcome.
    #[must_use]
    pub const fn verdict(self) -> Option<Verdict> {
        match self {
            Self::ChallengerWin => Some(Verdict::ChallengerWin),
            Self::OpponentWin => Some(Verdict::OpponentWin),
            Self::Draw => Some(Verdict::Draw),
            Self::TimedOut { verdict } => Some(verdict),
            Self::None | Self::Declined | Self::Cancelled | Self::Expired => None,
        }
    }

    /// Whether combat took place. Only these outcomes touch stats and cooldowns.
    #[must_use]
    pub const fn is_combat(self) -> bool {
        self.verdict().is_some()
    }

    /// Stable label used in metrics and logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ChallengerWin => "challenger_win",
            Self::OpponentWin => "opponent_win",
            Self::Draw => "draw",
            Self::Declined => "declined",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::TimedOut { .. } => "timed_out",
        }
    }
}

/// Combat move kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    /// Damage roll against the other participant.
    Attack,
    /// Mitigate the other participant's next action.
    Defend,
    /// Restore own health.
    Heal,
    /// Once-per-duel heavy hit that may backfire.
    Special,
}

impl MoveKind {
    /// Stable label used in metrics and logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Attack => "attack",
            Self::Defend => "defend",
            Self::Heal => "heal",
            Self::Special => "special",
        }
    }
}

/// Every intent the engine accepts against an existing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Opponent accepts a pending challenge.
    Accept,
    /// Opponent refuses a pending challenge.
    Decline,
    /// Challenger withdraws a pending challenge.
    Cancel,
    /// Combat move by the turn owner.
    Move(MoveKind),
}

impl Action {
    /// Stable label used in metrics and logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Decline => "decline",
            Self::Cancel => "cancel",
            Self::Move(kind) => kind.label(),
        }
    }
}

/// Which side of the duel a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Issued the challenge.
    Challenger,
    /// Received the challenge.
    Opponent,
}

/// One side of a duel with its ephemeral combat attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Platform identity
    pub id: UserId,
    /// Current health in `[0, max_health]`
    pub health: u32,
    /// Set by DEFEND; consumed by the other side's next action
    pub defending: bool,
    /// Set once SPECIAL has been spent
    pub special_used: bool,
    /// Health removed from the other side this duel
    pub damage_dealt: u32,
    /// Health lost this duel, self-inflicted included
    pub damage_taken: u32,
}

impl Participant {
    /// Fresh participant at full health.
    #[must_use]
    pub const fn new(id: UserId, max_health: u32) -> Self {
        Self {
            id,
            health: max_health,
            defending: false,
            special_used: false,
            damage_dealt: 0,
            damage_taken: 0,
        }
    }

    /// Removes up to `amount` health and returns how much was actually lost.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        let lost = amount.min(self.health);
        self.health -= lost;
        self.damage_taken = self.damage_taken.saturating_add(lost);
        lost
    }

    /// Whether this participant has been knocked out.
    #[must_use]
    pub const fn is_down(&self) -> bool {
        self.health == 0
    }
}

/// Immutable record of one resolved combat move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuelMove {
    /// 1-based position in the move log
    pub turn: u32,
    /// Who acted
    pub actor: UserId,
    /// What they did
    pub kind: MoveKind,
    /// Health removed from the other side, or restored for HEAL
    pub amount: u32,
    /// Health the actor lost to a special backfire
    pub self_damage: u32,
    /// Whether the other side's defense reduced this move
    pub mitigated: bool,
    /// When the move was resolved
    pub at: Timestamp,
    /// Challenger health after the move
    pub challenger_health: u32,
    /// Opponent health after the move
    pub opponent_health: u32,
}

/// A duel between two participants from challenge to outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuelSession {
    /// Session identifier
    pub id: SessionId,
    /// Guild the duel belongs to
    pub guild: GuildId,
    /// Issuer of the challenge
    pub challenger: Participant,
    /// Receiver of the challenge
    pub opponent: Participant,
    /// Lifecycle state
    pub state: SessionState,
    /// `Outcome::None` until finished
    pub outcome: Outcome,
    /// Participant whose combat move is accepted next (active only)
    pub turn_owner: Option<UserId>,
    /// When the challenge was issued
    pub created_at: Timestamp,
    /// When the challenge was accepted
    pub started_at: Option<Timestamp>,
    /// Last accepted intent
    pub last_action_at: Timestamp,
    /// When the session finished
    pub ended_at: Option<Timestamp>,
    /// Append-only record of resolved moves
    pub move_log: Vec<DuelMove>,
}

impl DuelSession {
    /// Creates a pending session.
    #[must_use]
    pub fn new(
        id: SessionId,
        guild: GuildId,
        challenger: UserId,
        opponent: UserId,
        max_health: u32,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            guild,
            challenger: Participant::new(challenger, max_health),
            opponent: Participant::new(opponent, max_health),
            state: SessionState::Pending,
            outcome: Outcome::None,
            turn_owner: None,
            created_at: now,
            started_at: None,
            last_action_at: now,
            ended_at: None,
            move_log: Vec::new(),
        }
    }

    /// Whether the session still holds its participants (pending or active).
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.state != SessionState::Finished
    }

    /// Side of the duel `user` is on, if any.
    #[must_use]
    pub fn role_of(&self, user: UserId) -> Option<Role> {
        if user == self.challenger.id {
            Some(Role::Challenger)
        } else if user == self.opponent.id {
            Some(Role::Opponent)
        } else {
            None
        }
    }

    /// The participant record for `user`.
    #[must_use]
    pub fn participant(&self, user: UserId) -> Option<&Participant> {
        match self.role_of(user)? {
            Role::Challenger => Some(&self.challenger),
            Role::Opponent => Some(&self.opponent),
        }
    }

    /// The participant on the other side from `user`.
    #[must_use]
    pub fn rival_of(&self, user: UserId) -> Option<&Participant> {
        match self.role_of(user)? {
            Role::Challenger => Some(&self.opponent),
            Role::Opponent => Some(&self.challenger),
        }
    }

    /// Id of the participant facing `user`. Assumes `user` takes part.
    #[must_use]
    pub fn rival_id(&self, user: UserId) -> UserId {
        if user == self.challenger.id {
            self.opponent.id
        } else {
            self.challenger.id
        }
    }

    /// Both participant ids, challenger first.
    #[must_use]
    pub const fn participants(&self) -> [UserId; 2] {
        [self.challenger.id, self.opponent.id]
    }

    /// The most recent move made by `user`.
    #[must_use]
    pub fn last_move_by(&self, user: UserId) -> Option<&DuelMove> {
        self.move_log.iter().rev().find(|m| m.actor == user)
    }

    /// Winner, once a combat outcome is set.
    #[must_use]
    pub fn winner(&self) -> Option<UserId> {
        match self.outcome.verdict()? {
            Verdict::ChallengerWin => Some(self.challenger.id),
            Verdict::OpponentWin => Some(self.opponent.id),
            Verdict::Draw => None,
        }
    }

    /// Loser, once a combat outcome is set.
    #[must_use]
    pub fn loser(&self) -> Option<UserId> {
        match self.outcome.verdict()? {
            Verdict::ChallengerWin => Some(self.opponent.id),
            Verdict::OpponentWin => Some(self.challenger.id),
            Verdict::Draw => None,
        }
    }
}
