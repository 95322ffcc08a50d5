//! Duel session core
//!
//! Data model, combat resolution, session and cooldown tables, timers, and
//! the engine that drives a duel from challenge to outcome.

pub mod cooldown;
pub mod dice;
pub mod engine;
pub mod model;
pub mod resolver;
pub mod scheduler;
pub mod store;

pub use cooldown::CooldownTracker;
pub use dice::{Dice, ScriptedDice, SeededDice};
pub use engine::{DuelEngine, DuelSummary, Effect};
pub use model::{
    Action, DuelMove, DuelSession, GuildId, MoveKind, Outcome, Participant, SessionId,
    SessionState, Timestamp, UserId, Verdict,
};
pub use scheduler::{ManualScheduler, Scheduler, TimerFired, TimerKind, TokioScheduler};
pub use store::SessionStore;
