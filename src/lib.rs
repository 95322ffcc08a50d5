//! `DuelJack` - turn-based duel session engine for chat bots
//!
//! This library owns the duel lifecycle (challenge, acceptance, alternating
//! combat turns, timeouts, cooldowns) and reports outcomes to a pluggable
//! stats repository. Transports deliver already-authenticated intents to
//! [`duel::DuelEngine`]; the bundled binary does so over line-delimited JSON
//! on stdio.

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod duel;
pub mod error;
pub mod observability;
pub mod stats;
