//! Configuration
//!
//! Loads and validates the YAML file that sets duel rules, the stats store,
//! and the event stream.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning};
pub use schema::{DamageRange, DuelJackConfig, DuelSettings, EventSettings, StatsSettings};
pub use validation::{ValidationResult, Validator};
