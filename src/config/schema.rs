//! Configuration schema
//!
//! Typed view of the YAML configuration file. Every field has a default,
//! so an empty mapping (or a missing section) yields the stock ruleset.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duel::model::GuildId;

// ============================================================================
// Root
// ============================================================================

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DuelJackConfig {
    /// Combat and timing rules
    pub duel: DuelSettings,

    /// Stats repository wiring
    pub stats: StatsSettings,

    /// Structured event stream
    pub events: EventSettings,
}

// ============================================================================
// Duel Rules
// ============================================================================

/// Inclusive integer range for a dice roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DamageRange {
    /// Lowest possible roll
    pub min: u32,
    /// Highest possible roll
    pub max: u32,
}

impl DamageRange {
    /// Creates a range. No ordering check; see the validator.
    #[must_use]
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Clamps `value` into this range.
    #[must_use]
    pub fn clamp(self, value: u32) -> u32 {
        value.clamp(self.min, self.max.max(self.min))
    }
}

/// Rules a session is played under. Frozen for the lifetime of an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DuelSettings {
    /// How long a challenge waits for an answer
    #[serde(with = "duration_serde")]
    pub challenge_expiry: Duration,

    /// Minimum gap between finishing a duel and issuing a new challenge
    #[serde(with = "duration_serde")]
    pub cooldown: Duration,

    /// Longest a duel may run, measured from the challenge
    #[serde(with = "duration_serde")]
    pub max_duration: Duration,

    /// Starting and maximum health
    pub max_health: u32,

    /// ATTACK damage roll
    pub attack_damage: DamageRange,

    /// SPECIAL damage roll
    pub special_damage: DamageRange,

    /// HEAL roll
    pub heal_amount: DamageRange,

    /// Largest single heal as a percentage of `max_health`
    pub heal_cap_percent: u32,

    /// Damage reduction applied to a hit against a defending participant
    pub defend_reduction_percent: u32,

    /// Probability that SPECIAL also hurts its user
    pub special_backfire_chance: f64,

    /// Backfire damage as a percentage of the damage dealt
    pub special_backfire_percent: u32,

    /// Number of combat-finished sessions kept for lookup
    pub archive_capacity: usize,

    /// Fixed RNG seed; `None` draws from OS entropy
    pub rng_seed: Option<u64>,
}

impl Default for DuelSettings {
    fn default() -> Self {
        Self {
            challenge_expiry: Duration::from_secs(60),
            cooldown: Duration::from_secs(300),
            max_duration: Duration::from_secs(900),
            max_health: 100,
            attack_damage: DamageRange::new(8, 13),
            special_damage: DamageRange::new(20, 25),
            heal_amount: DamageRange::new(5, 15),
            heal_cap_percent: 25,
            defend_reduction_percent: 50,
            special_backfire_chance: 0.3,
            special_backfire_percent: 25,
            archive_capacity: 1024,
            rng_seed: None,
        }
    }
}

// ============================================================================
// Stats / Events
// ============================================================================

/// Where finished duels are recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatsSettings {
    /// JSON snapshot file; in-memory when absent
    pub path: Option<PathBuf>,

    /// Guild scope the harness runs under
    pub guild: GuildId,
}

/// JSONL duel event stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventSettings {
    /// Destination file; events are discarded when absent
    pub path: Option<PathBuf>,
}

// ============================================================================
// Duration (de)serialization
// ============================================================================

/// Human-friendly durations such as `"60s"` or `"5m"`.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: DuelJackConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, DuelJackConfig::default());
        assert_eq!(config.duel.challenge_expiry, Duration::from_secs(60));
        assert_eq!(config.duel.cooldown, Duration::from_secs(300));
        assert!(config.stats.path.is_none());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let yaml = "duel:\n  cooldown: 2m\n  attack_damage: { min: 12, max: 12 }\n";
        let config: DuelJackConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.duel.cooldown, Duration::from_secs(120));
        assert_eq!(config.duel.attack_damage, DamageRange::new(12, 12));
        assert_eq!(config.duel.max_health, 100);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<DuelJackConfig, _> = serde_yaml::from_str("duel:\n  max_hp: 10\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_duration_rejected() {
        let result: Result<DuelJackConfig, _> =
            serde_yaml::from_str("duel:\n  cooldown: soon\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_duration_serializes_human_readable() {
        let yaml = serde_yaml::to_string(&DuelSettings::default()).unwrap();
        assert!(yaml.contains("cooldown: 5m"), "{yaml}");
        assert!(yaml.contains("challenge_expiry: 1m"), "{yaml}");
    }

    #[test]
    fn test_range_clamp() {
        let range = DamageRange::new(5, 15);
        assert_eq!(range.clamp(1), 5);
        assert_eq!(range.clamp(9), 9);
        assert_eq!(range.clamp(99), 15);
    }
}
