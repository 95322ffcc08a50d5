//! Configuration validation
//!
//! Semantic checks on a deserialized [`DuelJackConfig`]. Validation collects
//! every issue rather than stopping at the first, so a single run reports
//! all problems with a file.

use std::time::Duration;

use crate::config::schema::{DamageRange, DuelJackConfig, DuelSettings};
use crate::error::{Severity, ValidationIssue};

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns every issue found.
    pub fn validate(&mut self, config: &DuelJackConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_duel(&config.duel);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    fn validate_duel(&mut self, duel: &DuelSettings) {
        self.require_positive("duel.challenge_expiry", duel.challenge_expiry);
        self.require_positive("duel.max_duration", duel.max_duration);
        if duel.cooldown.is_zero() {
            self.warning("duel.cooldown", "cooldown is zero; users may chain duels back to back");
        }

        if duel.max_health == 0 {
            self.error("duel.max_health", "max_health must be greater than zero");
        }

        self.validate_range("duel.attack_damage", duel.attack_damage);
        self.validate_range("duel.special_damage", duel.special_damage);
        self.validate_range("duel.heal_amount", duel.heal_amount);

        if duel.max_health > 0 && duel.attack_damage.max >= duel.max_health {
            self.warning(
                "duel.attack_damage.max",
                "a single attack can knock out a full-health participant",
            );
        }
        if duel.special_damage.max < duel.attack_damage.max {
            self.warning(
                "duel.special_damage.max",
                "special hits no harder than a regular attack",
            );
        }

        self.require_percent("duel.heal_cap_percent", duel.heal_cap_percent);
        if duel.heal_cap_percent == 0 {
            self.error("duel.heal_cap_percent", "heal cap must be at least 1 percent");
        }
        self.require_percent("duel.defend_reduction_percent", duel.defend_reduction_percent);
        self.require_percent("duel.special_backfire_percent", duel.special_backfire_percent);

        let chance = duel.special_backfire_chance;
        if !(0.0..=1.0).contains(&chance) {
            self.error(
                "duel.special_backfire_chance",
                &format!("probability must be within [0, 1], got {chance}"),
            );
        }

        if duel.archive_capacity == 0 {
            self.warning(
                "duel.archive_capacity",
                "archive disabled; finished sessions will report not found instead of closed",
            );
        }
    }

    fn validate_range(&mut self, path: &str, range: DamageRange) {
        if range.min == 0 {
            self.error(path, "range minimum must be at least 1");
        }
        if range.min > range.max {
            self.error(
                path,
                &format!("range minimum {} exceeds maximum {}", range.min, range.max),
            );
        }
    }

    fn require_positive(&mut self, path: &str, value: Duration) {
        if value.is_zero() {
            self.error(path, "duration must be greater than zero");
        }
    }

    fn require_percent(&mut self, path: &str, value: u32) {
        if value > 100 {
            self.error(path, &format!("percentage must be at most 100, got {value}"));
        }
    }

    fn error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(duel: DuelSettings) -> ValidationResult {
        Validator::new().validate(&DuelJackConfig {
            duel,
            ..DuelJackConfig::default()
        })
    }

    #[test]
    fn test_defaults_are_clean() {
        let result = validate(DuelSettings::default());
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn test_collects_every_error() {
        let result = validate(DuelSettings {
            challenge_expiry: Duration::ZERO,
            max_health: 0,
            attack_damage: DamageRange::new(0, 5),
            heal_amount: DamageRange::new(9, 3),
            defend_reduction_percent: 150,
            special_backfire_chance: 1.5,
            ..DuelSettings::default()
        });
        let paths: Vec<&str> = result.errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"duel.challenge_expiry"));
        assert!(paths.contains(&"duel.max_health"));
        assert!(paths.contains(&"duel.attack_damage"));
        assert!(paths.contains(&"duel.heal_amount"));
        assert!(paths.contains(&"duel.defend_reduction_percent"));
        assert!(paths.contains(&"duel.special_backfire_chance"));
        assert!(result.errors.iter().all(|e| e.severity == Severity::Error));
    }

    #[test]
    fn test_nan_probability_rejected() {
        let result = validate(DuelSettings {
            special_backfire_chance: f64::NAN,
            ..DuelSettings::default()
        });
        assert!(result.has_errors());
    }

    #[test]
    fn test_warnings_do_not_fail() {
        let result = validate(DuelSettings {
            cooldown: Duration::ZERO,
            archive_capacity: 0,
            special_damage: DamageRange::new(5, 6),
            max_health: 10,
            ..DuelSettings::default()
        });
        assert!(result.is_valid(), "{:?}", result.errors);
        let paths: Vec<&str> = result.warnings.iter().map(|w| w.path.as_str()).collect();
        assert!(paths.contains(&"duel.cooldown"));
        assert!(paths.contains(&"duel.archive_capacity"));
        assert!(paths.contains(&"duel.special_damage.max"));
        assert!(paths.contains(&"duel.attack_damage.max"));
    }
}
