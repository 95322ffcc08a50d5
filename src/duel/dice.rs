//! Injected randomness for combat rolls.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::schema::DamageRange;

/// Source of combat randomness.
///
/// The resolver never touches a global RNG; every roll comes from here.
pub trait Dice: Send {
    /// Uniform roll in `range`, both ends inclusive.
    fn roll(&mut self, range: DamageRange) -> u32;

    /// Returns `true` with the given probability.
    fn chance(&mut self, probability: f64) -> bool;
}

/// `StdRng`-backed dice.
#[derive(Debug, Clone)]
pub struct SeededDice {
    rng: StdRng,
}

impl SeededDice {
    /// Reproducible dice from a fixed seed.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Dice seeded from the operating system.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Seeded when `seed` is set, entropy otherwise.
    #[must_use]
    pub fn from_config(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::from_seed)
    }
}

impl Dice for SeededDice {
    fn roll(&mut self, range: DamageRange) -> u32 {
        if range.min >= range.max {
            return range.min;
        }
        self.rng.random_range(range.min..=range.max)
    }

    fn chance(&mut self, probability: f64) -> bool {
        if probability.is_nan() {
            return false;
        }
        self.rng.random_bool(probability.clamp(0.0, 1.0))
    }
}

/// Dice that replay a fixed script.
///
/// Rolls are clamped into the requested range; an exhausted roll queue yields
/// the range minimum and an exhausted chance queue yields `false`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDice {
    rolls: VecDeque<u32>,
    chances: VecDeque<bool>,
}

impl ScriptedDice {
    /// Dice with the given roll script and no backfires.
    #[must_use]
    pub fn new(rolls: impl IntoIterator<Item = u32>) -> Self {
        Self {
            rolls: rolls.into_iter().collect(),
            chances: VecDeque::new(),
        }
    }

    /// Adds a script for [`Dice::chance`] outcomes.
    #[must_use]
    pub fn with_chances(mut self, chances: impl IntoIterator<Item = bool>) -> Self {
        self.chances = chances.into_iter().collect();
        self
    }
}

impl Dice for ScriptedDice {
    fn roll(&mut self, range: DamageRange) -> u32 {
        self.rolls
            .pop_front()
            .map_or(range.min, |roll| range.clamp(roll))
    }

    fn chance(&mut self, _probability: f64) -> bool {
        self.chances.pop_front().unwrap_or(false)
    }
}
