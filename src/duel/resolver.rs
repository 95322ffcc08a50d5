//! Combat resolution.
//!
//! [`validate_move`] decides whether a move is legal for the actor;
//! [`resolve`] computes its effect without touching the session. The engine
//! commits a [`Resolution`] only after both have run.

use crate::config::schema::DuelSettings;
use crate::duel::dice::Dice;
use crate::duel::model::{DuelMove, DuelSession, MoveKind, Participant, Role, Timestamp, Verdict};
use crate::error::DuelError;

/// Outcome of resolving one move: both participants as they stand afterwards
/// plus the log entry describing what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Challenger after the move
    pub challenger: Participant,
    /// Opponent after the move
    pub opponent: Participant,
    /// Entry to append to the move log
    pub record: DuelMove,
}

impl Resolution {
    /// Knockout verdict, if the move ended the duel.
    #[must_use]
    pub const fn knockout(&self) -> Option<Verdict> {
        knockout_verdict(&self.challenger, &self.opponent)
    }
}

/// Checks move-specific legality for `actor`.
///
/// Turn ownership and session state are the engine's concern; this only
/// covers the per-move rules.
///
/// # Errors
///
/// - [`DuelError::InvalidAction`] for a HEAL directly after the actor's own HEAL
/// - [`DuelError::SpecialAlreadyUsed`] for a second SPECIAL
pub fn validate_move(
    session: &DuelSession,
    actor: &Participant,
    kind: MoveKind,
) -> Result<(), DuelError> {
    match kind {
        MoveKind::Heal => {
            let healed_last = session
                .last_move_by(actor.id)
                .is_some_and(|m| m.kind == MoveKind::Heal);
            if healed_last {
                return Err(DuelError::invalid("cannot heal twice in a row"));
            }
        }
        MoveKind::Special if actor.special_used => return Err(DuelError::SpecialAlreadyUsed),
        MoveKind::Attack | MoveKind::Defend | MoveKind::Special => {}
    }
    Ok(())
}

/// Resolves a legal move by `actor`.
///
/// The defender's defense flag is consumed by whatever the actor does.
/// Damage against a defending participant is reduced by
/// `defend_reduction_percent`, rounding down but never below 1.
///
/// The caller must have run [`validate_move`] and must pass a participant of
/// `session` as `actor`.
pub fn resolve(
    settings: &DuelSettings,
    session: &DuelSession,
    actor: Role,
    kind: MoveKind,
    at: Timestamp,
    dice: &mut dyn Dice,
) -> Resolution {
    let (mut me, mut them) = match actor {
        Role::Challenger => (session.challenger.clone(), session.opponent.clone()),
        Role::Opponent => (session.opponent.clone(), session.challenger.clone()),
    };

    let shielded = std::mem::take(&mut them.defending);
    let mut amount = 0;
    let mut self_damage = 0;
    let mut mitigated = false;

    match kind {
        MoveKind::Attack => {
            let raw = dice.roll(settings.attack_damage);
            mitigated = shielded;
            amount = strike(settings, &mut me, &mut them, raw, shielded);
        }
        MoveKind::Defend => {
            me.defending = true;
        }
        MoveKind::Heal => {
            let cap = (settings.max_health.saturating_mul(settings.heal_cap_percent) / 100).max(1);
            let missing = settings.max_health.saturating_sub(me.health);
            amount = dice.roll(settings.heal_amount).min(cap).min(missing);
            me.health += amount;
        }
        MoveKind::Special => {
            me.special_used = true;
            let raw = dice.roll(settings.special_damage);
            mitigated = shielded;
            amount = strike(settings, &mut me, &mut them, raw, shielded);
            if amount > 0 && dice.chance(settings.special_backfire_chance) {
                let recoil = (amount.saturating_mul(settings.special_backfire_percent) / 100).max(1);
                self_damage = me.take_damage(recoil);
            }
        }
    }

    let (challenger, opponent) = match actor {
        Role::Challenger => (me, them),
        Role::Opponent => (them, me),
    };
    let record = DuelMove {
        turn: u32::try_from(session.move_log.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1),
        actor: match actor {
            Role::Challenger => challenger.id,
            Role::Opponent => opponent.id,
        },
        kind,
        amount,
        self_damage,
        mitigated,
        at,
        challenger_health: challenger.health,
        opponent_health: opponent.health,
    };

    Resolution {
        challenger,
        opponent,
        record,
    }
}

/// Applies a damage roll from `attacker` to `defender`, returning the health
/// actually removed.
fn strike(
    settings: &DuelSettings,
    attacker: &mut Participant,
    defender: &mut Participant,
    raw: u32,
    shielded: bool,
) -> u32 {
    let damage = if shielded {
        mitigate(raw, settings.defend_reduction_percent)
    } else {
        raw
    };
    let lost = defender.take_damage(damage);
    attacker.damage_dealt = attacker.damage_dealt.saturating_add(lost);
    lost
}

/// Reduces `raw` by `percent`, rounding down with a floor of 1.
#[must_use]
pub fn mitigate(raw: u32, percent: u32) -> u32 {
    let kept = 100u32.saturating_sub(percent.min(100));
    (raw.saturating_mul(kept) / 100).max(1)
}

/// Knockout verdict for the given participants: a single KO loses, a double
/// KO draws, and no KO means the duel continues.
#[must_use]
pub const fn knockout_verdict(challenger: &Participant, opponent: &Participant) -> Option<Verdict> {
    match (challenger.is_down(), opponent.is_down()) {
        (true, true) => Some(Verdict::Draw),
        (false, true) => Some(Verdict::ChallengerWin),
        (true, false) => Some(Verdict::OpponentWin),
        (false, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;
    use crate::duel::dice::ScriptedDice;
    use crate::duel::model::{GuildId, SessionId, UserId};

    fn at(secs: i64) -> Timestamp {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn active_session() -> DuelSession {
        let mut s = DuelSession::new(SessionId::new(), GuildId(0), UserId(1), UserId(2), 100, at(0));
        s.state = crate::duel::model::SessionState::Active;
        s.turn_owner = Some(UserId(1));
        s
    }

    fn commit(session: &mut DuelSession, r: Resolution) {
        session.challenger = r.challenger;
        session.opponent = r.opponent;
        session.move_log.push(r.record);
    }

    #[test]
    fn test_attack_reduces_opponent_health() {
        let settings = DuelSettings::default();
        let session = active_session();
        let mut dice = ScriptedDice::new([12]);
        let r = resolve(&settings, &session, Role::Challenger, MoveKind::Attack, at(10), &mut dice);
        assert_eq!(r.opponent.health, 88);
        assert_eq!(r.challenger.damage_dealt, 12);
        assert_eq!(r.opponent.damage_taken, 12);
        assert_eq!(r.record.amount, 12);
        assert_eq!(r.record.turn, 1);
        assert_eq!(r.record.actor, UserId(1));
        assert!(!r.record.mitigated);
        assert!(r.knockout().is_none());
    }

    #[test]
    fn test_defend_halves_next_hit_and_is_consumed() {
        let settings = DuelSettings::default();
        let mut session = active_session();
        let mut dice = ScriptedDice::new([12, 12]);

        let r = resolve(&settings, &session, Role::Opponent, MoveKind::Defend, at(12), &mut dice);
        assert!(r.opponent.defending);
        assert_eq!(r.record.amount, 0);
        commit(&mut session, r);

        let r = resolve(&settings, &session, Role::Challenger, MoveKind::Attack, at(15), &mut dice);
        assert_eq!(r.record.amount, 6);
        assert!(r.record.mitigated);
        assert!(!r.opponent.defending);
        assert_eq!(r.opponent.health, 94);
        commit(&mut session, r);

        let r = resolve(&settings, &session, Role::Challenger, MoveKind::Attack, at(16), &mut dice);
        assert_eq!(r.record.amount, 12);
    }

    #[test]
    fn test_defense_consumed_by_non_damaging_action() {
        let settings = DuelSettings::default();
        let mut session = active_session();
        session.opponent.defending = true;
        session.challenger.health = 50;
        let mut dice = ScriptedDice::new([10]);
        let r = resolve(&settings, &session, Role::Challenger, MoveKind::Heal, at(1), &mut dice);
        assert!(!r.opponent.defending);
        assert!(!r.record.mitigated);
        assert_eq!(r.challenger.health, 60);
    }

    #[test]
    fn test_mitigation_floor_is_one() {
        assert_eq!(mitigate(1, 50), 1);
        assert_eq!(mitigate(13, 50), 6);
        assert_eq!(mitigate(10, 100), 1);
        assert_eq!(mitigate(10, 0), 10);
        assert_eq!(mitigate(10, 250), 1);
    }

    #[test]
    fn test_heal_capped_by_percent_and_max_health() {
        let settings = DuelSettings {
            heal_amount: crate::config::schema::DamageRange::new(5, 40),
            ..DuelSettings::default()
        };
        let mut session = active_session();
        session.challenger.health = 40;
        let mut dice = ScriptedDice::new([40]);
        let r = resolve(&settings, &session, Role::Challenger, MoveKind::Heal, at(1), &mut dice);
        assert_eq!(r.record.amount, 25);
        assert_eq!(r.challenger.health, 65);

        session.challenger.health = 97;
        let mut dice = ScriptedDice::new([15]);
        let r = resolve(&settings, &session, Role::Challenger, MoveKind::Heal, at(2), &mut dice);
        assert_eq!(r.record.amount, 3);
        assert_eq!(r.challenger.health, 100);
    }

    #[test]
    fn test_heal_twice_in_a_row_rejected() {
        let settings = DuelSettings::default();
        let mut session = active_session();
        session.challenger.health = 50;
        let mut dice = ScriptedDice::new([5, 10]);
        let r = resolve(&settings, &session, Role::Challenger, MoveKind::Heal, at(1), &mut dice);
        commit(&mut session, r);
        let r = resolve(&settings, &session, Role::Opponent, MoveKind::Attack, at(2), &mut dice);
        commit(&mut session, r);

        let err = validate_move(&session, &session.challenger, MoveKind::Heal).unwrap_err();
        assert_eq!(err.kind(), "invalid_action");
        assert!(validate_move(&session, &session.opponent, MoveKind::Heal).is_ok());
        assert!(validate_move(&session, &session.challenger, MoveKind::Attack).is_ok());
    }

    #[test]
    fn test_special_once_per_participant() {
        let settings = DuelSettings::default();
        let mut session = active_session();
        let mut dice = ScriptedDice::new([22]);
        let r = resolve(&settings, &session, Role::Challenger, MoveKind::Special, at(1), &mut dice);
        assert_eq!(r.opponent.health, 78);
        assert!(r.challenger.special_used);
        commit(&mut session, r);

        assert_eq!(
            validate_move(&session, &session.challenger, MoveKind::Special),
            Err(DuelError::SpecialAlreadyUsed)
        );
        assert!(validate_move(&session, &session.opponent, MoveKind::Special).is_ok());
    }

    #[test]
    fn test_special_backfire_hurts_actor() {
        let settings = DuelSettings::default();
        let session = active_session();
        let mut dice = ScriptedDice::new([24]).with_chances([true]);
        let r = resolve(&settings, &session, Role::Opponent, MoveKind::Special, at(1), &mut dice);
        assert_eq!(r.challenger.health, 76);
        assert_eq!(r.record.self_damage, 6);
        assert_eq!(r.opponent.health, 94);
        assert_eq!(r.opponent.damage_taken, 6);
    }

    #[test]
    fn test_knockout_and_double_knockout() {
        let settings = DuelSettings::default();
        let mut session = active_session();
        session.opponent.health = 5;
        let mut dice = ScriptedDice::new([13]);
        let r = resolve(&settings, &session, Role::Challenger, MoveKind::Attack, at(1), &mut dice);
        assert_eq!(r.opponent.health, 0);
        assert_eq!(r.record.amount, 5);
        assert_eq!(r.knockout(), Some(Verdict::ChallengerWin));

        session.challenger.health = 1;
        let mut dice = ScriptedDice::new([25]).with_chances([true]);
        let r = resolve(&settings, &session, Role::Challenger, MoveKind::Special, at(2), &mut dice);
        assert_eq!(r.challenger.health, 0);
        assert_eq!(r.opponent.health, 0);
        assert_eq!(r.knockout(), Some(Verdict::Draw));
    }

    #[test]
    fn test_self_knockout_by_backfire_loses() {
        let settings = DuelSettings::default();
        let mut session = active_session();
        session.challenger.health = 2;
        let mut dice = ScriptedDice::new([20]).with_chances([true]);
        let r = resolve(&settings, &session, Role::Challenger, MoveKind::Special, at(1), &mut dice);
        assert_eq!(r.opponent.health, 80);
        assert_eq!(r.challenger.health, 0);
        assert_eq!(r.knockout(), Some(Verdict::OpponentWin));
    }
}
