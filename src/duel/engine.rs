//! Duel session engine
//!
//! Orchestrates the session lifecycle: validates each intent against the
//! session's state, delegates combat to the resolver, arms and disarms
//! timers, and records the outcome once a session finishes.
//!
//! Every transition of a session happens under that session's lock. A
//! session that leaves the live table is settled (cooldowns, archive,
//! eviction) before the lock is released; the stats write, metrics, and
//! events follow after it.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::schema::DuelSettings;
use crate::duel::cooldown::CooldownTracker;
use crate::duel::dice::Dice;
use crate::duel::model::{
    Action, DuelMove, DuelSession, GuildId, MoveKind, Outcome, Role, SessionId, SessionState,
    Timestamp, UserId, Verdict,
};
use crate::duel::resolver::{resolve, validate_move};
use crate::duel::scheduler::{Scheduler, TimerFired, TimerKind, deadline_after, elapsed};
use crate::duel::store::{Lookup, SessionStore};
use crate::error::{DuelError, StatsError};
use crate::observability::events::{Event, EventEmitter};
use crate::observability::metrics;
use crate::stats::{DamageTally, DuelResult, OutcomeRecord, StatsRepository, UserStats};

/// What an accepted intent did, for the transport to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    /// A challenge is now pending.
    Challenged {
        /// The new session
        session: DuelSession,
    },
    /// The challenge was accepted; combat begins.
    Started {
        /// The session, now active
        session: DuelSession,
    },
    /// A combat move resolved and the turn passed.
    Moved {
        /// The session after the move
        session: DuelSession,
        /// The move just appended
        resolved: DuelMove,
    },
    /// The session reached FINISHED.
    Finished {
        /// Final snapshot
        session: DuelSession,
        /// The deciding move, when a move ended the duel
        resolved: Option<DuelMove>,
        /// How it ended
        summary: DuelSummary,
    },
}

impl Effect {
    /// Session snapshot carried by every effect.
    #[must_use]
    pub const fn session(&self) -> &DuelSession {
        match self {
            Self::Challenged { session }
            | Self::Started { session }
            | Self::Moved { session, .. }
            | Self::Finished { session, .. } => session,
        }
    }
}

/// Final word on a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuelSummary {
    /// Terminal outcome
    pub outcome: Outcome,
    /// Winner, for a decided combat outcome
    pub winner: Option<UserId>,
    /// Loser, for a decided combat outcome
    pub loser: Option<UserId>,
    /// Moves played
    pub turns: usize,
    /// Whether the stats repository accepted the outcome
    pub stats_recorded: bool,
}

/// The duel session engine.
pub struct DuelEngine {
    settings: Arc<DuelSettings>,
    guild: GuildId,
    store: Arc<SessionStore>,
    cooldowns: Arc<CooldownTracker>,
    stats: Arc<dyn StatsRepository>,
    scheduler: Arc<dyn Scheduler>,
    dice: Mutex<Box<dyn Dice>>,
    events: Arc<EventEmitter>,
}

impl std::fmt::Debug for DuelEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuelEngine")
            .field("guild", &self.guild)
            .field("live", &self.store.live_count())
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl DuelEngine {
    /// Creates an engine with fresh session and cooldown tables sized from
    /// `settings`.
    #[must_use]
    pub fn new(
        settings: DuelSettings,
        stats: Arc<dyn StatsRepository>,
        scheduler: Arc<dyn Scheduler>,
        dice: Box<dyn Dice>,
    ) -> Self {
        let store = Arc::new(SessionStore::new(settings.archive_capacity));
        let cooldowns = Arc::new(CooldownTracker::new(settings.cooldown));
        Self {
            settings: Arc::new(settings),
            guild: GuildId::default(),
            store,
            cooldowns,
            stats,
            scheduler,
            dice: Mutex::new(dice),
            events: Arc::new(EventEmitter::noop()),
        }
    }

    /// Scopes stats reads and writes to `guild`.
    #[must_use]
    pub const fn with_guild(mut self, guild: GuildId) -> Self {
        self.guild = guild;
        self
    }

    /// Uses an existing session table.
    #[must_use]
    pub fn with_store(mut self, store: Arc<SessionStore>) -> Self {
        self.store = store;
        self
    }

    /// Uses an existing cooldown ledger.
    ///
    /// The ledger keeps its own window; a mismatch with the configured
    /// cooldown is logged.
    #[must_use]
    pub fn with_cooldowns(mut self, cooldowns: Arc<CooldownTracker>) -> Self {
        if cooldowns.window() != self.settings.cooldown {
            warn!(
                ledger = ?cooldowns.window(),
                configured = ?self.settings.cooldown,
                "shared cooldown ledger window differs from configured cooldown"
            );
        }
        self.cooldowns = cooldowns;
        self
    }

    /// Emits lifecycle events to `events`.
    #[must_use]
    pub fn with_events(mut self, events: Arc<EventEmitter>) -> Self {
        self.events = events;
        self
    }

    /// Rules this engine plays by.
    #[must_use]
    pub fn settings(&self) -> &DuelSettings {
        &self.settings
    }

    /// Guild scope.
    #[must_use]
    pub const fn guild(&self) -> GuildId {
        self.guild
    }

    /// Session table.
    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Cooldown ledger.
    #[must_use]
    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldowns
    }

    // ========================================================================
    // Intents
    // ========================================================================

    /// Issues a challenge from `challenger` to `opponent`.
    ///
    /// # Errors
    ///
    /// - [`DuelError::InvalidAction`] for a self-challenge
    /// - [`DuelError::OnCooldown`] while the challenger's cooldown runs
    /// - [`DuelError::AlreadyInDuel`] if either side holds a live session
    pub async fn challenge(
        &self,
        challenger: UserId,
        opponent: UserId,
        now: Timestamp,
    ) -> Result<Effect, DuelError> {
        let result = self.challenge_inner(challenger, opponent, now).await;
        record_result("challenge", &result);
        result
    }

    async fn challenge_inner(
        &self,
        challenger: UserId,
        opponent: UserId,
        now: Timestamp,
    ) -> Result<Effect, DuelError> {
        if challenger == opponent {
            return Err(DuelError::invalid("cannot challenge yourself"));
        }
        self.settle_overdue(challenger, now).await;
        self.settle_overdue(opponent, now).await;
        let pruned = self.cooldowns.prune(now);
        if pruned > 0 {
            debug!(pruned, remaining = self.cooldowns.len(), "cooldown entries expired");
        }
        self.cooldowns.check(challenger, now)?;

        let session = DuelSession::new(
            SessionId::new(),
            self.guild,
            challenger,
            opponent,
            self.settings.max_health,
            now,
        );
        let id = session.id;
        let deadline = deadline_after(now, self.settings.challenge_expiry);
        self.scheduler.schedule(
            id,
            TimerKind::ChallengeExpiry,
            deadline,
            self.settings.challenge_expiry,
        );
        if let Err(e) = self.store.insert(session.clone()) {
            self.scheduler.cancel(id, TimerKind::ChallengeExpiry);
            return Err(e);
        }

        info!(session_id = %id, %challenger, %opponent, "challenge issued");
        metrics::record_challenge();
        metrics::set_sessions_live(self.store.live_count());
        self.events.emit(Event::ChallengeIssued {
            timestamp: now,
            session_id: id,
            challenger,
            opponent,
        });
        Ok(Effect::Challenged { session })
    }

    /// Opponent accepts their pending challenge.
    ///
    /// # Errors
    ///
    /// See [`DuelEngine::apply`]; [`DuelError::SessionNotFound`] when
    /// `actor` has no live session.
    pub async fn accept(&self, actor: UserId, now: Timestamp) -> Result<Effect, DuelError> {
        self.act(actor, Action::Accept, now).await
    }

    /// Opponent declines their pending challenge.
    ///
    /// # Errors
    ///
    /// See [`DuelEngine::accept`].
    pub async fn decline(&self, actor: UserId, now: Timestamp) -> Result<Effect, DuelError> {
        self.act(actor, Action::Decline, now).await
    }

    /// Challenger withdraws their pending challenge.
    ///
    /// # Errors
    ///
    /// See [`DuelEngine::accept`].
    pub async fn cancel(&self, actor: UserId, now: Timestamp) -> Result<Effect, DuelError> {
        self.act(actor, Action::Cancel, now).await
    }

    /// Combat: ATTACK.
    ///
    /// # Errors
    ///
    /// See [`DuelEngine::accept`].
    pub async fn attack(&self, actor: UserId, now: Timestamp) -> Result<Effect, DuelError> {
        self.act(actor, Action::Move(MoveKind::Attack), now).await
    }

    /// Combat: DEFEND.
    ///
    /// # Errors
    ///
    /// See [`DuelEngine::accept`].
    pub async fn defend(&self, actor: UserId, now: Timestamp) -> Result<Effect, DuelError> {
        self.act(actor, Action::Move(MoveKind::Defend), now).await
    }

    /// Combat: HEAL.
    ///
    /// # Errors
    ///
    /// See [`DuelEngine::accept`].
    pub async fn heal(&self, actor: UserId, now: Timestamp) -> Result<Effect, DuelError> {
        self.act(actor, Action::Move(MoveKind::Heal), now).await
    }

    /// Combat: SPECIAL.
    ///
    /// # Errors
    ///
    /// See [`DuelEngine::accept`].
    pub async fn special(&self, actor: UserId, now: Timestamp) -> Result<Effect, DuelError> {
        self.act(actor, Action::Move(MoveKind::Special), now).await
    }

    /// Applies `action` to whichever live session `actor` takes part in.
    ///
    /// # Errors
    ///
    /// [`DuelError::SessionNotFound`] when `actor` has no live session,
    /// otherwise as [`DuelEngine::apply`].
    pub async fn act(
        &self,
        actor: UserId,
        action: Action,
        now: Timestamp,
    ) -> Result<Effect, DuelError> {
        let Some(session_id) = self.store.session_id_for(actor) else {
            debug!(%actor, action = action.label(), "no live duel for actor");
            metrics::record_action(action.label(), DuelError::SessionNotFound.kind());
            return Err(DuelError::SessionNotFound);
        };
        self.apply(session_id, actor, action, now).await
    }

    /// Applies `action` by `actor` to the session `session_id`.
    ///
    /// Overdue deadlines are enforced first: an expired challenge yields
    /// [`DuelError::SessionNotFound`], a timed-out duel yields
    /// [`DuelError::SessionClosed`].
    ///
    /// # Errors
    ///
    /// - [`DuelError::SessionNotFound`] for an unknown or destroyed session
    /// - [`DuelError::SessionClosed`] for a combat-finished session
    /// - [`DuelError::InvalidAction`] for a non-participant or an action not
    ///   legal in the session's state
    /// - [`DuelError::NotYourTurn`] for a move out of turn
    /// - [`DuelError::SpecialAlreadyUsed`] for a second SPECIAL
    pub async fn apply(
        &self,
        session_id: SessionId,
        actor: UserId,
        action: Action,
        now: Timestamp,
    ) -> Result<Effect, DuelError> {
        let result = self.apply_inner(session_id, actor, action, now).await;
        if let Err(e) = &result {
            debug!(%session_id, %actor, action = action.label(), error = %e, "intent rejected");
        }
        record_result(action.label(), &result);
        result
    }

    async fn apply_inner(
        &self,
        session_id: SessionId,
        actor: UserId,
        action: Action,
        now: Timestamp,
    ) -> Result<Effect, DuelError> {
        let handle = match self.store.lookup(session_id) {
            Lookup::Live(handle) => handle,
            Lookup::Archived(_) => return Err(DuelError::SessionClosed { session_id }),
            Lookup::Missing => return Err(DuelError::SessionNotFound),
        };
        let mut session = handle.lock().await;

        if session.state == SessionState::Finished {
            return Err(closed_error(&session));
        }

        if let Some(outcome) = self.overdue_outcome(&session, now) {
            let snapshot = self.finish_locked(&mut session, outcome, now);
            drop(session);
            let summary = self.after_finish(&snapshot, now).await;
            debug!(%session_id, outcome = summary.outcome.label(), "deadline enforced on intent");
            return Err(closed_error(&snapshot));
        }

        let Some(role) = session.role_of(actor) else {
            return Err(DuelError::invalid("not a participant in this duel"));
        };

        match (session.state, action) {
            (SessionState::Pending, Action::Accept) => {
                if role != Role::Opponent {
                    return Err(DuelError::invalid("only the challenged user can accept"));
                }
                Ok(self.start_locked(&mut session, now))
            }
            (SessionState::Pending, Action::Decline) => {
                if role != Role::Opponent {
                    return Err(DuelError::invalid("only the challenged user can decline"));
                }
                let snapshot = self.finish_locked(&mut session, Outcome::Declined, now);
                drop(session);
                Ok(self.finished_effect(snapshot, None, now).await)
            }
            (SessionState::Pending, Action::Cancel) => {
                if role != Role::Challenger {
                    return Err(DuelError::invalid("only the challenger can cancel"));
                }
                let snapshot = self.finish_locked(&mut session, Outcome::Cancelled, now);
                drop(session);
                Ok(self.finished_effect(snapshot, None, now).await)
            }
            (SessionState::Pending, Action::Move(_)) => {
                Err(DuelError::invalid("the duel has not started yet"))
            }
            (SessionState::Active, Action::Accept | Action::Decline | Action::Cancel) => {
                Err(DuelError::invalid("the duel is already under way"))
            }
            (SessionState::Active, Action::Move(kind)) => {
                if session.turn_owner != Some(actor) {
                    let turn_owner = session.turn_owner.unwrap_or_else(|| session.rival_id(actor));
                    return Err(DuelError::NotYourTurn { turn_owner });
                }
                let me = match role {
                    Role::Challenger => &session.challenger,
                    Role::Opponent => &session.opponent,
                };
                validate_move(&session, me, kind)?;

                let resolution = {
                    let mut dice = self.dice.lock().unwrap_or_else(PoisonError::into_inner);
                    resolve(&self.settings, &session, role, kind, now, dice.as_mut())
                };
                let verdict = resolution.knockout();
                let record = resolution.record.clone();
                session.challenger = resolution.challenger;
                session.opponent = resolution.opponent;
                session.move_log.push(record.clone());
                session.last_action_at = now;

                info!(
                    %session_id,
                    %actor,
                    action = kind.label(),
                    amount = record.amount,
                    self_damage = record.self_damage,
                    challenger_health = record.challenger_health,
                    opponent_health = record.opponent_health,
                    "move resolved"
                );
                self.events.emit(Event::MoveResolved {
                    timestamp: now,
                    session_id,
                    turn: record.turn,
                    actor,
                    kind,
                    amount: record.amount,
                    self_damage: record.self_damage,
                    challenger_health: record.challenger_health,
                    opponent_health: record.opponent_health,
                });

                if let Some(verdict) = verdict {
                    let snapshot =
                        self.finish_locked(&mut session, Outcome::from_verdict(verdict), now);
                    drop(session);
                    return Ok(self.finished_effect(snapshot, Some(record), now).await);
                }

                session.turn_owner = Some(session.rival_id(actor));
                Ok(Effect::Moved {
                    session: session.clone(),
                    resolved: record,
                })
            }
            (SessionState::Finished, _) => Err(closed_error(&session)),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// The live session `user` takes part in.
    ///
    /// Overdue deadlines are enforced first, so an expired or timed-out
    /// session is reported as gone.
    ///
    /// # Errors
    ///
    /// [`DuelError::SessionNotFound`] when `user` has no live session.
    pub async fn status(&self, user: UserId, now: Timestamp) -> Result<DuelSession, DuelError> {
        self.settle_overdue(user, now).await;
        let (_, handle) = self
            .store
            .session_for(user)
            .ok_or(DuelError::SessionNotFound)?;
        let session = handle.lock().await;
        if session.is_live() {
            Ok(session.clone())
        } else {
            Err(DuelError::SessionNotFound)
        }
    }

    /// Snapshot of a live or archived session by id.
    ///
    /// # Errors
    ///
    /// [`DuelError::SessionNotFound`] for an unknown or destroyed session.
    pub async fn session(&self, session_id: SessionId) -> Result<DuelSession, DuelError> {
        match self.store.lookup(session_id) {
            Lookup::Live(handle) => Ok(handle.lock().await.clone()),
            Lookup::Archived(session) => Ok(*session),
            Lookup::Missing => Err(DuelError::SessionNotFound),
        }
    }

    /// True iff `user` holds no live session and is off cooldown.
    #[must_use]
    pub fn can_challenge(&self, user: UserId, now: Timestamp) -> bool {
        self.cooldowns.can_challenge(&self.store, user, now)
    }

    /// Stats for `user` in this engine's guild.
    ///
    /// # Errors
    ///
    /// Propagates repository read failures.
    pub async fn stats(&self, user: UserId) -> Result<Option<UserStats>, StatsError> {
        self.stats.get_stats(self.guild, user).await
    }

    /// Leaderboard for this engine's guild.
    ///
    /// # Errors
    ///
    /// Propagates repository read failures.
    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<UserStats>, StatsError> {
        self.stats.get_leaderboard(self.guild, limit).await
    }

    // ========================================================================
    // Timers
    // ========================================================================

    /// Applies a fired timer.
    ///
    /// Returns the resulting effect, or `None` when the timer is stale
    /// (session gone, or no longer in the state the timer guards).
    pub async fn handle_timer(&self, fired: TimerFired) -> Option<Effect> {
        let kind = fired.kind.label();
        let Some(handle) = self.store.get(fired.session_id) else {
            debug!(session_id = %fired.session_id, kind, "stale timer: session gone");
            metrics::record_timer_fire(kind, "stale");
            return None;
        };
        let mut session = handle.lock().await;
        let outcome = match (fired.kind, session.state) {
            (TimerKind::ChallengeExpiry, SessionState::Pending) => Outcome::Expired,
            (TimerKind::DurationLimit, SessionState::Active) => timed_out(&session),
            (_, state) => {
                debug!(session_id = %fired.session_id, kind, ?state, "stale timer: state moved on");
                metrics::record_timer_fire(kind, "stale");
                return None;
            }
        };

        metrics::record_timer_fire(kind, "applied");
        let snapshot = self.finish_locked(&mut session, outcome, fired.deadline);
        drop(session);
        Some(self.finished_effect(snapshot, None, fired.deadline).await)
    }

    /// Feeds fired timers into [`DuelEngine::handle_timer`] until `cancel`
    /// fires or the channel closes.
    pub async fn drive_timers(
        &self,
        mut timers: mpsc::UnboundedReceiver<TimerFired>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("timer driver cancelled");
                    break;
                }
                fired = timers.recv() => {
                    let Some(fired) = fired else {
                        debug!("timer channel closed");
                        break;
                    };
                    self.handle_timer(fired).await;
                }
            }
        }
    }

    /// Spawns [`DuelEngine::drive_timers`] on the current runtime.
    pub fn spawn_timer_driver(
        self: &Arc<Self>,
        timers: mpsc::UnboundedReceiver<TimerFired>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.drive_timers(timers, cancel).await })
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    fn start_locked(&self, session: &mut DuelSession, now: Timestamp) -> Effect {
        let id = session.id;
        session.state = SessionState::Active;
        session.started_at = Some(now);
        session.last_action_at = now;
        session.turn_owner = Some(session.challenger.id);

        self.scheduler.cancel(id, TimerKind::ChallengeExpiry);
        let deadline = deadline_after(session.created_at, self.settings.max_duration);
        self.scheduler
            .schedule(id, TimerKind::DurationLimit, deadline, elapsed(now, deadline));

        info!(session_id = %id, turn_owner = %session.challenger.id, "duel started");
        self.events.emit(Event::DuelStarted {
            timestamp: now,
            session_id: id,
            turn_owner: session.challenger.id,
        });
        Effect::Started {
            session: session.clone(),
        }
    }

    /// Terminal transition under the session lock. Returns the final snapshot.
    fn finish_locked(&self, session: &mut DuelSession, outcome: Outcome, at: Timestamp) -> DuelSession {
        session.state = SessionState::Finished;
        session.outcome = outcome;
        session.ended_at = Some(at);
        session.turn_owner = None;

        self.scheduler.cancel_all(session.id);
        if outcome.is_combat() {
            for user in session.participants() {
                self.cooldowns.record_completion(user, at);
            }
            self.store.archive(session.clone());
        }
        self.store.evict(session);
        session.clone()
    }

    /// Post-lock bookkeeping for a finished session.
    async fn after_finish(&self, session: &DuelSession, at: Timestamp) -> DuelSummary {
        let outcome = session.outcome;
        metrics::record_duel_finished(outcome.label());
        metrics::set_sessions_live(self.store.live_count());
        info!(
            session_id = %session.id,
            outcome = outcome.label(),
            winner = ?session.winner(),
            turns = session.move_log.len(),
            "duel finished"
        );

        let mut stats_recorded = false;
        if outcome.is_combat() {
            metrics::record_duel_turns(session.move_log.len());
            self.events.emit(Event::DuelFinished {
                timestamp: at,
                session_id: session.id,
                outcome,
                winner: session.winner(),
                turns: session.move_log.len(),
            });
            if let Some(record) = outcome_record(session, at) {
                match self.stats.record_outcome(&record).await {
                    Ok(()) => stats_recorded = true,
                    Err(e) => {
                        error!(session_id = %session.id, error = %e, "failed to record duel outcome");
                        metrics::record_stats_error();
                    }
                }
            }
        } else {
            self.events.emit(Event::ChallengeClosed {
                timestamp: at,
                session_id: session.id,
                outcome,
            });
        }

        DuelSummary {
            outcome,
            winner: session.winner(),
            loser: session.loser(),
            turns: session.move_log.len(),
            stats_recorded,
        }
    }

    async fn finished_effect(
        &self,
        session: DuelSession,
        resolved: Option<DuelMove>,
        at: Timestamp,
    ) -> Effect {
        let summary = self.after_finish(&session, at).await;
        Effect::Finished {
            session,
            resolved,
            summary,
        }
    }

    /// Finishes `user`'s live session if one of its deadlines has passed.
    async fn settle_overdue(&self, user: UserId, now: Timestamp) {
        let Some((_, handle)) = self.store.session_for(user) else {
            return;
        };
        let mut session = handle.lock().await;
        if session.state == SessionState::Finished {
            return;
        }
        let Some(outcome) = self.overdue_outcome(&session, now) else {
            return;
        };
        let snapshot = self.finish_locked(&mut session, outcome, now);
        drop(session);
        self.after_finish(&snapshot, now).await;
    }

    fn overdue_outcome(&self, session: &DuelSession, now: Timestamp) -> Option<Outcome> {
        match session.state {
            SessionState::Pending
                if now >= deadline_after(session.created_at, self.settings.challenge_expiry) =>
            {
                Some(Outcome::Expired)
            }
            SessionState::Active
                if now >= deadline_after(session.created_at, self.settings.max_duration) =>
            {
                Some(timed_out(session))
            }
            _ => None,
        }
    }
}

fn timed_out(session: &DuelSession) -> Outcome {
    Outcome::TimedOut {
        verdict: Verdict::by_health(session.challenger.health, session.opponent.health),
    }
}

/// Error for an intent against a session that already finished.
fn closed_error(session: &DuelSession) -> DuelError {
    if session.outcome.is_combat() {
        DuelError::SessionClosed {
            session_id: session.id,
        }
    } else {
        DuelError::SessionNotFound
    }
}

fn outcome_record(session: &DuelSession, at: Timestamp) -> Option<OutcomeRecord> {
    let result = match session.outcome.verdict()? {
        Verdict::Draw => DuelResult::Draw,
        Verdict::ChallengerWin => DuelResult::Win {
            winner: session.challenger.id,
            loser: session.opponent.id,
        },
        Verdict::OpponentWin => DuelResult::Win {
            winner: session.opponent.id,
            loser: session.challenger.id,
        },
    };
    Some(OutcomeRecord {
        guild: session.guild,
        session_id: session.id,
        challenger: session.challenger.id,
        opponent: session.opponent.id,
        result,
        challenger_damage: DamageTally {
            dealt: session.challenger.damage_dealt,
            taken: session.challenger.damage_taken,
        },
        opponent_damage: DamageTally {
            dealt: session.opponent.damage_dealt,
            taken: session.opponent.damage_taken,
        },
        finished_at: at,
    })
}

fn record_result(action: &'static str, result: &Result<Effect, DuelError>) {
    let label = match result {
        Ok(_) => metrics::RESULT_OK,
        Err(e) => e.kind(),
    };
    metrics::record_action(action, label);
}
