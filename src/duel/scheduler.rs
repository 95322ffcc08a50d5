//! Deferred session timers.
//!
//! Each session carries at most two timers: challenge expiry while pending
//! and the duration limit while active. A fired timer is delivered as a
//! [`TimerFired`] message; the engine re-validates the session before acting
//! on it, so late or duplicate deliveries are harmless.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::duel::model::{SessionId, Timestamp};

/// Which deadline a timer enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Pending challenge not answered in time
    ChallengeExpiry,
    /// Active duel ran too long
    DurationLimit,
}

impl TimerKind {
    /// Every timer kind.
    pub const ALL: [Self; 2] = [Self::ChallengeExpiry, Self::DurationLimit];

    /// Stable label used in metrics and logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ChallengeExpiry => "challenge_expiry",
            Self::DurationLimit => "duration_limit",
        }
    }
}

/// A timer that reached its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    /// Session the timer belongs to
    pub session_id: SessionId,
    /// Deadline kind
    pub kind: TimerKind,
    /// The deadline itself; used as the transition timestamp
    pub deadline: Timestamp,
}

/// Issues and cancels session timers.
pub trait Scheduler: Send + Sync + fmt::Debug {
    /// Arms (or re-arms) the `kind` timer for `session_id`.
    ///
    /// `delay` is the wait from the scheduling intent's timestamp to
    /// `deadline`.
    fn schedule(&self, session_id: SessionId, kind: TimerKind, deadline: Timestamp, delay: Duration);

    /// Disarms the `kind` timer for `session_id`, if armed.
    fn cancel(&self, session_id: SessionId, kind: TimerKind);

    /// Disarms every timer for `session_id`.
    fn cancel_all(&self, session_id: SessionId) {
        for kind in TimerKind::ALL {
            self.cancel(session_id, kind);
        }
    }

    /// Number of armed timers.
    fn pending(&self) -> usize;
}

type TimerKey = (SessionId, TimerKind);

// ============================================================================
// Tokio Scheduler
// ============================================================================

/// One `tokio` task per armed timer.
///
/// Fired timers are sent to the receiver returned by [`TokioScheduler::new`];
/// feed that into [`DuelEngine::drive_timers`](crate::duel::engine::DuelEngine::drive_timers).
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<TimerFired>,
    timers: Arc<DashMap<TimerKey, (u64, CancellationToken)>>,
    generation: AtomicU64,
    shutdown: CancellationToken,
}

impl fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("pending", &self.timers.len())
            .finish_non_exhaustive()
    }
}

impl TokioScheduler {
    /// Creates a scheduler and the channel its timers fire into.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            tx,
            timers: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        };
        (scheduler, rx)
    }

    /// Disarms every timer. Later `schedule` calls are ignored.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.timers.clear();
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, session_id: SessionId, kind: TimerKind, deadline: Timestamp, delay: Duration) {
        if self.shutdown.is_cancelled() {
            debug!(%session_id, kind = kind.label(), "scheduler shut down, timer dropped");
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(%session_id, kind = kind.label(), "no tokio runtime, timer dropped");
            return;
        };

        let key = (session_id, kind);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let token = self.shutdown.child_token();
        if let Some((_, previous)) = self.timers.insert(key, (generation, token.clone())) {
            previous.cancel();
        }

        let tx = self.tx.clone();
        let timers = Arc::clone(&self.timers);
        runtime.spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    timers.remove_if(&key, |_, (armed, _)| *armed == generation);
                    let _ = tx.send(TimerFired { session_id, kind, deadline });
                }
            }
        });
    }

    fn cancel(&self, session_id: SessionId, kind: TimerKind) {
        if let Some((_, (_, token))) = self.timers.remove(&(session_id, kind)) {
            token.cancel();
        }
    }

    fn pending(&self) -> usize {
        self.timers.len()
    }
}

// ============================================================================
// Manual Scheduler
// ============================================================================

/// Deadline table drained explicitly with [`ManualScheduler::due`].
///
/// Used by tests and deterministic replays, where the caller owns the clock.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    deadlines: Mutex<HashMap<TimerKey, Timestamp>>,
}

impl ManualScheduler {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns every timer whose deadline is at or before `now`,
    /// earliest first.
    pub fn due(&self, now: Timestamp) -> Vec<TimerFired> {
        let mut deadlines = self.deadlines.lock().unwrap_or_else(PoisonError::into_inner);
        let mut fired: Vec<TimerFired> = deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(&(session_id, kind), &deadline)| TimerFired {
                session_id,
                kind,
                deadline,
            })
            .collect();
        for timer in &fired {
            deadlines.remove(&(timer.session_id, timer.kind));
        }
        drop(deadlines);
        fired.sort_by_key(|t| t.deadline);
        fired
    }

    /// Armed deadline for a timer.
    #[must_use]
    pub fn deadline(&self, session_id: SessionId, kind: TimerKind) -> Option<Timestamp> {
        self.deadlines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(session_id, kind))
            .copied()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, session_id: SessionId, kind: TimerKind, deadline: Timestamp, _delay: Duration) {
        self.deadlines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((session_id, kind), deadline);
    }

    fn cancel(&self, session_id: SessionId, kind: TimerKind) {
        self.deadlines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(session_id, kind));
    }

    fn pending(&self) -> usize {
        self.deadlines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

// ============================================================================
// Clock helpers
// ============================================================================

/// `from + window`, saturating at the latest representable instant.
#[must_use]
pub fn deadline_after(from: Timestamp, window: Duration) -> Timestamp {
    TimeDelta::from_std(window)
        .ok()
        .and_then(|delta| from.checked_add_signed(delta))
        .unwrap_or(DateTime::<chrono::Utc>::MAX_UTC)
}

/// Time from `since` to `now`; zero when `now` is earlier.
#[must_use]
pub fn elapsed(since: Timestamp, now: Timestamp) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> Timestamp {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_manual_due_is_inclusive_and_ordered() {
        let scheduler = ManualScheduler::new();
        let a = SessionId::new();
        let b = SessionId::new();
        scheduler.schedule(a, TimerKind::DurationLimit, at(90), Duration::ZERO);
        scheduler.schedule(b, TimerKind::ChallengeExpiry, at(60), Duration::ZERO);

        assert!(scheduler.due(at(59)).is_empty());
        let fired = scheduler.due(at(90));
        assert_eq!(fired.len(), 2);
        assert_eq!(fired[0].session_id, b);
        assert_eq!(fired[1].session_id, a);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_manual_cancel_and_rearm() {
        let scheduler = ManualScheduler::new();
        let id = SessionId::new();
        scheduler.schedule(id, TimerKind::ChallengeExpiry, at(60), Duration::ZERO);
        scheduler.schedule(id, TimerKind::ChallengeExpiry, at(70), Duration::ZERO);
        assert_eq!(scheduler.deadline(id, TimerKind::ChallengeExpiry), Some(at(70)));
        scheduler.schedule(id, TimerKind::DurationLimit, at(900), Duration::ZERO);
        scheduler.cancel_all(id);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_fires_after_delay() {
        let (scheduler, mut rx) = TokioScheduler::new();
        let id = SessionId::new();
        scheduler.schedule(id, TimerKind::ChallengeExpiry, at(60), Duration::from_secs(60));
        assert_eq!(scheduler.pending(), 1);

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(rx.try_recv().is_err());

        let fired = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fired.session_id, id);
        assert_eq!(fired.kind, TimerKind::ChallengeExpiry);
        assert_eq!(fired.deadline, at(60));
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_cancelled_timer_never_fires() {
        let (scheduler, mut rx) = TokioScheduler::new();
        let id = SessionId::new();
        scheduler.schedule(id, TimerKind::DurationLimit, at(10), Duration::from_secs(10));
        scheduler.cancel(id, TimerKind::DurationLimit);
        assert_eq!(scheduler.pending(), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_shutdown_disarms_everything() {
        let (scheduler, mut rx) = TokioScheduler::new();
        scheduler.schedule(SessionId::new(), TimerKind::ChallengeExpiry, at(1), Duration::from_secs(1));
        scheduler.shutdown();
        scheduler.schedule(SessionId::new(), TimerKind::ChallengeExpiry, at(1), Duration::from_secs(1));
        assert_eq!(scheduler.pending(), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_clock_helpers() {
        assert_eq!(deadline_after(at(0), Duration::from_secs(60)), at(60));
        assert_eq!(deadline_after(at(0), Duration::MAX), DateTime::<chrono::Utc>::MAX_UTC);
        assert_eq!(elapsed(at(10), at(25)), Duration::from_secs(15));
        assert_eq!(elapsed(at(25), at(10)), Duration::ZERO);
    }
}
