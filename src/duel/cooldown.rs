//! Per-user cooldown ledger.

use std::time::Duration;

use dashmap::DashMap;

use crate::duel::model::{Timestamp, UserId};
use crate::duel::scheduler::elapsed;
use crate::duel::store::SessionStore;
use crate::error::DuelError;

/// Last combat completion per user.
#[derive(Debug)]
pub struct CooldownTracker {
    window: Duration,
    last_completion: DashMap<UserId, Timestamp>,
}

impl CooldownTracker {
    /// Creates a tracker with the given cooldown window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_completion: DashMap::new(),
        }
    }

    /// Configured window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Stamps a combat completion for `user`.
    pub fn record_completion(&self, user: UserId, at: Timestamp) {
        self.last_completion.insert(user, at);
    }

    /// Last recorded completion for `user`.
    #[must_use]
    pub fn last_completion(&self, user: UserId) -> Option<Timestamp> {
        self.last_completion.get(&user).map(|entry| *entry.value())
    }

    /// Time left before `user` may challenge again, or `None` when clear.
    ///
    /// A clock that reads earlier than the recorded completion counts as
    /// zero elapsed time.
    #[must_use]
    pub fn remaining(&self, user: UserId, now: Timestamp) -> Option<Duration> {
        let last = self.last_completion(user)?;
        let waited = elapsed(last, now);
        (waited < self.window).then(|| self.window - waited)
    }

    /// Rejects `user` while their cooldown runs.
    ///
    /// # Errors
    ///
    /// Returns [`DuelError::OnCooldown`] with the remaining wait in whole
    /// seconds, rounded up.
    pub fn check(&self, user: UserId, now: Timestamp) -> Result<(), DuelError> {
        match self.remaining(user, now) {
            Some(left) => Err(DuelError::OnCooldown {
                remaining_secs: ceil_secs(left),
            }),
            None => Ok(()),
        }
    }

    /// True iff `user` holds no live session and is off cooldown.
    #[must_use]
    pub fn can_challenge(&self, store: &SessionStore, user: UserId, now: Timestamp) -> bool {
        store.session_id_for(user).is_none() && self.remaining(user, now).is_none()
    }

    /// Forgets entries whose window has fully passed.
    pub fn prune(&self, now: Timestamp) -> usize {
        let before = self.last_completion.len();
        self.last_completion
            .retain(|_, last| elapsed(*last, now) < self.window);
        before - self.last_completion.len()
    }

    /// Number of users with a recorded completion.
    #[must_use]
    pub fn len(&self) -> usize {
        self.last_completion.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last_completion.is_empty()
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 { secs + 1 } else { secs }
}
