//! Session store
//!
//! Owns every live session plus a bounded archive of combat-finished ones.
//! The participant index is a single critical section so that the
//! "at most one live session per user" check and the insert are atomic.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;

use crate::duel::model::{DuelSession, SessionId, UserId};
use crate::error::DuelError;

/// Handle to one live session. Transitions take this lock.
pub type SessionHandle = Arc<tokio::sync::Mutex<DuelSession>>;

/// Where an id lookup landed.
#[derive(Debug, Clone)]
pub enum Lookup {
    /// The session is pending or active.
    Live(SessionHandle),
    /// The session finished by combat and was archived.
    Archived(Box<DuelSession>),
    /// Never existed, or was destroyed without archiving.
    Missing,
}

/// Live session table, participant index and archive.
#[derive(Debug)]
pub struct SessionStore {
    index: Mutex<HashMap<UserId, SessionId>>,
    sessions: DashMap<SessionId, SessionHandle>,
    archive: Mutex<Archive>,
}

#[derive(Debug)]
struct Archive {
    capacity: usize,
    order: VecDeque<SessionId>,
    entries: HashMap<SessionId, DuelSession>,
}

impl SessionStore {
    /// Creates an empty store that archives up to `archive_capacity` sessions.
    #[must_use]
    pub fn new(archive_capacity: usize) -> Self {
        Self {
            index: Mutex::new(HashMap::new()),
            sessions: DashMap::new(),
            archive: Mutex::new(Archive {
                capacity: archive_capacity,
                order: VecDeque::new(),
                entries: HashMap::new(),
            }),
        }
    }

    /// Registers a new live session for both of its participants.
    ///
    /// # Errors
    ///
    /// Returns [`DuelError::AlreadyInDuel`] naming the first participant that
    /// already holds a live session. Nothing is inserted in that case.
    pub fn insert(&self, session: DuelSession) -> Result<SessionHandle, DuelError> {
        let mut index = lock(&self.index);
        for user in session.participants() {
            if index.contains_key(&user) {
                return Err(DuelError::AlreadyInDuel { user });
            }
        }
        let id = session.id;
        for user in session.participants() {
            index.insert(user, id);
        }
        let handle = Arc::new(tokio::sync::Mutex::new(session));
        self.sessions.insert(id, Arc::clone(&handle));
        drop(index);
        Ok(handle)
    }

    /// Live session handle by id.
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<SessionHandle> {
        self.sessions.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Resolves an id against live sessions first, then the archive.
    #[must_use]
    pub fn lookup(&self, id: SessionId) -> Lookup {
        if let Some(handle) = self.get(id) {
            return Lookup::Live(handle);
        }
        self.archived(id)
            .map_or(Lookup::Missing, |s| Lookup::Archived(Box::new(s)))
    }

    /// Id of the live session `user` takes part in.
    #[must_use]
    pub fn session_id_for(&self, user: UserId) -> Option<SessionId> {
        lock(&self.index).get(&user).copied()
    }

    /// Live session handle `user` takes part in.
    #[must_use]
    pub fn session_for(&self, user: UserId) -> Option<(SessionId, SessionHandle)> {
        let id = self.session_id_for(user)?;
        self.get(id).map(|handle| (id, handle))
    }

    /// Drops a session from the live table and releases its participants.
    ///
    /// Index entries are only cleared while they still point at `session`.
    pub fn evict(&self, session: &DuelSession) {
        let mut index = lock(&self.index);
        for user in session.participants() {
            if index.get(&user) == Some(&session.id) {
                index.remove(&user);
            }
        }
        self.sessions.remove(&session.id);
    }

    /// Keeps a snapshot of a combat-finished session, evicting the oldest
    /// snapshot once the archive is full.
    pub fn archive(&self, session: DuelSession) {
        let mut archive = lock(&self.archive);
        if archive.capacity == 0 {
            return;
        }
        let id = session.id;
        if archive.entries.insert(id, session).is_none() {
            archive.order.push_back(id);
        }
        while archive.order.len() > archive.capacity {
            if let Some(oldest) = archive.order.pop_front() {
                archive.entries.remove(&oldest);
            }
        }
    }

    /// Archived snapshot by id.
    #[must_use]
    pub fn archived(&self, id: SessionId) -> Option<DuelSession> {
        lock(&self.archive).entries.get(&id).cloned()
    }

    /// Number of archived snapshots.
    #[must_use]
    pub fn archived_count(&self) -> usize {
        lock(&self.archive).order.len()
    }

    /// Number of live (pending or active) sessions.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.sessions.len()
    }

    /// Ids of all live sessions.
    #[must_use]
    pub fn live_ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    /// Number of users currently holding a live session.
    #[must_use]
    pub fn indexed_users(&self) -> usize {
        lock(&self.index).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
