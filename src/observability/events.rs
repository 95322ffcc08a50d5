//! Structured duel event stream.
//!
//! Discrete, typed events emitted as sessions move through their lifecycle.
//! Events are serialized as newline-delimited JSON (JSONL) with a
//! monotonically increasing sequence number.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::duel::model::{MoveKind, Outcome, SessionId, Timestamp, UserId};

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A lifecycle event, tagged with `"type"` when serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A challenge was issued and is pending.
    ChallengeIssued {
        /// Intent timestamp.
        timestamp: Timestamp,
        /// New session.
        session_id: SessionId,
        /// Issuer.
        challenger: UserId,
        /// Receiver.
        opponent: UserId,
    },

    /// The opponent accepted and combat began.
    DuelStarted {
        /// Intent timestamp.
        timestamp: Timestamp,
        /// Session.
        session_id: SessionId,
        /// Participant who moves first.
        turn_owner: UserId,
    },

    /// A combat move was resolved.
    MoveResolved {
        /// Intent timestamp.
        timestamp: Timestamp,
        /// Session.
        session_id: SessionId,
        /// 1-based move number.
        turn: u32,
        /// Who moved.
        actor: UserId,
        /// What they did.
        kind: MoveKind,
        /// Damage dealt or health restored.
        amount: u32,
        /// Backfire damage to the actor.
        self_damage: u32,
        /// Challenger health afterwards.
        challenger_health: u32,
        /// Opponent health afterwards.
        opponent_health: u32,
    },

    /// A duel ended by combat (knockout or time limit).
    DuelFinished {
        /// Transition timestamp.
        timestamp: Timestamp,
        /// Session.
        session_id: SessionId,
        /// Final outcome.
        outcome: Outcome,
        /// Winner, unless drawn.
        winner: Option<UserId>,
        /// Number of moves played.
        turns: usize,
    },

    /// A pending challenge was declined, cancelled, or expired.
    ChallengeClosed {
        /// Transition timestamp.
        timestamp: Timestamp,
        /// Session.
        session_id: SessionId,
        /// How the challenge closed.
        outcome: Outcome,
    },
}

#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Serialization or I/O failures are dropped; a broken event sink never
/// affects duel handling.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that silently discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::noop()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use chrono::DateTime;

    use super::*;
    use crate::duel::model::Verdict;

    #[derive(Clone)]
    struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl TestWriter {
        fn new() -> Self {
            Self(Arc::new(StdMutex::new(Vec::new())))
        }

        fn lines(&self) -> Vec<serde_json::Value> {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf)
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn ts() -> Timestamp {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn emitter_writes_flat_sequenced_lines() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        let session_id = SessionId::new();
        emitter.emit(Event::ChallengeIssued {
            timestamp: ts(),
            session_id,
            challenger: UserId(1),
            opponent: UserId(2),
        });
        emitter.emit(Event::DuelFinished {
            timestamp: ts(),
            session_id,
            outcome: Outcome::TimedOut {
                verdict: Verdict::ChallengerWin,
            },
            winner: Some(UserId(1)),
            turns: 4,
        });

        assert_eq!(emitter.event_count(), 2);
        let lines = tw.lines();
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[0]["type"], "ChallengeIssued");
        assert_eq!(lines[0]["challenger"], 1);
        assert_eq!(lines[0]["session_id"], session_id.to_string());
        assert!(lines[0].get("event").is_none());
        assert_eq!(lines[1]["sequence"], 1);
        assert_eq!(lines[1]["outcome"]["timed_out"]["verdict"], "challenger_win");
    }

    #[test]
    fn noop_emitter_counts_but_discards() {
        let emitter = EventEmitter::noop();
        emitter.emit(Event::ChallengeClosed {
            timestamp: ts(),
            session_id: SessionId::new(),
            outcome: Outcome::Expired,
        });
        assert_eq!(emitter.event_count(), 1);
    }
}
