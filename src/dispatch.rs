//! Intent dispatch for the line-oriented harness.
//!
//! One JSON object per input line, tagged by `"intent"`, with an optional
//! RFC 3339 `"at"` that overrides the engine clock. Each line produces
//! exactly one JSON response line:
//!
//! ```json
//! {"intent": "challenge", "actor": 1, "opponent": 2, "at": "2026-01-01T00:00:00Z"}
//! {"ok": true, "effect": "challenged", "session": {...}}
//! {"intent": "attack", "actor": 2}
//! {"ok": false, "error": {"kind": "invalid_action", "message": "...", "reason": "..."}}
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_stream::StreamExt;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::duel::engine::{DuelEngine, Effect};
use crate::duel::model::{Action, DuelSession, MoveKind, SessionId, Timestamp, UserId};
use crate::error::{DuelError, DuelJackError, StatsError};
use crate::stats::UserStats;

/// Longest accepted input line in bytes.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Leaderboard size when a request names none.
pub const DEFAULT_LEADERBOARD_LIMIT: usize = 10;

// ============================================================================
// Wire types
// ============================================================================

/// One request line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IntentFrame {
    /// What to do
    #[serde(flatten)]
    pub intent: Intent,
    /// Timestamp override
    #[serde(default)]
    pub at: Option<Timestamp>,
}

/// Actor plus an optional explicit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Target {
    /// Acting user
    pub actor: UserId,
    /// Session to address; the actor's live session when absent
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

/// Every request the harness understands.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    /// Issue a challenge.
    Challenge {
        /// Challenger
        actor: UserId,
        /// Challenged user
        opponent: UserId,
    },
    /// Accept a pending challenge.
    Accept(Target),
    /// Decline a pending challenge.
    Decline(Target),
    /// Withdraw a pending challenge.
    Cancel(Target),
    /// Combat: ATTACK.
    Attack(Target),
    /// Combat: DEFEND.
    Defend(Target),
    /// Combat: HEAL.
    Heal(Target),
    /// Combat: SPECIAL.
    Special(Target),
    /// The actor's live session.
    Status {
        /// Whose session
        actor: UserId,
    },
    /// A live or archived session by id.
    Session {
        /// Which session
        session_id: SessionId,
    },
    /// A user's stats.
    Stats {
        /// Whose stats
        user: UserId,
    },
    /// The guild leaderboard.
    Leaderboard {
        /// How many entries
        #[serde(default = "default_limit")]
        limit: usize,
    },
}

const fn default_limit() -> usize {
    DEFAULT_LEADERBOARD_LIMIT
}

impl Intent {
    /// The session action and target for session-addressed intents.
    #[must_use]
    pub const fn action(&self) -> Option<(Action, Target)> {
        let (action, target) = match *self {
            Self::Accept(t) => (Action::Accept, t),
            Self::Decline(t) => (Action::Decline, t),
            Self::Cancel(t) => (Action::Cancel, t),
            Self::Attack(t) => (Action::Move(MoveKind::Attack), t),
            Self::Defend(t) => (Action::Move(MoveKind::Defend), t),
            Self::Heal(t) => (Action::Move(MoveKind::Heal), t),
            Self::Special(t) => (Action::Move(MoveKind::Special), t),
            Self::Challenge { .. }
            | Self::Status { .. }
            | Self::Session { .. }
            | Self::Stats { .. }
            | Self::Leaderboard { .. } => return None,
        };
        Some((action, target))
    }
}

/// Successful response body, flattened next to `"ok": true`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// An engine effect
    Effect(Effect),
    /// A session snapshot
    Session {
        /// The session
        session: DuelSession,
    },
    /// A stats lookup
    Stats {
        /// Whose stats
        user: UserId,
        /// `null` before their first duel
        stats: Option<UserStats>,
    },
    /// A leaderboard
    Leaderboard {
        /// Ranked entries
        leaderboard: Vec<UserStats>,
    },
}

/// One response line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// Whether the request succeeded
    pub ok: bool,
    /// Success body
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    /// Failure body with at least `kind` and `message`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl Response {
    /// Success.
    #[must_use]
    pub const fn success(payload: Payload) -> Self {
        Self {
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    /// Engine rejection. Carries the error's own fields next to `kind`.
    #[must_use]
    pub fn rejected(err: &DuelError) -> Self {
        let mut body = match serde_json::to_value(err) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        body.insert("kind".to_string(), json!(err.kind()));
        body.insert("message".to_string(), json!(err.to_string()));
        Self::failure_body(body)
    }

    /// Any other failure.
    #[must_use]
    pub fn failure(kind: &str, message: impl Into<String>) -> Self {
        let mut body = Map::new();
        body.insert("kind".to_string(), json!(kind));
        body.insert("message".to_string(), json!(message.into()));
        Self::failure_body(body)
    }

    const fn failure_body(body: Map<String, Value>) -> Self {
        Self {
            ok: false,
            payload: None,
            error: Some(Value::Object(body)),
        }
    }
}

impl From<Result<Effect, DuelError>> for Response {
    fn from(result: Result<Effect, DuelError>) -> Self {
        match result {
            Ok(effect) => Self::success(Payload::Effect(effect)),
            Err(e) => Self::rejected(&e),
        }
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Parses one request line.
///
/// # Errors
///
/// Returns the JSON error for malformed or unknown requests.
pub fn parse(line: &str) -> Result<IntentFrame, serde_json::Error> {
    serde_json::from_str(line)
}

/// Routes one request to the engine.
pub async fn dispatch(engine: &DuelEngine, frame: IntentFrame) -> Response {
    let now = frame.at.unwrap_or_else(Utc::now);

    if let Some((action, target)) = frame.intent.action() {
        let result = match target.session_id {
            Some(id) => engine.apply(id, target.actor, action, now).await,
            None => engine.act(target.actor, action, now).await,
        };
        return result.into();
    }

    match frame.intent {
        Intent::Challenge { actor, opponent } => engine.challenge(actor, opponent, now).await.into(),
        Intent::Status { actor } => match engine.status(actor, now).await {
            Ok(session) => Response::success(Payload::Session { session }),
            Err(e) => Response::rejected(&e),
        },
        Intent::Session { session_id } => match engine.session(session_id).await {
            Ok(session) => Response::success(Payload::Session { session }),
            Err(e) => Response::rejected(&e),
        },
        Intent::Stats { user } => match engine.stats(user).await {
            Ok(stats) => Response::success(Payload::Stats { user, stats }),
            Err(e) => stats_failure(&e),
        },
        Intent::Leaderboard { limit } => match engine.leaderboard(limit).await {
            Ok(leaderboard) => Response::success(Payload::Leaderboard { leaderboard }),
            Err(e) => stats_failure(&e),
        },
        Intent::Accept(_)
        | Intent::Decline(_)
        | Intent::Cancel(_)
        | Intent::Attack(_)
        | Intent::Defend(_)
        | Intent::Heal(_)
        | Intent::Special(_) => Response::failure("bad_request", "unroutable intent"),
    }
}

fn stats_failure(err: &StatsError) -> Response {
    warn!(error = %err, "stats query failed");
    Response::failure("stats_error", err.to_string())
}

/// Counters for one harness run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeSummary {
    /// Requests answered
    pub handled: u64,
    /// Requests that could not be parsed
    pub malformed: u64,
}

/// Reads requests from `reader` and writes responses to `writer` until EOF
/// or `cancel` fires. The request being handled when `cancel` fires is
/// finished and answered first.
///
/// # Errors
///
/// Returns an I/O error if reading or writing fails.
pub async fn serve<R, W>(
    engine: &DuelEngine,
    reader: R,
    writer: W,
    cancel: CancellationToken,
) -> Result<ServeSummary, DuelJackError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let mut writer = tokio::io::BufWriter::new(writer);
    let mut summary = ServeSummary::default();

    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => {
                debug!("harness cancelled");
                break;
            }
            next = lines.next() => next,
        };

        let response = match next {
            None => break,
            Some(Ok(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match parse(line) {
                    Ok(frame) => dispatch(engine, frame).await,
                    Err(e) => {
                        summary.malformed += 1;
                        debug!(error = %e, "malformed request");
                        Response::failure("bad_request", e.to_string())
                    }
                }
            }
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                summary.malformed += 1;
                Response::failure(
                    "bad_request",
                    format!("request exceeds {MAX_LINE_LENGTH} bytes"),
                )
            }
            Some(Err(LinesCodecError::Io(e))) => return Err(e.into()),
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;
        summary.handled += 1;
    }

    writer.flush().await?;
    Ok(summary)
}
