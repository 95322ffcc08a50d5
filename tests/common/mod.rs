//! Shared integration-test helpers: an in-process engine fixture with a
//! hand-driven clock, and a child-process harness speaking the JSONL intent
//! protocol over stdio.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

use dueljack::config::DuelSettings;
use dueljack::duel::{
    DuelEngine, ManualScheduler, ScriptedDice, SessionId, Timestamp, TimerKind, UserId,
};
use dueljack::stats::InMemoryStatsRepository;

/// Default timeout for reading a single response from the process.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub const ALICE: UserId = UserId(1);
pub const BOB: UserId = UserId(2);
pub const CAROL: UserId = UserId(3);

/// `t` seconds after the test epoch.
#[must_use]
pub fn at(t: i64) -> Timestamp {
    DateTime::from_timestamp(1_767_225_600 + t, 0).expect("timestamp in range")
}

// ============================================================================
// In-process fixture
// ============================================================================

/// An engine wired to a manual scheduler, scripted dice, and in-memory stats.
pub struct Fixture {
    pub engine: DuelEngine,
    pub scheduler: Arc<ManualScheduler>,
    pub stats: Arc<InMemoryStatsRepository>,
}

impl Fixture {
    /// Default rules, dice returning `rolls` in order.
    #[must_use]
    pub fn new(rolls: impl IntoIterator<Item = u32>) -> Self {
        Self::with_settings(DuelSettings::default(), ScriptedDice::new(rolls))
    }

    #[must_use]
    pub fn with_settings(settings: DuelSettings, dice: ScriptedDice) -> Self {
        let scheduler = Arc::new(ManualScheduler::new());
        let stats = Arc::new(InMemoryStatsRepository::new());
        let engine = DuelEngine::new(
            settings,
            Arc::clone(&stats) as _,
            Arc::clone(&scheduler) as _,
            Box::new(dice),
        );
        Self {
            engine,
            scheduler,
            stats,
        }
    }

    /// Fires every timer due at `now` into the engine.
    pub async fn fire_due(&self, now: Timestamp) -> usize {
        let due = self.scheduler.due(now);
        let count = due.len();
        for fired in due {
            self.engine.handle_timer(fired).await;
        }
        count
    }

    /// Challenge at `t0`, accept at `t0 + 5`. Returns the session id.
    pub async fn start_duel(&self, challenger: UserId, opponent: UserId, t0: i64) -> SessionId {
        let session = self
            .engine
            .challenge(challenger, opponent, at(t0))
            .await
            .expect("challenge")
            .session()
            .id;
        self.engine
            .accept(opponent, at(t0 + 5))
            .await
            .expect("accept");
        session
    }

    #[must_use]
    pub fn deadline(&self, id: SessionId, kind: TimerKind) -> Option<Timestamp> {
        self.scheduler.deadline(id, kind)
    }
}

// ============================================================================
// Child process harness
// ============================================================================

/// A running `dueljack run` process.
///
/// The child process is killed on drop via `kill_on_drop(true)`.
pub struct DuelJackProcess {
    child: Child,
    stdin: tokio::process::ChildStdin,
    reader: BufReader<tokio::process::ChildStdout>,
}

impl DuelJackProcess {
    /// Spawns `dueljack run` with the given YAML config.
    pub fn spawn(config_path: &Path) -> Self {
        Self::spawn_args(&[
            "run",
            "--config",
            config_path.to_str().expect("non-UTF-8 config path"),
        ])
    }

    /// Spawns the binary with `args`, piping stdio.
    pub fn spawn_args(args: &[&str]) -> Self {
        let bin = env!("CARGO_BIN_EXE_dueljack");
        let mut child = Command::new(bin)
            .args(args)
            .arg("--quiet")
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .expect("failed to spawn dueljack");

        let stdin = child.stdin.take().expect("stdin not captured");
        let stdout = child.stdout.take().expect("stdout not captured");

        Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
        }
    }

    /// Runs the binary to completion and captures its output.
    pub fn spawn_command(args: &[&str]) -> std::process::Output {
        std::process::Command::new(env!("CARGO_BIN_EXE_dueljack"))
            .args(args)
            .output()
            .expect("failed to run dueljack")
    }

    /// OS process id.
    pub fn pid(&self) -> u32 {
        self.child.id().expect("child already exited")
    }

    /// Waits for exit without closing stdin.
    pub async fn wait(mut self) -> std::process::ExitStatus {
        tokio::time::timeout(Duration::from_secs(5), self.child.wait())
            .await
            .expect("dueljack did not exit")
            .expect("wait failed")
    }

    /// Writes one raw line.
    pub async fn send_line(&mut self, line: &str) {
        self.stdin
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("failed to write to stdin");
        self.stdin.flush().await.expect("failed to flush stdin");
    }

    /// Sends one intent and returns its response.
    pub async fn send(&mut self, intent: &Value) -> Value {
        self.send_line(&intent.to_string()).await;
        self.read_message(DEFAULT_TIMEOUT).await
    }

    /// Reads one JSON response line.
    ///
    /// Panics on EOF, I/O error, or if nothing arrives within `timeout`.
    pub async fn read_message(&mut self, timeout: Duration) -> Value {
        let mut line = String::new();
        let result = tokio::time::timeout(timeout, async {
            loop {
                line.clear();
                let n = self
                    .reader
                    .read_line(&mut line)
                    .await
                    .expect("read_line I/O error");
                assert!(n > 0, "unexpected EOF from dueljack");
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    return serde_json::from_str::<Value>(trimmed)
                        .unwrap_or_else(|e| panic!("invalid JSON from dueljack: {e}\nline: {line}"));
                }
            }
        })
        .await;
        result.expect("timed out waiting for response from dueljack")
    }

    /// Closes stdin and waits for exit. Returns the exit status.
    pub async fn shutdown(self) -> std::process::ExitStatus {
        let Self {
            mut child, stdin, ..
        } = self;
        drop(stdin);

        match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
            Ok(status) => status.expect("wait failed"),
            Err(_) => {
                child.kill().await.expect("failed to kill child");
                panic!("dueljack did not exit after stdin closed");
            }
        }
    }

    /// Returns the path to a test fixture.
    #[must_use]
    pub fn fixture_path(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }
}
