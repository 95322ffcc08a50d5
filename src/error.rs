//! Error types for `DuelJack`
//!
//! Two families live here. [`DuelError`] is the recoverable, user-facing
//! taxonomy returned by every engine operation. The rest ([`ConfigError`],
//! [`StatsError`] and the aggregate [`DuelJackError`]) cover infrastructure
//! failures and map to process exit codes.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::duel::model::{SessionId, UserId};

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `DuelJack` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Stats repository error (corrupt or unwritable store)
    pub const STATS_ERROR: i32 = 4;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Duel Errors
// ============================================================================

/// Rejection of a duel intent.
///
/// Every variant is local and recoverable. A rejected intent leaves the
/// session exactly as it was. Serialized with a `kind` tag so transports can
/// render each case without parsing the message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DuelError {
    /// The action is not legal for this actor in the session's current state.
    #[error("invalid action: {reason}")]
    InvalidAction {
        /// Why the action was refused
        reason: String,
    },

    /// A combat action came from the participant who does not hold the turn.
    #[error("it is not your turn (waiting on {turn_owner})")]
    NotYourTurn {
        /// Participant currently allowed to act
        turn_owner: UserId,
    },

    /// The session has already finished.
    #[error("duel {session_id} is already over")]
    SessionClosed {
        /// The finished session
        session_id: SessionId,
    },

    /// A participant already has a pending or active duel.
    #[error("user {user} is already in a duel")]
    AlreadyInDuel {
        /// The participant holding a live session
        user: UserId,
    },

    /// The challenger finished a duel too recently.
    #[error("on cooldown, try again in {remaining_secs}s")]
    OnCooldown {
        /// Whole seconds left, rounded up
        remaining_secs: u64,
    },

    /// The participant already spent their special move in this session.
    #[error("special move already used this duel")]
    SpecialAlreadyUsed,

    /// No live session matches the request.
    #[error("no such duel")]
    SessionNotFound,
}

impl DuelError {
    /// Shorthand for [`DuelError::InvalidAction`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidAction {
            reason: reason.into(),
        }
    }

    /// Stable label used in metrics and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidAction { .. } => "invalid_action",
            Self::NotYourTurn { .. } => "not_your_turn",
            Self::SessionClosed { .. } => "session_closed",
            Self::AlreadyInDuel { .. } => "already_in_duel",
            Self::OnCooldown { .. } => "on_cooldown",
            Self::SpecialAlreadyUsed => "special_already_used",
            Self::SessionNotFound => "session_not_found",
        }
    }
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `DuelJack` operations.
#[derive(Debug, Error)]
pub enum DuelJackError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Stats repository error
    #[error(transparent)]
    Stats(#[from] StatsError),

    /// Intent rejected by the engine
    #[error(transparent)]
    Duel(#[from] DuelError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),
}

impl DuelJackError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Stats(_) => ExitCode::STATS_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Duel(_) | Self::Json(_) => ExitCode::ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}")]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set ({location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Message supplied with the `${VAR:?message}` form
        location: String,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Dotted path to the problematic field (e.g., "duel.attack_damage.min")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Error - validation failure that prevents configuration from being used
    Error,
    /// Warning - potential issue that does not prevent configuration loading
    Warning,
}

// ============================================================================
// Stats Errors
// ============================================================================

/// Stats repository failures.
#[derive(Debug, Error)]
pub enum StatsError {
    /// Reading or writing the backing store failed
    #[error("stats I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing store could not be (de)serialized
    #[error("stats encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// The backing store holds data the repository refuses to load
    #[error("corrupt stats store at {path}: {message}")]
    Corrupt {
        /// Location of the store
        path: PathBuf,
        /// What was wrong with it
        message: String,
    },
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `DuelJack` operations.
pub type Result<T> = std::result::Result<T, DuelJackError>;

// ============================================================================
// Tests
// ============================================================================
