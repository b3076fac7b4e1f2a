use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    NotARepository,
    UnknownRemote,
    UnknownCommit,
    EmptyRange,
    NothingToApply,
    InvalidConfig,
    StateIo,
    GitFailed,
    Interrupted,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotARepository => write!(f, "NOT_A_REPOSITORY"),
            Self::UnknownRemote => write!(f, "UNKNOWN_REMOTE"),
            Self::UnknownCommit => write!(f, "UNKNOWN_COMMIT"),
            Self::EmptyRange => write!(f, "EMPTY_RANGE"),
            Self::NothingToApply => write!(f, "NOTHING_TO_APPLY"),
            Self::InvalidConfig => write!(f, "INVALID_CONFIG"),
            Self::StateIo => write!(f, "STATE_IO"),
            Self::GitFailed => write!(f, "GIT_FAILED"),
            Self::Interrupted => write!(f, "INTERRUPTED"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PickError {
    pub code: ErrorCode,
    pub message: String,
}

impl fmt::Display for PickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for PickError {}

impl PickError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unknown_commit(commit: &str) -> Self {
        Self::new(
            ErrorCode::UnknownCommit,
            format!("Commit does not exist: {commit}"),
        )
    }

    pub fn unknown_remote(remote: &str, known: &[String]) -> Self {
        let listing = if known.is_empty() {
            "none configured".to_string()
        } else {
            known.join(", ")
        };
        Self::new(
            ErrorCode::UnknownRemote,
            format!("Remote '{remote}' does not exist (available: {listing})"),
        )
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfig, message)
    }

    pub fn state_io(path: &str, reason: impl fmt::Display) -> Self {
        Self::new(ErrorCode::StateIo, format!("{path}: {reason}"))
    }
}
