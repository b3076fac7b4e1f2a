use serde::{Deserialize, Serialize};

use super::commit::CommitRef;

/// Raw result of a replay-like git operation (cherry-pick, apply, commit).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ReplayResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// stdout and stderr joined, for message scanning.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Classified reason a replay failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayFailure {
    /// Paths named by the replay as absent from the target index.
    MissingIndexEntries(Vec<String>),
    /// Paths left unmerged.
    Conflict(Vec<String>),
    /// Anything else.
    Unclassified(String),
}

/// How a conflict or missing path was eventually settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    None,
    Manual,
    RenamePatch,
    MissingFiles,
    PolicyOurs,
    PolicyTheirs,
    Edited,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Manual => "manual",
            Self::RenamePatch => "rename_patch",
            Self::MissingFiles => "missing_files",
            Self::PolicyOurs => "policy_ours",
            Self::PolicyTheirs => "policy_theirs",
            Self::Edited => "edited",
        }
    }
}

/// Final outcome of applying one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied { resolution: Resolution },
    AlreadyApplied,
    Failed { reason: String },
    Aborted,
}

impl ApplyOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Applied { .. } | Self::AlreadyApplied)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::AlreadyApplied => "already_applied",
            Self::Failed { .. } => "failed",
            Self::Aborted => "aborted",
        }
    }
}

/// Counters reported at the end of an apply batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_secs: u64,
    pub failures: Vec<CommitRef>,
}
