use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a commit (a hash or any revision git accepts).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitRef(String);

impl CommitRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, used in menus and log lines.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for CommitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommitRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CommitRef {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for CommitRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Metadata shown next to a commit in menus and summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub abbrev: String,
    pub date: String,
    pub author: String,
    pub email: String,
    pub subject: String,
}

/// Kind of change a commit made to one path (`git diff-tree --name-status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
    TypeChanged,
    Other,
}

impl ChangeStatus {
    pub fn from_letter(status: &str) -> Self {
        match status.chars().next() {
            Some('A') => Self::Added,
            Some('M') => Self::Modified,
            Some('D') => Self::Deleted,
            Some('R') => Self::Renamed,
            Some('C') => Self::Copied,
            Some('T') => Self::TypeChanged,
            _ => Self::Other,
        }
    }
}

/// One path touched by a commit. `old_path` is set for renames and copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedPath {
    pub status: ChangeStatus,
    pub path: String,
    pub old_path: Option<String>,
}

impl ChangedPath {
    pub fn modified(path: impl Into<String>) -> Self {
        Self {
            status: ChangeStatus::Modified,
            path: path.into(),
            old_path: None,
        }
    }

    /// Parse one line of `git diff-tree --name-status -r` output.
    pub fn parse_name_status(line: &str) -> Option<Self> {
        let mut parts = line.split('\t');
        let letter = parts.next()?.trim();
        if letter.is_empty() {
            return None;
        }
        let status = ChangeStatus::from_letter(letter);
        let first = parts.next()?.trim().to_string();
        match status {
            ChangeStatus::Renamed | ChangeStatus::Copied => {
                let second = parts.next()?.trim().to_string();
                Some(Self {
                    status,
                    path: second,
                    old_path: Some(first),
                })
            }
            _ => Some(Self {
                status,
                path: first,
                old_path: None,
            }),
        }
    }
}
