//! Append-only CSV of per-operation statistics.

use anyhow::Result;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::error::PickError;
use crate::models::commit::CommitRef;
use crate::models::outcome::Resolution;

const HEADER: &str = "timestamp,commit,operation,outcome,duration_ms,file_count,conflict_count,resolution_method,remote,auto_mode";

/// Kind of operation a stats row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Analyze,
    CherryPick,
    DirectPick,
    EditPick,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::CherryPick => "cherry_pick",
            Self::DirectPick => "direct_pick",
            Self::EditPick => "edit_pick",
        }
    }
}

/// One row of `stats.csv`.
#[derive(Debug, Clone)]
pub struct StatRecord {
    pub commit: CommitRef,
    pub operation: Operation,
    pub outcome: String,
    pub duration_ms: u128,
    pub file_count: usize,
    pub conflict_count: usize,
    pub resolution: Resolution,
}

/// Writes [`StatRecord`]s; a disabled recorder drops them.
pub struct StatsRecorder {
    path: Option<PathBuf>,
    remote: String,
    auto_mode: bool,
}

impl StatsRecorder {
    pub fn new(path: PathBuf, remote: Option<&str>, auto_mode: bool) -> Self {
        Self {
            path: Some(path),
            remote: remote.unwrap_or("").to_string(),
            auto_mode,
        }
    }

    pub fn disabled() -> Self {
        Self {
            path: None,
            remote: String::new(),
            auto_mode: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    pub fn record(&self, record: &StatRecord) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let display = path.display().to_string();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PickError::state_io(&display, e))?;
        }

        let needs_header = !path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| PickError::state_io(&display, e))?;

        if needs_header {
            writeln!(file, "{HEADER}").map_err(|e| PickError::state_io(&display, e))?;
        }
        writeln!(file, "{}", self.row(record)).map_err(|e| PickError::state_io(&display, e))?;
        Ok(())
    }

    fn row(&self, record: &StatRecord) -> String {
        let fields = [
            timestamp(),
            record.commit.to_string(),
            record.operation.as_str().to_string(),
            record.outcome.clone(),
            record.duration_ms.to_string(),
            record.file_count.to_string(),
            record.conflict_count.to_string(),
            record.resolution.as_str().to_string(),
            self.remote.clone(),
            self.auto_mode.to_string(),
        ];
        fields
            .iter()
            .map(|f| csv_field(f))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn timestamp() -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format).unwrap_or_default()
}

/// Quote fields containing separators, quotes or newlines.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(commit: &str) -> StatRecord {
        StatRecord {
            commit: CommitRef::new(commit),
            operation: Operation::CherryPick,
            outcome: "applied".to_string(),
            duration_ms: 1200,
            file_count: 3,
            conflict_count: 1,
            resolution: Resolution::Manual,
        }
    }

    #[test]
    fn header_is_written_once() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stats.csv");
        let recorder = StatsRecorder::new(path.clone(), Some("upstream"), true);
        recorder.record(&record("abc")).unwrap();
        recorder.record(&record("def")).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].contains(",abc,cherry_pick,applied,1200,3,1,manual,upstream,true"));
    }

    #[test]
    fn disabled_recorder_writes_nothing() {
        let recorder = StatsRecorder::disabled();
        assert!(!recorder.is_enabled());
        recorder.record(&record("abc")).unwrap();
    }

    #[test]
    fn fields_with_commas_are_quoted() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
