//! Run log: one plain-text file per day under the state directory, plus
//! DEBUG output on stderr in verbose mode.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Result, anyhow};
use logroller::{LogRollerBuilder, Rotation, RotationAge, TimeZone};
use time::macros::format_description;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::prelude::*;

/// Log files are named `smart-pick.YYYY-MM-DD`.
const LOG_PREFIX: &str = "smart-pick";

/// Days a log file is kept.
const RETENTION_DAYS: u64 = 3;

fn level(debug: bool, verbose: bool) -> Level {
    if debug || verbose { Level::DEBUG } else { Level::INFO }
}

/// Start logging for this process. Call once.
pub fn init(log_dir: &Path, debug: bool, verbose: bool) -> Result<()> {
    fs::create_dir_all(log_dir)?;
    cleanup_old_logs(log_dir)?;

    let roller = LogRollerBuilder::new(log_dir, Path::new(LOG_PREFIX))
        .rotation(Rotation::AgeBased(RotationAge::Daily))
        .time_zone(TimeZone::Local)
        .max_keep_files(RETENTION_DAYS as _)
        .build()
        .map_err(|e| anyhow!("Failed to open log file in {}: {e}", log_dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(roller);

    let offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = OffsetTime::new(
        offset,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    );

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(timer);
    let stderr_layer = verbose.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .compact()
    });

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level(debug, verbose).into()))
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to install log subscriber: {e}"))?;

    // the writer flushes until process exit
    std::mem::forget(guard);
    Ok(())
}

/// Delete our log files not modified within the retention window.
pub fn cleanup_old_logs(log_dir: &Path) -> Result<()> {
    if !log_dir.is_dir() {
        return Ok(());
    }
    let cutoff = SystemTime::now() - Duration::from_secs(RETENTION_DAYS * 24 * 60 * 60);
    for path in stale_logs(log_dir, cutoff)? {
        if let Err(e) = fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), error = %e, "could not remove old log");
        }
    }
    Ok(())
}

/// Regular files named like our logs and last modified before `cutoff`.
fn stale_logs(log_dir: &Path, cutoff: SystemTime) -> Result<Vec<PathBuf>> {
    let mut stale = Vec::new();
    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_ours = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(LOG_PREFIX));
        if !is_ours || !path.is_file() {
            continue;
        }
        if let Ok(modified) = entry.metadata().and_then(|m| m.modified())
            && modified < cutoff
        {
            stale.push(path);
        }
    }
    Ok(stale)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn age(path: &Path, days: u64) {
        let when = SystemTime::now() - Duration::from_secs(days * 24 * 60 * 60);
        fs::File::options()
            .write(true)
            .open(path)
            .and_then(|f| f.set_modified(when))
            .unwrap();
    }

    #[test]
    fn debug_or_verbose_lowers_the_level() {
        assert_eq!(level(false, false), Level::INFO);
        assert_eq!(level(true, false), Level::DEBUG);
        assert_eq!(level(false, true), Level::DEBUG);
    }

    #[test]
    fn old_logs_are_removed_recent_ones_kept() {
        let dir = tempfile::TempDir::new().unwrap();
        let old = dir.path().join("smart-pick.2020-01-01");
        let recent = dir.path().join("smart-pick.2026-10-19");
        fs::write(&old, "old").unwrap();
        fs::write(&recent, "recent").unwrap();
        age(&old, 4);

        cleanup_old_logs(dir.path()).unwrap();

        assert!(!old.exists());
        assert!(recent.exists());
    }

    #[test]
    fn state_files_next_to_logs_survive() {
        let dir = tempfile::TempDir::new().unwrap();
        let history = dir.path().join("history.json");
        fs::write(&history, "[]").unwrap();
        age(&history, 10);

        cleanup_old_logs(dir.path()).unwrap();

        assert!(history.exists());
    }

    #[test]
    fn directories_with_the_prefix_are_ignored() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::create_dir(dir.path().join("smart-pick.archive")).unwrap();
        let stale = stale_logs(dir.path(), SystemTime::now() + Duration::from_secs(60)).unwrap();
        assert!(stale.is_empty());
    }

    #[test]
    fn missing_directory_is_fine() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(cleanup_old_logs(&dir.path().join("absent")).is_ok());
    }
}
