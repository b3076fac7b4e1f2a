//! Terminal output: coloured status lines, commit context, progress bars.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::author::AuthorMap;
use crate::models::commit::{CommitInfo, CommitRef};
use crate::models::outcome::BatchSummary;
use crate::vcs::Vcs;

pub fn info(message: &str) {
    println!("{}", message.cyan());
}

pub fn success(message: &str) {
    println!("{}", message.green());
}

pub fn warn(message: &str) {
    println!("{}", message.yellow());
}

pub fn error(message: &str) {
    eprintln!("{}", message.red());
}

pub fn added(message: &str) {
    println!("{}", message.blue());
}

pub fn found(message: &str) {
    println!("{}", message.magenta());
}

/// `abbrev (date) - author (@handle) - subject`
pub fn format_context(info: &CommitInfo, handle: &str) -> String {
    format!(
        "{} ({}) - {} (@{}) - {}",
        info.abbrev, info.date, info.author, handle, info.subject
    )
}

/// Context line for a commit, or a "not found" marker.
pub fn commit_context(vcs: &dyn Vcs, authors: &mut AuthorMap, commit: &CommitRef) -> String {
    match vcs.commit_info(commit) {
        Some(info) => {
            let handle = authors.handle(&info.author, &info.email);
            format_context(&info, &handle)
        }
        None => {
            let short: String = commit.as_str().chars().take(7).collect();
            format!("{short} (commit not found)")
        }
    }
}

/// Numbered list, truncated to `max` entries with a "... and N more" line.
pub fn numbered(lines: &[String], max: usize) -> Vec<String> {
    let shown = lines.len().min(max);
    let mut out: Vec<String> = lines[..shown]
        .iter()
        .enumerate()
        .map(|(i, line)| format!("  {}. {line}", i + 1))
        .collect();
    if lines.len() > shown {
        out.push(format!("     ... and {} more.", lines.len() - shown));
    }
    out
}

/// Bar over `total` steps; hidden when disabled.
pub fn progress(total: usize, message: &str, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{msg}: [{bar:40.cyan/blue}] {percent}% ({pos}/{len})")
    {
        pb.set_style(style.progress_chars("█░"));
    }
    pb.set_message(message.to_string());
    pb
}

pub fn summary(summary: &BatchSummary) {
    let rule = "=".repeat(50);
    println!("\n{rule}");
    println!("{}", "Cherry-pick summary:".green().bold());
    println!("{}", format!("  Total commits processed: {}", summary.total).green());
    println!("{}", format!("  Succeeded: {}", summary.succeeded).green());
    if summary.failed > 0 {
        println!("{}", format!("  Failed: {}", summary.failed).red());
        for commit in &summary.failures {
            println!("{}", format!("    - {}", commit.short()).red());
        }
    }
    println!("{}", format!("  Elapsed: {} seconds", summary.elapsed_secs).green());
    println!("{rule}");
}
