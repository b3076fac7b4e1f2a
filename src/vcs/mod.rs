//! Version-control collaborator: the operations the engine needs from git.

pub mod git;

use std::path::Path;

use crate::models::commit::{ChangedPath, CommitInfo, CommitRef};
use crate::models::outcome::ReplayResult;

pub use git::GitCli;

/// Branches of a remote searched before any other when looking for a file.
pub const WELL_KNOWN_BRANCHES: [&str; 4] = ["master", "main", "develop", "dev"];

/// Everything the analysis and apply engines ask of the repository.
///
/// Query methods never fail hard: an unsuccessful git invocation reads as
/// "nothing found" (empty list, `None`, `false`). Replay-like operations
/// return the raw [`ReplayResult`] so callers can classify the failure.
///
/// "Target line" queries (`last_touch`, `blame_commits`, `pickaxe`,
/// `follow_history`) read from the configured remote when there is one and
/// from `HEAD` otherwise.
pub trait Vcs {
    /// Repository root.
    fn workdir(&self) -> &Path;

    /// Full id of a revision, or `None` when it does not resolve to a commit.
    fn verify(&self, rev: &str) -> Option<CommitRef>;

    /// Reachable from `HEAD`, i.e. already on the working line.
    fn contains(&self, commit: &CommitRef) -> bool;

    fn commit_info(&self, commit: &CommitRef) -> Option<CommitInfo>;

    /// Full commit message (`%B`).
    fn commit_message(&self, commit: &CommitRef) -> Option<String>;

    /// `START^..END`, oldest first.
    fn rev_range(&self, start: &CommitRef, end: &CommitRef) -> Vec<CommitRef>;

    /// Paths touched by a commit in diff order, with rename detection.
    fn changed_paths(&self, commit: &CommitRef) -> Vec<ChangedPath>;

    /// File content at a commit.
    fn show_file(&self, commit: &CommitRef, path: &str) -> Option<String>;

    /// Commits owning at least one line of `path` on the target line.
    fn blame_commits(&self, path: &str) -> Vec<CommitRef>;

    /// Commits whose diff of `path` changed the number of occurrences of `needle`.
    fn pickaxe(&self, needle: &str, path: &str) -> Vec<CommitRef>;

    /// Commits that added `path` anywhere in history, oldest first.
    fn commits_adding(&self, path: &str) -> Vec<CommitRef>;

    /// Every commit touching `path`, non-linear history included, oldest first.
    fn full_history(&self, path: &str) -> Vec<CommitRef>;

    /// Rename-aware history of `path` on the target line, newest first.
    fn follow_history(&self, path: &str) -> Vec<CommitRef>;

    /// Commits in `since^..until` touching `path`, oldest first.
    fn history_between(&self, since: &CommitRef, until: &CommitRef, path: &str)
    -> Vec<CommitRef>;

    /// Most recent commit touching `path` on the target line.
    fn last_touch(&self, path: &str) -> Option<CommitRef>;

    /// Most recent commit touching `path` reachable from `rev`.
    fn last_touch_at(&self, rev: &str, path: &str) -> Option<CommitRef>;

    /// Newest commit (within the `depth` most recent) whose tree has a file
    /// containing `needle`.
    fn grep_history(&self, needle: &str, depth: usize) -> Option<CommitRef>;

    /// Files tracked in the working tree.
    fn tracked_files(&self) -> Vec<String>;

    /// Files in the tree of `rev`.
    fn files_at(&self, rev: &str) -> Vec<String>;

    fn exists_in_index(&self, path: &str) -> bool;

    fn remotes(&self) -> Vec<String>;

    fn remote_url(&self, remote: &str) -> Option<String>;

    /// Branch names of `remote`, without the `remote/` prefix.
    fn remote_branches(&self, remote: &str) -> Vec<String>;

    /// Fetch `remote`, or a single revision from it.
    fn fetch(&self, remote: &str, rev: Option<&str>) -> bool;

    /// Single-commit patch (`format-patch -1 --stdout`).
    fn format_patch(&self, commit: &CommitRef) -> Option<String>;

    /// Apply a patch to the index and working tree.
    fn apply_patch(&self, patch: &str) -> ReplayResult;

    /// Dry-run a patch and report what would fail.
    fn check_patch(&self, patch: &str) -> ReplayResult;

    /// Replay a commit; `no_commit` stages the result without committing.
    ///
    /// A committing replay that turns out empty is dropped and counts as a
    /// success.
    fn cherry_pick(&self, commit: &CommitRef, no_commit: bool) -> ReplayResult;

    fn cherry_pick_continue(&self) -> ReplayResult;

    fn cherry_pick_abort(&self) -> bool;

    /// Throw away an uncommitted `no_commit` replay: the index and the files
    /// it touched go back to `HEAD`. `cherry_pick_abort` cannot, since such a
    /// replay leaves no cherry-pick in progress.
    fn reset_merge(&self) -> bool;

    /// Human-readable status, scanned for per-path error lines.
    fn status_text(&self) -> String;

    fn unmerged_paths(&self) -> Vec<String>;

    fn staged_paths(&self) -> Vec<String>;

    fn stage(&self, paths: &[String]) -> bool;

    fn stage_all(&self) -> bool;

    fn has_staged_changes(&self) -> bool;

    /// Commit the index with `message`.
    fn commit_staged(&self, message: &str) -> ReplayResult;

    /// Resolve a conflicted path by taking one side (`ours` = target line).
    fn checkout_side(&self, path: &str, ours: bool) -> bool;
}

/// Distinct commit ids from `git blame --porcelain` header lines.
pub fn parse_blame_porcelain(output: &str) -> Vec<CommitRef> {
    let mut commits: Vec<CommitRef> = Vec::new();
    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 4 || !is_full_hash(fields[0]) {
            continue;
        }
        let commit = CommitRef::new(fields[0]);
        if !commits.contains(&commit) {
            commits.push(commit);
        }
    }
    commits
}

/// A full SHA-1 (40) or SHA-256 (64) hex id, excluding the all-zero id
/// blame uses for uncommitted lines.
pub fn is_full_hash(token: &str) -> bool {
    matches!(token.len(), 40 | 64)
        && token.chars().all(|c| c.is_ascii_hexdigit())
        && token.chars().any(|c| c != '0')
}

/// One id per non-empty line.
pub fn parse_commit_lines(output: &str) -> Vec<CommitRef> {
    output
        .lines()
        .map(|l| l.trim().trim_matches('\''))
        .filter(|l| !l.is_empty())
        .map(CommitRef::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "1111111111111111111111111111111111111111";
    const B: &str = "2222222222222222222222222222222222222222";

    #[test]
    fn blame_headers_are_collected_once() {
        let output = format!(
            "{A} 1 1 2\nauthor X\n\tline one\n{A} 2 2\n\tline two\n{B} 3 3 1\nauthor Y\n\tline three\n"
        );
        assert_eq!(
            parse_blame_porcelain(&output),
            vec![CommitRef::new(A), CommitRef::new(B)]
        );
    }

    #[test]
    fn uncommitted_lines_are_ignored() {
        let zero = "0".repeat(40);
        let output = format!("{zero} 1 1 1\n\tlocal edit\n");
        assert!(parse_blame_porcelain(&output).is_empty());
    }

    #[test]
    fn content_lines_that_look_like_headers_are_ignored() {
        // content lines are tab-prefixed and rarely a 40-hex token, but
        // short ids must never match
        let output = "abc123 1 1 1\n";
        assert!(parse_blame_porcelain(output).is_empty());
    }

    #[test]
    fn sha256_repositories_are_recognised() {
        let long = "ab".repeat(32);
        let output = format!("{long} 1 1 1\n\tline\n");
        assert_eq!(parse_blame_porcelain(&output), vec![CommitRef::new(&long)]);
        assert!(!is_full_hash(&"a".repeat(50)));
        assert!(!is_full_hash(&"0".repeat(64)));
    }

    #[test]
    fn commit_lines_skip_blanks_and_quotes() {
        let got = parse_commit_lines("'abc'\n\n def \n");
        assert_eq!(got, vec![CommitRef::new("abc"), CommitRef::new("def")]);
    }
}
