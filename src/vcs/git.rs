use std::cell::Cell;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Result, bail};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::{Vcs, parse_blame_porcelain, parse_commit_lines};
use crate::config::Config;
use crate::error::{ErrorCode, PickError};
use crate::models::commit::{ChangedPath, CommitInfo, CommitRef};
use crate::models::outcome::ReplayResult;

/// Captured result of one `git` invocation.
#[derive(Debug, Clone, Default)]
pub struct GitOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    /// stdout when the command succeeded, otherwise empty.
    pub fn text(&self) -> &str {
        if self.success { self.stdout.trim_end() } else { "" }
    }

    fn into_replay(self) -> ReplayResult {
        ReplayResult {
            success: self.success,
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }
}

/// [`Vcs`] backed by the `git` executable.
#[derive(Debug)]
pub struct GitCli {
    root: PathBuf,
    git_dir: PathBuf,
    remote: Option<String>,
    max_retries: u32,
    retry_delay: Duration,
    /// Whether `cherry-pick --empty=drop` is understood (git 2.45+);
    /// learned from the first replay.
    empty_drop: Cell<Option<bool>>,
}

impl GitCli {
    /// Locate the repository containing `start`.
    pub fn discover(start: &Path, config: &Config) -> Result<Self> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel", "--absolute-git-dir"])
            .current_dir(start)
            .output()
            .map_err(|e| PickError::new(ErrorCode::GitFailed, format!("Failed to run git: {e}")))?;

        if !output.status.success() {
            bail!(PickError::new(
                ErrorCode::NotARepository,
                format!("Not a git repository: {}", start.display()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut lines = stdout.lines().map(str::trim).filter(|l| !l.is_empty());
        let (Some(root), Some(git_dir)) = (lines.next(), lines.next()) else {
            bail!(PickError::new(
                ErrorCode::NotARepository,
                format!("No working tree around {}", start.display()),
            ));
        };
        Ok(Self {
            root: PathBuf::from(root),
            git_dir: PathBuf::from(git_dir),
            remote: None,
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            empty_drop: Cell::new(None),
        })
    }

    /// Read the target line from `remote` instead of `HEAD`.
    pub fn with_remote(mut self, remote: Option<String>) -> Self {
        self.remote = remote;
        self
    }

    /// The repository's `.git` directory; tool state lives below it so it
    /// never shows up in the working tree.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Single attempt.
    fn git(&self, args: &[&str]) -> GitOutput {
        debug!(args = ?args, "git");
        match Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
        {
            Ok(output) => GitOutput {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
            Err(e) => GitOutput {
                success: false,
                stdout: String::new(),
                stderr: format!("failed to run git: {e}"),
            },
        }
    }

    /// Retried up to `max_retries` times with a fixed delay.
    fn run(&self, args: &[&str]) -> GitOutput {
        let mut output = self.git(args);
        let mut attempt = 0;
        while !output.success && attempt < self.max_retries {
            attempt += 1;
            warn!(
                args = ?args,
                attempt,
                max = self.max_retries,
                stderr = output.stderr.trim(),
                "git failed, retrying"
            );
            std::thread::sleep(self.retry_delay);
            output = self.git(args);
        }
        output
    }

    /// Probe that is expected to fail sometimes; never retried.
    fn query(&self, args: &[&str]) -> GitOutput {
        self.git(args)
    }

    /// `HEAD`, or the remote when one is configured.
    fn target_line(&self) -> &str {
        self.remote.as_deref().unwrap_or("HEAD")
    }

    /// `<remote>/<id>` when that ref exists, else the id itself.
    fn commit_rev(&self, commit: &CommitRef) -> String {
        if let Some(remote) = &self.remote {
            let remote_ref = format!("{remote}/{commit}");
            if self
                .query(&["rev-parse", "--verify", "--quiet", &format!("{remote_ref}^{{commit}}")])
                .success
            {
                return remote_ref;
            }
        }
        commit.as_str().to_string()
    }

    /// Plain replay for gits without `--empty=drop`; a pick that stops
    /// because it became empty is skipped.
    fn pick_skipping_empty(&self, rev: &str) -> ReplayResult {
        let out = self.query(&["cherry-pick", rev]);
        if out.success || !self.stopped_empty(&out) {
            return out.into_replay();
        }
        debug!(rev, "cherry-pick is empty, dropping it");
        self.query(&["cherry-pick", "--skip"]).into_replay()
    }

    /// A cherry-pick halted with nothing to commit and nothing unmerged.
    fn stopped_empty(&self, out: &GitOutput) -> bool {
        let said_empty =
            out.stderr.contains("is now empty") || out.stdout.contains("nothing to commit");
        said_empty
            && self
                .query(&["rev-parse", "-q", "--verify", "CHERRY_PICK_HEAD"])
                .success
            && self.unmerged_paths().is_empty()
            && !self.has_staged_changes()
    }

    fn lines(&self, output: &GitOutput) -> Vec<String> {
        output
            .text()
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn with_temp_file<F>(&self, content: &str, f: F) -> ReplayResult
    where
        F: FnOnce(&str) -> GitOutput,
    {
        let mut file = match NamedTempFile::new() {
            Ok(file) => file,
            Err(e) => return ReplayResult::failed(format!("failed to create temp file: {e}")),
        };
        if let Err(e) = file.write_all(content.as_bytes()).and_then(|_| file.flush()) {
            return ReplayResult::failed(format!("failed to write temp file: {e}"));
        }
        let path = file.path().to_string_lossy().into_owned();
        f(&path).into_replay()
    }
}

impl Vcs for GitCli {
    fn workdir(&self) -> &Path {
        &self.root
    }

    fn verify(&self, rev: &str) -> Option<CommitRef> {
        let lookup = |candidate: &str| {
            let out = self.query(&[
                "rev-parse",
                "--verify",
                "--quiet",
                &format!("{candidate}^{{commit}}"),
            ]);
            let text = out.text().trim();
            (!text.is_empty()).then(|| CommitRef::new(text))
        };

        if let Some(remote) = &self.remote {
            if let Some(found) = lookup(&format!("{remote}/{rev}")) {
                return Some(found);
            }
            if let Some(found) = lookup(rev) {
                return Some(found);
            }
            debug!(rev, remote = remote.as_str(), "commit not found locally, fetching");
            self.fetch(remote, Some(rev));
        }
        lookup(rev)
    }

    fn contains(&self, commit: &CommitRef) -> bool {
        self.query(&["merge-base", "--is-ancestor", commit.as_str(), "HEAD"])
            .success
    }

    fn commit_info(&self, commit: &CommitRef) -> Option<CommitInfo> {
        let rev = self.commit_rev(commit);
        let out = self.query(&[
            "log",
            "-1",
            "--date=short",
            "--format=%h%x00%cd%x00%an%x00%ae%x00%s",
            &rev,
        ]);
        let text = out.text();
        let mut parts = text.splitn(5, '\0');
        Some(CommitInfo {
            abbrev: parts.next().filter(|s| !s.is_empty())?.to_string(),
            date: parts.next()?.to_string(),
            author: parts.next()?.to_string(),
            email: parts.next()?.to_string(),
            subject: parts.next().unwrap_or("").to_string(),
        })
    }

    fn commit_message(&self, commit: &CommitRef) -> Option<String> {
        let rev = self.commit_rev(commit);
        let out = self.run(&["log", "-1", "--format=%B", &rev]);
        out.success.then(|| out.stdout.trim().to_string())
    }

    fn rev_range(&self, start: &CommitRef, end: &CommitRef) -> Vec<CommitRef> {
        let range = format!("{}^..{}", self.commit_rev(start), self.commit_rev(end));
        let out = self.query(&["rev-list", "--reverse", &range]);
        if out.success {
            return parse_commit_lines(out.text());
        }
        // root commit has no parent
        let out = self.run(&["rev-list", "--reverse", &self.commit_rev(end)]);
        parse_commit_lines(out.text())
    }

    fn changed_paths(&self, commit: &CommitRef) -> Vec<ChangedPath> {
        let rev = self.commit_rev(commit);
        let out = self.run(&[
            "diff-tree",
            "--no-commit-id",
            "--name-status",
            "-r",
            "-M",
            "--root",
            &rev,
        ]);
        let parsed: Vec<ChangedPath> = out
            .text()
            .lines()
            .filter_map(ChangedPath::parse_name_status)
            .collect();
        if !parsed.is_empty() {
            return parsed;
        }
        let out = self.run(&["show", "--pretty=", "--name-only", &rev]);
        self.lines(&out).into_iter().map(ChangedPath::modified).collect()
    }

    fn show_file(&self, commit: &CommitRef, path: &str) -> Option<String> {
        let rev = self.commit_rev(commit);
        let out = self.query(&["show", &format!("{rev}:{path}")]);
        if out.success {
            return Some(out.stdout);
        }
        if let Some(remote) = &self.remote {
            self.fetch(remote, Some(commit.as_str()));
            let out = self.query(&["show", &format!("{commit}:{path}")]);
            if out.success {
                return Some(out.stdout);
            }
        }
        None
    }

    fn blame_commits(&self, path: &str) -> Vec<CommitRef> {
        let out = self.query(&["blame", "--porcelain", self.target_line(), "--", path]);
        parse_blame_porcelain(out.text())
    }

    fn pickaxe(&self, needle: &str, path: &str) -> Vec<CommitRef> {
        let pattern = format!("-S{needle}");
        let out = self.run(&["log", &pattern, "--format=%H", self.target_line(), "--", path]);
        parse_commit_lines(out.text())
    }

    fn commits_adding(&self, path: &str) -> Vec<CommitRef> {
        let out = self.run(&[
            "log",
            "--all",
            "--diff-filter=A",
            "--reverse",
            "--format=%H",
            "--",
            path,
        ]);
        parse_commit_lines(out.text())
    }

    fn full_history(&self, path: &str) -> Vec<CommitRef> {
        let out = self.run(&[
            "log",
            "--all",
            "--full-history",
            "--reverse",
            "--format=%H",
            "--",
            path,
        ]);
        parse_commit_lines(out.text())
    }

    fn follow_history(&self, path: &str) -> Vec<CommitRef> {
        let out = self.query(&["log", "--follow", "--format=%H", self.target_line(), "--", path]);
        parse_commit_lines(out.text())
    }

    fn history_between(
        &self,
        since: &CommitRef,
        until: &CommitRef,
        path: &str,
    ) -> Vec<CommitRef> {
        let until_rev = self.commit_rev(until);
        let range = format!("{}~1..{until_rev}", self.commit_rev(since));
        let out = self.query(&["log", "--reverse", "--format=%H", &range, "--", path]);
        if out.success {
            return parse_commit_lines(out.text());
        }
        // creation commit is a root commit
        let out = self.query(&["log", "--reverse", "--format=%H", &until_rev, "--", path]);
        parse_commit_lines(out.text())
    }

    fn last_touch(&self, path: &str) -> Option<CommitRef> {
        self.last_touch_at(self.target_line(), path)
    }

    fn last_touch_at(&self, rev: &str, path: &str) -> Option<CommitRef> {
        let out = self.query(&["log", "-n", "1", "--format=%H", rev, "--", path]);
        parse_commit_lines(out.text()).into_iter().next()
    }

    fn grep_history(&self, needle: &str, depth: usize) -> Option<CommitRef> {
        let depth = depth.to_string();
        let out = self.run(&["rev-list", "--all", "--max-count", &depth]);
        for rev in parse_commit_lines(out.text()) {
            let hit = self.query(&["grep", "-l", "-F", "-e", needle, rev.as_str()]);
            if hit.success && !hit.text().is_empty() {
                return Some(rev);
            }
        }
        None
    }

    fn tracked_files(&self) -> Vec<String> {
        let out = self.run(&["ls-files"]);
        self.lines(&out)
    }

    fn files_at(&self, rev: &str) -> Vec<String> {
        let out = self.query(&["ls-tree", "-r", "--name-only", rev]);
        self.lines(&out)
    }

    fn exists_in_index(&self, path: &str) -> bool {
        self.query(&["ls-files", "--error-unmatch", "--", path]).success
    }

    fn remotes(&self) -> Vec<String> {
        let out = self.run(&["remote"]);
        self.lines(&out)
    }

    fn remote_url(&self, remote: &str) -> Option<String> {
        let out = self.query(&["remote", "get-url", remote]);
        let url = out.text().trim();
        (!url.is_empty()).then(|| url.to_string())
    }

    fn remote_branches(&self, remote: &str) -> Vec<String> {
        let pattern = format!("refs/remotes/{remote}");
        let prefix = format!("{remote}/");
        let out = self.run(&["for-each-ref", "--format=%(refname:short)", &pattern]);
        self.lines(&out)
            .into_iter()
            .filter_map(|r| r.strip_prefix(&prefix).map(str::to_string))
            .filter(|b| b != "HEAD")
            .collect()
    }

    fn fetch(&self, remote: &str, rev: Option<&str>) -> bool {
        let mut args = vec!["fetch", remote];
        if let Some(rev) = rev {
            args.push(rev);
            // a single revision may legitimately be unknown to the remote
            return self.query(&args).success;
        }
        self.run(&args).success
    }

    fn format_patch(&self, commit: &CommitRef) -> Option<String> {
        let rev = self.commit_rev(commit);
        let out = self.run(&["format-patch", "-1", "--stdout", &rev]);
        (out.success && !out.stdout.trim().is_empty()).then_some(out.stdout)
    }

    fn apply_patch(&self, patch: &str) -> ReplayResult {
        self.with_temp_file(patch, |path| self.query(&["apply", "--index", path]))
    }

    fn check_patch(&self, patch: &str) -> ReplayResult {
        self.with_temp_file(patch, |path| self.query(&["apply", "--check", path]))
    }

    fn cherry_pick(&self, commit: &CommitRef, no_commit: bool) -> ReplayResult {
        let rev = self.commit_rev(commit);
        if no_commit {
            return self.query(&["cherry-pick", "-n", &rev]).into_replay();
        }
        if self.empty_drop.get() != Some(false) {
            let out = self.query(&["cherry-pick", "--empty=drop", &rev]);
            if !is_usage_error(&out.stderr) {
                self.empty_drop.set(Some(true));
                return out.into_replay();
            }
            debug!("git does not know --empty=drop, skipping empty picks by hand");
            self.empty_drop.set(Some(false));
        }
        self.pick_skipping_empty(&rev)
    }

    fn cherry_pick_continue(&self) -> ReplayResult {
        self.query(&["-c", "core.editor=true", "cherry-pick", "--continue"])
            .into_replay()
    }

    fn cherry_pick_abort(&self) -> bool {
        self.query(&["cherry-pick", "--abort"]).success
    }

    fn reset_merge(&self) -> bool {
        self.query(&["reset", "--merge"]).success
    }

    fn status_text(&self) -> String {
        let out = self.query(&["status"]);
        format!("{}\n{}", out.stdout, out.stderr)
    }

    fn unmerged_paths(&self) -> Vec<String> {
        let out = self.run(&["diff", "--name-only", "--diff-filter=U"]);
        let mut paths = self.lines(&out);
        paths.dedup();
        paths
    }

    fn staged_paths(&self) -> Vec<String> {
        let out = self.run(&["diff", "--cached", "--name-only"]);
        self.lines(&out)
    }

    fn stage(&self, paths: &[String]) -> bool {
        if paths.is_empty() {
            return true;
        }
        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run(&args).success
    }

    fn stage_all(&self) -> bool {
        self.run(&["add", "-A"]).success
    }

    fn has_staged_changes(&self) -> bool {
        !self.query(&["diff", "--cached", "--quiet"]).success
    }

    fn commit_staged(&self, message: &str) -> ReplayResult {
        self.with_temp_file(message, |path| self.query(&["commit", "-F", path]))
    }

    fn checkout_side(&self, path: &str, ours: bool) -> bool {
        let side = if ours { "--ours" } else { "--theirs" };
        self.query(&["checkout", side, "--", path]).success && self.stage(&[path.to_string()])
    }
}

/// git rejected the command line itself (unknown option).
fn is_usage_error(stderr: &str) -> bool {
    stderr
        .lines()
        .any(|l| l.starts_with("usage:") || l.starts_with("error: unknown option"))
}
