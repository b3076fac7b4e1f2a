#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use anyhow::Result;
use tempfile::TempDir;

use smart_pick::config::Config;
use smart_pick::editor::Editor;
use smart_pick::engine::patch::patch_paths;
use smart_pick::models::commit::{ChangedPath, CommitInfo, CommitRef};
use smart_pick::models::outcome::ReplayResult;
use smart_pick::prompt::Prompter;
use smart_pick::session::{CancelToken, RunOptions, Session};
use smart_pick::vcs::Vcs;

pub fn id(name: &str) -> CommitRef {
    CommitRef::new(name)
}

pub fn ids(names: &[&str]) -> Vec<CommitRef> {
    names.iter().map(|n| CommitRef::new(*n)).collect()
}

/// Session with progress bars off and nothing loaded from disk.
pub fn session(options: RunOptions) -> Session {
    let config = Config {
        show_progress: false,
        ..Config::default()
    };
    Session::new(config, options)
}

/// One scripted cherry-pick attempt.
struct Attempt {
    result: ReplayResult,
    /// Paths left unmerged by a failed attempt.
    unmerged: Vec<String>,
}

/// In-memory repository. Everything not scripted reads as "nothing found";
/// cherry-picks succeed unless a failure was queued for the commit, and
/// patches apply when every path they name is tracked.
pub struct FakeRepo {
    dir: TempDir,
    pub changes: HashMap<CommitRef, Vec<ChangedPath>>,
    pub contents: HashMap<(CommitRef, String), String>,
    pub adding: HashMap<String, Vec<CommitRef>>,
    pub between: HashMap<String, Vec<CommitRef>>,
    pub last_touch: HashMap<String, CommitRef>,
    pub blame: HashMap<String, Vec<CommitRef>>,
    /// `(needle, path)` → commits changing the needle's occurrence count.
    pub pickaxe: HashMap<(String, String), Vec<CommitRef>>,
    /// Rename-aware history, newest first.
    pub follow: HashMap<String, Vec<CommitRef>>,
    /// Every commit touching a path, oldest first.
    pub history: HashMap<String, Vec<CommitRef>>,
    /// Content search: needle → newest commit mentioning it.
    pub grep: HashMap<String, CommitRef>,
    /// Remote → branch names.
    pub branches: HashMap<String, Vec<String>>,
    /// Revision → files in its tree.
    pub trees: HashMap<String, Vec<String>>,
    /// `(rev, path)` → last commit touching it there.
    pub touched_at: HashMap<(String, String), CommitRef>,
    pub patches: HashMap<CommitRef, String>,
    index: RefCell<HashSet<String>>,
    head: RefCell<Vec<CommitRef>>,
    attempts: RefCell<HashMap<CommitRef, VecDeque<Attempt>>>,
    unmerged: RefCell<Vec<String>>,
    in_progress: RefCell<Option<CommitRef>>,
    /// Replayed with `no_commit` and waiting for `commit_staged`.
    uncommitted: RefCell<Option<CommitRef>>,
    staged: RefCell<bool>,
    picked: RefCell<Vec<CommitRef>>,
    applied_patches: RefCell<Vec<String>>,
    messages: RefCell<Vec<String>>,
    reads: RefCell<usize>,
    aborts: RefCell<usize>,
    resets: RefCell<usize>,
}

impl FakeRepo {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            changes: HashMap::new(),
            contents: HashMap::new(),
            adding: HashMap::new(),
            between: HashMap::new(),
            last_touch: HashMap::new(),
            blame: HashMap::new(),
            pickaxe: HashMap::new(),
            follow: HashMap::new(),
            history: HashMap::new(),
            grep: HashMap::new(),
            branches: HashMap::new(),
            trees: HashMap::new(),
            touched_at: HashMap::new(),
            patches: HashMap::new(),
            index: RefCell::new(HashSet::new()),
            head: RefCell::new(Vec::new()),
            attempts: RefCell::new(HashMap::new()),
            unmerged: RefCell::new(Vec::new()),
            in_progress: RefCell::new(None),
            uncommitted: RefCell::new(None),
            staged: RefCell::new(false),
            picked: RefCell::new(Vec::new()),
            applied_patches: RefCell::new(Vec::new()),
            messages: RefCell::new(Vec::new()),
            reads: RefCell::new(0),
            aborts: RefCell::new(0),
            resets: RefCell::new(0),
        }
    }

    pub fn track(&self, path: &str) {
        self.index.borrow_mut().insert(path.to_string());
    }

    /// Mark `commit` as already on the working line.
    pub fn on_head(&self, commit: &str) {
        self.head.borrow_mut().push(id(commit));
    }

    pub fn modifies(&mut self, commit: &str, paths: &[&str]) {
        self.changes.insert(
            id(commit),
            paths.iter().map(|p| ChangedPath::modified(*p)).collect(),
        );
    }

    /// Queue a failed cherry-pick of `commit`.
    pub fn fail_pick(&self, commit: &str, stderr: &str, unmerged: &[&str]) {
        self.attempts
            .borrow_mut()
            .entry(id(commit))
            .or_default()
            .push_back(Attempt {
                result: ReplayResult::failed(stderr),
                unmerged: unmerged.iter().map(|p| p.to_string()).collect(),
            });
    }

    /// Commits replayed so far, in order.
    pub fn picked(&self) -> Vec<CommitRef> {
        self.picked.borrow().clone()
    }

    pub fn aborts(&self) -> usize {
        *self.aborts.borrow()
    }

    /// `reset_merge` calls.
    pub fn resets(&self) -> usize {
        *self.resets.borrow()
    }

    /// `show_file` calls.
    pub fn reads(&self) -> usize {
        *self.reads.borrow()
    }

    /// Patches applied to the index, as given.
    pub fn applied_patches(&self) -> Vec<String> {
        self.applied_patches.borrow().clone()
    }

    /// Messages of commits made from the index.
    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }

    pub fn unmerged(&self) -> Vec<String> {
        self.unmerged.borrow().clone()
    }

    /// Paths `patch` names that are not tracked.
    fn untracked_in(&self, patch: &str) -> Vec<String> {
        let index = self.index.borrow();
        patch_paths(patch)
            .into_iter()
            .filter(|p| !index.contains(p))
            .collect()
    }

    fn patch_result(missing: &[String]) -> ReplayResult {
        let stderr: Vec<String> = missing
            .iter()
            .map(|p| format!("error: {p}: does not exist in index"))
            .collect();
        ReplayResult::failed(stderr.join("\n"))
    }

    fn land(&self, commit: &CommitRef) {
        for change in self.changes.get(commit).into_iter().flatten() {
            self.track(&change.path);
        }
        self.head.borrow_mut().push(commit.clone());
        self.picked.borrow_mut().push(commit.clone());
    }
}

impl Vcs for FakeRepo {
    fn workdir(&self) -> &Path {
        self.dir.path()
    }

    fn verify(&self, rev: &str) -> Option<CommitRef> {
        Some(id(rev))
    }

    fn contains(&self, commit: &CommitRef) -> bool {
        self.head.borrow().contains(commit)
    }

    fn commit_info(&self, commit: &CommitRef) -> Option<CommitInfo> {
        Some(CommitInfo {
            abbrev: commit.short().to_string(),
            date: "2024-01-01".to_string(),
            author: "Test Author".to_string(),
            email: "test@example.com".to_string(),
            subject: format!("subject of {commit}"),
        })
    }

    fn commit_message(&self, commit: &CommitRef) -> Option<String> {
        Some(format!("message of {commit}"))
    }

    fn rev_range(&self, _start: &CommitRef, _end: &CommitRef) -> Vec<CommitRef> {
        Vec::new()
    }

    fn changed_paths(&self, commit: &CommitRef) -> Vec<ChangedPath> {
        self.changes.get(commit).cloned().unwrap_or_default()
    }

    fn show_file(&self, commit: &CommitRef, path: &str) -> Option<String> {
        *self.reads.borrow_mut() += 1;
        self.contents
            .get(&(commit.clone(), path.to_string()))
            .cloned()
    }

    fn blame_commits(&self, path: &str) -> Vec<CommitRef> {
        self.blame.get(path).cloned().unwrap_or_default()
    }

    fn pickaxe(&self, needle: &str, path: &str) -> Vec<CommitRef> {
        self.pickaxe
            .get(&(needle.to_string(), path.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn commits_adding(&self, path: &str) -> Vec<CommitRef> {
        self.adding.get(path).cloned().unwrap_or_default()
    }

    fn full_history(&self, path: &str) -> Vec<CommitRef> {
        self.history.get(path).cloned().unwrap_or_default()
    }

    fn follow_history(&self, path: &str) -> Vec<CommitRef> {
        self.follow.get(path).cloned().unwrap_or_default()
    }

    fn history_between(
        &self,
        _since: &CommitRef,
        _until: &CommitRef,
        path: &str,
    ) -> Vec<CommitRef> {
        self.between.get(path).cloned().unwrap_or_default()
    }

    fn last_touch(&self, path: &str) -> Option<CommitRef> {
        self.last_touch.get(path).cloned()
    }

    fn last_touch_at(&self, rev: &str, path: &str) -> Option<CommitRef> {
        self.touched_at
            .get(&(rev.to_string(), path.to_string()))
            .cloned()
    }

    fn grep_history(&self, needle: &str, _depth: usize) -> Option<CommitRef> {
        self.grep.get(needle).cloned()
    }

    fn tracked_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self.index.borrow().iter().cloned().collect();
        files.sort();
        files
    }

    fn files_at(&self, rev: &str) -> Vec<String> {
        self.trees.get(rev).cloned().unwrap_or_default()
    }

    fn exists_in_index(&self, path: &str) -> bool {
        self.index.borrow().contains(path)
    }

    fn remotes(&self) -> Vec<String> {
        Vec::new()
    }

    fn remote_url(&self, _remote: &str) -> Option<String> {
        None
    }

    fn remote_branches(&self, remote: &str) -> Vec<String> {
        self.branches.get(remote).cloned().unwrap_or_default()
    }

    fn fetch(&self, _remote: &str, _rev: Option<&str>) -> bool {
        true
    }

    fn format_patch(&self, commit: &CommitRef) -> Option<String> {
        self.patches.get(commit).cloned()
    }

    fn apply_patch(&self, patch: &str) -> ReplayResult {
        let missing = self.untracked_in(patch);
        if !missing.is_empty() {
            return Self::patch_result(&missing);
        }
        self.applied_patches.borrow_mut().push(patch.to_string());
        *self.staged.borrow_mut() = true;
        ReplayResult::ok()
    }

    fn check_patch(&self, patch: &str) -> ReplayResult {
        let missing = self.untracked_in(patch);
        if missing.is_empty() {
            ReplayResult::ok()
        } else {
            Self::patch_result(&missing)
        }
    }

    fn cherry_pick(&self, commit: &CommitRef, no_commit: bool) -> ReplayResult {
        let attempt = self
            .attempts
            .borrow_mut()
            .get_mut(commit)
            .and_then(VecDeque::pop_front);
        match attempt {
            Some(attempt) => {
                *self.unmerged.borrow_mut() = attempt.unmerged;
                // a no-commit replay leaves no cherry-pick in progress
                if !no_commit {
                    *self.in_progress.borrow_mut() = Some(commit.clone());
                }
                attempt.result
            }
            None if no_commit => {
                *self.uncommitted.borrow_mut() = Some(commit.clone());
                *self.staged.borrow_mut() = true;
                ReplayResult::ok()
            }
            None => {
                self.land(commit);
                ReplayResult::ok()
            }
        }
    }

    fn cherry_pick_continue(&self) -> ReplayResult {
        if !self.unmerged.borrow().is_empty() {
            return ReplayResult::failed("error: unmerged paths remain");
        }
        match self.in_progress.borrow_mut().take() {
            Some(commit) => {
                self.land(&commit);
                ReplayResult::ok()
            }
            None => ReplayResult::failed("error: no cherry-pick in progress"),
        }
    }

    fn cherry_pick_abort(&self) -> bool {
        *self.aborts.borrow_mut() += 1;
        self.unmerged.borrow_mut().clear();
        self.in_progress.borrow_mut().take().is_some()
    }

    fn reset_merge(&self) -> bool {
        *self.resets.borrow_mut() += 1;
        self.unmerged.borrow_mut().clear();
        self.uncommitted.borrow_mut().take();
        *self.staged.borrow_mut() = false;
        true
    }

    fn status_text(&self) -> String {
        String::new()
    }

    fn unmerged_paths(&self) -> Vec<String> {
        self.unmerged.borrow().clone()
    }

    fn staged_paths(&self) -> Vec<String> {
        Vec::new()
    }

    fn stage(&self, paths: &[String]) -> bool {
        self.unmerged.borrow_mut().retain(|p| !paths.contains(p));
        for path in paths {
            self.track(path);
        }
        true
    }

    fn stage_all(&self) -> bool {
        self.unmerged.borrow_mut().clear();
        true
    }

    fn has_staged_changes(&self) -> bool {
        *self.staged.borrow()
    }

    fn commit_staged(&self, message: &str) -> ReplayResult {
        self.messages.borrow_mut().push(message.to_string());
        *self.staged.borrow_mut() = false;
        if let Some(commit) = self.uncommitted.borrow_mut().take() {
            self.land(&commit);
        }
        ReplayResult::ok()
    }

    fn checkout_side(&self, path: &str, _ours: bool) -> bool {
        self.unmerged.borrow_mut().retain(|p| p != path);
        true
    }
}

/// Answers menus from a queue, then falls back to the defaults.
#[derive(Default)]
pub struct ScriptedPrompter {
    /// `None` dismisses the menu.
    selections: VecDeque<Option<usize>>,
    inputs: VecDeque<String>,
    /// Tripped on dismissal, as Ctrl-C at a terminal prompt does.
    interrupt: Option<CancelToken>,
    /// Titles of every menu shown, in order.
    pub seen: Vec<String>,
}

impl ScriptedPrompter {
    pub fn with_selections(selections: &[usize]) -> Self {
        Self {
            selections: selections.iter().copied().map(Some).collect(),
            ..Self::default()
        }
    }

    pub fn answer(mut self, answer: &str) -> Self {
        self.inputs.push_back(answer.to_string());
        self
    }

    /// Dismiss the next unscripted menu.
    pub fn dismiss(mut self) -> Self {
        self.selections.push_back(None);
        self
    }

    /// Dismissals also cancel `token`.
    pub fn interrupting(mut self, token: CancelToken) -> Self {
        self.interrupt = Some(token);
        self
    }
}

impl Prompter for ScriptedPrompter {
    fn select(&mut self, title: &str, _labels: &[String], default: usize) -> Option<usize> {
        self.seen.push(title.to_string());
        match self.selections.pop_front() {
            Some(Some(index)) => Some(index),
            Some(None) => {
                if let Some(token) = &self.interrupt {
                    token.cancel();
                }
                None
            }
            None => Some(default),
        }
    }

    fn input(&mut self, prompt: &str) -> Option<String> {
        self.seen.push(prompt.to_string());
        self.inputs.pop_front()
    }

    fn confirm(&mut self, _prompt: &str, default: bool) -> bool {
        default
    }
}

/// Records the files it was asked to open.
#[derive(Default)]
pub struct RecordingEditor {
    pub opened: RefCell<Vec<PathBuf>>,
}

impl Editor for RecordingEditor {
    fn edit(&self, _workdir: &Path, paths: &[String]) -> Result<()> {
        self.opened
            .borrow_mut()
            .extend(paths.iter().map(PathBuf::from));
        Ok(())
    }
}
