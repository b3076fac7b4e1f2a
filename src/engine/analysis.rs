//! Commit Queue / Analysis State Machine.
//!
//! A requested commit is analyzed file by file. Each file goes through three
//! steps (presence on the target line, last touch, extracted dependencies)
//! and any accepted dependency is analyzed before the current file moves on.
//! Traversal runs on an explicit stack of frames; the session's stop flag and
//! cancel token are checked before every step.

use std::time::Instant;

use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use super::Runtime;
use super::apply;
use super::deps::find_dependencies;
use super::resolver::{Origin, history_chain_from, locate_file_origin};
use crate::display;
use crate::models::commit::{ChangeStatus, ChangedPath, CommitRef};
use crate::models::outcome::Resolution;
use crate::prompt::{Menu, choose};
use crate::session::Session;
use crate::stats::{Operation, StatRecord};

/// How an analysis run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisEnd {
    /// Every file of the root commit was processed.
    Completed,
    /// The user chose to stop analyzing and go on to applying.
    Halted,
    /// The user cancelled the run, or an interrupt arrived.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Presence,
    LastTouch,
    Dependencies,
}

/// One changed path of the commit under analysis.
#[derive(Debug, Clone)]
struct FileTask {
    /// Path as the commit records it.
    path: String,
    /// Path that must already exist for the commit to apply; `None` when the
    /// commit creates the file.
    expected: Option<String>,
}

impl FileTask {
    fn from_change(change: ChangedPath) -> Self {
        let expected = match change.status {
            ChangeStatus::Added | ChangeStatus::Copied => None,
            ChangeStatus::Renamed => change.old_path,
            _ => Some(change.path.clone()),
        };
        Self {
            path: change.path,
            expected,
        }
    }

    /// Canonical path looked up on the target line.
    fn target_path(&self) -> &str {
        self.expected.as_deref().unwrap_or(&self.path)
    }
}

struct Frame {
    commit: CommitRef,
    files: Vec<FileTask>,
    index: usize,
    step: Step,
    deps: Option<Vec<CommitRef>>,
    dep_index: usize,
    started: Instant,
    progress: ProgressBar,
}

impl Frame {
    /// Enter `commit`: record it analyzed and list its files.
    fn open(rt: &mut Runtime<'_>, session: &mut Session, commit: &CommitRef) -> Self {
        session.state.mark_analyzed(commit);
        let files: Vec<FileTask> = rt
            .vcs
            .changed_paths(commit)
            .into_iter()
            .map(FileTask::from_change)
            .collect();

        let context = display::commit_context(rt.vcs, &mut session.authors, commit);
        display::info(&format!("\nAnalyzing {context}"));
        info!(commit = commit.short(), files = files.len(), "analyzing commit");

        let progress = display::progress(
            files.len(),
            &format!("Analyzing files of {}", commit.short()),
            session.config.show_progress && !session.options.dry_run,
        );
        Self {
            commit: commit.clone(),
            files,
            index: 0,
            step: Step::Presence,
            deps: None,
            dep_index: 0,
            started: Instant::now(),
            progress,
        }
    }

    fn is_done(&self) -> bool {
        self.index >= self.files.len()
    }

    fn next_file(&mut self) {
        self.index += 1;
        self.step = Step::Presence;
        self.deps = None;
        self.dep_index = 0;
        self.progress.inc(1);
    }

    fn close(self, session: &Session, outcome: &str) {
        self.progress.finish_and_clear();
        let record = StatRecord {
            commit: self.commit.clone(),
            operation: Operation::Analyze,
            outcome: outcome.to_string(),
            duration_ms: self.started.elapsed().as_millis(),
            file_count: self.files.len(),
            conflict_count: 0,
            resolution: Resolution::None,
        };
        if let Err(e) = session.stats.record(&record) {
            warn!(error = %e, "failed to record analysis stats");
        }
        debug!(commit = self.commit.short(), outcome, "analysis frame closed");
    }
}

enum Action {
    Continue,
    Descend(CommitRef),
    End(AnalysisEnd),
}

/// Analyze `root` and everything accepted as its dependency.
///
/// Re-entering a commit that is already analyzed or applied is a no-op.
pub fn analyze(rt: &mut Runtime<'_>, session: &mut Session, root: &CommitRef) -> AnalysisEnd {
    if session.state.is_known(root) {
        info!(commit = root.short(), "already analyzed or applied");
        display::warn(&format!("Commit {} was already analyzed or applied", root.short()));
        return AnalysisEnd::Completed;
    }
    session.state.push_final(root);

    let mut stack = vec![Frame::open(rt, session, root)];
    while let Some(top) = stack.last_mut() {
        let end = if session.cancel.is_cancelled() {
            Some(AnalysisEnd::Cancelled)
        } else if session.state.stop {
            Some(AnalysisEnd::Halted)
        } else {
            None
        };
        if let Some(end) = end {
            unwind(stack, session, end);
            return end;
        }

        if top.is_done() {
            if let Some(frame) = stack.pop() {
                frame.close(session, "analyzed");
            }
            continue;
        }

        match step(rt, session, top) {
            Action::Continue => {}
            Action::Descend(commit) => {
                if !session.state.is_known(&commit) {
                    stack.push(Frame::open(rt, session, &commit));
                }
            }
            Action::End(end) => {
                unwind(stack, session, end);
                return end;
            }
        }
    }
    AnalysisEnd::Completed
}

fn unwind(stack: Vec<Frame>, session: &Session, end: AnalysisEnd) {
    let outcome = match end {
        AnalysisEnd::Completed => "analyzed",
        AnalysisEnd::Halted => "halted",
        AnalysisEnd::Cancelled => "cancelled",
    };
    for frame in stack.into_iter().rev() {
        frame.close(session, outcome);
    }
}

fn step(rt: &mut Runtime<'_>, session: &mut Session, frame: &mut Frame) -> Action {
    let task = frame.files[frame.index].clone();
    let local = session.renames.resolve(task.target_path()).to_string();

    match frame.step {
        Step::Presence => {
            frame.step = Step::LastTouch;
            let Some(expected) = task.expected.as_deref() else {
                return Action::Continue;
            };
            if session.resolved_files.contains(&local) {
                debug!(path = local.as_str(), "already provided for");
                frame.next_file();
                return Action::Continue;
            }
            if rt.vcs.exists_in_index(&local) {
                return Action::Continue;
            }
            match handle_missing(rt, session, &frame.commit, expected, &local) {
                Missing::Provided => Action::Continue,
                Missing::SkipFile => {
                    frame.next_file();
                    Action::Continue
                }
                Missing::Halt => {
                    session.state.stop = true;
                    Action::Continue
                }
                Missing::Cancel => Action::End(AnalysisEnd::Cancelled),
            }
        }
        Step::LastTouch => {
            frame.step = Step::Dependencies;
            if !rt.vcs.exists_in_index(&local) {
                return Action::Continue;
            }
            let Some(last) = rt.vcs.last_touch(&local) else {
                return Action::Continue;
            };
            if last == frame.commit || !is_candidate(rt, session, &last, &frame.commit) {
                return Action::Continue;
            }
            let context = display::commit_context(rt.vcs, &mut session.authors, &last);
            let queued = session.state.queued_count(&session.requested);
            let menu = offer_menu(
                format!("{local} was last modified by {context}. Add it as a dependency?"),
                queued,
            );
            accept_offer(rt, session, &menu, &last, &frame.commit)
        }
        Step::Dependencies => {
            if frame.deps.is_none() {
                let found = find_dependencies(rt.vcs, session, &frame.commit, &task.path, &local);
                let relevant: Vec<CommitRef> = found
                    .into_iter()
                    .filter(|d| is_candidate(rt, session, d, &frame.commit))
                    .collect();
                if !relevant.is_empty() {
                    show_commits(
                        rt,
                        session,
                        &format!("Possible dependencies of {}:", task.path),
                        &relevant,
                    );
                }
                frame.deps = Some(relevant);
            }

            let next = frame
                .deps
                .as_ref()
                .and_then(|deps| deps.get(frame.dep_index))
                .cloned();
            let Some(dep) = next else {
                frame.next_file();
                return Action::Continue;
            };
            frame.dep_index += 1;

            // an earlier offer or a deeper frame may have settled it
            if session.state.is_known(&dep) || session.state.ordered_before(&dep, &frame.commit) {
                return Action::Continue;
            }
            if session.config.auto_add_dependencies {
                add_dependency(rt, session, &dep, &frame.commit);
                return Action::Descend(dep);
            }
            let context = display::commit_context(rt.vcs, &mut session.authors, &dep);
            let queued = session.state.queued_count(&session.requested);
            let menu = offer_menu(format!("Add dependency {context}?"), queued);
            accept_offer(rt, session, &menu, &dep, &frame.commit)
        }
    }
}

/// Worth offering as a dependency of `anchor`.
fn is_candidate(
    rt: &Runtime<'_>,
    session: &Session,
    commit: &CommitRef,
    anchor: &CommitRef,
) -> bool {
    commit != anchor
        && !session.state.is_known(commit)
        && !session.state.ordered_before(commit, anchor)
        && !rt.vcs.contains(commit)
}

fn add_dependency(rt: &Runtime<'_>, session: &mut Session, dep: &CommitRef, anchor: &CommitRef) {
    session.state.add_dependency(dep, anchor);
    let context = display::commit_context(rt.vcs, &mut session.authors, dep);
    display::added(&format!("Added dependency: {context}"));
    info!(dependency = dep.short(), anchor = anchor.short(), "dependency added");
}

fn show_commits(rt: &Runtime<'_>, session: &mut Session, title: &str, commits: &[CommitRef]) {
    let lines: Vec<String> = commits
        .iter()
        .map(|c| display::commit_context(rt.vcs, &mut session.authors, c))
        .collect();
    display::found(title);
    for line in display::numbered(&lines, session.config.max_commits_display) {
        println!("{line}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Offer {
    Add,
    Stop,
}

/// Add-or-stop decision for a suspected dependency.
fn offer_menu(title: String, queued: usize) -> Menu<Offer> {
    Menu::new(title)
        .choice("Add it and analyze it now", Offer::Add)
        .as_default()
        .choice(
            format!("Stop analysis and continue with the cherry-pick ({queued})"),
            Offer::Stop,
        )
        .as_escape()
}

fn accept_offer(
    rt: &mut Runtime<'_>,
    session: &mut Session,
    menu: &Menu<Offer>,
    dep: &CommitRef,
    anchor: &CommitRef,
) -> Action {
    match choose(rt.ui, menu, Offer::Add) {
        Offer::Add => {
            add_dependency(rt, session, dep, anchor);
            Action::Descend(dep.clone())
        }
        Offer::Stop => {
            session.state.stop = true;
            Action::Continue
        }
    }
}

enum Missing {
    /// Something now provides the file; keep analyzing it.
    Provided,
    SkipFile,
    Halt,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchPrompt {
    Search,
    Ignore,
    ApplyNow,
    Cancel,
}

fn search_menu(file: &str, queued: usize) -> Menu<SearchPrompt> {
    Menu::new(format!("{file} does not exist here. What now?"))
        .choice("Search for the commit that created it", SearchPrompt::Search)
        .as_default()
        .choice("Ignore this file", SearchPrompt::Ignore)
        .choice(
            format!("Stop analysis and continue with the cherry-pick ({queued})"),
            SearchPrompt::ApplyNow,
        )
        .choice("Cancel the whole operation", SearchPrompt::Cancel)
        .as_escape()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OriginChoice {
    WholeChain,
    OriginOnly,
    LocalPath,
    Halt,
}

fn origin_menu(file: &str, chain_len: usize, queued: usize) -> Menu<OriginChoice> {
    let menu = Menu::new(format!("How to provide {file}?"));
    let menu = if chain_len > 1 {
        menu.choice(
            format!("Add the whole history chain ({chain_len} commits)"),
            OriginChoice::WholeChain,
        )
        .as_default()
        .choice("Add only the origin commit", OriginChoice::OriginOnly)
    } else {
        menu.choice("Add the origin commit", OriginChoice::OriginOnly)
            .as_default()
    };
    menu.choice("Use a different local path", OriginChoice::LocalPath)
        .choice(
            format!("Stop analysis and continue with the cherry-pick ({queued})"),
            OriginChoice::Halt,
        )
        .as_escape()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoOrigin {
    LocalPath,
    Skip,
    Halt,
    Cancel,
}

fn no_origin_menu(file: &str, queued: usize) -> Menu<NoOrigin> {
    Menu::new(format!("No commit creating {file} was found. What now?"))
        .choice("Specify the local path of this file", NoOrigin::LocalPath)
        .choice("Skip this file", NoOrigin::Skip)
        .as_default()
        .choice(
            format!("Stop analysis and continue with the cherry-pick ({queued})"),
            NoOrigin::Halt,
        )
        .choice("Cancel the whole operation", NoOrigin::Cancel)
        .as_escape()
}

/// `file` (as `commit` records it) is absent locally as `local`.
fn handle_missing(
    rt: &mut Runtime<'_>,
    session: &mut Session,
    commit: &CommitRef,
    file: &str,
    local: &str,
) -> Missing {
    if !session.processed_missing.insert(format!("{file}:{commit}")) {
        return Missing::SkipFile;
    }
    display::warn(&format!("File {local} does not exist on the target line"));
    warn!(file, local, commit = commit.short(), "missing file");

    let queued = session.state.queued_count(&session.requested);
    match choose(rt.ui, &search_menu(file, queued), SearchPrompt::Search) {
        SearchPrompt::Search => {}
        SearchPrompt::Ignore => return Missing::SkipFile,
        SearchPrompt::Cancel => return Missing::Cancel,
        SearchPrompt::ApplyNow => {
            if session.state.final_commits.is_empty() {
                display::warn("Nothing is queued yet; ignoring the file");
                return Missing::SkipFile;
            }
            return Missing::Halt;
        }
    }

    match locate_file_origin(rt.vcs, session, file) {
        Some(origin) => provide_from_origin(rt, session, commit, file, local, origin),
        None => {
            display::error(&format!("Could not find any commit that created {file}"));
            let queued = session.state.queued_count(&session.requested);
            match choose(rt.ui, &no_origin_menu(file, queued), NoOrigin::Skip) {
                NoOrigin::LocalPath => {
                    if ask_local_path(rt, session, file) {
                        Missing::Provided
                    } else {
                        Missing::SkipFile
                    }
                }
                NoOrigin::Skip => Missing::SkipFile,
                NoOrigin::Halt => Missing::Halt,
                NoOrigin::Cancel => Missing::Cancel,
            }
        }
    }
}

fn provide_from_origin(
    rt: &mut Runtime<'_>,
    session: &mut Session,
    commit: &CommitRef,
    file: &str,
    local: &str,
    origin: Origin,
) -> Missing {
    let context = display::commit_context(rt.vcs, &mut session.authors, &origin.commit);
    display::found(&format!("File was originally added in: {context} (via {})", origin.source));

    let chain: Vec<CommitRef> = history_chain_from(rt.vcs, &origin.commit, file, Some(commit))
        .into_iter()
        .filter(|c| c != commit && !session.state.was_applied(c) && !rt.vcs.contains(c))
        .collect();
    if chain.len() > 1 {
        show_commits(rt, session, &format!("History of {file}:"), &chain);
    }

    let queued = session.state.queued_count(&session.requested);
    match choose(
        rt.ui,
        &origin_menu(file, chain.len(), queued),
        OriginChoice::OriginOnly,
    ) {
        OriginChoice::WholeChain => {
            for link in &chain {
                add_dependency(rt, session, link, commit);
            }
            session.resolved_files.insert(local.to_string());
            Missing::Provided
        }
        OriginChoice::OriginOnly => {
            if !session.state.was_applied(&origin.commit) && &origin.commit != commit {
                add_dependency(rt, session, &origin.commit, commit);
            }
            session.resolved_files.insert(local.to_string());
            Missing::Provided
        }
        OriginChoice::LocalPath => {
            if ask_local_path(rt, session, file) {
                Missing::Provided
            } else {
                Missing::SkipFile
            }
        }
        OriginChoice::Halt => Missing::Halt,
    }
}

/// Ask where `file` lives locally and record the override.
pub(crate) fn ask_local_path(rt: &mut Runtime<'_>, session: &mut Session, file: &str) -> bool {
    let Some(local) = rt.ui.input(&format!("Local path for {file}")) else {
        return false;
    };
    if !rt.vcs.exists_in_index(&local) {
        display::warn(&format!("{local} is not tracked; recording it anyway"));
    }
    session.renames.record(file, &local);
    display::success(&format!("Mapped {file} -> {local}"));
    info!(file, local = local.as_str(), "local path override recorded");
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessChoice {
    Analyze,
    Direct,
    Edit,
    Cancel,
}

fn process_menu(context: &str) -> Menu<ProcessChoice> {
    Menu::new(format!("What to do with {context}?"))
        .choice("Analyze its dependencies", ProcessChoice::Analyze)
        .as_default()
        .choice("Cherry-pick it directly", ProcessChoice::Direct)
        .choice("Edit it, then apply", ProcessChoice::Edit)
        .choice("Cancel the whole operation", ProcessChoice::Cancel)
        .as_escape()
}

/// Handle one requested commit: analyze it, apply it straight away, or edit
/// it before applying.
pub fn process_commit(rt: &mut Runtime<'_>, session: &mut Session, commit: &CommitRef) -> AnalysisEnd {
    if session.state.was_applied(commit) {
        display::warn(&format!("Commit {} was already applied, skipping", commit.short()));
        return AnalysisEnd::Completed;
    }
    let context = display::commit_context(rt.vcs, &mut session.authors, commit);
    match choose(rt.ui, &process_menu(&context), ProcessChoice::Analyze) {
        ProcessChoice::Analyze => analyze(rt, session, commit),
        ProcessChoice::Direct => {
            apply::direct_pick(rt, session, commit);
            AnalysisEnd::Completed
        }
        ProcessChoice::Edit => {
            apply::edit_pick(rt, session, commit);
            AnalysisEnd::Completed
        }
        ProcessChoice::Cancel => AnalysisEnd::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn added_files_expect_nothing() {
        let task = FileTask::from_change(ChangedPath {
            status: ChangeStatus::Added,
            path: "new.c".into(),
            old_path: None,
        });
        assert!(task.expected.is_none());
        assert_eq!(task.target_path(), "new.c");
    }

    #[test]
    fn renamed_files_expect_the_old_path() {
        let task = FileTask::from_change(ChangedPath {
            status: ChangeStatus::Renamed,
            path: "b.c".into(),
            old_path: Some("a.c".into()),
        });
        assert_eq!(task.expected.as_deref(), Some("a.c"));
        assert_eq!(task.path, "b.c");
    }

    #[test]
    fn search_is_the_automatic_choice() {
        let menu = search_menu("x.c", 2);
        assert_eq!(menu.default_value(), Some(SearchPrompt::Search));
        assert!(menu.labels()[2].contains("(2)"));
    }

    #[test]
    fn chain_menu_defaults_to_whole_chain() {
        let menu = origin_menu("x.c", 3, 1);
        assert_eq!(menu.default_value(), Some(OriginChoice::WholeChain));
        assert!(menu.labels()[0].contains("3 commits"));

        let single = origin_menu("x.c", 1, 1);
        assert_eq!(single.default_value(), Some(OriginChoice::OriginOnly));
        assert!(
            !single
                .choices
                .iter()
                .any(|c| c.value == OriginChoice::WholeChain)
        );
    }

    #[test]
    fn unresolvable_file_defaults_to_skip() {
        assert_eq!(no_origin_menu("x.c", 0).default_value(), Some(NoOrigin::Skip));
    }

    #[test]
    fn dependencies_default_to_add() {
        let menu = offer_menu("Add?".into(), 4);
        assert_eq!(menu.default_value(), Some(Offer::Add));
        assert_eq!(menu.resolve(1), Some(Offer::Stop));
    }

    #[test]
    fn analysis_is_the_default_processing() {
        assert_eq!(process_menu("c").default_value(), Some(ProcessChoice::Analyze));
    }

    #[test]
    fn dismissing_a_menu_stops_or_cancels() {
        assert_eq!(process_menu("c").escape_value(), Some(ProcessChoice::Cancel));
        assert_eq!(offer_menu("Add?".into(), 1).escape_value(), Some(Offer::Stop));
        assert_eq!(search_menu("x.c", 1).escape_value(), Some(SearchPrompt::Cancel));
        assert_eq!(origin_menu("x.c", 2, 1).escape_value(), Some(OriginChoice::Halt));
        assert_eq!(no_origin_menu("x.c", 1).escape_value(), Some(NoOrigin::Cancel));
    }
}
