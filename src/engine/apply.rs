//! Apply Engine: replays the planned commits in order and recovers from
//! missing paths and conflicts.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::sync::LazyLock;
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use super::Runtime;
use super::analysis::ask_local_path;
use super::patch::{failed_apply_paths, patch_paths, rewrite_paths};
use super::resolver::{history_chain_from, locate_file_origin};
use super::similarity::find_similar_files;
use crate::cache::store::StateStore;
use crate::config::ConflictPolicy;
use crate::display;
use crate::models::commit::CommitRef;
use crate::models::outcome::{ApplyOutcome, BatchSummary, ReplayFailure, ReplayResult, Resolution};
use crate::prompt::{Menu, choose};
use crate::session::Session;
use crate::stats::{Operation, StatRecord};
use crate::vcs::Vcs;

/// Editor rounds offered before unresolved conflicts abandon the commit.
pub const MAX_CONFLICT_PASSES: usize = 3;

/// Nesting limit for dependencies replayed while recovering a commit.
const MAX_RECOVERY_DEPTH: usize = 3;

static MISSING_INDEX_ENTRY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"error: ([^:\n]+): does not exist in index").ok());

/// Per-commit counters for the stats row.
#[derive(Debug, Default)]
struct Tally {
    conflicts: usize,
}

/// Apply order for this run.
pub fn build_plan(session: &Session) -> Vec<CommitRef> {
    session.state.build_plan(&session.requested)
}

/// What to do once analysis is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proceed {
    Apply,
    SaveAndExit,
    Cancel,
}

pub fn proceed_menu(count: usize) -> Menu<Proceed> {
    Menu::new("Ready to cherry-pick. Continue?")
        .choice(
            format!("Continue with the cherry-pick ({count} commits)"),
            Proceed::Apply,
        )
        .as_default()
        .choice("Save the list for --apply-saved and exit", Proceed::SaveAndExit)
        .choice("Cancel (apply nothing)", Proceed::Cancel)
        .as_escape()
}

/// Show the plan and ask whether to go ahead.
pub fn review_plan(rt: &mut Runtime<'_>, session: &mut Session, plan: &[CommitRef]) -> Proceed {
    display::info(&format!("\nCommits to cherry-pick, in order ({}):", plan.len()));
    for (i, commit) in plan.iter().enumerate() {
        let context = display::commit_context(rt.vcs, &mut session.authors, commit);
        println!("  {}. {context}", i + 1);
    }
    choose(rt.ui, &proceed_menu(plan.len()), Proceed::Apply)
}

/// Replay `plan` in order.
///
/// The plan is saved first, dry runs included. A dry run replays nothing and
/// leaves the applied set untouched. A failing commit never stops the batch;
/// an interrupt leaves the rest unattempted.
pub fn apply_all(
    rt: &mut Runtime<'_>,
    session: &mut Session,
    store: &StateStore,
    plan: &[CommitRef],
) -> Result<BatchSummary> {
    store.save_commit_list(plan)?;
    let started = Instant::now();
    let mut summary = BatchSummary {
        total: plan.len(),
        ..BatchSummary::default()
    };

    if session.options.dry_run {
        display::warn(&format!("[dry run] {} commits would be cherry-picked:", plan.len()));
        for (i, commit) in plan.iter().enumerate() {
            let context = display::commit_context(rt.vcs, &mut session.authors, commit);
            println!("  {}. {context}", i + 1);
        }
        info!(count = plan.len(), "dry run, nothing applied");
        return Ok(summary);
    }

    info!(count = plan.len(), "applying commits");
    let progress = display::progress(plan.len(), "Cherry-picking", session.config.show_progress);
    for commit in plan {
        if session.cancel.is_cancelled() {
            warn!(remaining = plan.len() - summary.succeeded - summary.failed, "interrupted, stopping batch");
            break;
        }
        let outcome = progress.suspend(|| apply_and_record(rt, session, commit, Operation::CherryPick));
        progress.inc(1);
        if outcome.is_success() {
            summary.succeeded += 1;
        } else {
            summary.failed += 1;
            summary.failures.push(commit.clone());
        }
    }
    progress.finish_and_clear();

    summary.elapsed_secs = started.elapsed().as_secs();
    display::summary(&summary);
    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "batch finished"
    );
    Ok(summary)
}

/// Cherry-pick one requested commit without analysis.
///
/// A failure is reported and the commit is left out of the batch.
pub fn direct_pick(rt: &mut Runtime<'_>, session: &mut Session, commit: &CommitRef) -> ApplyOutcome {
    if session.options.dry_run {
        display::warn(&format!("[dry run] would cherry-pick {}", commit.short()));
        session.state.push_final(commit);
        return ApplyOutcome::Applied {
            resolution: Resolution::None,
        };
    }
    let outcome = apply_and_record(rt, session, commit, Operation::DirectPick);
    if !outcome.is_success() {
        session.state.skipped.insert(commit.clone());
    }
    outcome
}

/// Replay without committing, let the user edit files and message, commit.
pub fn edit_pick(rt: &mut Runtime<'_>, session: &mut Session, commit: &CommitRef) -> ApplyOutcome {
    if session.options.dry_run {
        display::warn(&format!("[dry run] would edit and apply {}", commit.short()));
        session.state.push_final(commit);
        return ApplyOutcome::Applied {
            resolution: Resolution::Edited,
        };
    }
    let started = Instant::now();
    let outcome = edit_then_apply(rt, session, commit);
    report(commit, &outcome);
    record(rt.vcs, session, commit, Operation::EditPick, &outcome, started, 0);
    if !outcome.is_success() {
        session.state.skipped.insert(commit.clone());
    }
    outcome
}

fn apply_and_record(
    rt: &mut Runtime<'_>,
    session: &mut Session,
    commit: &CommitRef,
    operation: Operation,
) -> ApplyOutcome {
    let started = Instant::now();
    if session.state.was_applied(commit) {
        display::info(&format!("Commit {} was already applied, skipping", commit.short()));
        let outcome = ApplyOutcome::AlreadyApplied;
        record(rt.vcs, session, commit, operation, &outcome, started, 0);
        return outcome;
    }

    let mut tally = Tally::default();
    let outcome = apply_commit(rt, session, commit, 0, &mut tally);
    report(commit, &outcome);
    record(rt.vcs, session, commit, operation, &outcome, started, tally.conflicts);
    outcome
}

fn report(commit: &CommitRef, outcome: &ApplyOutcome) {
    match outcome {
        ApplyOutcome::Applied { resolution } => {
            info!(commit = commit.short(), resolution = resolution.as_str(), "applied");
        }
        ApplyOutcome::AlreadyApplied => {}
        ApplyOutcome::Failed { reason } => {
            error!(commit = commit.short(), reason = reason.as_str(), "failed");
            display::error(&format!("Could not apply {}: {reason}", commit.short()));
        }
        ApplyOutcome::Aborted => {
            warn!(commit = commit.short(), "aborted by user");
            display::warn(&format!("Cherry-pick of {} aborted", commit.short()));
        }
    }
}

fn record(
    vcs: &dyn Vcs,
    session: &Session,
    commit: &CommitRef,
    operation: Operation,
    outcome: &ApplyOutcome,
    started: Instant,
    conflicts: usize,
) {
    if !session.stats.is_enabled() {
        return;
    }
    let resolution = match outcome {
        ApplyOutcome::Applied { resolution } => *resolution,
        _ => Resolution::None,
    };
    let row = StatRecord {
        commit: commit.clone(),
        operation,
        outcome: outcome.label().to_string(),
        duration_ms: started.elapsed().as_millis(),
        file_count: vcs.changed_paths(commit).len(),
        conflict_count: conflicts,
        resolution,
    };
    if let Err(e) = session.stats.record(&row) {
        warn!(error = %e, "failed to record stats");
    }
}

fn applied(session: &mut Session, commit: &CommitRef, resolution: Resolution) -> ApplyOutcome {
    session.state.mark_applied(commit);
    display::success(&format!("Cherry-picked {}", commit.short()));
    ApplyOutcome::Applied { resolution }
}

fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("unknown failure")
        .to_string()
}

fn apply_commit(
    rt: &mut Runtime<'_>,
    session: &mut Session,
    commit: &CommitRef,
    depth: usize,
    tally: &mut Tally,
) -> ApplyOutcome {
    let context = display::commit_context(rt.vcs, &mut session.authors, commit);
    display::info(&format!("Cherry-picking {context}"));
    let result = rt.vcs.cherry_pick(commit, false);
    if result.success {
        return applied(session, commit, Resolution::None);
    }
    debug!(commit = commit.short(), stderr = result.stderr.trim(), "cherry-pick failed");
    recover(rt, session, commit, &result, depth, true, tally)
}

/// Classify a failed replay.
///
/// Paths the replay names as absent from the index win over unmerged paths;
/// anything else is unclassified.
pub fn classify(vcs: &dyn Vcs, result: &ReplayResult) -> ReplayFailure {
    let mut missing: Vec<String> = Vec::new();
    if let Some(re) = MISSING_INDEX_ENTRY.as_ref() {
        for text in [result.combined(), vcs.status_text()] {
            for caps in re.captures_iter(&text) {
                let path = caps[1].trim().to_string();
                if !missing.contains(&path) {
                    missing.push(path);
                }
            }
        }
    }
    if !missing.is_empty() {
        return ReplayFailure::MissingIndexEntries(missing);
    }

    let unmerged = vcs.unmerged_paths();
    if !unmerged.is_empty() {
        return ReplayFailure::Conflict(unmerged);
    }
    ReplayFailure::Unclassified(first_line(&result.combined()))
}

fn recover(
    rt: &mut Runtime<'_>,
    session: &mut Session,
    commit: &CommitRef,
    result: &ReplayResult,
    depth: usize,
    allow_missing: bool,
    tally: &mut Tally,
) -> ApplyOutcome {
    match classify(rt.vcs, result) {
        ReplayFailure::MissingIndexEntries(paths) if allow_missing => {
            recover_missing(rt, session, commit, &paths, depth, tally)
        }
        ReplayFailure::MissingIndexEntries(paths) => {
            rt.vcs.cherry_pick_abort();
            ApplyOutcome::Failed {
                reason: format!("still missing after recovery: {}", paths.join(", ")),
            }
        }
        ReplayFailure::Conflict(paths) => {
            tally.conflicts += paths.len();
            resolve_conflict(rt, session, commit, &paths)
        }
        ReplayFailure::Unclassified(reason) => {
            rt.vcs.cherry_pick_abort();
            display::error("Cherry-pick failed without detectable conflicts.");
            ApplyOutcome::Failed { reason }
        }
    }
}

/// How one missing path was provided for.
enum Provision {
    Commits(Vec<CommitRef>),
    LocalPath,
    Created,
    Declined,
    Unresolved(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MissingChoice {
    WholeChain,
    OriginOnly,
    LocalPath,
    Create,
    Skip,
}

fn missing_file_menu(path: &str) -> Menu<MissingChoice> {
    Menu::new(format!("How to provide {path}?"))
        .choice("Add its whole history chain", MissingChoice::WholeChain)
        .as_default()
        .choice("Add only the commit that created it", MissingChoice::OriginOnly)
        .choice("Use a different local path", MissingChoice::LocalPath)
        .choice("Create it from its content before this commit", MissingChoice::Create)
        .choice("Skip this file", MissingChoice::Skip)
        .as_escape()
}

fn recover_missing(
    rt: &mut Runtime<'_>,
    session: &mut Session,
    commit: &CommitRef,
    paths: &[String],
    depth: usize,
    tally: &mut Tally,
) -> ApplyOutcome {
    display::warn(&format!("Files missing from the index for {}:", commit.short()));
    for path in paths {
        println!("  - {path}");
    }
    rt.vcs.cherry_pick_abort();

    let mut extra: Vec<CommitRef> = Vec::new();
    let mut remapped = false;
    for path in paths {
        if session.cancel.is_cancelled() {
            return ApplyOutcome::Failed {
                reason: "interrupted".to_string(),
            };
        }
        match provide_missing(rt, session, commit, path) {
            Provision::Commits(commits) => extra.extend(commits),
            Provision::LocalPath => remapped = true,
            Provision::Created | Provision::Declined => {}
            Provision::Unresolved(reason) => {
                return ApplyOutcome::Failed {
                    reason: format!("{path}: {reason}"),
                };
            }
        }
    }

    let mut seen: HashSet<CommitRef> = HashSet::new();
    for dep in extra {
        if &dep == commit || session.state.was_applied(&dep) || !seen.insert(dep.clone()) {
            continue;
        }
        session.state.insert_before(&dep, commit);
        if depth >= MAX_RECOVERY_DEPTH {
            warn!(dependency = dep.short(), "recovery depth reached, not replaying");
            continue;
        }
        let outcome = apply_commit(rt, session, &dep, depth + 1, tally);
        if !outcome.is_success() {
            display::warn(&format!(
                "Dependency {} did not apply; retrying {} anyway",
                dep.short(),
                commit.short()
            ));
        }
    }

    display::info(&format!("Retrying {}", commit.short()));
    if remapped {
        return if rename_patch(rt, session, commit, paths) {
            applied(session, commit, Resolution::MissingFiles)
        } else {
            ApplyOutcome::Failed {
                reason: "patch with local paths did not apply".to_string(),
            }
        };
    }
    let retry = rt.vcs.cherry_pick(commit, false);
    if retry.success {
        return applied(session, commit, Resolution::MissingFiles);
    }
    recover(rt, session, commit, &retry, depth, false, tally)
}

fn provide_missing(
    rt: &mut Runtime<'_>,
    session: &mut Session,
    commit: &CommitRef,
    path: &str,
) -> Provision {
    let search = Menu::new(format!("{path} is missing. Search its history?"))
        .choice("Search for the commit that created it", true)
        .as_default()
        .choice("Skip this file", false)
        .as_escape();
    if !choose(rt.ui, &search, true) {
        return Provision::Declined;
    }

    let Some(origin) = locate_file_origin(rt.vcs, session, path) else {
        display::error(&format!("Could not find any commit that created {path}"));
        let menu = Menu::new(format!("No origin for {path}. What now?"))
            .choice("Specify the local path of this file", true)
            .choice("Skip this file", false)
            .as_default()
            .as_escape();
        if choose(rt.ui, &menu, false) && ask_local_path(rt, session, path) {
            return Provision::LocalPath;
        }
        return Provision::Declined;
    };

    let context = display::commit_context(rt.vcs, &mut session.authors, &origin.commit);
    display::found(&format!("File was originally added in: {context} (via {})", origin.source));

    let vcs = rt.vcs;
    let pending = |session: &Session, c: &CommitRef| {
        c != commit && !session.state.was_applied(c) && !vcs.contains(c)
    };
    match choose(rt.ui, &missing_file_menu(path), MissingChoice::WholeChain) {
        MissingChoice::WholeChain => {
            let chain: Vec<CommitRef> = history_chain_from(vcs, &origin.commit, path, Some(commit))
                .into_iter()
                .filter(|c| pending(session, c))
                .collect();
            if chain.is_empty() {
                display::warn(&format!("Nothing left to add for {path}"));
                return Provision::Declined;
            }
            display::added(&format!("Adding {} commits for {path}", chain.len()));
            session.resolved_files.insert(path.to_string());
            Provision::Commits(chain)
        }
        MissingChoice::OriginOnly => {
            if !pending(session, &origin.commit) {
                return Provision::Declined;
            }
            session.resolved_files.insert(path.to_string());
            Provision::Commits(vec![origin.commit])
        }
        MissingChoice::LocalPath => {
            if ask_local_path(rt, session, path) {
                Provision::LocalPath
            } else {
                Provision::Declined
            }
        }
        MissingChoice::Create => match create_file(vcs, session, commit, path) {
            Ok(()) => Provision::Created,
            Err(e) => Provision::Unresolved(format!("{e:#}")),
        },
        MissingChoice::Skip => Provision::Declined,
    }
}

/// Write `path` as it was just before `commit` and commit it on its own.
fn create_file(vcs: &dyn Vcs, session: &mut Session, commit: &CommitRef, path: &str) -> Result<()> {
    let parent = CommitRef::new(format!("{}^", commit.as_str()));
    let content = vcs
        .show_file(&parent, path)
        .or_else(|| vcs.show_file(commit, path))
        .ok_or_else(|| anyhow!("no content for {path} at {}", commit.short()))?;

    let target = vcs.workdir().join(path);
    if let Some(dir) = target.parent() {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    fs::write(&target, content).with_context(|| format!("Failed to write {}", target.display()))?;

    if !vcs.stage(&[path.to_string()]) {
        bail!("failed to stage {path}");
    }
    let committed = vcs.commit_staged(&format!("Add {path} as of {}^", commit.short()));
    if !committed.success {
        bail!("failed to commit {path}: {}", first_line(&committed.stderr));
    }
    session.resolved_files.insert(path.to_string());
    display::success(&format!("Created {path} from {}", commit.short()));
    info!(path, commit = commit.short(), "missing file created");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConflictChoice {
    Manual,
    RenamePatch,
    Abort,
}

fn conflict_menu(commit: &CommitRef) -> Menu<ConflictChoice> {
    Menu::new(format!("Conflicts in {}. How to resolve?", commit.short()))
        .choice("Resolve manually in the editor", ConflictChoice::Manual)
        .as_default()
        .choice("Retry as a patch with renamed paths", ConflictChoice::RenamePatch)
        .choice("Abort this commit", ConflictChoice::Abort)
        .as_escape()
}

fn resolve_conflict(
    rt: &mut Runtime<'_>,
    session: &mut Session,
    commit: &CommitRef,
    paths: &[String],
) -> ApplyOutcome {
    display::warn(&format!("Conflicts while cherry-picking {}:", commit.short()));
    for path in paths {
        println!("  - {path}");
    }

    let side = match session.config.conflict_policy {
        ConflictPolicy::Manual => None,
        ConflictPolicy::Ours => Some(true),
        ConflictPolicy::Theirs => Some(false),
    };
    if let Some(ours) = side
        && let Some(outcome) = resolve_by_policy(rt.vcs, session, commit, paths, ours)
    {
        return outcome;
    }

    match choose(rt.ui, &conflict_menu(commit), ConflictChoice::Manual) {
        ConflictChoice::Manual => resolve_manually(rt, session, commit),
        ConflictChoice::RenamePatch => {
            rt.vcs.cherry_pick_abort();
            if rename_patch(rt, session, commit, paths) {
                applied(session, commit, Resolution::RenamePatch)
            } else {
                ApplyOutcome::Failed {
                    reason: "patch with renamed paths did not apply".to_string(),
                }
            }
        }
        ConflictChoice::Abort => {
            rt.vcs.cherry_pick_abort();
            ApplyOutcome::Aborted
        }
    }
}

/// Take one side of every conflicted path. `None` when conflicts remain.
fn resolve_by_policy(
    vcs: &dyn Vcs,
    session: &mut Session,
    commit: &CommitRef,
    paths: &[String],
    ours: bool,
) -> Option<ApplyOutcome> {
    let side = if ours { "ours" } else { "theirs" };
    for path in paths {
        if !vcs.checkout_side(path, ours) {
            warn!(path = path.as_str(), side, "could not take side");
        }
    }
    if !vcs.unmerged_paths().is_empty() {
        display::warn(&format!("Conflict policy '{side}' left unmerged paths"));
        return None;
    }
    let result = vcs.cherry_pick_continue();
    if result.success {
        let resolution = if ours {
            Resolution::PolicyOurs
        } else {
            Resolution::PolicyTheirs
        };
        return Some(applied(session, commit, resolution));
    }
    vcs.cherry_pick_abort();
    Some(ApplyOutcome::Failed {
        reason: first_line(&result.combined()),
    })
}

fn resolve_manually(rt: &mut Runtime<'_>, session: &mut Session, commit: &CommitRef) -> ApplyOutcome {
    for pass in 1..=MAX_CONFLICT_PASSES {
        let remaining = rt.vcs.unmerged_paths();
        if remaining.is_empty() {
            break;
        }
        display::info(&format!("Resolution pass {pass}/{MAX_CONFLICT_PASSES}"));
        for path in &remaining {
            if session.cancel.is_cancelled() {
                rt.vcs.cherry_pick_abort();
                return ApplyOutcome::Aborted;
            }
            if let Err(e) = rt.editor.edit(rt.vcs.workdir(), std::slice::from_ref(path)) {
                display::error(&format!("{e:#}"));
            }
            if rt.ui.confirm(&format!("Mark {path} as resolved?"), true)
                && !rt.vcs.stage(std::slice::from_ref(path))
            {
                warn!(path = path.as_str(), "failed to stage");
            }
        }

        let left = rt.vcs.unmerged_paths();
        if left.is_empty() {
            break;
        }
        display::warn(&format!("Still unmerged: {}", left.join(", ")));
        if pass < MAX_CONFLICT_PASSES && !rt.ui.confirm("Resolve the remaining files now?", true) {
            break;
        }
    }

    let left = rt.vcs.unmerged_paths();
    if !left.is_empty() {
        rt.vcs.cherry_pick_abort();
        return ApplyOutcome::Failed {
            reason: format!("unresolved conflicts in {}", left.join(", ")),
        };
    }
    if !rt.ui.confirm("Stage all changes and finish the cherry-pick?", true) {
        rt.vcs.cherry_pick_abort();
        return ApplyOutcome::Aborted;
    }
    if !rt.vcs.stage_all() {
        warn!("failed to stage all changes");
    }
    let result = rt.vcs.cherry_pick_continue();
    if result.success {
        return applied(session, commit, Resolution::Manual);
    }
    rt.vcs.cherry_pick_abort();
    ApplyOutcome::Failed {
        reason: first_line(&result.combined()),
    }
}

/// Regenerate `commit` as a patch with renamed paths and apply it.
///
/// `paths` are offered for rename edits before the first attempt; paths
/// the patch still fails on are offered again before the single retry. The
/// result is committed with the original message.
fn rename_patch(
    rt: &mut Runtime<'_>,
    session: &mut Session,
    commit: &CommitRef,
    paths: &[String],
) -> bool {
    let Some(patch) = rt.vcs.format_patch(commit) else {
        display::error(&format!("Could not generate a patch for {}", commit.short()));
        return false;
    };

    detect_renames(rt.vcs, session, &patch_paths(&patch));
    edit_renames(rt, session, paths);

    let mut result = apply_renamed(rt.vcs, session, &patch);
    if !result.success {
        let check = rt.vcs.check_patch(&rewrite_paths(&patch, session.renames.as_map()));
        let mut failed = failed_apply_paths(&check.combined());
        if failed.is_empty() {
            failed = failed_apply_paths(&result.combined());
        }
        if failed.is_empty() {
            display::error(&format!("Patch does not apply: {}", first_line(&result.combined())));
            return false;
        }
        display::warn("The patch failed for:");
        for path in &failed {
            println!("  - {path}");
        }
        let failed: Vec<String> = failed.iter().map(|p| canonical_path(session, p)).collect();
        detect_renames(rt.vcs, session, &failed);
        edit_renames(rt, session, &failed);

        result = apply_renamed(rt.vcs, session, &patch);
        if !result.success {
            display::error(&format!(
                "Patch still does not apply: {}",
                first_line(&result.combined())
            ));
            return false;
        }
    }

    if rt.vcs.has_staged_changes() {
        let message = rt
            .vcs
            .commit_message(commit)
            .unwrap_or_else(|| format!("Cherry-pick {commit}"));
        let committed = rt.vcs.commit_staged(&message);
        if !committed.success {
            display::error(&format!("Commit failed: {}", first_line(&committed.stderr)));
            return false;
        }
    }
    true
}

fn apply_renamed(vcs: &dyn Vcs, session: &Session, patch: &str) -> ReplayResult {
    let rewritten = rewrite_paths(patch, session.renames.as_map());
    vcs.apply_patch(&rewritten)
}

/// Key of the rename that produced `path`, or `path` itself.
fn canonical_path(session: &Session, path: &str) -> String {
    session
        .renames
        .as_map()
        .iter()
        .find(|(_, to)| to.as_str() == path)
        .map(|(from, _)| from.clone())
        .unwrap_or_else(|| path.to_string())
}

/// Record the best similar local file for every unmapped path that is
/// absent here.
fn detect_renames(vcs: &dyn Vcs, session: &mut Session, paths: &[String]) {
    let threshold = u32::from(session.config.rename_threshold);
    let mut tracked: Option<Vec<String>> = None;
    for path in paths {
        if session.renames.contains(path) || vcs.exists_in_index(path) {
            continue;
        }
        let candidates = session.similarity.get_or_compute(path, || {
            let files = tracked.get_or_insert_with(|| vcs.tracked_files());
            find_similar_files(path, files.iter().map(String::as_str), threshold)
        });
        if let Some(best) = candidates.into_iter().find(|c| &c.path != path) {
            display::found(&format!(
                "{path} looks renamed to {} (score {})",
                best.path, best.score
            ));
            session.renames.record(path, &best.path);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenameEdit {
    Edit(usize),
    Done,
}

fn rename_menu(session: &Session, paths: &[String]) -> Menu<RenameEdit> {
    let menu = paths
        .iter()
        .enumerate()
        .fold(Menu::new("Paths used for the patch"), |menu, (i, path)| {
            let label = format!("{path} -> {}", session.renames.resolve(path));
            menu.choice(label, RenameEdit::Edit(i))
        });
    menu.choice("Continue with these paths", RenameEdit::Done)
        .as_default()
        .as_escape()
}

fn edit_renames(rt: &mut Runtime<'_>, session: &mut Session, paths: &[String]) {
    if paths.is_empty() {
        return;
    }
    loop {
        match choose(rt.ui, &rename_menu(session, paths), RenameEdit::Done) {
            RenameEdit::Done => break,
            RenameEdit::Edit(i) => {
                let Some(path) = paths.get(i) else { break };
                if let Some(local) = rt.ui.input(&format!("New path for {path}")) {
                    session.renames.record(path, &local);
                }
            }
        }
    }
}

fn edit_then_apply(rt: &mut Runtime<'_>, session: &mut Session, commit: &CommitRef) -> ApplyOutcome {
    let result = rt.vcs.cherry_pick(commit, true);
    if !result.success {
        discard_replay(rt.vcs, &[]);
        return ApplyOutcome::Failed {
            reason: first_line(&result.combined()),
        };
    }

    let staged = rt.vcs.staged_paths();
    display::info(&format!("Opening {} changed files", staged.len()));
    if let Err(e) = rt.editor.edit(rt.vcs.workdir(), &staged) {
        display::error(&format!("{e:#}"));
    }

    let original = rt.vcs.commit_message(commit).unwrap_or_default();
    let message = match edit_message(rt, &original) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "message edit failed, keeping original");
            original
        }
    };
    if message.trim().is_empty() {
        discard_replay(rt.vcs, &staged);
        display::warn("Empty commit message");
        return ApplyOutcome::Aborted;
    }

    if !rt.vcs.stage_all() {
        warn!("failed to stage all changes");
    }
    let committed = rt.vcs.commit_staged(&message);
    if committed.success {
        return applied(session, commit, Resolution::Edited);
    }
    discard_replay(rt.vcs, &staged);
    ApplyOutcome::Failed {
        reason: first_line(&committed.combined()),
    }
}

/// Return to `HEAD` after an uncommitted replay. Edits to `touched` files
/// are staged first so the reset does not refuse them.
fn discard_replay(vcs: &dyn Vcs, touched: &[String]) {
    if !touched.is_empty() && !vcs.stage(touched) {
        warn!("failed to stage edited files before reset");
    }
    if !vcs.reset_merge() {
        display::error("Could not reset the working tree; check `git status`");
        warn!("reset after uncommitted replay failed");
    }
}

/// Let the user edit `message` in a temp file; `#` lines are dropped.
fn edit_message(rt: &Runtime<'_>, message: &str) -> Result<String> {
    let mut file = NamedTempFile::new().context("Failed to create message file")?;
    file.write_all(message.as_bytes())?;
    file.flush()?;
    let path = file.path().to_string_lossy().into_owned();
    rt.editor.edit(rt.vcs.workdir(), &[path])?;
    let edited = fs::read_to_string(file.path()).context("Failed to read message file")?;
    Ok(strip_comments(&edited))
}

fn strip_comments(message: &str) -> String {
    message
        .lines()
        .filter(|l| !l.starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
