use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::author::AuthorMap;
use crate::cache::store::StateStore;
use crate::config::{Config, ConfigService};
use crate::display;
use crate::editor::SystemEditor;
use crate::engine::Runtime;
use crate::engine::analysis::{self, AnalysisEnd};
use crate::engine::apply::{self, Proceed};
use crate::error::{ErrorCode, PickError};
use crate::interrupt;
use crate::logger;
use crate::models::commit::CommitRef;
use crate::models::outcome::BatchSummary;
use crate::prompt::{AutoPrompter, Prompter, TerminalPrompter};
use crate::session::{RunOptions, Session};
use crate::stats::StatsRecorder;
use crate::vcs::{GitCli, Vcs};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// How the service is set up: configuration source and logging.
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    pub config_file: Option<PathBuf>,
    /// `key=value` pairs applied and saved to the configuration file.
    pub overrides: Vec<String>,
    pub debug: bool,
    pub verbose: bool,
}

/// One cherry-pick invocation.
#[derive(Debug, Clone, Default)]
pub struct PickRequest {
    pub commits: Vec<String>,
    pub range: Option<(String, String)>,
    pub skip: Vec<String>,
    pub apply_saved: bool,
    pub record_stats: bool,
    pub options: RunOptions,
}

/// How a pick run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEnd {
    Applied(BatchSummary),
    /// Plan saved for `--apply-saved`; nothing applied.
    Saved,
    /// The user cancelled; nothing applied.
    Cancelled,
    Interrupted,
}

// ---------------------------------------------------------------------------
// Pick workflow
// ---------------------------------------------------------------------------

/// Process the requested commits, then review and apply the plan.
///
/// With `apply_saved` the requested commits are replayed as they are, with
/// neither analysis nor review.
pub fn run_pick(
    rt: &mut Runtime<'_>,
    session: &mut Session,
    store: &StateStore,
    apply_saved: bool,
) -> Result<RunEnd> {
    if !apply_saved {
        for commit in session.requested.clone() {
            if session.should_stop() {
                break;
            }
            match analysis::process_commit(rt, session, &commit) {
                AnalysisEnd::Completed => {}
                AnalysisEnd::Halted => break,
                AnalysisEnd::Cancelled => {
                    return Ok(if session.cancel.is_cancelled() {
                        RunEnd::Interrupted
                    } else {
                        RunEnd::Cancelled
                    });
                }
            }
        }
        if session.cancel.is_cancelled() {
            return Ok(RunEnd::Interrupted);
        }
    }

    let plan = apply::build_plan(session);
    if plan.is_empty() {
        display::warn("Nothing to cherry-pick");
        return Ok(RunEnd::Applied(BatchSummary::default()));
    }

    if !apply_saved {
        match apply::review_plan(rt, session, &plan) {
            Proceed::Apply => {}
            Proceed::SaveAndExit => {
                store.save_commit_list(&plan)?;
                display::success(&format!(
                    "Saved {} commits; run again with --apply-saved to apply them",
                    plan.len()
                ));
                return Ok(RunEnd::Saved);
            }
            Proceed::Cancel if session.cancel.is_cancelled() => return Ok(RunEnd::Interrupted),
            Proceed::Cancel => return Ok(RunEnd::Cancelled),
        }
    }

    let summary = apply::apply_all(rt, session, store, &plan)?;
    if session.cancel.is_cancelled() {
        return Ok(RunEnd::Interrupted);
    }
    Ok(RunEnd::Applied(summary))
}

// ---------------------------------------------------------------------------
// AppService: repository, configuration and state for the CLI
// ---------------------------------------------------------------------------

pub struct AppService {
    vcs: GitCli,
    store: StateStore,
    config: Config,
    config_path: PathBuf,
}

impl AppService {
    /// Discover the repository around `start`, load configuration and
    /// start logging.
    pub fn open(start: &Path, options: &ServiceOptions) -> Result<Self> {
        let bootstrap = GitCli::discover(start, &Config::default())?;
        let store = StateStore::in_git_dir(bootstrap.git_dir());

        let config_path = ConfigService::resolve_path(store.dir(), options.config_file.as_deref());
        let mut config = ConfigService::load(&config_path)?;
        if !options.overrides.is_empty() {
            config.apply_overrides(&options.overrides)?;
            ConfigService::save(&config_path, &config)?;
            display::success(&format!("Configuration saved to {}", config_path.display()));
        }
        if options.debug {
            config.debug = true;
        }

        logger::init(&config.log_dir(store.dir()), config.debug, options.verbose)?;
        info!(
            root = %bootstrap.workdir().display(),
            config = %config_path.display(),
            "smart-pick started"
        );

        let vcs = GitCli::discover(bootstrap.workdir(), &config)?;
        Ok(Self {
            vcs,
            store,
            config,
            config_path,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Run a cherry-pick request end to end. State is saved on every exit
    /// path once the session exists.
    pub fn pick(self, request: PickRequest) -> Result<BatchSummary> {
        let remote = request.options.remote.clone();
        if let Some(remote) = remote.as_deref() {
            self.validate_remote(remote)?;
            display::info(&format!("Fetching {remote}..."));
            if !self.vcs.fetch(remote, None) {
                warn!(remote, "fetch failed, continuing with local refs");
                display::warn(&format!("Could not fetch {remote}; using local refs"));
            }
        }
        let vcs = self.vcs.with_remote(remote.clone());

        let mut session = Session::load(&self.store, self.config.clone(), request.options.clone());
        if request.record_stats && self.config.record_stats {
            session.stats = StatsRecorder::new(
                self.store.stats_path(),
                remote.as_deref(),
                request.options.auto,
            );
        }
        interrupt::install(session.cancel.clone());

        let skip: Vec<CommitRef> = request
            .skip
            .iter()
            .map(|rev| vcs.verify(rev).unwrap_or_else(|| CommitRef::new(rev.as_str())))
            .collect();
        let mut commits = collect_commits(&vcs, &self.store, &request)?;
        commits.retain(|c| !skip.contains(c));
        session.state.skipped.extend(skip);
        if commits.is_empty() {
            bail!(PickError::new(
                ErrorCode::NothingToApply,
                "No commits left to cherry-pick"
            ));
        }
        if !request.apply_saved {
            self.store.save_commit_list(&commits)?;
        }
        info!(count = commits.len(), apply_saved = request.apply_saved, "commits requested");
        session.requested = commits;

        let mut ui: Box<dyn Prompter> = if request.options.auto {
            Box::new(AutoPrompter)
        } else {
            Box::new(TerminalPrompter::new(session.cancel.clone()))
        };
        let editor = SystemEditor::new(self.config.editor.as_deref());
        let mut rt = Runtime::new(&vcs, ui.as_mut(), &editor);

        let outcome = run_pick(&mut rt, &mut session, &self.store, request.apply_saved);
        session.flush(&self.store)?;

        match outcome? {
            RunEnd::Applied(summary) => Ok(summary),
            RunEnd::Saved => Ok(BatchSummary::default()),
            RunEnd::Cancelled => {
                display::warn("Operation cancelled, nothing applied");
                Ok(BatchSummary::default())
            }
            RunEnd::Interrupted => Err(PickError::new(
                ErrorCode::Interrupted,
                "Interrupted; state saved",
            )
            .into()),
        }
    }

    /// Print the commits applied by earlier runs.
    pub fn history(&self) -> Result<()> {
        let history = self.store.load_history();
        if history.is_empty() {
            display::info("No commits have been applied yet");
            return Ok(());
        }
        let mut authors = AuthorMap::from_map(self.store.load_authors());
        display::info(&format!("Applied commits ({}):", history.len()));
        for commit in &history {
            println!("  {}", display::commit_context(&self.vcs, &mut authors, commit));
        }
        if authors.is_dirty() {
            self.store.save_authors(authors.as_map())?;
        }
        Ok(())
    }

    fn validate_remote(&self, remote: &str) -> Result<()> {
        let known = self.vcs.remotes();
        if known.iter().any(|r| r == remote) {
            if let Some(url) = self.vcs.remote_url(remote) {
                info!(remote, url = url.as_str(), "remote validated");
            }
            return Ok(());
        }
        Err(PickError::unknown_remote(remote, &known).into())
    }
}

/// Commits to process: the saved list, a range, or explicit ids.
fn collect_commits(vcs: &dyn Vcs, store: &StateStore, request: &PickRequest) -> Result<Vec<CommitRef>> {
    if request.apply_saved {
        let saved = store.load_commit_list();
        if saved.is_empty() {
            bail!(PickError::new(
                ErrorCode::NothingToApply,
                "No saved commit list; run without --apply-saved first"
            ));
        }
        return Ok(saved);
    }

    if let Some((start, end)) = &request.range {
        let start = verify(vcs, start)?;
        let end = verify(vcs, end)?;
        let commits = vcs.rev_range(&start, &end);
        if commits.is_empty() {
            bail!(PickError::new(
                ErrorCode::EmptyRange,
                format!("No commits between {} and {}", start.short(), end.short()),
            ));
        }
        return Ok(commits);
    }

    request.commits.iter().map(|rev| verify(vcs, rev)).collect()
}

fn verify(vcs: &dyn Vcs, rev: &str) -> Result<CommitRef> {
    vcs.verify(rev)
        .ok_or_else(|| PickError::unknown_commit(rev).into())
}
