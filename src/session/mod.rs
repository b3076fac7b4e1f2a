//! Everything one invocation mutates, passed explicitly to each engine.

pub mod cancel;
pub mod renames;
pub mod state;

use std::collections::HashSet;

use anyhow::Result;
use tracing::info;

use crate::author::AuthorMap;
use crate::cache::deps::DependencyCache;
use crate::cache::store::StateStore;
use crate::config::Config;
use crate::engine::similarity::SimilarityCache;
use crate::models::commit::CommitRef;
use crate::stats::StatsRecorder;

pub use cancel::CancelToken;
pub use renames::FileRenameMap;
pub use state::AnalysisState;

/// Flags of the current run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Substitute menu defaults for every prompt.
    pub auto: bool,
    /// Plan only; never replay or record applied commits.
    pub dry_run: bool,
    /// Remote whose history is the target line.
    pub remote: Option<String>,
}

pub struct Session {
    pub config: Config,
    pub options: RunOptions,
    pub state: AnalysisState,
    pub renames: FileRenameMap,
    pub dep_cache: DependencyCache,
    pub similarity: SimilarityCache,
    pub authors: AuthorMap,
    /// Commits the user asked for, in request order.
    pub requested: Vec<CommitRef>,
    /// Local paths already provided for (chain added, created, overridden).
    pub resolved_files: HashSet<String>,
    /// `"file:commit"` pairs whose missing-file handling already ran.
    pub processed_missing: HashSet<String>,
    pub cancel: CancelToken,
    pub stats: StatsRecorder,
}

impl Session {
    /// Empty session with nothing loaded from disk.
    pub fn new(config: Config, options: RunOptions) -> Self {
        Self {
            config,
            options,
            state: AnalysisState::default(),
            renames: FileRenameMap::default(),
            dep_cache: DependencyCache::default(),
            similarity: SimilarityCache::default(),
            authors: AuthorMap::default(),
            requested: Vec::new(),
            resolved_files: HashSet::new(),
            processed_missing: HashSet::new(),
            cancel: CancelToken::new(),
            stats: StatsRecorder::disabled(),
        }
    }

    /// Session seeded with the persisted history, caches and overrides.
    pub fn load(store: &StateStore, config: Config, options: RunOptions) -> Self {
        let mut session = Self::new(config, options);
        session.state = AnalysisState::with_history(store.load_history());
        session.dep_cache = store.load_dependency_cache();
        session.authors = AuthorMap::from_map(store.load_authors());
        session.renames = FileRenameMap::from_map(store.load_renames());
        info!(
            applied = session.state.history.len(),
            cached = session.dep_cache.len(),
            renames = session.renames.as_map().len(),
            "session state loaded"
        );
        session
    }

    /// User stop or interrupt.
    pub fn should_stop(&self) -> bool {
        self.state.stop || self.cancel.is_cancelled()
    }

    /// Persist history, dependency cache, author map and renames.
    ///
    /// History is left untouched in a dry run; the other files are only
    /// rewritten when they gained entries.
    pub fn flush(&self, store: &StateStore) -> Result<()> {
        if !self.options.dry_run {
            store.save_history(&self.state.all_applied())?;
        }
        if self.dep_cache.is_dirty() {
            store.save_dependency_cache(&self.dep_cache)?;
        }
        if self.authors.is_dirty() {
            store.save_authors(self.authors.as_map())?;
        }
        if self.renames.is_dirty() {
            store.save_renames(self.renames.as_map())?;
        }
        info!(
            applied = self.state.applied.len(),
            history = self.state.history.len(),
            "session state saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_then_load_restores_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = StateStore::in_git_dir(dir.path());

        let mut session = Session::new(Config::default(), RunOptions::default());
        session.state.mark_applied(&CommitRef::new("abc"));
        session.renames.record("old.c", "new.c");
        session
            .dep_cache
            .insert(&CommitRef::new("abc"), "f.c", vec![CommitRef::new("dep")]);
        session.flush(&store).unwrap();

        let loaded = Session::load(&store, Config::default(), RunOptions::default());
        assert!(loaded.state.was_applied(&CommitRef::new("abc")));
        assert_eq!(loaded.renames.resolve("old.c"), "new.c");
        assert!(loaded.dep_cache.get(&CommitRef::new("abc"), "f.c").is_some());
        // history alone does not make a commit final in a new run
        assert!(loaded.state.final_commits.is_empty());
    }

    #[test]
    fn flush_skips_unchanged_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = StateStore::in_git_dir(dir.path());
        let mut renames = std::collections::BTreeMap::new();
        renames.insert("a.c".to_string(), "b.c".to_string());
        store.save_renames(&renames).unwrap();

        let session = Session::load(&store, Config::default(), RunOptions::default());
        session.flush(&store).unwrap();

        assert!(store.dir().join("history.json").exists());
        assert!(!store.dir().join("dependency_cache.json").exists());
        assert!(!store.dir().join("authors.json").exists());
        assert_eq!(store.load_renames(), renames);
    }

    #[test]
    fn dry_run_flush_keeps_history() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = StateStore::in_git_dir(dir.path());
        let options = RunOptions {
            dry_run: true,
            ..RunOptions::default()
        };
        let mut session = Session::new(Config::default(), options);
        session.state.mark_applied(&CommitRef::new("abc"));
        session.flush(&store).unwrap();
        assert!(store.load_history().is_empty());
    }

    #[test]
    fn cancel_token_stops_session() {
        let session = Session::new(Config::default(), RunOptions::default());
        assert!(!session.should_stop());
        session.cancel.cancel();
        assert!(session.should_stop());
    }
}
