use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::deps::DependencyCache;
use crate::error::PickError;
use crate::models::commit::CommitRef;

/// Name of the per-repository state directory inside the git directory.
pub const STATE_DIR_NAME: &str = "smart-pick";

const HISTORY_FILE: &str = "history.json";
const DEPENDENCY_CACHE_FILE: &str = "dependency_cache.json";
const AUTHORS_FILE: &str = "authors.json";
const COMMITS_FILE: &str = "commits.json";
const RENAMES_FILE: &str = "renames.json";
const STATS_FILE: &str = "stats.csv";

/// JSON state files kept in `<git-dir>/smart-pick/`, out of reach of
/// `git add`.
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Store rooted at `<git_dir>/smart-pick`.
    pub fn in_git_dir(git_dir: &Path) -> Self {
        Self::new(git_dir.join(STATE_DIR_NAME))
    }

    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stats_path(&self) -> PathBuf {
        self.dir.join(STATS_FILE)
    }

    /// Applied commit ids.
    pub fn load_history(&self) -> BTreeSet<CommitRef> {
        self.load_json::<Vec<CommitRef>>(HISTORY_FILE)
            .into_iter()
            .collect()
    }

    /// Written as a sorted list.
    pub fn save_history(&self, applied: &BTreeSet<CommitRef>) -> Result<()> {
        let sorted: Vec<&CommitRef> = applied.iter().collect();
        self.save_json(HISTORY_FILE, &sorted)
    }

    pub fn load_dependency_cache(&self) -> DependencyCache {
        DependencyCache::from_map(self.load_json(DEPENDENCY_CACHE_FILE))
    }

    pub fn save_dependency_cache(&self, cache: &DependencyCache) -> Result<()> {
        self.save_json(DEPENDENCY_CACHE_FILE, cache.as_map())
    }

    /// Author name → inferred user handle.
    pub fn load_authors(&self) -> BTreeMap<String, String> {
        self.load_json(AUTHORS_FILE)
    }

    pub fn save_authors(&self, authors: &BTreeMap<String, String>) -> Result<()> {
        self.save_json(AUTHORS_FILE, authors)
    }

    /// Last saved apply plan.
    pub fn load_commit_list(&self) -> Vec<CommitRef> {
        self.load_json(COMMITS_FILE)
    }

    pub fn save_commit_list(&self, commits: &[CommitRef]) -> Result<()> {
        self.save_json(COMMITS_FILE, &commits)
    }

    /// Canonical path → local path overrides.
    pub fn load_renames(&self) -> BTreeMap<String, String> {
        self.load_json(RENAMES_FILE)
    }

    pub fn save_renames(&self, renames: &BTreeMap<String, String>) -> Result<()> {
        self.save_json(RENAMES_FILE, renames)
    }

    /// Missing file ⇒ default; unreadable or corrupt file ⇒ default plus a warning.
    fn load_json<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        let path = self.dir.join(name);
        if !path.exists() {
            return T::default();
        }
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read state file");
                return T::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt state file, starting empty");
                T::default()
            }
        }
    }

    /// Write through a sibling temp file so a crash never leaves half a file.
    fn save_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let display = path.display().to_string();
        fs::create_dir_all(&self.dir).map_err(|e| PickError::state_io(&display, e))?;

        let json = serde_json::to_string_pretty(value).map_err(|e| PickError::state_io(&display, e))?;
        let tmp = self.dir.join(format!("{name}.tmp"));
        fs::write(&tmp, json).map_err(|e| PickError::state_io(&display, e))?;
        fs::rename(&tmp, &path).map_err(|e| PickError::state_io(&display, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, StateStore) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = StateStore::in_git_dir(dir.path());
        (dir, store)
    }

    #[test]
    fn missing_files_load_empty() {
        let (_dir, store) = store();
        assert!(store.load_history().is_empty());
        assert!(store.load_dependency_cache().is_empty());
        assert!(store.load_authors().is_empty());
        assert!(store.load_commit_list().is_empty());
        assert!(store.load_renames().is_empty());
    }

    #[test]
    fn history_is_saved_sorted() {
        let (_dir, store) = store();
        let applied: BTreeSet<CommitRef> = ["ccc", "aaa", "bbb"].into_iter().map(CommitRef::new).collect();
        store.save_history(&applied).unwrap();

        let raw = fs::read_to_string(store.dir().join(HISTORY_FILE)).unwrap();
        let listed: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(listed, vec!["aaa", "bbb", "ccc"]);
        assert_eq!(store.load_history(), applied);
    }

    #[test]
    fn dependency_cache_uses_commit_file_keys() {
        let (_dir, store) = store();
        let mut cache = DependencyCache::default();
        cache.insert(&CommitRef::new("abc"), "src/a.c", vec![CommitRef::new("def")]);
        store.save_dependency_cache(&cache).unwrap();

        let raw = fs::read_to_string(store.dir().join(DEPENDENCY_CACHE_FILE)).unwrap();
        assert!(raw.contains("\"abc:src/a.c\""));
        let loaded = store.load_dependency_cache();
        assert_eq!(
            loaded.get(&CommitRef::new("abc"), "src/a.c"),
            Some(&[CommitRef::new("def")][..])
        );
    }

    #[test]
    fn commit_list_keeps_order() {
        let (_dir, store) = store();
        let list: Vec<CommitRef> = ["c3", "c1", "c2"].into_iter().map(CommitRef::new).collect();
        store.save_commit_list(&list).unwrap();
        assert_eq!(store.load_commit_list(), list);
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let (_dir, store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.dir().join(RENAMES_FILE), "{ not json").unwrap();
        assert!(store.load_renames().is_empty());
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let (_dir, store) = store();
        let mut renames = BTreeMap::new();
        renames.insert("old/a.c".to_string(), "new/a.c".to_string());
        store.save_renames(&renames).unwrap();
        assert!(!store.dir().join("renames.json.tmp").exists());
        assert_eq!(store.load_renames(), renames);
    }
}
