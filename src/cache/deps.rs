use std::collections::BTreeMap;

use crate::models::commit::CommitRef;

/// Read-through cache of dependency suspects keyed by `"commit:file"`.
///
/// Entries are written once and never invalidated, across runs too: when
/// history is rewritten a stale entry is served as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyCache {
    entries: BTreeMap<String, Vec<CommitRef>>,
    dirty: bool,
}

impl DependencyCache {
    pub fn from_map(entries: BTreeMap<String, Vec<CommitRef>>) -> Self {
        Self {
            entries,
            dirty: false,
        }
    }

    pub fn key(commit: &CommitRef, file: &str) -> String {
        format!("{commit}:{file}")
    }

    pub fn get(&self, commit: &CommitRef, file: &str) -> Option<&[CommitRef]> {
        self.entries
            .get(&Self::key(commit, file))
            .map(Vec::as_slice)
    }

    /// Store suspects unless the key is already present.
    pub fn insert(&mut self, commit: &CommitRef, file: &str, suspects: Vec<CommitRef>) {
        let key = Self::key(commit, file);
        if self.entries.contains_key(&key) {
            return;
        }
        self.entries.insert(key, suspects);
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when entries were added since load.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn as_map(&self) -> &BTreeMap<String, Vec<CommitRef>> {
        &self.entries
    }
}
