use std::collections::BTreeMap;

/// Canonical path (as a commit names it) → local equivalent.
///
/// Grows monotonically and is persisted; never invalidated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRenameMap {
    entries: BTreeMap<String, String>,
    dirty: bool,
}

impl FileRenameMap {
    pub fn from_map(entries: BTreeMap<String, String>) -> Self {
        Self {
            entries,
            dirty: false,
        }
    }

    /// Local path for `path`, or `path` itself when unmapped.
    pub fn resolve<'a>(&'a self, path: &'a str) -> &'a str {
        self.entries.get(path).map(String::as_str).unwrap_or(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Record an override. Empty targets are ignored.
    pub fn record(&mut self, from: &str, to: &str) {
        let to = to.trim();
        if to.is_empty() {
            return;
        }
        if self.entries.get(from).map(String::as_str) != Some(to) {
            self.entries.insert(from.to_string(), to.to_string());
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_paths_resolve_to_themselves() {
        let map = FileRenameMap::default();
        assert_eq!(map.resolve("a/b.c"), "a/b.c");
    }

    #[test]
    fn recorded_paths_resolve_to_override() {
        let mut map = FileRenameMap::default();
        map.record("old/a.c", "new/a.c");
        assert_eq!(map.resolve("old/a.c"), "new/a.c");
        assert!(map.is_dirty());
    }

    #[test]
    fn blank_override_is_ignored() {
        let mut map = FileRenameMap::default();
        map.record("old/a.c", "  ");
        assert!(!map.contains("old/a.c"));
        assert!(!map.is_dirty());
    }
}
