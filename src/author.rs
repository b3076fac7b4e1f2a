//! Author name → user handle inference, memoized across runs.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

static GITHUB_EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([^@]+)@github\.com$").ok());

static NOREPLY_EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?:\d+\+)?([^@+]+)@users\.noreply\.github\.com$").ok());

/// Guess a user handle from an e-mail address.
///
/// `user@github.com` and GitHub noreply addresses yield the user directly;
/// any other address yields its lowercased local part.
pub fn username_from_email(email: &str) -> Option<String> {
    let email = email.trim();
    for re in [&*GITHUB_EMAIL, &*NOREPLY_EMAIL].into_iter().flatten() {
        if let Some(caps) = re.captures(email)
            && let Some(user) = caps.get(1)
        {
            return Some(user.as_str().to_string());
        }
    }

    let (local, _) = email.split_once('@')?;
    let local = local.to_lowercase();
    if local.is_empty() {
        return None;
    }
    Some(local)
}

/// Persisted author → handle map.
#[derive(Debug, Clone, Default)]
pub struct AuthorMap {
    entries: BTreeMap<String, String>,
    dirty: bool,
}

impl AuthorMap {
    pub fn from_map(entries: BTreeMap<String, String>) -> Self {
        Self {
            entries,
            dirty: false,
        }
    }

    /// Handle for an author, inferring and memoizing it on first sight.
    ///
    /// Falls back to a single-word name (lowercased, unless it looks like a
    /// bot such as `git...`), then to the name itself, which is not memoized.
    pub fn handle(&mut self, name: &str, email: &str) -> String {
        if let Some(known) = self.entries.get(name) {
            return known.clone();
        }

        let inferred = username_from_email(email).or_else(|| {
            let words: Vec<&str> = name.split_whitespace().collect();
            match words.as_slice() {
                [single] if !single.starts_with("git") => Some(single.to_lowercase()),
                _ => None,
            }
        });

        match inferred {
            Some(handle) => {
                self.entries.insert(name.to_string(), handle.clone());
                self.dirty = true;
                handle
            }
            None => name.to_string(),
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
    fn github_addresses() {
        assert_eq!(username_from_email("octocat@github.com").as_deref(), Some("octocat"));
        assert_eq!(
            username_from_email("583231+octocat@users.noreply.github.com").as_deref(),
            Some("octocat")
        );
        assert_eq!(
            username_from_email("octocat@users.noreply.github.com").as_deref(),
            Some("octocat")
        );
    }

    #[test]
    fn dotted_local_part_is_kept() {
        assert_eq!(
            username_from_email("Jane.Doe@example.org").as_deref(),
            Some("jane.doe")
        );
        assert_eq!(username_from_email("dev-ops@corp.io").as_deref(), Some("dev-ops"));
    }

    #[test]
    fn plain_local_part() {
        assert_eq!(username_from_email("Kernel@lists.org").as_deref(), Some("kernel"));
        assert_eq!(username_from_email("no-at-sign"), None);
    }

    #[test]
    fn map_memoizes_inferred_handles() {
        let mut map = AuthorMap::default();
        assert_eq!(map.handle("Jane Doe", "jane.doe@example.org"), "jane.doe");
        assert!(map.is_dirty());
        // cached by name, e-mail ignored afterwards
        assert_eq!(map.handle("Jane Doe", "other@example.org"), "jane.doe");
    }

    #[test]
    fn single_word_name_fallback() {
        let mut map = AuthorMap::default();
        assert_eq!(map.handle("Linus", ""), "linus");
        assert_eq!(map.handle("github-actions bot", ""), "github-actions bot");
        assert!(!map.as_map().contains_key("github-actions bot"));
    }
}
