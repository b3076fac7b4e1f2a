//! Dependency Extractor: commits a changed file probably relies on.
//!
//! Heuristic and deliberately over-approximating. Suspects come from four
//! sources, in this order: line ownership of the local file, symbol-level
//! history of its important definitions, the commits that introduced the
//! files it includes, and its rename-aware history.

use std::collections::HashSet;

use tracing::{debug, info};

use super::imports::{complete_include, extract_includes};
use super::symbols::important_symbols;
use crate::models::commit::CommitRef;
use crate::session::Session;
use crate::vcs::Vcs;

/// Suspect commits for `file` as changed by `commit`.
///
/// `file` is the path inside `commit`; `local` is where that file lives on
/// the target line (differs after a rename override). Results are cached per
/// `(commit, file)` for the rest of the run and across runs. A file whose
/// content cannot be read at `commit` yields no suspects and is not cached.
pub fn find_dependencies(
    vcs: &dyn Vcs,
    session: &mut Session,
    commit: &CommitRef,
    file: &str,
    local: &str,
) -> Vec<CommitRef> {
    if let Some(hit) = session.dep_cache.get(commit, file) {
        debug!(commit = commit.short(), file, count = hit.len(), "dependency cache hit");
        return hit.to_vec();
    }

    let Some(content) = vcs.show_file(commit, file) else {
        debug!(commit = commit.short(), file, "content unavailable, no dependencies");
        return Vec::new();
    };

    let mut suspects = Suspects::default();

    suspects.extend(vcs.blame_commits(local));

    for symbol in important_symbols(file, &content) {
        if session.cancel.is_cancelled() {
            return suspects.into_vec(commit);
        }
        suspects.extend(vcs.pickaxe(&symbol, local));
    }

    let mut includes = extract_includes(&content);
    let mut seen: HashSet<String> = HashSet::new();
    includes.retain(|i| seen.insert(i.clone()));
    if !includes.is_empty() {
        let tracked = vcs.tracked_files();
        for include in &includes {
            let path = locate_include(&complete_include(include, &tracked), &tracked);
            if let Some(origin) = vcs.commits_adding(&path).into_iter().next() {
                debug!(include = include.as_str(), path = path.as_str(), origin = origin.short(), "include origin");
                suspects.push(origin);
            }
        }
    }

    suspects.extend(vcs.follow_history(local));

    if session.cancel.is_cancelled() {
        return suspects.into_vec(commit);
    }

    let result = suspects.into_vec(commit);
    info!(commit = commit.short(), file, count = result.len(), "dependencies extracted");
    session.dep_cache.insert(commit, file, result.clone());
    result
}

/// Tracked path an include refers to: exact match, else the shortest
/// tracked path ending in `/<include>`, else the include itself.
fn locate_include(include: &str, tracked: &[String]) -> String {
    if tracked.iter().any(|f| f == include) {
        return include.to_string();
    }
    let suffix = format!("/{}", include.trim_start_matches("./"));
    tracked
        .iter()
        .filter(|f| f.ends_with(&suffix))
        .min_by_key(|f| f.len())
        .cloned()
        .unwrap_or_else(|| include.to_string())
}

/// Ordered, duplicate-free collection of suspects.
#[derive(Default)]
struct Suspects {
    order: Vec<CommitRef>,
    seen: HashSet<CommitRef>,
}

impl Suspects {
    fn push(&mut self, commit: CommitRef) {
        if self.seen.insert(commit.clone()) {
            self.order.push(commit);
        }
    }

    fn extend(&mut self, commits: impl IntoIterator<Item = CommitRef>) {
        for commit in commits {
            self.push(commit);
        }
    }

    /// Final list with the analyzed commit itself removed.
    fn into_vec(self, own: &CommitRef) -> Vec<CommitRef> {
        self.order.into_iter().filter(|c| c != own).collect()
    }
}
