//! Missing-File Resolver: where a file the target line lacks came from, and
//! the history that brought it to the state a commit expects.

use std::fmt;

use camino::Utf8Path;
use tracing::{debug, info};

use super::similarity::find_similar_files;
use crate::models::commit::CommitRef;
use crate::session::Session;
use crate::vcs::{Vcs, WELL_KNOWN_BRANCHES};

/// Which search located an origin commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginSource {
    /// Oldest commit adding the path, any ref.
    Added,
    /// Oldest commit touching the path at all.
    History,
    /// Recent commit whose tree mentions the base name.
    ContentSearch,
    /// Origin of a similarly named local file.
    Similar(String),
    /// Last commit touching the path on a remote branch.
    RemoteBranch(String),
}

impl fmt::Display for OriginSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "file addition"),
            Self::History => write!(f, "full history"),
            Self::ContentSearch => write!(f, "content search"),
            Self::Similar(path) => write!(f, "similar file {path}"),
            Self::RemoteBranch(branch) => write!(f, "remote branch {branch}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub commit: CommitRef,
    pub source: OriginSource,
}

impl Origin {
    fn new(commit: CommitRef, source: OriginSource) -> Self {
        Self { commit, source }
    }
}

/// Best guess at the commit that first created `path`.
///
/// Strategies run in order and the first hit wins: addition anywhere in
/// history, any touch anywhere in history, a bounded content search for the
/// base name, the origin of a similarly named local file, and finally the
/// configured remote's branches (well-known names first).
pub fn locate_file_origin(vcs: &dyn Vcs, session: &mut Session, path: &str) -> Option<Origin> {
    if let Some(commit) = vcs.commits_adding(path).into_iter().next() {
        return Some(found(path, Origin::new(commit, OriginSource::Added)));
    }

    if let Some(commit) = vcs.full_history(path).into_iter().next() {
        return Some(found(path, Origin::new(commit, OriginSource::History)));
    }

    let base = Utf8Path::new(path).file_name().unwrap_or(path);
    if let Some(commit) = vcs.grep_history(base, session.config.max_search_depth) {
        return Some(found(path, Origin::new(commit, OriginSource::ContentSearch)));
    }

    if session.cancel.is_cancelled() {
        return None;
    }

    let threshold = u32::from(session.config.rename_threshold);
    let candidates = session.similarity.get_or_compute(path, || {
        let tracked = vcs.tracked_files();
        find_similar_files(path, tracked.iter().map(String::as_str), threshold)
    });
    for candidate in candidates.iter().filter(|c| c.path != path) {
        debug!(path, candidate = candidate.path.as_str(), score = candidate.score, "similar file");
        if let Some(commit) = vcs.commits_adding(&candidate.path).into_iter().next() {
            return Some(found(
                path,
                Origin::new(commit, OriginSource::Similar(candidate.path.clone())),
            ));
        }
    }

    if let Some(remote) = session.options.remote.clone()
        && let Some(origin) = search_remote(vcs, &remote, path)
    {
        return Some(found(path, origin));
    }

    info!(path, "no origin found");
    None
}

fn found(path: &str, origin: Origin) -> Origin {
    info!(path, origin = origin.commit.short(), source = %origin.source, "origin located");
    origin
}

/// Remote branches, well-known names first, the rest in listing order.
fn branch_search_order(branches: Vec<String>) -> Vec<String> {
    let (mut known, rest): (Vec<String>, Vec<String>) = branches
        .into_iter()
        .partition(|b| WELL_KNOWN_BRANCHES.contains(&b.as_str()));
    known.sort_by_key(|b| WELL_KNOWN_BRANCHES.iter().position(|k| k == b));
    known.extend(rest);
    known
}

fn search_remote(vcs: &dyn Vcs, remote: &str, path: &str) -> Option<Origin> {
    let suffix = format!("/{path}");
    for branch in branch_search_order(vcs.remote_branches(remote)) {
        let rev = format!("{remote}/{branch}");
        let files = vcs.files_at(&rev);
        let Some(hit) = files.iter().find(|f| *f == path || f.ends_with(&suffix)) else {
            continue;
        };
        if let Some(commit) = vcs.last_touch_at(&rev, hit) {
            return Some(Origin::new(commit, OriginSource::RemoteBranch(rev)));
        }
    }
    None
}

/// Commits that built `path` up to `target`, oldest first.
///
/// Starts at the located origin and includes `target` when it touches the
/// path. Empty when no origin can be found.
pub fn build_history_chain(
    vcs: &dyn Vcs,
    session: &mut Session,
    path: &str,
    target: Option<&CommitRef>,
) -> Vec<CommitRef> {
    match locate_file_origin(vcs, session, path) {
        Some(origin) => history_chain_from(vcs, &origin.commit, path, target),
        None => Vec::new(),
    }
}

/// History chain of `path` from a known `creation` commit.
///
/// Without `target`, or when nothing lies between the two, the whole
/// rename-aware history is used. `creation` always leads the chain.
pub fn history_chain_from(
    vcs: &dyn Vcs,
    creation: &CommitRef,
    path: &str,
    target: Option<&CommitRef>,
) -> Vec<CommitRef> {
    let mut chain = match target {
        Some(target) => vcs.history_between(creation, target, path),
        None => Vec::new(),
    };
    if chain.is_empty() {
        chain = vcs.follow_history(path);
        chain.reverse();
    }
    if !chain.contains(creation) {
        chain.insert(0, creation.clone());
    }
    debug!(path, len = chain.len(), "history chain built");
    chain
}
