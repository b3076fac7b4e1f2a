use std::collections::{BTreeSet, HashSet};

use crate::models::commit::CommitRef;

/// Traversal state of one invocation.
///
/// `final_commits` is the apply order. `pending` holds commits queued for
/// application that have not been analyzed. `applied` holds what this run
/// replayed and is always a subset of `final_commits`; `history` holds what
/// earlier runs replayed.
#[derive(Debug, Clone, Default)]
pub struct AnalysisState {
    pub pending: Vec<CommitRef>,
    pub final_commits: Vec<CommitRef>,
    pub analyzed: HashSet<CommitRef>,
    pub applied: BTreeSet<CommitRef>,
    pub history: BTreeSet<CommitRef>,
    pub skipped: HashSet<CommitRef>,
    pub stop: bool,
}

impl AnalysisState {
    pub fn with_history(history: BTreeSet<CommitRef>) -> Self {
        Self {
            history,
            ..Self::default()
        }
    }

    /// Replayed by this run or an earlier one.
    pub fn was_applied(&self, commit: &CommitRef) -> bool {
        self.applied.contains(commit) || self.history.contains(commit)
    }

    /// Analyzed or applied: nothing more to learn about it.
    pub fn is_known(&self, commit: &CommitRef) -> bool {
        self.analyzed.contains(commit) || self.was_applied(commit)
    }

    /// Everything ever applied, for persisting.
    pub fn all_applied(&self) -> BTreeSet<CommitRef> {
        self.history.union(&self.applied).cloned().collect()
    }

    pub fn is_final(&self, commit: &CommitRef) -> bool {
        self.final_commits.contains(commit)
    }

    /// Append to `final_commits` unless already present.
    pub fn push_final(&mut self, commit: &CommitRef) {
        if !self.is_final(commit) {
            self.final_commits.push(commit.clone());
        }
    }

    /// Place `commit` ahead of `anchor` in the apply order.
    ///
    /// A commit already ordered before `anchor` stays put; one ordered after
    /// it is moved in front. Without `anchor` the commit is appended.
    pub fn insert_before(&mut self, commit: &CommitRef, anchor: &CommitRef) {
        if commit == anchor {
            self.push_final(commit);
            return;
        }
        let Some(anchor_pos) = self.final_commits.iter().position(|c| c == anchor) else {
            self.push_final(commit);
            return;
        };
        match self.final_commits.iter().position(|c| c == commit) {
            Some(pos) if pos < anchor_pos => {}
            Some(pos) => {
                self.final_commits.remove(pos);
                self.final_commits.insert(anchor_pos, commit.clone());
            }
            None => self.final_commits.insert(anchor_pos, commit.clone()),
        }
    }

    /// `commit` already sits ahead of `anchor` in the apply order.
    pub fn ordered_before(&self, commit: &CommitRef, anchor: &CommitRef) -> bool {
        let position = |target: &CommitRef| self.final_commits.iter().position(|c| c == target);
        match (position(commit), position(anchor)) {
            (Some(c), Some(a)) => c < a,
            _ => false,
        }
    }

    /// Queue a dependency ahead of `anchor` for application.
    pub fn add_dependency(&mut self, commit: &CommitRef, anchor: &CommitRef) {
        self.insert_before(commit, anchor);
        if !self.analyzed.contains(commit) && !self.pending.contains(commit) {
            self.pending.push(commit.clone());
        }
    }

    pub fn mark_analyzed(&mut self, commit: &CommitRef) {
        self.analyzed.insert(commit.clone());
        self.pending.retain(|c| c != commit);
    }

    /// Record a successful replay; keeps `applied ⊆ final_commits`.
    pub fn mark_applied(&mut self, commit: &CommitRef) {
        self.push_final(commit);
        self.applied.insert(commit.clone());
        self.pending.retain(|c| c != commit);
    }

    /// Distinct commits queued so far, `extra` (the requested ones) included.
    pub fn queued_count(&self, extra: &[CommitRef]) -> usize {
        let mut seen: HashSet<&CommitRef> = HashSet::new();
        self.final_commits
            .iter()
            .chain(self.pending.iter())
            .chain(extra.iter())
            .filter(|c| seen.insert(c))
            .count()
    }

    /// Apply plan: requested commits missing from `final_commits` first, then
    /// `final_commits`, deduplicated in first-seen order, skipped removed.
    pub fn build_plan(&self, requested: &[CommitRef]) -> Vec<CommitRef> {
        let mut seen: HashSet<&CommitRef> = HashSet::new();
        requested
            .iter()
            .filter(|c| !self.final_commits.contains(c))
            .chain(self.final_commits.iter())
            .filter(|c| !self.skipped.contains(*c))
            .filter(|c| seen.insert(c))
            .cloned()
            .collect()
    }
}
