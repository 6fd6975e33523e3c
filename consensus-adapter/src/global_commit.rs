//! Global commit state (§3, §4.3): the `(global_commit_seqno, last_commit_view)` pair fed by the
//! Replica Core's global-commit callback, plus the view-change history it feeds in turn.

use crate::{
    ids::{SeqNo, View, NO_VERSION},
    view_history::ViewChangeHistory,
};

/// Starts at 1: the replica is already operating in view 1 by the time any commit callback can
/// fire, so the very first callback (which always reports the replica's current view) must not
/// be treated as a view change in its own right. Only a later callback reporting a *higher* view
/// records a history entry.
const INITIAL_LAST_COMMIT_VIEW: View = 1;

/// Owns `global_commit_seqno`'s monotonicity and decides, on the Replica Core's behalf, when a
/// reported view has actually changed and so belongs in the view-change history.
#[derive(Debug)]
pub struct GlobalCommitState {
    global_commit_seqno: SeqNo,
    last_commit_view: View,
    history: ViewChangeHistory,
}

impl GlobalCommitState {
    pub fn new() -> Self {
        Self {
            global_commit_seqno: NO_VERSION,
            last_commit_view: INITIAL_LAST_COMMIT_VIEW,
            history: ViewChangeHistory::new(),
        }
    }

    pub fn global_commit_seqno(&self) -> SeqNo {
        self.global_commit_seqno
    }

    pub fn history(&self) -> &ViewChangeHistory {
        &self.history
    }

    /// Applies a global-commit callback from the Replica Core (§4.3):
    /// 1. Discard if `version` is `NoVersion` or less than the current `global_commit_seqno`.
    /// 2. Else set `global_commit_seqno = version`.
    /// 3. If `view > last_commit_view`, append `(view, version)` to the history and raise
    ///    `last_commit_view` to `view`.
    ///
    /// Returns the version to pass to `Store::compact` if the update was accepted, `None` if it
    /// was discarded.
    pub fn on_global_commit(&mut self, version: SeqNo, view: View) -> Option<SeqNo> {
        if version == NO_VERSION || version < self.global_commit_seqno {
            return None;
        }
        self.global_commit_seqno = version;
        if view > self.last_commit_view {
            self.history.push(view, version);
            self.last_commit_view = view;
        }
        Some(version)
    }
}

impl Default for GlobalCommitState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_current_seqno_is_discarded() {
        let mut state = GlobalCommitState::new();
        assert_eq!(state.on_global_commit(5, 1), Some(5));
        assert_eq!(state.on_global_commit(3, 1), None);
        assert_eq!(state.global_commit_seqno(), 5);
    }

    #[test]
    fn no_version_is_discarded() {
        let mut state = GlobalCommitState::new();
        assert_eq!(state.on_global_commit(NO_VERSION, 1), None);
        assert_eq!(state.global_commit_seqno(), NO_VERSION);
    }

    #[test]
    fn equal_seqno_is_accepted_but_not_a_new_commit() {
        let mut state = GlobalCommitState::new();
        assert_eq!(state.on_global_commit(7, 1), Some(7));
        assert_eq!(state.on_global_commit(7, 1), Some(7));
        assert_eq!(state.global_commit_seqno(), 7);
    }

    /// Reproduces the literal boundary scenario: versions `[5, 7, 7, 6, 9]` against views
    /// `[1, 1, 2, 2, 3]` trace `global_commit_seqno` through `5, 7, 7, 7, 9` and leave the
    /// view-change history at `[(0, 0), (2, 7), (3, 9)]`.
    #[test]
    fn scenario_monotonic_commits_builds_expected_history() {
        let mut state = GlobalCommitState::new();

        let versions = [5, 7, 7, 6, 9];
        let views = [1, 1, 2, 2, 3];
        let mut trace = Vec::new();
        for (version, view) in versions.into_iter().zip(views) {
            state.on_global_commit(version, view);
            trace.push(state.global_commit_seqno());
        }

        assert_eq!(trace, vec![5, 7, 7, 7, 9]);
        assert_eq!(
            state.history().entries_for_test(),
            vec![(0, 0), (2, 7), (3, 9)]
        );

        assert_eq!(state.history().view_at(0), Some(2));
        assert_eq!(state.history().view_at(6), Some(2));
        assert_eq!(state.history().view_at(7), Some(4));
        assert_eq!(state.history().view_at(8), Some(4));
        assert_eq!(state.history().view_at(9), Some(5));
    }
}
