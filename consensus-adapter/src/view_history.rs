//! View-change history: an ordered, monotone sequence of `(view, min_global_commit)` pairs used
//! to answer "what view was in effect at seqno S". Entries are pushed by `GlobalCommitState`
//! (§4.3), which owns the `last_commit_view` comparison that decides *when* to push; this
//! structure only stores and looks up.

use crate::ids::{SeqNo, View, VIEW_OFFSET};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    view: View,
    min_global_commit: SeqNo,
}

/// Initialized with a single `(0, 0)` entry, which guarantees every `view_at` lookup finds a
/// match: any seqno is `>= 0`.
#[derive(Debug, Clone)]
pub struct ViewChangeHistory {
    entries: Vec<Entry>,
}

impl ViewChangeHistory {
    pub fn new() -> Self {
        Self {
            entries: vec![Entry {
                view: 0,
                min_global_commit: 0,
            }],
        }
    }

    /// Appends `(view, min_global_commit)` unconditionally. Callers (`GlobalCommitState`) are
    /// responsible for only calling this when `view` exceeds every prior committed view, which
    /// is what keeps `entries` monotone.
    pub(crate) fn push(&mut self, view: View, min_global_commit: SeqNo) {
        debug_assert!(
            self.entries.last().map(|e| view > e.view).unwrap_or(true),
            "view history must stay monotone"
        );
        self.entries.push(Entry {
            view,
            min_global_commit,
        });
    }

    /// Scans newest-first for the first entry whose `min_global_commit <= seqno`, returning its
    /// view plus the fixed `VIEW_OFFSET`. The initial `(0, 0)` entry guarantees a match always
    /// exists, so `None` here indicates corruption of the history.
    pub fn view_at(&self, seqno: SeqNo) -> Option<View> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.min_global_commit <= seqno)
            .map(|e| e.view + VIEW_OFFSET)
    }

    #[cfg(test)]
    pub(crate) fn entries_for_test(&self) -> Vec<(View, SeqNo)> {
        self.entries.iter().map(|e| (e.view, e.min_global_commit)).collect()
    }
}

impl Default for ViewChangeHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_default_entry() {
        let history = ViewChangeHistory::new();
        assert_eq!(history.view_at(0), Some(VIEW_OFFSET));
        assert_eq!(history.view_at(1_000_000), Some(VIEW_OFFSET));
    }

    #[test]
    fn lookup_scans_newest_first() {
        let mut history = ViewChangeHistory::new();
        history.push(2, 7);
        history.push(3, 9);
        assert_eq!(history.view_at(0), Some(2));
        assert_eq!(history.view_at(6), Some(2));
        assert_eq!(history.view_at(7), Some(4));
        assert_eq!(history.view_at(8), Some(4));
        assert_eq!(history.view_at(9), Some(5));
    }
}
