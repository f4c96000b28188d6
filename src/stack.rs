//! Revision stack model
//!
//! A [`Stack`] is kept in display order: newest revision first, the
//! synthetic trunk marker last. Merging happens in the opposite order, so
//! positions in merge order ("merge index", 0 = closest to trunk) are
//! converted with [`display_index`] and nowhere else.

use crate::types::{PullRequest, StackRead};
use std::collections::HashMap;
use std::hash::BuildHasher;

/// Sync/merge state of a single revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// Not touched yet in this run
    #[default]
    Pending,
    /// An operation on this revision is being awaited
    InProgress,
    /// Merged
    Success,
    /// The run failed on this revision
    Error,
}

/// One revision of the stack, plus its state in the current run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    /// Change ID
    pub id: String,
    /// Shortest unique prefix of the change ID
    pub short_id: String,
    /// Full description (or the branch name for the trunk marker)
    pub description: String,
    /// Branch pushed for this revision
    pub bookmark: String,
    /// Whether this is the synthetic trunk marker
    pub is_trunk: bool,
    /// Associated PR number, 0 if none
    pub pr_number: u64,
    /// Current state
    pub state: SyncState,
    /// Sub-status shown while in progress or failed
    pub status_message: String,
    /// Whether the branch is out of date with its intended base
    pub needs_sync: bool,
}

impl Revision {
    /// Create a pending mutable revision
    pub fn new(
        id: impl Into<String>,
        short_id: impl Into<String>,
        description: impl Into<String>,
        bookmark: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            short_id: short_id.into(),
            description: description.into(),
            bookmark: bookmark.into(),
            is_trunk: false,
            pr_number: 0,
            state: SyncState::Pending,
            status_message: String::new(),
            needs_sync: false,
        }
    }

    /// Create the trunk marker for `branch_name`
    pub fn trunk(branch_name: impl Into<String>) -> Self {
        let name = branch_name.into();
        Self {
            id: String::new(),
            short_id: String::new(),
            description: name.clone(),
            bookmark: name,
            is_trunk: true,
            pr_number: 0,
            state: SyncState::Pending,
            status_message: String::new(),
            needs_sync: false,
        }
    }

    /// Attach a PR number
    #[must_use]
    pub const fn with_pr(mut self, pr_number: u64) -> Self {
        self.pr_number = pr_number;
        self
    }

    /// Set the needs-sync flag
    #[must_use]
    pub const fn with_needs_sync(mut self, needs_sync: bool) -> Self {
        self.needs_sync = needs_sync;
        self
    }

    /// First line of the description
    pub fn title(&self) -> &str {
        self.description.lines().next().unwrap_or_default()
    }
}

/// Map a merge index (0 = bottom, merged first) to a display index
/// (0 = top) for a stack of `len` mutable revisions.
///
/// Returns `None` when `merge_index` is past the end.
pub const fn display_index(len: usize, merge_index: usize) -> Option<usize> {
    if merge_index < len {
        Some(len - 1 - merge_index)
    } else {
        None
    }
}

/// The ordered chain of revisions plus the trunk marker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stack {
    revisions: Vec<Revision>,
}

impl Stack {
    /// Build a stack from mutable revisions in display order, appending
    /// a trunk marker named `trunk_name` at the bottom.
    ///
    /// Any trunk markers already in `revisions` are dropped.
    pub fn new(revisions: Vec<Revision>, trunk_name: impl Into<String>) -> Self {
        let mut revisions: Vec<Revision> = revisions.into_iter().filter(|r| !r.is_trunk).collect();
        revisions.push(Revision::trunk(trunk_name));
        Self { revisions }
    }

    /// Build a stack from a backend read, attaching PR numbers by branch.
    ///
    /// A revision needs sync when its parent is not the revision right below
    /// it (trunk for the bottom one), or when its PR's base branch is not the
    /// branch of that revision.
    pub fn from_read<S: BuildHasher>(read: &StackRead, prs: &HashMap<String, PullRequest, S>) -> Self {
        let changes = &read.changes;
        let revisions = changes
            .iter()
            .enumerate()
            .map(|(i, change)| {
                let (expected_parent, expected_base) = changes.get(i + 1).map_or(
                    (read.trunk_change_id.as_str(), read.trunk_name.as_str()),
                    |below| (below.change_id.as_str(), below.bookmark.as_str()),
                );
                let pr = prs.get(&change.bookmark);
                let parent_ok = change.parents.iter().any(|p| p == expected_parent);
                let base_ok = pr.is_some_and(|pr| pr.base_ref == expected_base);

                Revision::new(
                    &change.change_id,
                    &change.short_id,
                    &change.description,
                    &change.bookmark,
                )
                .with_pr(pr.map_or(0, |pr| pr.number))
                .with_needs_sync(!(parent_ok && base_ok))
            })
            .collect();

        Self::new(revisions, read.trunk_name.clone())
    }

    /// All revisions in display order, trunk marker included
    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    /// Revisions in display order with the trunk marker removed
    pub fn mutable_revisions(&self) -> Vec<&Revision> {
        self.revisions.iter().filter(|r| !r.is_trunk).collect()
    }

    /// Number of mutable revisions
    pub fn mutable_len(&self) -> usize {
        self.revisions.iter().filter(|r| !r.is_trunk).count()
    }

    /// Whether the stack holds no revisions at all (not even trunk)
    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    /// Count of mutable revisions whose branch is out of date
    pub fn revisions_needing_sync(&self) -> usize {
        self.revisions
            .iter()
            .filter(|r| !r.is_trunk && r.needs_sync)
            .count()
    }

    /// The mutable revision at `merge_index` (0 = bottom of the stack)
    pub fn at_merge_index(&self, merge_index: usize) -> Option<&Revision> {
        let mutable = self.mutable_revisions();
        display_index(mutable.len(), merge_index).map(|i| mutable[i])
    }

    /// Mutable revisions from `merge_index` upward, in merge order
    pub fn remaining_from(&self, merge_index: usize) -> Vec<&Revision> {
        let mutable = self.mutable_revisions();
        (merge_index..mutable.len())
            .filter_map(|i| display_index(mutable.len(), i).map(|d| mutable[d]))
            .collect()
    }

    /// Update a revision's state and sub-status by change ID.
    ///
    /// Returns `false` if no revision has that ID.
    pub fn set_revision_state(&mut self, id: &str, state: SyncState, message: impl Into<String>) -> bool {
        let Some(rev) = self.revision_mut(id) else {
            return false;
        };
        rev.state = state;
        rev.status_message = message.into();
        true
    }

    /// Update a revision's needs-sync flag by change ID
    pub fn set_needs_sync(&mut self, id: &str, needs_sync: bool) -> bool {
        let Some(rev) = self.revision_mut(id) else {
            return false;
        };
        rev.needs_sync = needs_sync;
        true
    }

    fn revision_mut(&mut self, id: &str) -> Option<&mut Revision> {
        self.revisions
            .iter_mut()
            .find(|r| !r.is_trunk && r.id == id)
    }
}
