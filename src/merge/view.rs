//! Text projection of a merge run (PURE)
//!
//! Everything here is a function of a [`MergeSnapshot`]; the CLI decides
//! where and how often the text is drawn.

use crate::merge::machine::Phase;
use crate::stack::{Revision, SyncState};
use crate::types::PlatformConfig;
use std::fmt::Write;

const GRAPH_TRUNK: &str = "◆";
const GRAPH_PENDING: &str = "○";
const GRAPH_IN_PROGRESS: &str = "◉";
const GRAPH_SUCCESS: &str = "✓";
const GRAPH_ERROR: &str = "✗";
const GRAPH_LINE: &str = "│";

const ELLIPSIS: &str = "...";
const CHANGE_ID_WIDTH: usize = 8;
const SYMBOL_WIDTH: usize = 2;
/// Three two-space separators on a revision line
const SPACING_WIDTH: usize = 6;
const MIN_DESCRIPTION_WIDTH: usize = 10;

/// Terminal width assumed when none is known
pub const DEFAULT_WIDTH: usize = 80;

/// Immutable view of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSnapshot {
    /// Current phase
    pub phase: Phase,
    /// Revisions in display order, trunk marker last
    pub revisions: Vec<Revision>,
    /// Merge index of the PR being worked on
    pub current_index: usize,
    /// PR at the current merge index
    pub current_pr: Option<u64>,
    /// PRs merged so far
    pub merged_count: usize,
    /// Mutable revisions in the stack
    pub total: usize,
    /// Error message, once failed
    pub error: Option<String>,
    /// The user declined the confirmation
    pub aborted: bool,
}

/// Rendering options
#[derive(Debug, Clone)]
pub struct ViewOptions {
    /// Repository the PR links point at
    pub repo: PlatformConfig,
    /// Terminal width in columns
    pub width: usize,
}

impl ViewOptions {
    /// Options for `repo` at the default width
    pub const fn new(repo: PlatformConfig) -> Self {
        Self {
            repo,
            width: DEFAULT_WIDTH,
        }
    }

    /// Override the width; 0 keeps the default
    #[must_use]
    pub const fn with_width(mut self, width: usize) -> Self {
        if width > 0 {
            self.width = width;
        }
        self
    }
}

/// Shorten `s` to at most `max` characters, ending in "..." when cut.
///
/// With `max` of 3 or less the text is cut without an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    if max <= ELLIPSIS.len() {
        return s.chars().take(max).collect();
    }
    let mut out: String = s.chars().take(max - ELLIPSIS.len()).collect();
    out.push_str(ELLIPSIS);
    out
}

fn graph_symbol(rev: &Revision) -> &'static str {
    if rev.is_trunk {
        return GRAPH_TRUNK;
    }
    match rev.state {
        SyncState::Error => GRAPH_ERROR,
        SyncState::Success => GRAPH_SUCCESS,
        SyncState::InProgress => GRAPH_IN_PROGRESS,
        // up to date already
        SyncState::Pending if !rev.needs_sync => GRAPH_SUCCESS,
        SyncState::Pending => GRAPH_PENDING,
    }
}

fn render_revision(out: &mut String, rev: &Revision, connector: bool, options: &ViewOptions) {
    let symbol = graph_symbol(rev);

    if rev.is_trunk {
        let _ = write!(out, "{symbol}  {}", rev.description);
    } else {
        let change_id: String = rev.id.chars().take(CHANGE_ID_WIDTH).collect();
        let pr_text = if rev.pr_number > 0 {
            options.repo.pr_url(rev.pr_number)
        } else {
            "(new PR)".to_string()
        };

        let fixed = SYMBOL_WIDTH + SPACING_WIDTH + CHANGE_ID_WIDTH + pr_text.chars().count();
        let available = options
            .width
            .saturating_sub(fixed)
            .max(MIN_DESCRIPTION_WIDTH);
        let title = truncate(rev.title(), available);

        let _ = write!(out, "{symbol}  {change_id}  {title}  {pr_text}");
    }
    out.push('\n');

    let shows_status = matches!(rev.state, SyncState::InProgress | SyncState::Error)
        && !rev.status_message.is_empty();
    if !connector && !shows_status {
        return;
    }
    if connector {
        out.push_str(GRAPH_LINE);
    }
    if shows_status {
        let _ = write!(out, "  {}", rev.status_message);
    }
    out.push('\n');
}

/// Render the revision list
pub fn render_stack(snapshot: &MergeSnapshot, options: &ViewOptions) -> String {
    let mut out = String::new();
    let last = snapshot.revisions.len().saturating_sub(1);
    for (i, rev) in snapshot.revisions.iter().enumerate() {
        render_revision(&mut out, rev, i < last, options);
    }
    out
}

/// One-line description of the work in flight, if any
pub fn activity(snapshot: &MergeSnapshot) -> Option<String> {
    match snapshot.phase {
        Phase::Loading => Some("Loading stack and PRs...".to_string()),
        Phase::Syncing => Some("Syncing with remote (rebasing and pushing)...".to_string()),
        Phase::SyncingAfterMerge => {
            Some("Rebasing and pushing remaining PRs onto updated trunk...".to_string())
        }
        Phase::WaitingForMergeable => Some(snapshot.current_pr.map_or_else(
            || "Waiting for PR to be mergeable...".to_string(),
            |n| format!("Waiting for PR #{n} to be mergeable..."),
        )),
        Phase::Merging => Some(snapshot.current_pr.map_or_else(
            || "Merging...".to_string(),
            |n| format!("Merging PR #{n} ({} of {})...", snapshot.current_index + 1, snapshot.total),
        )),
        Phase::Confirmation | Phase::Complete | Phase::Error => None,
    }
}

/// Closing text for confirmation and terminal phases
pub fn summary(snapshot: &MergeSnapshot) -> Option<String> {
    match snapshot.phase {
        Phase::Confirmation if snapshot.aborted => Some("Aborted, nothing was merged.\n".to_string()),
        Phase::Confirmation => Some(format!(
            "{} PR(s) will be merged (bottom to top).\n",
            snapshot.total
        )),
        Phase::Complete => Some(format!(
            "Successfully merged {} PR(s)!\n",
            snapshot.merged_count
        )),
        Phase::Error => {
            let mut out = String::from("Merge failed\n\n");
            if let Some(error) = &snapshot.error {
                let _ = writeln!(out, "{error}");
            }
            if snapshot.merged_count > 0 {
                let _ = writeln!(
                    out,
                    "{} of {} PR(s) were merged before the failure.",
                    snapshot.merged_count, snapshot.total
                );
            }
            Some(out)
        }
        _ => None,
    }
}

/// Render the whole run: stack, activity line and summary
pub fn render(snapshot: &MergeSnapshot, options: &ViewOptions) -> String {
    let mut out = String::new();
    let show_stack = snapshot.phase != Phase::Loading && !snapshot.revisions.is_empty();
    if show_stack {
        out.push_str(&render_stack(snapshot, options));
    }
    if let Some(activity) = activity(snapshot) {
        let _ = writeln!(out, "{activity}");
    }
    if let Some(summary) = summary(snapshot) {
        if show_stack && snapshot.phase == Phase::Confirmation {
            out.push('\n');
        }
        out.push_str(&summary);
    }
    out
}
