//! Merge phase state machine (PURE)
//!
//! The machine owns all run state. It never performs I/O: every effect is
//! requested through the [`Command`] returned from [`MergeMachine::handle`],
//! and its outcome comes back as a [`Message`]. At most one command is
//! outstanding at a time, so handling a message never races another.

use crate::error::Error;
use crate::merge::poll::Mergeability;
use crate::merge::sync::{RemainingRevision, SyncOutcome, SyncRequest};
use crate::merge::view::MergeSnapshot;
use crate::stack::{Stack, SyncState};
use crate::types::{PullRequest, StackRead};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Merge-failure phrases that mean the PR branch is stale and a resync
/// should be attempted. Compared case-insensitively.
pub const STALE_MERGE_PHRASES: &[&str] = &[
    "out of date",
    "out-of-date",
    "head branch was modified",
    "base branch was modified",
];

const CHECKING_STATUS: &str = "Checking if mergeable...";
const MERGING_STATUS: &str = "Merging...";
const STALE_STATUS: &str = "Branch out of date, syncing...";
const SYNCING_STATUS: &str = "Syncing with trunk...";

/// Whether a merge failure indicates a stale PR branch
pub fn is_stale_merge_error(err: &Error) -> bool {
    let message = err.to_string().to_lowercase();
    STALE_MERGE_PHRASES.iter().any(|phrase| message.contains(phrase))
}

/// Run phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Fetching and reading the stack
    Loading,
    /// Waiting for the user to confirm
    Confirmation,
    /// Initial sync with the remote
    Syncing,
    /// Polling the current PR's mergeability
    WaitingForMergeable,
    /// Merge request in flight
    Merging,
    /// Rebasing the rest of the stack after a merge or a stale-branch failure
    SyncingAfterMerge,
    /// Every PR merged
    Complete,
    /// The run failed
    Error,
}

impl Phase {
    /// Whether the run has ended
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Loading => "loading",
            Self::Confirmation => "confirmation",
            Self::Syncing => "syncing",
            Self::WaitingForMergeable => "waiting for mergeable",
            Self::Merging => "merging",
            Self::SyncingAfterMerge => "syncing after merge",
            Self::Complete => "complete",
            Self::Error => "error",
        };
        write!(f, "{name}")
    }
}

/// Result of the load command
#[derive(Debug, Clone)]
pub struct LoadedStack {
    /// Stack as read from the backend
    pub read: StackRead,
    /// Open PRs keyed by head branch
    pub prs: HashMap<String, PullRequest>,
}

/// Outcome of a command, fed back into the machine
#[derive(Debug)]
pub enum Message {
    /// Stack and PRs loaded (or failed to)
    LoadComplete(crate::Result<LoadedStack>),
    /// User confirmed the merge
    Confirmed,
    /// User declined
    Declined,
    /// Sync finished
    SyncComplete(crate::Result<SyncOutcome>),
    /// Mergeability check finished
    MergeableChecked {
        /// PR that was checked
        pr_number: u64,
        /// Classification or query failure
        result: crate::Result<Mergeability>,
    },
    /// Merge request finished
    MergeComplete {
        /// PR that was merged
        pr_number: u64,
        /// Merge failure, if any
        result: crate::Result<()>,
    },
}

impl Message {
    const fn kind(&self) -> &'static str {
        match self {
            Self::LoadComplete(_) => "load-complete",
            Self::Confirmed => "confirmed",
            Self::Declined => "declined",
            Self::SyncComplete(_) => "sync-complete",
            Self::MergeableChecked { .. } => "mergeable-checked",
            Self::MergeComplete { .. } => "merge-complete",
        }
    }
}

/// Effect requested by the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch, read the stack selected by `selector`, and look up PRs
    Load {
        /// Revset naming the top of the stack
        selector: String,
    },
    /// Ask the user to confirm
    AwaitConfirmation,
    /// Rebase and push the remaining stack
    Sync(SyncRequest),
    /// Check a PR's mergeability, optionally after a delay
    CheckMergeable {
        /// PR to check
        pr_number: u64,
        /// Delay before checking
        delay: Option<Duration>,
    },
    /// Merge a PR
    Merge {
        /// PR to merge
        pr_number: u64,
    },
    /// Stop the run
    Quit,
}

/// Behavior switches for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineOptions {
    /// Fail instead of waiting when a PR is not mergeable
    pub no_wait: bool,
    /// Delay between mergeability polls
    pub poll_interval: Duration,
    /// Cap on consecutive stale-branch resyncs per PR (None = unbounded)
    pub max_stale_retries: Option<u32>,
}

impl Default for MachineOptions {
    fn default() -> Self {
        Self {
            no_wait: false,
            poll_interval: Duration::from_secs(crate::config::DEFAULT_POLL_INTERVAL_SECS),
            max_stale_retries: None,
        }
    }
}

/// State machine driving one merge run
#[derive(Debug)]
pub struct MergeMachine {
    selector: String,
    options: MachineOptions,
    phase: Phase,
    stack: Stack,
    trunk_name: String,
    /// Merge index of the PR being worked on (0 = bottom)
    current_index: usize,
    merged_count: usize,
    /// Resyncs triggered by stale-branch failures for the current PR
    stale_retries: u32,
    aborted: bool,
    error: Option<Error>,
}

impl MergeMachine {
    /// Create a machine for the stack ending at `selector`
    pub fn new(selector: impl Into<String>, options: MachineOptions) -> Self {
        Self {
            selector: selector.into(),
            options,
            phase: Phase::Loading,
            stack: Stack::default(),
            trunk_name: String::new(),
            current_index: 0,
            merged_count: 0,
            stale_retries: 0,
            aborted: false,
            error: None,
        }
    }

    /// The first command of a run
    pub fn start(&self) -> Command {
        Command::Load {
            selector: self.selector.clone(),
        }
    }

    /// Current phase
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Current stack (empty until loaded)
    pub const fn stack(&self) -> &Stack {
        &self.stack
    }

    /// Merge index of the PR being worked on
    pub const fn current_index(&self) -> usize {
        self.current_index
    }

    /// Number of PRs merged so far
    pub const fn merged_count(&self) -> usize {
        self.merged_count
    }

    /// Whether the user declined the confirmation
    pub const fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// The error that ended the run, if any
    pub const fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Take ownership of the error that ended the run
    pub fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }

    /// End the run from outside the message flow (interrupt, crashed
    /// command). No-op once the run has ended.
    pub fn abort(&mut self, err: Error) {
        if !self.phase.is_terminal() && !self.aborted {
            self.fail(err);
        }
    }

    /// PR number at the current merge index
    pub fn current_pr(&self) -> Option<u64> {
        self.stack
            .at_merge_index(self.current_index)
            .map(|rev| rev.pr_number)
    }

    /// Immutable view of the run for rendering
    pub fn snapshot(&self) -> MergeSnapshot {
        MergeSnapshot {
            phase: self.phase,
            revisions: self.stack.revisions().to_vec(),
            current_index: self.current_index,
            current_pr: self.current_pr(),
            merged_count: self.merged_count,
            total: self.stack.mutable_len(),
            error: self.error.as_ref().map(ToString::to_string),
            aborted: self.aborted,
        }
    }

    /// Consume one message and return the next command
    pub fn handle(&mut self, message: Message) -> Command {
        if self.phase.is_terminal() || self.aborted {
            debug!(kind = message.kind(), "ignoring message after run ended");
            return Command::Quit;
        }

        let current_pr = self.current_pr();
        match (self.phase, message) {
            (Phase::Loading, Message::LoadComplete(result)) => self.on_loaded(result),
            (Phase::Confirmation, Message::Confirmed) => {
                info!(count = self.stack.mutable_len(), "merge confirmed");
                self.begin_sync(Phase::Syncing, SYNCING_STATUS)
            }
            (Phase::Confirmation, Message::Declined) => {
                info!("merge declined");
                self.aborted = true;
                Command::Quit
            }
            (Phase::Syncing | Phase::SyncingAfterMerge, Message::SyncComplete(result)) => {
                self.on_synced(result)
            }
            (
                Phase::Syncing | Phase::SyncingAfterMerge | Phase::WaitingForMergeable,
                Message::MergeableChecked { pr_number, result },
            ) if current_pr == Some(pr_number) =>
            {
                self.on_checked(pr_number, result)
            }
            (Phase::Merging, Message::MergeComplete { pr_number, result })
                if current_pr == Some(pr_number) =>
            {
                self.on_merged(pr_number, result)
            }
            (phase, message) => self.fail(Error::Internal(format!(
                "unexpected {} message in {phase} phase",
                message.kind()
            ))),
        }
    }

    fn on_loaded(&mut self, result: crate::Result<LoadedStack>) -> Command {
        let loaded = match result {
            Ok(loaded) => loaded,
            Err(e) => return self.fail(e),
        };

        self.trunk_name.clone_from(&loaded.read.trunk_name);
        self.stack = Stack::from_read(&loaded.read, &loaded.prs);

        if self.stack.mutable_len() == 0 {
            return self.fail(Error::EmptyStack);
        }

        let missing = self
            .stack
            .remaining_from(0)
            .into_iter()
            .find(|rev| rev.pr_number == 0)
            .map(|rev| (rev.id.clone(), rev.short_id.clone()));
        if let Some((id, short_id)) = missing {
            return self.fail_at(Some(&id), Error::MissingPullRequest { revision: short_id });
        }

        debug!(
            count = self.stack.mutable_len(),
            needing_sync = self.stack.revisions_needing_sync(),
            trunk = %self.trunk_name,
            "stack loaded"
        );
        self.phase = Phase::Confirmation;
        Command::AwaitConfirmation
    }

    fn on_synced(&mut self, result: crate::Result<SyncOutcome>) -> Command {
        match result {
            Ok(SyncOutcome::Synced) => {
                let ids: Vec<String> = self
                    .stack
                    .remaining_from(self.current_index)
                    .iter()
                    .map(|rev| rev.id.clone())
                    .collect();
                for id in &ids {
                    self.stack.set_needs_sync(id, false);
                }
                // phase stays put until the poll says whether to wait
                self.check_command(None)
            }
            Ok(SyncOutcome::Conflict) => self.fail(Error::Conflict),
            Err(e) => self.fail(e),
        }
    }

    fn on_checked(&mut self, pr_number: u64, result: crate::Result<Mergeability>) -> Command {
        let mergeability = match result {
            Ok(m) => m,
            Err(e) => return self.fail(e),
        };

        if mergeability.is_ready() {
            self.phase = Phase::Merging;
            self.set_current_state(SyncState::InProgress, MERGING_STATUS);
            return Command::Merge { pr_number };
        }

        if self.options.no_wait {
            return self.fail(Error::NotMergeable {
                pr_number,
                state: mergeability.state().to_string(),
            });
        }

        debug!(pr_number, state = mergeability.state(), "not mergeable yet, polling again");
        self.phase = Phase::WaitingForMergeable;
        let status = format!("Waiting for PR to be mergeable ({})...", mergeability.state());
        self.set_current_state(SyncState::InProgress, status);
        self.check_command(Some(self.options.poll_interval))
    }

    fn on_merged(&mut self, pr_number: u64, result: crate::Result<()>) -> Command {
        if let Err(e) = result {
            if !is_stale_merge_error(&e) {
                return self.fail(Error::MergeFailed {
                    pr_number,
                    source: Box::new(e),
                });
            }

            self.stale_retries += 1;
            if let Some(max) = self.options.max_stale_retries
                && self.stale_retries > max
            {
                return self.fail(Error::StaleRetriesExhausted {
                    pr_number,
                    attempts: max,
                });
            }

            warn!(pr_number, attempt = self.stale_retries, error = %e, "PR branch is stale, resyncing");
            return self.begin_sync(Phase::SyncingAfterMerge, STALE_STATUS);
        }

        info!(pr_number, "merged");
        self.set_current_state(SyncState::Success, "");
        self.merged_count += 1;
        self.current_index += 1;
        self.stale_retries = 0;

        if self.current_index >= self.stack.mutable_len() {
            self.phase = Phase::Complete;
            return Command::Quit;
        }
        self.begin_sync(Phase::SyncingAfterMerge, SYNCING_STATUS)
    }

    /// Sync the remaining stack, marking its root with `status`
    fn begin_sync(&mut self, phase: Phase, status: &str) -> Command {
        self.phase = phase;
        self.set_current_state(SyncState::InProgress, status);
        let remaining = self
            .stack
            .remaining_from(self.current_index)
            .into_iter()
            .map(|rev| RemainingRevision {
                change_id: rev.id.clone(),
                short_id: rev.short_id.clone(),
                pr_number: rev.pr_number,
            })
            .collect();
        Command::Sync(SyncRequest {
            remaining,
            trunk_name: self.trunk_name.clone(),
        })
    }

    /// Poll the current PR. The "checking" status is only shown for an
    /// immediate check so a delayed re-poll keeps its waiting status.
    fn check_command(&mut self, delay: Option<Duration>) -> Command {
        let Some(pr_number) = self.current_pr() else {
            return self.fail(Error::Internal(format!(
                "no revision at merge index {}",
                self.current_index
            )));
        };
        if delay.is_none() {
            self.set_current_state(SyncState::InProgress, CHECKING_STATUS);
        }
        Command::CheckMergeable { pr_number, delay }
    }

    fn set_current_state(&mut self, state: SyncState, message: impl Into<String>) {
        let Some(id) = self
            .stack
            .at_merge_index(self.current_index)
            .map(|rev| rev.id.clone())
        else {
            return;
        };
        self.stack.set_revision_state(&id, state, message);
    }

    fn fail(&mut self, err: Error) -> Command {
        let id = match self.phase {
            Phase::Loading | Phase::Confirmation => None,
            _ => self
                .stack
                .at_merge_index(self.current_index)
                .map(|rev| rev.id.clone()),
        };
        self.fail_at(id.as_deref(), err)
    }

    fn fail_at(&mut self, id: Option<&str>, err: Error) -> Command {
        warn!(phase = %self.phase, error = %err, "merge run failed");
        if let Some(id) = id {
            self.stack.set_revision_state(id, SyncState::Error, err.to_string());
        }
        self.phase = Phase::Error;
        self.error = Some(err);
        Command::Quit
    }
}
