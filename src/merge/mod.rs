//! Merge engine for stacked PRs
//!
//! Functional core, imperative shell:
//! - `machine` - the phase state machine (pure, testable). It consumes one
//!   [`Message`] at a time and answers with the next [`Command`].
//! - `runner` - executes commands as async tasks, one at a time, and feeds
//!   their results back into the machine (effectful).
//! - `sync` / `poll` - the effectful operations commands are built from.
//! - `view` - renders a [`MergeSnapshot`] for display (pure).

mod machine;
mod poll;
mod progress;
mod runner;
mod sync;
mod view;

pub use machine::{
    Command, LoadedStack, MachineOptions, MergeMachine, Message, Phase, STALE_MERGE_PHRASES,
    is_stale_merge_error,
};
pub use poll::{CLEAN_STATE, Mergeability, check_mergeable};
pub use progress::{MergeProgress, NoopProgress};
pub use runner::{MergeRunner, RunSummary, load_stack};
pub use sync::{RemainingRevision, SyncOutcome, SyncRequest, TRUNK_REVSET, run_sync};
pub use view::{DEFAULT_WIDTH, MergeSnapshot, ViewOptions, activity, render, render_stack, summary, truncate};
