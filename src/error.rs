//! Error types for jj-land

use std::fmt;
use thiserror::Error;

/// Step of the sync operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    /// Fetching remote state
    Fetch,
    /// Rebasing the remaining stack onto trunk
    Rebase,
    /// Pushing a revision's branch
    Push,
    /// Retargeting a PR's base branch
    UpdateBase,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => write!(f, "git fetch"),
            Self::Rebase => write!(f, "rebase"),
            Self::Push => write!(f, "push"),
            Self::UpdateBase => write!(f, "update base of"),
        }
    }
}

/// Errors that can occur while landing a stack
#[derive(Debug, Error)]
pub enum Error {
    /// A mutable revision has no pull request
    #[error("revision {revision} has no PR - submit the stack first")]
    MissingPullRequest {
        /// Short id of the offending revision
        revision: String,
    },

    /// Nothing between trunk and the selected revision
    #[error("no revisions to merge")]
    EmptyStack,

    /// A `jj` invocation failed
    #[error("jj error: {0}")]
    Jj(String),

    /// A step of the sync operation failed
    #[error("{step} {target}: {source}")]
    Sync {
        /// Which step failed
        step: SyncStep,
        /// What the step was operating on (remote, revision or PR)
        target: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Rebasing the remaining stack produced conflicts
    #[error("sync resulted in conflicts - resolve with 'jj resolve' before merging")]
    Conflict,

    /// PR is not mergeable and waiting was disabled
    #[error("PR #{pr_number} is not mergeable (state: {state}) - run without --no-wait to wait")]
    NotMergeable {
        /// PR number
        pr_number: u64,
        /// Platform-reported mergeable state
        state: String,
    },

    /// Merging a PR failed for a reason other than a stale branch
    #[error("failed to merge PR #{pr_number}: {source}")]
    MergeFailed {
        /// PR number
        pr_number: u64,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// The stale-branch retry limit was reached
    #[error("PR #{pr_number} was still out of date after {attempts} resync(s)")]
    StaleRetriesExhausted {
        /// PR number
        pr_number: u64,
        /// Number of resyncs attempted
        attempts: u32,
    },

    /// GitHub API error
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    /// The platform refused an operation without an API error
    #[error("platform error: {0}")]
    Platform(String),

    /// octocrab client error
    #[error("GitHub API error: {0}")]
    Octocrab(#[from] octocrab::Error),

    /// Authentication failure
    #[error("authentication error: {0}")]
    Auth(String),

    /// Configuration could not be read or parsed
    #[error("config error: {0}")]
    Config(String),

    /// Requested remote does not exist
    #[error("remote '{0}' not found")]
    RemoteNotFound(String),

    /// No remote points at a supported platform
    #[error("no supported remotes found (GitHub)")]
    NoSupportedRemotes,

    /// Interrupted by the user
    #[error("interrupted")]
    Cancelled,

    /// Internal invariant violation
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap an error as a failed sync step
    pub fn sync(step: SyncStep, target: impl Into<String>, source: Self) -> Self {
        Self::Sync {
            step,
            target: target.into(),
            source: Box::new(source),
        }
    }

    /// Returns true if this is a cancellation error
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type alias using jj-land's Error
pub type Result<T> = std::result::Result<T, Error>;
