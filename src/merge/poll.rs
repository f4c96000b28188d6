//! Mergeability poller

use crate::error::Result;
use crate::platform::PlatformService;
use tracing::debug;

/// GitHub's `mergeable_state` for a PR whose checks and reviews allow merging
pub const CLEAN_STATE: &str = "clean";

/// State string used when the platform reports none
const UNKNOWN_STATE: &str = "unknown";

/// Classification of a PR's readiness to merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mergeability {
    /// Mergeable and clean
    Ready,
    /// Platform has not computed mergeability yet
    Unknown {
        /// Raw mergeable state
        state: String,
    },
    /// Blocked, behind, dirty, unstable, draft, ...
    NotReady {
        /// Raw mergeable state
        state: String,
    },
}

impl Mergeability {
    /// Classify the platform's mergeable flag and state.
    ///
    /// Only `Some(true)` together with a clean state is ready.
    pub fn classify(mergeable: Option<bool>, state: Option<&str>) -> Self {
        let state = state.unwrap_or(UNKNOWN_STATE);
        match mergeable {
            Some(true) if state == CLEAN_STATE => Self::Ready,
            None => Self::Unknown {
                state: state.to_string(),
            },
            Some(_) => Self::NotReady {
                state: state.to_string(),
            },
        }
    }

    /// Whether the PR can be merged now
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Raw state string, for display
    pub fn state(&self) -> &str {
        match self {
            Self::Ready => CLEAN_STATE,
            Self::Unknown { state } | Self::NotReady { state } => state,
        }
    }
}

/// Query the platform and classify a PR's mergeability (EFFECTFUL)
pub async fn check_mergeable(platform: &dyn PlatformService, pr_number: u64) -> Result<Mergeability> {
    let details = platform.get_pr_details(pr_number).await?;
    let mergeability = Mergeability::classify(details.mergeable, details.mergeable_state.as_deref());
    debug!(pr_number, state = mergeability.state(), ready = mergeability.is_ready(), "checked mergeability");
    Ok(mergeability)
}
