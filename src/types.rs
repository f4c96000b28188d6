//! Core types for jj-land

use serde::{Deserialize, Serialize};

/// A change as read from the version-control backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Change {
    /// jj change ID (full)
    pub change_id: String,
    /// Shortest unique prefix of the change ID
    pub short_id: String,
    /// Git commit ID (hex)
    pub commit_id: String,
    /// Whether jj considers this change immutable
    pub immutable: bool,
    /// Full description (first line is the title)
    pub description: String,
    /// Branch name pushed for this change
    pub bookmark: String,
    /// Change IDs of the parents
    #[serde(default)]
    pub parents: Vec<String>,
}

impl Change {
    /// First line of the description
    pub fn title(&self) -> &str {
        self.description.lines().next().unwrap_or_default()
    }
}

/// Result of reading a stack from the backend
#[derive(Debug, Clone, Default)]
pub struct StackRead {
    /// Mutable changes, newest first (display order)
    pub changes: Vec<Change>,
    /// Name of the trunk branch (e.g. "main")
    pub trunk_name: String,
    /// Change ID of the trunk commit
    pub trunk_change_id: String,
}

/// Outcome of a rebase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebaseOutcome {
    /// Rebase completed cleanly
    Clean,
    /// Rebase completed but left conflicted commits
    Conflicted,
}

/// A pull request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// Web URL for the PR
    pub html_url: String,
    /// Base branch name
    pub base_ref: String,
    /// Head branch name
    pub head_ref: String,
    /// PR title
    pub title: String,
    /// Whether PR is a draft
    pub is_draft: bool,
}

/// A git remote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitRemote {
    /// Remote name (e.g., "origin")
    pub name: String,
    /// Remote URL
    pub url: String,
}

/// Detected platform type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// GitHub or GitHub Enterprise
    GitHub,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GitHub => write!(f, "GitHub"),
        }
    }
}

/// Platform configuration
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Platform type
    pub platform: Platform,
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Custom host (None for github.com)
    pub host: Option<String>,
}

impl PlatformConfig {
    /// Web URL of a pull request in this repository
    pub fn pr_url(&self, pr_number: u64) -> String {
        let host = self.host.as_deref().unwrap_or("github.com");
        format!("https://{host}/{}/{}/pull/{pr_number}", self.owner, self.repo)
    }
}

/// PR state (open, closed, merged)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrState {
    /// PR is open and can be merged
    Open,
    /// PR was closed without merging
    Closed,
    /// PR was merged
    Merged,
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Merged => write!(f, "merged"),
        }
    }
}

/// Extended PR details, including the platform's merge status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestDetails {
    /// PR number
    pub number: u64,
    /// PR title
    pub title: String,
    /// Current state of the PR
    pub state: PrState,
    /// Whether PR is a draft
    pub is_draft: bool,
    /// Whether the PR can be merged
    /// - `Some(true)` = mergeable
    /// - `Some(false)` = has conflicts
    /// - `None` = unknown (GitHub still computing)
    pub mergeable: Option<bool>,
    /// GitHub's `mergeable_state` ("clean", "blocked", "behind", "unknown", ...)
    pub mergeable_state: Option<String>,
    /// Head branch name
    pub head_ref: String,
    /// Base branch name
    pub base_ref: String,
    /// Web URL for the PR
    pub html_url: String,
}

/// Result of a merge operation
#[derive(Debug, Clone)]
pub struct MergeResult {
    /// Whether the merge was successful
    pub merged: bool,
    /// The SHA of the merge commit (if successful)
    pub sha: Option<String>,
    /// Message from the merge operation (especially on failure)
    pub message: Option<String>,
}

/// Merge strategy/method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    /// Squash all commits into one
    Squash,
    /// Create a merge commit
    #[default]
    Merge,
    /// Rebase commits onto base branch
    Rebase,
}

impl MergeMethod {
    /// Value of the `merge_method` field in GitHub's merge API
    pub const fn as_api_str(self) -> &'static str {
        match self {
            Self::Squash => "squash",
            Self::Merge => "merge",
            Self::Rebase => "rebase",
        }
    }
}

impl std::fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_api_str())
    }
}

impl std::str::FromStr for MergeMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "squash" => Ok(Self::Squash),
            "merge" => Ok(Self::Merge),
            "rebase" => Ok(Self::Rebase),
            other => Err(format!(
                "unknown merge method '{other}' (expected merge, squash or rebase)"
            )),
        }
    }
}
