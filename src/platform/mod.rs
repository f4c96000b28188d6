//! Review platform services
//!
//! Provides the interface the merge engine uses to look up, retarget and
//! merge pull requests.

mod detection;
mod github;

pub use detection::{detect_platform, parse_repo_info};
pub use github::GitHubService;

use crate::error::Result;
use crate::types::{MergeMethod, MergeResult, PlatformConfig, PullRequest, PullRequestDetails};
use async_trait::async_trait;
use std::collections::HashMap;

/// Platform service trait for PR operations
#[async_trait]
pub trait PlatformService: Send + Sync {
    /// Find an existing open PR for a head branch
    async fn find_existing_pr(&self, head_branch: &str) -> Result<Option<PullRequest>>;

    /// Find open PRs for several head branches at once.
    ///
    /// Branches without an open PR are absent from the returned map. The
    /// default implementation queries each branch in turn and fails fast on
    /// the first error.
    async fn find_prs_for_branches(&self, branches: &[String]) -> Result<HashMap<String, PullRequest>> {
        let mut result = HashMap::new();
        for branch in branches {
            if let Some(pr) = self.find_existing_pr(branch).await? {
                result.insert(branch.clone(), pr);
            }
        }
        Ok(result)
    }

    /// Get full PR details including the mergeable flag and state
    async fn get_pr_details(&self, pr_number: u64) -> Result<PullRequestDetails>;

    /// Update the base branch of an existing PR
    async fn update_pr_base(&self, pr_number: u64, new_base: &str) -> Result<PullRequest>;

    /// Merge a PR.
    ///
    /// With `title: None` the platform's default commit title is used.
    async fn merge_pr(
        &self,
        pr_number: u64,
        method: MergeMethod,
        title: Option<&str>,
    ) -> Result<MergeResult>;

    /// Get the platform configuration
    fn config(&self) -> &PlatformConfig;
}
