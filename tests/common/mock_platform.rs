//! Mock platform service for testing

use async_trait::async_trait;
use jj_land::error::{Error, Result};
use jj_land::platform::PlatformService;
use jj_land::types::{MergeMethod, MergeResult, PlatformConfig, PullRequest, PullRequestDetails};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Call record for `update_pr_base`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateBaseCall {
    pub pr_number: u64,
    pub new_base: String,
}

/// Call record for `merge_pr`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePrCall {
    pub pr_number: u64,
    pub method: MergeMethod,
}

/// Simple mock platform service for testing
///
/// This manually implements `PlatformService` rather than using mockall,
/// because mockall has issues with methods returning references.
///
/// Features:
/// - Call tracking for verification
/// - Configurable responses per branch
/// - Scripted `get_pr_details` sequences per PR (the last entry repeats)
/// - Scripted merge failures per PR
/// - Error injection for failure path testing
pub struct MockPlatformService {
    config: PlatformConfig,
    find_pr_responses: Mutex<HashMap<String, PullRequest>>,
    details_responses: Mutex<HashMap<u64, VecDeque<PullRequestDetails>>>,
    merge_failures: Mutex<HashMap<u64, VecDeque<String>>>,
    merge_refusals: Mutex<HashMap<u64, String>>,
    // Call tracking
    find_pr_calls: Mutex<Vec<String>>,
    get_pr_details_calls: Mutex<Vec<u64>>,
    update_base_calls: Mutex<Vec<UpdateBaseCall>>,
    merge_pr_calls: Mutex<Vec<MergePrCall>>,
    // Error injection
    error_on_find_pr: Mutex<Option<String>>,
    error_on_update_base: Mutex<Option<String>>,
    error_on_get_pr_details: Mutex<Option<String>>,
}

impl MockPlatformService {
    /// Create a new mock with the given config
    pub fn with_config(config: PlatformConfig) -> Self {
        Self {
            config,
            find_pr_responses: Mutex::new(HashMap::new()),
            details_responses: Mutex::new(HashMap::new()),
            merge_failures: Mutex::new(HashMap::new()),
            merge_refusals: Mutex::new(HashMap::new()),
            find_pr_calls: Mutex::new(Vec::new()),
            get_pr_details_calls: Mutex::new(Vec::new()),
            update_base_calls: Mutex::new(Vec::new()),
            merge_pr_calls: Mutex::new(Vec::new()),
            error_on_find_pr: Mutex::new(None),
            error_on_update_base: Mutex::new(None),
            error_on_get_pr_details: Mutex::new(None),
        }
    }

    // === Error injection methods ===

    /// Make `find_existing_pr` return an error
    pub fn fail_find_pr(&self, msg: &str) {
        *self.error_on_find_pr.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `update_pr_base` return an error
    pub fn fail_update_base(&self, msg: &str) {
        *self.error_on_update_base.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `get_pr_details` return an error
    pub fn fail_get_pr_details(&self, msg: &str) {
        *self.error_on_get_pr_details.lock().unwrap() = Some(msg.to_string());
    }

    /// Make the next merge of `pr_number` fail with `msg`. Queued failures
    /// are used in order; once exhausted, merges succeed.
    pub fn queue_merge_failure(&self, pr_number: u64, msg: &str) {
        self.merge_failures
            .lock()
            .unwrap()
            .entry(pr_number)
            .or_default()
            .push_back(msg.to_string());
    }

    /// Answer merges of `pr_number` with `merged: false` and `msg`
    pub fn refuse_merge(&self, pr_number: u64, msg: &str) {
        self.merge_refusals
            .lock()
            .unwrap()
            .insert(pr_number, msg.to_string());
    }

    // === Response setup ===

    /// Set the response for `find_existing_pr` for a specific branch
    pub fn set_find_pr_response(&self, branch: &str, pr: PullRequest) {
        self.find_pr_responses
            .lock()
            .unwrap()
            .insert(branch.to_string(), pr);
    }

    /// Replace the `get_pr_details` sequence for a PR
    pub fn set_details_sequence(&self, pr_number: u64, details: Vec<PullRequestDetails>) {
        self.details_responses
            .lock()
            .unwrap()
            .insert(pr_number, details.into());
    }

    /// Append to the `get_pr_details` sequence for a PR
    pub fn push_details(&self, pr_number: u64, details: PullRequestDetails) {
        self.details_responses
            .lock()
            .unwrap()
            .entry(pr_number)
            .or_default()
            .push_back(details);
    }

    // === Call inspection ===

    pub fn get_find_pr_calls(&self) -> Vec<String> {
        self.find_pr_calls.lock().unwrap().clone()
    }

    pub fn get_pr_details_calls(&self) -> Vec<u64> {
        self.get_pr_details_calls.lock().unwrap().clone()
    }

    pub fn get_update_base_calls(&self) -> Vec<UpdateBaseCall> {
        self.update_base_calls.lock().unwrap().clone()
    }

    pub fn get_merge_pr_calls(&self) -> Vec<MergePrCall> {
        self.merge_pr_calls.lock().unwrap().clone()
    }

    /// PR numbers passed to `merge_pr`, in call order
    pub fn merged_numbers(&self) -> Vec<u64> {
        self.get_merge_pr_calls().iter().map(|c| c.pr_number).collect()
    }

    fn injected(slot: &Mutex<Option<String>>) -> Result<()> {
        match slot.lock().unwrap().as_ref() {
            Some(msg) => Err(Error::Platform(msg.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PlatformService for MockPlatformService {
    async fn find_existing_pr(&self, head_branch: &str) -> Result<Option<PullRequest>> {
        self.find_pr_calls
            .lock()
            .unwrap()
            .push(head_branch.to_string());
        Self::injected(&self.error_on_find_pr)?;
        Ok(self.find_pr_responses.lock().unwrap().get(head_branch).cloned())
    }

    async fn get_pr_details(&self, pr_number: u64) -> Result<PullRequestDetails> {
        self.get_pr_details_calls.lock().unwrap().push(pr_number);
        Self::injected(&self.error_on_get_pr_details)?;

        let mut responses = self.details_responses.lock().unwrap();
        let queue = responses
            .get_mut(&pr_number)
            .ok_or_else(|| Error::Platform(format!("no details for PR #{pr_number}")))?;
        let details = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        details.ok_or_else(|| Error::Platform(format!("no details for PR #{pr_number}")))
    }

    async fn update_pr_base(&self, pr_number: u64, new_base: &str) -> Result<PullRequest> {
        self.update_base_calls.lock().unwrap().push(UpdateBaseCall {
            pr_number,
            new_base: new_base.to_string(),
        });
        Self::injected(&self.error_on_update_base)?;

        let head = format!("pr-{pr_number}");
        Ok(PullRequest {
            number: pr_number,
            html_url: format!("https://github.com/test/repo/pull/{pr_number}"),
            base_ref: new_base.to_string(),
            head_ref: head.clone(),
            title: head,
            is_draft: false,
        })
    }

    async fn merge_pr(
        &self,
        pr_number: u64,
        method: MergeMethod,
        _title: Option<&str>,
    ) -> Result<MergeResult> {
        self.merge_pr_calls
            .lock()
            .unwrap()
            .push(MergePrCall { pr_number, method });

        let failure = self
            .merge_failures
            .lock()
            .unwrap()
            .get_mut(&pr_number)
            .and_then(VecDeque::pop_front);
        if let Some(msg) = failure {
            return Err(Error::GitHubApi(format!("Merge failed: {msg}")));
        }
        if let Some(msg) = self.merge_refusals.lock().unwrap().get(&pr_number) {
            return Ok(MergeResult {
                merged: false,
                sha: None,
                message: Some(msg.clone()),
            });
        }

        Ok(MergeResult {
            merged: true,
            sha: Some(format!("sha{pr_number}")),
            message: Some("Pull Request successfully merged".to_string()),
        })
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
