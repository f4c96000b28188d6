//! Shared test utilities

#![allow(dead_code)]

mod mock_backend;
mod mock_platform;

pub use mock_backend::{BackendCall, MockBackend};
pub use mock_platform::{MergePrCall, MockPlatformService, UpdateBaseCall};

use jj_land::merge::{MergeProgress, MergeSnapshot, Phase};
use jj_land::types::{Change, Platform, PlatformConfig, PrState, PullRequest, PullRequestDetails, StackRead};
use std::sync::Mutex;

/// Config for the test repository
pub fn github_config() -> PlatformConfig {
    PlatformConfig {
        platform: Platform::GitHub,
        owner: "test".to_string(),
        repo: "repo".to_string(),
        host: None,
    }
}

/// Create a `PullRequest` for `head`, targeting `base`
pub fn make_pr(number: u64, head: &str, base: &str) -> PullRequest {
    PullRequest {
        number,
        html_url: format!("https://github.com/test/repo/pull/{number}"),
        base_ref: base.to_string(),
        head_ref: head.to_string(),
        title: format!("PR {number}"),
        is_draft: false,
    }
}

/// PR details with the given mergeability
pub fn make_details(number: u64, mergeable: Option<bool>, state: &str) -> PullRequestDetails {
    PullRequestDetails {
        number,
        title: format!("PR {number}"),
        state: PrState::Open,
        is_draft: false,
        mergeable,
        mergeable_state: Some(state.to_string()),
        head_ref: format!("push-{number}"),
        base_ref: "main".to_string(),
        html_url: format!("https://github.com/test/repo/pull/{number}"),
    }
}

/// Change id used for the revision at merge index `i`
pub fn change_id(i: usize) -> String {
    format!("change{i:02}")
}

/// Branch pushed for the revision at merge index `i`
pub fn bookmark(i: usize) -> String {
    format!("push-{}", change_id(i))
}

/// Build a linear stack of `len` revisions on trunk `main`. Returned
/// changes are top first.
pub fn linear_stack(len: usize) -> StackRead {
    let mut changes: Vec<Change> = (0..len)
        .map(|i| Change {
            change_id: change_id(i),
            short_id: format!("c{i}"),
            commit_id: format!("commit{i:02}"),
            immutable: false,
            description: format!("Change number {i}\n\nDetails."),
            bookmark: bookmark(i),
            parents: vec![if i == 0 { "trunk".to_string() } else { change_id(i - 1) }],
        })
        .collect();
    changes.reverse();
    StackRead {
        changes,
        trunk_name: "main".to_string(),
        trunk_change_id: "trunk".to_string(),
    }
}

/// Set up a stack whose revisions have the given PRs (bottom first);
/// 0 leaves a revision without a PR. Every PR is immediately mergeable.
pub fn setup_stack(pr_numbers: &[u64]) -> (MockBackend, MockPlatformService) {
    let backend = MockBackend::new(linear_stack(pr_numbers.len()));
    let platform = MockPlatformService::with_config(github_config());
    for (i, &number) in pr_numbers.iter().enumerate() {
        if number == 0 {
            continue;
        }
        let base = if i == 0 { "main".to_string() } else { bookmark(i - 1) };
        platform.set_find_pr_response(&bookmark(i), make_pr(number, &bookmark(i), &base));
        platform.push_details(number, make_details(number, Some(true), "clean"));
    }
    (backend, platform)
}

/// Progress that records every snapshot and answers confirmation with a
/// fixed value
pub struct RecordingProgress {
    confirm: bool,
    snapshots: Mutex<Vec<MergeSnapshot>>,
}

impl RecordingProgress {
    pub fn new(confirm: bool) -> Self {
        Self {
            confirm,
            snapshots: Mutex::new(Vec::new()),
        }
    }

    pub fn snapshots(&self) -> Vec<MergeSnapshot> {
        self.snapshots.lock().unwrap().clone()
    }

    /// Phases seen, with consecutive duplicates collapsed
    pub fn phases(&self) -> Vec<Phase> {
        let mut phases: Vec<Phase> = self.snapshots().iter().map(|s| s.phase).collect();
        phases.dedup();
        phases
    }
}

#[async_trait::async_trait]
impl MergeProgress for RecordingProgress {
    async fn on_update(&self, snapshot: &MergeSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }

    async fn confirm(&self, _snapshot: &MergeSnapshot) -> bool {
        self.confirm
    }
}
