//! Mock VCS backend for testing

use async_trait::async_trait;
use jj_land::error::{Error, Result};
use jj_land::repo::VcsBackend;
use jj_land::types::{GitRemote, RebaseOutcome, StackRead};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// A recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Fetch,
    ReadStack(String),
    Rebase { change_id: String, onto: String },
    Push(String),
}

/// In-memory backend returning a fixed stack
///
/// Features:
/// - Call tracking for verification
/// - Configurable rebase outcome
/// - Error injection for fetch, rebase and push (all or per change)
/// - Cancelling a token once a push completes
pub struct MockBackend {
    stack: Mutex<StackRead>,
    remotes: Vec<GitRemote>,
    rebase_outcome: Mutex<RebaseOutcome>,
    calls: Mutex<Vec<BackendCall>>,
    error_on_fetch: Mutex<Option<String>>,
    error_on_rebase: Mutex<Option<String>>,
    error_on_push: Mutex<Option<String>>,
    push_errors: Mutex<HashMap<String, String>>,
    cancel_on_push: Mutex<Option<CancellationToken>>,
}

impl MockBackend {
    pub fn new(stack: StackRead) -> Self {
        Self {
            stack: Mutex::new(stack),
            remotes: vec![GitRemote {
                name: "origin".to_string(),
                url: "git@github.com:test/repo.git".to_string(),
            }],
            rebase_outcome: Mutex::new(RebaseOutcome::Clean),
            calls: Mutex::new(Vec::new()),
            error_on_fetch: Mutex::new(None),
            error_on_rebase: Mutex::new(None),
            error_on_push: Mutex::new(None),
            push_errors: Mutex::new(HashMap::new()),
            cancel_on_push: Mutex::new(None),
        }
    }

    // === Error injection methods ===

    pub fn fail_fetch(&self, msg: &str) {
        *self.error_on_fetch.lock().unwrap() = Some(msg.to_string());
    }

    pub fn fail_rebase(&self, msg: &str) {
        *self.error_on_rebase.lock().unwrap() = Some(msg.to_string());
    }

    pub fn fail_push(&self, msg: &str) {
        *self.error_on_push.lock().unwrap() = Some(msg.to_string());
    }

    /// Fail only the push of `change_id`
    pub fn fail_push_for(&self, change_id: &str, msg: &str) {
        self.push_errors
            .lock()
            .unwrap()
            .insert(change_id.to_string(), msg.to_string());
    }

    /// Cancel `token` after the first push succeeds
    pub fn cancel_after_push(&self, token: CancellationToken) {
        *self.cancel_on_push.lock().unwrap() = Some(token);
    }

    pub fn set_rebase_outcome(&self, outcome: RebaseOutcome) {
        *self.rebase_outcome.lock().unwrap() = outcome;
    }

    // === Call inspection ===

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn rebase_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::Rebase { change_id, .. } => Some(change_id),
                _ => None,
            })
            .collect()
    }

    pub fn push_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::Push(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn injected(slot: &Mutex<Option<String>>) -> Result<()> {
        match slot.lock().unwrap().as_ref() {
            Some(msg) => Err(Error::Jj(msg.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl VcsBackend for MockBackend {
    async fn fetch_remote(&self) -> Result<()> {
        self.record(BackendCall::Fetch);
        Self::injected(&self.error_on_fetch)
    }

    async fn read_stack(&self, selector: &str) -> Result<StackRead> {
        self.record(BackendCall::ReadStack(selector.to_string()));
        Ok(self.stack.lock().unwrap().clone())
    }

    async fn rebase(&self, change_id: &str, onto: &str) -> Result<RebaseOutcome> {
        self.record(BackendCall::Rebase {
            change_id: change_id.to_string(),
            onto: onto.to_string(),
        });
        Self::injected(&self.error_on_rebase)?;
        Ok(*self.rebase_outcome.lock().unwrap())
    }

    async fn push_branch(&self, change_id: &str) -> Result<()> {
        self.record(BackendCall::Push(change_id.to_string()));
        Self::injected(&self.error_on_push)?;
        if let Some(msg) = self.push_errors.lock().unwrap().get(change_id) {
            return Err(Error::Jj(msg.clone()));
        }
        if let Some(token) = self.cancel_on_push.lock().unwrap().take() {
            token.cancel();
        }
        Ok(())
    }

    async fn remotes(&self) -> Result<Vec<GitRemote>> {
        Ok(self.remotes.clone())
    }
}
