//! Version-control backend
//!
//! The merge engine only needs four operations from the VCS: fetch, read the
//! stack, rebase, and push. [`VcsBackend`] abstracts them so the engine can
//! be driven by the real `jj` binary ([`JjCli`]) or by a test double.

mod jj;

pub use jj::JjCli;

use crate::error::{Error, Result};
use crate::platform::detect_platform;
use crate::types::{GitRemote, RebaseOutcome, StackRead};
use async_trait::async_trait;

/// Operations the merge engine needs from the version-control system
#[async_trait]
pub trait VcsBackend: Send + Sync {
    /// Refresh remote-tracking state
    async fn fetch_remote(&self) -> Result<()>;

    /// Read the mutable changes between trunk and `selector`, newest first
    async fn read_stack(&self, selector: &str) -> Result<StackRead>;

    /// Rebase `change_id` and its descendants onto `onto`
    async fn rebase(&self, change_id: &str, onto: &str) -> Result<RebaseOutcome>;

    /// Push the branch of `change_id` to the remote
    async fn push_branch(&self, change_id: &str) -> Result<()>;

    /// List configured git remotes
    async fn remotes(&self) -> Result<Vec<GitRemote>>;
}

/// Select a remote to use
///
/// If `specified` is given it must exist. Otherwise only remotes on a
/// supported platform are considered: "origin" is preferred, falling back to
/// the first of them.
pub fn select_remote(remotes: &[GitRemote], specified: Option<&str>) -> Result<String> {
    if let Some(name) = specified {
        return remotes
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.name.clone())
            .ok_or_else(|| Error::RemoteNotFound(name.to_string()));
    }

    let supported: Vec<&GitRemote> = remotes
        .iter()
        .filter(|r| detect_platform(&r.url).is_some())
        .collect();

    supported
        .iter()
        .find(|r| r.name == "origin")
        .or_else(|| supported.first())
        .map(|r| r.name.clone())
        .ok_or(Error::NoSupportedRemotes)
}
