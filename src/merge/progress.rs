//! Progress reporting hooks for the merge runner

use crate::merge::view::MergeSnapshot;
use async_trait::async_trait;

/// Receives run updates and answers the confirmation prompt
#[async_trait]
pub trait MergeProgress: Send + Sync {
    /// Called after every state transition
    async fn on_update(&self, snapshot: &MergeSnapshot);

    /// Ask whether to proceed with merging the loaded stack
    async fn confirm(&self, snapshot: &MergeSnapshot) -> bool;
}

/// Silent progress that confirms automatically
pub struct NoopProgress;

#[async_trait]
impl MergeProgress for NoopProgress {
    async fn on_update(&self, _snapshot: &MergeSnapshot) {}

    async fn confirm(&self, _snapshot: &MergeSnapshot) -> bool {
        true
    }
}
