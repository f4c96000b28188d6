//! Shared command context
//!
//! Extracts the setup every run needs before the merge engine starts.

use jj_land::auth::get_github_auth;
use jj_land::config::{LandConfig, load_config, user_config_path};
use jj_land::error::{Error, Result};
use jj_land::platform::{GitHubService, parse_repo_info};
use jj_land::repo::{JjCli, VcsBackend, select_remote};
use jj_land::types::PlatformConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Shared context for a merge run
///
/// This struct encapsulates the common setup:
/// - Finding the jj workspace
/// - Loading the layered config
/// - Selecting and validating the remote
/// - Detecting the repository and creating the GitHub service
pub struct CommandContext {
    /// Root path of the workspace
    pub workspace_root: PathBuf,
    /// Effective config (CLI flags not yet applied)
    pub config: LandConfig,
    /// jj backend bound to the selected remote
    pub backend: Arc<JjCli>,
    /// GitHub service for the remote's repository
    pub platform: Arc<GitHubService>,
    /// Repository the remote points at
    pub platform_config: PlatformConfig,
    /// Selected remote name
    pub remote_name: String,
}

impl CommandContext {
    /// Create a new command context
    ///
    /// `remote` overrides the configured remote.
    pub async fn new(path: &Path, remote: Option<&str>) -> Result<Self> {
        let workspace_root = JjCli::discover(path).await?;
        let config = load_config(&workspace_root, user_config_path().as_deref())?;

        // Get remotes and select one
        let backend = JjCli::new(&workspace_root, "");
        let remotes = backend.remotes().await?;
        let requested = remote.or(config.remote.as_deref());
        let remote_name = select_remote(&remotes, requested)?;

        // Detect repository from remote URL
        let remote_info = remotes
            .iter()
            .find(|r| r.name == remote_name)
            .ok_or_else(|| Error::RemoteNotFound(remote_name.clone()))?;
        let platform_config = parse_repo_info(&remote_info.url)?;
        debug!(
            remote = %remote_name,
            owner = %platform_config.owner,
            repo = %platform_config.repo,
            "detected repository"
        );

        let auth = get_github_auth(platform_config.host.as_deref()).await?;
        let platform = GitHubService::new(
            &auth.token,
            platform_config.owner.clone(),
            platform_config.repo.clone(),
            platform_config.host.clone(),
        )?;

        Ok(Self {
            workspace_root,
            config,
            backend: Arc::new(backend.with_remote(&remote_name)),
            platform: Arc::new(platform),
            platform_config,
            remote_name,
        })
    }
}
