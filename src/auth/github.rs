//! GitHub token discovery

use super::AuthSource;
use crate::error::{Error, Result};
use tokio::process::Command;
use tracing::debug;

/// Environment variables checked for a token, in order
const TOKEN_ENV_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// Resolved GitHub credentials
#[derive(Debug, Clone)]
pub struct GitHubAuthConfig {
    /// API token
    pub token: String,
    /// Where the token came from
    pub source: AuthSource,
}

/// Read a token from `GITHUB_TOKEN` or `GH_TOKEN`
pub fn token_from_env() -> Option<String> {
    TOKEN_ENV_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|t| t.trim().to_string())
        .find(|t| !t.is_empty())
}

/// Get GitHub credentials
///
/// Environment variables win over `gh auth token`. `host` selects a
/// GitHub Enterprise host for the `gh` lookup.
pub async fn get_github_auth(host: Option<&str>) -> Result<GitHubAuthConfig> {
    if let Some(token) = token_from_env() {
        debug!("using GitHub token from environment");
        return Ok(GitHubAuthConfig {
            token,
            source: AuthSource::EnvVar,
        });
    }

    let mut cmd = Command::new("gh");
    cmd.args(["auth", "token"]);
    if let Some(h) = host {
        cmd.args(["--hostname", h]);
    }

    let output = cmd.output().await.map_err(|e| {
        Error::Auth(format!(
            "no GITHUB_TOKEN set and failed to run `gh auth token`: {e}"
        ))
    })?;

    if !output.status.success() {
        return Err(Error::Auth(
            "no GITHUB_TOKEN set and `gh` is not logged in - run `gh auth login`".to_string(),
        ));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(Error::Auth("`gh auth token` returned an empty token".to_string()));
    }

    debug!("using GitHub token from gh CLI");
    Ok(GitHubAuthConfig {
        token,
        source: AuthSource::Cli,
    })
}
