//! Platform detection from git remote URLs

use crate::error::{Error, Result};
use crate::types::{Platform, PlatformConfig};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// scp-like remote syntax: `git@host:owner/repo.git`
static SCP_REMOTE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[\w.-]+@([\w.-]+):(.+)$").ok());

/// Environment variable naming a GitHub Enterprise host
const GH_HOST_ENV: &str = "GH_HOST";

/// Detect which platform a remote URL points at
///
/// Returns `None` for hosts that are not GitHub or the configured
/// GitHub Enterprise host (`GH_HOST`).
pub fn detect_platform(url: &str) -> Option<Platform> {
    let (host, _) = split_remote(url)?;
    is_github_host(&host).then_some(Platform::GitHub)
}

/// Parse owner, repo and host from a remote URL
pub fn parse_repo_info(url: &str) -> Result<PlatformConfig> {
    let (host, path) = split_remote(url).ok_or(Error::NoSupportedRemotes)?;
    if !is_github_host(&host) {
        return Err(Error::NoSupportedRemotes);
    }

    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let (owner, repo) = path.rsplit_once('/').ok_or(Error::NoSupportedRemotes)?;
    if owner.is_empty() || repo.is_empty() {
        return Err(Error::NoSupportedRemotes);
    }

    Ok(PlatformConfig {
        platform: Platform::GitHub,
        owner: owner.to_string(),
        repo: repo.to_string(),
        host: (host != "github.com").then_some(host),
    })
}

fn is_github_host(host: &str) -> bool {
    host == "github.com"
        || std::env::var(GH_HOST_ENV).is_ok_and(|h| !h.is_empty() && h == host)
}

/// Split a remote URL into `(host, path)`
fn split_remote(url: &str) -> Option<(String, String)> {
    let url = url.trim();

    if let Some(caps) = SCP_REMOTE.as_ref().and_then(|re| re.captures(url))
        && !url.contains("://")
    {
        return Some((caps[1].to_string(), caps[2].to_string()));
    }

    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_string();
    Some((host, parsed.path().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_github_ssh_scp_syntax() {
        let config = parse_repo_info("git@github.com:owner/repo.git").unwrap();
        assert_eq!(config.owner, "owner");
        assert_eq!(config.repo, "repo");
        assert!(config.host.is_none());
    }

    #[test]
    fn test_github_ssh_url_syntax() {
        let config = parse_repo_info("ssh://git@github.com/owner/repo.git").unwrap();
        assert_eq!(config.owner, "owner");
        assert_eq!(config.repo, "repo");
    }

    #[test]
    fn test_split_remote_scp() {
        let (host, path) = split_remote("git@example.com:a/b.git").unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(path, "a/b.git");
    }
}
