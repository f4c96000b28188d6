//! GitHub platform service implementation

use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::types::{
    MergeMethod, MergeResult, Platform, PlatformConfig, PrState, PullRequest, PullRequestDetails,
};
use async_trait::async_trait;
use octocrab::Octocrab;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

// REST response types for the endpoints octocrab's models don't expose
// the fields we need from (mergeable_state, merge error messages)

#[derive(Deserialize)]
struct RestPullRequest {
    number: u64,
    title: Option<String>,
    state: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    merged: bool,
    mergeable: Option<bool>,
    mergeable_state: Option<String>,
    head: RestRef,
    base: RestRef,
    html_url: String,
}

#[derive(Deserialize)]
struct RestRef {
    #[serde(rename = "ref")]
    ref_name: String,
}

#[derive(Serialize)]
struct MergeRequestBody<'a> {
    merge_method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit_title: Option<&'a str>,
}

#[derive(Deserialize)]
struct MergeResponse {
    #[serde(default)]
    merged: bool,
    sha: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl From<RestPullRequest> for PullRequestDetails {
    fn from(pr: RestPullRequest) -> Self {
        let state = match pr.state.as_str() {
            "open" => PrState::Open,
            _ if pr.merged => PrState::Merged,
            _ => PrState::Closed,
        };
        Self {
            number: pr.number,
            title: pr.title.unwrap_or_default(),
            state,
            is_draft: pr.draft,
            mergeable: pr.mergeable,
            mergeable_state: pr.mergeable_state,
            head_ref: pr.head.ref_name,
            base_ref: pr.base.ref_name,
            html_url: pr.html_url,
        }
    }
}

/// GitHub service using octocrab, with raw REST calls for merge status
pub struct GitHubService {
    client: Octocrab,
    config: PlatformConfig,
    /// Token for raw HTTP requests
    token: String,
    /// HTTP client for raw requests
    http_client: Client,
    /// API base URL for raw requests (no trailing slash)
    api_base: String,
}

impl GitHubService {
    /// Create a new GitHub service
    ///
    /// `host` is a GitHub Enterprise host; `None` means github.com.
    pub fn new(token: &str, owner: String, repo: String, host: Option<String>) -> Result<Self> {
        let api_base = host.as_ref().map_or_else(
            || "https://api.github.com".to_string(),
            |h| format!("https://{h}/api/v3"),
        );
        let config = PlatformConfig {
            platform: Platform::GitHub,
            owner,
            repo,
            host,
        };
        Self::with_api_base(token, config, &api_base)
    }

    /// Create a service talking to an explicit API base URL
    pub fn with_api_base(token: &str, config: PlatformConfig, api_base: &str) -> Result<Self> {
        let api_base = api_base.trim_end_matches('/').to_string();

        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .base_uri(&api_base)
            .map_err(|e| Error::GitHubApi(e.to_string()))?
            .build()
            .map_err(|e| Error::GitHubApi(e.to_string()))?;

        let http_client = Client::builder()
            .user_agent("jj-land")
            .build()
            .map_err(|e| Error::GitHubApi(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            token: token.to_string(),
            http_client,
            api_base,
        })
    }

    fn pulls_url(&self, pr_number: u64) -> String {
        format!(
            "{}/repos/{}/{}/pulls/{pr_number}",
            self.api_base, self.config.owner, self.config.repo
        )
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }
}

/// Extract GitHub's `message` from an error response, falling back to the
/// status line
async fn error_message(response: Response) -> String {
    let status = response.status();
    match response.json::<ApiErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => format!("HTTP {status}"),
    }
}

/// Helper to convert octocrab PR to our `PullRequest` type
fn pr_from_octocrab(pr: &octocrab::models::pulls::PullRequest) -> PullRequest {
    PullRequest {
        number: pr.number,
        html_url: pr
            .html_url
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        base_ref: pr.base.ref_field.clone(),
        head_ref: pr.head.ref_field.clone(),
        title: pr.title.as_deref().unwrap_or_default().to_string(),
        is_draft: pr.draft.unwrap_or(false),
    }
}

#[async_trait]
impl PlatformService for GitHubService {
    async fn find_existing_pr(&self, head_branch: &str) -> Result<Option<PullRequest>> {
        debug!(head_branch, "finding existing PR");
        let head = format!("{}:{}", &self.config.owner, head_branch);

        let prs = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .list()
            .head(head)
            .state(octocrab::params::State::Open)
            .send()
            .await?;

        let result = prs.items.first().map(pr_from_octocrab);
        if let Some(ref pr) = result {
            debug!(pr_number = pr.number, "found existing PR");
        } else {
            debug!("no existing PR found");
        }
        Ok(result)
    }

    async fn get_pr_details(&self, pr_number: u64) -> Result<PullRequestDetails> {
        debug!(pr_number, "getting PR details");

        let response = self
            .authorized(self.http_client.get(self.pulls_url(pr_number)))
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to fetch PR #{pr_number}: {e}")))?;

        if !response.status().is_success() {
            let message = error_message(response).await;
            return Err(Error::GitHubApi(format!(
                "Failed to fetch PR #{pr_number}: {message}"
            )));
        }

        let pr: RestPullRequest = response
            .json()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to parse PR #{pr_number}: {e}")))?;

        let details = PullRequestDetails::from(pr);
        debug!(
            pr_number,
            mergeable = ?details.mergeable,
            mergeable_state = ?details.mergeable_state,
            "got PR details"
        );
        Ok(details)
    }

    async fn update_pr_base(&self, pr_number: u64, new_base: &str) -> Result<PullRequest> {
        debug!(pr_number, new_base, "updating PR base");
        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .update(pr_number)
            .base(new_base)
            .send()
            .await?;

        debug!(pr_number, "updated PR base");
        Ok(pr_from_octocrab(&pr))
    }

    async fn merge_pr(
        &self,
        pr_number: u64,
        method: MergeMethod,
        title: Option<&str>,
    ) -> Result<MergeResult> {
        debug!(pr_number, %method, "merging PR");

        let body = MergeRequestBody {
            merge_method: method.as_api_str(),
            commit_title: title,
        };
        let url = format!("{}/merge", self.pulls_url(pr_number));

        let response = self
            .authorized(self.http_client.put(url))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Merge failed: {e}")))?;

        if !response.status().is_success() {
            // 405/409 carry the reason, e.g. "Head branch was modified"
            let message = error_message(response).await;
            return Err(Error::GitHubApi(format!("Merge failed: {message}")));
        }

        let result: MergeResponse = response
            .json()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to parse merge response: {e}")))?;

        let merge_result = MergeResult {
            merged: result.merged,
            sha: result.sha,
            message: result.message,
        };

        debug!(
            pr_number,
            merged = merge_result.merged,
            sha = ?merge_result.sha,
            "merge complete"
        );
        Ok(merge_result)
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
