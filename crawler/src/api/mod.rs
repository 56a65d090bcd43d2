use std::future::Future;

use chrono::NaiveDate;
use octocrab::{models::StarGazer, Octocrab};
use shared::RepoId;
use tracing::{debug, instrument, warn};

use crate::sampler::{StarSource, StarSummary};

mod error;
pub mod retry;
mod types;

pub use error::*;
pub use retry::{Retrier, RetryPolicy, Sleeper, TokioSleeper};
pub use types::*;

const STARGAZERS_PER_PAGE: u8 = 100;

#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Full metadata of a repository; a 404 means it was deleted or renamed.
    async fn repo_details(&self, id: &RepoId) -> Result<RepoDetails, ApiError>;
}

#[derive(Clone)]
pub struct GithubClient {
    octocrab: Octocrab,
    retrier: Retrier,
    readme_max_chars: usize,
}

impl GithubClient {
    pub fn new(
        github_token: Option<String>,
        retrier: Retrier,
        readme_max_chars: usize,
    ) -> anyhow::Result<Self> {
        let builder = octocrab::Octocrab::builder();
        let octocrab = match github_token {
            Some(token) => builder.personal_token(token).build()?,
            None => {
                warn!("No GitHub token configured, using unauthenticated requests");
                builder.build()?
            }
        };

        Ok(Self {
            octocrab,
            retrier,
            readme_max_chars,
        })
    }

    /// Runs `action` under the retry policy, converting octocrab failures and
    /// attaching the quota reset time to rate-limit responses.
    async fn call<T, F, Fut>(&self, label: &str, action: F) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = octocrab::Result<T>>,
    {
        let action = &action;
        let this = self;
        self.retrier
            .execute(label, move || async move {
                match action().await {
                    Ok(value) => Ok(value),
                    Err(e) => Err(this.classify(e).await),
                }
            })
            .await
    }

    async fn classify(&self, error: octocrab::Error) -> ApiError {
        let error = ApiError::from(error);
        if !error.is_rate_limited() {
            return error;
        }

        // octocrab does not surface response headers on errors, the
        // rate-limit endpoint reports the same reset timestamp
        let reset = match self.octocrab.ratelimit().get().await {
            Ok(limits) => Some(limits.resources.core.reset as i64),
            Err(e) => {
                debug!("Failed to query rate limits: {e}");
                None
            }
        };
        error.with_rate_limit_reset(reset)
    }

    #[instrument(skip(self), fields(repo = %id))]
    pub async fn repository(&self, id: &RepoId) -> Result<octocrab::models::Repository, ApiError> {
        let (owner, name) = (id.owner.as_str(), id.name.as_str());
        self.call(&format!("GET /repos/{id}"), move || async move {
            self.octocrab.repos(owner, name).get().await
        })
        .await
    }

    /// Decoded README, empty when the repository has none.
    #[instrument(skip(self), fields(repo = %id))]
    pub async fn readme(&self, id: &RepoId) -> Result<String, ApiError> {
        let (owner, name) = (id.owner.as_str(), id.name.as_str());
        let content = self
            .call(&format!("GET /repos/{id}/readme"), move || async move {
                self.octocrab.repos(owner, name).get_readme().send().await
            })
            .await;

        match content {
            Ok(content) => {
                let readme = content.decoded_content().unwrap_or_default();
                Ok(truncate_chars(&readme, self.readme_max_chars).to_string())
            }
            Err(e) if e.is_not_found() => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), fields(repo = %id))]
    pub async fn stargazers(&self, id: &RepoId) -> Result<Vec<StarGazer>, ApiError> {
        let (owner, name) = (id.owner.as_str(), id.name.as_str());
        let mut result = Vec::new();
        let mut page_number = 1u32;
        loop {
            let mut page = self
                .call(
                    &format!("GET /repos/{id}/stargazers?page={page_number}"),
                    move || async move {
                        self.octocrab
                            .repos(owner, name)
                            .list_stargazers()
                            .per_page(STARGAZERS_PER_PAGE)
                            .page(page_number)
                            .send()
                            .await
                    },
                )
                .await?;

            let items = page.take_items();
            let done = items.is_empty() || page.next.is_none();
            result.extend(items);
            if done {
                break;
            }
            page_number += 1;
        }

        debug!("Fetched {} stargazers over {} pages", result.len(), page_number);
        Ok(result)
    }
}

#[async_trait::async_trait]
impl MetadataProvider for GithubClient {
    async fn repo_details(&self, id: &RepoId) -> Result<RepoDetails, ApiError> {
        let repo = self.repository(id).await?;
        let readme = self.readme(id).await?;
        Ok(RepoDetails::from_repository(id.clone(), repo, readme))
    }
}

#[async_trait::async_trait]
impl StarSource for GithubClient {
    async fn star_summary(&self, id: &RepoId) -> Result<StarSummary, ApiError> {
        let repo = self.repository(id).await?;
        Ok(StarSummary {
            created: repo.created_at.unwrap_or_default().date_naive(),
            total: repo.stargazers_count.unwrap_or_default() as u64,
        })
    }

    async fn star_events(&self, id: &RepoId) -> Result<Vec<NaiveDate>, ApiError> {
        Ok(self
            .stargazers(id)
            .await?
            .into_iter()
            .filter_map(|stargazer| stargazer.starred_at.map(|at| at.date_naive()))
            .collect())
    }
}
