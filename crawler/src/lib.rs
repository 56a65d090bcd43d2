use std::sync::Arc;

pub mod api;
pub mod config;
pub mod crawler;
pub mod sampler;
pub mod storage;
pub mod tagger;
pub mod trending;


pub use crate::crawler::{Context, Crawler, EntityError, RunReport, Settings};

use api::{GithubClient, Retrier, Sleeper, TokioSleeper};
use config::Env;
use sampler::HistorySampler;
use storage::{BlobStore, ObjectBlobStore, Storage};
use tagger::GeminiTagger;
use trending::TrendingScraper;

impl Crawler {
    /// Wires the production collaborators described by `env`.
    pub fn from_env(env: &Env) -> anyhow::Result<Self> {
        let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);
        let retrier = Retrier::new(env.retry_policy(), sleeper.clone());
        let github = Arc::new(GithubClient::new(
            env.github_token(),
            retrier,
            env.readme_max_chars,
        )?);

        let blobs: Arc<dyn BlobStore> = match &env.local_data_dir {
            Some(dir) => {
                tracing::info!("Using local data directory {}", dir.display());
                Arc::new(ObjectBlobStore::local(dir)?)
            }
            None => Arc::new(ObjectBlobStore::s3(&env.s3())?),
        };

        let context = Context {
            trending: Arc::new(TrendingScraper::new()?),
            metadata: github.clone(),
            tagger: Arc::new(GeminiTagger::new(
                env.gemini_api_key.clone(),
                env.gemini_model.clone(),
            )?),
            sampler: Arc::new(HistorySampler::new(github, env.full_history_threshold)),
            storage: Storage::new(blobs),
            sleeper,
        };

        Ok(Crawler::new(
            context,
            Settings {
                period: env.trending_period,
                throttle: env.throttle(),
                authoritative_star_counts: env.authoritative_star_counts,
            },
        ))
    }
}
