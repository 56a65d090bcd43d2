use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
use shared::TrendingPeriod;

use crate::{api::RetryPolicy, sampler::FULL_HISTORY_THRESHOLD, storage::S3Settings};

fn default_bucket() -> String {
    "ai-trending-data".to_string()
}

fn default_region() -> String {
    "auto".to_string()
}

fn default_threshold() -> u64 {
    FULL_HISTORY_THRESHOLD
}

fn default_readme_max_chars() -> usize {
    10_000
}

fn default_throttle_millis() -> u64 {
    1000
}

fn default_max_retry_attempts() -> u32 {
    RetryPolicy::default().max_attempts
}

#[derive(Debug, Clone, Deserialize)]
pub struct Env {
    pub github_token: Option<String>,
    pub my_github_token: Option<String>,

    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,

    pub s3_endpoint_url: Option<String>,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    #[serde(default = "default_bucket")]
    pub s3_bucket_name: String,
    #[serde(default = "default_region")]
    pub s3_region_name: String,
    pub local_data_dir: Option<PathBuf>,

    #[serde(default)]
    pub trending_period: TrendingPeriod,
    #[serde(default = "default_threshold")]
    pub full_history_threshold: u64,
    #[serde(default = "default_readme_max_chars")]
    pub readme_max_chars: usize,
    #[serde(default = "default_throttle_millis")]
    pub throttle_millis: u64,
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    /// Refresh histories of known repositories from the API instead of the
    /// scraped counter.
    #[serde(default)]
    pub authoritative_star_counts: bool,
    pub run_interval_in_minutes: Option<u64>,

    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl Env {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(envy::from_env::<Env>()?)
    }

    pub fn github_token(&self) -> Option<String> {
        self.github_token
            .clone()
            .or_else(|| self.my_github_token.clone())
            .filter(|token| !token.is_empty())
    }

    pub fn telegram(&self) -> Option<(String, String)> {
        match (&self.telegram_token, &self.telegram_chat_id) {
            (Some(token), Some(chat_id)) if !token.is_empty() && !chat_id.is_empty() => {
                Some((token.clone(), chat_id.clone()))
            }
            _ => None,
        }
    }

    pub fn s3(&self) -> S3Settings {
        S3Settings {
            endpoint: self.s3_endpoint_url.clone(),
            access_key_id: self.s3_access_key_id.clone(),
            secret_access_key: self.s3_secret_access_key.clone(),
            bucket: self.s3_bucket_name.clone(),
            region: self.s3_region_name.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retry_attempts.max(1),
            ..Default::default()
        }
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_millis)
    }

    pub fn run_interval(&self) -> Option<Duration> {
        self.run_interval_in_minutes
            .filter(|minutes| *minutes > 0)
            .map(|minutes| Duration::from_secs(minutes * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(vars: &[(&str, &str)]) -> Env {
        envy::from_iter(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
        .unwrap()
    }

    #[test]
    fn defaults() {
        let env = load(&[]);
        assert_eq!(env.s3_bucket_name, "ai-trending-data");
        assert_eq!(env.s3_region_name, "auto");
        assert_eq!(env.trending_period, TrendingPeriod::Daily);
        assert_eq!(env.full_history_threshold, 2000);
        assert_eq!(env.throttle(), Duration::from_secs(1));
        assert_eq!(env.retry_policy().max_attempts, 5);
        assert_eq!(env.run_interval(), None);
        assert_eq!(env.github_token(), None);
        assert_eq!(env.telegram(), None);
        assert!(!env.authoritative_star_counts);
    }

    #[test]
    fn token_falls_back_to_alias() {
        let env = load(&[("MY_GITHUB_TOKEN", "ghp_alias")]);
        assert_eq!(env.github_token().as_deref(), Some("ghp_alias"));

        let env = load(&[("GITHUB_TOKEN", "ghp_main"), ("MY_GITHUB_TOKEN", "ghp_alias")]);
        assert_eq!(env.github_token().as_deref(), Some("ghp_main"));
    }

    #[test]
    fn overrides() {
        let env = load(&[
            ("TRENDING_PERIOD", "weekly"),
            ("RUN_INTERVAL_IN_MINUTES", "60"),
            ("MAX_RETRY_ATTEMPTS", "3"),
            ("TELEGRAM_TOKEN", "token"),
            ("TELEGRAM_CHAT_ID", "-100"),
            ("LOCAL_DATA_DIR", "/tmp/trending"),
        ]);
        assert_eq!(env.trending_period, TrendingPeriod::Weekly);
        assert_eq!(env.run_interval(), Some(Duration::from_secs(3600)));
        assert_eq!(env.retry_policy().max_attempts, 3);
        assert_eq!(env.telegram(), Some(("token".to_string(), "-100".to_string())));
        assert_eq!(env.local_data_dir, Some(PathBuf::from("/tmp/trending")));
    }
}
