use std::sync::Arc;

use chrono::NaiveDate;
use shared::{RepoId, StarHistory};
use tracing::{debug, info, instrument, warn};

use crate::api::ApiError;

/// Repositories below this many stars get a full per-day history.
pub const FULL_HISTORY_THRESHOLD: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarSummary {
    pub created: NaiveDate,
    pub total: u64,
}

#[async_trait::async_trait]
pub trait StarSource: Send + Sync {
    async fn star_summary(&self, id: &RepoId) -> Result<StarSummary, ApiError>;

    /// Day of every individual star, in any order.
    async fn star_events(&self, id: &RepoId) -> Result<Vec<NaiveDate>, ApiError>;
}

/// Which strategy built a fresh history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum FreshPath {
    Full,
    Placeholder,
    Fallback,
}

pub struct HistorySampler {
    source: Arc<dyn StarSource>,
    threshold: u64,
}

impl HistorySampler {
    pub fn new(source: Arc<dyn StarSource>, threshold: u64) -> Self {
        Self { source, threshold }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Builds a history from scratch. Never fails: any upstream error yields
    /// the single-point fallback `[{today, 0}]`.
    pub async fn fresh(&self, id: &RepoId, today: NaiveDate) -> StarHistory {
        self.fresh_path(id, today).await.0
    }

    #[instrument(skip(self), fields(repo = %id))]
    pub async fn fresh_path(&self, id: &RepoId, today: NaiveDate) -> (StarHistory, FreshPath) {
        match self.try_fresh(id, today).await {
            Ok(result) => {
                debug!("Built {} history with {} points", result.1, result.0.len());
                result
            }
            Err(e) => {
                warn!("Failed to build star history for {id}, using fallback: {e}");
                (StarHistory::fallback(today), FreshPath::Fallback)
            }
        }
    }

    async fn try_fresh(
        &self,
        id: &RepoId,
        today: NaiveDate,
    ) -> Result<(StarHistory, FreshPath), ApiError> {
        let summary = self.source.star_summary(id).await?;
        if summary.total < self.threshold {
            let events = self.source.star_events(id).await?;
            Ok((
                StarHistory::from_star_events(summary.created, events),
                FreshPath::Full,
            ))
        } else {
            Ok((
                StarHistory::placeholder(summary.created, today, summary.total),
                FreshPath::Placeholder,
            ))
        }
    }

    /// Appends today's star count from the API to an existing history.
    ///
    /// A history already current for `today` is returned unchanged without a
    /// remote call; an empty one is rebuilt from scratch.
    #[instrument(skip(self, history), fields(repo = %id))]
    pub async fn extend(
        &self,
        id: &RepoId,
        mut history: StarHistory,
        today: NaiveDate,
    ) -> Result<StarHistory, ApiError> {
        if history.is_empty() {
            info!("Empty star history for {id}, rebuilding");
            return Ok(self.fresh(id, today).await);
        }
        if history.is_current(today) {
            return Ok(history);
        }

        let summary = self.source.star_summary(id).await?;
        history.record(today, summary.total);
        Ok(history)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use shared::StarPoint;

    use super::*;

    pub(crate) fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    /// Scripted star source that counts remote calls.
    #[derive(Default)]
    pub(crate) struct FakeStars {
        pub summary: Option<StarSummary>,
        pub events: Vec<NaiveDate>,
        pub fail_events: bool,
        pub summary_calls: Mutex<u32>,
        pub event_calls: Mutex<u32>,
    }

    impl FakeStars {
        pub fn new(created: &str, total: u64, events: &[&str]) -> Self {
            Self {
                summary: Some(StarSummary {
                    created: day(created),
                    total,
                }),
                events: events.iter().map(|e| day(e)).collect(),
                ..Default::default()
            }
        }

        pub fn event_calls(&self) -> u32 {
            *self.event_calls.lock().unwrap()
        }

        pub fn summary_calls(&self) -> u32 {
            *self.summary_calls.lock().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl StarSource for FakeStars {
        async fn star_summary(&self, _id: &RepoId) -> Result<StarSummary, ApiError> {
            *self.summary_calls.lock().unwrap() += 1;
            self.summary
                .ok_or_else(|| ApiError::status(404, "Not Found"))
        }

        async fn star_events(&self, _id: &RepoId) -> Result<Vec<NaiveDate>, ApiError> {
            *self.event_calls.lock().unwrap() += 1;
            if self.fail_events {
                return Err(ApiError::status(502, "Bad Gateway"));
            }
            Ok(self.events.clone())
        }
    }

    fn sampler(source: Arc<FakeStars>) -> HistorySampler {
        HistorySampler::new(source, FULL_HISTORY_THRESHOLD)
    }

    fn widget() -> RepoId {
        RepoId::new("acme", "widget")
    }

    #[tokio::test]
    async fn small_repo_enumerates_every_star() {
        let source = Arc::new(FakeStars::new(
            "2023-12-01",
            1999,
            &["2024-01-01", "2024-01-02", "2024-01-02"],
        ));
        let (history, path) = sampler(source.clone())
            .fresh_path(&widget(), day("2024-03-02"))
            .await;

        assert_eq!(path, FreshPath::Full);
        assert_eq!(source.event_calls(), 1);
        assert_eq!(
            history.points(),
            &[
                StarPoint::new(day("2023-12-01"), 0),
                StarPoint::new(day("2024-01-01"), 1),
                StarPoint::new(day("2024-01-02"), 3),
            ]
        );
    }

    #[tokio::test]
    async fn threshold_switches_to_placeholder() {
        let source = Arc::new(FakeStars::new("2020-05-01", 2000, &["2024-01-01"]));
        let (history, path) = sampler(source.clone())
            .fresh_path(&widget(), day("2024-03-02"))
            .await;

        assert_eq!(path, FreshPath::Placeholder);
        assert_eq!(source.event_calls(), 0);
        assert_eq!(
            history.points(),
            &[
                StarPoint::new(day("2020-05-01"), 0),
                StarPoint::new(day("2024-03-02"), 2000),
            ]
        );
    }

    #[tokio::test]
    async fn upstream_failure_falls_back() {
        let source = Arc::new(FakeStars {
            fail_events: true,
            ..FakeStars::new("2024-01-01", 10, &[])
        });
        let (history, path) = sampler(source)
            .fresh_path(&widget(), day("2024-03-02"))
            .await;

        assert_eq!(path, FreshPath::Fallback);
        assert_eq!(history.points(), &[StarPoint::new(day("2024-03-02"), 0)]);

        let missing = Arc::new(FakeStars::default());
        let history = sampler(missing).fresh(&widget(), day("2024-03-02")).await;
        assert_eq!(history, StarHistory::fallback(day("2024-03-02")));
    }

    #[tokio::test]
    async fn extend_is_idempotent_within_a_day() {
        let source = Arc::new(FakeStars::new("2024-01-01", 120, &[]));
        let sampler = sampler(source.clone());
        let history = StarHistory::from_points(vec![StarPoint::new(day("2024-03-01"), 100)]);

        let once = sampler
            .extend(&widget(), history, day("2024-03-02"))
            .await
            .unwrap();
        assert_eq!(once.last(), Some(&StarPoint::new(day("2024-03-02"), 120)));
        assert_eq!(source.summary_calls(), 1);

        let twice = sampler
            .extend(&widget(), once.clone(), day("2024-03-02"))
            .await
            .unwrap();
        assert_eq!(twice, once);
        assert_eq!(source.summary_calls(), 1);
    }

    #[tokio::test]
    async fn extend_rebuilds_empty_history() {
        let source = Arc::new(FakeStars::new("2024-03-01", 1, &["2024-03-01"]));
        let history = sampler(source)
            .extend(&widget(), StarHistory::default(), day("2024-03-02"))
            .await
            .unwrap();

        assert_eq!(history.points(), &[StarPoint::new(day("2024-03-01"), 1)]);
    }
}
