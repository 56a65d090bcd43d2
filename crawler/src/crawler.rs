use std::{fmt, sync::Arc, time::Duration};

use chrono::{NaiveDate, Utc};
use shared::{DailyEntry, GlobalIndex, IndexEntry, RepoId, RepoRecord, TrendingPeriod};
use tracing::{error, info, instrument, warn};

use crate::{
    api::{ApiError, MetadataProvider, Sleeper},
    sampler::HistorySampler,
    storage::{Storage, StorageError},
    tagger::Tagger,
    trending::{TrendingEntry, TrendingSource},
};

/// Why a single repository could not be processed.
#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    #[error("repository no longer exists")]
    Gone,
    #[error("remote call failed: {0}")]
    Remote(ApiError),
    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),
}

impl From<ApiError> for EntityError {
    fn from(error: ApiError) -> Self {
        if error.is_not_found() {
            Self::Gone
        } else {
            Self::Remote(error)
        }
    }
}

#[derive(Clone)]
pub struct Context {
    pub trending: Arc<dyn TrendingSource>,
    pub metadata: Arc<dyn MetadataProvider>,
    pub tagger: Arc<dyn Tagger>,
    pub sampler: Arc<HistorySampler>,
    pub storage: Storage,
    pub sleeper: Arc<dyn Sleeper>,
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub period: TrendingPeriod,
    /// Pause after each persisted repository.
    pub throttle: Duration,
    /// Take today's count for known repositories from the API rather than the
    /// trending page.
    pub authoritative_star_counts: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub date: Option<NaiveDate>,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub snapshot_written: bool,
    pub index_written: bool,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.created + self.updated
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(date) = self.date {
            write!(f, "Trending crawl {date}: ")?;
        }
        write!(
            f,
            "{} processed ({} new, {} updated), {} skipped",
            self.processed(),
            self.created,
            self.updated,
            self.skipped
        )?;
        if !self.snapshot_written {
            write!(f, ", daily snapshot not written")?;
        }
        if !self.index_written {
            write!(f, ", index not written")?;
        }
        Ok(())
    }
}

enum Outcome {
    Created(RepoRecord),
    Updated(RepoRecord),
}

pub struct Crawler {
    context: Context,
    settings: Settings,
}

impl Crawler {
    pub fn new(context: Context, settings: Settings) -> Self {
        Self { context, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// One full pass over the trending list; `today` is fixed for the run.
    #[instrument(skip(self))]
    pub async fn run(&self, today: NaiveDate) -> RunReport {
        let mut report = RunReport {
            date: Some(today),
            ..Default::default()
        };

        let entries = self.context.trending.trending(self.settings.period).await;
        if entries.is_empty() {
            warn!("No trending repositories found");
        } else {
            info!("Processing {} trending repositories", entries.len());
        }

        let mut daily = Vec::with_capacity(entries.len());
        for entry in &entries {
            let outcome = match self.process_entry(entry, today).await {
                Ok(outcome) => outcome,
                Err(EntityError::Gone) => {
                    warn!("Skipping {}: repository no longer exists", entry.id);
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    error!("Skipping {}: {e}", entry.id);
                    report.skipped += 1;
                    continue;
                }
            };

            let record = match outcome {
                Outcome::Created(record) => {
                    report.created += 1;
                    record
                }
                Outcome::Updated(record) => {
                    report.updated += 1;
                    record
                }
            };

            if let Err(e) = self.context.storage.save_project(&record).await {
                error!("Failed to save {}: {e}", entry.id);
            }
            daily.push(record.daily_entry(entry.growth));

            if !self.settings.throttle.is_zero() {
                self.context.sleeper.sleep(self.settings.throttle).await;
            }
        }

        match self.context.storage.save_daily(today, &daily).await {
            Ok(()) => report.snapshot_written = true,
            Err(e) => error!("Failed to save daily snapshot: {e}"),
        }
        report.index_written = self.update_index(&daily, today).await;

        info!("{report}");
        report
    }

    #[instrument(skip(self, entry), fields(repo = %entry.id))]
    async fn process_entry(
        &self,
        entry: &TrendingEntry,
        today: NaiveDate,
    ) -> Result<Outcome, EntityError> {
        match self.context.storage.project(&entry.id).await? {
            Some(record) => {
                let record = self.update_existing(record, entry, today).await?;
                Ok(Outcome::Updated(record))
            }
            None => Ok(Outcome::Created(self.track_new(&entry.id, today).await?)),
        }
    }

    async fn update_existing(
        &self,
        mut record: RepoRecord,
        entry: &TrendingEntry,
        today: NaiveDate,
    ) -> Result<RepoRecord, EntityError> {
        let mut stars = entry.stars;
        if self.settings.authoritative_star_counts {
            let history = std::mem::take(&mut record.star_history);
            record.star_history = self
                .context
                .sampler
                .extend(&entry.id, history, today)
                .await?;
            if let Some(last) = record.star_history.last() {
                stars = last.count;
            }
        }

        let appended = record.refresh(stars, entry.forks, today, Utc::now());
        info!(
            "Updated {} ({} stars{})",
            entry.id,
            record.stargazers_count,
            if appended { ", new history point" } else { "" }
        );
        Ok(record)
    }

    async fn track_new(&self, id: &RepoId, today: NaiveDate) -> Result<RepoRecord, EntityError> {
        info!("New repository {id}, fetching details");
        let details = self.context.metadata.repo_details(id).await?;
        let tags = self.context.tagger.tags(&details).await;
        let history = self.context.sampler.fresh(id, today).await;
        info!(
            "Tracking {id} with {} tags and {} history points",
            tags.len(),
            history.len()
        );
        Ok(details.into_record(tags, history))
    }

    /// Loads the index, upserts today's repositories and writes it back.
    /// Returns whether the index was written.
    async fn update_index(&self, daily: &[DailyEntry], today: NaiveDate) -> bool {
        let mut index = match self.context.storage.index().await {
            Ok(Some(index)) => index,
            Ok(None) => self.seed_index().await,
            Err(e) => {
                error!("Failed to read index, leaving it untouched: {e}");
                return false;
            }
        };

        for entry in daily {
            index.upsert(IndexEntry::from_daily(entry, today));
        }

        match self.context.storage.save_index(&index).await {
            Ok(()) => {
                info!("Index holds {} repositories", index.len());
                true
            }
            Err(e) => {
                error!("Failed to save index: {e}");
                false
            }
        }
    }

    /// Rebuilds a missing index from the stored project records.
    async fn seed_index(&self) -> GlobalIndex {
        let mut index = GlobalIndex::default();
        let ids = match self.context.storage.project_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Failed to list stored projects, starting an empty index: {e}");
                return index;
            }
        };

        for id in ids {
            match self.context.storage.project(&id).await {
                Ok(Some(record)) => index.upsert(IndexEntry::from_record(&record)),
                Ok(None) => {}
                Err(e) => warn!("Failed to read {id} while seeding index: {e}"),
            }
        }
        info!("Seeded index with {} stored repositories", index.len());
        index
    }
}
