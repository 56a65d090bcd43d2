use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{timestamp, FullName, RepoId, StarHistory};

/// Persisted state of a tracked repository, one document per repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoRecord {
    pub owner: String,
    #[serde(rename = "repo")]
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    pub description: Option<String>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub pushed_at: Option<DateTime<Utc>>,
    pub stargazers_count: u64,
    pub forks_count: u64,
    pub language: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub readme: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub star_history: StarHistory,
}

impl RepoRecord {
    pub fn id(&self) -> RepoId {
        RepoId::new(self.owner.clone(), self.name.clone())
    }

    /// Applies the metrics seen on today's trending page.
    ///
    /// Returns whether a history point was appended.
    pub fn refresh(
        &mut self,
        stars: u64,
        forks: u64,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> bool {
        let appended = self.star_history.record(today, stars);
        self.stargazers_count = stars;
        self.forks_count = forks;
        self.updated_at = now;
        appended
    }

    pub fn daily_entry(&self, growth: u64) -> DailyEntry {
        DailyEntry {
            owner: self.owner.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            language: self.language.clone(),
            stars: self.stargazers_count,
            forks: self.forks_count,
            growth,
            tags: self.tags.clone(),
        }
    }
}

/// Lightweight line of a daily snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyEntry {
    pub owner: String,
    #[serde(rename = "repo")]
    pub name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub stars: u64,
    pub forks: u64,
    pub growth: u64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DailyEntry {
    pub fn full_name(&self) -> FullName {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub owner: String,
    #[serde(rename = "repo")]
    pub name: String,
    pub description: Option<String>,
    pub stars: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub language: Option<String>,
    pub last_seen: NaiveDate,
}

impl IndexEntry {
    pub fn from_daily(entry: &DailyEntry, seen: NaiveDate) -> Self {
        Self {
            owner: entry.owner.clone(),
            name: entry.name.clone(),
            description: entry.description.clone(),
            stars: entry.stars,
            tags: entry.tags.clone(),
            language: entry.language.clone(),
            last_seen: seen,
        }
    }

    /// Seeds an entry from a stored record; the last history point stands in
    /// for the day the repository was last seen.
    pub fn from_record(record: &RepoRecord) -> Self {
        let last_seen = record
            .star_history
            .last()
            .map(|point| point.date)
            .unwrap_or_else(|| record.updated_at.date_naive());
        Self {
            owner: record.owner.clone(),
            name: record.name.clone(),
            description: record.description.clone(),
            stars: record.stargazers_count,
            tags: record.tags.clone(),
            language: record.language.clone(),
            last_seen,
        }
    }

    pub fn full_name(&self) -> FullName {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Every repository ever tracked, one entry per `owner/name`, kept in first
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<IndexEntry>", into = "Vec<IndexEntry>")]
pub struct GlobalIndex {
    entries: Vec<IndexEntry>,
    positions: HashMap<FullName, usize>,
}

impl GlobalIndex {
    pub fn upsert(&mut self, entry: IndexEntry) {
        let key = entry.full_name();
        match self.positions.get(&key) {
            Some(&position) => self.entries[position] = entry,
            None => {
                self.positions.insert(key, self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn get(&self, full_name: &str) -> Option<&IndexEntry> {
        self.positions
            .get(full_name)
            .map(|&position| &self.entries[position])
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<IndexEntry>> for GlobalIndex {
    fn from(entries: Vec<IndexEntry>) -> Self {
        let mut index = GlobalIndex::default();
        for entry in entries {
            index.upsert(entry);
        }
        index
    }
}

impl From<GlobalIndex> for Vec<IndexEntry> {
    fn from(index: GlobalIndex) -> Self {
        index.entries
    }
}
