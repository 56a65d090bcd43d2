use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

mod category;
mod history;
mod keys;
mod period;
mod record;
pub mod timestamp;

#[cfg(feature = "client")]
pub mod telegram;

pub use category::*;
pub use history::*;
pub use keys::*;
pub use period::*;
pub use record::*;

/// `owner/name` pair that identifies a tracked repository.
pub type FullName = String;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    #[serde(rename = "repo")]
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> FullName {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn from_full_name(full_name: &str) -> Option<Self> {
        let (owner, name) = full_name.split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(owner, name))
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

pub fn date_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
