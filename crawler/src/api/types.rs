use chrono::{DateTime, Utc};
use shared::{RepoId, RepoRecord, StarHistory};

/// Repository metadata fetched when a repository is seen for the first time.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoDetails {
    pub id: RepoId,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub stargazers_count: u64,
    pub forks_count: u64,
    pub language: Option<String>,
    pub topics: Vec<String>,
    pub readme: String,
}

impl RepoDetails {
    pub fn from_repository(id: RepoId, repo: octocrab::models::Repository, readme: String) -> Self {
        let full_name = repo.full_name.unwrap_or_else(|| id.full_name());
        let html_url = repo
            .html_url
            .map(|url| url.to_string())
            .unwrap_or_else(|| format!("https://github.com/{full_name}"));
        Self {
            full_name,
            description: repo.description,
            html_url,
            created_at: repo.created_at.unwrap_or_default(),
            updated_at: repo.updated_at.unwrap_or_default(),
            pushed_at: repo.pushed_at,
            stargazers_count: repo.stargazers_count.unwrap_or_default() as u64,
            forks_count: repo.forks_count.unwrap_or_default() as u64,
            language: repo
                .language
                .and_then(|l| l.as_str().map(ToString::to_string)),
            topics: repo.topics.unwrap_or_default(),
            readme,
            id,
        }
    }

    pub fn into_record(self, tags: Vec<String>, star_history: StarHistory) -> RepoRecord {
        RepoRecord {
            owner: self.id.owner,
            name: self.id.name,
            full_name: self.full_name,
            html_url: self.html_url,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
            pushed_at: self.pushed_at,
            stargazers_count: self.stargazers_count,
            forks_count: self.forks_count,
            language: self.language,
            topics: self.topics,
            readme: self.readme,
            tags,
            star_history,
        }
    }
}

/// Cuts `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
