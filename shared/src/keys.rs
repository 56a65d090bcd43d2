use chrono::NaiveDate;

use crate::{date_string, RepoId};

pub const PROJECTS_PREFIX: &str = "data/projects";
pub const DAILY_PREFIX: &str = "data/daily";
pub const INDEX_KEY: &str = "data/index.json";

pub fn project_key(id: &RepoId) -> String {
    format!("{PROJECTS_PREFIX}/{}/{}.json", id.owner, id.name)
}

pub fn daily_key(date: NaiveDate) -> String {
    format!("{DAILY_PREFIX}/{}.json", date_string(date))
}

/// Inverse of [`project_key`].
pub fn parse_project_key(key: &str) -> Option<RepoId> {
    let rest = key.strip_prefix(PROJECTS_PREFIX)?.strip_prefix('/')?;
    let full_name = rest.strip_suffix(".json")?;
    RepoId::from_full_name(full_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let id = RepoId::new("acme", "widget");
        assert_eq!(project_key(&id), "data/projects/acme/widget.json");
        assert_eq!(
            daily_key("2024-03-02".parse().unwrap()),
            "data/daily/2024-03-02.json"
        );
    }

    #[test]
    fn parses_project_keys() {
        let id = RepoId::new("acme", "widget.rs");
        assert_eq!(parse_project_key(&project_key(&id)), Some(id));
        assert_eq!(parse_project_key("data/daily/2024-03-02.json"), None);
        assert_eq!(parse_project_key("data/projects/acme.json"), None);
    }
}
