use std::time::Duration;

use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use shared::{IntoEnumIterator, RepoId, TrendingPeriod};
use tracing::{error, info, instrument, warn};

const TRENDING_URL: &str = "https://github.com/trending";
const UNKNOWN_LANGUAGE: &str = "Unknown";

/// A repository as listed on the trending page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendingEntry {
    pub id: RepoId,
    pub description: String,
    pub language: String,
    pub stars: u64,
    pub forks: u64,
    pub growth: u64,
    pub period: TrendingPeriod,
}

#[async_trait::async_trait]
pub trait TrendingSource: Send + Sync {
    /// Ranked repositories for `period`; empty when the listing is unavailable.
    async fn trending(&self, period: TrendingPeriod) -> Vec<TrendingEntry>;
}

pub struct TrendingScraper {
    client: reqwest::Client,
    base_url: String,
}

impl TrendingScraper {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_base_url(TRENDING_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn fetch_page(&self, period: TrendingPeriod) -> Result<String, reqwest::Error> {
        self.client
            .get(&self.base_url)
            .query(&[("since", period.as_query())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[async_trait::async_trait]
impl TrendingSource for TrendingScraper {
    #[instrument(skip(self))]
    async fn trending(&self, period: TrendingPeriod) -> Vec<TrendingEntry> {
        match self.fetch_page(period).await {
            Ok(html) => {
                let entries = parse_trending_page(&html, period);
                info!("Found {} trending repositories", entries.len());
                entries
            }
            Err(e) => {
                error!("Failed to fetch trending page: {e}");
                Vec::new()
            }
        }
    }
}

struct Selectors {
    row: Selector,
    name: Selector,
    description: Selector,
    language: Selector,
    counters: Selector,
    growth: Selector,
}

impl Selectors {
    fn new() -> Option<Self> {
        Some(Self {
            row: Selector::parse("article.Box-row").ok()?,
            name: Selector::parse("h2.h3 a").ok()?,
            description: Selector::parse("p.col-9").ok()?,
            language: Selector::parse(r#"span[itemprop="programmingLanguage"]"#).ok()?,
            counters: Selector::parse("a.Link--muted").ok()?,
            growth: Selector::parse("span.d-inline-block.float-sm-right").ok()?,
        })
    }
}

/// Extracts the ranked rows of a trending page, skipping rows that do not
/// carry a parseable `owner/name`.
pub fn parse_trending_page(html: &str, period: TrendingPeriod) -> Vec<TrendingEntry> {
    let Some(selectors) = Selectors::new() else {
        error!("Invalid trending page selectors");
        return Vec::new();
    };

    let document = Html::parse_document(html);
    document
        .select(&selectors.row)
        .filter_map(|row| {
            let entry = parse_row(&selectors, row, period);
            if entry.is_none() {
                warn!("Skipping unparseable trending row");
            }
            entry
        })
        .collect()
}

fn parse_row(
    selectors: &Selectors,
    row: ElementRef<'_>,
    period: TrendingPeriod,
) -> Option<TrendingEntry> {
    let name: String = text_of(row.select(&selectors.name).next()?)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let id = RepoId::from_full_name(&name)?;

    let description = row
        .select(&selectors.description)
        .next()
        .map(text_of)
        .unwrap_or_default();
    let language = row
        .select(&selectors.language)
        .next()
        .map(text_of)
        .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string());

    // A stars counter that is present but not a plain number rejects the row.
    let mut counters = row.select(&selectors.counters).map(text_of);
    let stars = match counters.next() {
        Some(text) => parse_count(&text)?,
        None => 0,
    };
    let forks = counters
        .next()
        .and_then(|text| parse_count(&text))
        .unwrap_or_default();

    let growth = row
        .select(&selectors.growth)
        .next()
        .and_then(|span| parse_growth(&text_of(span)))
        .unwrap_or_default();

    Some(TrendingEntry {
        id,
        description,
        language,
        stars,
        forks,
        growth,
        period,
    })
}

fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .join(" ")
}

fn parse_count(text: &str) -> Option<u64> {
    text.replace(',', "").trim().parse().ok()
}

/// "1,234 stars today" -> 1234, for any period suffix.
fn parse_growth(text: &str) -> Option<u64> {
    let count = TrendingPeriod::iter()
        .find_map(|period| text.strip_suffix(period.growth_suffix()))
        .unwrap_or(text);
    parse_count(count)
}
