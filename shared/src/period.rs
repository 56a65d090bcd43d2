use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

pub use strum::IntoEnumIterator;

/// Ranking window of the trending page.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Default,
    PartialEq,
    Eq,
    Clone,
    Copy,
    EnumIter,
    EnumString,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TrendingPeriod {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl TrendingPeriod {
    /// Value of the `since` query parameter.
    pub fn as_query(&self) -> &'static str {
        match self {
            TrendingPeriod::Daily => "daily",
            TrendingPeriod::Weekly => "weekly",
            TrendingPeriod::Monthly => "monthly",
        }
    }

    /// Suffix the trending page appends to the growth counter.
    pub fn growth_suffix(&self) -> &'static str {
        match self {
            TrendingPeriod::Daily => "stars today",
            TrendingPeriod::Weekly => "stars this week",
            TrendingPeriod::Monthly => "stars this month",
        }
    }
}
