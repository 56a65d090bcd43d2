use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarPoint {
    pub date: NaiveDate,
    pub count: u64,
}

impl StarPoint {
    pub const fn new(date: NaiveDate, count: u64) -> Self {
        Self { date, count }
    }
}

/// Cumulative star counts ordered by date.
///
/// Series built through this type keep dates strictly increasing and counts
/// non-decreasing. The `{created_at, 0}` origin point some constructors emit
/// is an approximation: the repository is assumed to have had no stars on the
/// day it was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StarHistory(Vec<StarPoint>);

impl StarHistory {
    pub fn from_points(points: Vec<StarPoint>) -> Self {
        Self(points)
    }

    /// Buckets individual star events by calendar day and accumulates them.
    ///
    /// The origin point is dropped when events exist on or before the creation
    /// day, otherwise the series would carry the same date twice.
    pub fn from_star_events<I>(created: NaiveDate, events: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let per_day = events
            .into_iter()
            .fold(BTreeMap::<NaiveDate, u64>::new(), |mut map, day| {
                *map.entry(day).or_default() += 1;
                map
            });

        let mut points = Vec::with_capacity(per_day.len() + 1);
        if per_day.keys().next().map_or(true, |first| created < *first) {
            points.push(StarPoint::new(created, 0));
        }

        let mut total = 0;
        for (date, stars) in per_day {
            total += stars;
            points.push(StarPoint::new(date, total));
        }

        Self(points)
    }

    /// Two-point linear placeholder used when enumerating every star is too
    /// expensive.
    pub fn placeholder(created: NaiveDate, today: NaiveDate, total: u64) -> Self {
        if created < today {
            Self(vec![StarPoint::new(created, 0), StarPoint::new(today, total)])
        } else {
            Self(vec![StarPoint::new(today, total)])
        }
    }

    pub fn fallback(today: NaiveDate) -> Self {
        Self(vec![StarPoint::new(today, 0)])
    }

    pub fn points(&self) -> &[StarPoint] {
        &self.0
    }

    pub fn into_points(self) -> Vec<StarPoint> {
        self.0
    }

    pub fn last(&self) -> Option<&StarPoint> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a point for `today` (or a later day) is already recorded.
    pub fn is_current(&self, today: NaiveDate) -> bool {
        self.last().is_some_and(|last| last.date >= today)
    }

    /// Appends `{today, count}` unless the series is already current.
    ///
    /// A count below the previous one is clamped so the series stays
    /// monotonic. Returns whether a point was appended.
    pub fn record(&mut self, today: NaiveDate, count: u64) -> bool {
        let count = match self.0.last() {
            Some(last) if last.date >= today => return false,
            Some(last) => count.max(last.count),
            None => count,
        };
        self.0.push(StarPoint::new(today, count));
        true
    }

    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .windows(2)
                .all(|pair| pair[0].date < pair[1].date && pair[0].count <= pair[1].count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn buckets_events_per_day() {
        let history = StarHistory::from_star_events(
            day("2023-12-01"),
            [
                day("2024-01-02"),
                day("2024-01-01"),
                day("2024-01-02"),
                day("2024-01-05"),
            ],
        );

        assert_eq!(
            history.points(),
            &[
                StarPoint::new(day("2023-12-01"), 0),
                StarPoint::new(day("2024-01-01"), 1),
                StarPoint::new(day("2024-01-02"), 3),
                StarPoint::new(day("2024-01-05"), 4),
            ]
        );
        assert!(history.is_well_formed());
    }

    #[test]
    fn origin_dropped_when_starred_on_creation_day() {
        let history = StarHistory::from_star_events(
            day("2024-01-01"),
            [day("2024-01-01"), day("2024-01-03")],
        );

        assert_eq!(
            history.points(),
            &[
                StarPoint::new(day("2024-01-01"), 1),
                StarPoint::new(day("2024-01-03"), 2),
            ]
        );
        assert!(history.is_well_formed());
    }

    #[test]
    fn no_events_keeps_origin_only() {
        let history = StarHistory::from_star_events(day("2024-01-01"), []);
        assert_eq!(history.points(), &[StarPoint::new(day("2024-01-01"), 0)]);
    }

    #[test]
    fn placeholder_for_same_day_repo() {
        let today = day("2024-03-02");
        assert_eq!(
            StarHistory::placeholder(today, today, 5000).points(),
            &[StarPoint::new(today, 5000)]
        );
        assert_eq!(
            StarHistory::placeholder(day("2020-01-01"), today, 5000).points(),
            &[
                StarPoint::new(day("2020-01-01"), 0),
                StarPoint::new(today, 5000),
            ]
        );
    }

    #[test]
    fn record_is_idempotent_within_a_day() {
        let mut history = StarHistory::from_points(vec![StarPoint::new(day("2024-03-01"), 100)]);

        assert!(history.record(day("2024-03-02"), 120));
        let after_first = history.clone();
        assert!(!history.record(day("2024-03-02"), 130));

        assert_eq!(history, after_first);
        assert_eq!(history.last(), Some(&StarPoint::new(day("2024-03-02"), 120)));
    }

    #[test]
    fn record_clamps_lower_counts() {
        let mut history = StarHistory::from_points(vec![StarPoint::new(day("2024-03-01"), 100)]);
        history.record(day("2024-03-02"), 90);

        assert_eq!(history.last(), Some(&StarPoint::new(day("2024-03-02"), 100)));
        assert!(history.is_well_formed());
    }

    #[test]
    fn record_ignores_past_days() {
        let mut history = StarHistory::from_points(vec![StarPoint::new(day("2024-03-05"), 100)]);
        assert!(!history.record(day("2024-03-02"), 200));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn serializes_as_plain_array() {
        let history = StarHistory::fallback(day("2024-03-02"));
        let json = serde_json::to_string(&history).unwrap();
        assert_eq!(json, r#"[{"date":"2024-03-02","count":0}]"#);
    }
}
