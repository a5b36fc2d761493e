// =============================================================================
// stats.rs — HOW FAST WERE THE M60 SPRINTERS IN 2017?
// =============================================================================
//
// The read side. Given a year (or year range), a season, an event and an age
// group, pull every stored performance for that slice, group by year, and
// summarise each year as five quantiles:
//
//   [min, p25, median, p75, p95]
//
// Quantile i of n sorted samples is sample[floor(n * q)]. With a single
// sample there is nothing to summarise, so all five slots repeat it. Years
// with no samples simply don't appear.
// =============================================================================

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::error::StoreError;
use crate::models::Season;

/// Quantile points after the minimum.
const QUANTILES: [f64; 4] = [0.25, 0.5, 0.75, 0.95];

/// One slice of the performance table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsQuery {
    pub first_year: i32,
    pub last_year: i32,
    pub season: Season,
    pub event: String,
    pub age_group: String,
}

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("missing required parameter '{0}'")]
    Missing(&'static str),

    #[error("invalid value '{value}' for '{param}': {reason}")]
    Invalid {
        param: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StatsQuery {
    /// Build from loose key/value pairs (a query string, CLI flags). Keys
    /// other than year, season, event and agegroup are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, StatsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut year = None;
        let mut season = None;
        let mut event = None;
        let mut age_group = None;

        // First occurrence wins, like a parsed query string's first value.
        for (key, value) in pairs {
            let value = value.as_ref().trim().to_string();
            let slot = match key.as_ref() {
                "year" => &mut year,
                "season" => &mut season,
                "event" => &mut event,
                "agegroup" => &mut age_group,
                _ => continue,
            };
            slot.get_or_insert(value);
        }

        let year = year.ok_or(StatsError::Missing("year"))?;
        let season_text = season.ok_or(StatsError::Missing("season"))?;
        let event = event.ok_or(StatsError::Missing("event"))?;
        let age_group = age_group.ok_or(StatsError::Missing("agegroup"))?;

        let (first_year, last_year) = parse_year_range(&year)?;
        let season = season_text
            .parse::<Season>()
            .map_err(|reason| StatsError::Invalid {
                param: "season",
                value: season_text.clone(),
                reason,
            })?;

        Ok(Self {
            first_year,
            last_year,
            season,
            event,
            age_group,
        })
    }
}

fn parse_year_range(text: &str) -> Result<(i32, i32), StatsError> {
    let invalid = |reason: &str| StatsError::Invalid {
        param: "year",
        value: text.to_string(),
        reason: reason.to_string(),
    };
    let number = |s: &str| s.trim().parse::<i32>().map_err(|_| invalid("not a year"));

    match text.split_once('-') {
        Some((a, b)) => {
            let (a, b) = (number(a)?, number(b)?);
            if a > b {
                return Err(invalid("range start is after range end"));
            }
            Ok((a, b))
        }
        None => {
            let y = number(text)?;
            Ok((y, y))
        }
    }
}

/// Anything that can hand back (meet year, performance) samples for a slice.
pub trait SampleSource {
    fn samples(&self, query: &StatsQuery) -> Result<Vec<(i32, f64)>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearStats {
    pub year: i32,
    pub quantiles: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsResponse {
    pub stats: Vec<YearStats>,
}

/// Run a stats query end to end.
pub fn run_query<S: SampleSource + ?Sized>(
    source: &S,
    query: &StatsQuery,
) -> Result<StatsResponse, StatsError> {
    let samples = source.samples(query)?;
    Ok(StatsResponse {
        stats: compute_stats(samples),
    })
}

/// Group samples by year (ascending) and summarise each group.
pub fn compute_stats(samples: Vec<(i32, f64)>) -> Vec<YearStats> {
    let mut by_year: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
    for (year, value) in samples {
        by_year.entry(year).or_default().push(value);
    }

    by_year
        .into_iter()
        .map(|(year, mut values)| {
            values.sort_by(f64::total_cmp);
            YearStats {
                year,
                quantiles: quantiles(&values),
            }
        })
        .collect()
}

/// `[min, p25, median, p75, p95]` over already-sorted values.
pub fn quantiles(sorted: &[f64]) -> Vec<f64> {
    match sorted {
        [] => Vec::new(),
        [only] => vec![*only; QUANTILES.len() + 1],
        _ => {
            let n = sorted.len() as f64;
            std::iter::once(sorted[0])
                .chain(QUANTILES.iter().map(|q| sorted[(n * q) as usize]))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_single_sample_repeats_five_times() {
        let stats = compute_stats(vec![(2019, 7.45)]);
        assert_eq!(stats, vec![YearStats { year: 2019, quantiles: vec![7.45; 5] }]);
    }

    #[test]
    fn test_years_without_rows_are_omitted() {
        let stats = compute_stats(vec![(2015, 8.0), (2017, 7.9), (2017, 8.1)]);
        let years: Vec<i32> = stats.iter().map(|s| s.year).collect();
        assert_eq!(years, vec![2015, 2017]);
        assert!(compute_stats(Vec::new()).is_empty());
    }

    #[test]
    fn test_quantile_indices_floor() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        // n = 10: indices 0, 2, 5, 7, 9
        assert_eq!(quantiles(&values), vec![1.0, 3.0, 6.0, 8.0, 10.0]);

        // n = 2: indices 0, 0, 1, 1, 1
        assert_eq!(quantiles(&[1.0, 2.0]), vec![1.0, 1.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_samples_are_sorted_before_summarising() {
        let stats = compute_stats(vec![(2018, 9.0), (2018, 7.0), (2018, 8.0), (2018, 6.0)]);
        assert_eq!(stats[0].quantiles, vec![6.0, 7.0, 8.0, 9.0, 9.0]);
    }

    #[test]
    fn test_query_from_pairs() {
        let q = StatsQuery::from_pairs(pairs(&[
            ("year", "2015-2019"),
            ("season", "Indoor"),
            ("event", "60"),
            ("agegroup", "M50"),
            ("chart", "line"),
        ]))
        .unwrap();
        assert_eq!((q.first_year, q.last_year), (2015, 2019));
        assert_eq!(q.season, Season::Indoor);
        assert_eq!(q.event, "60");
        assert_eq!(q.age_group, "M50");

        let single = StatsQuery::from_pairs(pairs(&[
            ("year", "2018"),
            ("season", "Outdoor"),
            ("event", "100"),
            ("agegroup", "W40"),
        ]))
        .unwrap();
        assert_eq!((single.first_year, single.last_year), (2018, 2018));
    }

    #[test]
    fn test_query_requires_fields() {
        let err = StatsQuery::from_pairs(pairs(&[("year", "2018"), ("season", "Indoor")])).unwrap_err();
        assert!(matches!(err, StatsError::Missing("event")));

        let err = StatsQuery::from_pairs(pairs(&[
            ("year", "20x8"),
            ("season", "Indoor"),
            ("event", "60"),
            ("agegroup", "M50"),
        ]))
        .unwrap_err();
        assert!(matches!(err, StatsError::Invalid { param: "year", .. }));
    }
}
