// =============================================================================
// models.rs — THE SHAPES OF A RANKINGS TABLE
// =============================================================================
//
// Everything that flows through the pipeline lives here, from the query that
// kicks off a fetch down to the three rows that end up in the database:
//
//   Query ──fetch──▶ markup ──extract──▶ RawRow ──▶ RankEntry
//         ──normalize──▶ PerformanceRecord ──write──▶ Athlete / Meet / Performance
//
// Queries are immutable and drive exactly one fetch+parse+persist cycle.
// RawRow and RankEntry never outlive the row they were scanned from.
// =============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Indoor or outdoor season. Stored verbatim in the Meets table and sent
/// verbatim to the rankings site.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Season {
    #[value(name = "Indoor")]
    Indoor,
    #[value(name = "Outdoor")]
    Outdoor,
}

impl Season {
    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Indoor => "Indoor",
            Season::Outdoor => "Outdoor",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Season {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Indoor" => Ok(Season::Indoor),
            "Outdoor" => Ok(Season::Outdoor),
            other => Err(format!("unknown season '{other}' (expected Indoor or Outdoor)")),
        }
    }
}

/// Competition gender. The database and age-group labels use the single
/// letter; the rankings site wants the long form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Gender {
    #[value(name = "M")]
    M,
    #[value(name = "W")]
    W,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::M => "M",
            Gender::W => "W",
        }
    }

    /// The literal the upstream query string expects.
    pub fn upstream_label(&self) -> &'static str {
        match self {
            Gender::M => "Men",
            Gender::W => "Women",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One atomic unit of work: one year, one age group, one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    pub season: Season,
    pub gender: Gender,
    pub year: i32,
    /// Gender-prefixed band label, e.g. "M50".
    pub age_group: String,
    pub event: String,
    pub country: Option<String>,
}

impl Query {
    /// Which row layout the page for this query will use. Country-filtered
    /// pages drop the age-grading and country columns.
    pub fn entry_shape(&self) -> RankEntryShape {
        if self.country.is_some() {
            RankEntryShape::Country
        } else {
            RankEntryShape::World
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.season, self.year, self.age_group, self.event
        )?;
        if let Some(country) = &self.country {
            write!(f, " [{country}]")?;
        }
        Ok(())
    }
}

/// Cell values captured between a marked row start and its row end.
/// `None` means the value-bearing tag had no value at all.
pub type RawRow = Vec<Option<String>>;

/// The two row layouts the rankings site serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankEntryShape {
    /// performance, wind, athlete id, athlete name, age grading, country, meet id, meet info
    World,
    /// performance, wind, athlete id, athlete name, meet id, meet info
    Country,
}

impl RankEntryShape {
    /// Field count once the optional wind slot is filled in.
    pub fn field_count(&self) -> usize {
        match self {
            RankEntryShape::World => 8,
            RankEntryShape::Country => 6,
        }
    }
}

/// Typed view over one finalized row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankEntry {
    pub performance: String,
    pub wind: Option<String>,
    pub athlete_id: String,
    /// "First Last (age)"
    pub athlete_name: String,
    /// Age-graded mark column; absent on country pages.
    pub extra: Option<String>,
    /// Athlete's country column; absent on country pages.
    pub country: Option<String>,
    pub meet_id: String,
    /// "City[, State], Country on dd Mon yy[ - dd Mon yy]"
    pub meet_info: String,
}

/// A fully normalized result, ready for persistence.
///
/// Invariants: `birth_year == year - age - 1` for the age printed on the
/// page, and `end_date >= start_date` whenever `end_date` is present.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRecord {
    #[serde(rename = "athleteID")]
    pub athlete_id: String,
    #[serde(rename = "meetID")]
    pub meet_id: String,
    pub year: i32,
    /// Raw mark as printed: "7.45", "12.08", "1:02.3".
    pub performance: String,
    pub wind: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub birth_year: i32,
    pub country: String,
    pub city: String,
    pub state: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

// =============================================================================
// Persisted rows
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AthleteRow {
    pub athlete_id: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub birth_year: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeetRow {
    pub meet_id: String,
    pub season: Season,
    pub year: i32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub city: String,
    pub state: Option<String>,
    pub country: String,
}

/// Keyed by (meet_id, athlete_id, age_group, event).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceRow {
    pub meet_id: String,
    pub athlete_id: String,
    pub age_group: String,
    pub event: String,
    /// Seconds for timed events, metres (or points) otherwise.
    pub performance: f64,
    pub wind: Option<String>,
}

impl AthleteRow {
    pub fn derive(record: &PerformanceRecord, query: &Query) -> Self {
        Self {
            athlete_id: record.athlete_id.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            gender: query.gender,
            birth_year: record.birth_year,
        }
    }
}

impl MeetRow {
    pub fn derive(record: &PerformanceRecord, query: &Query) -> Self {
        Self {
            meet_id: record.meet_id.clone(),
            season: query.season,
            year: record.year,
            start_date: record.start_date,
            end_date: record.end_date,
            city: record.city.clone(),
            state: record.state.clone(),
            country: record.country.clone(),
        }
    }
}

impl PerformanceRow {
    pub fn derive(record: &PerformanceRecord, query: &Query, magnitude: f64) -> Self {
        Self {
            meet_id: record.meet_id.clone(),
            athlete_id: record.athlete_id.clone(),
            age_group: query.age_group.clone(),
            event: query.event.clone(),
            performance: magnitude,
            wind: record.wind.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(country: Option<&str>) -> Query {
        Query {
            season: Season::Outdoor,
            gender: Gender::W,
            year: 2019,
            age_group: "W55".to_string(),
            event: "100".to_string(),
            country: country.map(str::to_string),
        }
    }

    #[test]
    fn test_entry_shape_follows_country_filter() {
        assert_eq!(query(None).entry_shape(), RankEntryShape::World);
        assert_eq!(query(Some("USA")).entry_shape(), RankEntryShape::Country);
        assert_eq!(RankEntryShape::World.field_count(), 8);
        assert_eq!(RankEntryShape::Country.field_count(), 6);
    }

    #[test]
    fn test_gender_upstream_label() {
        assert_eq!(Gender::M.upstream_label(), "Men");
        assert_eq!(Gender::W.upstream_label(), "Women");
    }

    #[test]
    fn test_season_parses_its_own_display() {
        assert_eq!("Indoor".parse::<Season>(), Ok(Season::Indoor));
        assert_eq!(Season::Outdoor.to_string().parse::<Season>(), Ok(Season::Outdoor));
        assert!("indoor-ish".parse::<Season>().is_err());
    }

    #[test]
    fn test_rows_take_context_from_query() {
        let record = PerformanceRecord {
            athlete_id: "a1".into(),
            meet_id: "m1".into(),
            year: 2019,
            performance: "13.10".into(),
            wind: Some("+1.2".into()),
            first_name: "Ann".into(),
            last_name: "Lee".into(),
            birth_year: 1963,
            country: "USA".into(),
            city: "Eugene".into(),
            state: None,
            start_date: NaiveDate::from_ymd_opt(2019, 6, 1).unwrap(),
            end_date: None,
        };
        let q = query(None);

        let athlete = AthleteRow::derive(&record, &q);
        assert_eq!(athlete.gender, Gender::W);

        let meet = MeetRow::derive(&record, &q);
        assert_eq!(meet.season, Season::Outdoor);
        assert_eq!(meet.year, 2019);

        let perf = PerformanceRow::derive(&record, &q, 13.1);
        assert_eq!(perf.age_group, "W55");
        assert_eq!(perf.event, "100");
        assert_eq!(perf.wind.as_deref(), Some("+1.2"));
    }
}
