// =============================================================================
// normalizer.rs — FROM TABLE CELLS TO A PERFORMANCE RECORD
// =============================================================================
//
// Two of the columns on a rankings page are really several fields glued
// together with punctuation:
//
//   athlete name:  "John A. Smith (52)"            -> first, last, age
//   meet info:     "Boston, MA, USA on 05 Jan 19 - 06 Jan 19"
//                                                  -> city, state, country,
//                                                     start date, end date
//
// Each split is a small pure function that is total over the shape it
// expects and returns a named failure for anything else. `normalize` stitches
// them together and attaches the original entry to whatever failed, so a
// record is either complete or not produced at all.
// =============================================================================

use chrono::{Datelike, NaiveDate};
use tracing::warn;

use crate::error::{EntryField, FieldParseError};
use crate::models::{PerformanceRecord, RankEntry};

/// Name tokens that belong to the surname rather than the given names.
pub const NAME_SUFFIXES: &[&str] = &["Sr.", "Jr.", "III"];

/// Day, abbreviated month, two-digit year: "05 Jan 19".
pub const MEET_DATE_FORMAT: &str = "%d %b %y";

/// Two-digit years from here up are 19xx; below it they are 20xx.
pub const CENTURY_PIVOT: i32 = 69;

/// A failed split before the entry is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFailure {
    pub field: EntryField,
    pub reason: String,
}

impl FieldFailure {
    fn new(field: EntryField, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Where a meet took place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Place {
    pub city: String,
    pub state: Option<String>,
    pub country: String,
}

/// Turn one rank entry into a validated record for the given ranking year.
pub fn normalize(entry: &RankEntry, year: i32) -> Result<PerformanceRecord, FieldParseError> {
    build_record(entry, year).map_err(|failure| FieldParseError {
        field: failure.field,
        reason: failure.reason,
        entry: Box::new(entry.clone()),
    })
}

fn build_record(entry: &RankEntry, year: i32) -> Result<PerformanceRecord, FieldFailure> {
    let (name, age) = split_name_and_age(&entry.athlete_name)?;
    let (first_name, last_name) = split_name(name)?;
    if first_name.is_empty() {
        warn!(
            athlete_id = %entry.athlete_id,
            name = name,
            "single-token athlete name, storing it as the last name with an empty first name"
        );
    }

    let (place, dates) = split_meet_info(&entry.meet_info)?;
    let place = split_place(place)?;
    let (start_date, end_date) = parse_dates(dates)?;

    Ok(PerformanceRecord {
        athlete_id: entry.athlete_id.clone(),
        meet_id: entry.meet_id.clone(),
        year,
        performance: entry.performance.clone(),
        wind: entry.wind.clone(),
        first_name,
        last_name,
        birth_year: birth_year(year, age).ok_or_else(|| {
            FieldFailure::new(EntryField::Age, format!("age {age} is out of range for {year}"))
        })?,
        country: place.country,
        city: place.city,
        state: place.state,
        start_date,
        end_date,
    })
}

/// Ages on the page are as of the end of the ranking year.
pub fn birth_year(year: i32, age: u16) -> Option<i32> {
    year.checked_sub(i32::from(age))?.checked_sub(1)
}

/// "John A. Smith (52)" -> ("John A. Smith", 52). Splits on the last " (".
pub fn split_name_and_age(athlete_name: &str) -> Result<(&str, u16), FieldFailure> {
    let (name, age) = athlete_name
        .rsplit_once(" (")
        .ok_or_else(|| FieldFailure::new(EntryField::AthleteName, "no ' (' before the age"))?;

    let digits = age
        .trim_end()
        .strip_suffix(')')
        .ok_or_else(|| FieldFailure::new(EntryField::Age, format!("'{age}' has no closing ')'")))?;

    let age = digits
        .trim()
        .parse::<u16>()
        .map_err(|_| FieldFailure::new(EntryField::Age, format!("'{digits}' is not a plausible age")))?;

    Ok((name, age))
}

/// Split a display name into (first, last). A trailing suffix such as "Jr."
/// stays with the surname. A one-word name comes back with an empty first name.
pub fn split_name(name: &str) -> Result<(String, String), FieldFailure> {
    let tokens: Vec<&str> = name.split_whitespace().collect();
    let Some(&last) = tokens.last() else {
        return Err(FieldFailure::new(EntryField::AthleteName, "name is empty"));
    };

    let surname_len = if NAME_SUFFIXES.contains(&last) {
        2.min(tokens.len())
    } else {
        1
    };
    let split = tokens.len() - surname_len;

    Ok((tokens[..split].join(" "), tokens[split..].join(" ")))
}

/// "Boston, MA, USA on 05 Jan 19" -> ("Boston, MA, USA", "05 Jan 19").
///
/// Splits on the last " on " so a place like "Stratford on Avon" survives;
/// the date half never contains the separator.
pub fn split_meet_info(meet_info: &str) -> Result<(&str, &str), FieldFailure> {
    meet_info
        .rsplit_once(" on ")
        .ok_or_else(|| FieldFailure::new(EntryField::MeetInfo, "no ' on ' between place and dates"))
}

/// "City[, State], Country". The first segment is the city, the last the
/// country, and the second the state when there are three or more.
pub fn split_place(place: &str) -> Result<Place, FieldFailure> {
    let segments: Vec<&str> = place.split(", ").map(str::trim).collect();
    if segments.iter().all(|s| s.is_empty()) {
        return Err(FieldFailure::new(EntryField::Place, "place is empty"));
    }

    let city = segments[0].to_string();
    let country = segments[segments.len() - 1].to_string();
    let state = (segments.len() > 2).then(|| segments[1].to_string());

    Ok(Place {
        city,
        state,
        country,
    })
}

/// "05 Jan 19" or "05 Jan 19 - 06 Jan 19".
pub fn parse_dates(dates: &str) -> Result<(NaiveDate, Option<NaiveDate>), FieldFailure> {
    let segments: Vec<&str> = dates.split(" - ").collect();
    match segments.as_slice() {
        [single] => Ok((parse_meet_date(single)?, None)),
        [start, end] => {
            let start = parse_meet_date(start)?;
            let end = parse_meet_date(end)?;
            if end < start {
                return Err(FieldFailure::new(
                    EntryField::Dates,
                    format!("end date {end} is before start date {start}"),
                ));
            }
            Ok((start, Some(end)))
        }
        _ => Err(FieldFailure::new(
            EntryField::Dates,
            format!("expected one or two dates, found {}", segments.len()),
        )),
    }
}

fn parse_meet_date(text: &str) -> Result<NaiveDate, FieldFailure> {
    let text = text.trim();
    let date = NaiveDate::parse_from_str(text, MEET_DATE_FORMAT).map_err(|e| {
        FieldFailure::new(EntryField::Dates, format!("'{text}' is not a 'dd Mon yy' date: {e}"))
    })?;

    // chrono pivots %y at 70; the site's dates pivot at 69.
    if date.year() < 2000 + CENTURY_PIVOT {
        return Ok(date);
    }
    date.with_year(date.year() - 100).ok_or_else(|| {
        FieldFailure::new(EntryField::Dates, format!("'{text}' has no 19xx equivalent"))
    })
}
