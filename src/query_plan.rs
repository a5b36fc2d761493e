// =============================================================================
// query_plan.rs — TURNING ONE REQUEST INTO MANY SMALL ONES
// =============================================================================
//
// The rankings site answers one (year, age group, event) combination per
// page. A request like "2015-2019, M50-M70, 60,200" therefore fans out into
// 5 × 5 × 2 = 50 atomic queries, fetched and imported independently.
//
// Ordering is year outer, age group middle, event inner. Nothing depends on
// the order semantically, but it has to be deterministic so `--skip N` can
// resume a run that died halfway.
// =============================================================================

use crate::error::RangeSyntaxError;
use crate::models::{Gender, Query, Season};

/// Age groups are five-year bands.
pub const AGE_GROUP_STEP: usize = 5;

/// Everything needed to expand into queries. Built once, iterated as many
/// times as you like.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    season: Season,
    gender: Gender,
    years: Vec<i32>,
    age_groups: Vec<u32>,
    events: Vec<String>,
    country: Option<String>,
}

impl QueryPlan {
    /// Parse the textual specs. Fails on the first malformed spec; no partial
    /// plan is ever returned.
    ///
    /// * `years` - "2018", "2015-2019" or "2014,2016"
    /// * `age_groups` - "50", "50-70" (step 5) or "50,60"
    /// * `events` - "60,200"
    pub fn parse(
        season: Season,
        gender: Gender,
        years: &str,
        age_groups: &str,
        events: &str,
        country: Option<String>,
    ) -> Result<Self, RangeSyntaxError> {
        let years = parse_number_spec::<i32>("year", years, 1)?;
        let age_groups = parse_number_spec::<u32>("age group", age_groups, AGE_GROUP_STEP)?;
        let events = parse_list("event", events)?;

        Ok(Self {
            season,
            gender,
            years,
            age_groups,
            events,
            country: country.filter(|c| !c.trim().is_empty()),
        })
    }

    /// Total number of atomic queries.
    pub fn len(&self) -> usize {
        self.years.len() * self.age_groups.len() * self.events.len()
    }

    /// A fresh, lazy pass over every query in plan order.
    pub fn iter(&self) -> impl Iterator<Item = Query> + '_ {
        self.years.iter().flat_map(move |&year| {
            self.age_groups.iter().flat_map(move |&age| {
                self.events.iter().map(move |event| Query {
                    season: self.season,
                    gender: self.gender,
                    year,
                    age_group: format!("{}{}", self.gender, age),
                    event: event.clone(),
                    country: self.country.clone(),
                })
            })
        })
    }
}

/// Parse "a", "a-b" or "a,b,c".
///
/// A range starts at `a` and steps by `step` while below `b + step`, so the
/// last band always covers `b`: "50-52" gives 50 and 55.
pub fn parse_number_spec<T>(
    what: &'static str,
    input: &str,
    step: usize,
) -> Result<Vec<T>, RangeSyntaxError>
where
    T: Copy + PartialOrd + std::str::FromStr + TryFrom<i64>,
    i64: From<T>,
{
    let error = |reason: String| RangeSyntaxError {
        what,
        input: input.to_string(),
        reason,
    };
    let number = |text: &str| -> Result<T, RangeSyntaxError> {
        text.trim()
            .parse::<T>()
            .map_err(|_| error(format!("'{}' is not a number", text.trim())))
    };

    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(error("empty".to_string()));
    }

    if let Some((start, end)) = trimmed.split_once('-') {
        let start = number(start)?;
        let end = number(end)?;
        if start > end {
            return Err(error("range start is after range end".to_string()));
        }
        let step = step.max(1);
        let values = (i64::from(start)..i64::from(end) + step as i64)
            .step_by(step)
            .filter_map(|v| T::try_from(v).ok())
            .collect();
        return Ok(values);
    }

    trimmed.split(',').map(number).collect()
}

fn parse_list(what: &'static str, input: &str) -> Result<Vec<String>, RangeSyntaxError> {
    let items: Vec<String> = input.split(',').map(|s| s.trim().to_string()).collect();
    if items.iter().any(String::is_empty) {
        return Err(RangeSyntaxError {
            what,
            input: input.to_string(),
            reason: "empty list item".to_string(),
        });
    }
    Ok(items)
}
