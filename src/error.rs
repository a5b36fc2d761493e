// =============================================================================
// error.rs — EVERY WAY A RANKINGS IMPORT CAN GO WRONG
// =============================================================================
//
// Each failure keeps the input that caused it. When the upstream site changes
// its markup at 2am, the log line is the only bug report we're going to get.
// =============================================================================

use std::fmt;

use thiserror::Error;

use crate::models::{PerformanceRecord, RankEntry, RawRow};

/// Malformed year or age-group range text. Raised before any network activity.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid {what} spec '{input}': {reason}")]
pub struct RangeSyntaxError {
    pub what: &'static str,
    pub input: String,
    pub reason: String,
}

/// The rankings page could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not build request url: {0}")]
    Url(#[from] url::ParseError),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Row extraction failures. All of them abort the current query.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("markup tokenizer failed at byte {position}: {message}")]
    Markup { position: u64, message: String },

    #[error("malformed rank row ({reason}): {values:?}")]
    MalformedRow { reason: String, values: RawRow },

    #[error("rank row was never closed: {values:?}")]
    UnterminatedRow { values: RawRow },
}

/// Which compound field of a rank entry failed to split or parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryField {
    AthleteName,
    Age,
    MeetInfo,
    Place,
    Dates,
}

impl fmt::Display for EntryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryField::AthleteName => "athlete name",
            EntryField::Age => "age",
            EntryField::MeetInfo => "meet info",
            EntryField::Place => "place",
            EntryField::Dates => "dates",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("could not parse {field} ({reason}) in entry {entry:?}")]
pub struct FieldParseError {
    pub field: EntryField,
    pub reason: String,
    pub entry: Box<RankEntry>,
}

/// A performance mark that is neither a number nor a clock time.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("performance value '{value}' is neither a number nor a clock time")]
pub struct ConversionError {
    pub value: String,
}

/// The store refused a write for a reason other than the key already existing.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Failure to persist one record. The record rides along for diagnosis.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("{source} (record {record:?})")]
    Conversion {
        #[source]
        source: ConversionError,
        record: Box<PerformanceRecord>,
    },

    #[error("{source} (record {record:?})")]
    Store {
        #[source]
        source: StoreError,
        record: Box<PerformanceRecord>,
    },
}

/// Anything that stops one query's batch.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    FieldParse(#[from] FieldParseError),
}
