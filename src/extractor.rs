// =============================================================================
// extractor.rs — THE RANK ROW SCANNER
// =============================================================================
//
// A rankings page is one big table. The rows we care about look like this:
//
//   <tr class="ranktablerow">
//     <td><input type="hidden" value="7.45"></td>          performance
//     <td><input type="hidden" value="+1.2"></td>          wind (sometimes missing!)
//     <td><input type="hidden" value="12345"></td>         athlete id
//     <td><input type="hidden" value="John Smith (52)"></td>
//     <td><input type="hidden" value="95.1%"></td>         age grading   (world pages only)
//     <td><input type="hidden" value="USA"></td>           country       (world pages only)
//     <td><a href="/meets/?x1=2019&x8=98765">...</a></td>   meet id
//     <td><input type="hidden" value="Boston, MA, USA on 05 Jan 19"></td>
//   </tr>
//
// The scanner is a two-state machine:
//
//   Idle ──<tr class=ranktablerow>──▶ InEntry ──</tr>──▶ Idle (emit one RankEntry)
//                                     │   ▲
//                                     └───┘ <input value> / <a href> append a field
//
// Events whose wind column is blank simply have no wind <input>, so a row
// can arrive one field short. That is fixed once, at finalization, by
// inserting an absent wind at position 1 before anything reads a field.
// =============================================================================

use std::sync::LazyLock;

use aho_corasick::AhoCorasick;
use tracing::{debug, trace};

use crate::error::ExtractError;
use crate::markup::{MarkupToken, MarkupTokens};
use crate::models::{RankEntry, RankEntryShape, RawRow};

/// Class attribute that marks a rank entry row.
pub const RANK_ROW_CLASS: &str = "ranktablerow";

/// Position of the optional wind field in a finalized row.
const WIND_SLOT: usize = 1;

/// Link targets carry the meaningful id behind one of two internal keys,
/// depending on what the link points at.
static LINK_ID_KEYS: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasick::new(["x8=", "x9="]).expect("Failed to build link id automaton")
});

#[derive(Debug)]
enum ScanState {
    Idle,
    InEntry(RawRow),
}

/// Event-driven scanner over one page's markup tokens.
#[derive(Debug)]
pub struct RowExtractor {
    shape: RankEntryShape,
    state: ScanState,
}

impl RowExtractor {
    pub fn new(shape: RankEntryShape) -> Self {
        Self {
            shape,
            state: ScanState::Idle,
        }
    }

    /// Feed one token. Returns a finished entry when the token closed a
    /// marked row.
    pub fn feed(&mut self, token: &MarkupToken) -> Result<Option<RankEntry>, ExtractError> {
        match token {
            MarkupToken::Start { name, .. } if name == "tr" && is_rank_row(token) => {
                if let ScanState::InEntry(values) =
                    std::mem::replace(&mut self.state, ScanState::InEntry(Vec::new()))
                {
                    return Err(ExtractError::UnterminatedRow { values });
                }
                trace!("rank row opened");
                Ok(None)
            }
            MarkupToken::Start { name, .. } => {
                if let ScanState::InEntry(values) = &mut self.state {
                    match name.as_str() {
                        "input" => values.push(token.attr("value").map(str::to_string)),
                        "a" => values.push(Some(link_id(token.attr("href").unwrap_or("")))),
                        _ => {}
                    }
                }
                Ok(None)
            }
            MarkupToken::End { name } if name == "tr" => {
                match std::mem::replace(&mut self.state, ScanState::Idle) {
                    ScanState::InEntry(values) => finalize_row(values, self.shape).map(Some),
                    ScanState::Idle => Ok(None),
                }
            }
            MarkupToken::End { .. } => Ok(None),
        }
    }

    /// Call once the token stream is exhausted. A row still open at this
    /// point never got its `</tr>`.
    pub fn finish(self) -> Result<(), ExtractError> {
        match self.state {
            ScanState::Idle => Ok(()),
            ScanState::InEntry(values) => Err(ExtractError::UnterminatedRow { values }),
        }
    }
}

/// Run the extractor over a whole token stream. Fails fast: the first bad
/// row aborts the page.
pub fn extract_entries<I>(tokens: I, shape: RankEntryShape) -> Result<Vec<RankEntry>, ExtractError>
where
    I: IntoIterator<Item = Result<MarkupToken, ExtractError>>,
{
    let mut extractor = RowExtractor::new(shape);
    let mut entries = Vec::new();

    for token in tokens {
        if let Some(entry) = extractor.feed(&token?)? {
            entries.push(entry);
        }
    }
    extractor.finish()?;

    debug!(rows = entries.len(), "rank rows extracted");
    Ok(entries)
}

/// Convenience wrapper: tokenize `html` and extract every rank entry.
pub fn extract_page(html: &str, shape: RankEntryShape) -> Result<Vec<RankEntry>, ExtractError> {
    extract_entries(MarkupTokens::new(html), shape)
}

fn is_rank_row(token: &MarkupToken) -> bool {
    token
        .attr("class")
        .is_some_and(|class| class.trim().eq_ignore_ascii_case(RANK_ROW_CLASS))
}

/// Keep only what follows the first `x8=`/`x9=` key, up to the next one.
/// Targets without either key are kept whole.
pub fn link_id(href: &str) -> String {
    let mut matches = LINK_ID_KEYS.find_iter(href);
    match matches.next() {
        Some(first) => {
            let end = matches.next().map_or(href.len(), |next| next.start());
            href[first.end()..end].to_string()
        }
        None => href.to_string(),
    }
}

/// Apply the wind-slot fix-up, then build the typed view.
fn finalize_row(mut values: RawRow, shape: RankEntryShape) -> Result<RankEntry, ExtractError> {
    let expected = shape.field_count();

    if values.len() + 1 == expected {
        values.insert(WIND_SLOT, None);
    }
    if values.len() != expected {
        return Err(ExtractError::MalformedRow {
            reason: format!("expected {} fields, found {}", expected, values.len()),
            values,
        });
    }

    let required = |index: usize, what: &str| -> Result<String, ExtractError> {
        values[index].clone().ok_or_else(|| ExtractError::MalformedRow {
            reason: format!("{what} is missing"),
            values: values.clone(),
        })
    };

    let entry = match shape {
        RankEntryShape::World => RankEntry {
            performance: required(0, "performance")?,
            wind: values[WIND_SLOT].clone(),
            athlete_id: required(2, "athlete id")?,
            athlete_name: required(3, "athlete name")?,
            extra: values[4].clone(),
            country: values[5].clone(),
            meet_id: required(6, "meet id")?,
            meet_info: required(7, "meet info")?,
        },
        RankEntryShape::Country => RankEntry {
            performance: required(0, "performance")?,
            wind: values[WIND_SLOT].clone(),
            athlete_id: required(2, "athlete id")?,
            athlete_name: required(3, "athlete name")?,
            extra: None,
            country: None,
            meet_id: required(4, "meet id")?,
            meet_info: required(5, "meet info")?,
        },
    };

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(value: &str) -> String {
        format!(r#"<td><input type="hidden" value="{value}"></td>"#)
    }

    fn world_row(wind: Option<&str>) -> String {
        let mut row = String::from(r#"<tr class="ranktablerow">"#);
        row += &input("7.45");
        if let Some(w) = wind {
            row += &input(w);
        }
        row += &input("1001");
        row += &input("John A. Smith (52)");
        row += &input("91.2%");
        row += &input("USA");
        row += r#"<td><a href="/rankings/meet/?x1=2019&amp;x8=5551">Meet</a></td>"#;
        row += &input("Boston, MA, USA on 05 Jan 19 - 06 Jan 19");
        row += "</tr>";
        row
    }

    fn page(rows: &[String]) -> String {
        format!(
            "<html><body><table><tr class=\"header\"><th>Mark</th></tr>{}</table></body></html>",
            rows.concat()
        )
    }

    #[test]
    fn test_eight_field_row_keeps_its_wind() {
        let entries = extract_page(&page(&[world_row(Some("+1.2"))]), RankEntryShape::World).unwrap();
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.performance, "7.45");
        assert_eq!(e.wind.as_deref(), Some("+1.2"));
        assert_eq!(e.athlete_id, "1001");
        assert_eq!(e.athlete_name, "John A. Smith (52)");
        assert_eq!(e.extra.as_deref(), Some("91.2%"));
        assert_eq!(e.country.as_deref(), Some("USA"));
        assert_eq!(e.meet_id, "5551");
        assert_eq!(e.meet_info, "Boston, MA, USA on 05 Jan 19 - 06 Jan 19");
    }

    #[test]
    fn test_seven_field_row_gets_an_absent_wind() {
        let entries = extract_page(&page(&[world_row(None)]), RankEntryShape::World).unwrap();
        let e = &entries[0];
        assert_eq!(e.wind, None);
        assert_eq!(e.performance, "7.45");
        assert_eq!(e.athlete_id, "1001");
        assert_eq!(e.meet_id, "5551");
    }

    #[test]
    fn test_country_shape_has_six_fields() {
        let row = format!(
            "<tr class=\"ranktablerow\">{}{}{}<td><a href=\"/m?x9=77\">m</a></td>{}</tr>",
            input("12.10"),
            input("2002"),
            input("Mary Jones (61)"),
            input("Eugene, USA on 12 Mar 21"),
        );
        let entries = extract_page(&page(&[row]), RankEntryShape::Country).unwrap();
        let e = &entries[0];
        assert_eq!(e.wind, None);
        assert_eq!(e.athlete_id, "2002");
        assert_eq!(e.meet_id, "77");
        assert_eq!(e.extra, None);
        assert_eq!(e.country, None);
    }

    #[test]
    fn test_rows_outside_the_marker_are_ignored() {
        let html = page(&[
            "<tr class=\"other\"><td><input value=\"x\"></td></tr>".to_string(),
            world_row(Some("0.0")),
            world_row(None),
        ]);
        let entries = extract_page(&html, RankEntryShape::World).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_wrong_field_count_is_malformed() {
        let row = format!("<tr class=\"ranktablerow\">{}{}</tr>", input("7.45"), input("1"));
        match extract_page(&page(&[row]), RankEntryShape::World) {
            Err(ExtractError::MalformedRow { values, .. }) => {
                assert_eq!(values, vec![Some("7.45".to_string()), Some("1".to_string())]);
            }
            other => panic!("expected MalformedRow, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_required_value_is_malformed() {
        let row = world_row(Some("+0.1")).replace(r#"value="1001""#, "");
        assert!(matches!(
            extract_page(&page(&[row]), RankEntryShape::World),
            Err(ExtractError::MalformedRow { .. })
        ));
    }

    #[test]
    fn test_nested_marked_row_fails_loudly() {
        let broken = "<tr class=\"ranktablerow\"><td><input value=\"7.45\"></td>".to_string();
        let html = page(&[broken, world_row(None)]);
        match extract_page(&html, RankEntryShape::World) {
            Err(ExtractError::UnterminatedRow { values }) => {
                assert_eq!(values, vec![Some("7.45".to_string())]);
            }
            other => panic!("expected UnterminatedRow, got {other:?}"),
        }
    }

    #[test]
    fn test_tokenizer_error_aborts_the_page() {
        let html = "<table><tr class=\"ranktablerow\"><input value=\"7.45";
        match extract_page(html, RankEntryShape::World) {
            Err(ExtractError::Markup { message, .. }) => assert!(!message.is_empty()),
            other => panic!("expected Markup, got {other:?}"),
        }
    }

    #[test]
    fn test_row_open_at_end_of_document_fails() {
        let html = "<table><tr class=\"ranktablerow\"><td><input value=\"7.45\"></td>";
        assert!(matches!(
            extract_page(html, RankEntryShape::World),
            Err(ExtractError::UnterminatedRow { .. })
        ));
    }

    #[test]
    fn test_link_id_quirk() {
        assert_eq!(link_id("/rankings/?x1=2019&x8=5551"), "5551");
        assert_eq!(link_id("/rankings/?x9=42"), "42");
        assert_eq!(link_id("/a?x8=5551&x9=42"), "5551&");
        assert_eq!(link_id("/plain/link"), "/plain/link");
        assert_eq!(link_id(""), "");
    }

    #[test]
    fn test_feed_emits_on_row_end_only() {
        let mut extractor = RowExtractor::new(RankEntryShape::Country);
        let tokens: Vec<MarkupToken> = MarkupTokens::new(&format!(
            "<tr class=\"ranktablerow\">{}{}{}{}{}</tr>",
            input("7.45"),
            input("1"),
            input("A B (50)"),
            input("9"),
            input("X, USA on 01 Feb 20"),
        ))
        .map(Result::unwrap)
        .collect();

        let (last, rest) = tokens.split_last().unwrap();
        for token in rest {
            assert!(extractor.feed(token).unwrap().is_none());
        }
        assert!(extractor.feed(last).unwrap().is_some());
        extractor.finish().unwrap();
    }
}
