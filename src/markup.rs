// =============================================================================
// markup.rs — A TAG STREAM OVER A RANKINGS PAGE
// =============================================================================
//
// The row extractor only cares about three things: which tag opened, which
// tag closed, and what attributes the opening tag carried. This module turns
// a page of HTML into exactly that stream of events and nothing more.
//
// We lean on quick-xml in its most forgiving configuration. HTML is not XML,
// but the rankings pages are close enough once you stop insisting that every
// end tag matches its start tag and allow unquoted attributes:
//
//   <tr class=ranktablerow>           -> Start { name: "tr", attrs: [class] }
//   <input type="hidden" value="7.45"> -> Start { name: "input", ... }
//   <input value="7.45" />            -> Start (empty elements are starts too)
//   </tr>                             -> End { name: "tr" }
//
// Text, comments, doctypes and processing instructions never reach the
// extractor.
// =============================================================================

use quick_xml::escape::resolve_html5_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ExtractError;

/// One markup event. Names are lower-cased so callers never worry about
/// `<TR>` vs `<tr>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupToken {
    Start {
        name: String,
        attrs: Vec<(String, Option<String>)>,
    },
    End {
        name: String,
    },
}

impl MarkupToken {
    /// Value of the named attribute on a start tag. `None` when the tag is an
    /// end tag, the attribute is missing, or it carries no value.
    pub fn attr(&self, key: &str) -> Option<&str> {
        match self {
            MarkupToken::Start { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .and_then(|(_, v)| v.as_deref()),
            MarkupToken::End { .. } => None,
        }
    }
}

/// Pull-based token iterator over one page.
pub struct MarkupTokens<'a> {
    reader: Reader<&'a [u8]>,
    finished: bool,
}

impl<'a> MarkupTokens<'a> {
    pub fn new(html: &'a str) -> Self {
        let mut reader = Reader::from_str(html);
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.check_comments = false;
        config.trim_text(true);
        Self {
            reader,
            finished: false,
        }
    }
}

impl Iterator for MarkupTokens<'_> {
    type Item = Result<MarkupToken, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            match self.reader.read_event() {
                Ok(Event::Start(tag)) | Ok(Event::Empty(tag)) => {
                    return Some(Ok(start_token(&tag)));
                }
                Ok(Event::End(tag)) => {
                    return Some(Ok(MarkupToken::End {
                        name: lower_name(tag.name().as_ref()),
                    }));
                }
                Ok(Event::Eof) => {
                    self.finished = true;
                    return None;
                }
                Ok(_) => continue,
                Err(e) => {
                    // The reader does not promise to make progress after an
                    // error, so the stream ends here.
                    self.finished = true;
                    return Some(Err(ExtractError::Markup {
                        position: self.reader.error_position() as u64,
                        message: e.to_string(),
                    }));
                }
            }
        }
    }
}

fn start_token(tag: &BytesStart<'_>) -> MarkupToken {
    let mut attributes = tag.html_attributes();
    attributes.with_checks(false);

    let attrs = attributes
        .filter_map(Result::ok)
        .map(|attr| {
            let key = lower_name(attr.key.as_ref());
            let value = match attr.unescape_value_with(resolve_html5_entity) {
                Ok(v) => v.into_owned(),
                // A bare '&' in an href or an unknown entity name; keep the
                // raw text rather than lose the row.
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            };
            (key, Some(value))
        })
        .collect();

    MarkupToken::Start {
        name: lower_name(tag.name().as_ref()),
        attrs,
    }
}

fn lower_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}
