//! Conversion of repaired guide markup into the structured record model.
//!
//! Two parse modes share one event walk. The primary mode uses quick-xml's
//! default well-formedness checks; the fallback relaxes end-tag matching for
//! feeds that survive repair with minor structural damage. The fallback runs
//! only when the primary mode raises a parse error.
//!
//! Normalization guarantees: attribute-sourced fields map to `@`-prefixed
//! names, programmes keep source document order, and a lone record still
//! becomes a one-element sequence.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::feed::model::{Channel, FeedDocument, Programme};

/// Errors from the parse/normalize stage. Both variants are terminal for a
/// run: unlike fetching, a parse failure is a data-integrity problem and is
/// never retried internally.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Both the strict and the lenient mode failed. Carries the primary
    /// mode's diagnostic.
    #[error("XML parse error: {0}")]
    Xml(String),

    /// The document parsed but exposes no tv root or no programme records.
    /// An empty result is invalid, not "zero programmes".
    #[error("feed has no tv root element or no programme records")]
    EmptyStructure,
}

/// Which child element's text is currently being captured.
#[derive(Debug, Clone, Copy, PartialEq)]
enum TextField {
    DisplayName,
    Title,
    Desc,
}

/// Parses a guide document, strict mode first, lenient on parse error.
pub fn parse(document: &str) -> Result<FeedDocument, ParseError> {
    let outcome = match parse_mode(document, false) {
        Ok(outcome) => outcome,
        Err(strict_err) => {
            tracing::warn!(error = %strict_err, "Strict parse failed, retrying in lenient mode");
            match parse_mode(document, true) {
                Ok(outcome) => {
                    tracing::info!(
                        programmes = outcome.doc.programmes.len(),
                        "Lenient parse succeeded"
                    );
                    outcome
                }
                Err(lenient_err) => {
                    tracing::error!(error = %lenient_err, "Lenient parse failed as well");
                    return Err(strict_err);
                }
            }
        }
    };

    if !outcome.saw_root || outcome.doc.programmes.is_empty() {
        return Err(ParseError::EmptyStructure);
    }
    Ok(outcome.doc)
}

struct ParseOutcome {
    doc: FeedDocument,
    saw_root: bool,
}

fn parse_mode(document: &str, lenient: bool) -> Result<ParseOutcome, ParseError> {
    let mut reader = Reader::from_str(document);
    reader.config_mut().trim_text(true);
    if lenient {
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
    }

    let mut doc = FeedDocument::default();
    let mut saw_root = false;
    let mut channel: Option<Channel> = None;
    let mut programme: Option<Programme> = None;
    let mut text_field: Option<TextField> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"tv" => saw_root = true,
                b"channel" => channel = Some(channel_from_attributes(&e, &reader)?),
                b"programme" => programme = Some(programme_from_attributes(&e, &reader)?),
                b"display-name" if channel.is_some() => {
                    text_field = Some(TextField::DisplayName)
                }
                b"title" if programme.is_some() => text_field = Some(TextField::Title),
                b"desc" if programme.is_some() => text_field = Some(TextField::Desc),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"tv" => saw_root = true,
                // Self-closing records carry attributes only
                b"channel" => doc.channels.push(channel_from_attributes(&e, &reader)?),
                b"programme" => {
                    doc.programmes.push(programme_from_attributes(&e, &reader)?)
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if let Some(field) = text_field {
                    let text = match t.unescape() {
                        Ok(cow) => cow.into_owned(),
                        Err(e) if lenient => {
                            tracing::warn!(error = %e, "Keeping raw text for unescapable content");
                            reader
                                .decoder()
                                .decode(&t)
                                .map(|cow| cow.into_owned())
                                .unwrap_or_default()
                        }
                        Err(e) => return Err(ParseError::Xml(e.to_string())),
                    };
                    append_text(&mut channel, &mut programme, field, &text);
                }
            }
            Ok(Event::CData(t)) => {
                if let Some(field) = text_field {
                    if let Ok(text) = reader.decoder().decode(&t) {
                        append_text(&mut channel, &mut programme, field, &text);
                    }
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"channel" => {
                    text_field = None;
                    if let Some(c) = channel.take() {
                        doc.channels.push(c);
                    }
                }
                b"programme" => {
                    text_field = None;
                    if let Some(p) = programme.take() {
                        doc.programmes.push(p);
                    }
                }
                _ => text_field = None,
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(ParseOutcome { doc, saw_root })
}

fn append_text(
    channel: &mut Option<Channel>,
    programme: &mut Option<Programme>,
    field: TextField,
    text: &str,
) {
    match field {
        TextField::DisplayName => {
            if let Some(c) = channel.as_mut() {
                c.display_name.push_str(text);
            }
        }
        TextField::Title => {
            if let Some(p) = programme.as_mut() {
                p.title.push_str(text);
            }
        }
        TextField::Desc => {
            if let Some(p) = programme.as_mut() {
                match p.desc.as_mut() {
                    Some(d) => d.push_str(text),
                    None => p.desc = Some(text.to_string()),
                }
            }
        }
    }
}

fn channel_from_attributes(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<Channel, ParseError> {
    let mut id = String::new();
    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed channel attribute");
                continue;
            }
        };
        if attr.key.as_ref() == b"id" {
            id = attr
                .decode_and_unescape_value(reader.decoder())
                .map_err(|e| ParseError::Xml(e.to_string()))?
                .into_owned();
        }
    }
    Ok(Channel {
        id,
        display_name: String::new(),
    })
}

fn programme_from_attributes(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<Programme, ParseError> {
    let mut channel = String::new();
    let mut start = String::new();
    let mut stop = String::new();
    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed programme attribute");
                continue;
            }
        };
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|e| ParseError::Xml(e.to_string()))?;
        match attr.key.as_ref() {
            b"channel" => channel = value.into_owned(),
            b"start" => start = value.into_owned(),
            b"stop" => stop = value.into_owned(),
            _ => {}
        }
    }
    Ok(Programme {
        channel,
        start,
        stop,
        title: String::new(),
        desc: None,
    })
}
