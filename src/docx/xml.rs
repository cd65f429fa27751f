use quick_xml::errors::IllFormedError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{ExtractError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlEvent {
    Start {
        name: String,
        attrs: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    Empty {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text {
        text: String,
    },
}

#[derive(Clone, Debug)]
pub struct XmlPart {
    pub name: String,
    pub events: Vec<XmlEvent>,
}

/// What to do with elements still open at the end of a part.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseMode {
    /// A truncated part is malformed.
    Strict,
    /// Open elements are closed at the end of input, innermost first.
    Recover,
}

/// Parses a whole part in [`ParseMode::Strict`]. The part must hold one root element and
/// end with every element closed.
pub fn parse_xml_part(name: &str, xml_bytes: &[u8]) -> Result<XmlPart> {
    parse_xml_part_with(name, xml_bytes, ParseMode::Strict)
}

/// Mismatched end tags and a part without a root element are malformed in every mode.
pub fn parse_xml_part_with(name: &str, xml_bytes: &[u8], mode: ParseMode) -> Result<XmlPart> {
    let malformed = |source: quick_xml::Error| ExtractError::MalformedMarkup {
        part: name.to_string(),
        source,
    };

    let mut reader = Reader::from_reader(xml_bytes);
    reader.config_mut().trim_text(false);

    let mut events: Vec<XmlEvent> = Vec::new();
    let mut open: Vec<String> = Vec::new();
    let mut has_root = false;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let ev = reader.read_event_into(&mut buf).map_err(malformed)?;
        match ev {
            Event::Eof => break,
            Event::Start(s) => {
                let tag = bytes_to_string(s.name().as_ref());
                has_root = true;
                open.push(tag.clone());
                events.push(XmlEvent::Start {
                    name: tag,
                    attrs: collect_attrs(&s).map_err(malformed)?,
                });
            }
            Event::End(e) => {
                let _ = open.pop();
                events.push(XmlEvent::End {
                    name: bytes_to_string(e.name().as_ref()),
                });
            }
            Event::Empty(s) => {
                has_root = true;
                events.push(XmlEvent::Empty {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(&s).map_err(malformed)?,
                });
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(malformed)?.into_owned();
                events.push(XmlEvent::Text { text });
            }
            Event::CData(t) => {
                events.push(XmlEvent::Text {
                    text: bytes_to_string(t.into_inner()),
                });
            }
            // Declarations, comments, processing instructions and doctypes carry no
            // document content.
            _ => {}
        }
    }

    if let Some(innermost) = open.last() {
        if mode == ParseMode::Strict {
            return Err(malformed(quick_xml::Error::IllFormed(
                IllFormedError::MissingEndTag(innermost.clone()),
            )));
        }
        tracing::warn!(part = name, open = open.len(), "part ends with open elements");
        while let Some(tag) = open.pop() {
            events.push(XmlEvent::End { name: tag });
        }
    }
    if !has_root {
        return Err(malformed(quick_xml::Error::IllFormed(
            IllFormedError::MissingEndTag(String::new()),
        )));
    }

    Ok(XmlPart {
        name: name.to_string(),
        events,
    })
}

fn collect_attrs(s: &BytesStart<'_>) -> std::result::Result<Vec<(String, String)>, quick_xml::Error> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    for a in s.attributes() {
        let a = a?;
        let key = bytes_to_string(a.key.as_ref());
        let val = a.unescape_value()?.into_owned();
        attrs.push((key, val));
    }
    Ok(attrs)
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

pub fn find_attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}
