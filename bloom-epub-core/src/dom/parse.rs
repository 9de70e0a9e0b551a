//! Lenient XHTML reader built on quick-xml

use super::{is_void, Document, Element, Node};
use crate::error::DomError;
use ego_tree::NodeId;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;

/// Named entities that show up in Bloom books besides the XML built-ins
const HTML_ENTITIES: &[(&str, &str)] = &[
    ("nbsp", "\u{a0}"),
    ("copy", "\u{a9}"),
    ("reg", "\u{ae}"),
    ("trade", "\u{2122}"),
    ("ndash", "\u{2013}"),
    ("mdash", "\u{2014}"),
    ("hellip", "\u{2026}"),
    ("lsquo", "\u{2018}"),
    ("rsquo", "\u{2019}"),
    ("ldquo", "\u{201c}"),
    ("rdquo", "\u{201d}"),
    ("laquo", "\u{ab}"),
    ("raquo", "\u{bb}"),
    ("zwj", "\u{200d}"),
    ("zwnj", "\u{200c}"),
    ("shy", "\u{ad}"),
];

fn resolve_entity(name: &str) -> Option<&'static str> {
    match name {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        _ => HTML_ENTITIES
            .iter()
            .find(|(entity, _)| *entity == name)
            .map(|(_, value)| *value),
    }
}

fn element_from(start: &BytesStart<'_>) -> Element {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    // html_attributes tolerates valueless and unquoted attributes
    for attr in start.html_attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = match attr.unescape_value_with(resolve_entity) {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        element.set_attr(key, value);
    }
    element
}

impl Document {
    /// Parse XHTML (or reasonably well-formed HTML) into a document.
    ///
    /// Void elements never take children, and mismatched end tags close back to the
    /// nearest open element of the same name instead of failing.
    pub fn parse(markup: &str) -> Result<Self, DomError> {
        let mut reader = Reader::from_str(markup);
        {
            let config = reader.config_mut();
            config.trim_text(false);
            config.check_end_names = false;
            config.expand_empty_elements = false;
        }

        let mut doc = Document::new();
        let mut open: Vec<(NodeId, String)> = vec![(doc.root_id(), String::new())];

        loop {
            let parent = open.last().map(|(id, _)| *id).unwrap_or(doc.root_id());
            match reader.read_event() {
                Ok(Event::Start(start)) => {
                    let element = element_from(&start);
                    let name = element.name.clone();
                    let id = doc
                        .append_element(parent, element)
                        .ok_or_else(|| DomError::Parse("lost parent node".to_string()))?;
                    if !is_void(&name) {
                        open.push((id, name));
                    }
                }
                Ok(Event::Empty(start)) => {
                    doc.append_element(parent, element_from(&start));
                }
                Ok(Event::End(end)) => {
                    let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                    if is_void(&name) {
                        continue;
                    }
                    if let Some(pos) = open.iter().rposition(|(_, n)| n.eq_ignore_ascii_case(&name)) {
                        if pos > 0 {
                            open.truncate(pos);
                        }
                    }
                }
                Ok(Event::Text(text)) => {
                    let value = match text.unescape_with(resolve_entity) {
                        Ok(value) => value,
                        Err(_) => Cow::Owned(String::from_utf8_lossy(&text).into_owned()),
                    };
                    if !value.is_empty() {
                        doc.append(parent, Node::Text(value.into_owned()));
                    }
                }
                Ok(Event::CData(data)) => {
                    doc.append(parent, Node::CData(String::from_utf8_lossy(&data).into_owned()));
                }
                Ok(Event::Comment(comment)) => {
                    doc.append(parent, Node::Comment(String::from_utf8_lossy(&comment).into_owned()));
                }
                Ok(Event::DocType(doctype)) => {
                    let value = String::from_utf8_lossy(&doctype).trim().to_string();
                    doc.append(parent, Node::Doctype(value));
                }
                Ok(Event::Decl(_)) | Ok(Event::PI(_)) => {}
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(DomError::Parse(format!(
                        "at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
            }
        }

        Ok(doc)
    }
}
