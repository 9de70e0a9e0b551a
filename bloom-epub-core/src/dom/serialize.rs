//! XHTML writer for documents

use super::{is_void, Document, Node};
use crate::error::DomError;
use ego_tree::{NodeId, NodeRef};
use quick_xml::escape::partial_escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::Writer;
use std::borrow::Cow;

fn write_err(e: impl std::fmt::Display) -> DomError {
    DomError::Write(e.to_string())
}

/// Attribute values are written double-quoted, so only `"` needs escaping
/// beyond `&`, `<` and `>`. Apostrophes stay literal, keeping `url('a.png')`
/// readable.
fn attribute<'a>(key: &'a str, value: &str) -> Attribute<'a> {
    let escaped = partial_escape(value).replace('"', "&quot;");
    Attribute {
        key: QName(key.as_bytes()),
        value: Cow::Owned(escaped.into_bytes()),
    }
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: NodeRef<'_, Node>) -> Result<(), DomError> {
    match node.value() {
        Node::Document => {
            for child in node.children() {
                write_node(writer, child)?;
            }
        }
        Node::Doctype(doctype) => {
            writer
                .write_event(Event::DocType(BytesText::from_escaped(doctype.as_str())))
                .map_err(write_err)?;
        }
        Node::Element(el) => {
            let mut start = BytesStart::new(el.name.as_str());
            for (key, value) in el.attrs() {
                start.push_attribute(attribute(key, value));
            }
            if !node.has_children() && is_void(&el.name) {
                writer.write_event(Event::Empty(start)).map_err(write_err)?;
            } else {
                // Non-void elements are never self-closed; browsers treat <div/> as an open tag
                writer.write_event(Event::Start(start)).map_err(write_err)?;
                for child in node.children() {
                    write_node(writer, child)?;
                }
                writer
                    .write_event(Event::End(BytesEnd::new(el.name.as_str())))
                    .map_err(write_err)?;
            }
        }
        Node::Text(text) => {
            writer
                .write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))
                .map_err(write_err)?;
        }
        Node::CData(data) => {
            writer
                .write_event(Event::CData(BytesCData::new(data.as_str())))
                .map_err(write_err)?;
        }
        Node::Comment(comment) => {
            writer
                .write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))
                .map_err(write_err)?;
        }
    }
    Ok(())
}

fn into_string(writer: Writer<Vec<u8>>) -> Result<String, DomError> {
    String::from_utf8(writer.into_inner()).map_err(write_err)
}

impl Document {
    /// Serialize the whole document with an XML declaration, as written to `.xhtml` files
    pub fn to_xhtml(&self) -> Result<String, DomError> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(write_err)?;
        writer
            .write_event(Event::Text(BytesText::from_escaped("\n")))
            .map_err(write_err)?;
        write_node(&mut writer, self.tree.root())?;
        into_string(writer)
    }

    /// Serialize the document without a declaration
    pub fn to_markup(&self) -> Result<String, DomError> {
        self.outer_markup(self.root_id())
    }

    /// Serialize one node and its subtree
    pub fn outer_markup(&self, id: NodeId) -> Result<String, DomError> {
        let node = self
            .tree
            .get(id)
            .ok_or_else(|| DomError::MissingElement("node".to_string()))?;
        let mut writer = Writer::new(Vec::new());
        write_node(&mut writer, node)?;
        into_string(writer)
    }
}
