//! Event-level XML builder for generated package files

use crate::error::DomError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

fn write_err(e: impl std::fmt::Display) -> DomError {
    DomError::Write(e.to_string())
}

/// Writes small XML documents (package, navigation, SMIL) element by element
pub struct XmlBuilder {
    writer: Writer<Vec<u8>>,
}

impl XmlBuilder {
    /// A builder that indents nested elements by two spaces
    pub fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    /// Write `<?xml version="1.0" encoding="utf-8"?>`
    pub fn declaration(&mut self) -> Result<&mut Self, DomError> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(write_err)?;
        Ok(self)
    }

    pub fn doctype(&mut self, doctype: &str) -> Result<&mut Self, DomError> {
        self.writer
            .write_event(Event::DocType(BytesText::from_escaped(doctype)))
            .map_err(write_err)?;
        Ok(self)
    }

    pub fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<&mut Self, DomError> {
        let mut start = BytesStart::new(name);
        for attr in attrs {
            start.push_attribute(*attr);
        }
        self.writer.write_event(Event::Start(start)).map_err(write_err)?;
        Ok(self)
    }

    pub fn end(&mut self, name: &str) -> Result<&mut Self, DomError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(write_err)?;
        Ok(self)
    }

    pub fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<&mut Self, DomError> {
        let mut start = BytesStart::new(name);
        for attr in attrs {
            start.push_attribute(*attr);
        }
        self.writer.write_event(Event::Empty(start)).map_err(write_err)?;
        Ok(self)
    }

    /// `<name attrs>text</name>`
    pub fn text_element(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
        text: &str,
    ) -> Result<&mut Self, DomError> {
        self.start(name, attrs)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(write_err)?;
        self.end(name)
    }

    pub fn finish(self) -> Result<String, DomError> {
        String::from_utf8(self.writer.into_inner()).map_err(write_err)
    }
}

impl Default for XmlBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_elements() {
        let mut xml = XmlBuilder::new();
        xml.start("a", &[("x", "1 & 2")])
            .unwrap()
            .text_element("b", &[], "<hi>")
            .unwrap()
            .empty("c", &[])
            .unwrap()
            .end("a")
            .unwrap();
        let out = xml.finish().unwrap();
        assert!(out.starts_with(r#"<a x="1 &amp; 2">"#));
        assert!(out.contains("<b>&lt;hi&gt;</b>"));
        assert!(out.contains("<c/>"));
        assert!(out.trim_end().ends_with("</a>"));
    }
}
