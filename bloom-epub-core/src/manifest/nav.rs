//! `nav.xhtml` navigation document

use super::ManifestModel;
use crate::dom::XmlBuilder;
use crate::error::ManifestError;

const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";
const OPS_NS: &str = "http://www.idpf.org/2007/ops";

/// Table of contents entries: the cover, then the first content page
fn toc_entries(model: &ManifestModel) -> Vec<(&str, &'static str)> {
    let cover = model.cover_page();
    let content = model.first_content_page();
    let mut entries = Vec::new();
    if let Some(cover) = cover {
        if content != Some(cover) {
            entries.push((cover, "Cover"));
        }
    }
    if let Some(content) = content {
        entries.push((content, "Content"));
    }
    entries
}

pub(super) fn write_nav(
    model: &ManifestModel,
    title: &str,
    language: &str,
) -> Result<String, ManifestError> {
    let mut xml = XmlBuilder::new();
    xml.declaration()?;
    xml.doctype("html")?;
    xml.start(
        "html",
        &[("xmlns", XHTML_NS), ("xmlns:epub", OPS_NS), ("lang", language)],
    )?;
    xml.start("head", &[])?;
    xml.empty("meta", &[("charset", "utf-8")])?;
    xml.text_element("title", &[], title)?;
    xml.end("head")?;

    xml.start("body", &[])?;
    xml.start("nav", &[("epub:type", "toc"), ("id", "toc")])?;
    xml.start("ol", &[])?;
    for (href, label) in toc_entries(model) {
        xml.start("li", &[])?;
        xml.text_element("a", &[("href", href)], label)?;
        xml.end("li")?;
    }
    xml.end("ol")?;
    xml.end("nav")?;
    xml.end("body")?;
    xml.end("html")?;
    Ok(xml.finish()?)
}
