//! `content.opf` package document

use super::{format_clock, ManifestModel};
use crate::dom::XmlBuilder;
use crate::error::ManifestError;
use chrono::{DateTime, Utc};

const OPF_NS: &str = "http://www.idpf.org/2007/opf";
const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
const PREFIXES: &str = "a11y: http://www.idpf.org/epub/vocab/package/a11y/# epub32: https://w3c.github.io/publ-epub-revision/epub32/spec/epub-packages.html#";
const RENDITION_PREFIX: &str = " rendition: http://www.idpf.org/vocab/rendition/#";
const ACCESSIBILITY_SUMMARY: &str =
    "How well the accessibility features work is up to the individual author.";

/// Book-level facts written into the package metadata
#[derive(Debug, Clone, PartialEq)]
pub struct PackageMetadata {
    pub book_id: String,
    pub title: String,
    pub language: String,
    /// `dc:source`, e.g. "created from Bloom book on 2024-05-01 with page size A5 Portrait"
    pub source: String,
    pub isbn: Option<String>,
    pub creator: Option<String>,
    pub description: Option<String>,
    pub license_url: Option<String>,
    pub subjects: Vec<String>,
    pub modified: DateTime<Utc>,
    pub copyright_year: Option<String>,
    pub copyright_holder: Option<String>,
    pub page_count: usize,
    pub fixed_layout: bool,
    pub landscape: bool,
    pub has_images: bool,
    pub has_audio: bool,
    /// Every text element has narration
    pub full_audio: bool,
    /// Manifest href of the cover image
    pub cover_image: Option<String>,
}

impl PackageMetadata {
    pub fn new(book_id: impl Into<String>, title: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            book_id: book_id.into(),
            title: title.into(),
            language: language.into(),
            source: String::new(),
            isbn: None,
            creator: None,
            description: None,
            license_url: None,
            subjects: Vec::new(),
            modified: Utc::now(),
            copyright_year: None,
            copyright_holder: None,
            page_count: 0,
            fixed_layout: false,
            landscape: false,
            has_images: false,
            has_audio: false,
            full_audio: false,
            cover_image: None,
        }
    }

    fn unique_identifier(&self) -> String {
        format!("I{}", self.book_id)
    }
}

fn meta(xml: &mut XmlBuilder, property: &str, value: &str) -> Result<(), ManifestError> {
    xml.text_element("meta", &[("property", property)], value)?;
    Ok(())
}

fn write_accessibility(xml: &mut XmlBuilder, metadata: &PackageMetadata) -> Result<(), ManifestError> {
    meta(xml, "schema:accessMode", "textual")?;
    if metadata.has_images {
        meta(xml, "schema:accessMode", "visual")?;
    }
    if metadata.has_audio {
        meta(xml, "schema:accessMode", "auditory")?;
    }

    meta(xml, "schema:accessModeSufficient", "textual")?;
    if metadata.has_images {
        meta(xml, "schema:accessModeSufficient", "textual,visual")?;
    }
    if metadata.has_audio {
        if metadata.full_audio {
            meta(xml, "schema:accessModeSufficient", "auditory")?;
        }
        meta(xml, "schema:accessModeSufficient", "textual,auditory")?;
    }
    if metadata.has_images && metadata.has_audio {
        meta(xml, "schema:accessModeSufficient", "textual,visual,auditory")?;
    }

    if metadata.has_audio {
        meta(xml, "schema:accessibilityFeature", "synchronizedAudioText")?;
    }
    for feature in ["displayTransformability", "printPageNumbers", "unlocked", "readingOrder", "tableOfContents"] {
        meta(xml, "schema:accessibilityFeature", feature)?;
    }
    meta(xml, "schema:accessibilityHazard", "unknown")?;
    meta(xml, "schema:accessibilitySummary", ACCESSIBILITY_SUMMARY)?;
    Ok(())
}

fn write_metadata(
    xml: &mut XmlBuilder,
    model: &ManifestModel,
    metadata: &PackageMetadata,
) -> Result<(), ManifestError> {
    xml.start("metadata", &[("xmlns:dc", DC_NS), ("xmlns:opf", OPF_NS)])?;
    xml.text_element("dc:title", &[], &metadata.title)?;
    xml.text_element("dc:language", &[], &metadata.language)?;
    let identifier = format!("bloomlibrary.org.{}", metadata.book_id);
    let unique_identifier = metadata.unique_identifier();
    xml.text_element("dc:identifier", &[("id", unique_identifier.as_str())], &identifier)?;
    xml.text_element("dc:source", &[], &metadata.source)?;
    if let Some(isbn) = metadata.isbn.as_deref().filter(|i| !i.is_empty()) {
        xml.text_element("dc:identifier", &[], &format!("urn:isbn:{}", isbn))?;
    }
    if let Some(creator) = metadata.creator.as_deref().filter(|c| !c.is_empty()) {
        xml.text_element("dc:creator", &[("id", "author")], creator)?;
    }
    if let Some(description) = metadata.description.as_deref().filter(|d| !d.is_empty()) {
        xml.text_element("dc:description", &[], description)?;
    }
    let rights = metadata
        .license_url
        .as_deref()
        .filter(|url| !url.is_empty())
        .unwrap_or("All Rights Reserved");
    xml.text_element("dc:rights", &[], rights)?;
    for subject in &metadata.subjects {
        xml.text_element("dc:subject", &[], subject)?;
    }

    let modified = metadata.modified.format("%Y-%m-%dT%H:%M:%SZ").to_string();
    meta(xml, "dcterms:modified", &modified)?;
    if let Some(year) = &metadata.copyright_year {
        meta(xml, "dcterms:dateCopyrighted", year)?;
    }
    if let Some(holder) = &metadata.copyright_holder {
        meta(xml, "dcterms:rightsHolder", holder)?;
    }
    meta(xml, "schema:numberOfPages", &metadata.page_count.to_string())?;
    write_accessibility(xml, metadata)?;

    if let Some(cover) = &metadata.cover_image {
        let stem = cover.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(cover);
        xml.empty("meta", &[("name", "cover"), ("content", stem)])?;
    }
    if metadata.fixed_layout {
        meta(xml, "rendition:layout", "pre-paginated")?;
        if metadata.landscape {
            meta(xml, "rendition:orientation", "landscape")?;
            meta(xml, "rendition:spread", "none")?;
        }
    }

    // One duration per overlay, then the book total
    for item in model.items() {
        if let Some(duration) = item.duration {
            let refines = format!("#{}", item.id);
            xml.text_element(
                "meta",
                &[("property", "media:duration"), ("refines", refines.as_str())],
                &format_clock(duration),
            )?;
        }
    }
    let total = model.total_duration();
    if !total.is_zero() {
        meta(xml, "media:duration", &format_clock(total))?;
    }
    if model.has_overlays() {
        meta(xml, "media:active-class", "ui-audioCurrent")?;
    }

    xml.end("metadata")?;
    Ok(())
}

pub(super) fn write_package(
    model: &ManifestModel,
    metadata: &PackageMetadata,
) -> Result<String, ManifestError> {
    let mut xml = XmlBuilder::new();
    xml.declaration()?;

    let mut prefixes = PREFIXES.to_string();
    if metadata.fixed_layout {
        prefixes.push_str(RENDITION_PREFIX);
    }
    let unique_identifier = metadata.unique_identifier();
    xml.start(
        "package",
        &[
            ("xmlns", OPF_NS),
            ("version", "3.0"),
            ("unique-identifier", unique_identifier.as_str()),
            ("prefix", prefixes.as_str()),
        ],
    )?;

    write_metadata(&mut xml, model, metadata)?;

    xml.start("manifest", &[])?;
    for item in model.items() {
        let properties = item.properties_value();
        let mut attrs = vec![
            ("id", item.id.as_str()),
            ("href", item.href.as_str()),
            ("media-type", item.media_type),
        ];
        if let Some(properties) = properties.as_deref() {
            attrs.push(("properties", properties));
        }
        if let Some(overlay) = item.media_overlay.as_deref() {
            attrs.push(("media-overlay", overlay));
        }
        xml.empty("item", &attrs)?;
    }
    xml.end("manifest")?;

    if model.is_rtl() {
        xml.start("spine", &[("page-progression-direction", "rtl")])?;
    } else {
        xml.start("spine", &[])?;
    }
    for id in model.spine() {
        xml.empty("itemref", &[("idref", id.as_str())])?;
    }
    xml.end("spine")?;

    xml.end("package")?;
    Ok(xml.finish()?)
}
