//! In-memory ePub package manifest
//!
//! Items are accumulated while a book is staged and serialized at the end of the
//! run into `content.opf`, `nav.xhtml` and (optionally) a Readium `manifest.json`.

mod nav;
mod opf;
mod readium;

pub use opf::PackageMetadata;

use crate::error::ManifestError;
use std::time::Duration;

pub const NAV_FILE_NAME: &str = "nav.xhtml";
pub const PACKAGE_FILE_NAME: &str = "content.opf";
pub const READIUM_MANIFEST_FILE_NAME: &str = "manifest.json";

/// Media type for a packaged file, by extension
pub fn media_type_for(file_name: &str) -> Result<&'static str, ManifestError> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "xml" | "xhtml" => Ok("application/xhtml+xml"),
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "gif" => Ok("image/gif"),
        "svg" => Ok("image/svg+xml"),
        "css" => Ok("text/css"),
        "woff" => Ok("application/font-woff"),
        "woff2" => Ok("application/font-woff2"),
        "ttf" | "otf" => Ok("application/vnd.ms-opentype"),
        "smil" => Ok("application/smil+xml"),
        "mp4" => Ok("video/mp4"),
        "mp3" => Ok("audio/mpeg"),
        "wav" => Ok("audio/wav"),
        _ => Err(ManifestError::UnknownMediaType(file_name.to_string())),
    }
}

/// Whether files of this media type are stored without compression in the archive
pub fn is_precompressed(media_type: &str) -> bool {
    media_type.starts_with("image/")
        || media_type.starts_with("audio/")
        || media_type.starts_with("video/")
}

/// Manifest `properties` values used by this packager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemProperty {
    Nav,
    CoverImage,
    Svg,
    Scripted,
}

impl ItemProperty {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemProperty::Nav => "nav",
            ItemProperty::CoverImage => "cover-image",
            ItemProperty::Svg => "svg",
            ItemProperty::Scripted => "scripted",
        }
    }
}

/// One packaged file
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestItem {
    pub id: String,
    /// File name relative to the content folder
    pub href: String,
    pub media_type: &'static str,
    pub properties: Vec<ItemProperty>,
    /// Id of the SMIL overlay narrating this page
    pub media_overlay: Option<String>,
    /// Length of a SMIL overlay
    pub duration: Option<Duration>,
}

impl ManifestItem {
    pub fn new(id: impl Into<String>, href: impl Into<String>, media_type: &'static str) -> Self {
        Self {
            id: id.into(),
            href: href.into(),
            media_type,
            properties: Vec::new(),
            media_overlay: None,
            duration: None,
        }
    }

    pub fn with_property(mut self, property: ItemProperty) -> Self {
        self.add_property(property);
        self
    }

    pub fn add_property(&mut self, property: ItemProperty) {
        if !self.properties.contains(&property) {
            self.properties.push(property);
        }
    }

    /// Space-separated `properties` attribute value, if any
    pub fn properties_value(&self) -> Option<String> {
        if self.properties.is_empty() {
            return None;
        }
        let values: Vec<&str> = self.properties.iter().map(|p| p.as_str()).collect();
        Some(values.join(" "))
    }
}

/// Manifest, spine and navigation state for one package
#[derive(Debug, Clone, Default)]
pub struct ManifestModel {
    items: Vec<ManifestItem>,
    spine: Vec<String>,
    cover_page: Option<String>,
    first_content_page: Option<String>,
    rtl: bool,
}

impl ManifestModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item; ids and hrefs are expected to be unique already
    pub fn add_item(&mut self, item: ManifestItem) {
        self.items.push(item);
    }

    /// Append a content page to the reading order
    pub fn add_to_spine(&mut self, id: impl Into<String>) {
        self.spine.push(id.into());
    }

    pub fn items(&self) -> &[ManifestItem] {
        &self.items
    }

    /// Ids of the spine items in reading order
    pub fn spine(&self) -> &[String] {
        &self.spine
    }

    pub fn item(&self, id: &str) -> Option<&ManifestItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn item_by_href(&self, href: &str) -> Option<&ManifestItem> {
        self.items.iter().find(|item| item.href == href)
    }

    pub fn item_by_href_mut(&mut self, href: &str) -> Option<&mut ManifestItem> {
        self.items.iter_mut().find(|item| item.href == href)
    }

    pub fn contains_href(&self, href: &str) -> bool {
        self.item_by_href(href).is_some()
    }

    /// Page file name of the cover (the first page staged)
    pub fn cover_page(&self) -> Option<&str> {
        self.cover_page.as_deref()
    }

    pub fn set_cover_page(&mut self, href: impl Into<String>) {
        self.cover_page = Some(href.into());
    }

    /// Page file name of the first page that is neither front nor back matter
    pub fn first_content_page(&self) -> Option<&str> {
        self.first_content_page.as_deref()
    }

    pub fn set_first_content_page(&mut self, href: impl Into<String>) {
        self.first_content_page = Some(href.into());
    }

    pub fn set_rtl(&mut self, rtl: bool) {
        self.rtl = rtl;
    }

    pub fn is_rtl(&self) -> bool {
        self.rtl
    }

    /// Sum of all overlay durations
    pub fn total_duration(&self) -> Duration {
        self.items
            .iter()
            .filter_map(|item| item.duration)
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    pub fn has_overlays(&self) -> bool {
        self.items
            .iter()
            .any(|item| item.media_type == "application/smil+xml")
    }

    /// Serialize the package document
    pub fn to_opf(&self, metadata: &PackageMetadata) -> Result<String, ManifestError> {
        opf::write_package(self, metadata)
    }

    /// Serialize the navigation document
    pub fn to_nav(&self, title: &str, language: &str) -> Result<String, ManifestError> {
        nav::write_nav(self, title, language)
    }

    /// Serialize a Readium web publication manifest
    pub fn to_readium_manifest(&self, metadata: &PackageMetadata) -> Result<String, ManifestError> {
        readium::write_manifest(self, metadata)
    }
}

/// `h:mm:ss.fff`, the clock value format used in SMIL files and duration metadata
pub fn format_clock(duration: Duration) -> String {
    let millis = duration.as_millis();
    let hours = millis / 3_600_000;
    let minutes = (millis / 60_000) % 60;
    let seconds = (millis / 1000) % 60;
    let fraction = millis % 1000;
    format!("{}:{:02}:{:02}.{:03}", hours, minutes, seconds, fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_types() {
        assert_eq!(media_type_for("1.xhtml").unwrap(), "application/xhtml+xml");
        assert_eq!(media_type_for("PIC.JPG").unwrap(), "image/jpeg");
        assert_eq!(media_type_for("Andika.ttf").unwrap(), "application/vnd.ms-opentype");
        assert_eq!(media_type_for("1_overlay.smil").unwrap(), "application/smil+xml");
        assert_eq!(media_type_for("i1.mp3").unwrap(), "audio/mpeg");
        assert!(matches!(
            media_type_for("notes.docx"),
            Err(ManifestError::UnknownMediaType(_))
        ));
        assert!(media_type_for("noextension").is_err());
    }

    #[test]
    fn test_precompressed_media() {
        assert!(is_precompressed("image/png"));
        assert!(is_precompressed("audio/mpeg"));
        assert!(!is_precompressed("text/css"));
        assert!(!is_precompressed("application/xhtml+xml"));
    }

    #[test]
    fn test_properties_value() {
        let item = ManifestItem::new("f1", "1.xhtml", "application/xhtml+xml")
            .with_property(ItemProperty::Scripted)
            .with_property(ItemProperty::Svg)
            .with_property(ItemProperty::Svg);
        assert_eq!(item.properties_value().as_deref(), Some("scripted svg"));
    }

    #[test]
    fn test_total_duration() {
        let mut model = ManifestModel::new();
        let mut a = ManifestItem::new("f1_overlay", "1_overlay.smil", "application/smil+xml");
        a.duration = Some(Duration::from_millis(1500));
        let mut b = ManifestItem::new("f2_overlay", "2_overlay.smil", "application/smil+xml");
        b.duration = Some(Duration::from_millis(2250));
        model.add_item(a);
        model.add_item(b);
        assert_eq!(model.total_duration(), Duration::from_millis(3750));
        assert!(model.has_overlays());
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(Duration::from_millis(1500)), "0:00:01.500");
        assert_eq!(format_clock(Duration::from_secs(3725)), "1:02:05.000");
    }
}
