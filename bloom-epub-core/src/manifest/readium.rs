//! Readium web publication manifest (`manifest.json`)

use super::{ManifestModel, PackageMetadata, READIUM_MANIFEST_FILE_NAME};
use crate::error::ManifestError;
use serde::Serialize;

const CONTEXT: &str = "https://readium.org/webpub-manifest/context.jsonld";
const WEBPUB_TYPE: &str = "application/webpub+json";

#[derive(Debug, Serialize)]
struct WebPubManifest<'a> {
    #[serde(rename = "@context")]
    context: &'static str,
    metadata: WebPubMetadata<'a>,
    links: Vec<Link<'a>>,
    #[serde(rename = "readingOrder")]
    reading_order: Vec<Link<'a>>,
    resources: Vec<Link<'a>>,
}

#[derive(Debug, Serialize)]
struct WebPubMetadata<'a> {
    #[serde(rename = "@type")]
    kind: &'static str,
    title: &'a str,
    identifier: String,
    language: &'a str,
    modified: String,
    rendition: Rendition,
    #[serde(rename = "media-overlay", skip_serializing_if = "Option::is_none")]
    media_overlay: Option<MediaOverlay>,
}

#[derive(Debug, Serialize)]
struct Rendition {
    layout: &'static str,
}

#[derive(Debug, Serialize)]
struct MediaOverlay {
    #[serde(rename = "active-class")]
    active_class: &'static str,
}

#[derive(Debug, Serialize)]
struct Link<'a> {
    href: String,
    #[serde(rename = "type")]
    media_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    rel: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<f64>,
}

pub(super) fn write_manifest(
    model: &ManifestModel,
    metadata: &PackageMetadata,
) -> Result<String, ManifestError> {
    let content_link = |href: &str, media_type: &'static str| Link {
        href: format!("content/{}", href),
        media_type,
        rel: None,
        duration: None,
    };

    let mut reading_order = Vec::new();
    for id in model.spine() {
        if let Some(item) = model.item(id) {
            let mut link = content_link(&item.href, item.media_type);
            link.duration = item
                .media_overlay
                .as_deref()
                .and_then(|overlay| model.item(overlay))
                .and_then(|overlay| overlay.duration)
                .map(|d| (d.as_millis() as f64) / 1000.0);
            reading_order.push(link);
        }
    }
    let resources = model
        .items()
        .iter()
        .filter(|item| !model.spine().contains(&item.id))
        .map(|item| content_link(&item.href, item.media_type))
        .collect();

    let manifest = WebPubManifest {
        context: CONTEXT,
        metadata: WebPubMetadata {
            kind: "http://schema.org/Book",
            title: &metadata.title,
            identifier: format!("bloomlibrary.org.{}", metadata.book_id),
            language: &metadata.language,
            modified: metadata.modified.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            rendition: Rendition {
                layout: if metadata.fixed_layout { "fixed" } else { "reflowable" },
            },
            media_overlay: model.has_overlays().then_some(MediaOverlay {
                active_class: "ui-audioCurrent",
            }),
        },
        links: vec![Link {
            href: READIUM_MANIFEST_FILE_NAME.to_string(),
            media_type: WEBPUB_TYPE,
            rel: Some("self"),
            duration: None,
        }],
        reading_order,
        resources,
    };

    serde_json::to_string_pretty(&manifest).map_err(|e| ManifestError::Write(e.to_string()))
}
