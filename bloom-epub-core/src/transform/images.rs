//! Pictures on a page: sizing for reflowable output, alt text and packaging

use crate::dom::{Document, Element};
use crate::error::Result;
use crate::patterns::{BACKGROUND_IMAGE_RE, PERCENT_WIDTH_RE, PIXEL_HEIGHT_RE, PIXEL_MARGIN_LEFT_RE, PIXEL_WIDTH_RE};
use crate::staging::StagingContext;
use ego_tree::NodeId;
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::path::{Path, PathBuf};

const MM_PER_INCH: f64 = 25.4;
/// Total left and right margin of the margin box, in millimetres
const MARGIN_BOX_MARGIN_MM: f64 = 40.0;
/// In print a CSS pixel is exactly 1/96 inch
const PX_PER_INCH: f64 = 96.0;

const PLACEHOLDER_IMAGE: &str = "placeHolder.png";
const LICENSE_ALT_TEXT: &str = "Image representing the license of this book";
const BRANDING_ALT_TEXT: &str = "Logo of the book sponsors";

/// Where a picture is referenced from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// `img src`
    Src(String),
    /// `background-image: url(...)` in a style attribute
    Background(String),
}

impl ImageRef {
    pub fn url(&self) -> &str {
        match self {
            ImageRef::Src(url) | ImageRef::Background(url) => url,
        }
    }
}

/// Every `img[src]` and background-image element, in document order
pub fn image_elements(doc: &Document) -> Vec<(NodeId, ImageRef)> {
    doc.select_all(|el| {
        (el.is("img") && el.has_attr("src"))
            || el.attr("style").is_some_and(|s| BACKGROUND_IMAGE_RE.is_match(s))
    })
    .into_iter()
    .filter_map(|id| {
        let el = doc.element(id)?;
        if el.is("img") {
            return el.attr("src").map(|src| (id, ImageRef::Src(src.to_string())));
        }
        let style = el.attr("style")?;
        let caps = BACKGROUND_IMAGE_RE.captures(style)?;
        Some((id, ImageRef::Background(caps[1].to_string())))
    })
    .collect()
}

/// Book-relative file of an image url: no query, percent-decoded. `None` when empty.
pub fn image_file_name(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default().trim();
    let name = percent_decode_str(path).decode_utf8_lossy().into_owned();
    (!name.is_empty()).then_some(name)
}

fn is_placeholder(name: &str) -> bool {
    Path::new(name)
        .file_name()
        .is_some_and(|n| n.eq_ignore_ascii_case(PLACEHOLDER_IMAGE))
}

/// Whether the page shows at least one picture that exists and is not the placeholder
pub fn has_real_image(doc: &Document, book_folder: &Path) -> bool {
    image_elements(doc).iter().any(|(_, image)| {
        image_file_name(image.url())
            .filter(|name| !is_placeholder(name))
            .is_some_and(|name| book_folder.join(name).is_file())
    })
}

/// Rewrite a pixel value of `regex`'s property as a percentage of the parent box.
/// `None` when the style has no such pixel value.
fn px_to_percent(regex: &Regex, style: &str, page_width_mm: f64, factor: f64) -> Option<String> {
    let caps = regex.captures(style)?;
    let px: f64 = caps[2].parse().ok()?;
    let inch = px / PX_PER_INCH;
    let margin_box_inch = (page_width_mm - MARGIN_BOX_MARGIN_MM) / MM_PER_INCH;
    let parent_inch = margin_box_inch * factor;
    let percent = (inch / parent_inch * 1000.0).round() / 10.0;
    Some(format!("{}{:.1}%{}", &caps[1], percent, &caps[3]))
}

/// Pictures are `img` elements or background-image containers carrying an inline size
fn is_sized_picture(el: &Element) -> bool {
    let Some(style) = el.attr("style") else {
        return false;
    };
    el.is("img") || el.has_class("bloom-backgroundImage") || BACKGROUND_IMAGE_RE.is_match(style)
}

/// Turn fixed pixel sizes of pictures in the margin box into percentages so they
/// scale with the reader's screen, keeping the aspect ratio.
///
/// `width: 334px` on an A4 portrait page becomes `width: 52.0%`.
pub fn fix_picture_sizes(doc: &mut Document, page_width_mm: f64) {
    for img in doc.select_all(is_sized_picture) {
        let Some(grandparent) = doc.parent(img).and_then(|p| doc.parent(p)) else {
            continue;
        };
        let mut factor = 1.0;
        let mut in_margin_box = false;
        let chain = std::iter::once(grandparent).chain(doc.ancestors(grandparent));
        for ancestor in chain {
            let Some(el) = doc.element(ancestor) else {
                break;
            };
            if el.has_class("marginBox") {
                in_margin_box = true;
                break;
            }
            if let Some(caps) = el.attr("style").and_then(|s| PERCENT_WIDTH_RE.captures(s)) {
                if let Ok(percent) = caps[1].parse::<f64>() {
                    factor *= percent / 100.0;
                }
            }
        }
        if !in_margin_box {
            continue;
        }

        let style = doc
            .element(img)
            .and_then(|el| el.attr("style"))
            .unwrap_or_default()
            .to_string();
        let Some(style) = px_to_percent(&PIXEL_WIDTH_RE, &style, page_width_mm, factor) else {
            continue;
        };
        let mut style = PIXEL_HEIGHT_RE.replace_all(&style, "height:auto").into_owned();
        if !style.contains("height") {
            style = format!("height:auto; {}", style);
        }
        if let Some(converted) = px_to_percent(&PIXEL_MARGIN_LEFT_RE, &style, page_width_mm, factor) {
            style = converted;
        }
        doc.update(img, |el| el.set_attr("style", style));
    }
}

/// Branding pictures carry the `branding` class or sit inside a `data-book`
/// element whose key mentions branding
fn is_branding(doc: &Document, id: NodeId) -> bool {
    if doc.element(id).is_some_and(|el| el.has_class("branding")) {
        return true;
    }
    std::iter::once(id)
        .chain(doc.ancestors(id))
        .filter_map(|a| doc.element(a))
        .any(|el| el.attr("data-book").is_some_and(|key| key.contains("branding")))
}

fn is_placeholder_alt(alt: Option<&str>) -> bool {
    match alt {
        None => true,
        Some(alt) => alt.trim().is_empty() || alt.to_lowercase().contains("placeholder"),
    }
}

/// Text of the image description that follows a picture, in the primary language
fn image_description(doc: &Document, img: NodeId) -> Option<String> {
    let description = doc
        .following_elements(img)
        .into_iter()
        .find(|s| doc.element(*s).is_some_and(|el| el.is("div") && el.class_contains("bloom-imageDescription")))?;
    let content = doc
        .child_elements(description)
        .into_iter()
        .find(|c| doc.element(*c).is_some_and(|el| el.is("div") && el.class_contains("bloom-content1")))?;
    let text = doc.text_content(content).trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// Alt text from image descriptions. Pictures without a description lose their
/// alt attribute so checkers can flag them; decorative ones are marked presentational.
pub fn set_alt_text(doc: &mut Document) {
    for img in doc.select_all(|el| el.is("img") && el.has_attr("src")) {
        let is_license = doc.element(img).is_some_and(|el| el.has_class("licenseImage"));
        if is_license || is_branding(doc, img) {
            let alt = if is_license {
                LICENSE_ALT_TEXT.to_string()
            } else {
                let current = doc.element(img).and_then(|el| el.attr("alt"));
                match current {
                    Some(alt) if !is_placeholder_alt(Some(alt)) => alt.to_string(),
                    _ => BRANDING_ALT_TEXT.to_string(),
                }
            };
            doc.update(img, |el| {
                el.set_attr("alt", alt);
                el.set_attr("role", "presentation");
            });
            continue;
        }

        let parent_hidden = doc
            .parent(img)
            .and_then(|p| doc.element(p))
            .is_some_and(|el| el.attr("aria-hidden") == Some("true"));
        if parent_hidden {
            doc.update(img, |el| el.set_attr("role", "presentation"));
            continue;
        }

        match image_description(doc, img) {
            Some(text) => doc.update(img, |el| el.set_attr("alt", text)),
            None => doc.update(img, |el| {
                el.remove_attr("alt");
            }),
        };
    }
}

/// Copy the page's pictures into the package and point the page at the packaged
/// names. Pictures whose file is missing are removed from the page; empty
/// sources are left alone. Returns the number of pictures packaged.
pub fn copy_images(doc: &mut Document, ctx: &mut StagingContext) -> Result<usize> {
    let mut copied = 0;
    for (id, image) in image_elements(doc) {
        let Some(name) = image_file_name(image.url()) else {
            continue;
        };
        let source: PathBuf = ctx.book_folder().join(&name);
        match ctx.copy_to_staging(&source)? {
            Some(staged) => {
                copied += 1;
                match &image {
                    ImageRef::Src(_) => {
                        doc.update(id, |el| el.set_attr("src", staged));
                    }
                    ImageRef::Background(url) => {
                        let url = url.clone();
                        doc.update(id, |el| {
                            let style = el.attr("style").unwrap_or_default().replace(&url, &staged);
                            el.set_attr("style", style);
                        });
                    }
                }
            }
            None => match image {
                ImageRef::Src(_) => doc.remove(id),
                ImageRef::Background(_) => {
                    doc.update(id, |el| {
                        let style = el.attr("style").unwrap_or_default();
                        let style = BACKGROUND_IMAGE_RE.replace_all(style, "").into_owned();
                        el.set_attr("style", style);
                    });
                }
            },
        }
    }
    Ok(copied)
}
