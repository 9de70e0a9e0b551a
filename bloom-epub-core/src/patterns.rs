//! Cached regex patterns for style and markup rewriting.
//!
//! Compiled once on first use with `LazyLock`.

use regex::Regex;
use std::sync::LazyLock;

/// Characters that are replaced outright in packaged file names
pub static UNSAFE_NAME_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ +%&<>]").unwrap());

/// `direction: rtl;` and `direction: ltr;` declarations in copied stylesheets
pub static DIRECTION_DECL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"direction:\s*(rtl|ltr);").unwrap());

/// `url(...)` references inside inline styles
pub static CSS_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"url\s*\(\s*['"]?([^)'"]*)['"]?\s*\)"#).unwrap());

/// `background-image: url(...)` in an inline style
pub static BACKGROUND_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"background-image\s*:\s*url\s*\(\s*['"]?([^)'"]*)['"]?\s*\)"#).unwrap()
});

/// A percentage width on an ancestor of a picture
pub static PERCENT_WIDTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"width:\s*(\d+(\.\d+)?)%").unwrap());

/// A pixel height in an image style
pub static PIXEL_HEIGHT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"height:\s*\d+px").unwrap());

/// `HeadingN` style classes
pub static HEADING_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bHeading([1-9])\b").unwrap());

/// A pixel `width` in an image style, with the text before and after the number
pub static PIXEL_WIDTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.*width:\s*)(\d+)px(.*)").unwrap());

/// A pixel `margin-left` in an image style, with the text before and after the number
pub static PIXEL_MARGIN_LEFT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.*margin-left:\s*)(\d+)px(.*)").unwrap());

/// Size class of a page: `A5Portrait`, `LetterLandscape` and so on
pub static PAGE_SIZE_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Za-z0-9]+(?:Portrait|Landscape))\b").unwrap()
});
