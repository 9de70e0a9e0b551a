//! Page size and orientation from a page's size class

use crate::patterns::PAGE_SIZE_CLASS_RE;
use std::fmt;

const MM_PER_INCH: f64 = 25.4;

/// A page size class such as `A5Portrait` or `LetterLandscape`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSize {
    class: String,
}

impl Default for PageSize {
    fn default() -> Self {
        Self {
            class: "A5Portrait".to_string(),
        }
    }
}

impl PageSize {
    pub fn new(class: impl Into<String>) -> Self {
        Self { class: class.into() }
    }

    /// The first size class in a `class` attribute value
    pub fn from_classes(classes: &str) -> Option<Self> {
        PAGE_SIZE_CLASS_RE
            .captures(classes)
            .map(|caps| Self::new(&caps[1]))
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn is_landscape(&self) -> bool {
        self.class.ends_with("Landscape")
    }

    /// Size without orientation: `A5`, `HalfLetter`
    pub fn name(&self) -> &str {
        self.class
            .strip_suffix("Landscape")
            .or_else(|| self.class.strip_suffix("Portrait"))
            .unwrap_or(&self.class)
    }

    /// Printed page width in millimetres. Unknown sizes count as 210mm.
    pub fn width_mm(&self) -> f64 {
        const A4_WIDTH: f64 = 210.0;
        const A4_HEIGHT: f64 = 297.0;
        const LETTER_WIDTH: f64 = 8.5 * MM_PER_INCH;
        const LETTER_HEIGHT: f64 = 11.0 * MM_PER_INCH;
        const LEGAL_HEIGHT: f64 = 14.0 * MM_PER_INCH;

        match self.class.as_str() {
            "A5Portrait" | "A6Landscape" => A4_HEIGHT / 2.0,
            "A4Portrait" => A4_WIDTH,
            "A5Landscape" | "A6Portrait" => A4_WIDTH / 2.0,
            "A4Landscape" => A4_HEIGHT,
            "A3Portrait" | "A3Landscape" => A4_WIDTH * 2.0,
            "B5Portrait" => 176.0,
            "QuarterLetterPortrait" => LETTER_WIDTH / 2.0,
            "QuarterLetterLandscape" | "HalfLetterPortrait" => LETTER_HEIGHT / 2.0,
            "HalfLetterLandscape" | "LetterPortrait" => LETTER_WIDTH,
            "LetterLandscape" => LETTER_HEIGHT,
            "HalfLegalPortrait" => LEGAL_HEIGHT / 2.0,
            "HalfLegalLandscape" | "LegalPortrait" => LETTER_WIDTH,
            "LegalLandscape" => LEGAL_HEIGHT,
            _ => A4_WIDTH,
        }
    }

    /// Oriented (width, height) of the sheet in millimetres. Unknown sizes count
    /// as A5 portrait.
    pub fn dimensions_mm(&self) -> (f64, f64) {
        let (short, long) = match self.name() {
            "A3" => (297.0, 420.0),
            "A4" => (210.0, 297.0),
            "A5" => (148.5, 210.0),
            "A6" => (105.0, 148.5),
            "B5" => (176.0, 250.0),
            "QuarterLetter" => (4.25 * MM_PER_INCH, 5.5 * MM_PER_INCH),
            "HalfLetter" => (5.5 * MM_PER_INCH, 8.5 * MM_PER_INCH),
            "Letter" => (8.5 * MM_PER_INCH, 11.0 * MM_PER_INCH),
            "HalfLegal" => (7.0 * MM_PER_INCH, 8.5 * MM_PER_INCH),
            "Legal" => (8.5 * MM_PER_INCH, 14.0 * MM_PER_INCH),
            _ => return (148.5, 210.0),
        };
        if self.is_landscape() {
            (long, short)
        } else {
            (short, long)
        }
    }
}

impl fmt::Display for PageSize {
    /// `A5 Portrait`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let orientation = if self.is_landscape() { "Landscape" } else { "Portrait" };
        write!(f, "{} {}", self.name(), orientation)
    }
}
