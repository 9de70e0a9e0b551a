//! Book metadata read from `meta.json`

use crate::error::StagingError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the metadata file kept next to the book's HTML
pub const META_FILE_NAME: &str = "meta.json";

const COPYRIGHT_PREFIX: &str = "Copyright © ";

/// A Thema subject code with its display label
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Subject {
    /// Thema code, e.g. "YBC"
    pub value: String,

    /// Human readable description
    pub label: String,
}

/// The parts of `meta.json` that end up in the package
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct BookMetadata {
    /// Stable book identifier
    pub book_instance_id: Option<String>,

    /// Title in the book's primary language
    pub title: Option<String>,

    /// Whether the primary language is written right to left
    pub is_rtl: bool,

    /// License code, e.g. "cc-by"
    pub license: Option<String>,

    pub license_notes: Option<String>,

    /// "Copyright © 2021, Holder"
    pub copyright: Option<String>,

    pub credits: Option<String>,

    pub tags: Vec<String>,

    pub page_count: Option<u32>,

    pub summary: Option<String>,

    pub author: Option<String>,

    pub subjects: Vec<Subject>,

    pub isbn: Option<String>,
}

impl BookMetadata {
    /// Read `meta.json` from a book folder. A missing file yields empty metadata.
    pub fn load(book_folder: &Path) -> Result<Self, StagingError> {
        let path = book_folder.join(META_FILE_NAME);
        match std::fs::read_to_string(&path) {
            Ok(data) => Self::from_json(&data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(StagingError::InvalidMetadata(format!("{}: {}", path.display(), e))),
        }
    }

    pub fn from_json(data: &str) -> Result<Self, StagingError> {
        serde_json::from_str(data).map_err(|e| StagingError::InvalidMetadata(e.to_string()))
    }

    /// Year and holder from the copyright statement, when it has the usual form
    pub fn copyright_parts(&self) -> Option<Copyright> {
        self.copyright.as_deref().and_then(parse_copyright)
    }

    /// `dc:subject` values, one per subject code
    pub fn subject_codes(&self) -> Vec<String> {
        self.subjects
            .iter()
            .map(|s| s.value.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()
    }
}

/// Copyright year and rights holder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Copyright {
    pub year: String,
    pub holder: String,
}

/// Split `Copyright © 2021, SIL International` into year and holder.
///
/// The comma is inserted by the license editor and is not localized; statements
/// in any other form are not split.
pub fn parse_copyright(statement: &str) -> Option<Copyright> {
    let rest = statement.strip_prefix(COPYRIGHT_PREFIX)?;
    let (year, holder) = rest.split_once(',')?;
    Some(Copyright {
        year: year.to_string(),
        holder: holder.trim().to_string(),
    })
}
