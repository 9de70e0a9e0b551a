//! Error types for the ePub packaging engine

use thiserror::Error;

/// Result type alias using EpubError
pub type Result<T> = std::result::Result<T, EpubError>;

/// Top-level error type for all staging and saving operations
#[derive(Debug, Error)]
pub enum EpubError {
    #[error("Staging error: {0}")]
    Staging(#[from] StagingError),

    #[error("Markup error: {0}")]
    Dom(#[from] DomError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Visibility check failed: {0}")]
    Visibility(#[from] VisibilityError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EpubError {
    /// Whether a fresh staging attempt may succeed where this one failed.
    ///
    /// Only failures of the rendering surface behind the visibility oracle qualify;
    /// everything else would fail the same way again.
    pub fn is_transient(&self) -> bool {
        matches!(self, EpubError::Visibility(VisibilityError::Navigation(_)))
    }
}

/// Errors that end a staging run
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Could not find or create a thumbnail for the cover page: {0}")]
    MissingCover(String),

    #[error("No book file found in {0}")]
    NoBookFile(String),

    #[error("Invalid book metadata: {0}")]
    InvalidMetadata(String),

    #[error("Could not prepare staging folder: {0}")]
    StagingFolder(String),

    #[error("Book has not been staged")]
    NotStaged,

    #[error("Staging worker failed: {0}")]
    Worker(String),
}

/// Errors that occur while reading or writing markup
#[derive(Debug, Error)]
pub enum DomError {
    #[error("Invalid markup: {0}")]
    Parse(String),

    #[error("Failed to serialize markup: {0}")]
    Write(String),

    #[error("Missing element: {0}")]
    MissingElement(String),
}

/// Errors in the package manifest
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("No media type known for {0}")]
    UnknownMediaType(String),

    #[error("Failed to write package document: {0}")]
    Write(String),
}

impl From<DomError> for ManifestError {
    fn from(err: DomError) -> Self {
        ManifestError::Write(err.to_string())
    }
}

/// Errors that occur while writing the output container
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Zip error: {0}")]
    Zip(String),

    #[error("Tar error: {0}")]
    Tar(String),

    #[error("Invalid entry name: {0}")]
    InvalidEntryName(String),

    #[error("Cannot read {0}")]
    Read(String),
}

/// Errors reported by a visibility oracle
#[derive(Debug, Error)]
pub enum VisibilityError {
    /// The rendering surface failed to load the page; worth retrying
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// The rendering surface is gone for good
    #[error("Renderer unavailable: {0}")]
    Unavailable(String),
}

/// Errors while loading options
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Invalid options file: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_navigation_failures_are_transient() {
        let nav: EpubError = VisibilityError::Navigation("timeout".into()).into();
        let gone: EpubError = VisibilityError::Unavailable("closed".into()).into();
        let cover: EpubError = StagingError::MissingCover("thumbnail.png".into()).into();

        assert!(nav.is_transient());
        assert!(!gone.is_transient());
        assert!(!cover.is_transient());
    }

    #[test]
    fn test_error_messages() {
        let err: EpubError = ManifestError::UnknownMediaType("notes.docx".into()).into();
        assert_eq!(
            err.to_string(),
            "Manifest error: No media type known for notes.docx"
        );
    }
}
