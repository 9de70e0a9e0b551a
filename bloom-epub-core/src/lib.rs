//! Bloom ePub Core Library
//!
//! This crate turns a Bloom book folder (one HTML file plus images, audio and
//! stylesheets) into an ePub 3 package. Each page of the book becomes its own
//! XHTML content document; pictures, fonts and narration are copied into the
//! package once each and described in `content.opf`.

pub mod archive;
pub mod assembler;
pub mod audio;
pub mod config;
pub mod dom;
pub mod error;
pub mod fonts;
pub mod manifest;
pub mod progress;
pub mod staging;
pub mod stylesheet;
pub mod transform;
pub mod types;
pub mod visibility;

mod patterns;

pub use assembler::{
    Collaborators, CoverThumbnailer, EpubAssembler, FolderThumbnailer, PublishSession, StageOutcome,
    StagedBook,
};
pub use config::{EpubOptions, LayoutMode};
pub use error::{EpubError, Result, StagingError};
pub use progress::{AbortFlag, NullProgress, ProgressSink, TracingProgress};
pub use types::{Book, BookMetadata, PageSize};
