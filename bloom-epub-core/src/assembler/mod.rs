//! Staging a whole book into an ePub folder and saving it as an `.epub`.
//!
//! [`EpubAssembler`] drives one staging run: pages in book order, the cover,
//! embedded fonts, navigation and the package document, which is written last
//! so a folder without `content.opf` is never mistaken for a finished stage.
//! [`PublishSession`] wraps the assembler in the preview/save state machine.

mod font_faces;
mod hash;
mod session;

pub use font_faces::{embed_fonts, font_face_rule, FontReport};
pub use hash::content_hash;
pub use session::{PreviewStatus, PublishSession, SaveStatus, SessionPhase};

use crate::archive::{write_epub, EPUB_MIMETYPE, MIMETYPE_FILE_NAME};
use crate::audio::{audio_sentence_ids, AudioResolver, FolderAudioResolver};
use crate::config::EpubOptions;
use crate::dom::XmlBuilder;
use crate::error::{EpubError, Result, StagingError};
use crate::fonts::FontCatalog;
use crate::manifest::{
    ItemProperty, PackageMetadata, NAV_FILE_NAME, PACKAGE_FILE_NAME, READIUM_MANIFEST_FILE_NAME,
};
use crate::progress::{AbortFlag, ProgressSink, TracingProgress};
use crate::staging::names::adjusted_file_name;
use crate::staging::{StagingContext, CONTENT_FOLDER};
use crate::transform::{PageOutcome, PageTransformer};
use crate::types::{parse_copyright, Book};
use crate::visibility::{CssDisplayOracle, VisibilityOracle};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Staging attempts made before a transient failure is reported
const MAX_ATTEMPTS: usize = 3;

const EPUB_THUMBNAIL: &str = "epub-thumbnail.png";
const THUMBNAIL: &str = "thumbnail.png";
const COVER_THUMBNAIL_SIZE: u32 = 256;
const CONTAINER_FILE: &str = "META-INF/container.xml";
const CONTAINER_NS: &str = "urn:oasis:names:tc:opendocument:xmlns:container";

/// Produces a cover image for books that do not ship an ePub thumbnail
pub trait CoverThumbnailer: Send + Sync {
    fn make_cover_thumbnail(&self, book: &Book, size: u32) -> Result<PathBuf>;
}

/// Uses the `thumbnail-{size}.png` the editor leaves in the book folder
#[derive(Debug, Default, Clone, Copy)]
pub struct FolderThumbnailer;

impl CoverThumbnailer for FolderThumbnailer {
    fn make_cover_thumbnail(&self, book: &Book, size: u32) -> Result<PathBuf> {
        let path = book.folder().join(format!("thumbnail-{}.png", size));
        if path.is_file() {
            Ok(path)
        } else {
            Err(StagingError::MissingCover(path.display().to_string()).into())
        }
    }
}

/// The services a staging run consults. Cloning shares them.
#[derive(Clone)]
pub struct Collaborators {
    pub oracle: Arc<dyn VisibilityOracle>,
    pub audio: Arc<dyn AudioResolver>,
    pub thumbnailer: Arc<dyn CoverThumbnailer>,
    pub progress: Arc<dyn ProgressSink>,
    pub fonts: Arc<FontCatalog>,
}

impl Collaborators {
    /// Folder-based audio and thumbnails, tracing progress and an empty font catalog
    pub fn new(oracle: Arc<dyn VisibilityOracle>) -> Self {
        Self {
            oracle,
            audio: Arc::new(FolderAudioResolver),
            thumbnailer: Arc::new(FolderThumbnailer),
            progress: Arc::new(TracingProgress),
            fonts: Arc::new(FontCatalog::default()),
        }
    }

    /// Everything needed to stage without a browser: CSS-evaluated visibility over
    /// the book folder and support folders, and fonts scanned per `options`
    pub fn headless(book_folder: &Path, options: &EpubOptions) -> Self {
        let mut search_dirs = vec![book_folder.to_path_buf()];
        search_dirs.extend(options.support_dirs.iter().cloned());
        Self::new(Arc::new(CssDisplayOracle::new(search_dirs)))
            .with_fonts(Arc::new(FontCatalog::from_options(options)))
    }

    pub fn with_audio(mut self, audio: Arc<dyn AudioResolver>) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_thumbnailer(mut self, thumbnailer: Arc<dyn CoverThumbnailer>) -> Self {
        self.thumbnailer = thumbnailer;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_fonts(mut self, fonts: Arc<FontCatalog>) -> Self {
        self.fonts = fonts;
        self
    }
}

/// A completed staging folder
#[derive(Debug, Clone, PartialEq)]
pub struct StagedBook {
    pub staging_dir: PathBuf,
    /// Content documents written
    pub pages: usize,
    /// Labels of pages left out
    pub omitted_pages: Vec<String>,
    pub fonts: FontReport,
    pub has_audio: bool,
}

impl StagedBook {
    pub fn package_path(&self) -> PathBuf {
        self.staging_dir.join(CONTENT_FOLDER).join(PACKAGE_FILE_NAME)
    }
}

/// How a staging run ended
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Staged(StagedBook),
    /// The abort flag was set; the folder is incomplete
    Aborted,
}

/// Result of one attempt, deciding whether another is worth making
enum Attempt {
    Done(StageOutcome),
    Retry(EpubError),
    Fatal(EpubError),
}

/// Stages books and saves staged folders
pub struct EpubAssembler {
    options: EpubOptions,
    collaborators: Collaborators,
    abort: AbortFlag,
}

impl EpubAssembler {
    pub fn new(options: EpubOptions, collaborators: Collaborators) -> Self {
        Self {
            options,
            collaborators,
            abort: AbortFlag::new(),
        }
    }

    /// Share an existing abort flag instead of the assembler's own
    pub fn with_abort_flag(mut self, abort: AbortFlag) -> Self {
        self.abort = abort;
        self
    }

    pub fn options(&self) -> &EpubOptions {
        &self.options
    }

    /// The flag checked between pages; set it from any thread to stop a run
    pub fn abort_flag(&self) -> &AbortFlag {
        &self.abort
    }

    /// Folder a book is staged into
    pub fn staging_dir_for(&self, book: &Book) -> PathBuf {
        self.options.staging_root.join(adjusted_file_name(&book.id))
    }

    /// Stage `book`, retrying when the visibility oracle fails transiently
    pub fn stage_with_retry(&self, book: &Book) -> Result<StageOutcome> {
        let mut attempt = 1;
        loop {
            match self.attempt(book) {
                Attempt::Done(outcome) => return Ok(outcome),
                Attempt::Retry(err) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!("Staging attempt {} failed: {}", attempt, err);
                    self.collaborators
                        .progress
                        .message("Something went wrong while preparing the book, retrying");
                    attempt += 1;
                }
                Attempt::Retry(err) | Attempt::Fatal(err) => return Err(err),
            }
        }
    }

    fn attempt(&self, book: &Book) -> Attempt {
        match self.stage(book) {
            Ok(outcome) => Attempt::Done(outcome),
            Err(err) if err.is_transient() => Attempt::Retry(err),
            Err(err) => Attempt::Fatal(err),
        }
    }

    /// One staging run into a freshly created folder
    pub fn stage(&self, book: &Book) -> Result<StageOutcome> {
        let staging_dir = self.staging_dir_for(book);
        let mut ctx = StagingContext::create(book.folder(), &staging_dir, self.options.support_dirs.clone())?;
        ctx.manifest_mut().set_rtl(book.is_rtl());
        tracing::info!("Staging '{}' into {}", book.title(), staging_dir.display());
        self.collaborators
            .progress
            .message(&format!("Preparing {}", book.title()));

        let mut transformer = PageTransformer::new(
            book,
            &self.options,
            self.collaborators.oracle.as_ref(),
            self.collaborators.audio.as_ref(),
        );
        let mut sentence_ids = Vec::new();
        for page in book.pages() {
            if self.abort.is_set() {
                tracing::info!("Staging of '{}' aborted", book.title());
                return Ok(StageOutcome::Aborted);
            }
            if let PageOutcome::Page(unit) = transformer.transform(page, &mut ctx)? {
                sentence_ids.extend(audio_sentence_ids(&unit.document));
            }
        }

        let cover = self.stage_cover(book, &mut ctx)?;
        let fonts = embed_fonts(&mut ctx, &self.collaborators.fonts, &self.options.default_font)?;
        if self.abort.is_set() {
            tracing::info!("Staging of '{}' aborted", book.title());
            return Ok(StageOutcome::Aborted);
        }

        let nav = ctx.manifest().to_nav(book.title(), book.language())?;
        ctx.write_content(NAV_FILE_NAME, &nav)?;
        if let Some(item) = ctx.manifest_mut().item_by_href_mut(NAV_FILE_NAME) {
            item.add_property(ItemProperty::Nav);
        }
        ctx.write_outside_content(MIMETYPE_FILE_NAME, EPUB_MIMETYPE)?;
        ctx.write_outside_content(CONTAINER_FILE, &container_xml()?)?;

        let metadata = self.package_metadata(book, &ctx, cover, transformer.pages_written(), &sentence_ids);
        if self.options.readium_manifest {
            let readium = ctx.manifest().to_readium_manifest(&metadata)?;
            ctx.write_outside_content(READIUM_MANIFEST_FILE_NAME, &readium)?;
        }
        let opf = ctx.manifest().to_opf(&metadata)?;
        std::fs::write(ctx.content_dir().join(PACKAGE_FILE_NAME), opf)?;

        let staged = StagedBook {
            staging_dir,
            pages: transformer.pages_written(),
            omitted_pages: ctx.omitted_pages().to_vec(),
            fonts,
            has_audio: metadata.has_audio,
        };
        tracing::info!(
            "Staged '{}': {} pages, {} files copied",
            book.title(),
            staged.pages,
            ctx.copied_count()
        );
        Ok(StageOutcome::Staged(staged))
    }

    /// Zip a staged folder into `destination`
    pub fn save(&self, staged: &StagedBook, destination: &Path) -> Result<()> {
        if !staged.package_path().is_file() {
            return Err(StagingError::NotStaged.into());
        }
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        write_epub(&staged.staging_dir, destination, self.options.compress)?;
        tracing::info!("Saved {}", destination.display());
        self.collaborators
            .progress
            .message(&format!("Saved {}", destination.display()));
        Ok(())
    }

    /// Stage and, when the run completes, save to `destination`
    pub fn publish(&self, book: &Book, destination: &Path) -> Result<StageOutcome> {
        let outcome = self.stage_with_retry(book)?;
        if let StageOutcome::Staged(staged) = &outcome {
            self.save(staged, destination)?;
        }
        Ok(outcome)
    }

    /// The book's own ePub thumbnail, else a generated cover, else the plain thumbnail
    fn cover_source(&self, book: &Book) -> Result<PathBuf> {
        let epub_thumbnail = book.folder().join(EPUB_THUMBNAIL);
        if epub_thumbnail.is_file() {
            return Ok(epub_thumbnail);
        }
        match self
            .collaborators
            .thumbnailer
            .make_cover_thumbnail(book, COVER_THUMBNAIL_SIZE)
        {
            Ok(path) if path.is_file() => return Ok(path),
            Ok(path) => tracing::warn!("Cover thumbnail {} was not created", path.display()),
            Err(e) => tracing::warn!("Could not make a cover thumbnail: {}", e),
        }
        let thumbnail = book.folder().join(THUMBNAIL);
        if thumbnail.is_file() {
            Ok(thumbnail)
        } else {
            Err(StagingError::MissingCover(book.title().to_string()).into())
        }
    }

    fn stage_cover(&self, book: &Book, ctx: &mut StagingContext) -> Result<String> {
        let source = self.cover_source(book)?;
        let name = ctx
            .copy_to_staging(&source)?
            .ok_or_else(|| StagingError::MissingCover(source.display().to_string()))?;
        if let Some(item) = ctx.manifest_mut().item_by_href_mut(&name) {
            item.add_property(ItemProperty::CoverImage);
        }
        Ok(name)
    }

    fn package_metadata(
        &self,
        book: &Book,
        ctx: &StagingContext,
        cover: String,
        pages: usize,
        sentence_ids: &[String],
    ) -> PackageMetadata {
        let mut metadata = PackageMetadata::new(&book.id, book.title(), book.language());
        metadata.source = book.source_description(Utc::now().date_naive());
        metadata.isbn = book.isbn();
        metadata.creator = book.metadata.author.clone();
        metadata.description = book.metadata.summary.clone();
        metadata.license_url = book.data_value("licenseUrl", Some("*"));
        metadata.subjects = book.metadata.subject_codes();

        let copyright = book.metadata.copyright_parts().or_else(|| {
            book.data_value("copyright", Some("*"))
                .as_deref()
                .and_then(parse_copyright)
        });
        if let Some(copyright) = copyright {
            metadata.copyright_year = Some(copyright.year);
            metadata.copyright_holder = Some(copyright.holder);
        }

        metadata.page_count = pages;
        metadata.fixed_layout = !self.options.layout.is_flowable();
        metadata.landscape = book.page_size().is_landscape();
        metadata.has_images = ctx
            .manifest()
            .items()
            .iter()
            .any(|item| item.media_type.starts_with("image/") && item.href != cover);
        metadata.has_audio = ctx.manifest().has_overlays();
        metadata.full_audio = metadata.has_audio
            && !self
                .collaborators
                .audio
                .is_any_audio_missing(book.folder(), sentence_ids);
        metadata.cover_image = Some(cover);
        metadata
    }
}

/// `META-INF/container.xml` pointing at the package document
fn container_xml() -> Result<String> {
    let full_path = format!("{}/{}", CONTENT_FOLDER, PACKAGE_FILE_NAME);
    let mut xml = XmlBuilder::new();
    xml.declaration()?;
    xml.start("container", &[("version", "1.0"), ("xmlns", CONTAINER_NS)])?;
    xml.start("rootfiles", &[])?;
    xml.empty(
        "rootfile",
        &[
            ("full-path", full_path.as_str()),
            ("media-type", "application/oebps-package+xml"),
        ],
    )?;
    xml.end("rootfiles")?;
    xml.end("container")?;
    Ok(xml.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgress;
    use crate::visibility::StaticOracle;

    const BOOK: &str = r#"<html><head><title>x</title></head><body>
<div id="bloomDataDiv"><div data-book="bookTitle" lang="en">Tiny</div></div>
<div class="bloom-page cover bloom-frontMatter A5Portrait"><p>Tiny</p></div>
<div class="bloom-page numberedPage A5Portrait"><p>Hello</p></div>
</body></html>"#;

    fn book_in(dir: &Path) -> Book {
        let folder = dir.join("Tiny");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("Tiny.htm"), BOOK).unwrap();
        std::fs::write(folder.join(THUMBNAIL), b"png").unwrap();
        Book::load(&folder).unwrap()
    }

    fn assembler(dir: &Path, oracle: Arc<dyn VisibilityOracle>) -> EpubAssembler {
        let options = EpubOptions::new().with_staging_root(dir.join("stage"));
        let collaborators = Collaborators::new(oracle).with_progress(Arc::new(NullProgress));
        EpubAssembler::new(options, collaborators)
    }

    #[test]
    fn test_container_points_at_package() {
        let xml = container_xml().unwrap();
        assert!(xml.contains(r#"full-path="content/content.opf""#));
        assert!(xml.contains(CONTAINER_NS));
    }

    #[test]
    fn test_stage_writes_package_files() {
        let dir = tempfile::tempdir().unwrap();
        let book = book_in(dir.path());
        let assembler = assembler(dir.path(), Arc::new(StaticOracle::new()));

        let StageOutcome::Staged(staged) = assembler.stage(&book).unwrap() else {
            panic!("staging did not complete");
        };
        assert_eq!(staged.pages, 2);
        assert!(staged.package_path().is_file());
        assert!(staged.staging_dir.join("mimetype").is_file());
        assert!(staged.staging_dir.join(CONTAINER_FILE).is_file());
        let content = staged.staging_dir.join(CONTENT_FOLDER);
        assert!(content.join("nav.xhtml").is_file());
        assert!(content.join("fonts.css").is_file());
        assert!(content.join("thumbnail.png").is_file());

        let opf = std::fs::read_to_string(staged.package_path()).unwrap();
        assert!(opf.contains(r#"properties="cover-image""#));
        assert!(opf.contains(r#"properties="nav""#));
        assert!(opf.contains("<dc:title>Tiny</dc:title>"));
    }

    #[test]
    fn test_missing_cover_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let book = book_in(dir.path());
        std::fs::remove_file(book.folder().join(THUMBNAIL)).unwrap();
        let assembler = assembler(dir.path(), Arc::new(StaticOracle::new()));

        let err = assembler.stage_with_retry(&book).unwrap_err();
        assert!(matches!(err, EpubError::Staging(StagingError::MissingCover(_))));
    }

    #[test]
    fn test_transient_failures_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let book = book_in(dir.path());
        let oracle = Arc::new(StaticOracle::new().failing_times(2));
        let assembler = assembler(dir.path(), oracle.clone());

        let outcome = assembler.stage_with_retry(&book).unwrap();
        assert!(matches!(outcome, StageOutcome::Staged(_)));
        // Two failed first pages, then two pages that render
        assert_eq!(oracle.calls(), 4);
    }

    #[test]
    fn test_retries_give_up_after_three_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let book = book_in(dir.path());
        let oracle = Arc::new(StaticOracle::new().failing_times(5));
        let assembler = assembler(dir.path(), oracle.clone());

        let err = assembler.stage_with_retry(&book).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(oracle.calls(), 3);
    }

    #[test]
    fn test_aborted_run_writes_no_package() {
        let dir = tempfile::tempdir().unwrap();
        let book = book_in(dir.path());
        let assembler = assembler(dir.path(), Arc::new(StaticOracle::new()));
        assembler.abort_flag().set();

        assert_eq!(assembler.stage(&book).unwrap(), StageOutcome::Aborted);
        let package = assembler
            .staging_dir_for(&book)
            .join(CONTENT_FOLDER)
            .join(PACKAGE_FILE_NAME);
        assert!(!package.exists());
    }

    #[test]
    fn test_save_requires_a_staged_folder() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = assembler(dir.path(), Arc::new(StaticOracle::new()));
        let staged = StagedBook {
            staging_dir: dir.path().join("nowhere"),
            pages: 0,
            omitted_pages: Vec::new(),
            fonts: FontReport::default(),
            has_audio: false,
        };
        let err = assembler.save(&staged, &dir.path().join("out.epub")).unwrap_err();
        assert!(matches!(err, EpubError::Staging(StagingError::NotStaged)));
    }
}
