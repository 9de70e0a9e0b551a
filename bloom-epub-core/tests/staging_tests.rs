//! Staging tests for bloom-epub-core
//!
//! These tests stage small book folders end to end and inspect the staged
//! package the way a reading system would: the package document, the content
//! documents and the copied assets.
//!
//! ## Test Strategy
//!
//! 1. **Page accounting**: every page becomes exactly one content document or
//!    is dropped as blank or unpublishable
//! 2. **Asset laws**: each source file is copied once, under a unique, sanitized
//!    name, with a valid manifest id
//! 3. **Page rewriting**: picture sizes, hidden elements and narration overlays
//! 4. **Run control**: aborting a run and publishing to an archive

mod common;

use bloom_epub_core::error::VisibilityError;
use bloom_epub_core::staging::names::is_valid_xml_id;
use bloom_epub_core::staging::CONTENT_FOLDER;
use bloom_epub_core::visibility::{RenderedPage, StaticOracle, VisibilityOracle};
use bloom_epub_core::{AbortFlag, Book, LayoutMode, StageOutcome, StagedBook};
use common::*;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

// =============================================================================
// Helpers
// =============================================================================

fn stage(dir: &Path, oracle: Arc<dyn VisibilityOracle>) -> StagedBook {
    let book = Book::load(&dir.join(BOOK_NAME)).unwrap();
    match assembler(dir, oracle).stage(&book).unwrap() {
        StageOutcome::Staged(staged) => staged,
        StageOutcome::Aborted => panic!("staging was aborted"),
    }
}

fn read_content(staged: &StagedBook, name: &str) -> String {
    std::fs::read_to_string(staged.staging_dir.join(CONTENT_FOLDER).join(name)).unwrap()
}

fn read_package(staged: &StagedBook) -> String {
    std::fs::read_to_string(staged.package_path()).unwrap()
}

/// `(id, href)` of every manifest item
fn manifest_items(opf: &str) -> Vec<(String, String)> {
    let item = Regex::new(r"<item\s[^>]*>").unwrap();
    item.find_iter(opf)
        .map(|m| {
            let id = attr_values(m.as_str(), "id").remove(0);
            let href = attr_values(m.as_str(), "href").remove(0);
            (id, href)
        })
        .collect()
}

fn spine(opf: &str) -> Vec<String> {
    attr_values(opf, "idref")
}

fn picture(src: &str) -> String {
    format!(
        r#"<div class="bloom-imageContainer"><img src="{}" alt="a picture"/></div>"#,
        src
    )
}

/// Stable view of a staging run for snapshots
#[derive(Debug, Serialize)]
struct StageSummary {
    pages: usize,
    omitted_pages: Vec<String>,
    spine: Vec<String>,
    content_documents: Vec<String>,
}

impl StageSummary {
    fn of(staged: &StagedBook) -> Self {
        let documents = file_names(&staged.staging_dir.join(CONTENT_FOLDER))
            .into_iter()
            .filter(|name| name.ends_with(".xhtml") && name != "nav.xhtml")
            .collect();
        Self {
            pages: staged.pages,
            omitted_pages: staged.omitted_pages.clone(),
            spine: spine(&read_package(staged)),
            content_documents: documents,
        }
    }
}

// =============================================================================
// Page Accounting
// =============================================================================

#[test]
fn test_every_page_is_written_or_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let instructions = page(
        "bloom-nonprinting A5Portrait",
        r#"<div class="pageLabel">Instructions</div><p>Read this first</p>"#,
    );
    write_book(
        dir.path(),
        &[
            cover_page(),
            text_page("One"),
            instructions,
            text_page("Two"),
            blank_page(),
            text_page("Three"),
        ],
    );

    let staged = stage(dir.path(), Arc::new(StaticOracle::new()));

    assert_eq!(staged.pages, 4);
    assert_eq!(staged.omitted_pages, vec!["Instructions".to_string()]);
    let opf = read_package(&staged);
    assert_eq!(spine(&opf).len(), 4);
    for n in 1..=4 {
        assert!(staged
            .staging_dir
            .join(CONTENT_FOLDER)
            .join(format!("{}.xhtml", n))
            .is_file());
    }
    assert!(read_content(&staged, "4.xhtml").contains("Three"));
    assert!(!read_content(&staged, "3.xhtml").contains("Read this first"));
}

#[test]
fn test_blank_middle_page_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write_book(
        dir.path(),
        &[text_page("Before"), blank_page(), text_page("After")],
    );

    let staged = stage(dir.path(), Arc::new(StaticOracle::new()));

    insta::assert_json_snapshot!(StageSummary::of(&staged), @r###"
    {
      "pages": 2,
      "omitted_pages": [],
      "spine": [
        "f1",
        "f2"
      ],
      "content_documents": [
        "1.xhtml",
        "2.xhtml"
      ]
    }
    "###);
    assert!(read_content(&staged, "2.xhtml").contains("After"));
}

#[test]
fn test_first_content_page_skips_front_matter() {
    let dir = tempfile::tempdir().unwrap();
    write_book(dir.path(), &[cover_page(), text_page("Story starts")]);

    let staged = stage(dir.path(), Arc::new(StaticOracle::new()));

    let nav = read_content(&staged, "nav.xhtml");
    assert!(nav.contains(r#"href="1.xhtml""#));
    assert!(nav.contains(r#"href="2.xhtml""#));
}

// =============================================================================
// Asset Laws
// =============================================================================

#[test]
fn test_shared_picture_is_copied_once() {
    let dir = tempfile::tempdir().unwrap();
    let folder = write_book(
        dir.path(),
        &[
            cover_page(),
            page("numberedPage A5Portrait", &format!("<p>First</p>{}", picture("moon.png"))),
            page("numberedPage A5Portrait", &format!("<p>Second</p>{}", picture("moon.png"))),
        ],
    );
    add_file(&folder, "moon.png", b"\x89PNG moon");

    let staged = stage(dir.path(), Arc::new(StaticOracle::new()));

    let opf = read_package(&staged);
    let moon_items = manifest_items(&opf)
        .into_iter()
        .filter(|(_, href)| href == "moon.png")
        .count();
    assert_eq!(moon_items, 1);
    assert!(read_content(&staged, "2.xhtml").contains(r#"src="moon.png""#));
    assert!(read_content(&staged, "3.xhtml").contains(r#"src="moon.png""#));
}

#[test]
fn test_manifest_ids_are_unique_and_valid() {
    let dir = tempfile::tempdir().unwrap();
    let folder = write_book(
        dir.path(),
        &[
            cover_page(),
            page(
                "numberedPage A5Portrait",
                &format!("<p>Pictures</p>{}{}{}", picture("1.png"), picture("1.PNG"), picture("my pic.jpg")),
            ),
            text_page("The end"),
        ],
    );
    add_file(&folder, "1.png", b"png");
    add_file(&folder, "1.PNG", b"PNG");
    add_file(&folder, "my pic.jpg", b"jpg");

    let staged = stage(dir.path(), Arc::new(StaticOracle::new()));

    let items = manifest_items(&read_package(&staged));
    let mut seen_ids = HashSet::new();
    let mut seen_hrefs = HashSet::new();
    for (id, href) in &items {
        assert!(is_valid_xml_id(id), "invalid id {}", id);
        assert!(seen_ids.insert(id.to_lowercase()), "duplicate id {}", id);
        assert!(seen_hrefs.insert(href.to_lowercase()), "duplicate href {}", href);
    }
    assert!(items.iter().any(|(_, href)| href == "my_pic.jpg"));
}

#[test]
fn test_sanitized_names_do_not_collide() {
    let dir = tempfile::tempdir().unwrap();
    let folder = write_book(
        dir.path(),
        &[
            cover_page(),
            page(
                "numberedPage A5Portrait",
                &format!("<p>Two pictures</p>{}{}", picture("a+b.png"), picture("a%20b.png")),
            ),
        ],
    );
    add_file(&folder, "a+b.png", b"plus");
    add_file(&folder, "a b.png", b"space");

    let staged = stage(dir.path(), Arc::new(StaticOracle::new()));

    let content = staged.staging_dir.join(CONTENT_FOLDER);
    assert_eq!(std::fs::read(content.join("a_b.png")).unwrap(), b"plus");
    assert_eq!(std::fs::read(content.join("a_b1.png")).unwrap(), b"space");
    let xhtml = read_content(&staged, "2.xhtml");
    assert_eq!(attr_values(&xhtml, "src"), vec!["a_b.png", "a_b1.png"]);
}

#[test]
fn test_missing_picture_is_removed_from_page() {
    let dir = tempfile::tempdir().unwrap();
    write_book(
        dir.path(),
        &[
            cover_page(),
            page("numberedPage A5Portrait", &format!("<p>Gone</p>{}", picture("gone.png"))),
        ],
    );

    let staged = stage(dir.path(), Arc::new(StaticOracle::new()));

    let xhtml = read_content(&staged, "2.xhtml");
    assert!(!xhtml.contains("gone.png"));
    assert!(!read_package(&staged).contains("gone.png"));
}

// =============================================================================
// Page Rewriting
// =============================================================================

#[test]
fn test_picture_width_scales_with_page() {
    let dir = tempfile::tempdir().unwrap();
    let folder = write_book(
        dir.path(),
        &[
            cover_page(),
            page(
                "numberedPage A4Portrait",
                r#"<div class="marginBox"><div class="split-pane"><div class="bloom-imageContainer"><img src="wide.png" style="width:334px; height:200px;"/></div></div><p>Caption</p></div>"#,
            ),
        ],
    );
    add_file(&folder, "wide.png", b"png");

    let staged = stage(dir.path(), Arc::new(StaticOracle::new()));

    let xhtml = read_content(&staged, "2.xhtml");
    assert!(xhtml.contains("width:52.0%"), "{}", xhtml);
    assert!(xhtml.contains("height:auto"));
}

#[test]
fn test_hidden_languages_are_removed() {
    let dir = tempfile::tempdir().unwrap();
    write_book(
        dir.path(),
        &[
            cover_page(),
            page(
                "numberedPage A5Portrait",
                r#"<div class="bloom-translationGroup"><div class="bloom-editable bloom-content1" lang="en" id="english">Hello</div><div class="bloom-editable" lang="fr" id="french">Bonjour</div></div>"#,
            ),
        ],
    );

    let staged = stage(dir.path(), Arc::new(StaticOracle::new().hiding("french")));

    let xhtml = read_content(&staged, "2.xhtml");
    assert!(xhtml.contains("Hello"));
    assert!(!xhtml.contains("Bonjour"));
}

#[test]
fn test_narration_becomes_media_overlay() {
    let dir = tempfile::tempdir().unwrap();
    let spans: String = (1..=5)
        .map(|n| {
            let duration = match n {
                2 => r#" data-duration="1.5""#,
                4 => r#" data-duration="2.25""#,
                _ => "",
            };
            format!(
                r#"<span id="s{n}" class="audio-sentence"{duration}>Sentence {n}. </span>"#
            )
        })
        .collect();
    let folder = write_book(
        dir.path(),
        &[
            cover_page(),
            page(
                "numberedPage A5Portrait",
                &format!(
                    r#"<div class="bloom-translationGroup"><div class="bloom-editable bloom-content1" lang="en"><p>{}</p></div></div>"#,
                    spans
                ),
            ),
        ],
    );
    add_file(&folder, "audio/s2.mp3", b"ID3 two");
    add_file(&folder, "audio/s4.mp3", b"ID3 four");

    let staged = stage(dir.path(), Arc::new(StaticOracle::new()));

    assert!(staged.has_audio);
    let smil = read_content(&staged, "2_overlay.smil");
    assert_eq!(smil.matches("<par ").count(), 2);
    assert!(smil.contains("2.xhtml#s2"));
    assert!(smil.contains("2.xhtml#s4"));
    assert!(smil.contains(r#"src="s2.mp3""#));

    let opf = read_package(&staged);
    assert!(opf.contains(r#"media-overlay="f2_overlay""#));
    assert!(opf.contains(r##"<meta property="media:duration" refines="#f2_overlay">0:00:03.750</meta>"##));
    assert!(opf.contains(r#"<meta property="media:duration">0:00:03.750</meta>"#));
}

#[test]
fn test_publishing_without_audio_skips_overlays() {
    let dir = tempfile::tempdir().unwrap();
    let folder = write_book(
        dir.path(),
        &[
            cover_page(),
            page(
                "numberedPage A5Portrait",
                r#"<p><span id="s1" class="audio-sentence" data-duration="1">Hi.</span></p>"#,
            ),
        ],
    );
    add_file(&folder, "audio/s1.mp3", b"ID3");

    let book = Book::load(&folder).unwrap();
    let options = options(dir.path()).without_audio(true);
    let StageOutcome::Staged(staged) = assembler_with(options, Arc::new(StaticOracle::new()))
        .stage(&book)
        .unwrap()
    else {
        panic!("staging was aborted");
    };

    assert!(!staged.has_audio);
    assert!(!staged.staging_dir.join(CONTENT_FOLDER).join("s1.mp3").exists());
    assert!(!read_package(&staged).contains("media-overlay"));
}

#[test]
fn test_fixed_layout_package() {
    let dir = tempfile::tempdir().unwrap();
    let folder = write_book(dir.path(), &[cover_page(), text_page("Fixed")]);

    let book = Book::load(&folder).unwrap();
    let options = options(dir.path()).with_layout(LayoutMode::Fixed);
    let StageOutcome::Staged(staged) = assembler_with(options, Arc::new(StaticOracle::new()))
        .stage(&book)
        .unwrap()
    else {
        panic!("staging was aborted");
    };

    assert!(read_package(&staged).contains("pre-paginated"));
    assert!(read_content(&staged, "2.xhtml").contains(r#"name="viewport""#));
}

// =============================================================================
// Run Control
// =============================================================================

/// Sets the abort flag while rendering the first page, like a user pressing
/// cancel mid-run
struct AbortingOracle {
    flag: AbortFlag,
    inner: StaticOracle,
}

impl VisibilityOracle for AbortingOracle {
    fn render(&self, page_markup: &str) -> Result<RenderedPage, VisibilityError> {
        if self.inner.calls() == 0 {
            self.flag.set();
        }
        self.inner.render(page_markup)
    }
}

#[test]
fn test_abort_leaves_no_package_and_next_run_completes() {
    let dir = tempfile::tempdir().unwrap();
    let folder = write_book(dir.path(), &[cover_page(), text_page("One"), text_page("Two")]);
    let book = Book::load(&folder).unwrap();

    let flag = AbortFlag::new();
    let oracle = Arc::new(AbortingOracle {
        flag: flag.clone(),
        inner: StaticOracle::new(),
    });
    let assembler = assembler(dir.path(), oracle).with_abort_flag(flag.clone());

    assert_eq!(assembler.stage(&book).unwrap(), StageOutcome::Aborted);
    let package = assembler
        .staging_dir_for(&book)
        .join(CONTENT_FOLDER)
        .join("content.opf");
    assert!(!package.exists());

    flag.clear();
    let StageOutcome::Staged(staged) = assembler.stage(&book).unwrap() else {
        panic!("second run was aborted");
    };
    assert_eq!(staged.pages, 3);
    assert!(package.is_file());
}

#[test]
fn test_publish_writes_epub_archive() {
    let dir = tempfile::tempdir().unwrap();
    let folder = write_book(dir.path(), &[cover_page(), text_page("Archived")]);
    let book = Book::load(&folder).unwrap();
    let destination = dir.path().join("out").join("The Moon.epub");

    let outcome = assembler(dir.path(), Arc::new(StaticOracle::new()))
        .publish(&book, &destination)
        .unwrap();
    assert!(matches!(outcome, StageOutcome::Staged(_)));

    let mut archive = zip::ZipArchive::new(std::fs::File::open(&destination).unwrap()).unwrap();
    {
        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), zip::CompressionMethod::Stored);
    }
    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    assert!(names.contains(&"META-INF/container.xml".to_string()));
    assert!(names.contains(&"content/content.opf".to_string()));
    assert!(names.contains(&"content/2.xhtml".to_string()));
}
