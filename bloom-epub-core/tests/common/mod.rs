//! Shared fixtures: small Bloom book folders written into temp directories

#![allow(dead_code)]

use bloom_epub_core::progress::NullProgress;
use bloom_epub_core::visibility::VisibilityOracle;
use bloom_epub_core::{Collaborators, EpubAssembler, EpubOptions};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the book folder (and its HTML file) inside a fixture directory
pub const BOOK_NAME: &str = "The Moon";

/// A `div.bloom-page` with the given extra classes and inner markup
pub fn page(classes: &str, inner: &str) -> String {
    format!(r#"<div class="bloom-page {}">{}</div>"#, classes, inner)
}

/// A numbered A5 page holding one paragraph of English text
pub fn text_page(text: &str) -> String {
    page(
        "numberedPage A5Portrait",
        &format!(
            r#"<div class="marginBox"><div class="bloom-translationGroup"><div class="bloom-editable bloom-content1" lang="en">{}</div></div></div>"#,
            text
        ),
    )
}

/// A numbered page with nothing a reader could see
pub fn blank_page() -> String {
    page(
        "numberedPage A5Portrait",
        r#"<div class="marginBox"><div class="bloom-translationGroup"><div class="bloom-editable" lang="en"> </div></div></div>"#,
    )
}

/// The cover page every fixture book starts with
pub fn cover_page() -> String {
    page(
        "cover coverColor bloom-frontMatter A5Portrait",
        r#"<div class="pageLabel">Front Cover</div><div class="bloom-translationGroup"><div class="bloom-editable bloom-content1" lang="en">The Moon</div></div>"#,
    )
}

pub fn book_html(pages: &[String]) -> String {
    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="UTF-8"/><title>The Moon</title></head>
<body>
<div id="bloomDataDiv">
<div data-book="contentLanguage1" lang="*">en</div>
<div data-book="bookTitle" lang="en">The Moon</div>
</div>
{}
</body></html>"#,
        pages.join("\n")
    )
}

/// Write a book folder with the given pages and a cover thumbnail. Returns the folder.
pub fn write_book(dir: &Path, pages: &[String]) -> PathBuf {
    let folder = dir.join(BOOK_NAME);
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(folder.join(format!("{}.htm", BOOK_NAME)), book_html(pages)).unwrap();
    std::fs::write(
        folder.join("meta.json"),
        r#"{"bookInstanceId": "5a1e-moon", "title": "The Moon", "author": "Ada"}"#,
    )
    .unwrap();
    std::fs::write(folder.join("thumbnail.png"), b"\x89PNG thumbnail").unwrap();
    folder
}

/// Write a file into the book folder, creating subfolders
pub fn add_file(folder: &Path, relative: &str, contents: &[u8]) {
    let path = folder.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

pub fn options(dir: &Path) -> EpubOptions {
    EpubOptions::new()
        .with_staging_root(dir.join("staging"))
        .without_system_fonts()
}

pub fn assembler(dir: &Path, oracle: Arc<dyn VisibilityOracle>) -> EpubAssembler {
    assembler_with(options(dir), oracle)
}

pub fn assembler_with(options: EpubOptions, oracle: Arc<dyn VisibilityOracle>) -> EpubAssembler {
    let collaborators = Collaborators::new(oracle).with_progress(Arc::new(NullProgress));
    EpubAssembler::new(options, collaborators)
}

/// Every value of `attr="..."` in a serialized document, in order
pub fn attr_values(markup: &str, attr: &str) -> Vec<String> {
    let re = Regex::new(&format!(r#"\s{}="([^"]*)""#, regex::escape(attr))).unwrap();
    re.captures_iter(markup).map(|caps| caps[1].to_string()).collect()
}

/// Names of the files directly inside a folder, sorted
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
