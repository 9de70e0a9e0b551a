//! Integration tests for the bloom-epub CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const BOOK_HTML: &str = r#"<!DOCTYPE html>
<html><head><meta charset="UTF-8"/><title>Little Fox</title></head>
<body>
<div id="bloomDataDiv">
<div data-book="contentLanguage1" lang="*">en</div>
<div data-book="bookTitle" lang="en">Little Fox</div>
</div>
<div class="bloom-page cover bloom-frontMatter A5Portrait"><div class="pageLabel">Front Cover</div><div class="bloom-translationGroup"><div class="bloom-editable bloom-content1" lang="en">Little Fox</div></div></div>
<div class="bloom-page numberedPage A5Portrait"><div class="pageLabel">Basic Text</div><div class="bloom-translationGroup"><div class="bloom-editable bloom-content1" lang="en">The fox ran home.</div></div></div>
</body></html>"#;

/// Create a book folder named `name` inside `dir`
fn create_test_book(dir: &Path, name: &str) -> PathBuf {
    let folder = dir.join(name);
    fs::create_dir_all(&folder).expect("Failed to create book folder");
    fs::write(folder.join(format!("{}.htm", name)), BOOK_HTML).expect("Failed to write book");
    fs::write(
        folder.join("meta.json"),
        format!(r#"{{"bookInstanceId": "cli-{}", "author": "Kim"}}"#, name.replace(' ', "-")),
    )
    .expect("Failed to write meta.json");
    fs::write(folder.join("thumbnail.png"), b"\x89PNG").expect("Failed to write thumbnail");
    folder
}

fn cli(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("bloom-epub-cli").unwrap();
    cmd.env("BLOOM_EPUB_STAGING_ROOT", temp_dir.path().join("staging"));
    cmd
}

#[test]
fn test_help() {
    let mut cmd = Command::cargo_bin("bloom-epub-cli").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("publish"))
        .stdout(predicate::str::contains("stage"))
        .stdout(predicate::str::contains("fonts"))
        .stdout(predicate::str::contains("info"))
        .stdout(predicate::str::contains("batch"));
}

#[test]
fn test_version() {
    let mut cmd = Command::cargo_bin("bloom-epub-cli").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bloom-epub"));
}

#[test]
fn test_publish_help() {
    let mut cmd = Command::cargo_bin("bloom-epub-cli").unwrap();
    cmd.args(["publish", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Publish a book folder"))
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--fixed"))
        .stdout(predicate::str::contains("--without-audio"));
}

#[test]
fn test_batch_invalid_jobs() {
    let mut cmd = Command::cargo_bin("bloom-epub-cli").unwrap();
    cmd.args([
        "batch",
        "/some/input/dir",
        "--output-dir",
        "/some/output/dir",
        "--jobs",
        "0",
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("at least 1"));
}

#[test]
fn test_batch_missing_output_dir() {
    let mut cmd = Command::cargo_bin("bloom-epub-cli").unwrap();
    cmd.args(["batch", "/some/input/dir"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--output-dir"));
}

#[test]
fn test_publish_missing_book() {
    let temp_dir = TempDir::new().unwrap();
    cli(&temp_dir)
        .args(["publish", "/nonexistent/book", "--no-system-fonts"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load book folder"));
}

#[test]
fn test_info_json() {
    let temp_dir = TempDir::new().unwrap();
    let book = create_test_book(temp_dir.path(), "Little Fox");

    let output = cli(&temp_dir)
        .args(["info", book.to_str().unwrap(), "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["title"], "Little Fox");
    assert_eq!(info["language"], "en");
    assert_eq!(info["author"], "Kim");
    assert_eq!(info["page_size"], "A5 Portrait");
    assert_eq!(info["pages"], serde_json::json!(["Front Cover", "Basic Text"]));
}

#[test]
fn test_publish_book_to_epub() {
    let temp_dir = TempDir::new().unwrap();
    let book = create_test_book(temp_dir.path(), "Little Fox");
    let output = temp_dir.path().join("out").join("fox.epub");

    cli(&temp_dir)
        .args([
            "publish",
            book.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
            "--no-system-fonts",
        ])
        .assert()
        .success();

    let file = fs::File::open(&output).expect("ePub was not written");
    let mut archive = zip::ZipArchive::new(file).unwrap();
    {
        let mut mimetype = archive.by_index(0).unwrap();
        assert_eq!(mimetype.name(), "mimetype");
        let mut contents = String::new();
        mimetype.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "application/epub+zip");
    }

    let mut opf = String::new();
    archive
        .by_name("content/content.opf")
        .unwrap()
        .read_to_string(&mut opf)
        .unwrap();
    assert!(opf.contains("<dc:title>Little Fox</dc:title>"));
    assert!(opf.contains("cover-image"));

    let mut page = String::new();
    archive
        .by_name("content/2.xhtml")
        .unwrap()
        .read_to_string(&mut page)
        .unwrap();
    assert!(page.contains("The fox ran home."));
}

#[test]
fn test_publish_defaults_to_folder_name() {
    let temp_dir = TempDir::new().unwrap();
    let book = create_test_book(temp_dir.path(), "Little Fox");

    cli(&temp_dir)
        .args(["publish", book.to_str().unwrap(), "--no-system-fonts"])
        .assert()
        .success();

    assert!(temp_dir.path().join("Little Fox.epub").is_file());
}

#[test]
fn test_publish_without_cover_fails() {
    let temp_dir = TempDir::new().unwrap();
    let book = create_test_book(temp_dir.path(), "Little Fox");
    fs::remove_file(book.join("thumbnail.png")).unwrap();

    cli(&temp_dir)
        .args(["publish", book.to_str().unwrap(), "--no-system-fonts"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cover"));
}

#[test]
fn test_stage_prints_package_and_bundles() {
    let temp_dir = TempDir::new().unwrap();
    let book = create_test_book(temp_dir.path(), "Little Fox");
    let bundle = temp_dir.path().join("staged.tar");

    cli(&temp_dir)
        .args([
            "stage",
            book.to_str().unwrap(),
            "--bundle",
            bundle.to_str().unwrap(),
            "--no-system-fonts",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("content.opf"));

    assert!(bundle.is_file());
    assert!(fs::metadata(&bundle).unwrap().len() > 0);
}

#[test]
fn test_fonts_in_empty_folder() {
    let temp_dir = TempDir::new().unwrap();
    let fonts = temp_dir.path().join("fonts");
    fs::create_dir_all(&fonts).unwrap();

    let mut cmd = Command::cargo_bin("bloom-epub-cli").unwrap();
    cmd.args([
        "fonts",
        "--font-dir",
        fonts.to_str().unwrap(),
        "--no-system-fonts",
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("No fonts found"));
}

#[test]
fn test_batch_publishes_every_book() {
    let temp_dir = TempDir::new().unwrap();
    let library = temp_dir.path().join("library");
    create_test_book(&library, "Little Fox");
    create_test_book(&library, "Big Bear");
    fs::create_dir_all(library.join("not a book")).unwrap();
    let output_dir = temp_dir.path().join("published");

    cli(&temp_dir)
        .args([
            "batch",
            library.to_str().unwrap(),
            "--output-dir",
            output_dir.to_str().unwrap(),
            "--jobs",
            "2",
            "--no-system-fonts",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Success: 2"));

    assert!(output_dir.join("Little Fox.epub").is_file());
    assert!(output_dir.join("Big Bear.epub").is_file());
}
