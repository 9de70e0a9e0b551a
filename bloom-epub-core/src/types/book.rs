//! A Bloom book folder loaded for publishing

use super::{BookMetadata, PageSize};
use crate::dom::Document;
use crate::error::{Result, StagingError};
use ego_tree::NodeId;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const DATA_DIV_ID: &str = "bloomDataDiv";

/// The book being published: its HTML, its folder and what `meta.json` says about it
#[derive(Debug, Clone)]
pub struct Book {
    /// Identifier used in the package metadata
    pub id: String,

    /// Contents of `meta.json`
    pub metadata: BookMetadata,

    folder: PathBuf,
    html_path: PathBuf,
    dom: Document,
    language: String,
    title: String,
}

impl Book {
    /// Load the book in `folder`: its single `.htm` file and `meta.json`
    pub fn load(folder: &Path) -> Result<Self> {
        let html_path = find_book_file(folder)?;
        let markup = std::fs::read_to_string(&html_path)?;
        let dom = Document::parse(&markup)?;
        let metadata = BookMetadata::load(folder)?;
        Ok(Self::from_parts(folder, html_path, dom, metadata))
    }

    /// Build a book from markup already in memory
    pub fn from_parts(folder: &Path, html_path: PathBuf, dom: Document, metadata: BookMetadata) -> Self {
        let mut book = Self {
            id: String::new(),
            metadata,
            folder: folder.to_path_buf(),
            html_path,
            dom,
            language: String::new(),
            title: String::new(),
        };
        book.language = book
            .data_value("contentLanguage1", None)
            .unwrap_or_else(|| "en".to_string());
        book.title = book
            .metadata
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| book.data_value("bookTitle", Some(&book.language)))
            .unwrap_or_else(|| {
                folder
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
        book.id = book
            .metadata
            .book_instance_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        book
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn html_path(&self) -> &Path {
        &self.html_path
    }

    pub fn dom(&self) -> &Document {
        &self.dom
    }

    /// Tag of the book's primary language
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_rtl(&self) -> bool {
        self.metadata.is_rtl
    }

    /// The `div.bloom-page` elements in book order
    pub fn pages(&self) -> Vec<NodeId> {
        self.dom
            .select_all(|el| el.is("div") && el.has_class("bloom-page"))
    }

    /// Size class of the first page that has one
    pub fn page_size(&self) -> PageSize {
        self.pages()
            .into_iter()
            .filter_map(|page| self.dom.element(page)?.attr("class"))
            .find_map(PageSize::from_classes)
            .unwrap_or_default()
    }

    /// A value from the book's data div, preferring the given language, then `*`,
    /// then whatever comes first
    pub fn data_value(&self, key: &str, lang: Option<&str>) -> Option<String> {
        let data_div = self
            .dom
            .select_all(|el| el.attr("id") == Some(DATA_DIV_ID))
            .into_iter()
            .next()?;
        let candidates: Vec<(Option<String>, String)> = self
            .dom
            .select(data_div, |el| el.attr("data-book") == Some(key))
            .into_iter()
            .filter_map(|id| {
                let el = self.dom.element(id)?;
                let text = self.dom.text_content(id).trim().to_string();
                (!text.is_empty()).then(|| (el.attr("lang").map(str::to_string), text))
            })
            .collect();

        let with_lang = |wanted: &str| {
            candidates
                .iter()
                .find(|(l, _)| l.as_deref() == Some(wanted))
                .map(|(_, text)| text.clone())
        };
        lang.and_then(with_lang)
            .or_else(|| with_lang("*"))
            .or_else(|| candidates.first().map(|(_, text)| text.clone()))
    }

    /// Label shown for a page in the editor, e.g. "Title Page"
    pub fn page_label(&self, page: NodeId) -> String {
        self.dom
            .select(page, |el| el.has_class("pageLabel"))
            .first()
            .map(|label| self.dom.text_content(*label).trim().to_string())
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| "Unlabeled page".to_string())
    }

    /// ISBN from the data div or `meta.json`
    pub fn isbn(&self) -> Option<String> {
        self.data_value("ISBN", Some("*"))
            .or_else(|| self.metadata.isbn.clone())
            .filter(|isbn| !isbn.trim().is_empty())
    }

    /// `dc:source`: the ISBN when there is one, else where and when the book came from
    pub fn source_description(&self, date: chrono::NaiveDate) -> String {
        match self.isbn() {
            Some(isbn) => format!("urn:isbn:{}", isbn),
            None => format!(
                "created from Bloom book on {} with page size {}",
                date.format("%Y-%m-%d"),
                self.page_size()
            ),
        }
    }
}

/// The book's HTML file: the `.htm` named after the folder, else the only one there is
pub fn find_book_file(folder: &Path) -> std::result::Result<PathBuf, StagingError> {
    let no_book = || StagingError::NoBookFile(folder.display().to_string());
    let entries = std::fs::read_dir(folder).map_err(|_| no_book())?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("htm") || e.eq_ignore_ascii_case("html"))
        })
        .collect();
    candidates.sort();

    let folder_name = folder.file_name().map(|n| n.to_string_lossy().into_owned());
    if let Some(named) = candidates.iter().find(|path| {
        path.file_stem().map(|s| s.to_string_lossy().into_owned()) == folder_name
    }) {
        return Ok(named.clone());
    }
    match candidates.len() {
        1 => Ok(candidates.remove(0)),
        _ => Err(no_book()),
    }
}
