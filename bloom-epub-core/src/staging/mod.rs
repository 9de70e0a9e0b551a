//! Run-scoped staging state: copying assets into the package exactly once,
//! naming them safely and handing out unique manifest ids.

pub mod names;
mod svg;

pub use svg::prune_svg;

use crate::error::{EpubError, Result, StagingError};
use crate::manifest::{media_type_for, ManifestItem, ManifestModel};
use crate::patterns::DIRECTION_DECL_RE;
use names::{adjusted_file_name, numbered_name, relative_reference, stem_of, to_valid_xml_id};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Folder inside the staging directory that holds the package content
pub const CONTENT_FOLDER: &str = "content";

/// Everything one staging run accumulates. Created at the start of a run and
/// dropped at its end; nothing here outlives the run.
#[derive(Debug)]
pub struct StagingContext {
    book_folder: PathBuf,
    staging_dir: PathBuf,
    content_dir: PathBuf,
    support_dirs: Vec<PathBuf>,
    /// Source path -> destination name
    copied: HashMap<PathBuf, String>,
    /// Destination names in use, lowercased
    taken_names: HashSet<String>,
    /// Destination name -> manifest id
    ids: HashMap<String, String>,
    /// Manifest ids in use, lowercased
    taken_ids: HashSet<String>,
    /// Book-relative reference -> destination name, for references that changed
    renames: HashMap<String, String>,
    manifest: ManifestModel,
    fonts_used: BTreeSet<String>,
    omitted_pages: Vec<String>,
}

impl StagingContext {
    /// Start a run, recreating `staging_dir` from scratch
    pub fn create(book_folder: &Path, staging_dir: &Path, support_dirs: Vec<PathBuf>) -> Result<Self> {
        if staging_dir.exists() {
            std::fs::remove_dir_all(staging_dir).map_err(|e| {
                StagingError::StagingFolder(format!("{}: {}", staging_dir.display(), e))
            })?;
        }
        let content_dir = staging_dir.join(CONTENT_FOLDER);
        std::fs::create_dir_all(&content_dir)
            .map_err(|e| StagingError::StagingFolder(format!("{}: {}", content_dir.display(), e)))?;

        Ok(Self {
            book_folder: book_folder.to_path_buf(),
            staging_dir: staging_dir.to_path_buf(),
            content_dir,
            support_dirs,
            copied: HashMap::new(),
            taken_names: HashSet::new(),
            ids: HashMap::new(),
            taken_ids: HashSet::new(),
            renames: HashMap::new(),
            manifest: ManifestModel::new(),
            fonts_used: BTreeSet::new(),
            omitted_pages: Vec::new(),
        })
    }

    pub fn book_folder(&self) -> &Path {
        &self.book_folder
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    pub fn manifest(&self) -> &ManifestModel {
        &self.manifest
    }

    pub fn manifest_mut(&mut self) -> &mut ManifestModel {
        &mut self.manifest
    }

    /// Look for a support file by name: in the book folder first, then the support folders
    pub fn find_support_file(&self, file_name: &str) -> Option<PathBuf> {
        std::iter::once(&self.book_folder)
            .chain(self.support_dirs.iter())
            .map(|dir| dir.join(file_name))
            .find(|path| path.is_file())
    }

    /// Copy `source` into the package unless it is there already, returning its
    /// destination name.
    ///
    /// A file that is missing or cannot be copied is logged and yields `None`; the
    /// page simply loses that asset. A file with no known media type fails the run.
    pub fn copy_to_staging(&mut self, source: &Path) -> Result<Option<String>> {
        if let Some(existing) = self.copied.get(source) {
            return Ok(Some(existing.clone()));
        }

        let reference = relative_reference(source, &self.book_folder);
        let base_name = adjusted_file_name(&reference);
        let media_type = media_type_for(&base_name)?;

        if !source.is_file() {
            tracing::warn!("Missing file {} is not copied", source.display());
            return Ok(None);
        }

        let name = self.unique_name(&base_name);
        let destination = self.content_dir.join(&name);
        if let Err(e) = copy_asset(source, &destination, media_type) {
            tracing::warn!("Could not copy {}: {}", source.display(), e);
            return Ok(None);
        }
        tracing::debug!("Copied {} as {}", reference, name);

        self.taken_names.insert(name.to_lowercase());
        self.copied.insert(source.to_path_buf(), name.clone());
        if name != reference {
            self.renames.insert(reference, name.clone());
        }
        let id = self.id_for(&name);
        self.manifest.add_item(ManifestItem::new(id, name.clone(), media_type));
        Ok(Some(name))
    }

    /// Write a generated file (page, overlay, stylesheet) into the content folder
    /// and register it in the manifest. Returns the manifest id.
    pub fn write_content(&mut self, name: &str, contents: &str) -> Result<String> {
        std::fs::write(self.content_dir.join(name), contents)?;
        self.register(name)
    }

    /// Add a content file to the manifest (once) without writing it yet. Returns
    /// the manifest id.
    pub fn register(&mut self, name: &str) -> Result<String> {
        let media_type = media_type_for(name)?;
        self.taken_names.insert(name.to_lowercase());
        let id = self.id_for(name);
        if !self.manifest.contains_href(name) {
            self.manifest.add_item(ManifestItem::new(id.clone(), name, media_type));
        }
        Ok(id)
    }

    /// Write a file next to the content folder (container metadata, `mimetype`)
    pub fn write_outside_content(&self, relative: &str, contents: &str) -> Result<()> {
        let path = self.staging_dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents).map_err(EpubError::from)
    }

    fn unique_name(&self, base_name: &str) -> String {
        let mut name = base_name.to_string();
        let mut n = 1;
        while self.taken_names.contains(&name.to_lowercase()) {
            name = numbered_name(base_name, n);
            n += 1;
        }
        name
    }

    /// The manifest id of a destination file, assigning one on first request.
    ///
    /// Ids derive from the file stem; a case-insensitive clash with an id already
    /// handed out gets a numeric suffix.
    pub fn id_for(&mut self, file_name: &str) -> String {
        if let Some(id) = self.ids.get(file_name) {
            return id.clone();
        }
        let base = to_valid_xml_id(stem_of(file_name));
        let mut id = base.clone();
        let mut n = 1;
        while self.taken_ids.contains(&id.to_lowercase()) {
            id = format!("{}{}", base, n);
            n += 1;
        }
        self.taken_ids.insert(id.to_lowercase());
        self.ids.insert(file_name.to_string(), id.clone());
        id
    }

    /// New name of a book-relative reference whose file was renamed on copy
    pub fn renamed(&self, reference: &str) -> Option<&str> {
        self.renames.get(reference).map(String::as_str)
    }

    /// Destination name of a source file that has been copied already
    pub fn copied_name(&self, source: &Path) -> Option<&str> {
        self.copied.get(source).map(String::as_str)
    }

    pub fn copied_count(&self) -> usize {
        self.copied.len()
    }

    pub fn note_font(&mut self, family: impl Into<String>) {
        self.fonts_used.insert(family.into());
    }

    /// Font families seen on displayed text
    pub fn fonts_used(&self) -> &BTreeSet<String> {
        &self.fonts_used
    }

    pub fn note_omitted_page(&mut self, label: impl Into<String>) {
        self.omitted_pages.push(label.into());
    }

    /// Labels of pages left out because they cannot be published
    pub fn omitted_pages(&self) -> &[String] {
        &self.omitted_pages
    }
}

/// Copy one asset, cleaning up stylesheets and SVG images on the way
fn copy_asset(source: &Path, destination: &Path, media_type: &str) -> std::result::Result<(), String> {
    match media_type {
        "text/css" => {
            let css = std::fs::read_to_string(source).map_err(|e| e.to_string())?;
            // Readers apply the page direction themselves; a fixed one fights the book language
            let css = DIRECTION_DECL_RE.replace_all(&css, "");
            std::fs::write(destination, css.as_bytes()).map_err(|e| e.to_string())
        }
        "image/svg+xml" => {
            let markup = std::fs::read_to_string(source).map_err(|e| e.to_string())?;
            let pruned = prune_svg(&markup).map_err(|e| e.to_string())?;
            std::fs::write(destination, pruned).map_err(|e| e.to_string())
        }
        _ => std::fs::copy(source, destination)
            .map(|_| ())
            .map_err(|e| e.to_string()),
    }
}
