//! Catalog of installed fonts, grouped by family
//!
//! The catalog is built once per session and shared read-only (behind an `Arc`)
//! by staging runs. Call [`FontCatalog::rebuild`] after fonts are installed.

mod scan;

pub use scan::{font_files, scan_font_data, scan_files, ScannedFont};

use crate::config::EpubOptions;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// One of the four faces a family may provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontStyle {
    Normal,
    Bold,
    Italic,
    BoldItalic,
}

impl FontStyle {
    pub fn from_flags(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => FontStyle::Normal,
            (true, false) => FontStyle::Bold,
            (false, true) => FontStyle::Italic,
            (true, true) => FontStyle::BoldItalic,
        }
    }
}

/// Files providing the faces of one family
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontGroup {
    pub normal: Option<PathBuf>,
    pub bold: Option<PathBuf>,
    pub italic: Option<PathBuf>,
    pub bold_italic: Option<PathBuf>,
    first_seen: Option<PathBuf>,
}

impl FontGroup {
    /// Fill the slot for `style` unless it is already taken
    pub fn add(&mut self, path: &Path, style: FontStyle) {
        if self.first_seen.is_none() {
            self.first_seen = Some(path.to_path_buf());
        }
        let slot = match style {
            FontStyle::Normal => &mut self.normal,
            FontStyle::Bold => &mut self.bold,
            FontStyle::Italic => &mut self.italic,
            FontStyle::BoldItalic => &mut self.bold_italic,
        };
        if slot.is_none() {
            *slot = Some(path.to_path_buf());
        }
    }

    /// Families that only ship styled faces still get something to embed
    fn settle(&mut self) {
        if self.normal.is_none() {
            self.normal = self.first_seen.clone();
        }
    }

    pub fn face(&self, style: FontStyle) -> Option<&Path> {
        match style {
            FontStyle::Normal => self.normal.as_deref(),
            FontStyle::Bold => self.bold.as_deref(),
            FontStyle::Italic => self.italic.as_deref(),
            FontStyle::BoldItalic => self.bold_italic.as_deref(),
        }
    }
}

/// Folders scanned on this platform when system fonts are included
pub fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/usr/share/fonts"),
        PathBuf::from("/usr/local/share/fonts"),
    ];
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        dirs.push(home.join(".local/share/fonts"));
        dirs.push(home.join(".fonts"));
    }
    dirs
}

/// Installed fonts grouped by family, with embedding diagnostics
#[derive(Debug, Clone, Default)]
pub struct FontCatalog {
    dirs: Vec<PathBuf>,
    /// Keyed by lowercase family name
    groups: HashMap<String, FontGroup>,
    /// Lowercase family name -> name as found in the font
    display_names: BTreeMap<String, String>,
    /// Families with no embeddable file, with the reason
    cannot_embed: BTreeMap<String, String>,
}

impl FontCatalog {
    /// Scan `dirs` and build the catalog
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        let mut catalog = Self {
            dirs,
            ..Self::default()
        };
        catalog.rebuild();
        catalog
    }

    /// Catalog over the configured font folders, plus the system ones when enabled
    pub fn from_options(options: &EpubOptions) -> Self {
        let mut dirs = options.font_dirs.clone();
        if options.include_system_fonts {
            dirs.extend(system_font_dirs());
        }
        Self::new(dirs)
    }

    /// Build a catalog from already scanned fonts
    pub fn from_scanned(fonts: Vec<ScannedFont>) -> Self {
        let mut catalog = Self::default();
        catalog.fill(fonts);
        catalog
    }

    /// Rescan the catalog's folders from scratch
    pub fn rebuild(&mut self) {
        let files: Vec<PathBuf> = self.dirs.iter().flat_map(|dir| font_files(dir)).collect();
        tracing::debug!("Scanning {} font files", files.len());
        let fonts = scan_files(&files);
        self.fill(fonts);
        tracing::info!(
            "Font catalog has {} families ({} cannot be embedded)",
            self.groups.len(),
            self.cannot_embed.len()
        );
    }

    fn fill(&mut self, fonts: Vec<ScannedFont>) {
        self.groups.clear();
        self.display_names.clear();
        self.cannot_embed.clear();

        let mut rejected: BTreeMap<String, (String, &'static str)> = BTreeMap::new();
        for font in &fonts {
            let key = font.family.to_lowercase();
            match font.problem {
                Some(problem) => {
                    rejected
                        .entry(key)
                        .or_insert_with(|| (font.family.clone(), problem));
                }
                None => {
                    self.display_names
                        .entry(key.clone())
                        .or_insert_with(|| font.family.clone());
                    self.groups.entry(key).or_default().add(&font.path, font.style);
                }
            }
        }
        for group in self.groups.values_mut() {
            group.settle();
        }
        for (key, (family, problem)) in rejected {
            if !self.groups.contains_key(&key) {
                self.cannot_embed.insert(family, problem.to_string());
            }
        }
    }

    /// The file to embed for `family`: zero or one entries, only the normal face
    pub fn files_for_family(&self, family: &str) -> Vec<PathBuf> {
        self.group_for_family(family)
            .and_then(|group| group.normal.clone())
            .into_iter()
            .collect()
    }

    pub fn group_for_family(&self, family: &str) -> Option<&FontGroup> {
        self.groups.get(&family.trim().to_lowercase())
    }

    /// Families found only in forms that cannot be embedded, with the reason
    pub fn cannot_embed(&self) -> &BTreeMap<String, String> {
        &self.cannot_embed
    }

    pub fn is_embeddable(&self, family: &str) -> bool {
        self.group_for_family(family).is_some()
    }

    /// Family names as written in the font files, sorted
    pub fn families(&self) -> BTreeSet<&str> {
        self.display_names.values().map(|name| name.as_str()).collect()
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}
