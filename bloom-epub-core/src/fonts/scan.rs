//! Reading family, style and embedding rights out of font files

use super::FontStyle;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use ttf_parser::name::name_id;
use ttf_parser::{Face, Permissions};

/// What the catalog needs to know about one font file
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedFont {
    pub path: PathBuf,
    pub family: String,
    pub style: FontStyle,
    pub embeddable: bool,
    /// Why the font cannot be embedded, when it cannot
    pub problem: Option<&'static str>,
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ttf") || ext.eq_ignore_ascii_case("otf"))
}

/// Every `.ttf`/`.otf` file under `dir`, recursively
pub fn font_files(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_font_file(&path) {
                found.push(path);
            }
        }
    }
    found
}

fn family_name(face: &Face<'_>) -> Option<String> {
    let mut typographic = None;
    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        match entry.name_id {
            name_id::FAMILY => return Some(name),
            name_id::TYPOGRAPHIC_FAMILY if typographic.is_none() => typographic = Some(name),
            _ => {}
        }
    }
    typographic
}

fn has_outlines(face: &Face<'_>) -> bool {
    let tables = face.tables();
    tables.glyf.is_some() || tables.cff.is_some() || tables.cff2.is_some()
}

/// Parse one font file's metadata; `None` if the file is not a usable font
pub fn scan_font_data(path: &Path, data: &[u8]) -> Option<ScannedFont> {
    let face = Face::parse(data, 0).ok()?;
    let family = family_name(&face)?;
    let style = FontStyle::from_flags(face.is_bold(), face.is_italic());
    let problem = if matches!(face.permissions(), Some(Permissions::Restricted)) {
        Some("embedding is restricted")
    } else if !has_outlines(&face) {
        Some("bitmap-only font")
    } else {
        None
    };
    Some(ScannedFont {
        path: path.to_path_buf(),
        family,
        style,
        embeddable: problem.is_none(),
        problem,
    })
}

/// Scan font files in parallel; unreadable or unparseable files are skipped.
/// The result is sorted by path so catalog building is deterministic.
pub fn scan_files(paths: &[PathBuf]) -> Vec<ScannedFont> {
    let mut fonts: Vec<ScannedFont> = paths
        .par_iter()
        .filter_map(|path| {
            let data = match std::fs::read(path) {
                Ok(data) => data,
                Err(e) => {
                    tracing::debug!("Skipping font {}: {}", path.display(), e);
                    return None;
                }
            };
            let scanned = scan_font_data(path, &data);
            if scanned.is_none() {
                tracing::debug!("Skipping unparseable font {}", path.display());
            }
            scanned
        })
        .collect();
    fonts.sort_by(|a, b| a.path.cmp(&b.path));
    fonts
}
