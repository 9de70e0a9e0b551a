//! Content hash of a book folder, used to tell whether a staged copy is current

use crate::config::EpubOptions;
use crate::error::{ConfigError, Result};
use crate::staging::names::relative_reference;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

/// SHA-256 over the options and every file of the book folder (relative name
/// and contents), hex encoded. Cover thumbnails are book files like any other,
/// so replacing one makes the staged copy stale.
pub fn content_hash(book_folder: &Path, options: &EpubOptions) -> Result<String> {
    let mut files = Vec::new();
    collect_files(book_folder, &mut files)?;
    files.sort();

    let mut hasher = Sha256::new();
    let settings = serde_json::to_vec(options).map_err(|e| ConfigError::Parse(e.to_string()))?;
    hasher.update(&settings);
    for path in files {
        hasher.update(relative_reference(&path, book_folder).as_bytes());
        hasher.update([0u8]);
        hasher.update(std::fs::read(&path)?);
    }
    Ok(hex::encode(hasher.finalize()))
}
