//! Output containers: the final `.epub` (zip) and plain tar bundles
//!
//! The writers only know about files and entry names; the ePub-specific
//! ordering rule (`mimetype` first, stored) lives in [`write_epub`].

mod tar;
mod zip;

pub use self::tar::TarArchiveWriter;
pub use self::zip::ZipArchiveWriter;

use crate::error::ArchiveError;
use crate::manifest::{is_precompressed, media_type_for};
use std::path::Path;

pub const MIMETYPE_FILE_NAME: &str = "mimetype";
pub const EPUB_MIMETYPE: &str = "application/epub+zip";

/// OS metadata files that never belong in an archive
const OS_METADATA_FILES: &[&str] = &["thumbs.db", "desktop.ini", ".ds_store"];

/// Normalize a path into an archive entry name: drive letter stripped,
/// backslashes turned into slashes, no leading slash
pub fn entry_name(path: &str) -> Result<String, ArchiveError> {
    let mut name = path.replace('\\', "/");
    let bytes = name.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        name = name[2..].to_string();
    }
    let name = name.trim_start_matches('/').to_string();
    if name.is_empty() || name.split('/').any(|part| part == "..") {
        return Err(ArchiveError::InvalidEntryName(path.to_string()));
    }
    Ok(name)
}

/// Whether a file is left out of archives regardless of caller settings
pub fn is_always_excluded(file_name: &str) -> bool {
    file_name.starts_with('.')
        || OS_METADATA_FILES
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(file_name))
}

/// Whether an entry should be compressed: everything except image, audio and video media
pub fn should_compress(file_name: &str) -> bool {
    match media_type_for(file_name) {
        Ok(media_type) => !is_precompressed(media_type),
        Err(_) => true,
    }
}

fn has_excluded_extension(file_name: &str, excluded_extensions: &[&str]) -> bool {
    let Some((_, ext)) = file_name.rsplit_once('.') else {
        return false;
    };
    excluded_extensions
        .iter()
        .any(|excluded| excluded.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

/// A container being written entry by entry
pub trait ArchiveWriter {
    /// Append one file under `entry_name`
    fn add_file(&mut self, path: &Path, entry_name: &str, compress: bool) -> Result<(), ArchiveError>;

    /// Append an explicit directory entry
    fn add_directory_entry(&mut self, entry_name: &str) -> Result<(), ArchiveError>;

    /// Write the container trailer and close the output
    fn save(self) -> Result<(), ArchiveError>
    where
        Self: Sized;

    /// Recursively append the contents of `dir` under `prefix`, in name order.
    ///
    /// Hidden files, OS metadata files and files with one of `excluded_extensions`
    /// are skipped. Media files are stored, everything else is compressed.
    fn add_directory(
        &mut self,
        dir: &Path,
        prefix: &str,
        excluded_extensions: &[&str],
    ) -> Result<(), ArchiveError> {
        let mut entries: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| ArchiveError::Read(format!("{}: {}", dir.display(), e)))?
            .filter_map(|entry| entry.ok())
            .collect();
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if is_always_excluded(&file_name) {
                continue;
            }
            let path = entry.path();
            let name = if prefix.is_empty() {
                file_name.clone()
            } else {
                format!("{}/{}", prefix.trim_end_matches('/'), file_name)
            };
            if path.is_dir() {
                self.add_directory_entry(&entry_name(&format!("{}/", name))?)?;
                self.add_directory(&path, &name, excluded_extensions)?;
            } else if !has_excluded_extension(&file_name, excluded_extensions) {
                self.add_file(&path, &entry_name(&name)?, should_compress(&file_name))?;
            }
        }
        Ok(())
    }
}

/// Zip a staged ePub folder into `destination`.
///
/// `mimetype` is written first and stored; the rest of the folder follows,
/// text compressed unless `compress` is false.
pub fn write_epub(staging_dir: &Path, destination: &Path, compress: bool) -> Result<(), ArchiveError> {
    let mut writer = ZipArchiveWriter::create(destination)?.with_compression(compress);
    let mimetype = staging_dir.join(MIMETYPE_FILE_NAME);
    if mimetype.is_file() {
        writer.add_file(&mimetype, MIMETYPE_FILE_NAME, false)?;
    } else {
        writer.add_bytes(MIMETYPE_FILE_NAME, EPUB_MIMETYPE.as_bytes(), false)?;
    }
    writer.skip_entry(MIMETYPE_FILE_NAME);
    writer.add_directory(staging_dir, "", &[])?;
    writer.save()
}
