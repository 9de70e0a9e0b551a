//! Zip container writer

use super::ArchiveWriter;
use crate::error::ArchiveError;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

fn zip_err(e: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::Zip(e.to_string())
}

/// Writes a zip file on disk
pub struct ZipArchiveWriter {
    zip: ZipWriter<BufWriter<File>>,
    /// Entries already written explicitly, skipped when a directory is added
    skipped: HashSet<String>,
    /// When false every entry is stored
    compression: bool,
}

impl ZipArchiveWriter {
    pub fn create(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::create(path)
            .map_err(|e| ArchiveError::Zip(format!("Cannot create {}: {}", path.display(), e)))?;
        Ok(Self {
            zip: ZipWriter::new(BufWriter::new(file)),
            skipped: HashSet::new(),
            compression: true,
        })
    }

    /// Store every entry uncompressed when `enabled` is false
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    fn options(&self, compress: bool) -> FileOptions {
        let method = if compress && self.compression {
            CompressionMethod::Deflated
        } else {
            CompressionMethod::Stored
        };
        FileOptions::default().compression_method(method)
    }

    /// Append in-memory content under `entry_name`
    pub fn add_bytes(&mut self, entry_name: &str, data: &[u8], compress: bool) -> Result<(), ArchiveError> {
        let options = self.options(compress);
        self.zip.start_file(entry_name, options).map_err(zip_err)?;
        self.zip.write_all(data).map_err(zip_err)
    }

    /// Leave `entry_name` out of later [`ArchiveWriter::add_directory`] calls
    pub fn skip_entry(&mut self, entry_name: &str) {
        self.skipped.insert(entry_name.to_string());
    }
}

impl ArchiveWriter for ZipArchiveWriter {
    fn add_file(&mut self, path: &Path, entry_name: &str, compress: bool) -> Result<(), ArchiveError> {
        if self.skipped.contains(entry_name) {
            return Ok(());
        }
        let mut source = File::open(path)
            .map_err(|e| ArchiveError::Read(format!("{}: {}", path.display(), e)))?;
        let options = self.options(compress);
        self.zip.start_file(entry_name, options).map_err(zip_err)?;
        std::io::copy(&mut source, &mut self.zip).map_err(zip_err)?;
        Ok(())
    }

    fn add_directory_entry(&mut self, entry_name: &str) -> Result<(), ArchiveError> {
        let options = self.options(false);
        self.zip.add_directory(entry_name, options).map_err(zip_err)
    }

    fn save(mut self) -> Result<(), ArchiveError> {
        let mut inner = self.zip.finish().map_err(zip_err)?;
        inner.flush().map_err(zip_err)
    }
}
