//! Tar container writer, used for bundling staged folders

use super::ArchiveWriter;
use crate::error::ArchiveError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tar::{Builder, EntryType, Header};

fn tar_err(e: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::Tar(e.to_string())
}

/// Writes an uncompressed tar file on disk; the `compress` flag is ignored
pub struct TarArchiveWriter {
    builder: Builder<BufWriter<File>>,
}

impl TarArchiveWriter {
    pub fn create(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::create(path)
            .map_err(|e| ArchiveError::Tar(format!("Cannot create {}: {}", path.display(), e)))?;
        let mut builder = Builder::new(BufWriter::new(file));
        builder.follow_symlinks(true);
        Ok(Self { builder })
    }
}

impl ArchiveWriter for TarArchiveWriter {
    fn add_file(&mut self, path: &Path, entry_name: &str, _compress: bool) -> Result<(), ArchiveError> {
        let mut file = File::open(path)
            .map_err(|e| ArchiveError::Read(format!("{}: {}", path.display(), e)))?;
        self.builder.append_file(entry_name, &mut file).map_err(tar_err)
    }

    fn add_directory_entry(&mut self, entry_name: &str) -> Result<(), ArchiveError> {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Directory);
        header.set_mode(0o755);
        header.set_size(0);
        self.builder
            .append_data(&mut header, entry_name, std::io::empty())
            .map_err(tar_err)
    }

    fn save(self) -> Result<(), ArchiveError> {
        let mut inner = self.builder.into_inner().map_err(tar_err)?;
        inner.flush().map_err(tar_err)
    }
}
