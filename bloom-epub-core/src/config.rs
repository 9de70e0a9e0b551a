//! Publishing options
//!
//! Options can be built in code, loaded from a JSON file, and overridden from the
//! environment:
//!
//! * `BLOOM_EPUB_STAGING_ROOT` - folder under which staging folders are created
//! * `BLOOM_EPUB_SUPPORT_DIRS` - search path for shared stylesheets such as `baseEPUB.css`
//! * `BLOOM_EPUB_FONT_DIRS` - extra folders scanned for fonts

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const STAGING_ROOT_VAR: &str = "BLOOM_EPUB_STAGING_ROOT";
pub const SUPPORT_DIRS_VAR: &str = "BLOOM_EPUB_SUPPORT_DIRS";
pub const FONT_DIRS_VAR: &str = "BLOOM_EPUB_FONT_DIRS";

/// How page content is laid out in the reader
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    /// Reflowable text, images sized relative to the page
    #[default]
    Flowable,

    /// One fixed-size page per screen
    Fixed,
}

impl LayoutMode {
    pub fn is_flowable(self) -> bool {
        self == LayoutMode::Flowable
    }
}

/// Options controlling one publishing session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EpubOptions {
    /// Flowable or fixed layout
    pub layout: LayoutMode,

    /// Skip narration overlays even when audio is recorded
    pub publish_without_audio: bool,

    /// Folder under which numbered staging folders are created
    pub staging_root: PathBuf,

    /// Folders searched for stylesheets that are not in the book folder
    pub support_dirs: Vec<PathBuf>,

    /// Font folders scanned in addition to the system ones
    pub font_dirs: Vec<PathBuf>,

    /// Whether the platform font folders are scanned
    pub include_system_fonts: bool,

    /// Family embedded in place of fonts that cannot be embedded
    pub default_font: String,

    /// Also write a Readium `manifest.json` into the staged package
    pub readium_manifest: bool,

    /// Deflate text entries of the saved archive; media is always stored
    pub compress: bool,
}

impl Default for EpubOptions {
    fn default() -> Self {
        Self {
            layout: LayoutMode::Flowable,
            publish_without_audio: false,
            staging_root: std::env::temp_dir().join("ePUB_export"),
            support_dirs: Vec::new(),
            font_dirs: Vec::new(),
            include_system_fonts: true,
            default_font: "Andika".to_string(),
            readium_manifest: false,
            compress: true,
        }
    }
}

impl EpubOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(data) => Self::from_json(&data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            }),
        }
    }

    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(data).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(root) = lookup(STAGING_ROOT_VAR).filter(|v| !v.is_empty()) {
            self.staging_root = PathBuf::from(root);
        }
        if let Some(dirs) = lookup(SUPPORT_DIRS_VAR) {
            self.support_dirs.extend(std::env::split_paths(&dirs));
        }
        if let Some(dirs) = lookup(FONT_DIRS_VAR) {
            self.font_dirs.extend(std::env::split_paths(&dirs));
        }
        self
    }

    /// Set the layout mode
    pub fn with_layout(mut self, layout: LayoutMode) -> Self {
        self.layout = layout;
        self
    }

    /// Suppress narration overlays
    pub fn without_audio(mut self, without_audio: bool) -> Self {
        self.publish_without_audio = without_audio;
        self
    }

    /// Set the staging root folder
    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = root.into();
        self
    }

    /// Add a stylesheet search folder
    pub fn with_support_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.support_dirs.push(dir.into());
        self
    }

    /// Add a font folder
    pub fn with_font_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.font_dirs.push(dir.into());
        self
    }

    /// Turn archive compression on or off
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Scan only the configured font folders
    pub fn without_system_fonts(mut self) -> Self {
        self.include_system_fonts = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options = EpubOptions::from_json(r#"{"layout": "fixed", "readium_manifest": true}"#)
            .unwrap();
        assert_eq!(options.layout, LayoutMode::Fixed);
        assert!(options.readium_manifest);
        assert_eq!(options.default_font, "Andika");
        assert!(options.include_system_fonts);
        assert!(options.compress);
    }

    #[test]
    fn test_invalid_json() {
        let result = EpubOptions::from_json("{ layout: ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let options = EpubOptions::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(options, EpubOptions::default());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, String> = [
            (STAGING_ROOT_VAR, "/tmp/stage".to_string()),
            (FONT_DIRS_VAR, "/opt/fonts".to_string()),
        ]
        .into_iter()
        .collect();

        let options = EpubOptions::new().with_overrides_from(|k| vars.get(k).cloned());
        assert_eq!(options.staging_root, PathBuf::from("/tmp/stage"));
        assert_eq!(options.font_dirs, vec![PathBuf::from("/opt/fonts")]);
        assert!(options.support_dirs.is_empty());
    }
}
