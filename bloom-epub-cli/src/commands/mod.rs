//! CLI command implementations

mod batch;
mod fonts;
mod info;
mod publish;
mod stage;

pub use batch::batch;
pub use fonts::fonts;
pub use info::info;
pub use publish::publish;
pub use stage::stage;

use anyhow::{Context, Result};
use bloom_epub_core::fonts::FontCatalog;
use bloom_epub_core::visibility::{CssDisplayOracle, UiThreadOracle, VisibilityOracle};
use bloom_epub_core::{Collaborators, EpubAssembler, EpubOptions, LayoutMode, ProgressSink};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Options shared by the commands that stage books
#[derive(Args, Debug, Clone, Default)]
pub struct PublishArgs {
    /// JSON file with publishing options
    #[arg(long)]
    pub config: Option<String>,

    /// Fixed layout: one page per screen
    #[arg(long)]
    pub fixed: bool,

    /// Leave narration out of the package
    #[arg(long)]
    pub without_audio: bool,

    /// Also write a Readium manifest.json
    #[arg(long)]
    pub readium: bool,

    /// Store every archive entry uncompressed
    #[arg(long)]
    pub no_compress: bool,

    /// Folder under which books are staged
    #[arg(long)]
    pub staging_root: Option<String>,

    /// Folder searched for shared stylesheets (repeatable)
    #[arg(long = "support-dir")]
    pub support_dirs: Vec<String>,

    /// Extra font folder to scan (repeatable)
    #[arg(long = "font-dir")]
    pub font_dirs: Vec<String>,

    /// Skip the platform font folders
    #[arg(long)]
    pub no_system_fonts: bool,
}

impl PublishArgs {
    /// Options from the config file (or defaults), then the environment, then flags
    pub fn options(&self) -> Result<EpubOptions> {
        let options = match &self.config {
            Some(path) => EpubOptions::load(Path::new(path))
                .with_context(|| format!("Failed to load options from {}", path))?,
            None => EpubOptions::default(),
        };
        let mut options = options.with_env_overrides();

        if self.fixed {
            options = options.with_layout(LayoutMode::Fixed);
        }
        if self.without_audio {
            options = options.without_audio(true);
        }
        if self.readium {
            options.readium_manifest = true;
        }
        if self.no_compress {
            options = options.with_compression(false);
        }
        if let Some(root) = &self.staging_root {
            options = options.with_staging_root(root);
        }
        for dir in &self.support_dirs {
            options = options.with_support_dir(dir);
        }
        for dir in &self.font_dirs {
            options = options.with_font_dir(dir);
        }
        if self.no_system_fonts {
            options = options.without_system_fonts();
        }
        Ok(options)
    }
}

/// Book folder plus support folders: where page stylesheets are looked up
fn search_dirs(book_folder: &Path, options: &EpubOptions) -> Vec<PathBuf> {
    let mut dirs = vec![book_folder.to_path_buf()];
    dirs.extend(options.support_dirs.iter().cloned());
    dirs
}

/// Assembler whose stylesheet renderer lives on its own thread, the way an
/// embedded browser would
fn assembler_for(
    book_folder: &Path,
    options: EpubOptions,
    progress: Arc<dyn ProgressSink>,
) -> Result<EpubAssembler> {
    let dirs = search_dirs(book_folder, &options);
    let oracle = UiThreadOracle::spawn(move || {
        let css = CssDisplayOracle::new(dirs);
        move |markup: &str| css.render(markup)
    })
    .context("Failed to start the page renderer")?;

    let fonts = FontCatalog::from_options(&options);
    let collaborators = Collaborators::new(Arc::new(oracle))
        .with_fonts(Arc::new(fonts))
        .with_progress(progress);
    Ok(EpubAssembler::new(options, collaborators))
}

/// `<name>.epub` next to the book folder
fn default_destination(book_folder: &Path) -> PathBuf {
    let name = book_folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "book".to_string());
    let parent = book_folder.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{}.epub", name))
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Shows staging progress messages on a spinner
struct SpinnerProgress(ProgressBar);

impl ProgressSink for SpinnerProgress {
    fn message(&self, text: &str) {
        self.0.set_message(text.to_string());
    }
}
