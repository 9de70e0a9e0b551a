//! Batch publishing command implementation

use super::{search_dirs, PublishArgs};
use anyhow::{bail, Context, Result};
use bloom_epub_core::fonts::FontCatalog;
use bloom_epub_core::types::find_book_file;
use bloom_epub_core::visibility::CssDisplayOracle;
use bloom_epub_core::{
    Book, Collaborators, EpubAssembler, EpubOptions, NullProgress, StageOutcome,
};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Publish every book folder found directly inside `input_dir`
pub fn batch(input_dir: &str, output_dir: &str, jobs: usize, args: &PublishArgs) -> Result<()> {
    let input_path = Path::new(input_dir);
    let output_path = Path::new(output_dir);
    let options = args.options()?;

    let mut books: Vec<_> = fs::read_dir(input_path)
        .with_context(|| format!("Failed to read {}", input_dir))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir() && find_book_file(p).is_ok())
        .collect();
    books.sort();

    if books.is_empty() {
        println!("No book folders found in {}", input_dir);
        return Ok(());
    }

    fs::create_dir_all(output_path)?;
    println!("Found {} books to publish", books.len());

    // One scan serves every book
    let fonts = Arc::new(FontCatalog::from_options(&options));

    let multi_progress = MultiProgress::new();
    let overall_pb = multi_progress.add(ProgressBar::new(books.len() as u64));
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );

    let success_count = AtomicUsize::new(0);
    let error_count = AtomicUsize::new(0);

    // Configure thread pool
    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build_global()
        .ok(); // Ignore if already configured

    books.par_iter().for_each(|folder| {
        match publish_book(folder, output_path, &options, &fonts) {
            Ok(()) => {
                success_count.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                error_count.fetch_add(1, Ordering::Relaxed);
                tracing::error!("Failed to publish {:?}: {:#}", folder, e);
            }
        }
        overall_pb.inc(1);
    });

    overall_pb.finish();

    let success = success_count.load(Ordering::Relaxed);
    let errors = error_count.load(Ordering::Relaxed);

    println!("\nBatch publishing complete:");
    println!("  Success: {}", success);
    println!("  Errors:  {}", errors);

    if errors > 0 {
        bail!("Batch publishing completed with {} errors", errors);
    }

    Ok(())
}

fn publish_book(
    folder: &Path,
    output_dir: &Path,
    options: &EpubOptions,
    fonts: &Arc<FontCatalog>,
) -> Result<()> {
    let book = Book::load(folder)?;
    let name = folder
        .file_name()
        .and_then(|s| s.to_str())
        .context("Could not determine output filename from book folder")?;
    let output_file = output_dir.join(format!("{}.epub", name));

    // Each worker renders on its own thread, so the headless oracle is used directly
    let oracle = CssDisplayOracle::new(search_dirs(folder, options));
    let collaborators = Collaborators::new(Arc::new(oracle))
        .with_fonts(Arc::clone(fonts))
        .with_progress(Arc::new(NullProgress));
    let assembler = EpubAssembler::new(options.clone(), collaborators);

    match assembler.publish(&book, &output_file)? {
        StageOutcome::Staged(staged) => {
            tracing::info!(
                "Published {:?} -> {:?} ({} pages)",
                folder,
                output_file,
                staged.pages
            );
            Ok(())
        }
        StageOutcome::Aborted => bail!("Publishing {:?} was aborted", folder),
    }
}
