//! Stage command implementation

use super::{assembler_for, spinner, PublishArgs, SpinnerProgress};
use anyhow::{bail, Context, Result};
use bloom_epub_core::archive::{ArchiveWriter, TarArchiveWriter};
use bloom_epub_core::assembler::SessionPhase;
use bloom_epub_core::{Book, PublishSession};
use std::path::Path;
use std::sync::Arc;

/// Stage a book folder the way a preview does, optionally bundling the result
pub async fn stage(book: &str, bundle: Option<&str>, args: &PublishArgs) -> Result<()> {
    let folder = Path::new(book);
    let loaded =
        Book::load(folder).with_context(|| format!("Failed to load book folder: {}", book))?;
    let options = args.options()?;

    let pb = spinner();
    pb.set_message(format!("Staging '{}'...", loaded.title()));
    let progress = Arc::new(SpinnerProgress(pb.clone()));
    let session = PublishSession::new(folder, assembler_for(folder, options, progress)?);

    session
        .request_preview(true)
        .await
        .with_context(|| format!("Failed to stage {}", book))?;
    let phase = session.wait_until_settled().await;

    let staged = match (phase, session.staged()) {
        (SessionPhase::StagedReady, Some(staged)) => staged,
        _ => {
            pb.abandon_with_message("Staging failed");
            let reason = session
                .last_error()
                .unwrap_or_else(|| "the run was aborted".to_string());
            bail!("Failed to stage {}: {}", book, reason);
        }
    };
    pb.finish_with_message(format!("Staged '{}' ({} pages)", loaded.title(), staged.pages));
    println!("{}", staged.package_path().display());

    if let Some(bundle) = bundle {
        let mut writer = TarArchiveWriter::create(Path::new(bundle))?;
        writer.add_directory(&staged.staging_dir, "", &[])?;
        writer.save()?;
        tracing::info!("Bundled {} into {}", staged.staging_dir.display(), bundle);
    }
    Ok(())
}
