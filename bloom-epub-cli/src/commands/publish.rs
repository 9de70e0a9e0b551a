//! Publish command implementation

use super::{assembler_for, default_destination, spinner, PublishArgs, SpinnerProgress};
use anyhow::{bail, Context, Result};
use bloom_epub_core::assembler::SaveStatus;
use bloom_epub_core::{Book, PublishSession};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Stage a book folder and save it as an .epub file
pub async fn publish(book: &str, output: Option<&str>, args: &PublishArgs) -> Result<()> {
    let folder = Path::new(book);
    let loaded =
        Book::load(folder).with_context(|| format!("Failed to load book folder: {}", book))?;
    let options = args.options()?;
    let destination = output
        .map(PathBuf::from)
        .unwrap_or_else(|| default_destination(folder));

    let pb = spinner();
    pb.set_message(format!("Preparing '{}'...", loaded.title()));
    let progress = Arc::new(SpinnerProgress(pb.clone()));
    let session = PublishSession::new(folder, assembler_for(folder, options, progress)?);

    let status = session
        .request_save(&destination)
        .await
        .with_context(|| format!("Failed to publish {}", book))?;
    if status == SaveStatus::Deferred {
        session.wait_until_settled().await;
    }

    if let Some(error) = session.last_error() {
        pb.abandon_with_message("Publishing failed");
        bail!("Failed to publish {}: {}", book, error);
    }
    let Some(staged) = session.staged().filter(|_| destination.is_file()) else {
        pb.abandon_with_message("Publishing stopped");
        bail!("Publishing {} stopped before the ePub was written", book);
    };

    for page in &staged.omitted_pages {
        tracing::info!("Left out page '{}'", page);
    }
    for family in &staged.fonts.missing {
        tracing::warn!("Font '{}' could not be embedded", family);
    }
    tracing::info!(
        "Published '{}' with {} pages{}",
        loaded.title(),
        staged.pages,
        if staged.has_audio { " and narration" } else { "" }
    );

    pb.finish_with_message(format!(
        "Published '{}' -> {}",
        loaded.title(),
        destination.display()
    ));
    Ok(())
}
