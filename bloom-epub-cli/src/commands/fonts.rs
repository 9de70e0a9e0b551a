//! Fonts command implementation

use anyhow::Result;
use bloom_epub_core::fonts::{system_font_dirs, FontCatalog};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Font catalog output
#[derive(Serialize)]
struct FontListing {
    embeddable: Vec<String>,
    /// Family -> reason it may not be embedded
    not_embeddable: BTreeMap<String, String>,
}

/// List the installed font families and whether they can be embedded
pub fn fonts(font_dirs: &[String], include_system: bool, json: bool) -> Result<()> {
    let mut dirs: Vec<PathBuf> = font_dirs.iter().map(PathBuf::from).collect();
    if include_system {
        dirs.extend(system_font_dirs());
    }
    let catalog = FontCatalog::new(dirs);

    let listing = FontListing {
        embeddable: catalog.families().into_iter().map(str::to_string).collect(),
        not_embeddable: catalog.cannot_embed().clone(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if listing.embeddable.is_empty() && listing.not_embeddable.is_empty() {
        println!("No fonts found");
        return Ok(());
    }
    for family in &listing.embeddable {
        println!("{}", family);
    }
    for (family, reason) in &listing.not_embeddable {
        println!("{} (cannot embed: {})", family, reason);
    }
    Ok(())
}
