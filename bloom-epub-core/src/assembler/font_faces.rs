//! `fonts.css`: embedding the font families the book's visible text uses

use crate::error::Result;
use crate::fonts::FontCatalog;
use crate::staging::StagingContext;
use crate::transform::FONTS_CSS;

/// Which used families made it into the package
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontReport {
    pub embedded: Vec<String>,
    /// Families that are not installed or may not be embedded
    pub missing: Vec<String>,
}

/// An `@font-face` rule for the normal face of `family` packaged as `file_name`
pub fn font_face_rule(family: &str, file_name: &str) -> String {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let format = match extension.as_str() {
        "woff" => "woff",
        "woff2" => "woff2",
        _ => "opentype",
    };
    format!(
        "@font-face {{font-family:'{}'; font-weight:normal; font-style:normal; src:url('{}') format('{}');}}\n",
        family, file_name, format
    )
}

fn embed(
    family: &str,
    catalog: &FontCatalog,
    ctx: &mut StagingContext,
    css: &mut String,
) -> Result<bool> {
    let Some(path) = catalog.files_for_family(family).into_iter().next() else {
        return Ok(false);
    };
    match ctx.copy_to_staging(&path)? {
        Some(name) => {
            css.push_str(&font_face_rule(family, &name));
            tracing::debug!("Embedded font {} as {}", family, name);
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Copy the used families' files into the package and write `fonts.css`.
///
/// When some family cannot be embedded, `default_font` is embedded instead so
/// readers at least get a font that covers the book's script.
pub fn embed_fonts(
    ctx: &mut StagingContext,
    catalog: &FontCatalog,
    default_font: &str,
) -> Result<FontReport> {
    let mut css = String::new();
    let mut report = FontReport::default();

    let families: Vec<String> = ctx.fonts_used().iter().cloned().collect();
    for family in families {
        if embed(&family, catalog, ctx, &mut css)? {
            report.embedded.push(family);
        } else {
            let reason = catalog
                .cannot_embed()
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(&family))
                .map(|(_, reason)| reason.as_str())
                .unwrap_or("not installed");
            tracing::warn!("Font {} is not embedded: {}", family, reason);
            report.missing.push(family);
        }
    }

    let has_default = report
        .embedded
        .iter()
        .any(|family| family.eq_ignore_ascii_case(default_font));
    if !report.missing.is_empty() && !has_default && !default_font.is_empty() {
        if embed(default_font, catalog, ctx, &mut css)? {
            report.embedded.push(default_font.to_string());
        } else {
            tracing::warn!("Fallback font {} is not available", default_font);
        }
    }

    ctx.write_content(FONTS_CSS, &css)?;
    Ok(report)
}
