//! Removing editor-only markup from SVG images

use crate::dom::Document;
use crate::error::DomError;

const EDITOR_PREFIXES: &[&str] = &["inkscape:", "sodipodi:", "rdf:"];

fn is_editor_name(name: &str) -> bool {
    EDITOR_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Strip Inkscape/Sodipodi/RDF elements and attributes, `flowRoot` elements and
/// `overflow` attributes. Readers do not need them and epubcheck rejects them.
pub fn prune_svg(markup: &str) -> Result<String, DomError> {
    let mut doc = Document::parse(markup)?;

    let unwanted = doc.select_all(|el| is_editor_name(&el.name) || el.name == "flowRoot");
    let mut removed_attrs = 0;
    for id in doc.select_all(|_| true) {
        removed_attrs += doc
            .update(id, |el| {
                let before = el.attrs().count();
                el.retain_attrs(|name, _| !is_editor_name(name) && name != "overflow");
                before - el.attrs().count()
            })
            .unwrap_or(0);
    }
    for id in &unwanted {
        doc.remove(*id);
    }
    tracing::debug!(
        "Pruned {} elements and {} attributes from svg",
        unwanted.len(),
        removed_attrs
    );

    doc.to_xhtml()
}
