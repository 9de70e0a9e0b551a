//! Turning one book page into an ePub content document.
//!
//! Each page is cut out of the book into a document of its own, checked against
//! the visibility oracle, stripped of editor markup and written as `{n}.xhtml`
//! with its pictures, stylesheets and narration packaged alongside.

mod cleanup;
mod images;
mod stylesheets;

pub use cleanup::{convert_headings, has_svg, is_scripted};
pub use images::{fix_picture_sizes, image_file_name};
pub use stylesheets::{href_file_name, language_directions, FONTS_CSS};

use crate::audio::{AudioOverlayBuilder, AudioResolver, PageOverlay};
use crate::config::{EpubOptions, LayoutMode};
use crate::dom::{Document, Element};
use crate::error::{DomError, Result};
use crate::manifest::ItemProperty;
use crate::patterns::CSS_URL_RE;
use crate::staging::StagingContext;
use crate::types::{Book, PageSize};
use crate::visibility::VisibilityOracle;
use ego_tree::NodeId;
use stylesheets::StylesheetPublisher;

/// Prefix of the ids given to elements for the visibility check
pub const TEMP_ID_MARKER: &str = "PublishTempIdXXYY";

const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Page classes that never make it into the package
const UNPUBLISHABLE_PAGE_CLASSES: &[&str] = &["bloom-nonprinting", "bloom-interactive-page"];

/// A page written into the package
#[derive(Debug)]
pub struct PageUnit {
    /// 1-based position among the written pages
    pub index: usize,
    /// File name inside the content folder, `{index}.xhtml`
    pub name: String,
    /// Manifest id
    pub id: String,
    /// The document as written
    pub document: Document,
    pub overlay: Option<PageOverlay>,
}

/// What became of one book page
#[derive(Debug)]
pub enum PageOutcome {
    /// Left out because it cannot work in an ePub; carries the page label
    Omitted(String),
    /// Nothing visible remained
    Blank,
    Page(PageUnit),
}

/// Transforms the pages of one book, in order, during one staging run
pub struct PageTransformer<'a> {
    book: &'a Book,
    layout: LayoutMode,
    publish_audio: bool,
    oracle: &'a dyn VisibilityOracle,
    audio: &'a dyn AudioResolver,
    stylesheets: StylesheetPublisher,
    pages_written: usize,
    temp_ids: usize,
}

impl<'a> PageTransformer<'a> {
    pub fn new(
        book: &'a Book,
        options: &EpubOptions,
        oracle: &'a dyn VisibilityOracle,
        audio: &'a dyn AudioResolver,
    ) -> Self {
        Self {
            book,
            layout: options.layout,
            publish_audio: !options.publish_without_audio,
            oracle,
            audio,
            stylesheets: StylesheetPublisher::new(),
            pages_written: 0,
            temp_ids: 0,
        }
    }

    /// Number of content documents written so far
    pub fn pages_written(&self) -> usize {
        self.pages_written
    }

    /// Transform the book page `page` and write it into the package
    pub fn transform(&mut self, page: NodeId, ctx: &mut StagingContext) -> Result<PageOutcome> {
        let book = self.book;
        let page_el = book
            .dom()
            .element(page)
            .ok_or_else(|| DomError::MissingElement("bloom-page".to_string()))?;
        if UNPUBLISHABLE_PAGE_CLASSES
            .iter()
            .any(|class| page_el.class_contains(class))
        {
            let label = self.book.page_label(page);
            tracing::debug!("Omitting page '{}'", label);
            ctx.note_omitted_page(label.clone());
            return Ok(PageOutcome::Omitted(label));
        }

        let mut doc = self.page_document(page)?;
        self.choose_stylesheets(&mut doc);
        self.remove_invisible(&mut doc, ctx)?;

        cleanup::remove_editor_elements(&mut doc);
        cleanup::remove_editor_attributes(&mut doc);
        cleanup::remove_spurious_links(&mut doc);
        cleanup::move_tab_indexes(&mut doc);
        if self.layout.is_flowable() {
            let page_width = page_width_mm(&doc);
            images::fix_picture_sizes(&mut doc, page_width);
        }
        cleanup::fix_illegal_ids(&mut doc);

        if self.is_blank(&doc) {
            tracing::debug!("Page '{}' is blank", self.book.page_label(page));
            return Ok(PageOutcome::Blank);
        }
        cleanup::convert_headings(&mut doc);

        images::set_alt_text(&mut doc);
        images::copy_images(&mut doc, ctx)?;

        let index = self.pages_written + 1;
        let name = format!("{}.xhtml", index);
        let id = ctx.register(&name)?;
        self.pages_written = index;
        self.add_to_reading_order(page_el, &name, &id, ctx);

        let overlay = if self.publish_audio {
            AudioOverlayBuilder::new(self.audio).build(&mut doc, &name, ctx)?
        } else {
            None
        };

        rewrite_renamed_references(&mut doc, ctx);
        self.stylesheets.publish_links(&mut doc, ctx)?;
        stylesheets::add_stylesheet(&mut doc, FONTS_CSS);

        let body_dir = if self.book.is_rtl() { "rtl" } else { "ltr" };
        stylesheets::set_dir_attributes(&mut doc, body_dir, self.stylesheets.directions());
        cleanup::unwrap_internal_links(&mut doc);
        if let Some(html) = doc.document_element() {
            doc.update(html, |el| el.set_attr("xmlns", XHTML_NAMESPACE));
        }

        let svg = cleanup::has_svg(&doc);
        let scripted = cleanup::is_scripted(&doc);
        ctx.write_content(&name, &doc.to_xhtml()?)?;
        if let Some(item) = ctx.manifest_mut().item_by_href_mut(&name) {
            if svg {
                item.add_property(ItemProperty::Svg);
            }
            if scripted {
                item.add_property(ItemProperty::Scripted);
            }
        }
        tracing::debug!("Wrote page {} as {}", self.book.page_label(page), name);

        Ok(PageOutcome::Page(PageUnit {
            index,
            name,
            id,
            document: doc,
            overlay,
        }))
    }

    /// `<html>` with the book's head and a body carrying the book body's `data-*`
    /// attributes, stylesheet links reduced to bare file names
    fn page_shell(&self) -> Result<Document> {
        let source = self.book.dom();
        let mut doc = Document::new();
        let html = doc
            .append_element(doc.root_id(), Element::new("html"))
            .ok_or_else(|| DomError::MissingElement("html".to_string()))?;
        match source.head() {
            Some(head) => {
                doc.import(html, source, head);
            }
            None => {
                doc.append_element(html, Element::new("head"));
            }
        }

        let mut body = Element::new("body");
        if let Some(book_body) = source.body().and_then(|b| source.element(b)) {
            for (name, value) in book_body.attrs().filter(|(name, _)| name.starts_with("data-")) {
                body.set_attr(name, value);
            }
        }
        doc.append_element(html, body);
        stylesheets::make_relocatable(&mut doc);
        Ok(doc)
    }

    fn page_document(&self, page: NodeId) -> Result<Document> {
        let mut doc = self.page_shell()?;
        let body = doc
            .body()
            .ok_or_else(|| DomError::MissingElement("body".to_string()))?;
        doc.import(body, self.book.dom(), page);
        Ok(doc)
    }

    fn choose_stylesheets(&self, doc: &mut Document) {
        stylesheets::remove_mode_stylesheets(doc);
        if let Some(body) = doc.body() {
            doc.update(body, |el| {
                el.remove_attr("editMode");
                el.add_class("epub");
            });
        }
        match self.layout {
            LayoutMode::Flowable => {
                stylesheets::remove_regular_stylesheets(doc);
                stylesheets::add_stylesheet(doc, "baseEPUB.css");
                stylesheets::add_stylesheet(doc, "branding.css");
            }
            LayoutMode::Fixed => {
                stylesheets::add_stylesheet(doc, "previewMode.css");
                stylesheets::add_stylesheet(doc, "origami.css");
                add_viewport(doc, self.book.page_size());
            }
        }
    }

    /// Ask the oracle which elements show and drop the `div`s and `img`s that
    /// don't. The oracle sees the page under the book's own stylesheets.
    fn remove_invisible(&mut self, doc: &mut Document, ctx: &mut StagingContext) -> Result<()> {
        let Some(body) = doc.body() else {
            return Ok(());
        };
        for id in doc.select(body, |el| el.id().is_none()) {
            if id == body {
                continue;
            }
            self.temp_ids += 1;
            let temp_id = format!("{}{}", TEMP_ID_MARKER, self.temp_ids);
            doc.update(id, |el| el.set_attr("id", temp_id));
        }

        let rendered = self.oracle.render(&self.display_markup(doc, body)?)?;
        for family in rendered.font_families() {
            ctx.note_font(family.clone());
        }

        let hidden = doc.select(body, |el| {
            (el.is("div") || el.is("img")) && el.id().is_some_and(|id| !rendered.is_displayed(id))
        });
        let mut removed = 0;
        for id in hidden {
            if !doc.is_attached(id) || is_nonempty_image_description(doc, id) {
                continue;
            }
            doc.remove(id);
            removed += 1;
        }
        if removed > 0 {
            tracing::debug!("Removed {} hidden elements", removed);
        }

        for id in doc.select(body, |el| el.id().is_some_and(|id| id.starts_with(TEMP_ID_MARKER))) {
            doc.update(id, |el| el.remove_attr("id"));
        }
        Ok(())
    }

    /// The page body under the book's original head
    fn display_markup(&self, doc: &Document, body: NodeId) -> Result<String> {
        let mut display = self.page_shell()?;
        let display_body = display
            .body()
            .ok_or_else(|| DomError::MissingElement("body".to_string()))?;
        if let Some(el) = doc.element(body).cloned() {
            display.update(display_body, |target| *target = el);
        }
        let children: Vec<NodeId> = doc
            .get(body)
            .map(|node| node.children().map(|c| c.id()).collect())
            .unwrap_or_default();
        for child in children {
            display.import(display_body, doc, child);
        }
        Ok(display.to_markup()?)
    }

    fn is_blank(&self, doc: &Document) -> bool {
        let Some(body) = doc.body() else {
            return true;
        };
        doc.text_content(body).trim().is_empty()
            && !images::has_real_image(doc, self.book.folder())
            && doc
                .select(body, |el| el.is("div") && el.class_contains("bloom-force-publish"))
                .is_empty()
    }

    fn add_to_reading_order(&self, page: &Element, name: &str, id: &str, ctx: &mut StagingContext) {
        let manifest = ctx.manifest_mut();
        manifest.add_to_spine(id);
        if manifest.cover_page().is_none() {
            manifest.set_cover_page(name);
        }
        let matter = page.has_class("bloom-frontMatter") || page.has_class("bloom-backMatter");
        if manifest.first_content_page().is_none() && !matter {
            manifest.set_first_content_page(name);
        }
    }
}

fn is_nonempty_image_description(doc: &Document, id: NodeId) -> bool {
    let Some(el) = doc.element(id) else {
        return false;
    };
    (el.class_contains("ImageDescriptionEdit-style") || el.class_contains("bloom-imageDescription"))
        && !doc.text_content(id).trim().is_empty()
}

/// Width of the page in millimetres, from its size class
fn page_width_mm(doc: &Document) -> f64 {
    doc.select_all(|el| el.has_class("bloom-page"))
        .first()
        .and_then(|page| doc.element(*page))
        .and_then(|el| el.attr("class"))
        .and_then(PageSize::from_classes)
        .map(|size| size.width_mm())
        .unwrap_or(210.0)
}

/// Fixed-layout pages declare their size in CSS pixels
fn add_viewport(doc: &mut Document, size: PageSize) {
    let Some(head) = doc.head() else {
        return;
    };
    let (width_mm, height_mm) = size.dimensions_mm();
    let to_px = |mm: f64| (mm / 25.4 * 96.0).round() as i64;
    let content = format!("width={}, height={}", to_px(width_mm), to_px(height_mm));
    doc.append_element(
        head,
        Element::new("meta").with_attr("name", "viewport").with_attr("content", content),
    );
}

/// Point `src` attributes and inline `url()`s at the names files were given in
/// the package when those differ from the book's own names
fn rewrite_renamed_references(doc: &mut Document, ctx: &StagingContext) {
    for id in doc.select_all(|el| el.has_attr("src") || el.has_attr("style")) {
        let Some(el) = doc.element(id) else {
            continue;
        };
        let src = el
            .attr("src")
            .and_then(image_file_name)
            .and_then(|name| ctx.renamed(&name))
            .map(str::to_string);
        let style = el.attr("style").and_then(|style| {
            let rewritten = CSS_URL_RE.replace_all(style, |caps: &regex::Captures| {
                match image_file_name(&caps[1]).and_then(|name| ctx.renamed(&name)) {
                    Some(renamed) => format!("url('{}')", renamed),
                    None => caps[0].to_string(),
                }
            });
            (rewritten != style).then(|| rewritten.into_owned())
        });
        doc.update(id, |el| {
            if let Some(src) = src {
                el.set_attr("src", src);
            }
            if let Some(style) = style {
                el.set_attr("style", style);
            }
        });
    }
}
