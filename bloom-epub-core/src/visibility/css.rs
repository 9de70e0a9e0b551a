//! Headless visibility oracle that evaluates `display` and `font-family` from CSS

use super::{RenderedPage, VisibilityOracle};
use crate::error::VisibilityError;
use crate::stylesheet::{is_generic_family, media_applies_on_screen, Declarations, Declared, StyleSheet};
use ego_tree::{NodeId, NodeRef};
use percent_encoding::percent_decode_str;
use scraper::{ElementRef, Html, Node, Selector};
use selectors::matching::{
    matches_selector, IgnoreNthChildForInvalidation, MatchingContext, MatchingMode, NeedsSelectorFlags,
    QuirksMode,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;

/// Cascade position of one declaration. Derived ordering compares fields in order;
/// specificity is the packed `(ids, classes, types)` value of the matching selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Priority {
    important: bool,
    inline: bool,
    specificity: u32,
    order: usize,
}

/// Winning `display` and `font-family` value per element
#[derive(Debug, Default)]
struct Winners {
    display: HashMap<NodeId, (Priority, String)>,
    font: HashMap<NodeId, (Priority, String)>,
}

fn offer_one(
    slot: &mut HashMap<NodeId, (Priority, String)>,
    node: NodeId,
    priority: Priority,
    declared: Option<&Declared>,
) {
    let Some(declared) = declared else {
        return;
    };
    let priority = Priority {
        important: declared.important,
        ..priority
    };
    let entry = slot.entry(node).or_insert((priority, declared.value.clone()));
    if priority >= entry.0 {
        *entry = (priority, declared.value.clone());
    }
}

impl Winners {
    fn offer(&mut self, node: NodeId, priority: Priority, decls: &Declarations) {
        offer_one(&mut self.display, node, priority, decls.display.as_ref());
        offer_one(&mut self.font, node, priority, decls.font_family.as_ref());
    }
}

/// Evaluates `display` with a small cascade (specificity, `!important`, inline
/// styles, source order) over the page's `<style>` elements and linked stylesheets.
///
/// Linked stylesheets are looked up by file name in the search folders. Only
/// `display: none` hides; layout-dependent hiding (zero size, overflow) is not modelled.
#[derive(Debug, Clone, Default)]
pub struct CssDisplayOracle {
    search_dirs: Vec<PathBuf>,
}

impl CssDisplayOracle {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }

    fn read_stylesheet(&self, href: &str) -> Option<String> {
        let name = href.rsplit('/').next()?;
        let name = percent_decode_str(name).decode_utf8_lossy();
        self.search_dirs
            .iter()
            .map(|dir| dir.join(name.as_ref()))
            .find(|path| path.is_file())
            .and_then(|path| match std::fs::read_to_string(&path) {
                Ok(css) => Some(css),
                Err(e) => {
                    tracing::debug!("Cannot read stylesheet {}: {}", path.display(), e);
                    None
                }
            })
    }

    fn collect_css(&self, html: &Html) -> Vec<String> {
        let Ok(sources) = Selector::parse("link, style") else {
            return Vec::new();
        };
        let mut sheets = Vec::new();
        for el in html.select(&sources) {
            let element = el.value();
            if !element.attr("media").map_or(true, media_applies_on_screen) {
                continue;
            }
            if element.name().eq_ignore_ascii_case("style") {
                sheets.push(el.text().collect::<String>());
            } else if element
                .attr("rel")
                .is_some_and(|rel| rel.eq_ignore_ascii_case("stylesheet"))
            {
                if let Some(css) = element.attr("href").and_then(|href| self.read_stylesheet(href)) {
                    sheets.push(css);
                }
            }
        }
        sheets
    }
}

fn walk(
    node: NodeRef<'_, Node>,
    winners: &Winners,
    parent_hidden: bool,
    inherited_font: Option<&str>,
    hidden: &mut HashSet<String>,
    fonts: &mut BTreeSet<String>,
) {
    let Node::Element(element) = node.value() else {
        return;
    };
    let id = node.id();
    let own_hidden = winners
        .display
        .get(&id)
        .is_some_and(|(_, value)| value == "none");
    let is_hidden = parent_hidden || own_hidden;
    let font = winners
        .font
        .get(&id)
        .map(|(_, value)| value.as_str())
        .or(inherited_font);

    if is_hidden {
        if let Some(element_id) = element.attr("id") {
            hidden.insert(element_id.to_string());
        }
    } else {
        let has_text = node.children().any(|child| match child.value() {
            Node::Text(text) => !text.trim().is_empty(),
            _ => false,
        });
        if has_text {
            if let Some(family) = font.filter(|family| !is_generic_family(family)) {
                fonts.insert(family.to_string());
            }
        }
    }

    for child in node.children() {
        walk(child, winners, is_hidden, font, hidden, fonts);
    }
}

impl VisibilityOracle for CssDisplayOracle {
    fn render(&self, page_markup: &str) -> Result<RenderedPage, VisibilityError> {
        let html = Html::parse_document(page_markup);
        let sheets: Vec<StyleSheet> = self
            .collect_css(&html)
            .iter()
            .map(|css| StyleSheet::parse(css))
            .collect();
        let elements: Vec<ElementRef<'_>> = html
            .tree
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .collect();

        let mut nth_index_cache = Default::default();
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut nth_index_cache,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            IgnoreNthChildForInvalidation::No,
        );
        let mut winners = Winners::default();
        let mut order = 0;
        for rule in sheets.iter().flat_map(StyleSheet::rules) {
            for selector in &rule.selectors {
                order += 1;
                let priority = Priority {
                    important: false,
                    inline: false,
                    specificity: selector.specificity(),
                    order,
                };
                for element in &elements {
                    if matches_selector(selector, 0, None, element, &mut context) {
                        winners.offer(element.id(), priority, &rule.declarations);
                    }
                }
            }
        }

        for element in &elements {
            if let Some(style) = element.value().attr("style") {
                order += 1;
                let priority = Priority {
                    important: false,
                    inline: true,
                    specificity: 0,
                    order,
                };
                winners.offer(element.id(), priority, &Declarations::parse_inline(style));
            }
        }

        let mut hidden = HashSet::new();
        let mut fonts = BTreeSet::new();
        for child in html.tree.root().children() {
            walk(child, &winners, false, None, &mut hidden, &mut fonts);
        }
        Ok(RenderedPage::new(hidden, fonts))
    }
}
