//! Removing editor markup and fixing up what ePub validators object to

use crate::dom::{Document, Element, Node};
use crate::patterns::HEADING_CLASS_RE;
use ego_tree::NodeId;
use std::collections::HashSet;

/// Event handler attributes that make a page `scripted`
const EVENT_ATTRIBUTES: &[&str] = &[
    "onafterprint", "onbeforeprint", "onbeforeunload", "onblur", "onchange", "onclick",
    "onerror", "onfocus", "onhashchange", "oninput", "onkeydown", "onkeyup", "onload",
    "onmessage", "onmousedown", "onmouseup", "onoffline", "ononline", "onpagehide",
    "onpageshow", "onpopstate", "onresize", "onstorage", "onunload",
];

const TEXTBOX_ATTRIBUTES: &[&str] = &["role", "aria-label", "spellcheck", "content-editable"];

/// Detach every element matching `pred`; returns how many were removed
fn remove_matching(doc: &mut Document, pred: impl Fn(&Element) -> bool) -> usize {
    let matches = doc.select_all(pred);
    let mut removed = 0;
    for id in matches {
        // An ancestor may have gone already
        if doc.is_attached(id) {
            doc.remove(id);
            removed += 1;
        }
    }
    removed
}

/// Editor-only elements: UI chrome, page labels, hidden selections, user-hidden
/// content and scripts
pub fn remove_editor_elements(doc: &mut Document) -> usize {
    remove_matching(doc, |el| {
        el.has_class("bloom-ui")
            || (el.is("label") && el.has_class("bubble"))
            || (el.is("div") && (el.has_class("pageLabel") || el.has_class("pageDescription")))
            || el.has_attr("data-cke-hidden-sel")
            || el.has_class("bloom-userHidden")
            || el.is("script")
    })
}

fn is_placeholder_src(src: Option<&str>) -> bool {
    match src.map(str::trim) {
        None | Some("") => true,
        Some(src) => src
            .rsplit(['/', '\\'])
            .next()
            .is_some_and(|name| name.eq_ignore_ascii_case("placeHolder.png")),
    }
}

/// Editing attributes and placeholder pictures
pub fn remove_editor_attributes(doc: &mut Document) {
    for id in doc.select_all(|_| true) {
        doc.update(id, |el| {
            el.remove_attr("recordingmd5");
            el.remove_attr("contenteditable");
            if el.is("div") && el.attr("role") == Some("textbox") {
                for attr in TEXTBOX_ATTRIBUTES {
                    el.remove_attr(attr);
                }
            }
            if el.is("div") && el.has_class("split-pane-component-inner") {
                if let Some(style) = el.attr("style") {
                    let kept: Vec<&str> = style
                        .split(';')
                        .map(str::trim)
                        .filter(|decl| {
                            !decl.is_empty()
                                && !decl.starts_with("min-height")
                                && !decl.starts_with("min-width")
                        })
                        .collect();
                    if kept.is_empty() {
                        el.remove_attr("style");
                    } else {
                        el.set_attr("style", format!("{};", kept.join("; ")));
                    }
                }
            }
        });
    }

    for img in doc.select_all(|el| el.is("img")) {
        if is_placeholder_src(doc.element(img).and_then(|el| el.attr("src"))) {
            doc.remove(img);
            continue;
        }
        // Tooltips are an editing aid
        if let Some(parent) = doc.parent(img) {
            doc.update(parent, |el| el.remove_attr("title"));
        }
        doc.update(img, |el| {
            el.remove_attr("title");
            el.remove_attr("type");
        });
    }
}

/// `aria-describedby` pointing at ids that are not on the page, and empty or
/// `*` language tags
pub fn remove_spurious_links(doc: &mut Document) {
    let ids: HashSet<String> = doc
        .select_all(|el| el.id().is_some())
        .into_iter()
        .filter_map(|id| doc.element(id)?.id().map(str::to_string))
        .collect();
    for id in doc.select_all(|el| el.has_attr("aria-describedby") || el.has_attr("lang")) {
        doc.update(id, |el| {
            let dangling = el
                .attr("aria-describedby")
                .is_some_and(|refs| refs.split_whitespace().any(|r| !ids.contains(r)) || refs.trim().is_empty());
            if dangling {
                el.remove_attr("aria-describedby");
            }
            if matches!(el.attr("lang").map(str::trim), Some("") | Some("*")) {
                el.remove_attr("lang");
            }
        });
    }
}

/// Drop `tabindex`. A translation group's non-zero tab index is the reading
/// order of its narration, so it moves to its audio sentences.
pub fn move_tab_indexes(doc: &mut Document) {
    for id in doc.select_all(|el| el.has_attr("tabindex")) {
        let Some(el) = doc.element(id) else {
            continue;
        };
        let tab_index = el.attr("tabindex").unwrap_or_default().to_string();
        if tab_index != "0" && el.class_contains("bloom-translationGroup") {
            for sentence in doc.select(id, |el| el.has_class("audio-sentence")) {
                doc.update(sentence, |el| el.set_attr("data-audio-order", tab_index.as_str()));
            }
        }
        doc.update(id, |el| el.remove_attr("tabindex"));
    }
}

/// XML ids may not start with a digit
pub fn fix_illegal_ids(doc: &mut Document) {
    for id in doc.select_all(|el| el.id().is_some_and(|v| v.starts_with(|c: char| c.is_ascii_digit()))) {
        doc.update(id, |el| {
            let fixed = format!("i{}", el.attr("id").unwrap_or_default());
            el.set_attr("id", fixed);
        });
    }
}

/// Links within the page go nowhere in a reader; keep their content only
pub fn unwrap_internal_links(doc: &mut Document) {
    for link in doc.select_all(|el| el.is("a") && el.attr("href").is_some_and(|h| h.starts_with('#'))) {
        doc.unwrap_element(link);
    }
}

/// `div.Heading2` becomes `<h2>`, with paragraph markup flattened since
/// paragraphs are not allowed inside headings
pub fn convert_headings(doc: &mut Document) {
    for div in doc.select_all(|el| el.is("div") && el.class_contains("Heading")) {
        let Some(el) = doc.element(div) else {
            continue;
        };
        let Some(level) = el
            .attr("class")
            .and_then(|c| HEADING_CLASS_RE.captures(c))
            .map(|caps| caps[1].to_string())
        else {
            continue;
        };
        let mut heading = el.clone();
        heading.name = format!("h{}", level);

        let children: Vec<NodeId> = doc
            .get(div)
            .map(|n| n.children().map(|c| c.id()).collect())
            .unwrap_or_default();
        let Some(heading) = doc.replace_with(div, Node::Element(heading)) else {
            continue;
        };
        let mut paragraph_seen = false;
        for child in children {
            if doc.element(child).is_some_and(|el| el.is("p")) {
                if paragraph_seen {
                    doc.append_element(heading, Element::new("br"));
                }
                let grandchildren: Vec<NodeId> = doc
                    .get(child)
                    .map(|n| n.children().map(|c| c.id()).collect())
                    .unwrap_or_default();
                for grandchild in grandchildren {
                    doc.move_to(heading, grandchild);
                }
                paragraph_seen = true;
            } else {
                doc.move_to(heading, child);
            }
        }
    }
}

/// Whether any element is a script or carries an `on*` event handler
pub fn is_scripted(doc: &Document) -> bool {
    !doc.select_all(|el| {
        el.is("script")
            || el
                .attrs()
                .any(|(name, _)| EVENT_ATTRIBUTES.contains(&name.to_ascii_lowercase().as_str()))
    })
    .is_empty()
}

/// Whether the page has inline SVG or pictures that are SVG files
pub fn has_svg(doc: &Document) -> bool {
    !doc.select_all(|el| {
        el.is("svg")
            || (el.is("img")
                && el
                    .attr("src")
                    .is_some_and(|src| src.to_ascii_lowercase().ends_with(".svg")))
    })
    .is_empty()
}
