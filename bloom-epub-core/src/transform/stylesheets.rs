//! Stylesheet links of a page: relocating, choosing and packaging them

use crate::dom::{Document, Element};
use crate::error::Result;
use crate::staging::StagingContext;
use crate::stylesheet::{is_generic_family, lang_attribute_values, StyleSheet};
use ego_tree::NodeId;
use percent_encoding::percent_decode_str;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Generated stylesheet holding the embedded `@font-face` rules
pub const FONTS_CSS: &str = "fonts.css";

pub(crate) const DEFAULT_LANG_STYLES: &str = "defaultLangStyles.css";

/// Stylesheets that belong to the book itself and are never looked up elsewhere.
/// They may legitimately be missing.
const BOOK_ONLY_STYLESHEETS: &[&str] = &["customCollectionStyles.css", DEFAULT_LANG_STYLES, "branding.css"];

/// Bare file name of a stylesheet reference: no `file://`, folders or query
pub fn href_file_name(href: &str) -> String {
    let href = href.trim();
    let href = href
        .strip_prefix("file:///")
        .or_else(|| href.strip_prefix("file://"))
        .unwrap_or(href);
    let path = href.split(['?', '#']).next().unwrap_or_default();
    let name = path.rsplit(['/', '\\']).next().unwrap_or_default();
    percent_decode_str(name).decode_utf8_lossy().into_owned()
}

/// `<link rel="stylesheet">` elements, in document order
pub fn stylesheet_links(doc: &Document) -> Vec<NodeId> {
    doc.select_all(|el| {
        el.is("link")
            && el
                .attr("rel")
                .is_some_and(|rel| rel.eq_ignore_ascii_case("stylesheet"))
    })
}

fn link_name(doc: &Document, link: NodeId) -> Option<String> {
    doc.element(link)?.attr("href").map(href_file_name)
}

/// Reduce every stylesheet reference to a bare file name
pub fn make_relocatable(doc: &mut Document) {
    for link in stylesheet_links(doc) {
        if let Some(name) = link_name(doc, link) {
            doc.update(link, |el| el.set_attr("href", name));
        }
    }
}

/// Drop the stylesheets that only make sense while editing or previewing
pub fn remove_mode_stylesheets(doc: &mut Document) {
    for link in stylesheet_links(doc) {
        let name = link_name(doc, link).unwrap_or_default().to_lowercase();
        if name.contains("edit") || name.contains("preview") {
            doc.remove(link);
        }
    }
}

/// Reflowable output keeps only the book's own customizations; the regular
/// page-layout stylesheets do not work in most readers.
pub fn remove_regular_stylesheets(doc: &mut Document) {
    for link in stylesheet_links(doc) {
        let name = link_name(doc, link).unwrap_or_default();
        if name.starts_with("custom") || name == DEFAULT_LANG_STYLES {
            continue;
        }
        doc.remove(link);
    }
}

/// Link a stylesheet from the page head unless it is linked already
pub fn add_stylesheet(doc: &mut Document, name: &str) {
    let present = stylesheet_links(doc)
        .into_iter()
        .any(|link| link_name(doc, link).as_deref() == Some(name));
    if present {
        return;
    }
    let Some(head) = doc.head() else {
        return;
    };
    let link = Element::new("link")
        .with_attr("rel", "stylesheet")
        .with_attr("href", name)
        .with_attr("type", "text/css");
    doc.append_element(head, link);
}

/// Text direction per language tag, from `[lang='xx'] { direction: rtl; }` rules
pub fn language_directions(css: &str) -> BTreeMap<String, String> {
    let mut directions = BTreeMap::new();
    for rule in StyleSheet::parse(css).rules() {
        let Some(direction) = &rule.declarations.direction else {
            continue;
        };
        for lang in lang_attribute_values(&rule.selector_text) {
            directions.insert(lang, direction.value.clone());
        }
    }
    directions
}

/// First family of each `font-family` declaration that applies on screen
pub fn declared_font_families(css: &str) -> Vec<String> {
    StyleSheet::parse(css)
        .rules()
        .iter()
        .filter_map(|rule| rule.declarations.font_family.as_ref())
        .map(|family| family.value.clone())
        .filter(|family| !is_generic_family(family))
        .collect()
}

/// Copies the stylesheets pages link to into the package, once each, and
/// points the links at the packaged names
#[derive(Debug, Default)]
pub struct StylesheetPublisher {
    /// Linked file name -> packaged name, or `None` when it cannot be found
    staged: HashMap<String, Option<String>>,
    directions: BTreeMap<String, String>,
}

impl StylesheetPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Language directions declared by the book's `defaultLangStyles.css`
    pub fn directions(&self) -> &BTreeMap<String, String> {
        &self.directions
    }

    /// Package every linked stylesheet and rewrite the links. Links to files
    /// that exist nowhere are removed. `fonts.css` is generated later and left alone.
    pub fn publish_links(&mut self, doc: &mut Document, ctx: &mut StagingContext) -> Result<()> {
        for link in stylesheet_links(doc) {
            let Some(name) = link_name(doc, link) else {
                doc.remove(link);
                continue;
            };
            if name == FONTS_CSS {
                continue;
            }
            match self.stage(&name, ctx)? {
                Some(staged) => {
                    doc.update(link, |el| el.set_attr("href", staged));
                }
                None => doc.remove(link),
            }
        }
        Ok(())
    }

    fn stage(&mut self, name: &str, ctx: &mut StagingContext) -> Result<Option<String>> {
        if let Some(staged) = self.staged.get(name) {
            return Ok(staged.clone());
        }
        let staged = match self.locate(name, ctx) {
            Some(path) => {
                self.inspect(name, &path, ctx);
                ctx.copy_to_staging(&path)?
            }
            None => None,
        };
        self.staged.insert(name.to_string(), staged.clone());
        Ok(staged)
    }

    fn locate(&self, name: &str, ctx: &StagingContext) -> Option<PathBuf> {
        if BOOK_ONLY_STYLESHEETS.contains(&name) {
            let path = ctx.book_folder().join(name);
            return path.is_file().then_some(path);
        }
        let found = ctx.find_support_file(name);
        if found.is_none() {
            tracing::warn!("Stylesheet {} not found; link dropped", name);
        }
        found
    }

    /// Pick up what the package needs to know from a stylesheet before it is
    /// copied without its `direction` declarations
    fn inspect(&mut self, name: &str, path: &Path, ctx: &mut StagingContext) {
        if !path.starts_with(ctx.book_folder()) {
            return;
        }
        let Ok(css) = std::fs::read_to_string(path) else {
            return;
        };
        if name == DEFAULT_LANG_STYLES {
            self.directions = language_directions(&css);
        }
        for family in declared_font_families(&css) {
            ctx.note_font(family);
        }
    }
}

/// Set `dir` on the body from the primary language, and on `div[lang]` elements
/// when some language runs the other way
pub fn set_dir_attributes(doc: &mut Document, body_dir: &str, directions: &BTreeMap<String, String>) {
    if let Some(body) = doc.body() {
        doc.update(body, |el| el.set_attr("dir", body_dir));
    }
    if directions.values().all(|dir| dir == body_dir) {
        return;
    }
    for div in doc.select_all(|el| el.is("div") && el.has_attr("lang")) {
        let dir = doc
            .element(div)
            .and_then(|el| el.attr("lang"))
            .and_then(|lang| directions.get(lang))
            .cloned();
        if let Some(dir) = dir {
            doc.update(div, |el| el.set_attr("dir", dir));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(head: &str) -> Document {
        Document::parse(&format!(
            "<html><head>{}</head><body><div lang=\"ar\">x</div><div lang=\"en\">y</div></body></html>",
            head
        ))
        .unwrap()
    }

    fn hrefs(doc: &Document) -> Vec<String> {
        stylesheet_links(doc)
            .into_iter()
            .filter_map(|l| doc.element(l)?.attr("href").map(str::to_string))
            .collect()
    }

    #[test]
    fn test_href_file_name() {
        assert_eq!(href_file_name("file:///C:/Bloom/browser/basePage.css"), "basePage.css");
        assert_eq!(href_file_name("../styles/my%20styles.css?v=3"), "my styles.css");
        assert_eq!(href_file_name(r"C:\books\custom.css"), "custom.css");
    }

    #[test]
    fn test_flowable_stylesheet_selection() {
        let mut doc = page(
            r#"<link rel="stylesheet" href="file:///x/basePage.css"/>
<link rel="stylesheet" href="editMode.css"/>
<link rel="stylesheet" href="customBookStyles.css"/>
<link rel="stylesheet" href="defaultLangStyles.css"/>"#,
        );
        make_relocatable(&mut doc);
        remove_mode_stylesheets(&mut doc);
        assert_eq!(hrefs(&doc), vec!["basePage.css", "customBookStyles.css", "defaultLangStyles.css"]);

        remove_regular_stylesheets(&mut doc);
        add_stylesheet(&mut doc, "baseEPUB.css");
        add_stylesheet(&mut doc, "baseEPUB.css");
        assert_eq!(
            hrefs(&doc),
            vec!["customBookStyles.css", "defaultLangStyles.css", "baseEPUB.css"]
        );
    }

    #[test]
    fn test_language_directions_and_fonts() {
        let css = "/* generated */ [lang='ar'] { font-family: 'Scheherazade New', serif; direction: rtl; }\n\
                   [lang=\"en\"] { font-family: Andika; direction: ltr; }\n\
                   .x { font-family: sans-serif; }";
        let directions = language_directions(css);
        assert_eq!(directions.get("ar").map(String::as_str), Some("rtl"));
        assert_eq!(directions.get("en").map(String::as_str), Some("ltr"));
        assert_eq!(
            declared_font_families(css),
            vec!["Scheherazade New".to_string(), "Andika".to_string()]
        );
    }

    #[test]
    fn test_dir_attributes_only_when_directions_differ() {
        let mut same = page("");
        let directions: BTreeMap<String, String> =
            [("en".to_string(), "ltr".to_string())].into_iter().collect();
        set_dir_attributes(&mut same, "ltr", &directions);
        assert_eq!(same.element(same.body().unwrap()).unwrap().attr("dir"), Some("ltr"));
        assert!(same.select_all(|el| el.is("div") && el.has_attr("dir")).is_empty());

        let mut mixed = page("");
        let directions: BTreeMap<String, String> = [
            ("en".to_string(), "ltr".to_string()),
            ("ar".to_string(), "rtl".to_string()),
        ]
        .into_iter()
        .collect();
        set_dir_attributes(&mut mixed, "ltr", &directions);
        let dirs: Vec<&str> = mixed
            .select_all(|el| el.is("div"))
            .into_iter()
            .filter_map(|d| mixed.element(d)?.attr("dir"))
            .collect();
        assert_eq!(dirs, vec!["rtl", "ltr"]);
    }

    #[test]
    fn test_missing_stylesheets_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let book = dir.path().join("book");
        let support = dir.path().join("support");
        std::fs::create_dir_all(&book).unwrap();
        std::fs::create_dir_all(&support).unwrap();
        std::fs::write(support.join("baseEPUB.css"), "p { direction: ltr; }").unwrap();
        std::fs::write(book.join("defaultLangStyles.css"), "[lang='ar'] { direction: rtl; }").unwrap();
        let mut ctx =
            StagingContext::create(&book, &dir.path().join("stage"), vec![support]).unwrap();

        let mut doc = page(
            r#"<link rel="stylesheet" href="baseEPUB.css"/>
<link rel="stylesheet" href="branding.css"/>
<link rel="stylesheet" href="defaultLangStyles.css"/>
<link rel="stylesheet" href="nowhere.css"/>
<link rel="stylesheet" href="fonts.css"/>"#,
        );
        let mut publisher = StylesheetPublisher::new();
        publisher.publish_links(&mut doc, &mut ctx).unwrap();
        assert_eq!(hrefs(&doc), vec!["baseEPUB.css", "defaultLangStyles.css", "fonts.css"]);
        assert_eq!(publisher.directions().get("ar").map(String::as_str), Some("rtl"));

        let copied = std::fs::read_to_string(ctx.content_dir().join("baseEPUB.css")).unwrap();
        assert!(!copied.contains("direction"));
        assert_eq!(ctx.copied_count(), 2);
    }
}
