//! Mutable markup tree for book pages
//!
//! Pages are parsed into an [`ego_tree::Tree`] so the transformation steps can delete,
//! unwrap and re-parent nodes freely, then written back out as XHTML.

mod builder;
mod parse;
mod serialize;

pub use builder::XmlBuilder;

use ego_tree::{NodeId, NodeRef, Tree};

/// Elements that never have content and are written self-closing
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

pub(crate) fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

/// A node in the markup tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Document,
    Doctype(String),
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }
}

/// An element with its attributes in document order
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    attrs: Vec<(String, String)>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Case-insensitive tag name comparison
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self.attrs.iter().position(|(k, _)| k == name)?;
        Some(self.attrs.remove(pos).1)
    }

    /// Keep only the attributes for which `keep` returns true
    pub fn retain_attrs(&mut self, mut keep: impl FnMut(&str, &str) -> bool) {
        self.attrs.retain(|(k, v)| keep(k, v));
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id").filter(|id| !id.is_empty())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Substring match on the class attribute, like XPath `contains(@class, ...)`
    pub fn class_contains(&self, fragment: &str) -> bool {
        self.attr("class").is_some_and(|c| c.contains(fragment))
    }

    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let value = match self.attr("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        self.set_attr("class", value);
    }
}

/// A parsed markup document
#[derive(Debug, Clone)]
pub struct Document {
    tree: Tree<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self {
            tree: Tree::new(Node::Document),
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.tree.root().id()
    }

    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_, Node>> {
        self.tree.get(id)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.tree.get(id).and_then(|n| n.value().as_element())
    }

    /// Run `f` on the element at `id`, if there is one
    pub fn update<R>(&mut self, id: NodeId, f: impl FnOnce(&mut Element) -> R) -> Option<R> {
        let mut node = self.tree.get_mut(id)?;
        match node.value() {
            Node::Element(el) => Some(f(el)),
            _ => None,
        }
    }

    /// Replace the text of a text or CDATA node
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        if let Some(mut node) = self.tree.get_mut(id) {
            match node.value() {
                Node::Text(t) | Node::CData(t) => *t = text.into(),
                _ => {}
            }
        }
    }

    /// The outermost element (normally `<html>`)
    pub fn document_element(&self) -> Option<NodeId> {
        self.tree
            .root()
            .children()
            .find(|n| matches!(n.value(), Node::Element(_)))
            .map(|n| n.id())
    }

    /// All elements at or below `from` matching `pred`, in document order
    pub fn select(&self, from: NodeId, pred: impl Fn(&Element) -> bool) -> Vec<NodeId> {
        let Some(start) = self.tree.get(from) else {
            return Vec::new();
        };
        start
            .descendants()
            .filter(|n| n.value().as_element().is_some_and(&pred))
            .map(|n| n.id())
            .collect()
    }

    /// All elements in the document matching `pred`
    pub fn select_all(&self, pred: impl Fn(&Element) -> bool) -> Vec<NodeId> {
        self.select(self.root_id(), pred)
    }

    pub fn elements_named(&self, from: NodeId, name: &str) -> Vec<NodeId> {
        self.select(from, |el| el.is(name))
    }

    pub fn first_named(&self, name: &str) -> Option<NodeId> {
        self.tree
            .root()
            .descendants()
            .find(|n| n.value().as_element().is_some_and(|el| el.is(name)))
            .map(|n| n.id())
    }

    pub fn head(&self) -> Option<NodeId> {
        self.first_named("head")
    }

    pub fn body(&self) -> Option<NodeId> {
        self.first_named("body")
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.tree.get(id)?.parent().map(|p| p.id())
    }

    /// Element ancestors of `id`, nearest first
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        match self.tree.get(id) {
            Some(node) => node
                .ancestors()
                .filter(|n| matches!(n.value(), Node::Element(_)))
                .map(|n| n.id())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Element children of `id`
    pub fn child_elements(&self, id: NodeId) -> Vec<NodeId> {
        match self.tree.get(id) {
            Some(node) => node
                .children()
                .filter(|n| matches!(n.value(), Node::Element(_)))
                .map(|n| n.id())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Following element siblings of `id`
    pub fn following_elements(&self, id: NodeId) -> Vec<NodeId> {
        match self.tree.get(id) {
            Some(node) => node
                .next_siblings()
                .filter(|n| matches!(n.value(), Node::Element(_)))
                .map(|n| n.id())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Whether `id` is still reachable from the document root
    pub fn is_attached(&self, id: NodeId) -> bool {
        let root = self.root_id();
        id == root || self.tree.get(id).is_some_and(|n| n.ancestors().any(|a| a.id() == root))
    }

    /// Concatenated text of `id` and its descendants
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        if let Some(node) = self.tree.get(id) {
            for n in node.descendants() {
                match n.value() {
                    Node::Text(t) | Node::CData(t) => text.push_str(t),
                    _ => {}
                }
            }
        }
        text
    }

    /// Append a node as the last child of `parent`
    pub fn append(&mut self, parent: NodeId, node: Node) -> Option<NodeId> {
        let mut parent = self.tree.get_mut(parent)?;
        Some(parent.append(node).id())
    }

    pub fn append_element(&mut self, parent: NodeId, element: Element) -> Option<NodeId> {
        self.append(parent, Node::Element(element))
    }

    pub fn append_text(&mut self, parent: NodeId, text: impl Into<String>) -> Option<NodeId> {
        self.append(parent, Node::Text(text.into()))
    }

    /// Detach `id` (and its subtree) from the document
    pub fn remove(&mut self, id: NodeId) {
        if let Some(mut node) = self.tree.get_mut(id) {
            node.detach();
        }
    }

    /// Replace `id` by its children
    pub fn unwrap_element(&mut self, id: NodeId) {
        let Some(node) = self.tree.get(id) else {
            return;
        };
        if node.parent().is_none() {
            return;
        }
        let children: Vec<NodeId> = node.children().map(|c| c.id()).collect();
        if let Some(mut node) = self.tree.get_mut(id) {
            for child in children {
                node.insert_id_before(child);
            }
            node.detach();
        }
    }

    /// Put `replacement` where `id` is, and detach `id`
    pub fn replace_with(&mut self, id: NodeId, replacement: Node) -> Option<NodeId> {
        let mut node = self.tree.get_mut(id)?;
        node.parent()?;
        let new_id = node.insert_before(replacement).id();
        node.detach();
        Some(new_id)
    }

    /// Move `child` (and its subtree) to the end of `parent`
    pub fn move_to(&mut self, parent: NodeId, child: NodeId) {
        if parent == child {
            return;
        }
        if let Some(mut parent) = self.tree.get_mut(parent) {
            parent.append_id(child);
        }
    }

    /// Deep-copy `source_id` from `source` as the last child of `parent`
    pub fn import(&mut self, parent: NodeId, source: &Document, source_id: NodeId) -> Option<NodeId> {
        let node = source.tree.get(source_id)?;
        let new_id = self.append(parent, node.value().clone())?;
        let children: Vec<NodeId> = node.children().map(|c| c.id()).collect();
        for child in children {
            self.import(new_id, source, child);
        }
        Some(new_id)
    }
}
