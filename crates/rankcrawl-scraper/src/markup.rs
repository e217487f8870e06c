//! Minimal markup-query surface over a parsed page.
//!
//! Extraction needs only a handful of lookups: first/all elements carrying a
//! class, elements of a tag whose attribute matches a pattern, attribute
//! values, and text content. [`Node`] exposes exactly those so the planner and
//! extractor never touch the underlying HTML library directly.

use regex::Regex;
use scraper::{ElementRef, Html};

/// A parsed page.
pub struct Document {
    html: Html,
}

impl Document {
    /// Parses raw markup. HTML parsing is error-tolerant, so this never fails;
    /// a page missing the expected structure surfaces later as absent nodes.
    #[must_use]
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
        }
    }

    /// The document's root element.
    #[must_use]
    pub fn root(&self) -> Node<'_> {
        Node {
            element: self.html.root_element(),
        }
    }
}

/// An element within a [`Document`].
#[derive(Clone, Copy)]
pub struct Node<'a> {
    element: ElementRef<'a>,
}

impl<'a> Node<'a> {
    /// First descendant carrying every class in `class` (whitespace-separated).
    #[must_use]
    pub fn find_first_by_class(&self, class: &str) -> Option<Node<'a>> {
        self.descendants()
            .find(|el| has_classes(el, class))
            .map(Node::from)
    }

    /// All descendants carrying every class in `class`, in document order.
    #[must_use]
    pub fn find_all_by_class(&self, class: &str) -> Vec<Node<'a>> {
        self.descendants()
            .filter(|el| has_classes(el, class))
            .map(Node::from)
            .collect()
    }

    /// First descendant with tag `tag`.
    #[must_use]
    pub fn find_first_by_tag(&self, tag: &str) -> Option<Node<'a>> {
        self.descendants()
            .find(|el| el.value().name().eq_ignore_ascii_case(tag))
            .map(Node::from)
    }

    /// First descendant with tag `tag` that also carries `class`.
    #[must_use]
    pub fn find_first_by_tag_and_class(&self, tag: &str, class: &str) -> Option<Node<'a>> {
        self.descendants()
            .find(|el| el.value().name().eq_ignore_ascii_case(tag) && has_classes(el, class))
            .map(Node::from)
    }

    /// All descendants with tag `tag` whose `attr` value matches `pattern`.
    #[must_use]
    pub fn find_all_by_tag_and_attr(
        &self,
        tag: &str,
        attr: &str,
        pattern: &Regex,
    ) -> Vec<Node<'a>> {
        self.descendants()
            .filter(|el| el.value().name().eq_ignore_ascii_case(tag))
            .filter(|el| el.value().attr(attr).is_some_and(|v| pattern.is_match(v)))
            .map(Node::from)
            .collect()
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    /// Concatenated text of this element and all its descendants, untrimmed.
    #[must_use]
    pub fn text(&self) -> String {
        self.element.text().collect()
    }

    fn descendants(&self) -> impl Iterator<Item = ElementRef<'a>> {
        // `descendants` yields the node itself first.
        self.element.descendants().skip(1).filter_map(ElementRef::wrap)
    }
}

impl<'a> From<ElementRef<'a>> for Node<'a> {
    fn from(element: ElementRef<'a>) -> Self {
        Self { element }
    }
}

fn has_classes(element: &ElementRef<'_>, class: &str) -> bool {
    let mut wanted = class.split_whitespace().peekable();
    if wanted.peek().is_none() {
        return false;
    }
    wanted.all(|c| element.value().classes().any(|have| have == c))
}
