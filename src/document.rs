use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

/// Parsed page, or nothing when the fetch produced no body.
///
/// Every query on [`Document::Absent`] returns an empty result, so analyzers
/// fall back to their zero defaults without special casing.
pub enum Document {
    Present { tree: Html, source: String },
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode<'a> {
    pub parent: Option<&'a str>,
    pub text: &'a str,
}

impl Document {
    pub fn parse(body: Option<&str>) -> Self {
        match body {
            Some(source) => Document::Present {
                tree: Html::parse_document(source),
                source: source.to_string(),
            },
            None => Document::Absent,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Document::Present { .. })
    }

    pub fn source(&self) -> &str {
        match self {
            Document::Present { source, .. } => source,
            Document::Absent => "",
        }
    }

    pub fn select(&self, css: &str) -> Vec<ElementRef<'_>> {
        let Document::Present { tree, .. } = self else {
            return Vec::new();
        };
        let selector = match Selector::parse(css) {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        tree.select(&selector).collect()
    }

    pub fn count(&self, css: &str) -> usize {
        self.select(css).len()
    }

    pub fn attr_values(&self, css: &str, attr: &str) -> Vec<&str> {
        self.select(css)
            .into_iter()
            .filter_map(|el| el.value().attr(attr))
            .collect()
    }

    pub fn elements_with_text_matching(&self, css: &str, pattern: &Regex) -> Vec<ElementRef<'_>> {
        self.select(css)
            .into_iter()
            .filter(|el| pattern.is_match(&element_text(el)))
            .collect()
    }

    pub fn element_count(&self) -> usize {
        match self {
            Document::Present { tree, .. } => {
                tree.tree.nodes().filter(|node| node.value().is_element()).count()
            }
            Document::Absent => 0,
        }
    }

    pub fn text_nodes(&self) -> Vec<TextNode<'_>> {
        let Document::Present { tree, .. } = self else {
            return Vec::new();
        };
        tree.tree
            .nodes()
            .filter_map(|node| {
                let Node::Text(text) = node.value() else {
                    return None;
                };
                let parent = node
                    .parent()
                    .and_then(|p| p.value().as_element().map(|el| el.name()));
                Some(TextNode {
                    parent,
                    text: &**text,
                })
            })
            .collect()
    }
}

pub fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>()
}
