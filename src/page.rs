//! A flattened, read-only view of a parsed HTML document.
//!
//! The page is the explicit handle every locator query runs against. It is
//! built once from markup (or a captured `outerHTML`) and never mutated, so a
//! single `Page` can back any number of concurrent extractions.

use std::fmt::Display;
use std::io::{self, BufReader};

use html5ever::{ParseOpts, parse_document, tendril::TendrilSink};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use serde::{Deserialize, Serialize};

pub mod query;
pub mod roles;

/// Index of an element in document order. The root element is always `0`.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
pub struct NodeId(pub usize);

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Whitespace-normalized `textContent`.
    pub text: String,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn id(&self) -> Option<&str> {
        self.attribute("id").filter(|id| !id.is_empty())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attribute("class").unwrap_or("").split_whitespace()
    }
}

#[derive(Debug)]
pub enum PageError {
    IO(io::Error),
    NoRootElement,
}

impl Display for PageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageError::IO(error) => error.fmt(f),
            PageError::NoRootElement => {
                write!(f, "document has no root element")
            }
        }
    }
}

impl std::error::Error for PageError {}

impl From<io::Error> for PageError {
    fn from(value: io::Error) -> Self {
        PageError::IO(value)
    }
}

pub type Result<T> = std::result::Result<T, PageError>;

/// Elements whose character data never contributes to visible text.
const OPAQUE_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

enum Content {
    Text(String),
    Child(NodeId),
}

#[derive(Clone, Debug)]
pub struct Page {
    elements: Vec<Element>,
}

impl Page {
    pub fn parse(html: &str) -> Result<Self> {
        let mut reader = BufReader::new(html.as_bytes());
        let dom = parse_document(RcDom::default(), ParseOpts::default())
            .from_utf8()
            .read_from(&mut reader)?;
        Self::from_dom(&dom)
    }

    fn from_dom(dom: &RcDom) -> Result<Self> {
        let mut elements: Vec<Element> = Vec::new();
        let mut contents: Vec<Vec<Content>> = Vec::new();

        // Children are pushed in reverse so that popping yields document order.
        let mut stack: Vec<(Handle, Option<NodeId>)> = Vec::new();
        for child in dom.document.children.borrow().iter().rev() {
            stack.push((child.clone(), None));
        }

        while let Some((node, parent)) = stack.pop() {
            match &node.data {
                NodeData::Element { name, attrs, .. } => {
                    let id = NodeId(elements.len());
                    let tag = name.local.as_ref().to_ascii_lowercase();
                    let attributes = attrs
                        .borrow()
                        .iter()
                        .map(|attr| {
                            (
                                attr.name.local.as_ref().to_string(),
                                attr.value.to_string(),
                            )
                        })
                        .collect();
                    if let Some(parent) = parent {
                        elements[parent.0].children.push(id);
                        contents[parent.0].push(Content::Child(id));
                    }
                    let opaque = OPAQUE_TAGS.contains(&tag.as_str());
                    elements.push(Element {
                        tag,
                        attributes,
                        parent,
                        children: Vec::new(),
                        text: String::new(),
                    });
                    contents.push(Vec::new());
                    for child in node.children.borrow().iter().rev() {
                        if opaque
                            && matches!(child.data, NodeData::Text { .. })
                        {
                            continue;
                        }
                        stack.push((child.clone(), Some(id)));
                    }
                }
                NodeData::Text { contents: text } => {
                    if let Some(parent) = parent {
                        contents[parent.0]
                            .push(Content::Text(text.borrow().to_string()));
                    }
                }
                _ => {}
            }
        }

        if elements.is_empty() {
            return Err(PageError::NoRootElement);
        }

        // Children always come after their parent in document order, so a
        // reverse sweep sees every child's text before the parent needs it.
        let mut raw_text: Vec<String> = vec![String::new(); elements.len()];
        for index in (0..elements.len()).rev() {
            let mut text = String::new();
            for content in &contents[index] {
                match content {
                    Content::Text(value) => text.push_str(value),
                    Content::Child(child) => text.push_str(&raw_text[child.0]),
                }
            }
            elements[index].text = normalize_text(&text);
            raw_text[index] = text;
        }

        log::debug!("parsed page with {} elements", elements.len());
        Ok(Page { elements })
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Element> {
        self.elements.get(id.0)
    }

    /// All elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = (NodeId, &Element)> {
        self.elements
            .iter()
            .enumerate()
            .map(|(index, element)| (NodeId(index), element))
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.get(id).and_then(|e| e.parent), |id| {
            self.get(*id).and_then(|e| e.parent)
        })
    }

    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = match self.get(id) {
            Some(element) => element.children.iter().rev().copied().collect(),
            None => return found,
        };
        while let Some(node) = stack.pop() {
            found.push(node);
            if let Some(element) = self.get(node) {
                stack.extend(element.children.iter().rev().copied());
            }
        }
        found
    }

    /// Element siblings including `id` itself. The root element has none.
    fn siblings(&self, id: NodeId) -> &[NodeId] {
        match self.get(id).and_then(|e| e.parent).and_then(|p| self.get(p)) {
            Some(parent) => &parent.children,
            None => &[],
        }
    }

    /// 1-based position among all element siblings (`:nth-child`).
    pub fn child_index(&self, id: NodeId) -> usize {
        self.siblings(id)
            .iter()
            .position(|sibling| *sibling == id)
            .map_or(1, |position| position + 1)
    }

    /// 1-based position among siblings sharing the same tag (`:nth-of-type`,
    /// XPath `tag[n]`).
    pub fn same_tag_index(&self, id: NodeId) -> usize {
        let Some(tag) = self.get(id).map(|e| e.tag.as_str()) else {
            return 1;
        };
        self.siblings(id)
            .iter()
            .filter(|sibling| {
                self.get(**sibling).is_some_and(|e| e.tag == tag)
            })
            .position(|sibling| *sibling == id)
            .map_or(1, |position| position + 1)
    }

    /// First element whose `id` attribute equals `value`.
    pub fn find_by_id(&self, value: &str) -> Option<NodeId> {
        self.elements()
            .find(|(_, element)| element.id() == Some(value))
            .map(|(id, _)| id)
    }
}

/// Collapses every whitespace run to a single space and trims both ends.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
