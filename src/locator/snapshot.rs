use std::collections::BTreeMap;

use crate::locator::BoundingBox;
use crate::locator::engine::InfrastructureError;
use crate::page::{NodeId, Page, roles};

/// Everything the strategies know about the element a user interacted with.
/// Lives only for the duration of one extraction.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementSnapshot {
    pub node: NodeId,
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub role: Option<String>,
    pub bounds: BoundingBox,
    /// 1-based position among siblings with the same tag.
    pub sibling_index: usize,
}

impl ElementSnapshot {
    pub fn capture(
        page: &Page,
        node: NodeId,
    ) -> Result<Self, InfrastructureError> {
        let element = page
            .get(node)
            .ok_or(InfrastructureError::ElementUnavailable(node))?;
        Ok(ElementSnapshot {
            node,
            tag: element.tag.clone(),
            attributes: element.attributes.iter().cloned().collect(),
            text: element.text.clone(),
            role: roles::role_of(element).map(str::to_string),
            bounds: BoundingBox::default(),
            sibling_index: page.same_tag_index(node),
        })
    }

    /// Layout is not part of parsed markup; recorders that know where the
    /// element was rendered attach it here.
    pub fn with_bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}
