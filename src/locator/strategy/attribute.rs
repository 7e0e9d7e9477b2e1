use crate::locator::strategy::{
    AUTOMATION_ATTRIBUTES, LocatorStrategy, SEMANTIC_ATTRIBUTES, is_identifier,
};
use crate::locator::{ElementSnapshot, Locator, StrategyKind, quote};
use crate::page::query::QueryResult;
use crate::page::{NodeId, Page};

/// Ancestor levels above the element in the positional fallback path.
const MAX_ANCESTOR_LEVELS: usize = 5;

/// CSS locators built from the element's own attributes, most specific first:
/// id, automation attributes, classes, semantic attributes, then a positional
/// `:nth-child` path.
pub struct AttributePriority;

impl LocatorStrategy for AttributePriority {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AttributePriority
    }

    fn priority(&self) -> u8 {
        90
    }

    fn extract(
        &self,
        element: &ElementSnapshot,
        page: &Page,
    ) -> QueryResult<Option<Locator>> {
        let unique = |locator: &Locator| -> QueryResult<bool> {
            Ok(page.count(locator)? == 1)
        };

        if let Some(id) = element.attribute("id")
            && is_identifier(id)
        {
            let locator = Locator::css(format!("#{}", id));
            if unique(&locator)? {
                return Ok(Some(locator));
            }
        }

        for attribute in AUTOMATION_ATTRIBUTES {
            if let Some(value) = element.attribute(attribute)
                && !value.is_empty()
            {
                let locator =
                    Locator::css(format!("[{}={}]", attribute, quote(value)));
                if unique(&locator)? {
                    return Ok(Some(locator));
                }
            }
        }

        let classes: Vec<&str> = element
            .attribute("class")
            .unwrap_or("")
            .split_whitespace()
            .filter(|class| is_identifier(class))
            .collect();
        if !classes.is_empty() {
            let locator = Locator::css(format!(
                "{}.{}",
                element.tag,
                classes.join(".")
            ));
            if unique(&locator)? {
                return Ok(Some(locator));
            }
        }

        let semantic: Vec<String> = SEMANTIC_ATTRIBUTES
            .iter()
            .filter_map(|attribute| {
                element
                    .attribute(attribute)
                    .filter(|value| !value.is_empty())
                    .map(|value| format!("[{}={}]", attribute, quote(value)))
            })
            .collect();
        if !semantic.is_empty() {
            let locator =
                Locator::css(format!("{}{}", element.tag, semantic.concat()));
            if unique(&locator)? {
                return Ok(Some(locator));
            }
        }

        Ok(Some(positional_path(page, element.node)))
    }
}

/// `tag:nth-child(n)` segments from at most five ancestors down to the
/// element. Always constructible.
pub fn positional_path(page: &Page, node: NodeId) -> Locator {
    let mut segments = Vec::new();
    let mut current = Some(node);
    while let Some(id) = current
        && segments.len() <= MAX_ANCESTOR_LEVELS
    {
        let Some(element) = page.get(id) else {
            break;
        };
        segments.push(format!(
            "{}:nth-child({})",
            element.tag,
            page.child_index(id)
        ));
        current = element.parent;
    }
    segments.reverse();
    Locator::css(segments.join(" > "))
}
