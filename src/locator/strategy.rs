//! Extraction strategies.
//!
//! Each strategy is independent: it looks at one element and either proposes
//! a single locator or declines. The engine owns ordering, verification and
//! scoring, so adding a strategy never touches aggregation.

use std::sync::LazyLock;

use regex::Regex;

use crate::locator::{ElementSnapshot, Locator, StrategyKind};
use crate::page::Page;
use crate::page::query::QueryResult;

pub mod attribute;
pub mod role;
pub mod structural;
pub mod text;

pub use attribute::AttributePriority;
pub use role::RoleStrategy;
pub use structural::StructuralPath;
pub use text::TextContent;

/// Attributes that exist only for test automation and are the most stable
/// hooks a page can offer.
pub const AUTOMATION_ATTRIBUTES: [&str; 5] =
    ["data-testid", "data-test-id", "data-test", "data-cy", "data-qa"];

/// Attributes that tend to describe what an element is rather than where it
/// sits.
pub const SEMANTIC_ATTRIBUTES: [&str; 7] = [
    "name",
    "type",
    "value",
    "placeholder",
    "title",
    "role",
    "aria-label",
];

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?[A-Za-z_][A-Za-z0-9_-]*$").expect("identifier pattern")
});

/// Whether `value` can be written as a bare CSS identifier (`#value`,
/// `.value`).
pub fn is_identifier(value: &str) -> bool {
    IDENTIFIER.is_match(value)
}

pub trait LocatorStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Base confidence, and the order strategies run in.
    fn priority(&self) -> u8;

    fn extract(
        &self,
        element: &ElementSnapshot,
        page: &Page,
    ) -> QueryResult<Option<Locator>>;

    /// Resolves the locator against the page it was extracted from.
    fn self_verify(
        &self,
        locator: &Locator,
        element: &ElementSnapshot,
        page: &Page,
    ) -> QueryResult<bool> {
        page.resolves_to(locator, element.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("main-nav"));
        assert!(is_identifier("_private"));
        assert!(!is_identifier("1st"));
        assert!(!is_identifier("has space"));
        assert!(!is_identifier("a:b"));
        assert!(!is_identifier(""));
    }
}
