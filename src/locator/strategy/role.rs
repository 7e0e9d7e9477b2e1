use crate::locator::strategy::LocatorStrategy;
use crate::locator::{ElementSnapshot, Locator, StrategyKind, quote};
use crate::page::query::QueryResult;
use crate::page::{Page, roles};

/// ARIA role locators. A labelled explicit role must be unique; an implicit
/// role is emitted as-is and left to verification.
pub struct RoleStrategy;

impl LocatorStrategy for RoleStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Role
    }

    fn priority(&self) -> u8 {
        80
    }

    fn extract(
        &self,
        element: &ElementSnapshot,
        page: &Page,
    ) -> QueryResult<Option<Locator>> {
        let Some(node) = page.get(element.node) else {
            return Ok(None);
        };

        if let Some(role) = roles::explicit_role(node)
            && let Some(label) = roles::accessible_label(node)
        {
            let locator =
                Locator::role(format!("role={}[name={}]", role, quote(label)));
            if page.count(&locator)? == 1 {
                return Ok(Some(locator));
            }
        }

        Ok(roles::implicit_role(node)
            .map(|role| Locator::role(format!("role={}", role))))
    }
}
