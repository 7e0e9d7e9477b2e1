use crate::locator::strategy::LocatorStrategy;
use crate::locator::{ElementSnapshot, Locator, StrategyKind, quote};
use crate::page::Page;
use crate::page::query::QueryResult;

const MAX_TEXT_LENGTH: usize = 100;
const MIN_PREFIX_SOURCE_LENGTH: usize = 10;
const PREFIX_LENGTH: usize = 20;
const MAX_PREFIX_MATCHES: usize = 3;

/// Locates short, visible text: exact when the text is unique, otherwise by
/// a prefix that narrows the page down to a handful of elements.
pub struct TextContent;

impl LocatorStrategy for TextContent {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TextContent
    }

    fn priority(&self) -> u8 {
        60
    }

    fn extract(
        &self,
        element: &ElementSnapshot,
        page: &Page,
    ) -> QueryResult<Option<Locator>> {
        let text = element.text.trim();
        let length = text.chars().count();
        if length == 0 || length > MAX_TEXT_LENGTH {
            return Ok(None);
        }

        // Scoped to the tag so an element wrapping its own text (a button
        // around a span) resolves to itself rather than the inner node.
        let exact = Locator::text(format!(
            "{} >> text={}",
            element.tag,
            quote(text)
        ));
        if page.count(&exact)? == 1 {
            return Ok(Some(exact));
        }

        if length > MIN_PREFIX_SOURCE_LENGTH {
            let prefix: String = text.chars().take(PREFIX_LENGTH).collect();
            let partial = Locator::text(format!("text*={}", quote(&prefix)));
            if page.count(&partial)? <= MAX_PREFIX_MATCHES {
                return Ok(Some(partial));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use insta::assert_snapshot;

    fn extract(html: &str, target: &str) -> Option<Locator> {
        let page = Page::parse(html).unwrap();
        let node = page.query(&Locator::css(target)).unwrap()[0];
        let element = ElementSnapshot::capture(&page, node).unwrap();
        TextContent.extract(&element, &page).unwrap()
    }

    #[test]
    fn test_unique_text_is_exact() {
        let locator = extract("<button>  Place   order </button>", "button");
        assert_snapshot!(locator.unwrap().value, @r#"button >> text="Place order""#);
    }

    #[test]
    fn test_repeated_long_text_uses_prefix() {
        let locator = extract(
            indoc! { r#"
            <p class="a">Delivery estimate for zone one</p>
            <p class="b">Delivery estimate for zone one</p>
            "# },
            "p.b",
        );
        assert_snapshot!(locator.unwrap().value, @r#"text*="Delivery estimate fo""#);
    }

    #[test]
    fn test_exact_text_resolves_to_wrapping_element() {
        let html = "<button><span>Pay</span></button>";
        let page = Page::parse(html).unwrap();
        let button = page.query(&Locator::css("button")).unwrap()[0];
        let locator = extract(html, "button").unwrap();
        assert_snapshot!(locator.value, @r#"button >> text="Pay""#);
        assert!(page.resolves_to(&locator, button).unwrap());
    }

    #[test]
    fn test_text_containing_scope_marker() {
        let html = r#"<nav><a href="/">Home >> Products</a></nav>"#;
        let page = Page::parse(html).unwrap();
        let link = page.query(&Locator::css("a")).unwrap()[0];
        let locator = extract(html, "a").unwrap();
        assert_snapshot!(locator.value, @r#"a >> text="Home >> Products""#);
        assert!(page.resolves_to(&locator, link).unwrap());
    }

    #[test]
    fn test_repeated_short_text_declines() {
        let locator = extract("<a>Edit</a><a>Edit</a>", "a");
        assert_eq!(locator, None);
    }

    #[test]
    fn test_empty_and_long_text_decline() {
        assert_eq!(extract("<div></div>", "div"), None);
        let long = "word ".repeat(30);
        assert_eq!(extract(&format!("<p>{}</p>", long), "p"), None);
    }

    #[test]
    fn test_prefix_shared_too_widely_declines() {
        let item = "<li>Subscription renewal notice</li>";
        let locator = extract(&format!("<ul>{}</ul>", item.repeat(4)), "li");
        assert_eq!(locator, None);
    }
}
