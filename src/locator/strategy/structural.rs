use crate::locator::strategy::{LocatorStrategy, is_identifier};
use crate::locator::{ElementSnapshot, Locator, StrategyKind, quote};
use crate::page::Page;
use crate::page::query::QueryResult;

const MAX_DEPTH: usize = 6;

/// XPath built upward from the element. The walk stops at the first element
/// carrying a usable id, at the document root, or after six steps.
pub struct StructuralPath;

impl LocatorStrategy for StructuralPath {
    fn kind(&self) -> StrategyKind {
        StrategyKind::StructuralPath
    }

    fn priority(&self) -> u8 {
        70
    }

    fn extract(
        &self,
        element: &ElementSnapshot,
        page: &Page,
    ) -> QueryResult<Option<Locator>> {
        let mut steps: Vec<String> = Vec::new();
        let mut anchor: Option<&str> = None;
        let mut current = Some(element.node);

        while let Some(id) = current
            && steps.len() < MAX_DEPTH
        {
            let Some(node) = page.get(id) else {
                break;
            };
            if let Some(value) = node.id()
                && is_identifier(value)
            {
                anchor = Some(value);
                break;
            }
            steps.push(format!("{}[{}]", node.tag, page.same_tag_index(id)));
            current = node.parent;
        }
        steps.reverse();

        let path = match anchor {
            Some(id) => {
                let mut path = format!("//*[@id={}]", quote(id));
                for step in &steps {
                    path.push('/');
                    path.push_str(step);
                }
                path
            }
            None if current.is_none() => format!("/{}", steps.join("/")),
            None => format!("//{}", steps.join("/")),
        };
        Ok(Some(Locator::xpath(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use insta::assert_snapshot;

    fn extract(html: &str, target: &str) -> (Page, ElementSnapshot, Locator) {
        let page = Page::parse(html).unwrap();
        let node = page.query(&Locator::css(target)).unwrap()[0];
        let element = ElementSnapshot::capture(&page, node).unwrap();
        let locator = StructuralPath.extract(&element, &page).unwrap().unwrap();
        (page, element, locator)
    }

    #[test]
    fn test_anchors_on_nearest_id() {
        let (page, element, locator) = extract(
            indoc! { r#"
            <div id="cart">
              <ul>
                <li>a</li>
                <li><span>b</span></li>
              </ul>
            </div>
            "# },
            "li:nth-child(2) > span",
        );
        assert_snapshot!(locator.value, @r#"//*[@id="cart"]/ul[1]/li[2]/span[1]"#);
        assert!(page.resolves_to(&locator, element.node).unwrap());
    }

    #[test]
    fn test_element_with_id_is_its_own_anchor() {
        let (_, _, locator) = extract(r#"<p><a id="home">x</a></p>"#, "a");
        assert_snapshot!(locator.value, @r#"//*[@id="home"]"#);
    }

    #[test]
    fn test_absolute_path_from_root() {
        let (page, element, locator) =
            extract("<main><p>one</p><p>two</p></main>", "p:nth-of-type(2)");
        assert_snapshot!(locator.value, @"/html[1]/body[1]/main[1]/p[2]");
        assert!(page.resolves_to(&locator, element.node).unwrap());
    }

    #[test]
    fn test_relative_path_when_depth_is_exhausted() {
        let (_, _, locator) = extract(
            "<div><div><div><div><div><div><em>deep</em></div></div></div></div></div></div>",
            "em",
        );
        assert_snapshot!(
            locator.value,
            @"//div[1]/div[1]/div[1]/div[1]/div[1]/em[1]"
        );
    }
}
