use std::collections::HashSet;
use std::fmt::Display;

use crate::locator::scoring::{FALLBACK_CONFIDENCE, score};
use crate::locator::strategy::{
    AttributePriority, LocatorStrategy, RoleStrategy, StructuralPath,
    TextContent,
};
use crate::locator::{
    ElementSnapshot, Locator, LocatorCandidate, StrategyKind, Verification,
    quote,
};
use crate::page::{NodeId, Page};

const FALLBACK_TEXT_LENGTH: usize = 30;

/// The element a snapshot refers to cannot be found in the page handed to
/// the engine. Locator quality problems are never reported this way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfrastructureError {
    ElementUnavailable(NodeId),
    StaleSnapshot {
        node: NodeId,
        expected: String,
        found: String,
    },
}

impl Display for InfrastructureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfrastructureError::ElementUnavailable(node) => {
                write!(f, "element {} is not part of the page", node)
            }
            InfrastructureError::StaleSnapshot {
                node,
                expected,
                found,
            } => write!(
                f,
                "snapshot of {} expected <{}> but the page has <{}>",
                node, expected, found
            ),
        }
    }
}

impl std::error::Error for InfrastructureError {}

pub struct LocatorEngine {
    strategies: Vec<Box<dyn LocatorStrategy>>,
}

impl Default for LocatorEngine {
    fn default() -> Self {
        let mut engine = LocatorEngine::empty();
        engine.register(Box::new(AttributePriority));
        engine.register(Box::new(RoleStrategy));
        engine.register(Box::new(StructuralPath));
        engine.register(Box::new(TextContent));
        engine
    }
}

impl LocatorEngine {
    pub fn empty() -> Self {
        LocatorEngine {
            strategies: Vec::new(),
        }
    }

    /// Adds a strategy. Strategies run in descending priority; among equal
    /// priorities, registration order wins.
    pub fn register(&mut self, strategy: Box<dyn LocatorStrategy>) {
        let position = self
            .strategies
            .iter()
            .position(|existing| existing.priority() < strategy.priority())
            .unwrap_or(self.strategies.len());
        self.strategies.insert(position, strategy);
    }

    /// Ranked candidates for the element, best first. Never empty.
    pub fn extract(
        &self,
        element: &ElementSnapshot,
        page: &Page,
    ) -> Result<Vec<LocatorCandidate>, InfrastructureError> {
        let node = page
            .get(element.node)
            .ok_or(InfrastructureError::ElementUnavailable(element.node))?;
        if node.tag != element.tag {
            return Err(InfrastructureError::StaleSnapshot {
                node: element.node,
                expected: element.tag.clone(),
                found: node.tag.clone(),
            });
        }

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for strategy in &self.strategies {
            let kind = strategy.kind();
            if !seen.insert(kind) {
                continue;
            }
            let locator = match strategy.extract(element, page) {
                Ok(Some(locator)) => locator,
                Ok(None) => {
                    log::debug!("{:?} declined {}", kind, element.node);
                    continue;
                }
                Err(error) => {
                    log::warn!(
                        "{:?} failed on {}: {}",
                        kind,
                        element.node,
                        error
                    );
                    continue;
                }
            };
            let verification =
                match strategy.self_verify(&locator, element, page) {
                    Ok(true) => Verification::Passed,
                    Ok(false) => Verification::Failed,
                    Err(error) => {
                        log::warn!("could not verify {}: {}", locator, error);
                        Verification::Errored
                    }
                };
            let confidence =
                score(strategy.priority(), &locator, verification);
            log::debug!(
                "{:?} proposed {} ({:?}, {})",
                kind,
                locator,
                verification,
                confidence
            );
            candidates.push(candidate(
                element,
                locator,
                confidence,
                kind,
                verification,
            ));
        }

        if candidates.is_empty() {
            log::debug!("no strategy produced a locator for {}", element.node);
            candidates.push(candidate(
                element,
                fallback(element),
                FALLBACK_CONFIDENCE,
                StrategyKind::Fallback,
                Verification::Skipped,
            ));
        }

        candidates.sort_by(|a, b| b.confidence.cmp(&a.confidence));
        Ok(candidates)
    }
}

fn candidate(
    element: &ElementSnapshot,
    locator: Locator,
    confidence: u8,
    strategy: StrategyKind,
    verification: Verification,
) -> LocatorCandidate {
    LocatorCandidate {
        locator,
        confidence,
        strategy,
        verification,
        bounds: element.bounds,
        attributes: element.attributes.clone(),
    }
}

fn fallback(element: &ElementSnapshot) -> Locator {
    let text: String = element
        .text
        .trim()
        .chars()
        .take(FALLBACK_TEXT_LENGTH)
        .collect();
    let text = text.trim_end();
    if text.is_empty() {
        Locator::css(element.tag.clone())
    } else {
        Locator::text(format!("{} >> text*={}", element.tag, quote(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::LocatorKind;
    use crate::page::query::QueryResult;
    use indoc::indoc;
    use insta::assert_snapshot;
    use proptest::prelude::*;

    fn snapshot(page: &Page, target: &str) -> ElementSnapshot {
        let node = page.query(&Locator::css(target)).unwrap()[0];
        ElementSnapshot::capture(page, node).unwrap()
    }

    fn summary(candidates: &[LocatorCandidate]) -> String {
        candidates
            .iter()
            .map(|candidate| {
                format!(
                    "{} {:?} {:?} {}",
                    candidate.confidence,
                    candidate.strategy,
                    candidate.verification,
                    candidate.locator
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_ranks_all_strategies() {
        let page = Page::parse(indoc! { r#"
            <form id="checkout">
              <button data-testid="pay" type="submit">Pay now</button>
              <button type="button">Cancel</button>
            </form>
            "# })
        .unwrap();
        let element = snapshot(&page, "[data-testid]");
        let candidates = LocatorEngine::default().extract(&element, &page).unwrap();
        assert_snapshot!(summary(&candidates), @r#"
        100 AttributePriority Passed css:[data-testid="pay"]
        82 StructuralPath Passed xpath://*[@id="checkout"]/button[1]
        67 TextContent Passed text:button >> text="Pay now"
        62 Role Failed role:role=button
        "#);
    }

    #[test]
    fn test_candidates_carry_snapshot_data() {
        let page = Page::parse(r#"<input name="q" placeholder="Search">"#).unwrap();
        let bounds = crate::locator::BoundingBox {
            x: 4.0,
            y: 8.0,
            width: 120.0,
            height: 24.0,
        };
        let element = snapshot(&page, "input").with_bounds(bounds);
        let candidates = LocatorEngine::default().extract(&element, &page).unwrap();
        for candidate in &candidates {
            assert_eq!(candidate.bounds, bounds);
            assert_eq!(
                candidate.attributes.get("placeholder").map(String::as_str),
                Some("Search")
            );
        }
    }

    #[test]
    fn test_unknown_node_is_infrastructure_error() {
        let page = Page::parse("<p>x</p>").unwrap();
        let mut element = snapshot(&page, "p");
        element.node = NodeId(999);
        assert_eq!(
            LocatorEngine::default().extract(&element, &page),
            Err(InfrastructureError::ElementUnavailable(NodeId(999)))
        );
    }

    #[test]
    fn test_stale_snapshot() {
        let page = Page::parse("<p>x</p><span>y</span>").unwrap();
        let mut element = snapshot(&page, "p");
        element.tag = "div".to_string();
        assert!(matches!(
            LocatorEngine::default().extract(&element, &page),
            Err(InfrastructureError::StaleSnapshot { .. })
        ));
    }

    struct Broken;

    impl LocatorStrategy for Broken {
        fn kind(&self) -> StrategyKind {
            StrategyKind::TextContent
        }

        fn priority(&self) -> u8 {
            95
        }

        fn extract(
            &self,
            _element: &ElementSnapshot,
            page: &Page,
        ) -> QueryResult<Option<Locator>> {
            page.query(&Locator::css("[unterminated")).map(|_| None)
        }
    }

    #[test]
    fn test_strategy_errors_become_fallback() {
        let page = Page::parse("<ul><li>Quarterly revenue summary for the northern region</li></ul>").unwrap();
        let element = snapshot(&page, "li");
        let mut engine = LocatorEngine::empty();
        engine.register(Box::new(Broken));
        let candidates = engine.extract(&element, &page).unwrap();
        assert_eq!(candidates.len(), 1);
        let fallback = &candidates[0];
        assert_eq!(fallback.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(fallback.strategy, StrategyKind::Fallback);
        assert_eq!(fallback.verification, Verification::Skipped);
        assert_eq!(fallback.locator.kind, LocatorKind::Text);
        assert_snapshot!(
            fallback.locator.value,
            @r#"li >> text*="Quarterly revenue summary for""#
        );
        assert!(page.resolves_to(&fallback.locator, element.node).unwrap());
    }

    #[test]
    fn test_fallback_without_text_is_tag() {
        let page = Page::parse("<div></div>").unwrap();
        let element = snapshot(&page, "div");
        let candidates =
            LocatorEngine::empty().extract(&element, &page).unwrap();
        assert_eq!(candidates[0].locator, Locator::css("div"));
    }

    #[test]
    fn test_registration_keeps_priority_order() {
        let mut engine = LocatorEngine::empty();
        engine.register(Box::new(TextContent));
        engine.register(Box::new(AttributePriority));
        engine.register(Box::new(StructuralPath));
        let priorities: Vec<u8> =
            engine.strategies.iter().map(|s| s.priority()).collect();
        assert_eq!(priorities, vec![90, 70, 60]);
    }

    fn tag() -> BoxedStrategy<&'static str> {
        prop_oneof![
            Just("div"),
            Just("span"),
            Just("button"),
            Just("a"),
            Just("li"),
            Just("p"),
        ]
        .boxed()
    }

    fn attribute() -> BoxedStrategy<String> {
        prop_oneof![
            Just(String::new()),
            "[a-z]{1,6}".prop_map(|id| format!(r#" id="{}""#, id)),
            "[a-z]{1,6}".prop_map(|class| format!(r#" class="{}""#, class)),
            "[a-z]{1,6}"
                .prop_map(|value| format!(r#" data-testid="{}""#, value)),
            Just(r#" href="/""#.to_string()),
        ]
        .boxed()
    }

    fn element_markup() -> BoxedStrategy<String> {
        let leaf = (tag(), attribute(), "[A-Za-z ]{0,40}")
            .prop_map(|(tag, attribute, text)| {
                format!("<{tag}{attribute}>{text}</{tag}>")
            })
            .boxed();

        leaf.prop_recursive(4, 32, 4, |inner| {
            (tag(), attribute(), prop::collection::vec(inner, 1..4))
                .prop_map(|(tag, attribute, children)| {
                    format!("<{tag}{attribute}>{}</{tag}>", children.concat())
                })
        })
        .boxed()
    }

    fn page_and_node() -> BoxedStrategy<(Page, NodeId)> {
        prop::collection::vec(element_markup(), 1..5)
            .prop_flat_map(|elements| {
                let page = Page::parse(&elements.concat()).unwrap();
                let count = page.len();
                (Just(page), 0..count)
            })
            .prop_map(|(page, index)| (page, NodeId(index)))
            .boxed()
    }

    proptest! {
        #[test]
        fn test_extract_is_ranked_and_never_empty((page, node) in page_and_node()) {
            let element = ElementSnapshot::capture(&page, node).unwrap();
            let candidates = LocatorEngine::default().extract(&element, &page).unwrap();
            prop_assert!(!candidates.is_empty());
            prop_assert!(candidates[0].confidence >= FALLBACK_CONFIDENCE);
            for pair in candidates.windows(2) {
                prop_assert!(pair[0].confidence >= pair[1].confidence);
            }
            let mut kinds = HashSet::new();
            for candidate in &candidates {
                prop_assert!(candidate.confidence <= 100);
                prop_assert!(kinds.insert(candidate.strategy));
            }
        }
    }
}
