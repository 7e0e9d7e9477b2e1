use crate::compiler::config::SelectorStrategy;
use crate::locator::LocatorCandidate;

#[derive(Debug, PartialEq)]
pub struct LocatorSelection<'a> {
    pub primary: &'a LocatorCandidate,
    /// Remaining candidates, best first. Only populated under `auto`.
    pub fallbacks: Vec<&'a LocatorCandidate>,
}

/// Picks the primary locator for a step. Candidates need not arrive sorted;
/// equal confidences keep their recorded order.
pub fn select(
    candidates: &[LocatorCandidate],
    strategy: SelectorStrategy,
) -> Option<LocatorSelection<'_>> {
    if candidates.is_empty() {
        return None;
    }
    let mut ranked: Vec<&LocatorCandidate> = candidates.iter().collect();
    ranked.sort_by(|a, b| b.confidence.cmp(&a.confidence));

    let primary_index = strategy
        .preferred_kind()
        .and_then(|kind| {
            ranked
                .iter()
                .position(|candidate| candidate.locator.kind == kind)
        })
        .unwrap_or(0);
    let primary = ranked.remove(primary_index);

    let fallbacks = match strategy {
        SelectorStrategy::Auto => ranked,
        _ => Vec::new(),
    };
    Some(LocatorSelection { primary, fallbacks })
}
