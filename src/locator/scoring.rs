use crate::locator::strategy::AUTOMATION_ATTRIBUTES;
use crate::locator::{Locator, Verification};
use crate::page::query;

/// Confidence of the synthesized last-resort candidate.
pub const FALLBACK_CONFIDENCE: u8 = 10;

const LONG_LOCATOR: usize = 100;
const SHORT_LOCATOR: usize = 30;

/// Confidence in `[0, 100]` for a locator produced by a strategy with the
/// given priority.
pub fn score(priority: u8, locator: &Locator, verification: Verification) -> u8 {
    let mut confidence = i32::from(priority);

    if let Ok(parsed) = query::parse(locator) {
        if parsed.is_id_anchored() {
            confidence += 5;
        }
        if AUTOMATION_ATTRIBUTES
            .iter()
            .any(|attribute| parsed.references_attribute(attribute))
        {
            confidence += 3;
        }
    }

    let length = locator.value.chars().count();
    if length > LONG_LOCATOR {
        confidence -= 10;
    } else if length < SHORT_LOCATOR {
        confidence += 2;
    }

    confidence += match verification {
        Verification::Passed => 5,
        Verification::Failed => -20,
        Verification::Errored => -15,
        Verification::Skipped => 0,
    };

    confidence.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_selector_scores_highest() {
        let locator = Locator::css("#checkout");
        assert_eq!(score(90, &locator, Verification::Passed), 100);
    }

    #[test]
    fn test_automation_attribute_bonus() {
        let locator = Locator::css(r#"[data-testid="save"]"#);
        assert_eq!(score(90, &locator, Verification::Passed), 100);
        let locator = Locator::css(r#"[data-cy="save"]"#);
        assert_eq!(score(50, &locator, Verification::Passed), 60);
    }

    #[test]
    fn test_anchored_xpath() {
        let locator = Locator::xpath(r#"//*[@id="cart"]/ul[1]/li[2]"#);
        assert_eq!(locator.value.chars().count(), 27);
        assert_eq!(score(70, &locator, Verification::Passed), 82);
    }

    #[test]
    fn test_failed_verification_penalty() {
        let locator = Locator::role("role=button");
        assert_eq!(score(80, &locator, Verification::Failed), 62);
        assert_eq!(score(80, &locator, Verification::Errored), 67);
    }

    #[test]
    fn test_long_locators_are_penalized() {
        let locator = Locator::css(format!("div{}", " > div".repeat(20)));
        assert_eq!(score(90, &locator, Verification::Passed), 85);
    }

    #[test]
    fn test_clamped_to_range() {
        let locator = Locator::css("#a");
        assert_eq!(score(100, &locator, Verification::Passed), 100);
        let locator = Locator::text(format!("text=\"{}\"", "x".repeat(120)));
        assert_eq!(score(5, &locator, Verification::Failed), 0);
    }

    #[test]
    fn test_malformed_locator_gets_no_structural_bonus() {
        let locator = Locator::css("[data-testid=");
        assert_eq!(score(90, &locator, Verification::Errored), 77);
    }
}
