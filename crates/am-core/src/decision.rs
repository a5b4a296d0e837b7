//! Blocking decision
//!
//! Runs synchronously inside the interception handler, before the host is
//! allowed to dispatch the request.

use crate::filter::FilterSet;
use crate::manual::ManualBlockList;
use crate::types::Verdict;

/// Outcome of checking one URL against the current filter set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decision {
    /// The URL matched a filter rule
    pub dangerous: bool,
    /// The request was prevented from being sent
    pub blocked: bool,
    /// Source line of the rule that matched, or the manual entry
    pub rule: Option<String>,
}

impl Decision {
    /// Every match is blocked, so `blocked` always equals `dangerous`.
    fn from_match(rule: Option<&str>) -> Self {
        let dangerous = rule.is_some();
        Self {
            dangerous,
            blocked: dangerous,
            rule: rule.map(str::to_string),
        }
    }

    pub fn verdict(&self) -> Verdict {
        if self.blocked {
            Verdict::Cancel
        } else {
            Verdict::Proceed
        }
    }
}

/// Decide whether a URL must be blocked.
pub fn decide(filters: &FilterSet, url: &str) -> Decision {
    Decision::from_match(filters.first_match(url).map(|rule| rule.source()))
}

/// Like [`decide`], with the user's own entries checked first.
pub fn decide_with_manual(manual: &ManualBlockList, filters: &FilterSet, url: &str) -> Decision {
    match manual.first_match(url) {
        Some(entry) => Decision::from_match(Some(entry)),
        None => decide(filters, url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterRule;
    use crate::types::AnchorFlags;
    use regex::Regex;

    fn set() -> FilterSet {
        let rule = FilterRule::new(
            "/ads/",
            1,
            AnchorFlags::empty(),
            Regex::new(r"/ads/").unwrap(),
        );
        FilterSet::new(vec![rule], "/ads/".to_string())
    }

    #[test]
    fn test_match_blocks() {
        let decision = decide(&set(), "https://cdn.example.com/ads/banner.js");
        assert!(decision.dangerous);
        assert!(decision.blocked);
        assert_eq!(decision.rule.as_deref(), Some("/ads/"));
        assert_eq!(decision.verdict(), Verdict::Cancel);
    }

    #[test]
    fn test_no_match_proceeds() {
        let decision = decide(&set(), "https://cdn.example.com/app.js");
        assert_eq!(decision, Decision::default());
        assert_eq!(decision.verdict(), Verdict::Proceed);
    }

    #[test]
    fn test_manual_entry_takes_precedence() {
        let mut manual = ManualBlockList::new();
        manual.add("cdn.example.com/ads");

        let decision = decide_with_manual(&manual, &set(), "https://cdn.example.com/ads/banner.js");
        assert!(decision.blocked);
        assert_eq!(decision.rule.as_deref(), Some("cdn.example.com/ads"));

        let decision = decide_with_manual(&manual, &FilterSet::empty(), "https://cdn.example.com/ads/x");
        assert_eq!(decision.verdict(), Verdict::Cancel);

        let decision = decide_with_manual(&ManualBlockList::new(), &set(), "https://x.com/ads/");
        assert_eq!(decision.rule.as_deref(), Some("/ads/"));
    }

    #[test]
    fn test_empty_set_is_fail_open() {
        let decision = decide(&FilterSet::empty(), "https://tracker.io/beacon");
        assert!(!decision.dangerous);
        assert!(!decision.blocked);
    }
}
