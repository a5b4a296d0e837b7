use std::collections::HashSet;

use crate::parser::ParsedRule;

pub struct OptimizeStats {
    pub before: usize,
    pub after: usize,
    pub deduped: usize,
}

/// Remove rules whose anchors and body repeat an earlier rule. Matching is
/// "any rule matches", so dropping repeats never changes a decision.
pub fn optimize_rules(rules: &mut Vec<ParsedRule>) -> OptimizeStats {
    let before = rules.len();

    let mut seen: HashSet<RuleKey> = HashSet::new();
    let mut deduped = 0usize;
    rules.retain(|rule| {
        if seen.insert(RuleKey::from(rule)) {
            true
        } else {
            deduped += 1;
            false
        }
    });

    OptimizeStats {
        before,
        after: rules.len(),
        deduped,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RuleKey {
    anchors: u8,
    body: String,
}

impl From<&ParsedRule> for RuleKey {
    fn from(rule: &ParsedRule) -> Self {
        Self {
            anchors: rule.anchors.bits(),
            body: rule.body.to_ascii_lowercase(),
        }
    }
}
