//! Pattern translation
//!
//! Turns a parsed rule body into a regular expression and compiles it into a
//! [`FilterRule`].

use am_core::filter::FilterRule;
use am_core::index::pattern_tokens;
use am_core::types::AnchorFlags;
use regex::RegexBuilder;
use thiserror::Error;

use crate::parser::ParsedRule;

/// `^` placeholder: one separator character, or the end of the URL.
pub const SEPARATOR: &str = r"(?:[^A-Za-z0-9_\-.%]|$)";

/// Compiled program size limit per rule.
const RULE_SIZE_LIMIT: usize = 1 << 18;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("line {line}: empty pattern")]
    EmptyPattern { line: usize },
    #[error("line {line}: {source}")]
    Regex {
        line: usize,
        #[source]
        source: regex::Error,
    },
}

/// Translate a rule body into regex source.
///
/// `||` patterns are anchored with `^` like `|` ones; the rule applies them
/// at each host label start rather than at the URL start.
pub fn translate(body: &str, anchors: AnchorFlags) -> String {
    let mut out = String::with_capacity(body.len() * 2 + 2);

    if anchors.intersects(AnchorFlags::DOMAIN | AnchorFlags::START) {
        out.push('^');
    }

    let mut literal = String::new();
    for ch in body.chars() {
        match ch {
            '*' | '^' => {
                if !literal.is_empty() {
                    out.push_str(&regex::escape(&literal));
                    literal.clear();
                }
                out.push_str(if ch == '*' { ".*" } else { SEPARATOR });
            }
            _ => literal.push(ch),
        }
    }
    if !literal.is_empty() {
        out.push_str(&regex::escape(&literal));
    }

    if anchors.contains(AnchorFlags::END) {
        out.push('$');
    }

    out
}

/// Compile one parsed rule. Failures affect this rule only.
pub fn compile_rule(rule: &ParsedRule) -> Result<FilterRule, RuleError> {
    if rule.body.is_empty() {
        return Err(RuleError::EmptyPattern { line: rule.line });
    }

    let source = translate(&rule.body, rule.anchors);
    let matcher = RegexBuilder::new(&source)
        .case_insensitive(true)
        .size_limit(RULE_SIZE_LIMIT)
        .build()
        .map_err(|source| RuleError::Regex {
            line: rule.line,
            source,
        })?;

    Ok(FilterRule::new(rule.source.clone(), rule.line, rule.anchors, matcher)
        .with_tokens(pattern_tokens(&rule.body, rule.anchors)))
}
