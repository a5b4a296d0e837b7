//! apimapper Filter List Compiler
//!
//! This crate compiles ABP-style filter lists into an [`am_core::FilterSet`].
//! Only blocking patterns are compiled: comments, exception rules, cosmetic
//! rules and rules with `$option` modifiers are skipped, and a rule whose
//! pattern fails to compile is dropped without affecting the rest.

pub mod parser;
pub mod pattern;
pub mod optimizer;
pub mod refresh;

pub use optimizer::optimize_rules;
pub use parser::{parse_filter_list, ParseStats, ParsedRule};
pub use pattern::{compile_rule, RuleError};
pub use refresh::{install, RefreshConfig, RefreshOutcome};

use am_core::filter::FilterSet;

/// Counters describing one compilation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileStats {
    pub parse: ParseStats,
    /// Rules in the resulting set
    pub rules: usize,
    /// Patterns that failed to compile
    pub dropped: usize,
    /// Repeated patterns removed
    pub deduped: usize,
}

/// Compile subscription text into a filter set.
pub fn compile(text: &str) -> FilterSet {
    compile_with_stats(text).0
}

pub fn compile_with_stats(text: &str) -> (FilterSet, CompileStats) {
    let parsed = parse_filter_list(text);
    let mut candidates = parsed.rules;
    let optimize = optimize_rules(&mut candidates);

    let mut rules = Vec::with_capacity(candidates.len());
    let mut dropped = 0usize;
    for candidate in &candidates {
        match compile_rule(candidate) {
            Ok(rule) => rules.push(rule),
            Err(err) => {
                dropped += 1;
                log::debug!("dropping filter rule '{}': {err}", candidate.source);
            }
        }
    }

    let stats = CompileStats {
        parse: parsed.stats,
        rules: rules.len(),
        dropped,
        deduped: optimize.deduped,
    };

    (FilterSet::new(rules, text.to_string()), stats)
}
