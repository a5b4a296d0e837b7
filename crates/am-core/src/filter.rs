//! Compiled filter rules and the swappable filter set
//!
//! A [`FilterSet`] is immutable once built. Refreshes build a new set and
//! replace the whole value inside a [`SharedFilterSet`], so a reader holding an
//! `Arc<FilterSet>` always sees one complete list.

use std::sync::{Arc, RwLock};

use regex::Regex;

use crate::index::TokenIndex;
use crate::types::AnchorFlags;
use crate::url::host_label_starts;

// =============================================================================
// Filter Rule
// =============================================================================

/// One blocking rule compiled from a single subscription line.
#[derive(Debug, Clone)]
pub struct FilterRule {
    source: String,
    line: usize,
    anchors: AnchorFlags,
    matcher: Regex,
    /// Literal tokens every matching URL contains; empty when unknown
    tokens: Vec<String>,
}

impl FilterRule {
    pub fn new(source: impl Into<String>, line: usize, anchors: AnchorFlags, matcher: Regex) -> Self {
        Self {
            source: source.into(),
            line,
            anchors,
            matcher,
            tokens: Vec::new(),
        }
    }

    /// Attach the literal tokens used to index this rule.
    pub fn with_tokens(mut self, tokens: Vec<String>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// The subscription line this rule came from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 1-based line number in the subscription text.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn anchors(&self) -> AnchorFlags {
        self.anchors
    }

    /// Pattern text the matcher was compiled from.
    pub fn pattern(&self) -> &str {
        self.matcher.as_str()
    }

    /// `||` rules are tried at every host label start, never past the host.
    #[inline]
    pub fn matches(&self, url: &str) -> bool {
        if self.anchors.contains(AnchorFlags::DOMAIN) {
            host_label_starts(url).any(|pos| self.matcher.is_match(&url[pos..]))
        } else {
            self.matcher.is_match(url)
        }
    }
}

// =============================================================================
// Filter Set
// =============================================================================

/// An ordered collection of rules paired with the text it was compiled from.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    rules: Vec<FilterRule>,
    source: String,
    index: TokenIndex,
}

impl FilterSet {
    pub fn new(rules: Vec<FilterRule>, source: String) -> Self {
        let tokens: Vec<&[String]> = rules.iter().map(FilterRule::tokens).collect();
        let index = TokenIndex::build(&tokens);
        Self { rules, source, index }
    }

    /// The set in effect before the first successful load.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Raw subscription text this set was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// First rule (in list order) matching the URL.
    pub fn first_match(&self, url: &str) -> Option<&FilterRule> {
        match self.index.candidates(url) {
            Some(ids) => ids
                .iter()
                .filter_map(|&id| self.rules.get(id as usize))
                .find(|rule| rule.matches(url)),
            None => self.rules.iter().find(|rule| rule.matches(url)),
        }
    }

    /// True iff any rule matches. An empty set never matches.
    #[inline]
    pub fn matches(&self, url: &str) -> bool {
        self.first_match(url).is_some()
    }
}

// =============================================================================
// Shared Filter Set
// =============================================================================

/// Holder for the current filter set, shared between the request handlers and
/// the refresh task.
#[derive(Debug, Clone)]
pub struct SharedFilterSet {
    inner: Arc<RwLock<Arc<FilterSet>>>,
}

impl Default for SharedFilterSet {
    fn default() -> Self {
        Self::new(FilterSet::empty())
    }
}

impl SharedFilterSet {
    pub fn new(set: FilterSet) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(set))),
        }
    }

    /// Current set. The returned handle stays valid across later swaps.
    pub fn load(&self) -> Arc<FilterSet> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&*guard),
            // Writers only ever assign a complete value, so a poisoned lock
            // still holds a whole set.
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    /// Replace the current set, returning the previous one.
    pub fn swap(&self, set: FilterSet) -> Arc<FilterSet> {
        let next = Arc::new(set);
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, next)
    }

    /// Whether the current set was compiled from exactly this text.
    pub fn is_source(&self, text: &str) -> bool {
        self.load().source() == text
    }
}
