//! Token index over filter rules
//!
//! Each rule is filed under one literal token that shows up as a whole
//! alphanumeric run in every URL the rule can match. A lookup tokenizes the
//! URL the same way and only checks the rules filed under those tokens, plus
//! the rules for which no such token exists.

use std::cmp::Reverse;
use std::collections::HashMap;

use crate::types::AnchorFlags;

#[inline]
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
}

/// Pattern bytes that can only ever match a non-alphanumeric URL byte (or the
/// end of the URL, for `^`).
#[inline]
fn is_pattern_boundary(b: u8) -> bool {
    b.is_ascii() && !is_token_byte(b) && b != b'*'
}

/// Lowercased literal tokens of a rule body that are bounded on both sides,
/// so a matching URL is guaranteed to contain them as complete runs.
///
/// A body edge counts as a boundary only when anchored: `|` and `||` pin the
/// start to the URL start or a host label, `|` at the end pins the URL end.
pub fn pattern_tokens(body: &str, anchors: AnchorFlags) -> Vec<String> {
    let bytes = body.as_bytes();
    let mut tokens: Vec<String> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if !is_token_byte(bytes[i]) {
            i += 1;
            continue;
        }

        let start = i;
        while i < bytes.len() && is_token_byte(bytes[i]) {
            i += 1;
        }

        let left = if start == 0 {
            anchors.intersects(AnchorFlags::START | AnchorFlags::DOMAIN)
        } else {
            is_pattern_boundary(bytes[start - 1])
        };
        let right = if i == bytes.len() {
            anchors.contains(AnchorFlags::END)
        } else {
            is_pattern_boundary(bytes[i])
        };

        if left && right {
            let token = body[start..i].to_ascii_lowercase();
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
    }

    tokens
}

/// Rule ids keyed by their filing token.
#[derive(Debug, Clone, Default)]
pub struct TokenIndex {
    postings: HashMap<String, Vec<u32>>,
    /// Rules without a usable token; checked for every URL
    untokened: Vec<u32>,
}

impl TokenIndex {
    /// Build from each rule's candidate tokens, in rule order. A rule is filed
    /// under its least shared token; longer tokens win ties.
    pub fn build(rule_tokens: &[&[String]]) -> Self {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for tokens in rule_tokens {
            for token in tokens.iter() {
                *counts.entry(token.as_str()).or_insert(0) += 1;
            }
        }

        let mut index = Self::default();
        for (id, tokens) in rule_tokens.iter().enumerate() {
            let id = id as u32;
            let best = tokens
                .iter()
                .min_by_key(|token| (counts.get(token.as_str()).copied().unwrap_or(0), Reverse(token.len())));
            match best {
                Some(token) => index.postings.entry(token.clone()).or_default().push(id),
                None => index.untokened.push(id),
            }
        }
        index
    }

    /// Number of distinct filing tokens.
    pub fn token_count(&self) -> usize {
        self.postings.len()
    }

    /// Number of rules checked for every URL.
    pub fn untokened_count(&self) -> usize {
        self.untokened.len()
    }

    /// Candidate rule ids for a URL, ascending. `None` means the URL cannot
    /// be narrowed (non-ASCII, where Unicode case folding can map other
    /// characters onto ASCII letters) and every rule must be checked.
    pub fn candidates(&self, url: &str) -> Option<Vec<u32>> {
        if !url.is_ascii() {
            return None;
        }

        let lower = url.to_ascii_lowercase();
        let mut ids = self.untokened.clone();
        for token in lower.split(|c: char| !c.is_ascii_alphanumeric()) {
            if token.is_empty() {
                continue;
            }
            if let Some(posting) = self.postings.get(token) {
                ids.extend_from_slice(posting);
            }
        }

        ids.sort_unstable();
        ids.dedup();
        Some(ids)
    }
}
