//! Core type definitions for apimapper
//!
//! Identifiers, anchoring flags and classification enums shared by the
//! filter engine, the request store and the aggregator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch, as reported by the host.
pub type Timestamp = u64;

// =============================================================================
// Identifiers
// =============================================================================

/// Request identifier assigned by the host at interception time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Owning browsing context (tab) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(pub i64);

impl ContextId {
    /// Bucket key used for records and messages without a context.
    pub const UNATTRIBUTED: i64 = 0;

    /// Hosts report background or detached work with ids <= 0.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 > 0
    }

    /// Key under which an optional context id is aggregated.
    #[inline]
    pub fn bucket_key(id: Option<ContextId>) -> i64 {
        id.map(|c| c.0).unwrap_or(Self::UNATTRIBUTED)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Anchor Flags
// =============================================================================

bitflags::bitflags! {
    /// Anchoring mode of a filter rule.
    ///
    /// `DOMAIN` and `START` are mutually exclusive; either may be combined
    /// with `END`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AnchorFlags: u8 {
        /// Rule starts with `|`
        const START = 1 << 0;
        /// Rule ends with `|`
        const END = 1 << 1;
        /// Rule starts with `||`
        const DOMAIN = 1 << 2;
    }
}

// =============================================================================
// Party Classification
// =============================================================================

/// Origin relationship of a request to its owning context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Party {
    /// Classification has not resolved yet.
    #[default]
    Unknown,
    FirstParty,
    ThirdParty,
}

impl Party {
    #[inline]
    pub fn is_resolved(self) -> bool {
        self != Party::Unknown
    }

    /// Unresolved classifications are aggregated as first-party.
    #[inline]
    pub fn buckets_as_third_party(self) -> bool {
        self == Party::ThirdParty
    }
}

// =============================================================================
// Verdict
// =============================================================================

/// What the host must do with an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Proceed,
    Cancel,
}

impl Verdict {
    #[inline]
    pub fn is_cancel(self) -> bool {
        self == Verdict::Cancel
    }
}
