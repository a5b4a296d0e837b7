//! apimapper Core Library
//!
//! This crate holds the request pipeline of apimapper: the blocking decision
//! made at interception time, the per-request lifecycle store, party
//! classification, the cookie/storage event log and the on-demand aggregator.
//!
//! # Architecture
//!
//! The [`Engine`] owns one [`Session`] and is driven one host event at a time.
//! Filter rules are compiled elsewhere (`am-compiler`) and published through a
//! [`SharedFilterSet`], which a refresh task may replace at any time without
//! blocking the request handlers.
//!
//! # Modules
//!
//! - `types`: Identifiers, anchor flags, party and verdict enums
//! - `url`: Allocation-free URL helpers
//! - `index`: Token index narrowing which rules a URL is checked against
//! - `filter`: Compiled rules, filter sets and the swappable holder
//! - `manual`: User-maintained block list
//! - `decision`: Blocking decision
//! - `store`: Request lifecycle store
//! - `classifier`: Party classification
//! - `events`: Cookie events, page messages and the event log
//! - `aggregate`: Snapshot building
//! - `engine`: Event handlers tying the above together

pub mod types;
pub mod url;
pub mod index;
pub mod filter;
pub mod manual;
pub mod decision;
pub mod store;
pub mod classifier;
pub mod events;
pub mod aggregate;
pub mod engine;

// Re-export commonly used types
pub use aggregate::{ContextBucket, Snapshot, Summary};
pub use classifier::{OriginResolver, PendingClassification, ResolveError};
pub use decision::{decide, decide_with_manual, Decision};
pub use engine::{Engine, Interception, Session};
pub use events::{CookieChange, CookieEvent, CookieSource, PageMessage, PagePayload};
pub use filter::{FilterRule, FilterSet, SharedFilterSet};
pub use manual::ManualBlockList;
pub use store::{InterceptedRequest, RequestRecord, ResponseHeader};
pub use types::{AnchorFlags, ContextId, Party, RequestId, Timestamp, Verdict};
