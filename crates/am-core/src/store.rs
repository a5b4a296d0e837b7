//! Request lifecycle store
//!
//! One [`RequestRecord`] per intercepted request, kept in interception order
//! and indexed by request id. Records are never removed while the session
//! lives; only the completion merge and the party classifier mutate them.

use std::collections::HashMap;

use serde::Serialize;

use crate::decision::Decision;
use crate::types::{ContextId, Party, RequestId, Timestamp};

// =============================================================================
// Request Record
// =============================================================================

/// State tracked for one observed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    id: RequestId,
    url: String,
    method: String,
    context_id: Option<ContextId>,
    initiator: Option<String>,
    time: Timestamp,
    status_code: Option<u16>,
    set_cookie_count: u32,
    party: Party,
    dangerous: bool,
    blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    matched_rule: Option<String>,
}

impl RequestRecord {
    pub fn new(request: &InterceptedRequest, decision: Decision, time: Timestamp) -> Self {
        Self {
            id: request.id.clone(),
            url: request.url.clone(),
            method: request.method.clone(),
            context_id: request.context_id,
            initiator: request.initiator.clone(),
            time,
            status_code: None,
            set_cookie_count: 0,
            party: Party::Unknown,
            dangerous: decision.dangerous,
            blocked: decision.blocked,
            matched_rule: decision.rule,
        }
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn context_id(&self) -> Option<ContextId> {
        self.context_id
    }

    pub fn initiator(&self) -> Option<&str> {
        self.initiator.as_deref()
    }

    pub fn time(&self) -> Timestamp {
        self.time
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn set_cookie_count(&self) -> u32 {
        self.set_cookie_count
    }

    pub fn party(&self) -> Party {
        self.party
    }

    pub fn dangerous(&self) -> bool {
        self.dangerous
    }

    pub fn blocked(&self) -> bool {
        self.blocked
    }

    pub fn matched_rule(&self) -> Option<&str> {
        self.matched_rule.as_deref()
    }

    pub fn is_completed(&self) -> bool {
        self.status_code.is_some()
    }

    /// Record the completion result. Returns `false` if the record was
    /// already completed; the first completion stands.
    fn complete(&mut self, status_code: u16, set_cookie_count: u32) -> bool {
        if self.is_completed() {
            return false;
        }
        self.status_code = Some(status_code);
        self.set_cookie_count = set_cookie_count;
        true
    }

    /// Resolve the party classification. Only `Unknown` may transition.
    fn classify(&mut self, party: Party) -> bool {
        if self.party.is_resolved() || !party.is_resolved() {
            return false;
        }
        self.party = party;
        true
    }
}

// =============================================================================
// Host Inputs
// =============================================================================

/// A request reported by the host before dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    pub id: RequestId,
    pub url: String,
    pub method: String,
    pub context_id: Option<ContextId>,
    pub initiator: Option<String>,
}

/// One response header as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHeader {
    pub name: String,
    pub value: String,
}

impl ResponseHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Count headers named `set-cookie`, ignoring case.
pub fn count_set_cookie(headers: &[ResponseHeader]) -> u32 {
    headers
        .iter()
        .filter(|header| header.name.eq_ignore_ascii_case("set-cookie"))
        .count() as u32
}

// =============================================================================
// Request Store
// =============================================================================

/// Result of merging a completion into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMerge {
    /// Status and set-cookie count were recorded
    Applied { set_cookie_count: u32 },
    /// The record had already been completed
    AlreadyCompleted,
    /// No record with that id
    UnknownRequest,
}

#[derive(Debug, Default)]
pub struct RequestStore {
    records: Vec<RequestRecord>,
    index: HashMap<RequestId, usize>,
}

impl RequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record. Returns `false` and leaves the store unchanged if
    /// a record with the same id already exists.
    pub fn insert(&mut self, record: RequestRecord) -> bool {
        if self.index.contains_key(record.id()) {
            return false;
        }
        self.index.insert(record.id().clone(), self.records.len());
        self.records.push(record);
        true
    }

    pub fn get(&self, id: &RequestId) -> Option<&RequestRecord> {
        self.index.get(id).map(|&pos| &self.records[pos])
    }

    fn get_mut(&mut self, id: &RequestId) -> Option<&mut RequestRecord> {
        let pos = *self.index.get(id)?;
        self.records.get_mut(pos)
    }

    pub fn complete(&mut self, id: &RequestId, status_code: u16, headers: &[ResponseHeader]) -> CompletionMerge {
        let Some(record) = self.get_mut(id) else {
            return CompletionMerge::UnknownRequest;
        };
        let set_cookie_count = count_set_cookie(headers);
        if record.complete(status_code, set_cookie_count) {
            CompletionMerge::Applied { set_cookie_count }
        } else {
            CompletionMerge::AlreadyCompleted
        }
    }

    /// Patch the party classification of a record. Returns `true` if the
    /// record existed and was still unresolved.
    pub fn classify(&mut self, id: &RequestId, party: Party) -> bool {
        match self.get_mut(id) {
            Some(record) => record.classify(party),
            None => false,
        }
    }

    /// Records in interception order.
    pub fn records(&self) -> &[RequestRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intercepted(id: &str) -> InterceptedRequest {
        InterceptedRequest {
            id: RequestId::from(id),
            url: "https://cdn.example.com/app.js".to_string(),
            method: "GET".to_string(),
            context_id: Some(ContextId(1)),
            initiator: Some("https://example.com".to_string()),
        }
    }

    fn store_with(id: &str) -> RequestStore {
        let mut store = RequestStore::new();
        assert!(store.insert(RequestRecord::new(&intercepted(id), Decision::default(), 10)));
        store
    }

    #[test]
    fn test_new_record_defaults() {
        let store = store_with("1");
        let record = store.get(&RequestId::from("1")).unwrap();
        assert_eq!(record.party(), Party::Unknown);
        assert_eq!(record.status_code(), None);
        assert_eq!(record.set_cookie_count(), 0);
        assert!(!record.dangerous());
        assert!(!record.blocked());
        assert_eq!(record.time(), 10);
    }

    #[test]
    fn test_duplicate_insert_keeps_first() {
        let mut store = store_with("1");
        let mut other = intercepted("1");
        other.url = "https://other.example/".to_string();
        assert!(!store.insert(RequestRecord::new(&other, Decision::default(), 20)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&RequestId::from("1")).unwrap().url(), "https://cdn.example.com/app.js");
    }

    #[test]
    fn test_complete_counts_set_cookie_case_insensitively() {
        let mut store = store_with("1");
        let headers = vec![
            ResponseHeader::new("Set-Cookie", "a=1"),
            ResponseHeader::new("set-cookie", "b=2"),
            ResponseHeader::new("SET-COOKIE", "c=3"),
            ResponseHeader::new("content-type", "text/html"),
        ];
        let merge = store.complete(&RequestId::from("1"), 200, &headers);
        assert_eq!(merge, CompletionMerge::Applied { set_cookie_count: 3 });

        let record = store.get(&RequestId::from("1")).unwrap();
        assert_eq!(record.status_code(), Some(200));
        assert_eq!(record.set_cookie_count(), 3);
    }

    #[test]
    fn test_completion_is_write_once() {
        let mut store = store_with("1");
        store.complete(&RequestId::from("1"), 302, &[ResponseHeader::new("set-cookie", "a=1")]);
        let merge = store.complete(&RequestId::from("1"), 200, &[]);
        assert_eq!(merge, CompletionMerge::AlreadyCompleted);

        let record = store.get(&RequestId::from("1")).unwrap();
        assert_eq!(record.status_code(), Some(302));
        assert_eq!(record.set_cookie_count(), 1);
    }

    #[test]
    fn test_complete_unknown_is_noop() {
        let mut store = store_with("1");
        let merge = store.complete(&RequestId::from("nope"), 200, &[]);
        assert_eq!(merge, CompletionMerge::UnknownRequest);
        assert_eq!(store.get(&RequestId::from("1")).unwrap().status_code(), None);
    }

    #[test]
    fn test_party_transitions_once() {
        let mut store = store_with("1");
        let id = RequestId::from("1");
        assert!(!store.classify(&id, Party::Unknown));
        assert!(store.classify(&id, Party::FirstParty));
        assert!(!store.classify(&id, Party::ThirdParty));
        assert_eq!(store.get(&id).unwrap().party(), Party::FirstParty);
        assert!(!store.classify(&RequestId::from("gone"), Party::ThirdParty));
    }

    #[test]
    fn test_records_keep_interception_order() {
        let mut store = RequestStore::new();
        for id in ["c", "a", "b"] {
            store.insert(RequestRecord::new(&intercepted(id), Decision::default(), 0));
        }
        let ids: Vec<&str> = store.records().iter().map(|r| r.id().as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);

        store.clear();
        assert!(store.is_empty());
        assert!(store.get(&RequestId::from("a")).is_none());
    }
}
