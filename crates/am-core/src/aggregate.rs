//! On-demand aggregation
//!
//! Builds a read-only [`Snapshot`] of the session: a global summary plus one
//! bucket per owning context. Building a snapshot never mutates the session.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::events::{CookieSource, EventLog, PageMessage};
use crate::store::{RequestRecord, RequestStore};
use crate::types::{ContextId, Party};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_requests: usize,
    pub third_party_requests: usize,
    pub total_set_cookie_from_responses: u64,
    pub cookie_source_counts: BTreeMap<CookieSource, usize>,
    pub dangerous_requests: usize,
    pub blocked_requests: usize,
}

/// Requests and storage mutations attributed to one context.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBucket<'a> {
    pub first_party: Vec<&'a RequestRecord>,
    pub third_party: Vec<&'a RequestRecord>,
    pub storage: Vec<&'a PageMessage>,
}

/// Point-in-time view over the request store and event log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot<'a> {
    pub summary: Summary,
    pub contexts: BTreeMap<i64, ContextBucket<'a>>,
}

impl Snapshot<'_> {
    pub fn context(&self, id: i64) -> Option<&ContextBucket<'_>> {
        self.contexts.get(&id)
    }
}

pub fn summarize(requests: &RequestStore, events: &EventLog) -> Summary {
    let mut summary = Summary {
        cookie_source_counts: events.cookie_source_counts(),
        ..Summary::default()
    };

    for record in requests.records() {
        summary.total_requests += 1;
        if record.party() == Party::ThirdParty {
            summary.third_party_requests += 1;
        }
        summary.total_set_cookie_from_responses += u64::from(record.set_cookie_count());
        if record.dangerous() {
            summary.dangerous_requests += 1;
        }
        if record.blocked() {
            summary.blocked_requests += 1;
        }
    }

    summary
}

pub fn build_snapshot<'a>(requests: &'a RequestStore, events: &'a EventLog) -> Snapshot<'a> {
    let mut contexts: BTreeMap<i64, ContextBucket<'a>> = BTreeMap::new();

    for record in requests.records() {
        let bucket = contexts.entry(ContextId::bucket_key(record.context_id())).or_default();
        if record.party().buckets_as_third_party() {
            bucket.third_party.push(record);
        } else {
            bucket.first_party.push(record);
        }
    }

    for message in events.storage_messages() {
        contexts
            .entry(ContextId::bucket_key(message.context_id))
            .or_default()
            .storage
            .push(message);
    }

    Snapshot {
        summary: summarize(requests, events),
        contexts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Decision;
    use crate::events::{CookieEvent, PagePayload};
    use crate::store::{InterceptedRequest, ResponseHeader};
    use crate::types::RequestId;

    fn add(store: &mut RequestStore, id: &str, context: Option<i64>, decision: Decision) {
        let request = InterceptedRequest {
            id: RequestId::from(id),
            url: format!("https://host-{id}.example/"),
            method: "GET".to_string(),
            context_id: context.map(ContextId),
            initiator: None,
        };
        store.insert(RequestRecord::new(&request, decision, 0));
    }

    fn blocked() -> Decision {
        Decision {
            dangerous: true,
            blocked: true,
            rule: Some("||tracker.io^".to_string()),
        }
    }

    #[test]
    fn test_summary_counts() {
        let mut store = RequestStore::new();
        let mut log = EventLog::new();
        add(&mut store, "1", Some(1), Decision::default());
        add(&mut store, "2", Some(1), blocked());
        add(&mut store, "3", Some(2), Decision::default());
        store.classify(&RequestId::from("2"), Party::ThirdParty);
        store.classify(&RequestId::from("3"), Party::FirstParty);
        store.complete(
            &RequestId::from("1"),
            200,
            &[ResponseHeader::new("set-cookie", "a=1"), ResponseHeader::new("Set-Cookie", "b=1")],
        );
        store.complete(&RequestId::from("3"), 200, &[ResponseHeader::new("set-cookie", "c=1")]);
        log.push_cookie(CookieEvent::from_script(0, "x=1".to_string(), Some(ContextId(1))));

        let summary = summarize(&store, &log);
        assert_eq!(summary.total_requests, 3);
        assert_eq!(summary.third_party_requests, 1);
        assert_eq!(summary.total_set_cookie_from_responses, 3);
        assert_eq!(summary.dangerous_requests, 1);
        assert_eq!(summary.blocked_requests, 1);
        assert_eq!(summary.cookie_source_counts.get(&CookieSource::Script), Some(&1));
    }

    #[test]
    fn test_unknown_party_buckets_as_first_party() {
        let mut store = RequestStore::new();
        let log = EventLog::new();
        add(&mut store, "1", Some(4), Decision::default());
        add(&mut store, "2", Some(4), Decision::default());
        add(&mut store, "3", Some(4), Decision::default());
        store.classify(&RequestId::from("2"), Party::FirstParty);
        store.classify(&RequestId::from("3"), Party::ThirdParty);

        let snapshot = build_snapshot(&store, &log);
        let bucket = snapshot.context(4).unwrap();
        let first: Vec<&str> = bucket.first_party.iter().map(|r| r.id().as_str()).collect();
        let third: Vec<&str> = bucket.third_party.iter().map(|r| r.id().as_str()).collect();
        assert_eq!(first, vec!["1", "2"]);
        assert_eq!(third, vec!["3"]);
        assert_eq!(snapshot.summary.third_party_requests, 1);
    }

    #[test]
    fn test_bucket_sizes_match_records_per_context() {
        let mut store = RequestStore::new();
        let log = EventLog::new();
        let contexts = [Some(1), Some(2), None, Some(1), Some(-1), None, Some(2), Some(1)];
        for (i, context) in contexts.iter().enumerate() {
            add(&mut store, &i.to_string(), *context, Decision::default());
            if i % 3 == 0 {
                store.classify(&RequestId::from(i.to_string().as_str()), Party::ThirdParty);
            }
        }

        let snapshot = build_snapshot(&store, &log);
        for (key, bucket) in &snapshot.contexts {
            let expected = store
                .records()
                .iter()
                .filter(|r| ContextId::bucket_key(r.context_id()) == *key)
                .count();
            assert_eq!(bucket.first_party.len() + bucket.third_party.len(), expected);
        }
        assert_eq!(snapshot.context(0).unwrap().first_party.len() + snapshot.context(0).unwrap().third_party.len(), 2);
        assert!(snapshot.context(-1).is_some());
    }

    #[test]
    fn test_storage_messages_bucket_by_context() {
        let store = RequestStore::new();
        let mut log = EventLog::new();
        log.push_page_message(PageMessage {
            payload: PagePayload::LocalStorage {
                action: Some("setItem".to_string()),
                key: Some("k".to_string()),
                value: None,
            },
            context_id: Some(ContextId(9)),
            time: 1,
        });
        log.push_page_message(PageMessage {
            payload: PagePayload::Fetch {
                url: Some("/api".to_string()),
                method: None,
                body: None,
            },
            context_id: Some(ContextId(9)),
            time: 2,
        });
        log.push_page_message(PageMessage {
            payload: PagePayload::LocalStorage {
                action: Some("removeItem".to_string()),
                key: Some("k".to_string()),
                value: None,
            },
            context_id: None,
            time: 3,
        });

        let snapshot = build_snapshot(&store, &log);
        assert_eq!(snapshot.context(9).unwrap().storage.len(), 1);
        assert!(snapshot.context(9).unwrap().first_party.is_empty());
        assert_eq!(snapshot.context(0).unwrap().storage.len(), 1);
        assert_eq!(snapshot.summary.total_requests, 0);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut store = RequestStore::new();
        let mut log = EventLog::new();
        add(&mut store, "1", Some(3), Decision::default());
        log.push_cookie(CookieEvent::from_script(0, "x=1".to_string(), Some(ContextId(3))));

        let value = serde_json::to_value(build_snapshot(&store, &log)).unwrap();
        assert_eq!(value["summary"]["totalRequests"], 1);
        assert_eq!(value["summary"]["cookieSourceCounts"]["script"], 1);
        let record = &value["contexts"]["3"]["firstParty"][0];
        assert_eq!(record["id"], "1");
        assert_eq!(record["party"], "unknown");
        assert_eq!(record["statusCode"], serde_json::Value::Null);
        assert_eq!(record["setCookieCount"], 0);
        assert!(value["contexts"]["3"]["thirdParty"].as_array().unwrap().is_empty());
    }
}
