//! JSONL host transport
//!
//! Each input line is one host event, tagged by `"event"`. An optional
//! `"time"` (milliseconds since the epoch) overrides the arrival time.

use std::time::{SystemTime, UNIX_EPOCH};

use am_core::events::CookieChange;
use am_core::store::ResponseHeader;
use am_core::types::Timestamp;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub time: Option<Timestamp>,
    #[serde(flatten)]
    pub event: HostEvent,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum HostEvent {
    #[serde(rename_all = "camelCase")]
    Intercept {
        id: String,
        url: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default)]
        context_id: Option<i64>,
        #[serde(default)]
        initiator: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Completed {
        id: String,
        #[serde(default)]
        url: String,
        status_code: u16,
        #[serde(default)]
        response_headers: Vec<HeaderEntry>,
    },
    CookieChanged(CookieChange),
    #[serde(rename_all = "camelCase")]
    PageMessage {
        #[serde(default)]
        context_id: Option<i64>,
        #[serde(default)]
        payload: Value,
    },
    #[serde(rename_all = "camelCase")]
    ContextOrigin {
        context_id: i64,
        #[serde(default)]
        origin: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ContextClosed { context_id: i64 },
    /// Edit or list the user's own block list. `url` is required for
    /// `add` and `remove`.
    ManualBlock {
        action: ManualAction,
        #[serde(default)]
        url: Option<String>,
    },
    Snapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManualAction {
    Add,
    Remove,
    List,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HeaderEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

fn default_method() -> String {
    "GET".to_string()
}

pub fn response_headers(entries: Vec<HeaderEntry>) -> Vec<ResponseHeader> {
    entries
        .into_iter()
        .map(|entry| ResponseHeader::new(entry.name, entry.value))
        .collect()
}

/// Decode one input line. Blank lines yield `Ok(None)`.
pub fn decode_line(line: &str) -> Result<Option<Envelope>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_intercept_defaults() {
        let envelope = decode_line(r#"{"event":"intercept","id":"7","url":"https://x.io/"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(envelope.time, None);
        assert_eq!(
            envelope.event,
            HostEvent::Intercept {
                id: "7".to_string(),
                url: "https://x.io/".to_string(),
                method: "GET".to_string(),
                context_id: None,
                initiator: None,
            }
        );
    }

    #[test]
    fn test_decode_completed_with_headers() {
        let envelope = decode_line(
            r#"{"event":"completed","time":42,"id":"7","url":"https://x.io/","statusCode":200,
                "responseHeaders":[{"name":"Set-Cookie","value":"a=1"},{"name":"etag"}]}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(envelope.time, Some(42));
        let HostEvent::Completed { status_code, response_headers: headers, .. } = envelope.event else {
            panic!("expected completion");
        };
        assert_eq!(status_code, 200);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[1].value, "");
    }

    #[test]
    fn test_decode_cookie_and_context_events() {
        let envelope = decode_line(
            r#"{"event":"cookie-changed","removed":true,"cause":"expired","cookie":{"name":"sid","domain":"x.io"}}"#,
        )
        .unwrap()
        .unwrap();
        let HostEvent::CookieChanged(change) = envelope.event else {
            panic!("expected cookie change");
        };
        assert!(change.removed);
        assert_eq!(change.cookie.name, "sid");

        let envelope = decode_line(r#"{"event":"context-origin","contextId":3,"origin":"https://x.io"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            envelope.event,
            HostEvent::ContextOrigin {
                context_id: 3,
                origin: Some("https://x.io".to_string()),
            }
        );

        let envelope = decode_line(r#"{"event":"snapshot"}"#).unwrap().unwrap();
        assert_eq!(envelope.event, HostEvent::Snapshot);
    }

    #[test]
    fn test_decode_manual_block() {
        let envelope = decode_line(r#"{"event":"manual-block","action":"add","url":"ads.example"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            envelope.event,
            HostEvent::ManualBlock {
                action: ManualAction::Add,
                url: Some("ads.example".to_string()),
            }
        );

        let envelope = decode_line(r#"{"event":"manual-block","action":"list"}"#).unwrap().unwrap();
        assert_eq!(
            envelope.event,
            HostEvent::ManualBlock {
                action: ManualAction::List,
                url: None,
            }
        );
        assert!(decode_line(r#"{"event":"manual-block","action":"purge"}"#).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_line("   ").unwrap().is_none());
        assert!(decode_line("not json").is_err());
        assert!(decode_line(r#"{"event":"teleport"}"#).is_err());
        assert!(decode_line(r#"{"event":"intercept","url":"https://x.io/"}"#).is_err());
    }
}
