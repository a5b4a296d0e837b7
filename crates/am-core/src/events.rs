//! Cookie and storage events
//!
//! Everything the engine learns about cookie and storage mutations is
//! appended to an [`EventLog`]. There are three producers (response headers,
//! page scripts, host cookie notifications) and no deduplication between them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::{ContextId, RequestId, Timestamp};

// =============================================================================
// Cookie Events
// =============================================================================

/// Which observation channel produced a cookie event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CookieSource {
    /// `Set-Cookie` response headers seen at completion
    Response,
    /// `document.cookie` writes reported by the page
    Script,
    /// Host-level cookie change notification
    HostChange,
}

impl CookieSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Response => "response",
            Self::Script => "script",
            Self::HostChange => "host-change",
        }
    }
}

/// Cookie attributes as reported by a host change notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CookieDescriptor {
    pub name: String,
    pub domain: String,
    pub path: String,
    #[serde(alias = "storeId")]
    pub store: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<String>,
}

/// Either a full descriptor or the raw text that was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CookieValue {
    Descriptor(CookieDescriptor),
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieEvent {
    pub time: Timestamp,
    pub removed: bool,
    pub cause: String,
    pub cookie: CookieValue,
    pub source: CookieSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<ContextId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
}

impl CookieEvent {
    /// Cookies set through `Set-Cookie` headers of a completed request.
    pub fn from_response(
        time: Timestamp,
        url: &str,
        count: u32,
        context_id: Option<ContextId>,
        request_id: RequestId,
    ) -> Self {
        Self {
            time,
            removed: false,
            cause: "set-cookie-header".to_string(),
            cookie: CookieValue::Raw(format!("from-response to {url} ({count})")),
            source: CookieSource::Response,
            context_id,
            request_id: Some(request_id),
        }
    }

    /// A `document.cookie` assignment reported by the page.
    pub fn from_script(time: Timestamp, value: String, context_id: Option<ContextId>) -> Self {
        Self {
            time,
            removed: false,
            cause: "document.cookie".to_string(),
            cookie: CookieValue::Raw(value),
            source: CookieSource::Script,
            context_id,
            request_id: None,
        }
    }

    pub fn from_host_change(time: Timestamp, change: CookieChange) -> Self {
        Self {
            time,
            removed: change.removed,
            cause: change.cause,
            cookie: CookieValue::Descriptor(change.cookie),
            source: CookieSource::HostChange,
            context_id: None,
            request_id: None,
        }
    }
}

/// Host notification that a cookie was added, overwritten or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieChange {
    pub removed: bool,
    pub cause: String,
    pub cookie: CookieDescriptor,
}

// =============================================================================
// Page Messages
// =============================================================================

/// Payload reported by the monitored page. Fields missing from the wire are
/// left as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PagePayload {
    Fetch {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        method: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<Value>,
    },
    Xhr {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        method: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<Value>,
    },
    CookieSetScript {
        #[serde(default)]
        value: Option<String>,
    },
    LocalStorage {
        #[serde(default)]
        action: Option<String>,
        #[serde(default)]
        key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl PagePayload {
    /// Decode a payload from a JSON value. Objects whose `type` is missing,
    /// not a string, or unrecognized become [`PagePayload::Unknown`], and
    /// fields of the wrong shape are treated as absent.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self::Unknown;
        };

        let kind = match map.get("type").and_then(Value::as_str) {
            Some(kind) => kind.to_string(),
            None => return Self::Unknown,
        };

        // Drop string fields that arrived with another JSON type.
        for field in ["url", "method", "action", "key"] {
            if map.get(field).is_some_and(|v| !v.is_string()) {
                map.remove(field);
            }
        }
        if kind == "cookie-set-script" {
            coerce_to_string(&mut map, "value");
        }

        serde_json::from_value(Value::Object(map)).unwrap_or_else(|err| {
            log::debug!("page payload of type '{kind}' kept as unknown: {err}");
            Self::Unknown
        })
    }

    /// Decode a payload from JSON text.
    pub fn from_json(text: &str) -> Result<Self, PayloadError> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(value))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch",
            Self::Xhr { .. } => "xhr",
            Self::CookieSetScript { .. } => "cookie-set-script",
            Self::LocalStorage { .. } => "local-storage",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_storage_mutation(&self) -> bool {
        matches!(self, Self::LocalStorage { .. })
    }
}

/// Page scripts assign arbitrary values to `document.cookie`; keep their text.
fn coerce_to_string(map: &mut serde_json::Map<String, Value>, field: &str) {
    let text = match map.get(field) {
        None | Some(Value::Null) | Some(Value::String(_)) => return,
        Some(other) => other.to_string(),
    };
    map.insert(field.to_string(), Value::String(text));
}

/// A page payload stamped with its owning context and arrival time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMessage {
    #[serde(flatten)]
    pub payload: PagePayload,
    pub context_id: Option<ContextId>,
    pub time: Timestamp,
}

// =============================================================================
// Event Log
// =============================================================================

/// Append-only record of cookie events and page messages.
#[derive(Debug, Default)]
pub struct EventLog {
    cookies: Vec<CookieEvent>,
    page_messages: Vec<PageMessage>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_cookie(&mut self, event: CookieEvent) {
        self.cookies.push(event);
    }

    pub fn push_page_message(&mut self, message: PageMessage) {
        self.page_messages.push(message);
    }

    pub fn cookies(&self) -> &[CookieEvent] {
        &self.cookies
    }

    pub fn page_messages(&self) -> &[PageMessage] {
        &self.page_messages
    }

    pub fn storage_messages(&self) -> impl Iterator<Item = &PageMessage> {
        self.page_messages
            .iter()
            .filter(|message| message.payload.is_storage_mutation())
    }

    /// Number of cookie events per source tag.
    pub fn cookie_source_counts(&self) -> BTreeMap<CookieSource, usize> {
        let mut counts = BTreeMap::new();
        for event in &self.cookies {
            *counts.entry(event.source).or_insert(0) += 1;
        }
        counts
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
        self.page_messages.clear();
    }
}
