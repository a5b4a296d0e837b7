//! Event handlers
//!
//! The [`Engine`] owns the session state and processes one host event per
//! call. Each handler runs to completion without suspending; the only work
//! deferred past a handler is party classification, which the caller runs
//! and feeds back through [`Engine::apply_party`].

use std::sync::Arc;

use crate::aggregate::{build_snapshot, Snapshot};
use crate::classifier::{self, Classification, PendingClassification};
use crate::decision::{decide_with_manual, Decision};
use crate::events::{CookieChange, CookieEvent, EventLog, PageMessage, PagePayload};
use crate::filter::{FilterSet, SharedFilterSet};
use crate::manual::ManualBlockList;
use crate::store::{CompletionMerge, InterceptedRequest, RequestRecord, RequestStore, ResponseHeader};
use crate::types::{ContextId, Party, RequestId, Timestamp, Verdict};

// =============================================================================
// Session
// =============================================================================

/// All state observed since the session started.
#[derive(Debug, Default)]
pub struct Session {
    requests: RequestStore,
    events: EventLog,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> &RequestStore {
        &self.requests
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn clear(&mut self) {
        self.requests.clear();
        self.events.clear();
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Result of intercepting a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interception {
    pub verdict: Verdict,
    pub decision: Decision,
    /// Classification still to be resolved, if any.
    pub pending: Option<PendingClassification>,
}

pub struct Engine {
    filters: SharedFilterSet,
    manual: ManualBlockList,
    session: Session,
}

impl Engine {
    pub fn new(filters: SharedFilterSet) -> Self {
        Self {
            filters,
            manual: ManualBlockList::new(),
            session: Session::new(),
        }
    }

    pub fn filters(&self) -> &SharedFilterSet {
        &self.filters
    }

    /// The filter set the next interception will be checked against.
    pub fn current_filters(&self) -> Arc<FilterSet> {
        self.filters.load()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Drop all observed state and start a new session. Manual entries are
    /// kept.
    pub fn reset_session(&mut self) {
        self.session.clear();
    }

    /// Block every later request whose URL contains `url`.
    pub fn add_manual_block(&mut self, url: &str) -> bool {
        let added = self.manual.add(url);
        if added {
            log::info!("manually blocking '{}'", url.trim());
        }
        added
    }

    pub fn remove_manual_block(&mut self, url: &str) -> bool {
        let removed = self.manual.remove(url);
        if removed {
            log::info!("no longer manually blocking '{}'", url.trim());
        }
        removed
    }

    pub fn manual_blocks(&self) -> &[String] {
        self.manual.entries()
    }

    /// Handle a request before dispatch. The returned verdict gates whether
    /// the host may send it.
    pub fn on_intercept_request(&mut self, request: InterceptedRequest, now: Timestamp) -> Interception {
        let decision = decide_with_manual(&self.manual, &self.filters.load(), &request.url);
        let verdict = decision.verdict();
        if let Some(rule) = decision.rule.as_deref() {
            log::debug!("blocking {} ({}) matched '{rule}'", request.url, request.id);
        }

        let record = RequestRecord::new(&request, decision.clone(), now);
        if !self.session.requests.insert(record) {
            log::debug!("request {} already recorded; keeping the first interception", request.id);
            return Interception {
                verdict,
                decision,
                pending: None,
            };
        }

        let pending = match classifier::begin(&request.id, request.context_id, &request.url) {
            Classification::Resolved(party) => {
                self.session.requests.classify(&request.id, party);
                None
            }
            Classification::Pending(pending) => Some(pending),
        };

        Interception {
            verdict,
            decision,
            pending,
        }
    }

    /// Merge a completion into its record. Unknown ids are ignored.
    pub fn on_request_completed(
        &mut self,
        id: &RequestId,
        url: &str,
        status_code: u16,
        headers: &[ResponseHeader],
        now: Timestamp,
    ) {
        match self.session.requests.complete(id, status_code, headers) {
            CompletionMerge::Applied { set_cookie_count } if set_cookie_count > 0 => {
                let context_id = self.session.requests.get(id).and_then(RequestRecord::context_id);
                self.session.events.push_cookie(CookieEvent::from_response(
                    now,
                    url,
                    set_cookie_count,
                    context_id,
                    id.clone(),
                ));
            }
            CompletionMerge::Applied { .. } => {}
            CompletionMerge::AlreadyCompleted => {
                log::debug!("ignoring repeated completion for request {id}");
            }
            CompletionMerge::UnknownRequest => {
                log::debug!("completion for unknown request {id}");
            }
        }
    }

    pub fn on_cookie_changed(&mut self, change: CookieChange, now: Timestamp) {
        self.session.events.push_cookie(CookieEvent::from_host_change(now, change));
    }

    /// Record a message reported by the monitored page, stamped with its
    /// owning context and arrival time.
    pub fn on_page_message(&mut self, context_id: Option<ContextId>, payload: PagePayload, now: Timestamp) {
        if let PagePayload::CookieSetScript { value } = &payload {
            self.session.events.push_cookie(CookieEvent::from_script(
                now,
                value.clone().unwrap_or_default(),
                context_id,
            ));
        }

        self.session.events.push_page_message(PageMessage {
            payload,
            context_id,
            time: now,
        });
    }

    /// Apply a resolved classification. Results for records that are gone or
    /// already classified are discarded.
    pub fn apply_party(&mut self, id: &RequestId, party: Party) -> bool {
        let applied = self.session.requests.classify(id, party);
        if !applied {
            log::debug!("discarding {party:?} classification for request {id}");
        }
        applied
    }

    /// Aggregate the current session. Never mutates state.
    pub fn snapshot(&self) -> Snapshot<'_> {
        build_snapshot(&self.session.requests, &self.session.events)
    }
}
