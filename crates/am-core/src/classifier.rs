//! Party classification
//!
//! Decides whether a request targets the same host as its owning context's
//! current document. Resolution is asynchronous and independent of the
//! blocking decision. Every failure path classifies as third-party.

use std::future::Future;

use thiserror::Error;

use crate::types::{ContextId, Party, RequestId};
use crate::url::same_host;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("context {0} is not open")]
    ContextClosed(ContextId),
    #[error("context {0} has no document origin")]
    NoOrigin(ContextId),
    #[error("origin lookup failed: {0}")]
    Lookup(String),
}

/// Host capability returning the current document origin of a context.
pub trait OriginResolver {
    fn resolve_context_origin(
        &self,
        context_id: ContextId,
    ) -> impl Future<Output = Result<String, ResolveError>> + Send;
}

/// Work left for the classifier after interception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Resolved without asking the host.
    Resolved(Party),
    /// The owning context's origin must be looked up.
    Pending(PendingClassification),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingClassification {
    pub request_id: RequestId,
    pub context_id: ContextId,
    pub url: String,
}

/// Start classifying a request. A missing or invalid context never counts as
/// same-origin.
pub fn begin(request_id: &RequestId, context_id: Option<ContextId>, url: &str) -> Classification {
    match context_id {
        Some(context_id) if context_id.is_valid() => Classification::Pending(PendingClassification {
            request_id: request_id.clone(),
            context_id,
            url: url.to_string(),
        }),
        _ => Classification::Resolved(Party::ThirdParty),
    }
}

/// Classify a request URL against a resolved (or failed) context origin.
pub fn classify_origin(origin: Result<&str, &ResolveError>, url: &str) -> Party {
    let origin = match origin {
        Ok(origin) => origin,
        Err(err) => {
            log::debug!("origin resolution failed, classifying {url} as third-party: {err}");
            return Party::ThirdParty;
        }
    };

    match same_host(origin, url) {
        Some(true) => Party::FirstParty,
        Some(false) => Party::ThirdParty,
        None => {
            log::debug!("no comparable host between origin {origin} and {url}");
            Party::ThirdParty
        }
    }
}

impl PendingClassification {
    /// Resolve the owning context's origin and classify.
    pub async fn resolve<R: OriginResolver>(&self, resolver: &R) -> Party {
        let origin = resolver.resolve_context_origin(self.context_id).await;
        classify_origin(origin.as_deref(), &self.url)
    }
}
