//! WebAssembly bindings for apimapper
//!
//! The extension's background script forwards browser events here. Origin
//! lookups stay on the JS side: when an intercept reports
//! `pendingClassification`, the caller resolves the tab origin and answers
//! with [`resolve_party`].

use std::cell::RefCell;

use am_compiler::{install, RefreshOutcome};
use am_core::{
    classifier::{classify_origin, ResolveError},
    events::{CookieChange, PagePayload},
    store::{InterceptedRequest, ResponseHeader},
    types::{ContextId, RequestId},
    url::extract_host,
    Engine, SharedFilterSet,
};
use wasm_bindgen::prelude::*;

thread_local! {
    static ENGINE: RefCell<Engine> = RefCell::new(Engine::new(SharedFilterSet::default()));
}

fn now() -> u64 {
    js_sys::Date::now() as u64
}

fn set(target: &js_sys::Object, key: &str, value: &JsValue) {
    let _ = js_sys::Reflect::set(target, &key.into(), value);
}

/// Install subscription text. Identical text is ignored.
#[wasm_bindgen]
pub fn load_filter_list(text: &str) -> JsValue {
    let (outcome, rules) = ENGINE.with(|engine| {
        let engine = engine.borrow();
        let outcome = install(engine.filters(), text);
        (outcome, engine.current_filters().len())
    });

    let result = js_sys::Object::new();
    set(&result, "updated", &JsValue::from(matches!(outcome, RefreshOutcome::Updated(_))));
    set(&result, "rules", &JsValue::from(rules as u32));
    if let RefreshOutcome::Updated(stats) = outcome {
        set(&result, "dropped", &JsValue::from(stats.dropped as u32));
        set(&result, "deduped", &JsValue::from(stats.deduped as u32));
    }
    result.into()
}

#[wasm_bindgen]
pub fn rule_count() -> u32 {
    ENGINE.with(|engine| engine.borrow().current_filters().len() as u32)
}

#[wasm_bindgen]
pub fn on_intercept_request(
    request_id: &str,
    url: &str,
    method: &str,
    context_id: Option<i32>,
    initiator: Option<String>,
) -> JsValue {
    let request = InterceptedRequest {
        id: RequestId::from(request_id),
        url: url.to_string(),
        method: method.to_string(),
        context_id: context_id.map(|id| ContextId(i64::from(id))),
        initiator,
    };
    let interception = ENGINE.with(|engine| engine.borrow_mut().on_intercept_request(request, now()));

    let result = js_sys::Object::new();
    set(&result, "cancel", &JsValue::from(interception.verdict.is_cancel()));
    set(&result, "pendingClassification", &JsValue::from(interception.pending.is_some()));
    if let Some(rule) = &interception.decision.rule {
        set(&result, "rule", &JsValue::from_str(rule));
    }
    result.into()
}

/// Deliver the origin of a request's owning tab. `None` means the tab could
/// not be looked up.
#[wasm_bindgen]
pub fn resolve_party(request_id: &str, origin: Option<String>) -> bool {
    let id = RequestId::from(request_id);
    ENGINE.with(|engine| {
        let mut engine = engine.borrow_mut();
        let Some(record) = engine.session().requests().get(&id) else {
            return false;
        };
        let context_id = record.context_id().unwrap_or(ContextId(ContextId::UNATTRIBUTED));
        let failure = ResolveError::NoOrigin(context_id);
        let origin = origin.as_deref().filter(|origin| !origin.is_empty()).ok_or(&failure);
        let party = classify_origin(origin, record.url());
        engine.apply_party(&id, party)
    })
}

#[wasm_bindgen]
pub fn on_request_completed(request_id: &str, url: &str, status_code: u16, headers: JsValue) {
    let headers_array = js_sys::Array::from(&headers);
    let mut response_headers = Vec::with_capacity(headers_array.length() as usize);

    for entry in headers_array.iter() {
        let name = js_sys::Reflect::get(&entry, &"name".into())
            .ok()
            .and_then(|value| value.as_string())
            .unwrap_or_default();
        if name.is_empty() {
            continue;
        }
        let value = js_sys::Reflect::get(&entry, &"value".into())
            .ok()
            .and_then(|value| value.as_string())
            .unwrap_or_default();
        response_headers.push(ResponseHeader::new(name, value));
    }

    ENGINE.with(|engine| {
        engine.borrow_mut().on_request_completed(
            &RequestId::from(request_id),
            url,
            status_code,
            &response_headers,
            now(),
        );
    });
}

/// `change` is the browser's cookie change info as JSON.
#[wasm_bindgen]
pub fn on_cookie_changed(change: &str) -> Result<(), JsValue> {
    let change: CookieChange = serde_json::from_str(change)
        .map_err(|e| JsValue::from_str(&format!("Invalid cookie change: {}", e)))?;
    ENGINE.with(|engine| engine.borrow_mut().on_cookie_changed(change, now()));
    Ok(())
}

/// `payload` is the page message as JSON. Unrecognised payloads are still
/// recorded.
#[wasm_bindgen]
pub fn on_page_message(context_id: Option<i32>, payload: &str) {
    let payload = PagePayload::from_json(payload).unwrap_or_else(|e| {
        web_sys::console::warn_1(&JsValue::from_str(&format!("apimapper: {}", e)));
        PagePayload::Unknown
    });
    let context_id = context_id.map(|id| ContextId(i64::from(id)));
    ENGINE.with(|engine| engine.borrow_mut().on_page_message(context_id, payload, now()));
}

/// Snapshot of the session as JSON.
#[wasm_bindgen]
pub fn get_snapshot() -> Result<String, JsValue> {
    ENGINE.with(|engine| {
        serde_json::to_string(&engine.borrow().snapshot())
            .map_err(|e| JsValue::from_str(&format!("Failed to encode snapshot: {}", e)))
    })
}

/// Block every later request whose URL contains `url`.
#[wasm_bindgen]
pub fn add_manual_blocked_url(url: &str) -> bool {
    ENGINE.with(|engine| engine.borrow_mut().add_manual_block(url))
}

#[wasm_bindgen]
pub fn remove_manual_blocked_url(url: &str) -> bool {
    ENGINE.with(|engine| engine.borrow_mut().remove_manual_block(url))
}

#[wasm_bindgen]
pub fn get_manual_blocked_urls() -> js_sys::Array {
    ENGINE.with(|engine| {
        engine
            .borrow()
            .manual_blocks()
            .iter()
            .map(|url| JsValue::from_str(url))
            .collect()
    })
}

/// Drop recorded requests and events. Filters and manual entries stay loaded.
#[wasm_bindgen]
pub fn reset_session() {
    ENGINE.with(|engine| engine.borrow_mut().reset_session());
}

#[wasm_bindgen]
pub fn extract_host_js(url: &str) -> Option<String> {
    extract_host(url).map(|h| h.to_string())
}
