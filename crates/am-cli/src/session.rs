//! Host event loop
//!
//! Reads JSONL host events, drives the [`Engine`] and writes a snapshot line
//! whenever the host asks for one and once more at end of input. Party
//! classification runs on spawned tasks and is applied back on this loop.
//! A `manual-block` list request writes a `{"manualBlocks": [...]}` line.

use am_core::events::PagePayload;
use am_core::store::InterceptedRequest;
use am_core::types::{ContextId, Party, RequestId};
use am_core::Engine;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::origins::ContextOrigins;
use crate::transport::{decode_line, now_millis, response_headers, Envelope, HostEvent, ManualAction};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub events: usize,
    pub malformed: usize,
    pub cancelled: usize,
    pub snapshots: usize,
}

type PartyUpdate = (RequestId, Party);

pub async fn run_session<R, W>(
    engine: &mut Engine,
    input: R,
    output: &mut W,
    origins: ContextOrigins,
) -> Result<SessionStats, SessionError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<PartyUpdate>();
    let mut lines = input.lines();
    let mut stats = SessionStats::default();

    loop {
        tokio::select! {
            biased;
            Some((id, party)) = rx.recv() => {
                engine.apply_party(&id, party);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match decode_line(&line) {
                    Ok(Some(envelope)) => {
                        stats.events += 1;
                        handle_event(engine, envelope, output, &origins, &tx, &mut stats).await?;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        stats.malformed += 1;
                        log::warn!("skipping malformed event line: {err}");
                    }
                }
            }
        }
    }

    // Let in-flight classifications land before the final snapshot.
    drop(tx);
    while let Some((id, party)) = rx.recv().await {
        engine.apply_party(&id, party);
    }

    write_snapshot(engine, output).await?;
    stats.snapshots += 1;
    log::info!(
        "session ended after {} events ({} malformed, {} cancelled)",
        stats.events,
        stats.malformed,
        stats.cancelled
    );
    Ok(stats)
}

async fn handle_event<W: AsyncWrite + Unpin>(
    engine: &mut Engine,
    envelope: Envelope,
    output: &mut W,
    origins: &ContextOrigins,
    tx: &mpsc::UnboundedSender<PartyUpdate>,
    stats: &mut SessionStats,
) -> Result<(), SessionError> {
    let now = envelope.time.unwrap_or_else(now_millis);

    match envelope.event {
        HostEvent::Intercept {
            id,
            url,
            method,
            context_id,
            initiator,
        } => {
            let request = InterceptedRequest {
                id: RequestId::new(id),
                url,
                method,
                context_id: context_id.map(ContextId),
                initiator,
            };
            let interception = engine.on_intercept_request(request, now);
            if interception.verdict.is_cancel() {
                stats.cancelled += 1;
            }
            if let Some(pending) = interception.pending {
                let origins = origins.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let party = pending.resolve(&origins).await;
                    // The loop only stops listening once input is exhausted and drained.
                    let _ = tx.send((pending.request_id, party));
                });
            }
        }
        HostEvent::Completed {
            id,
            url,
            status_code,
            response_headers: headers,
        } => {
            let headers = response_headers(headers);
            engine.on_request_completed(&RequestId::new(id), &url, status_code, &headers, now);
        }
        HostEvent::CookieChanged(change) => engine.on_cookie_changed(change, now),
        HostEvent::PageMessage { context_id, payload } => {
            engine.on_page_message(context_id.map(ContextId), PagePayload::from_value(payload), now);
        }
        HostEvent::ContextOrigin { context_id, origin } => match origin {
            Some(origin) => origins.set(ContextId(context_id), origin),
            None => origins.close(ContextId(context_id)),
        },
        HostEvent::ContextClosed { context_id } => origins.close(ContextId(context_id)),
        HostEvent::ManualBlock { action, url } => match (action, url) {
            (ManualAction::List, _) => write_manual_blocks(engine, output).await?,
            (ManualAction::Add, Some(url)) => {
                engine.add_manual_block(&url);
            }
            (ManualAction::Remove, Some(url)) => {
                engine.remove_manual_block(&url);
            }
            (action, None) => log::warn!("manual-block {action:?} without a url"),
        },
        HostEvent::Snapshot => {
            write_snapshot(engine, output).await?;
            stats.snapshots += 1;
        }
    }
    Ok(())
}

async fn write_snapshot<W: AsyncWrite + Unpin>(engine: &Engine, output: &mut W) -> Result<(), SessionError> {
    let mut line = serde_json::to_string(&engine.snapshot())?;
    line.push('\n');
    output.write_all(line.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}

async fn write_manual_blocks<W: AsyncWrite + Unpin>(engine: &Engine, output: &mut W) -> Result<(), SessionError> {
    let mut line = serde_json::to_string(&serde_json::json!({ "manualBlocks": engine.manual_blocks() }))?;
    line.push('\n');
    output.write_all(line.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}
