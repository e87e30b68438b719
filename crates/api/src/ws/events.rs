use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use yomi_core::error::CoreError;
use yomi_core::registry::JobRegistry;
use yomi_core::types::JobId;
use yomi_events::JobEventPublisher;

use crate::error::AppResult;
use crate::state::AppState;

/// GET /api/v1/jobs/{id}/events
///
/// Upgrades to a WebSocket that carries one JSON [`yomi_events::JobEvent`]
/// per text message and closes after the terminal `status` event. Unknown
/// jobs answer 404 before any upgrade is attempted.
pub async fn job_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> AppResult<Response> {
    let job_id = JobId::from(id);
    let registry = Arc::clone(state.service.registry());
    if !registry.contains(&job_id) {
        return Err(CoreError::job_not_found(&job_id).into());
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };
    let poll_interval = state.config.stream_poll_interval;
    Ok(ws.on_upgrade(move |socket| stream_job(socket, registry, job_id, poll_interval)))
}

/// Forward a job's events until the terminal status or the client leaves.
async fn stream_job(
    socket: WebSocket,
    registry: Arc<JobRegistry>,
    job_id: JobId,
    poll_interval: Duration,
) {
    let Some(publisher) = JobEventPublisher::new(registry, job_id.clone(), poll_interval) else {
        return;
    };
    tracing::debug!(job_id = %job_id, "Event stream opened");

    let (mut sink, mut inbound) = socket.split();
    let events = publisher.into_stream();
    tokio::pin!(events);

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(job_id = %job_id, error = %e, "Failed to encode job event");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    tracing::debug!(job_id = %job_id, "Event stream client went away");
                    return;
                }
            }
            msg = inbound.next() => match msg {
                Some(Ok(Message::Close(_))) | None => {
                    tracing::debug!(job_id = %job_id, "Event stream closed by client");
                    return;
                }
                Some(Err(e)) => {
                    tracing::debug!(job_id = %job_id, error = %e, "Event stream receive error");
                    return;
                }
                // Inbound data is ignored.
                Some(Ok(_)) => {}
            },
        }
    }

    let close = Message::Close(Some(CloseFrame {
        code: close_code::NORMAL,
        reason: "job finished".into(),
    }));
    let _ = sink.send(close).await;
    tracing::debug!(job_id = %job_id, "Event stream finished");
}
