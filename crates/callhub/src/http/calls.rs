//! `POST /calls/start-call` and `GET /calls/stream` (§6).

use std::convert::Infallible;
use std::time::Duration;

use async_stream::stream;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json_;

use callhub_core::phone::Phone;
use callhub_store::schema::{resolve_schema, SchemaResolutionInputs};

use crate::dispatch::DispatchRequest;
use crate::http::error::ApiError;
use crate::http::extract::Principal;
use crate::policy::{PolicyRequest, TimezoneHint};
use crate::state::AppState;
use crate::stream::StreamEvent;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartCallRequest {
    pub agent_id: i64,
    pub to: String,
    pub lead_ref: Option<String>,
    pub timezone: Option<String>,
    pub metadata: Option<Json_>,
}

#[derive(Debug, Serialize)]
pub struct StartCallResponse {
    pub call_log_id: String,
    pub status: String,
}

pub async fn start_call(
    State(state): State<AppState>,
    Principal(principal): Principal,
    axum::extract::Json(req): axum::extract::Json<StartCallRequest>,
) -> Result<Json<StartCallResponse>, ApiError> {
    let schema = resolve_schema(SchemaResolutionInputs {
        configured_default: "public",
        ..Default::default()
    })
    .map_err(ApiError)?;

    let to = Phone::parse(&req.to).map_err(ApiError)?;

    state
        .policy
        .check(PolicyRequest {
            schema: &schema,
            tenant: principal.tenant_id,
            subject: Some(principal.subject_id),
            feature_key: "voice-agent-calls",
            required_credits: state.config.min_credits_per_call,
            timezone_hint: TimezoneHint {
                body: req.timezone.as_deref(),
                header: None,
                subject_profile: None,
                cookie: None,
            },
        })
        .await
        .map_err(ApiError)?;

    let idempotency_key = uuid::Uuid::new_v4().to_string();
    let call_log = state
        .dispatcher
        .dispatch_call(
            &schema,
            DispatchRequest {
                tenant: principal.tenant_id,
                initiated_by: principal.subject_id,
                agent_id: req.agent_id,
                to,
                lead_ref: req.lead_ref,
                cost: state.config.min_credits_per_call,
                idempotency_key,
                batch_entry_id: None,
                metadata: req.metadata.unwrap_or(Json_::Null),
            },
        )
        .await
        .map_err(ApiError)?;

    Ok(Json(StartCallResponse {
        call_log_id: call_log.id.to_string(),
        status: format!("{:?}", call_log.status),
    }))
}

pub async fn stream_calls(
    State(state): State<AppState>,
    Principal(principal): Principal,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (replay, mut receiver) = state.stream.subscribe(principal.tenant_id);

    let event_stream = stream! {
        if let Some(event) = replay {
            if let Ok(data) = serde_json::to_string(&event) {
                yield Ok(Event::default().data(data));
            }
        }

        loop {
            tokio::select! {
                received = receiver.recv() => {
                    match received {
                        Ok(event) => {
                            if let Ok(data) = serde_json::to_string(&event) {
                                yield Ok(Event::default().data(data));
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            let err = StreamEvent::Error(serde_json::json!({
                                "message": format!("dropped {skipped} events, subscriber lagging"),
                            }));
                            if let Ok(data) = serde_json::to_string(&err) {
                                yield Ok(Event::default().data(data));
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    };

    Sse::new(event_stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
