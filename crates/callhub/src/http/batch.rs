//! `/batch/*` and `/batch-view`, `/batch-id/{id}` handlers (§6).

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use callhub_core::ids::BatchId;
use callhub_core::phone::Phone;
use callhub_store::pagination::{Page, PageRequest};
use callhub_store::schema::{resolve_schema, SchemaResolutionInputs};

use crate::batch::BatchEntryInput;
use crate::http::error::ApiError;
use crate::http::extract::Principal;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerBatchRequest {
    pub agent_id: i64,
    pub entries: Vec<BatchEntryPayload>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchEntryPayload {
    pub to: String,
    pub lead_ref: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TriggerBatchResponse {
    pub batch_id: String,
    pub total_calls: i32,
}

pub async fn trigger_batch_call(
    State(state): State<AppState>,
    Principal(principal): Principal,
    axum::extract::Json(req): axum::extract::Json<TriggerBatchRequest>,
) -> Result<Json<TriggerBatchResponse>, ApiError> {
    let schema = resolve_schema(SchemaResolutionInputs {
        configured_default: "public",
        ..Default::default()
    })
    .map_err(ApiError)?;

    let entries = req
        .entries
        .into_iter()
        .map(|e| Phone::parse(&e.to).map(|to| BatchEntryInput { to, lead_ref: e.lead_ref }))
        .collect::<Result<Vec<_>, _>>()
        .map_err(ApiError)?;

    let (batch, _entries) = state
        .batches
        .create_batch(
            &schema,
            principal.tenant_id,
            principal.subject_id,
            req.agent_id,
            entries,
            req.metadata.unwrap_or(serde_json::Value::Null),
        )
        .await
        .map_err(ApiError)?;

    let batches = state.batches.clone();
    let schema_for_task = schema.clone();
    let tenant = principal.tenant_id;
    let batch_id = batch.id;
    let cost_per_call = state.config.min_credits_per_call;
    tokio::spawn(async move {
        if let Err(e) = batches.run(&schema_for_task, tenant, batch_id, cost_per_call).await {
            tracing::error!(error = %e, %batch_id, "batch run failed");
        }
    });

    Ok(Json(TriggerBatchResponse { batch_id: batch.id.to_string(), total_calls: batch.total_calls }))
}

pub async fn batch_status(
    State(state): State<AppState>,
    Principal(principal): Principal,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<callhub_store::model::Batch>, ApiError> {
    let schema = resolve_schema(SchemaResolutionInputs { configured_default: "public", ..Default::default() })
        .map_err(ApiError)?;
    let batch = state
        .batches
        .get_batch(&schema, principal.tenant_id, BatchId::from(id))
        .await
        .map_err(ApiError)?;
    Ok(Json(batch))
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub canceled: bool,
}

pub async fn batch_cancel(
    State(state): State<AppState>,
    Principal(principal): Principal,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<CancelResponse>, ApiError> {
    let schema = resolve_schema(SchemaResolutionInputs { configured_default: "public", ..Default::default() })
        .map_err(ApiError)?;
    let canceled = state
        .batches
        .cancel_batch(&schema, principal.tenant_id, BatchId::from(id))
        .await
        .map_err(ApiError)?;
    Ok(Json(CancelResponse { canceled }))
}

pub async fn batch_view(
    State(state): State<AppState>,
    Principal(principal): Principal,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<callhub_store::model::Batch>>, ApiError> {
    let schema = resolve_schema(SchemaResolutionInputs { configured_default: "public", ..Default::default() })
        .map_err(ApiError)?;
    let page = state
        .batches
        .list_batches(&schema, principal.tenant_id, page)
        .await
        .map_err(ApiError)?;
    Ok(Json(page))
}

pub async fn batch_by_id(
    State(state): State<AppState>,
    Principal(principal): Principal,
    Path(batch_id): Path<uuid::Uuid>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<callhub_store::model::CallLog>>, ApiError> {
    let schema = resolve_schema(SchemaResolutionInputs { configured_default: "public", ..Default::default() })
        .map_err(ApiError)?;
    let page = callhub_store::repositories::call_logs::CallLogsRepo::list_for_batch(
        &state.pool,
        &schema,
        principal.tenant_id,
        batch_id,
        page,
    )
    .await
    .map_err(ApiError)?;
    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub batch_id: uuid::Uuid,
}

pub async fn batch_stats(
    State(state): State<AppState>,
    Principal(principal): Principal,
    Query(query): Query<StatsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let schema = resolve_schema(SchemaResolutionInputs { configured_default: "public", ..Default::default() })
        .map_err(ApiError)?;
    let summary = state
        .credit
        .campaign_summary(&schema, principal.tenant_id, query.batch_id)
        .await
        .map_err(ApiError)?;
    Ok(Json(serde_json::json!({
        "total_cost": summary.total,
        "entry_count": summary.count,
        "by_usage_type": summary.by_usage_type.iter().map(|(kind, count, total)| {
            serde_json::json!({ "kind": kind, "count": count, "total": total })
        }).collect::<Vec<_>>(),
    })))
}
