use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as Json;
use sqlx::{PgPool, Postgres, Transaction};

use callhub_core::error::AppError;
use callhub_core::ids::{BatchEntryId, CallLogId, SubjectId, TenantId, VoiceId};

use crate::model::{CallDirection, CallLog, CallStatus};
use crate::pagination::{Page, PageRequest};
use crate::schema::{qualify, validate_schema_identifier};

pub struct CallLogsRepo;

#[derive(Debug)]
pub struct NewCallLog {
    pub id: CallLogId,
    pub tenant_id: TenantId,
    pub initiated_by_subject: SubjectId,
    pub lead_ref: Option<String>,
    pub agent_id: i64,
    pub voice_id: Option<VoiceId>,
    pub from_number: Option<String>,
    pub to_country_code: String,
    pub to_base_number: String,
    pub direction: CallDirection,
    pub currency: String,
    pub metadata: Json,
    pub batch_entry_id: Option<BatchEntryId>,
}

const CALL_LOG_COLUMNS: &str = "id, tenant_id, initiated_by_subject, lead_ref, agent_id, voice_id, \
     from_number, to_country_code, to_base_number, direction, status, provider_call_id, \
     started_at, ended_at, duration_seconds, recording_url, cost, currency, metadata, \
     batch_entry_id, error_detail";

impl CallLogsRepo {
    /// Inserts a new call-log row in `queued`. The row's id doubles as the
    /// provider idempotency key (§4.6 step 4).
    pub async fn insert_queued(
        tx: &mut Transaction<'_, Postgres>,
        schema: &str,
        new: NewCallLog,
    ) -> Result<CallLog, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "INSERT INTO {} \
             (id, tenant_id, initiated_by_subject, lead_ref, agent_id, voice_id, from_number, \
              to_country_code, to_base_number, direction, status, started_at, currency, metadata, \
              batch_entry_id) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,'queued',$11,$12,$13,$14) \
             RETURNING {CALL_LOG_COLUMNS}",
            qualify(schema, "call_logs")
        );
        sqlx::query_as(&sql)
            .bind(new.id)
            .bind(new.tenant_id)
            .bind(new.initiated_by_subject)
            .bind(new.lead_ref)
            .bind(new.agent_id)
            .bind(new.voice_id)
            .bind(new.from_number)
            .bind(new.to_country_code)
            .bind(new.to_base_number)
            .bind(new.direction)
            .bind(Utc::now())
            .bind(new.currency)
            .bind(new.metadata)
            .bind(new.batch_entry_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(AppError::internal)
    }

    pub async fn find(
        pool: &PgPool,
        schema: &str,
        tenant_id: TenantId,
        id: CallLogId,
    ) -> Result<Option<CallLog>, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "SELECT {CALL_LOG_COLUMNS} FROM {} WHERE tenant_id = $1 AND id = $2",
            qualify(schema, "call_logs")
        );
        sqlx::query_as(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::internal)
    }

    /// Conditional status transition: only applies if the row's current
    /// status is still `from_status`, rejecting out-of-order callbacks and
    /// enforcing P5 (no transition out of a terminal state).
    #[allow(clippy::too_many_arguments)]
    pub async fn transition_status(
        tx: &mut Transaction<'_, Postgres>,
        schema: &str,
        tenant_id: TenantId,
        id: CallLogId,
        from_status: CallStatus,
        to_status: CallStatus,
        provider_call_id: Option<&str>,
        ended_at: Option<DateTime<Utc>>,
        duration_seconds: Option<i32>,
        cost: Option<Decimal>,
        recording_url: Option<&str>,
        error_detail: Option<Json>,
    ) -> Result<Option<CallLog>, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "UPDATE {} SET status = $4, \
                provider_call_id = COALESCE($5, provider_call_id), \
                ended_at = COALESCE($6, ended_at), \
                duration_seconds = COALESCE($7, duration_seconds), \
                cost = COALESCE($8, cost), \
                recording_url = COALESCE($9, recording_url), \
                error_detail = COALESCE($10, error_detail) \
             WHERE tenant_id = $1 AND id = $2 AND status = $3 \
             RETURNING {CALL_LOG_COLUMNS}",
            qualify(schema, "call_logs")
        );
        sqlx::query_as(&sql)
            .bind(tenant_id)
            .bind(id)
            .bind(from_status)
            .bind(to_status)
            .bind(provider_call_id)
            .bind(ended_at)
            .bind(duration_seconds)
            .bind(cost)
            .bind(recording_url)
            .bind(error_detail)
            .fetch_optional(&mut **tx)
            .await
            .map_err(AppError::internal)
    }

    pub async fn list_for_batch(
        pool: &PgPool,
        schema: &str,
        tenant_id: TenantId,
        batch_id: uuid::Uuid,
        page: PageRequest,
    ) -> Result<Page<CallLog>, AppError> {
        validate_schema_identifier(schema)?;
        let call_logs = qualify(schema, "call_logs");
        let entries = qualify(schema, "batch_entries");
        let sql = format!(
            "SELECT cl.id, cl.tenant_id, cl.initiated_by_subject, cl.lead_ref, cl.agent_id, \
                    cl.voice_id, cl.from_number, cl.to_country_code, cl.to_base_number, \
                    cl.direction, cl.status, cl.provider_call_id, cl.started_at, cl.ended_at, \
                    cl.duration_seconds, cl.recording_url, cl.cost, cl.currency, cl.metadata, \
                    cl.batch_entry_id, cl.error_detail \
             FROM {call_logs} cl \
             JOIN {entries} be ON be.id = cl.batch_entry_id \
             WHERE cl.tenant_id = $1 AND be.batch_id = $2 \
             ORDER BY cl.started_at DESC OFFSET $3 LIMIT $4"
        );
        let data: Vec<CallLog> = sqlx::query_as(&sql)
            .bind(tenant_id)
            .bind(batch_id)
            .bind(page.offset())
            .bind(page.limit())
            .fetch_all(pool)
            .await
            .map_err(AppError::internal)?;

        let count_sql = format!(
            "SELECT COUNT(*) FROM {call_logs} cl JOIN {entries} be ON be.id = cl.batch_entry_id \
             WHERE cl.tenant_id = $1 AND be.batch_id = $2"
        );
        let (total,): (i64,) = sqlx::query_as(&count_sql)
            .bind(tenant_id)
            .bind(batch_id)
            .fetch_one(pool)
            .await
            .map_err(AppError::internal)?;

        Ok(Page { data, total, page: page.page, limit: page.limit })
    }
}
