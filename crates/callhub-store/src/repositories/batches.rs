use chrono::Utc;
use serde_json::Value as Json;
use sqlx::{PgPool, Postgres, Transaction};

use callhub_core::error::AppError;
use callhub_core::ids::{BatchEntryId, BatchId, CallLogId, SubjectId, TenantId};

use crate::model::{Batch, BatchEntry, BatchEntryStatus, BatchStatus};
use crate::pagination::{Page, PageRequest};
use crate::schema::{qualify, validate_schema_identifier};

pub struct BatchesRepo;

const BATCH_COLUMNS: &str = "id, tenant_id, status, total_calls, completed_calls, failed_calls, \
     initiated_by, agent_id, scheduled_at, started_at, finished_at, metadata, cancel_requested";

const ENTRY_COLUMNS: &str = "id, batch_id, tenant_id, to_country_code, to_base_number, lead_ref, \
     status, call_log_id, last_error, retry_count";

pub struct NewBatchEntry {
    pub to_country_code: String,
    pub to_base_number: String,
    pub lead_ref: Option<String>,
}

impl BatchesRepo {
    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        schema: &str,
        tenant_id: TenantId,
        initiated_by: SubjectId,
        agent_id: i64,
        entries: Vec<NewBatchEntry>,
        metadata: Json,
    ) -> Result<(Batch, Vec<BatchEntry>), AppError> {
        validate_schema_identifier(schema)?;
        let batch_table = qualify(schema, "batches");
        let id = BatchId::new();
        let total = entries.len() as i32;
        let insert_batch = format!(
            "INSERT INTO {batch_table} \
             (id, tenant_id, status, total_calls, completed_calls, failed_calls, initiated_by, \
              agent_id, scheduled_at, metadata, cancel_requested) \
             VALUES ($1,$2,'pending',$3,0,0,$4,$5,$6,$7,false) \
             RETURNING {BATCH_COLUMNS}"
        );
        let batch: Batch = sqlx::query_as(&insert_batch)
            .bind(id)
            .bind(tenant_id)
            .bind(total)
            .bind(initiated_by)
            .bind(agent_id)
            .bind(Utc::now())
            .bind(metadata)
            .fetch_one(&mut **tx)
            .await
            .map_err(AppError::internal)?;

        let entry_table = qualify(schema, "batch_entries");
        let mut created = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry_id = BatchEntryId::new();
            let insert_entry = format!(
                "INSERT INTO {entry_table} \
                 (id, batch_id, tenant_id, to_country_code, to_base_number, lead_ref, status, \
                  retry_count) \
                 VALUES ($1,$2,$3,$4,$5,$6,'pending',0) \
                 RETURNING {ENTRY_COLUMNS}"
            );
            let row: BatchEntry = sqlx::query_as(&insert_entry)
                .bind(entry_id)
                .bind(id)
                .bind(tenant_id)
                .bind(entry.to_country_code)
                .bind(entry.to_base_number)
                .bind(entry.lead_ref)
                .fetch_one(&mut **tx)
                .await
                .map_err(AppError::internal)?;
            created.push(row);
        }

        Ok((batch, created))
    }

    pub async fn find(
        pool: &PgPool,
        schema: &str,
        tenant_id: TenantId,
        id: BatchId,
    ) -> Result<Option<Batch>, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "SELECT {BATCH_COLUMNS} FROM {} WHERE tenant_id = $1 AND id = $2",
            qualify(schema, "batches")
        );
        sqlx::query_as(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::internal)
    }

    pub async fn list(
        pool: &PgPool,
        schema: &str,
        tenant_id: TenantId,
        page: PageRequest,
    ) -> Result<Page<Batch>, AppError> {
        validate_schema_identifier(schema)?;
        let table = qualify(schema, "batches");
        let sql = format!(
            "SELECT {BATCH_COLUMNS} FROM {table} WHERE tenant_id = $1 \
             ORDER BY scheduled_at DESC OFFSET $2 LIMIT $3"
        );
        let data: Vec<Batch> = sqlx::query_as(&sql)
            .bind(tenant_id)
            .bind(page.offset())
            .bind(page.limit())
            .fetch_all(pool)
            .await
            .map_err(AppError::internal)?;
        let (total,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM {table} WHERE tenant_id = $1"
        ))
        .bind(tenant_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::internal)?;
        Ok(Page { data, total, page: page.page, limit: page.limit })
    }

    pub async fn set_status(
        tx: &mut Transaction<'_, Postgres>,
        schema: &str,
        tenant_id: TenantId,
        id: BatchId,
        status: BatchStatus,
    ) -> Result<(), AppError> {
        validate_schema_identifier(schema)?;
        let finished = matches!(
            status,
            BatchStatus::Finished | BatchStatus::Canceled | BatchStatus::Failed
        );
        let sql = format!(
            "UPDATE {} SET status = $3, \
                started_at = CASE WHEN $3 = 'running' THEN now() ELSE started_at END, \
                finished_at = CASE WHEN $4 THEN now() ELSE finished_at END \
             WHERE tenant_id = $1 AND id = $2",
            qualify(schema, "batches")
        );
        sqlx::query(&sql)
            .bind(tenant_id)
            .bind(id)
            .bind(status)
            .bind(finished)
            .execute(&mut **tx)
            .await
            .map_err(AppError::internal)?;
        Ok(())
    }

    pub async fn request_cancel(
        pool: &PgPool,
        schema: &str,
        tenant_id: TenantId,
        id: BatchId,
    ) -> Result<bool, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "UPDATE {} SET cancel_requested = true, status = 'canceling' \
             WHERE tenant_id = $1 AND id = $2 AND status NOT IN ('finished','canceled','failed')",
            qualify(schema, "batches")
        );
        let result = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::internal)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn is_cancel_requested(
        pool: &PgPool,
        schema: &str,
        tenant_id: TenantId,
        id: BatchId,
    ) -> Result<bool, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "SELECT cancel_requested FROM {} WHERE tenant_id = $1 AND id = $2",
            qualify(schema, "batches")
        );
        let row: Option<(bool,)> = sqlx::query_as(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::internal)?;
        Ok(row.map(|(v,)| v).unwrap_or(false))
    }

    /// Increments the batch's completed/failed counters atomically and
    /// returns the refreshed row, enforcing P6 at the row-update level.
    pub async fn record_entry_outcome(
        tx: &mut Transaction<'_, Postgres>,
        schema: &str,
        tenant_id: TenantId,
        id: BatchId,
        succeeded: bool,
    ) -> Result<Batch, AppError> {
        validate_schema_identifier(schema)?;
        let column = if succeeded { "completed_calls" } else { "failed_calls" };
        let sql = format!(
            "UPDATE {} SET {column} = {column} + 1 WHERE tenant_id = $1 AND id = $2 \
             RETURNING {BATCH_COLUMNS}",
            qualify(schema, "batches")
        );
        sqlx::query_as(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_one(&mut **tx)
            .await
            .map_err(AppError::internal)
    }

    pub async fn list_entries(
        pool: &PgPool,
        schema: &str,
        tenant_id: TenantId,
        batch_id: BatchId,
    ) -> Result<Vec<BatchEntry>, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM {} WHERE tenant_id = $1 AND batch_id = $2 ORDER BY id",
            qualify(schema, "batch_entries")
        );
        sqlx::query_as(&sql)
            .bind(tenant_id)
            .bind(batch_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::internal)
    }

    pub async fn mark_entry_dispatching(
        pool: &PgPool,
        schema: &str,
        tenant_id: TenantId,
        entry_id: BatchEntryId,
    ) -> Result<(), AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "UPDATE {} SET status = 'dispatching' WHERE tenant_id = $1 AND id = $2 AND status = 'pending'",
            qualify(schema, "batch_entries")
        );
        sqlx::query(&sql)
            .bind(tenant_id)
            .bind(entry_id)
            .execute(pool)
            .await
            .map_err(AppError::internal)?;
        Ok(())
    }

    pub async fn complete_entry(
        pool: &PgPool,
        schema: &str,
        tenant_id: TenantId,
        entry_id: BatchEntryId,
        status: BatchEntryStatus,
        call_log_id: Option<CallLogId>,
        last_error: Option<&str>,
    ) -> Result<(), AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "UPDATE {} SET status = $3, call_log_id = COALESCE($4, call_log_id), \
                last_error = COALESCE($5, last_error) \
             WHERE tenant_id = $1 AND id = $2",
            qualify(schema, "batch_entries")
        );
        sqlx::query(&sql)
            .bind(tenant_id)
            .bind(entry_id)
            .bind(status)
            .bind(call_log_id)
            .bind(last_error)
            .execute(pool)
            .await
            .map_err(AppError::internal)?;
        Ok(())
    }
}
