//! BatchCoordinator (§4.7): creates a batch of call-log entries and fans
//! them out with a bounded worker pool, honoring cooperative cancellation
//! (P6: a canceled batch never dispatches further entries once the flag is
//! observed, though entries already in flight are allowed to finish).

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::Value as Json;
use tokio::sync::Semaphore;

use callhub_core::ids::{BatchId, SubjectId, TenantId};
use callhub_core::phone::Phone;
use callhub_core::AppError;
use callhub_store::model::{Batch, BatchEntry, BatchEntryStatus, BatchStatus};
use callhub_store::pagination::{Page, PageRequest};
use callhub_store::repositories::batches::{BatchesRepo, NewBatchEntry};
use callhub_store::PgPool;

use crate::dispatch::{CallDispatcher, DispatchRequest};

pub struct BatchEntryInput {
    pub to: Phone,
    pub lead_ref: Option<String>,
}

pub struct BatchCoordinator {
    pool: PgPool,
    dispatcher: Arc<CallDispatcher>,
    max_parallel: usize,
}

impl BatchCoordinator {
    pub fn new(pool: PgPool, dispatcher: Arc<CallDispatcher>, max_parallel: usize) -> Self {
        BatchCoordinator { pool, dispatcher, max_parallel }
    }

    pub async fn create_batch(
        &self,
        schema: &str,
        tenant: TenantId,
        initiated_by: SubjectId,
        agent_id: i64,
        entries: Vec<BatchEntryInput>,
        metadata: Json,
    ) -> Result<(Batch, Vec<BatchEntry>), AppError> {
        if entries.is_empty() {
            return Err(AppError::validation("batch must contain at least one entry"));
        }
        let mut tx = self.pool.begin().await.map_err(AppError::internal)?;
        let created = BatchesRepo::create(
            &mut tx,
            schema,
            tenant,
            initiated_by,
            agent_id,
            entries
                .into_iter()
                .map(|e| NewBatchEntry {
                    to_country_code: e.to.country_code,
                    to_base_number: e.to.base_number,
                    lead_ref: e.lead_ref,
                })
                .collect(),
            metadata,
        )
        .await?;
        tx.commit().await.map_err(AppError::internal)?;
        Ok(created)
    }

    pub async fn get_batch(
        &self,
        schema: &str,
        tenant: TenantId,
        id: BatchId,
    ) -> Result<Batch, AppError> {
        BatchesRepo::find(&self.pool, schema, tenant, id)
            .await?
            .ok_or_else(|| AppError::not_found("batch"))
    }

    pub async fn list_batches(
        &self,
        schema: &str,
        tenant: TenantId,
        page: PageRequest,
    ) -> Result<Page<Batch>, AppError> {
        BatchesRepo::list(&self.pool, schema, tenant, page).await
    }

    pub async fn cancel_batch(
        &self,
        schema: &str,
        tenant: TenantId,
        id: BatchId,
    ) -> Result<bool, AppError> {
        BatchesRepo::request_cancel(&self.pool, schema, tenant, id).await
    }

    /// Runs every pending entry through the dispatcher, bounded by
    /// `max_parallel` concurrent in-flight calls, stopping early once a
    /// cancellation is observed between dispatches.
    pub async fn run(
        &self,
        schema: &str,
        tenant: TenantId,
        batch_id: BatchId,
        cost_per_call: Decimal,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::internal)?;
        BatchesRepo::set_status(&mut tx, schema, tenant, batch_id, BatchStatus::Running).await?;
        tx.commit().await.map_err(AppError::internal)?;

        let batch = self.get_batch(schema, tenant, batch_id).await?;
        let entries = BatchesRepo::list_entries(&self.pool, schema, tenant, batch_id).await?;
        let semaphore = Arc::new(Semaphore::new(self.max_parallel.max(1)));
        let mut handles = Vec::with_capacity(entries.len());

        for entry in entries {
            if entry.status != BatchEntryStatus::Pending {
                continue;
            }
            if BatchesRepo::is_cancel_requested(&self.pool, schema, tenant, batch_id).await? {
                break;
            }

            let permit = semaphore.clone().acquire_owned().await.map_err(AppError::internal)?;
            let pool = self.pool.clone();
            let dispatcher = self.dispatcher.clone();
            let schema = schema.to_string();
            let agent_id = batch.agent_id;
            let initiated_by = batch.initiated_by;

            let handle = tokio::spawn(async move {
                let _permit = permit;
                run_entry(pool, dispatcher, schema, tenant, batch_id, entry, agent_id, initiated_by, cost_per_call)
                    .await
            });
            handles.push(handle);
        }

        for handle in handles {
            let _ = handle.await;
        }

        self.finalize(schema, tenant, batch_id).await
    }

    async fn finalize(&self, schema: &str, tenant: TenantId, batch_id: BatchId) -> Result<(), AppError> {
        let batch = self.get_batch(schema, tenant, batch_id).await?;
        let cancel_requested = BatchesRepo::is_cancel_requested(&self.pool, schema, tenant, batch_id).await?;
        let final_status = if cancel_requested {
            BatchStatus::Canceled
        } else if batch.completed_calls + batch.failed_calls >= batch.total_calls {
            BatchStatus::Finished
        } else {
            BatchStatus::Failed
        };
        let mut tx = self.pool.begin().await.map_err(AppError::internal)?;
        BatchesRepo::set_status(&mut tx, schema, tenant, batch_id, final_status).await?;
        tx.commit().await.map_err(AppError::internal)?;
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_entry(
    pool: PgPool,
    dispatcher: Arc<CallDispatcher>,
    schema: String,
    tenant: TenantId,
    batch_id: BatchId,
    entry: BatchEntry,
    agent_id: i64,
    initiated_by: SubjectId,
    cost_per_call: Decimal,
) {
    let _ = BatchesRepo::mark_entry_dispatching(&pool, &schema, tenant, entry.id).await;

    let to = Phone { country_code: entry.to_country_code.clone(), base_number: entry.to_base_number.clone() };
    let result = dispatcher
        .dispatch_call(
            &schema,
            DispatchRequest {
                tenant,
                initiated_by,
                agent_id,
                to,
                lead_ref: entry.lead_ref.clone(),
                cost: cost_per_call,
                idempotency_key: format!("batch:{}:{}", batch_id, entry.id),
                batch_entry_id: Some(entry.id),
                metadata: Json::Null,
            },
        )
        .await;

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(_) => return,
    };

    match result {
        Ok(call_log) => {
            let _ = BatchesRepo::complete_entry(
                &pool,
                &schema,
                tenant,
                entry.id,
                BatchEntryStatus::Succeeded,
                Some(call_log.id),
                None,
            )
            .await;
            let _ = BatchesRepo::record_entry_outcome(&mut tx, &schema, tenant, batch_id, true).await;
        }
        Err(err) => {
            let message = err.to_string();
            let _ = BatchesRepo::complete_entry(
                &pool,
                &schema,
                tenant,
                entry.id,
                BatchEntryStatus::Failed,
                None,
                Some(message.as_str()),
            )
            .await;
            let _ = BatchesRepo::record_entry_outcome(&mut tx, &schema, tenant, batch_id, false).await;
        }
    }
    let _ = tx.commit().await;
}
