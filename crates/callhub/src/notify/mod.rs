//! ChangeNotifier (§4.8): drains Postgres LISTEN/NOTIFY payloads for
//! `call_log_changes`/`batch_changes`, re-reads the changed row, and
//! publishes it to `StreamHub` so SSE subscribers see near-real-time
//! updates without polling.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use callhub_core::ids::{BatchId, CallLogId, TenantId};
use callhub_store::listener::ReconnectingListener;
use callhub_store::repositories::batches::BatchesRepo;
use callhub_store::repositories::call_logs::CallLogsRepo;
use callhub_store::PgPool;

use crate::stream::{StreamEvent, StreamHub};

#[derive(Deserialize)]
struct ChangePayload {
    id: uuid::Uuid,
    tenant_id: uuid::Uuid,
}

pub struct ChangeNotifier {
    pool: PgPool,
    schema: String,
    hub: Arc<StreamHub>,
}

impl ChangeNotifier {
    pub fn new(pool: PgPool, schema: String, hub: Arc<StreamHub>) -> Self {
        ChangeNotifier { pool, schema, hub }
    }

    /// Runs forever, reconnecting transparently through `listener`. Intended
    /// to be spawned once at startup per deployment schema.
    pub async fn run(&self, mut listener: ReconnectingListener) {
        loop {
            let notification = match listener.recv().await {
                Ok(n) => n,
                Err(e) => {
                    tracing::error!(error = %e, "change listener terminated unexpectedly");
                    return;
                }
            };

            let channel = notification.channel().to_string();
            let payload: ChangePayload = match serde_json::from_str(notification.payload()) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(error = %e, channel, "malformed change notification payload");
                    continue;
                }
            };
            let tenant = TenantId::from(payload.tenant_id);

            if let Err(e) = self.handle(&channel, tenant, payload.id).await {
                tracing::warn!(error = %e, channel, "failed to enrich change notification");
            }
        }
    }

    async fn handle(
        &self,
        channel: &str,
        tenant: TenantId,
        id: uuid::Uuid,
    ) -> Result<(), callhub_core::AppError> {
        match channel {
            "call_log_changes" => {
                if let Some(row) =
                    CallLogsRepo::find(&self.pool, &self.schema, tenant, CallLogId::from(id)).await?
                {
                    self.hub.publish(tenant, StreamEvent::CallLogChanged(json!(row)));
                }
            }
            "batch_changes" => {
                if let Some(row) =
                    BatchesRepo::find(&self.pool, &self.schema, tenant, BatchId::from(id)).await?
                {
                    self.hub.publish(tenant, StreamEvent::BatchChanged(json!(row)));
                }
            }
            other => {
                tracing::debug!(channel = other, "ignoring unrecognized change channel");
            }
        }
        Ok(())
    }
}
