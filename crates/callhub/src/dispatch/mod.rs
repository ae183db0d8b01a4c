//! CallDispatcher (§4.6): turns a validated start-call request into a
//! provider call and a call-log row, with a compensating refund if the
//! provider never accepts the call.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value as Json};

use callhub_core::ids::{AgentRef, BatchEntryId, CallLogId, SubjectId, TenantId};
use callhub_core::phone::Phone;
use callhub_core::AppError;
use callhub_store::model::{CallDirection, CallLog, CallStatus};
use callhub_store::repositories::agents::AgentsRepo;
use callhub_store::repositories::call_logs::{CallLogsRepo, NewCallLog};
use callhub_store::repositories::numbers::NumbersRepo;
use callhub_store::PgPool;

use crate::credit::CreditLedger;
use crate::provider::{PlaceCallRequest, ProviderRouter};

const PROVIDER_CALL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct DispatchRequest {
    pub tenant: TenantId,
    pub initiated_by: SubjectId,
    pub agent_id: i64,
    pub to: Phone,
    pub lead_ref: Option<String>,
    pub cost: Decimal,
    pub idempotency_key: String,
    pub batch_entry_id: Option<BatchEntryId>,
    pub metadata: Json,
}

pub struct CallDispatcher {
    pool: PgPool,
    credit: Arc<CreditLedger>,
    providers: Arc<ProviderRouter>,
}

impl CallDispatcher {
    pub fn new(pool: PgPool, credit: Arc<CreditLedger>, providers: Arc<ProviderRouter>) -> Self {
        CallDispatcher { pool, credit, providers }
    }

    /// §4.6 algorithm: resolve agent/voice/provider, debit credits, insert
    /// the call-log row, commit, then place the call over the network.
    /// A provider failure after the commit triggers a refund rather than a
    /// rolled-back insert, so the call-log row always reflects what was
    /// actually attempted (P1: the ledger and the call-log never disagree
    /// about whether a call was billed).
    pub async fn dispatch_call(
        &self,
        schema: &str,
        req: DispatchRequest,
    ) -> Result<CallLog, AppError> {
        let agent = AgentsRepo::find(&self.pool, schema, req.tenant, req.agent_id)
            .await?
            .ok_or_else(|| AppError::not_found("voice agent"))?;

        let from_number = NumbersRepo::find_by_e164(
            &self.pool,
            schema,
            req.tenant,
            &req.to.country_code,
            &req.to.base_number,
        )
        .await?
        .map(|n| format!("+{}{}", n.country_code, n.base_number));

        self.credit
            .debit(
                schema,
                req.tenant,
                req.cost,
                "call",
                None,
                "outbound call dispatch",
                &req.idempotency_key,
            )
            .await?;

        let call_log_id = CallLogId::new();
        let mut tx = self.pool.begin().await.map_err(AppError::internal)?;
        let call_log = CallLogsRepo::insert_queued(
            &mut tx,
            schema,
            NewCallLog {
                id: call_log_id,
                tenant_id: req.tenant,
                initiated_by_subject: req.initiated_by,
                lead_ref: req.lead_ref,
                agent_id: req.agent_id,
                voice_id: agent.voice_id,
                from_number,
                to_country_code: req.to.country_code.clone(),
                to_base_number: req.to.base_number.clone(),
                direction: CallDirection::Outbound,
                currency: "USD".to_string(),
                metadata: req.metadata.clone(),
                batch_entry_id: req.batch_entry_id,
            },
        )
        .await?;
        tx.commit().await.map_err(AppError::internal)?;

        let agent_ref = AgentRef::Numeric(req.agent_id);
        let provider = self.providers.route(&agent_ref)?;

        let place_result = tokio::time::timeout(
            PROVIDER_CALL_TIMEOUT,
            provider.place_call(PlaceCallRequest {
                idempotency_key: call_log_id.to_string(),
                agent: agent_ref,
                from_e164: call_log.from_number.clone(),
                to_e164: req.to.e164(),
                metadata: req.metadata,
            }),
        )
        .await;

        match place_result {
            Ok(Ok(response)) => {
                let mut tx = self.pool.begin().await.map_err(AppError::internal)?;
                let updated = CallLogsRepo::transition_status(
                    &mut tx,
                    schema,
                    req.tenant,
                    call_log_id,
                    CallStatus::Queued,
                    CallStatus::Ringing,
                    Some(response.provider_call_id.as_str()),
                    None,
                    None,
                    None,
                    None,
                    None,
                )
                .await?
                .unwrap_or(call_log);
                tx.commit().await.map_err(AppError::internal)?;
                Ok(updated)
            }
            Ok(Err(err)) => self.fail_and_refund(schema, &req_for_refund(&req, call_log_id), err).await,
            Err(_) => {
                self.fail_and_refund(
                    schema,
                    &req_for_refund(&req, call_log_id),
                    AppError::ProviderFailed {
                        message: "provider did not respond within 30s".to_string(),
                        upstream_detail: None,
                    },
                )
                .await
            }
        }
    }

    /// Transitions the call-log to `failed` and refunds the debited cost.
    /// Returns `cause` regardless of whether the terminal transition landed,
    /// since the caller only needs to know dispatch did not succeed.
    async fn fail_and_refund(
        &self,
        schema: &str,
        ctx: &RefundContext,
        cause: AppError,
    ) -> Result<CallLog, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::internal)?;
        let _ = CallLogsRepo::transition_status(
            &mut tx,
            schema,
            ctx.tenant,
            ctx.call_log_id,
            CallStatus::Queued,
            CallStatus::Failed,
            None,
            Some(Utc::now()),
            None,
            None,
            None,
            Some(json!({ "kind": cause.kind(), "message": cause.to_string() })),
        )
        .await?;
        tx.commit().await.map_err(AppError::internal)?;

        self.credit
            .refund(
                schema,
                ctx.tenant,
                ctx.cost,
                "call",
                Some(ctx.call_log_id.inner()),
                "dispatch failure compensation",
                &format!("refund:{}", ctx.idempotency_key),
            )
            .await?;

        Err(cause)
    }
}

struct RefundContext {
    tenant: TenantId,
    call_log_id: CallLogId,
    cost: Decimal,
    idempotency_key: String,
}

fn req_for_refund(req: &DispatchRequest, call_log_id: CallLogId) -> RefundContext {
    RefundContext {
        tenant: req.tenant,
        call_log_id,
        cost: req.cost,
        idempotency_key: req.idempotency_key.clone(),
    }
}
