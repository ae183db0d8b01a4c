//! CreditLedger (§4.3): the sole source of truth for tenant wallet balance.
//! Every mutation goes through a transaction that pairs a wallet update with
//! an idempotency-keyed ledger row; a replayed key rolls the wallet mutation
//! back rather than double-applying it (P1, P2, P3).

use rust_decimal::Decimal;
use serde_json::{json, Value as Json};
use uuid::Uuid;

use callhub_core::ids::TenantId;
use callhub_core::AppError;
use callhub_store::repositories::ledger::{CampaignSummary, LedgerRepo, NewLedgerEntry};
use callhub_store::repositories::wallets::WalletsRepo;
use callhub_store::model::LedgerKind;
use callhub_store::PgPool;

pub struct CreditLedger {
    pool: PgPool,
}

impl CreditLedger {
    pub fn new(pool: PgPool) -> Self {
        CreditLedger { pool }
    }

    pub async fn balance(&self, schema: &str, tenant: TenantId) -> Result<Decimal, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::internal)?;
        let wallet = WalletsRepo::find_by_tenant(&mut tx, schema, tenant)
            .await?
            .ok_or_else(|| AppError::not_found("wallet"))?;
        tx.commit().await.map_err(AppError::internal)?;
        Ok(wallet.current_balance)
    }

    /// Debits `amount` from the tenant wallet, recording a `Debit` ledger
    /// entry keyed by `idempotency_key`. A second call with the same key
    /// returns the original entry without debiting again.
    pub async fn debit(
        &self,
        schema: &str,
        tenant: TenantId,
        amount: Decimal,
        reference_kind: &str,
        reference_id: Option<Uuid>,
        description: &str,
        idempotency_key: &str,
    ) -> Result<DebitOutcome, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::internal)?;

        let debited = WalletsRepo::try_debit(&mut tx, schema, tenant, amount).await?;
        let Some((wallet_id, balance_before, balance_after)) = debited else {
            let wallet = WalletsRepo::find_by_tenant(&mut tx, schema, tenant)
                .await?
                .ok_or_else(|| AppError::not_found("wallet"))?;
            tx.rollback().await.map_err(AppError::internal)?;
            return Err(AppError::InsufficientCredits {
                required: amount,
                available: wallet.current_balance,
                needed: amount - wallet.current_balance,
            });
        };

        let entry = NewLedgerEntry {
            tenant_id: tenant,
            wallet_id,
            kind: LedgerKind::Debit,
            amount: -amount,
            balance_before,
            balance_after,
            reference_kind: reference_kind.to_string(),
            reference_id,
            description: description.to_string(),
            metadata: json!({}),
            idempotency_key: idempotency_key.to_string(),
        };
        let (entry, is_replay) = LedgerRepo::insert_or_get_existing(&mut tx, schema, entry).await?;

        if is_replay {
            // The debit we just performed is superfluous: this idempotency
            // key already has a ledger row, so undo the wallet mutation.
            tx.rollback().await.map_err(AppError::internal)?;
        } else {
            tx.commit().await.map_err(AppError::internal)?;
        }

        Ok(DebitOutcome { entry, was_replay: is_replay })
    }

    /// Credits `amount` back to the wallet (e.g. compensating a failed
    /// dispatch). Mirrors `debit`'s idempotency/replay handling.
    pub async fn refund(
        &self,
        schema: &str,
        tenant: TenantId,
        amount: Decimal,
        reference_kind: &str,
        reference_id: Option<Uuid>,
        description: &str,
        idempotency_key: &str,
    ) -> Result<DebitOutcome, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::internal)?;

        let credited = WalletsRepo::try_credit(&mut tx, schema, tenant, amount).await?;
        let Some((wallet_id, balance_before, balance_after)) = credited else {
            tx.rollback().await.map_err(AppError::internal)?;
            return Err(AppError::not_found("wallet"));
        };

        let entry = NewLedgerEntry {
            tenant_id: tenant,
            wallet_id,
            kind: LedgerKind::Refund,
            amount,
            balance_before,
            balance_after,
            reference_kind: reference_kind.to_string(),
            reference_id,
            description: description.to_string(),
            metadata: json!({}),
            idempotency_key: idempotency_key.to_string(),
        };
        let (entry, is_replay) = LedgerRepo::insert_or_get_existing(&mut tx, schema, entry).await?;

        if is_replay {
            tx.rollback().await.map_err(AppError::internal)?;
        } else {
            tx.commit().await.map_err(AppError::internal)?;
        }

        Ok(DebitOutcome { entry, was_replay: is_replay })
    }

    /// Signed manual adjustment (admin action). Positive credits, negative
    /// debits; both still enforce the non-negative balance invariant.
    pub async fn adjust(
        &self,
        schema: &str,
        tenant: TenantId,
        signed_amount: Decimal,
        description: &str,
        idempotency_key: &str,
    ) -> Result<DebitOutcome, AppError> {
        if signed_amount.is_sign_negative() {
            self.debit(
                schema,
                tenant,
                -signed_amount,
                "manual-adjustment",
                None,
                description,
                idempotency_key,
            )
            .await
        } else {
            self.refund(
                schema,
                tenant,
                signed_amount,
                "manual-adjustment",
                None,
                description,
                idempotency_key,
            )
            .await
        }
    }

    pub async fn campaign_summary(
        &self,
        schema: &str,
        tenant: TenantId,
        batch_id: Uuid,
    ) -> Result<CampaignSummary, AppError> {
        LedgerRepo::campaign_summary(&self.pool, schema, tenant, batch_id).await
    }
}

#[derive(Debug)]
pub struct DebitOutcome {
    pub entry: callhub_store::model::LedgerEntry,
    pub was_replay: bool,
}

impl DebitOutcome {
    pub fn as_json(&self) -> Json {
        json!({
            "ledger_entry_id": self.entry.id.to_string(),
            "amount": self.entry.amount,
            "balance_after": self.entry.balance_after,
            "replay": self.was_replay,
        })
    }
}
