use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value as Json;
use sqlx::{Postgres, Transaction};

use callhub_core::error::AppError;
use callhub_core::ids::{LedgerEntryId, TenantId, WalletId};

use crate::model::{LedgerEntry, LedgerKind};
use crate::schema::{qualify, validate_schema_identifier};

pub struct LedgerRepo;

#[derive(Debug)]
pub struct NewLedgerEntry {
    pub tenant_id: TenantId,
    pub wallet_id: WalletId,
    pub kind: LedgerKind,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub reference_kind: String,
    pub reference_id: Option<uuid::Uuid>,
    pub description: String,
    pub metadata: Json,
    pub idempotency_key: String,
}

impl LedgerRepo {
    /// Inserts the entry, or returns the prior row if `idempotency_key`
    /// already exists for this tenant (P2 idempotent replay). The caller
    /// must have already rolled back any balance mutation before treating
    /// a replay as the final outcome, since the unique-key conflict means
    /// this insert (and therefore the paired wallet update) did not apply.
    pub async fn insert_or_get_existing(
        tx: &mut Transaction<'_, Postgres>,
        schema: &str,
        entry: NewLedgerEntry,
    ) -> Result<(LedgerEntry, bool), AppError> {
        validate_schema_identifier(schema)?;
        let table = qualify(schema, "ledger_entries");
        let insert_sql = format!(
            "INSERT INTO {table} \
             (id, tenant_id, wallet_id, kind, amount, balance_before, balance_after, \
              reference_kind, reference_id, description, metadata, idempotency_key, created_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13) \
             ON CONFLICT (tenant_id, idempotency_key) DO NOTHING \
             RETURNING id, tenant_id, wallet_id, kind, amount, balance_before, balance_after, \
                       reference_kind, reference_id, description, metadata, idempotency_key, created_at"
        );
        let id = LedgerEntryId::new();
        let inserted: Option<LedgerEntry> = sqlx::query_as(&insert_sql)
            .bind(id)
            .bind(entry.tenant_id)
            .bind(entry.wallet_id)
            .bind(entry.kind)
            .bind(entry.amount)
            .bind(entry.balance_before)
            .bind(entry.balance_after)
            .bind(&entry.reference_kind)
            .bind(entry.reference_id)
            .bind(&entry.description)
            .bind(&entry.metadata)
            .bind(&entry.idempotency_key)
            .bind(Utc::now())
            .fetch_optional(&mut **tx)
            .await
            .map_err(AppError::internal)?;

        match inserted {
            Some(row) => Ok((row, false)),
            None => {
                let existing = Self::find_by_idempotency_key(
                    tx,
                    schema,
                    entry.tenant_id,
                    &entry.idempotency_key,
                )
                .await?
                .ok_or_else(|| {
                    AppError::internal(anyhow::anyhow!(
                        "idempotency conflict on insert but no existing row found"
                    ))
                })?;
                Ok((existing, true))
            }
        }
    }

    pub async fn find_by_idempotency_key(
        tx: &mut Transaction<'_, Postgres>,
        schema: &str,
        tenant_id: TenantId,
        idempotency_key: &str,
    ) -> Result<Option<LedgerEntry>, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "SELECT id, tenant_id, wallet_id, kind, amount, balance_before, balance_after, \
                    reference_kind, reference_id, description, metadata, idempotency_key, created_at \
             FROM {} WHERE tenant_id = $1 AND idempotency_key = $2",
            qualify(schema, "ledger_entries")
        );
        sqlx::query_as(&sql)
            .bind(tenant_id)
            .bind(idempotency_key)
            .fetch_optional(&mut **tx)
            .await
            .map_err(AppError::internal)
    }

    pub async fn sum_for_wallet(
        tx: &mut Transaction<'_, Postgres>,
        schema: &str,
        wallet_id: WalletId,
    ) -> Result<Decimal, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "SELECT COALESCE(SUM(amount), 0) FROM {} WHERE wallet_id = $1",
            qualify(schema, "ledger_entries")
        );
        let (sum,): (Decimal,) = sqlx::query_as(&sql)
            .bind(wallet_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(AppError::internal)?;
        Ok(sum)
    }

    pub async fn campaign_summary(
        pool: &sqlx::PgPool,
        schema: &str,
        tenant_id: TenantId,
        reference_id: uuid::Uuid,
    ) -> Result<CampaignSummary, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "SELECT kind, COUNT(*) AS count, COALESCE(SUM(amount), 0) AS total \
             FROM {} WHERE tenant_id = $1 AND reference_id = $2 GROUP BY kind",
            qualify(schema, "ledger_entries")
        );
        let rows: Vec<(LedgerKind, i64, Decimal)> = sqlx::query_as(&sql)
            .bind(tenant_id)
            .bind(reference_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::internal)?;

        let mut summary = CampaignSummary::default();
        for (kind, count, total) in rows {
            summary.count += count;
            summary.total += total;
            summary.by_usage_type.push((kind, count, total));
        }
        Ok(summary)
    }
}

#[derive(Debug, Default)]
pub struct CampaignSummary {
    pub total: Decimal,
    pub count: i64,
    pub by_usage_type: Vec<(LedgerKind, i64, Decimal)>,
}
