use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};

use callhub_core::error::AppError;
use callhub_core::ids::{TenantId, WalletId};

use crate::model::Wallet;
use crate::schema::{qualify, validate_schema_identifier};

pub struct WalletsRepo;

impl WalletsRepo {
    pub async fn find_by_tenant(
        tx: &mut Transaction<'_, Postgres>,
        schema: &str,
        tenant_id: TenantId,
    ) -> Result<Option<Wallet>, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "SELECT id, tenant_id, current_balance, updated_at FROM {} \
             WHERE tenant_id = $1",
            qualify(schema, "wallets")
        );
        sqlx::query_as::<_, Wallet>(&sql)
            .bind(tenant_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(AppError::internal)
    }

    /// Atomically debits `amount`, failing the row match (zero rows) when
    /// the balance would go negative. Returns `(wallet_id, balance_before,
    /// balance_after)` on success; `None` means insufficient funds.
    pub async fn try_debit(
        tx: &mut Transaction<'_, Postgres>,
        schema: &str,
        tenant_id: TenantId,
        amount: Decimal,
    ) -> Result<Option<(WalletId, Decimal, Decimal)>, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "UPDATE {} SET current_balance = current_balance - $2, updated_at = now() \
             WHERE tenant_id = $1 AND current_balance >= $2 \
             RETURNING id, current_balance + $2 AS balance_before, current_balance AS balance_after",
            qualify(schema, "wallets")
        );
        let row: Option<(WalletId, Decimal, Decimal)> = sqlx::query_as(&sql)
            .bind(tenant_id)
            .bind(amount)
            .fetch_optional(&mut **tx)
            .await
            .map_err(AppError::internal)?;
        Ok(row)
    }

    /// Atomically credits `amount` (used by `refund`/`adjust`). Returns
    /// `None` if no wallet row exists for the tenant.
    pub async fn try_credit(
        tx: &mut Transaction<'_, Postgres>,
        schema: &str,
        tenant_id: TenantId,
        amount: Decimal,
    ) -> Result<Option<(WalletId, Decimal, Decimal)>, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "UPDATE {} SET current_balance = current_balance + $2, updated_at = now() \
             WHERE tenant_id = $1 \
             RETURNING id, current_balance - $2 AS balance_before, current_balance AS balance_after",
            qualify(schema, "wallets")
        );
        let row: Option<(WalletId, Decimal, Decimal)> = sqlx::query_as(&sql)
            .bind(tenant_id)
            .bind(amount)
            .fetch_optional(&mut **tx)
            .await
            .map_err(AppError::internal)?;
        Ok(row)
    }
}
