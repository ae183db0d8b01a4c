use sqlx::PgPool;

use callhub_core::error::AppError;
use callhub_core::ids::TenantId;

use crate::model::Tenant;
use crate::schema::{qualify, validate_schema_identifier};

pub struct TenantsRepo;

impl TenantsRepo {
    pub async fn find(
        pool: &PgPool,
        schema: &str,
        tenant_id: TenantId,
    ) -> Result<Option<Tenant>, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "SELECT id, display_name, plan_id, status, metadata, created_at, deleted_at FROM {} \
             WHERE id = $1 AND deleted_at IS NULL",
            qualify(schema, "tenants")
        );
        sqlx::query_as(&sql)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::internal)
    }
}
