use sqlx::PgPool;

use callhub_core::error::AppError;
use callhub_core::ids::{TenantId, VoiceId};

use crate::model::Voice;
use crate::schema::{qualify, validate_schema_identifier};

pub struct VoicesRepo;

impl VoicesRepo {
    /// Looks under the tenant first, then the reserved system tenant, so
    /// shared catalog voices are visible to every tenant (§3 invariant 1).
    pub async fn find(
        pool: &PgPool,
        schema: &str,
        tenant_id: TenantId,
        voice_id: VoiceId,
    ) -> Result<Option<Voice>, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "SELECT id, tenant_id, provider, sample_url, gender, accent FROM {} \
             WHERE id = $1 AND (tenant_id = $2 OR tenant_id = $3)",
            qualify(schema, "voices")
        );
        sqlx::query_as(&sql)
            .bind(voice_id)
            .bind(tenant_id)
            .bind(callhub_core::ids::system_tenant_id())
            .fetch_optional(pool)
            .await
            .map_err(AppError::internal)
    }
}
