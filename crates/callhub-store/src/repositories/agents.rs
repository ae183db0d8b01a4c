use sqlx::PgPool;

use callhub_core::error::AppError;
use callhub_core::ids::TenantId;

use crate::model::VoiceAgent;
use crate::schema::{qualify, validate_schema_identifier};

pub struct AgentsRepo;

impl AgentsRepo {
    pub async fn find(
        pool: &PgPool,
        schema: &str,
        tenant_id: TenantId,
        agent_id: i64,
    ) -> Result<Option<VoiceAgent>, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "SELECT id, tenant_id, name, language, voice_id, instructions, starter_prompts, \
                    deleted_at \
             FROM {} WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL",
            qualify(schema, "voice_agents")
        );
        sqlx::query_as(&sql)
            .bind(tenant_id)
            .bind(agent_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::internal)
    }
}
