use sqlx::PgPool;

use callhub_core::error::AppError;
use callhub_core::ids::TenantId;

use crate::model::PhoneNumber;
use crate::schema::{qualify, validate_schema_identifier};

pub struct NumbersRepo;

impl NumbersRepo {
    pub async fn find_by_e164(
        pool: &PgPool,
        schema: &str,
        tenant_id: TenantId,
        country_code: &str,
        base_number: &str,
    ) -> Result<Option<PhoneNumber>, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "SELECT id, tenant_id, country_code, base_number, provider, status, rules, \
                    default_agent_id \
             FROM {} WHERE tenant_id = $1 AND country_code = $2 AND base_number = $3",
            qualify(schema, "phone_numbers")
        );
        sqlx::query_as(&sql)
            .bind(tenant_id)
            .bind(country_code)
            .bind(base_number)
            .fetch_optional(pool)
            .await
            .map_err(AppError::internal)
    }
}
