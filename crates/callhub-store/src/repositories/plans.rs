use sqlx::PgPool;

use callhub_core::error::AppError;
use callhub_core::ids::PlanId;

use crate::model::Plan;
use crate::schema::{qualify, validate_schema_identifier};

pub struct PlansRepo;

impl PlansRepo {
    pub async fn find(pool: &PgPool, schema: &str, id: PlanId) -> Result<Option<Plan>, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "SELECT id, name, billing_cycle, price FROM {} WHERE id = $1",
            qualify(schema, "plans")
        );
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::internal)
    }
}
