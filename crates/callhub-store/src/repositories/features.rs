use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use sqlx::PgPool;

use callhub_core::error::AppError;
use callhub_core::ids::{PlanId, SubjectId, TenantId};

use crate::model::{Feature, SubjectOverride, TenantOverride};
use crate::schema::{qualify, validate_schema_identifier};

pub struct FeaturesRepo;

impl FeaturesRepo {
    pub async fn find_by_key(
        pool: &PgPool,
        schema: &str,
        key: &str,
    ) -> Result<Option<Feature>, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "SELECT id, key, kind, default_config FROM {} WHERE key = $1",
            qualify(schema, "features")
        );
        sqlx::query_as(&sql)
            .bind(key)
            .fetch_optional(pool)
            .await
            .map_err(AppError::internal)
    }

    pub async fn list_all(pool: &PgPool, schema: &str) -> Result<Vec<Feature>, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "SELECT id, key, kind, default_config FROM {}",
            qualify(schema, "features")
        );
        sqlx::query_as(&sql).fetch_all(pool).await.map_err(AppError::internal)
    }

    pub async fn plan_feature_config(
        pool: &PgPool,
        schema: &str,
        plan_id: PlanId,
        feature_key: &str,
    ) -> Result<Option<Json>, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "SELECT config FROM {} WHERE plan_id = $1 AND feature_key = $2",
            qualify(schema, "plan_features")
        );
        let row: Option<(Json,)> = sqlx::query_as(&sql)
            .bind(plan_id)
            .bind(feature_key)
            .fetch_optional(pool)
            .await
            .map_err(AppError::internal)?;
        Ok(row.map(|(c,)| c))
    }

    pub async fn list_plan_features(
        pool: &PgPool,
        schema: &str,
        plan_id: PlanId,
    ) -> Result<Vec<(String, Json)>, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "SELECT feature_key, config FROM {} WHERE plan_id = $1",
            qualify(schema, "plan_features")
        );
        sqlx::query_as(&sql)
            .bind(plan_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::internal)
    }

    pub async fn tenant_override(
        pool: &PgPool,
        schema: &str,
        tenant_id: TenantId,
        feature_key: &str,
    ) -> Result<Option<TenantOverride>, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "SELECT tenant_id, feature_key, config, enabled_at, expires_at FROM {} \
             WHERE tenant_id = $1 AND feature_key = $2",
            qualify(schema, "tenant_overrides")
        );
        sqlx::query_as(&sql)
            .bind(tenant_id)
            .bind(feature_key)
            .fetch_optional(pool)
            .await
            .map_err(AppError::internal)
    }

    pub async fn list_tenant_overrides(
        pool: &PgPool,
        schema: &str,
        tenant_id: TenantId,
    ) -> Result<Vec<TenantOverride>, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "SELECT tenant_id, feature_key, config, enabled_at, expires_at FROM {} \
             WHERE tenant_id = $1",
            qualify(schema, "tenant_overrides")
        );
        sqlx::query_as(&sql)
            .bind(tenant_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::internal)
    }

    pub async fn set_tenant_override(
        pool: &PgPool,
        schema: &str,
        tenant_id: TenantId,
        feature_key: &str,
        config: Json,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "INSERT INTO {} (tenant_id, feature_key, config, enabled_at, expires_at) \
             VALUES ($1, $2, $3, now(), $4) \
             ON CONFLICT (tenant_id, feature_key) \
             DO UPDATE SET config = EXCLUDED.config, enabled_at = now(), expires_at = EXCLUDED.expires_at",
            qualify(schema, "tenant_overrides")
        );
        sqlx::query(&sql)
            .bind(tenant_id)
            .bind(feature_key)
            .bind(config)
            .bind(expires_at)
            .execute(pool)
            .await
            .map_err(AppError::internal)?;
        Ok(())
    }

    pub async fn clear_tenant_override(
        pool: &PgPool,
        schema: &str,
        tenant_id: TenantId,
        feature_key: &str,
    ) -> Result<(), AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "DELETE FROM {} WHERE tenant_id = $1 AND feature_key = $2",
            qualify(schema, "tenant_overrides")
        );
        sqlx::query(&sql)
            .bind(tenant_id)
            .bind(feature_key)
            .execute(pool)
            .await
            .map_err(AppError::internal)?;
        Ok(())
    }

    pub async fn subject_override(
        pool: &PgPool,
        schema: &str,
        subject_id: SubjectId,
        feature_key: &str,
    ) -> Result<Option<SubjectOverride>, AppError> {
        validate_schema_identifier(schema)?;
        let sql = format!(
            "SELECT subject_id, feature_key, config FROM {} WHERE subject_id = $1 AND feature_key = $2",
            qualify(schema, "subject_overrides")
        );
        sqlx::query_as(&sql)
            .bind(subject_id)
            .bind(feature_key)
            .fetch_optional(pool)
            .await
            .map_err(AppError::internal)
    }
}
