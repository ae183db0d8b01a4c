//! FeatureResolver (§4.2): `(tenant, feature, subject?) -> (enabled, config)`
//! over the hierarchy subject-override → tenant-override → plan-feature →
//! feature-default, fail-closed on any error (P4), with a best-effort TTL
//! cache keyed the way the teacher's config layer keys its resolved values.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::{json, Value as Json};

use callhub_core::ids::{SubjectId, TenantId};
use callhub_store::repositories::{features::FeaturesRepo, tenants::TenantsRepo};
use callhub_store::PgPool;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    tenant: TenantId,
    feature_key: String,
    subject: Option<SubjectId>,
}

#[derive(Clone, Debug)]
struct CacheEntry {
    enabled: bool,
    config: Json,
    expires_at: Instant,
}

pub struct FeatureResolver {
    pool: PgPool,
    cache: DashMap<CacheKey, CacheEntry>,
    ttl: Duration,
}

impl FeatureResolver {
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        FeatureResolver { pool, cache: DashMap::new(), ttl }
    }

    /// Resolves `(enabled, config)`. Never returns an error: any failure in
    /// the resolution path (unreachable database, unknown feature key)
    /// degrades to `(false, {})` per P4, and is logged at `warn`.
    pub async fn is_enabled(
        &self,
        schema: &str,
        tenant: TenantId,
        feature_key: &str,
        subject: Option<SubjectId>,
    ) -> (bool, Json) {
        let key = CacheKey { tenant, feature_key: feature_key.to_string(), subject };
        if let Some(entry) = self.cache.get(&key) {
            if entry.expires_at > Instant::now() {
                return (entry.enabled, entry.config.clone());
            }
        }

        match self.resolve(schema, tenant, feature_key, subject).await {
            Ok((enabled, config)) => {
                self.cache.insert(
                    key,
                    CacheEntry { enabled, config: config.clone(), expires_at: Instant::now() + self.ttl },
                );
                (enabled, config)
            }
            Err(err) => {
                tracing::warn!(%tenant, feature_key, error = %err, "feature resolution failed, failing closed");
                (false, json!({}))
            }
        }
    }

    async fn resolve(
        &self,
        schema: &str,
        tenant: TenantId,
        feature_key: &str,
        subject: Option<SubjectId>,
    ) -> Result<(bool, Json), callhub_core::AppError> {
        if let Some(subject) = subject {
            if let Some(row) = FeaturesRepo::subject_override(&self.pool, schema, subject, feature_key).await? {
                return Ok((true, row.config));
            }
        }

        if let Some(row) = FeaturesRepo::tenant_override(&self.pool, schema, tenant, feature_key).await? {
            if row.is_active(chrono::Utc::now()) {
                return Ok((true, row.config));
            }
        }

        let tenant_row = TenantsRepo::find(&self.pool, schema, tenant)
            .await?
            .ok_or_else(|| callhub_core::AppError::not_found("tenant"))?;
        if let Some(config) =
            FeaturesRepo::plan_feature_config(&self.pool, schema, tenant_row.plan_id, feature_key).await?
        {
            return Ok((true, config));
        }

        match FeaturesRepo::find_by_key(&self.pool, schema, feature_key).await? {
            Some(feature) => Ok((false, feature.default_config)),
            None => Ok((false, json!({}))),
        }
    }

    pub async fn list_enabled(
        &self,
        schema: &str,
        tenant: TenantId,
        subject: Option<SubjectId>,
    ) -> Result<Vec<(String, Json)>, callhub_core::AppError> {
        let mut enabled = Vec::new();
        for feature in FeaturesRepo::list_all(&self.pool, schema).await? {
            let (is_enabled, config) = self.is_enabled(schema, tenant, &feature.key, subject).await;
            if is_enabled {
                enabled.push((feature.key, config));
            }
        }
        Ok(enabled)
    }

    pub async fn set_tenant_override(
        &self,
        schema: &str,
        tenant: TenantId,
        feature_key: &str,
        config: Json,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<(), callhub_core::AppError> {
        FeaturesRepo::set_tenant_override(&self.pool, schema, tenant, feature_key, config, expires_at)
            .await?;
        self.invalidate(tenant);
        Ok(())
    }

    pub async fn clear_tenant_override(
        &self,
        schema: &str,
        tenant: TenantId,
        feature_key: &str,
    ) -> Result<(), callhub_core::AppError> {
        FeaturesRepo::clear_tenant_override(&self.pool, schema, tenant, feature_key).await?;
        self.invalidate(tenant);
        Ok(())
    }

    /// Removes every cache entry whose key belongs to `tenant`.
    pub fn invalidate(&self, tenant: TenantId) {
        self.cache.retain(|key, _| key.tenant != tenant);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_distinguishes_subject() {
        let tenant = TenantId::new();
        let a = CacheKey { tenant, feature_key: "voice-agent".into(), subject: None };
        let b = CacheKey { tenant, feature_key: "voice-agent".into(), subject: Some(SubjectId::new()) };
        assert_ne!(a, b);
    }
}
