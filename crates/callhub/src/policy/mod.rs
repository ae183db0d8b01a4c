//! PolicyGate (§4.4): a short-circuiting pipeline of independent checks run
//! before any call is dispatched. Each check either passes silently or
//! returns the `AppError` variant that names the rejection reason; the first
//! rejection wins and no later check runs (mirrors the teacher's
//! `Interceptor` chain, which stops at the first non-`Continue` verdict).

use chrono::{Datelike, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde_json::{json, Value as Json};

use callhub_core::config::BusinessHours;
use callhub_core::ids::{SubjectId, TenantId};
use callhub_core::AppError;
use callhub_store::model::TenantOverride;
use callhub_store::PgPool;

use crate::credit::CreditLedger;
use crate::features::FeatureResolver;

/// Timezone candidates in the precedence order the HTTP layer resolves them:
/// request body field, `x-timezone` header, subject profile default, cookie.
/// The first `Some` wins; `Utc` is the final fallback.
#[derive(Clone, Debug, Default)]
pub struct TimezoneHint<'a> {
    pub body: Option<&'a str>,
    pub header: Option<&'a str>,
    pub subject_profile: Option<&'a str>,
    pub cookie: Option<&'a str>,
}

impl<'a> TimezoneHint<'a> {
    fn resolve(&self) -> Tz {
        self.body
            .or(self.header)
            .or(self.subject_profile)
            .or(self.cookie)
            .and_then(|s| s.parse::<Tz>().ok())
            .unwrap_or(chrono_tz::UTC)
    }
}

pub struct PolicyRequest<'a> {
    pub schema: &'a str,
    pub tenant: TenantId,
    pub subject: Option<SubjectId>,
    pub feature_key: &'a str,
    pub required_credits: Decimal,
    pub timezone_hint: TimezoneHint<'a>,
}

#[derive(Clone, Debug)]
pub struct ValidationContext {
    pub feature_config: Json,
    pub available_credits: Decimal,
}

pub struct PolicyGate {
    pool: PgPool,
    features: std::sync::Arc<FeatureResolver>,
    credit: std::sync::Arc<CreditLedger>,
    business_hours: BusinessHours,
    business_hours_kill_switch: bool,
}

impl PolicyGate {
    pub fn new(
        pool: PgPool,
        features: std::sync::Arc<FeatureResolver>,
        credit: std::sync::Arc<CreditLedger>,
        business_hours: BusinessHours,
        business_hours_kill_switch: bool,
    ) -> Self {
        PolicyGate { pool, features, credit, business_hours, business_hours_kill_switch }
    }

    pub async fn check(&self, req: PolicyRequest<'_>) -> Result<ValidationContext, AppError> {
        let (enabled, feature_config) = self
            .features
            .is_enabled(req.schema, req.tenant, req.feature_key, req.subject)
            .await;
        if !enabled {
            return Err(AppError::FeatureDisabled { feature: req.feature_key.to_string() });
        }

        self.check_business_hours(req.schema, req.tenant, &req.timezone_hint).await?;

        let available_credits = self.credit.balance(req.schema, req.tenant).await?;
        if available_credits < req.required_credits {
            return Err(AppError::InsufficientCredits {
                required: req.required_credits,
                available: available_credits,
                needed: req.required_credits - available_credits,
            });
        }

        self.check_rate_limit();

        Ok(ValidationContext { feature_config, available_credits })
    }

    async fn check_business_hours(
        &self,
        schema: &str,
        tenant: TenantId,
        hint: &TimezoneHint<'_>,
    ) -> Result<(), AppError> {
        if self.business_hours_kill_switch {
            return Ok(());
        }

        let override_row: Option<TenantOverride> =
            callhub_store::repositories::features::FeaturesRepo::tenant_override(
                &self.pool,
                schema,
                tenant,
                "business-hours-bypass",
            )
            .await?;
        if let Some(row) = override_row {
            if row.is_active(Utc::now()) {
                return Ok(());
            }
        }

        let tenant_tz: Tz = self
            .business_hours
            .timezone
            .parse()
            .map_err(|_| AppError::internal(anyhow::anyhow!("invalid configured business-hours timezone")))?;
        let requested_tz = hint.resolve();

        let now_tenant = Utc::now().with_timezone(&tenant_tz);
        let weekday = now_tenant.weekday().num_days_from_sunday() as u8;
        if !self.business_hours.allowed_days.contains(&weekday) {
            return Err(self.outside_hours_error(&tenant_tz, &requested_tz));
        }

        let start = NaiveTime::from_hms_opt(
            self.business_hours.start.0 as u32,
            self.business_hours.start.1 as u32,
            0,
        )
        .expect("validated at config load");
        let end = NaiveTime::from_hms_opt(
            self.business_hours.end.0 as u32,
            self.business_hours.end.1 as u32,
            0,
        )
        .expect("validated at config load");
        let now_time = now_tenant.time();

        let within = if self.business_hours.wrap_around {
            now_time >= start || now_time < end
        } else {
            now_time >= start && now_time < end
        };

        if within {
            Ok(())
        } else {
            Err(self.outside_hours_error(&tenant_tz, &requested_tz))
        }
    }

    fn outside_hours_error(&self, tenant_tz: &Tz, requested_tz: &Tz) -> AppError {
        AppError::OutsideBusinessHours {
            window_start: format!("{:02}:{:02}", self.business_hours.start.0, self.business_hours.start.1),
            window_end: format!("{:02}:{:02}", self.business_hours.end.0, self.business_hours.end.1),
            tenant_timezone: tenant_tz.to_string(),
            requested_timezone: requested_tz.to_string(),
            requested_at: Utc::now(),
        }
    }

    /// No-op placeholder occupying the rate-limit slot in the pipeline (§9
    /// resolution 4): no rate limiter is wired up, so every request passes.
    fn check_rate_limit(&self) {}
}

impl ValidationContext {
    pub fn as_json(&self) -> Json {
        json!({
            "feature_config": self.feature_config,
            "available_credits": self.available_credits,
        })
    }
}
