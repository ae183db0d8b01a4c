//! Entity types for the data model in spec §3. Column types, not wire types;
//! the HTTP DTOs in `callhub`'s `http` module convert to/from these.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use callhub_core::ids::{
    BatchEntryId, BatchId, CallLogId, LedgerEntryId, PhoneNumberId, PlanId, SubjectId, TenantId,
    VoiceId, WalletId,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum TenantStatus {
    Trial,
    Active,
    Suspended,
    Deleted,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: TenantId,
    pub display_name: String,
    pub plan_id: PlanId,
    pub status: TenantStatus,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    pub billing_cycle: String,
    pub price: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum FeatureKind {
    Boolean,
    Limit,
    Addon,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Feature {
    pub id: uuid::Uuid,
    pub key: String,
    pub kind: FeatureKind,
    pub default_config: Json,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlanFeature {
    pub plan_id: PlanId,
    pub feature_key: String,
    pub config: Json,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct TenantOverride {
    pub tenant_id: TenantId,
    pub feature_key: String,
    pub config: Json,
    pub enabled_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TenantOverride {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(exp) => exp > now,
            None => true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubjectOverride {
    pub subject_id: SubjectId,
    pub feature_key: String,
    pub config: Json,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Wallet {
    pub id: WalletId,
    pub tenant_id: TenantId,
    pub current_balance: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum LedgerKind {
    Debit,
    Credit,
    Refund,
    Adjustment,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
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
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct VoiceAgent {
    pub id: i64,
    pub tenant_id: TenantId,
    pub name: String,
    pub language: String,
    pub voice_id: Option<VoiceId>,
    pub instructions: Option<String>,
    pub starter_prompts: Json,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Voice {
    pub id: VoiceId,
    pub tenant_id: TenantId,
    pub provider: String,
    pub sample_url: Option<String>,
    pub gender: Option<String>,
    pub accent: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct PhoneNumber {
    pub id: PhoneNumberId,
    pub tenant_id: TenantId,
    pub country_code: String,
    pub base_number: String,
    pub provider: String,
    pub status: String,
    pub rules: Json,
    pub default_agent_id: Option<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "kebab-case")]
pub enum CallDirection {
    Outbound,
    Inbound,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "kebab-case")]
pub enum CallStatus {
    Queued,
    Ringing,
    InProgress,
    Completed,
    Failed,
    Busy,
    NoAnswer,
    Canceled,
}

impl CallStatus {
    /// State machine from §4.6: terminal states never transition again (P5).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CallStatus::Completed
                | CallStatus::Failed
                | CallStatus::Busy
                | CallStatus::NoAnswer
                | CallStatus::Canceled
        )
    }

    pub fn can_transition_to(self, next: CallStatus) -> bool {
        use CallStatus::*;
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (Queued, Ringing) | (Queued, InProgress) => true,
            (Ringing, InProgress) => true,
            (_, Completed) | (_, Failed) | (_, Busy) | (_, NoAnswer) | (_, Canceled) => true,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct CallLog {
    pub id: CallLogId,
    pub tenant_id: TenantId,
    pub initiated_by_subject: SubjectId,
    pub lead_ref: Option<String>,
    pub agent_id: i64,
    pub voice_id: Option<VoiceId>,
    pub from_number: Option<String>,
    pub to_country_code: String,
    pub to_base_number: String,
    pub direction: CallDirection,
    pub status: CallStatus,
    pub provider_call_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i32>,
    pub recording_url: Option<String>,
    pub cost: Option<Decimal>,
    pub currency: String,
    pub metadata: Json,
    pub batch_entry_id: Option<BatchEntryId>,
    pub error_detail: Option<Json>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Running,
    Finished,
    Canceled,
    Canceling,
    Failed,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchStatus::Finished | BatchStatus::Canceled | BatchStatus::Failed
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Batch {
    pub id: BatchId,
    pub tenant_id: TenantId,
    pub status: BatchStatus,
    pub total_calls: i32,
    pub completed_calls: i32,
    pub failed_calls: i32,
    pub initiated_by: SubjectId,
    pub agent_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub metadata: Json,
    pub cancel_requested: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum BatchEntryStatus {
    Pending,
    Dispatching,
    Succeeded,
    Failed,
    Canceling,
    Canceled,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct BatchEntry {
    pub id: BatchEntryId,
    pub batch_id: BatchId,
    pub tenant_id: TenantId,
    pub to_country_code: String,
    pub to_base_number: String,
    pub lead_ref: Option<String>,
    pub status: BatchEntryStatus,
    pub call_log_id: Option<CallLogId>,
    pub last_error: Option<String>,
    pub retry_count: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_call_statuses_reject_every_transition() {
        for terminal in [
            CallStatus::Completed,
            CallStatus::Failed,
            CallStatus::Busy,
            CallStatus::NoAnswer,
            CallStatus::Canceled,
        ] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(CallStatus::InProgress));
        }
    }

    #[test]
    fn queued_can_reach_in_progress_directly_or_via_ringing() {
        assert!(CallStatus::Queued.can_transition_to(CallStatus::Ringing));
        assert!(CallStatus::Queued.can_transition_to(CallStatus::InProgress));
        assert!(CallStatus::Ringing.can_transition_to(CallStatus::InProgress));
    }

    #[test]
    fn ringing_cannot_go_back_to_queued() {
        assert!(!CallStatus::Ringing.can_transition_to(CallStatus::Queued));
    }

    #[test]
    fn batch_status_terminal_set() {
        assert!(BatchStatus::Finished.is_terminal());
        assert!(BatchStatus::Canceled.is_terminal());
        assert!(BatchStatus::Failed.is_terminal());
        assert!(!BatchStatus::Running.is_terminal());
        assert!(!BatchStatus::Pending.is_terminal());
    }

    #[test]
    fn tenant_override_expiry() {
        let active = TenantOverride {
            tenant_id: TenantId::new(),
            feature_key: "x".to_string(),
            config: Json::Null,
            enabled_at: Utc::now(),
            expires_at: None,
        };
        assert!(active.is_active(Utc::now()));

        let expired = TenantOverride { expires_at: Some(Utc::now() - chrono::Duration::seconds(1)), ..active };
        assert!(!expired.is_active(Utc::now()));
    }
}
