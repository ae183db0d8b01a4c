//! Opaque 128-bit identifiers for tenant-owned aggregates.
//!
//! One newtype per entity keeps repository signatures from accepting a bare
//! `Uuid` meant for a different table; `sqlx::Type` is derived via the
//! `#[sqlx(transparent)]` wrapper so each type binds/reads as its inner uuid.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[derive(sqlx::Type)]
        #[sqlx(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn inner(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(u: Uuid) -> Self {
                Self(u)
            }
        }
    };
}

opaque_id!(TenantId);
opaque_id!(SubjectId);
opaque_id!(PlanId);
opaque_id!(WalletId);
opaque_id!(LedgerEntryId);
opaque_id!(VoiceId);
opaque_id!(PhoneNumberId);
opaque_id!(CallLogId);
opaque_id!(BatchId);
opaque_id!(BatchEntryId);

/// `VoiceAgent.id` is historically an integer, including the reserved
/// literals `"24"` and `"VAPI"` that `ProviderRouter` special-cases (the
/// latter is carried as text since it never round-trips through an int).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentRef {
    Numeric(i64),
    Named(String),
}

impl fmt::Display for AgentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentRef::Numeric(n) => write!(f, "{n}"),
            AgentRef::Named(s) => write!(f, "{s}"),
        }
    }
}

/// The platform's reserved "system" tenant id, owner of shared catalog rows
/// (system voices, system numbers) per §3 invariant 1.
pub fn system_tenant_id() -> TenantId {
    TenantId(Uuid::nil())
}
