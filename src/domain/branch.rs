use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;

pub type BranchId = Uuid;

/// A bank branch, managed by exactly one BranchManager. `total_lockers`
/// is a fixed provisioning capacity, not a live count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub bank_name: String,
    pub name: String,
    pub ifsc_code: String,
    pub manager_user_id: UserId,
    pub total_lockers: i64,
    pub created_at: DateTime<Utc>,
}

impl Branch {
    pub fn new(
        bank_name: String,
        name: String,
        ifsc_code: String,
        manager_user_id: UserId,
        total_lockers: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            bank_name,
            name,
            ifsc_code,
            manager_user_id,
            total_lockers,
            created_at: Utc::now(),
        }
    }
}
