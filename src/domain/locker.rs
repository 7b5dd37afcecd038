use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BranchId, Cents, UserId};

pub type LockerId = Uuid;
pub type AssignmentId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockerStatus {
    Available,
    Freezed,
}

impl LockerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockerStatus::Available => "available",
            LockerStatus::Freezed => "freezed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "available" => Some(LockerStatus::Available),
            "freezed" => Some(LockerStatus::Freezed),
            _ => None,
        }
    }
}

impl std::fmt::Display for LockerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A physical locker in a branch. `serial_no` is unique within the branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Locker {
    pub id: LockerId,
    pub branch_id: BranchId,
    pub serial_no: i64,
    pub monthly_charge_cents: Cents,
    pub status: LockerStatus,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Locker {
    pub fn new(branch_id: BranchId, serial_no: i64, monthly_charge_cents: Cents) -> Self {
        Self {
            id: Uuid::new_v4(),
            branch_id,
            serial_no,
            monthly_charge_cents,
            status: LockerStatus::Available,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Active,
    Inactive,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Active => "active",
            AssignmentStatus::Inactive => "inactive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(AssignmentStatus::Active),
            "inactive" => Some(AssignmentStatus::Inactive),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Links one user to one locker. At most one active assignment may exist
/// per user at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockerAssignment {
    pub id: AssignmentId,
    pub locker_id: LockerId,
    pub user_id: UserId,
    pub status: AssignmentStatus,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl LockerAssignment {
    pub fn new(locker_id: LockerId, user_id: UserId) -> Self {
        Self {
            id: Uuid::new_v4(),
            locker_id,
            user_id,
            status: AssignmentStatus::Active,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }
}
