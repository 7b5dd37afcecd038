use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;

/// Closed set of role codes. Ordering matters: when a user holds several
/// roles, the highest one wins for authorization (Admin > BranchManager >
/// Customer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    BranchManager,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::BranchManager => "branch_manager",
            Role::Customer => "customer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "branch_manager" | "manager" => Some(Role::BranchManager),
            "customer" => Some(Role::Customer),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String, roles: Vec<Role>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            roles,
            created_at: Utc::now(),
        }
    }

    /// The role used for authorization precedence.
    pub fn highest_role(&self) -> Option<Role> {
        self.roles.iter().copied().max()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// The identity attached to every inbound request: a user id plus the
/// role already resolved by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for role in [Role::Admin, Role::BranchManager, Role::Customer] {
            let s = role.as_str();
            assert_eq!(Role::from_str(s), Some(role));
        }
    }

    #[test]
    fn test_role_precedence() {
        assert!(Role::Admin > Role::BranchManager);
        assert!(Role::BranchManager > Role::Customer);
    }

    #[test]
    fn test_highest_role() {
        let user = User::new(
            "Asha".into(),
            "asha@example.com".into(),
            vec![Role::Customer, Role::BranchManager],
        );
        assert_eq!(user.highest_role(), Some(Role::BranchManager));
    }

    #[test]
    fn test_highest_role_empty() {
        let user = User::new("Nobody".into(), "nobody@example.com".into(), vec![]);
        assert_eq!(user.highest_role(), None);
    }
}
