use serde::{Deserialize, Serialize};

use crate::model::ids::UserId;

/// Privilege level carried by an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Student,
    Admin,
}

/// Caller identity supplied by the identity provider. Trusted as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
}

impl Identity {
    #[must_use]
    pub fn student(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Student,
        }
    }

    #[must_use]
    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owners and admins may act on a user's sessions and results.
    #[must_use]
    pub fn can_access(&self, owner: UserId) -> bool {
        self.user_id == owner || self.is_admin()
    }
}
