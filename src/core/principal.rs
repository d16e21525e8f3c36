use super::UserId;
use crate::error::HelpdeskError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of an authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    /// The role whose replies this role has not yet seen
    ///
    /// Customers wait on admins and admins wait on customers.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Admin => Self::Customer,
            Self::Customer => Self::Admin,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Customer => "customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "customer" => Ok(Self::Customer),
            other => Err(HelpdeskError::InvalidRole(other.to_string())),
        }
    }
}

/// Authenticated caller as supplied by the identity provider
///
/// The role is trusted as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
}

impl Principal {
    #[must_use]
    pub const fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    #[must_use]
    pub fn admin() -> Self {
        Self::new(UserId::new(), Role::Admin)
    }

    #[must_use]
    pub fn customer() -> Self {
        Self::new(UserId::new(), Role::Customer)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
