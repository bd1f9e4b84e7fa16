//! Resolved caller identity
//!
//! The scoring core only ever sees an [`Identity`]; how it was obtained (bearer token,
//! test fixture) is the HTTP layer's concern.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Closed set of user roles. Persisted as `"admin"` / `"jury"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[serde(rename = "jury")]
    #[sqlx(rename = "jury")]
    Juror,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Juror => "jury",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "jury" => Ok(Role::Juror),
            other => Err(Error::InvalidInput(format!(
                "Unknown role '{}' (expected 'admin' or 'jury')",
                other
            ))),
        }
    }
}

/// Authenticated caller: `current_juror_id()` / `current_role()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn current_juror_id(&self) -> i64 {
        self.user_id
    }

    pub fn current_role(&self) -> Role {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("jury".parse::<Role>().unwrap(), Role::Juror);
        assert_eq!(Role::Juror.to_string(), "jury");
    }

    #[test]
    fn test_unknown_role_rejected() {
        let err = "superuser".parse::<Role>().unwrap_err();
        assert_eq!(err.kind(), "INVALID_INPUT");
    }

    #[test]
    fn test_role_serde_uses_persisted_names() {
        assert_eq!(serde_json::to_string(&Role::Juror).unwrap(), "\"jury\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }
}
