//! User domain entity and related types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{ROLE_BIOLOGIST, ROLE_CITIZEN};

/// User roles enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Citizen,
    Biologist,
}

impl From<&str> for UserRole {
    fn from(s: &str) -> Self {
        match s {
            ROLE_BIOLOGIST => UserRole::Biologist,
            _ => UserRole::Citizen,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Biologist => write!(f, "{}", ROLE_BIOLOGIST),
            UserRole::Citizen => write!(f, "{}", ROLE_CITIZEN),
        }
    }
}

/// User domain entity.
///
/// Accounts are owned by the authentication subsystem; the notification
/// job only reads the email address and the home location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    /// Home location used to target notifications
    pub location_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_storage_string() {
        assert_eq!(UserRole::from("BIOLOGIST"), UserRole::Biologist);
        assert_eq!(UserRole::from("CITIZEN"), UserRole::Citizen);
        assert_eq!(UserRole::Biologist.to_string(), "BIOLOGIST");
    }

    #[test]
    fn unknown_role_falls_back_to_citizen() {
        assert_eq!(UserRole::from("ADMIN"), UserRole::Citizen);
    }
}
