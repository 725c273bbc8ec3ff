use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::present;

pub const TABLE: &str = "Users";

pub const USER_ID: &str = "UserID";
pub const EMAIL: &str = "Email";
pub const EXTERNAL_ID: &str = "ExternalID";
pub const DISPLAY_NAME: &str = "DisplayName";
pub const ROLE: &str = "Role";
pub const IS_ACTIVE: &str = "IsActive";

pub const MEMBERSHIP_TABLE: &str = "AssignmentGroupMembers";

/// Stored user role. Parsed case-insensitively at the data boundary; the rest
/// of the crate only compares enum values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Agent, Role::Admin];

    /// Normalize a role string read from the store or a request.
    pub fn from_stored(value: &str) -> Option<Role> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Role::User),
            "agent" => Some(Role::Agent),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
            Role::Admin => "admin",
        }
    }

    /// Agent capability: agents and admins.
    pub fn is_agent(self) -> bool {
        matches!(self, Role::Agent | Role::Admin)
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::from_stored(s).ok_or_else(|| s.to_string())
    }
}

/// Request body for POST /api/user-roles.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub department: Option<String>,
    pub job_title: Option<String>,
    #[serde(rename = "externalID", alias = "externalId")]
    pub external_id: Option<String>,
    pub role: Option<String>,
    #[serde(default)]
    pub assignment_group_ids: Vec<i64>,
}

/// Request body for PUT /api/user-roles. Only keys present in the body are
/// written; an explicit `null` clears an optional column.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub display_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub last_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub department: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub job_title: Option<Option<String>>,
    #[serde(default)]
    pub new_role: Option<String>,
    /// Older clients send `role` instead of `newRole`
    #[serde(default)]
    pub role: Option<String>,
}

/// Validated user insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub department: Option<String>,
    pub job_title: Option<String>,
    pub external_id: Option<String>,
    pub role: Role,
    pub assignment_group_ids: Vec<i64>,
}

/// Validated partial update: each `Some` is a column to write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub email: String,
    pub display_name: Option<String>,
    pub first_name: Option<Option<String>>,
    pub last_name: Option<Option<String>>,
    pub department: Option<Option<String>>,
    pub job_title: Option<Option<String>>,
    pub role: Option<Role>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.department.is_none()
            && self.job_title.is_none()
            && self.role.is_none()
    }
}
