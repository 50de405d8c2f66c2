// src/models/user.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;

/// Account role as carried in the users table and in JWT claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Creator,
    Parent,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Creator => "creator",
            Role::Parent => "parent",
            Role::Student => "student",
        }
    }

    /// Roles allowed to author exams and questions.
    pub fn can_author(&self) -> bool {
        matches!(self, Role::Admin | Role::Creator | Role::Parent)
    }

    /// Questions written by these roles are visible to everyone.
    pub fn publishes_questions(&self) -> bool {
        matches!(self, Role::Admin | Role::Creator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "creator" => Ok(Role::Creator),
            "parent" => Ok(Role::Parent),
            "student" => Ok(Role::Student),
            other => Err(AppError::Validation(format!("Unknown role '{}'", other))),
        }
    }
}

/// Directory entry for a user, as returned by `UserDirectory::lookup_user`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Creator identity shown to students (name and email only).
#[derive(Debug, Clone, Serialize)]
pub struct CreatorProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<UserSummary> for CreatorProfile {
    fn from(user: UserSummary) -> Self {
        Self {
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
        }
    }
}

/// DTO for the password-reset pre-check.
#[derive(Debug, Deserialize, Validate)]
pub struct EmailCheckRequest {
    #[validate(email(message = "Invalid email type"))]
    pub email: String,
}
