//! User data models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::repository::StoreError;
use crate::auth::{Role, Status};

/// Raw user row as stored. Role and status are free text at this layer.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

/// User entity with role and status mapped onto the closed enumerations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub status: Status,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// `name` if non-empty, else "first last", else the email.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return name.to_string();
        }

        let joined = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        );
        let joined = joined.trim();
        if !joined.is_empty() {
            return joined.to_string();
        }

        self.email.clone()
    }
}

fn map_role(value: &str) -> Option<Role> {
    match value {
        "VOLUNTEER" => Some(Role::Volunteer),
        "STAFF" => Some(Role::Staff),
        "ADMIN" => Some(Role::Admin),
        "SUPER_ADMIN" => Some(Role::SuperAdmin),
        _ => None,
    }
}

fn map_status(value: &str) -> Option<Status> {
    match value {
        "PENDING" => Some(Status::Pending),
        "ACTIVE" => Some(Status::Active),
        "SUSPENDED" => Some(Status::Suspended),
        "INACTIVE" => Some(Status::Inactive),
        "REJECTED" => Some(Status::Rejected),
        _ => None,
    }
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = map_role(&row.role);
        let status = map_status(&row.status);

        let (Some(role), Some(status)) = (role, status) else {
            return Err(StoreError::InvalidRecord {
                id: row.id,
                role,
                status,
            });
        };

        Ok(User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            name: row.name,
            first_name: row.first_name,
            last_name: row.last_name,
            role,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Request to create a new user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    /// Already hashed password; `None` for accounts that only sign in through a provider.
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub status: Status,
}

impl NewUser {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password_hash: None,
            name: None,
            first_name: None,
            last_name: None,
            role: Role::Volunteer,
            status: Status::Pending,
        }
    }

    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }
}
