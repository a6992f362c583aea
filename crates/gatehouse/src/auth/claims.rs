//! JWT claims, user roles and account statuses.

use serde::{Deserialize, Serialize};

/// User role, in ascending order of privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Volunteer.
    Volunteer,
    /// Staff member.
    Staff,
    /// Administrator.
    Admin,
    /// Super administrator.
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Volunteer, Role::Staff, Role::Admin, Role::SuperAdmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Volunteer => "VOLUNTEER",
            Role::Staff => "STAFF",
            Role::Admin => "ADMIN",
            Role::SuperAdmin => "SUPER_ADMIN",
        }
    }

    /// Whether this role may enter admin-tier routes.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown role: {}", s))
    }
}

/// Account lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Signed up, waiting for approval.
    Pending,
    /// Approved.
    Active,
    /// Suspended by an administrator.
    Suspended,
    /// Deactivated.
    Inactive,
    /// Application rejected.
    Rejected,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Pending,
        Status::Active,
        Status::Suspended,
        Status::Inactive,
        Status::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::Active => "ACTIVE",
            Status::Suspended => "SUSPENDED",
            Status::Inactive => "INACTIVE",
            Status::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown status: {}", s))
    }
}

/// JWT claims structure.
///
/// Role and status travel as raw strings so that a token carrying a value
/// outside the known enumerations still verifies and is then denied by the
/// decision engine instead of being silently coerced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,

    /// User's email.
    #[serde(default)]
    pub email: Option<String>,

    /// Display name.
    #[serde(default)]
    pub name: Option<String>,

    /// Role as last read from the user store.
    #[serde(default)]
    pub role: Option<String>,

    /// Status as last read from the user store.
    #[serde(default)]
    pub status: Option<String>,

    /// When role/status were last re-read from the user store (epoch millis).
    #[serde(default, rename = "lastRefresh")]
    pub last_refresh: Option<i64>,

    /// Issued at (as Unix timestamp).
    pub iat: i64,

    /// Expiration time (as Unix timestamp).
    pub exp: i64,
}

impl Claims {
    /// Parsed role, `None` when missing or unrecognized.
    pub fn role(&self) -> Option<Role> {
        self.role.as_deref().and_then(|r| r.parse().ok())
    }

    /// Parsed status, `None` when missing or unrecognized.
    pub fn status(&self) -> Option<Status> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }

    /// Get the display name for the user.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.email.as_deref())
            .unwrap_or(&self.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> Claims {
        Claims {
            sub: "usr_1".to_string(),
            email: Some("ada@example.org".to_string()),
            name: Some("Ada".to_string()),
            role: Some("STAFF".to_string()),
            status: Some("ACTIVE".to_string()),
            last_refresh: None,
            iat: 0,
            exp: 0,
        }
    }

    #[test]
    fn test_role_round_trips_through_display() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("admin".parse::<Role>().is_err());
        assert!("OWNER".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_ordering_follows_privilege() {
        assert!(Role::Volunteer < Role::Staff);
        assert!(Role::Staff < Role::Admin);
        assert!(Role::Admin < Role::SuperAdmin);
        assert!(Role::SuperAdmin.is_admin());
        assert!(!Role::Staff.is_admin());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("SUSPENDED".parse::<Status>().unwrap(), Status::Suspended);
        assert!("BANNED".parse::<Status>().is_err());
    }

    #[test]
    fn test_claims_unrecognized_values_parse_to_none() {
        let corrupt = Claims {
            role: Some("OWNER".to_string()),
            status: None,
            ..claims()
        };
        assert_eq!(corrupt.role(), None);
        assert_eq!(corrupt.status(), None);

        let ok = claims();
        assert_eq!(ok.role(), Some(Role::Staff));
        assert_eq!(ok.status(), Some(Status::Active));
    }

    #[test]
    fn test_claims_display_name() {
        assert_eq!(claims().display_name(), "Ada");

        let no_name = Claims {
            name: Some(String::new()),
            ..claims()
        };
        assert_eq!(no_name.display_name(), "ada@example.org");

        let only_sub = Claims {
            name: None,
            email: None,
            ..claims()
        };
        assert_eq!(only_sub.display_name(), "usr_1");
    }

    #[test]
    fn test_claims_serialize_last_refresh_name() {
        let json = serde_json::to_value(Claims {
            last_refresh: Some(42),
            ..claims()
        })
        .unwrap();
        assert_eq!(json["lastRefresh"], 42);
        assert_eq!(json["role"], "STAFF");
    }
}
