//! Client-visible session view.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::token::TokenIssuer;
use super::{AuthError, Claims, Role, Status};

/// Read-only projection of verified claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub id: String,
    pub email: Option<String>,
    pub name: String,
    pub role: Option<Role>,
    pub status: Option<Status>,
    /// Token expiry (RFC 3339).
    pub expires: Option<String>,
}

impl From<&Claims> for SessionView {
    fn from(claims: &Claims) -> Self {
        Self {
            id: claims.sub.clone(),
            email: claims.email.clone(),
            name: claims.display_name().to_string(),
            role: claims.role(),
            status: claims.status(),
            expires: DateTime::<Utc>::from_timestamp(claims.exp, 0).map(|t| t.to_rfc3339()),
        }
    }
}

/// Verify `token` and project it. Never touches the user store.
pub fn materialize(issuer: &TokenIssuer, token: Option<&str>) -> Result<SessionView, AuthError> {
    let token = token.ok_or(AuthError::NoSession)?;
    let claims = issuer.verify(token).map_err(|_| AuthError::NoSession)?;
    Ok(SessionView::from(&claims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::VerifiedIdentity;
    use chrono::TimeDelta;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("session-test-secret-session-test-01", 3600, 600)
    }

    fn token_for(claims: &Claims) -> String {
        issuer().encode(claims).unwrap()
    }

    fn claims() -> Claims {
        issuer().issue_claims(
            &VerifiedIdentity {
                id: "usr_s".to_string(),
                email: "s@example.org".to_string(),
                name: "Sol".to_string(),
                role: Role::Admin,
                status: Status::Active,
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_materialize_valid_token() {
        let token = token_for(&claims());
        let view = materialize(&issuer(), Some(&token)).unwrap();
        assert_eq!(view.id, "usr_s");
        assert_eq!(view.name, "Sol");
        assert_eq!(view.role, Some(Role::Admin));
        assert_eq!(view.status, Some(Status::Active));
        assert!(view.expires.is_some());
    }

    #[test]
    fn test_missing_fields_are_null() {
        let token = token_for(&Claims {
            role: None,
            status: Some("BANNED".to_string()),
            ..claims()
        });
        let view = materialize(&issuer(), Some(&token)).unwrap();
        let json = serde_json::to_value(&view).unwrap();
        assert!(json["role"].is_null());
        assert!(json["status"].is_null());
    }

    #[test]
    fn test_no_session() {
        assert!(matches!(
            materialize(&issuer(), None),
            Err(AuthError::NoSession)
        ));
        assert!(matches!(
            materialize(&issuer(), Some("garbage")),
            Err(AuthError::NoSession)
        ));

        let expired = Claims {
            exp: (Utc::now() - TimeDelta::minutes(1)).timestamp(),
            ..claims()
        };
        assert!(matches!(
            materialize(&issuer(), Some(&token_for(&expired))),
            Err(AuthError::NoSession)
        ));
    }
}
