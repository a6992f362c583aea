//! Authorization decisions.
//!
//! [`decide`] is a pure function of the request's authentication state and
//! the route tier. Rules are evaluated in order and the first match wins.

use serde::Serialize;

use super::routes::RouteTier;
use crate::auth::{Role, Status};

pub const SIGN_IN_PATH: &str = "/auth/signin";
pub const LEGACY_SIGN_IN_PATH: &str = "/login";
pub const SUSPENDED_PATH: &str = "/auth/suspended";
pub const REJECTED_PATH: &str = "/auth/rejected";
pub const PENDING_PATH: &str = "/pending-approval";
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Outcome of an authorization decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "location", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    RedirectTo(String),
    Deny,
}

/// Inputs to [`decide`].
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    pub has_valid_token: bool,
    pub role: Option<Role>,
    pub status: Option<Status>,
    pub tier: RouteTier,
    pub path: &'a str,
}

/// Where a signed-in user with `status` belongs.
pub fn landing_page(status: Status) -> &'static str {
    match status {
        Status::Pending => PENDING_PATH,
        Status::Active => DASHBOARD_PATH,
        Status::Suspended | Status::Inactive => SUSPENDED_PATH,
        Status::Rejected => REJECTED_PATH,
    }
}

/// Sign-in redirect carrying the current path as `callbackUrl`.
pub fn sign_in_redirect(path: &str) -> String {
    let encoded = urlencoding::encode(path).replace("%2F", "/");
    format!("{SIGN_IN_PATH}?callbackUrl={encoded}")
}

fn is_under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn is_sign_in_page(path: &str) -> bool {
    path == SIGN_IN_PATH || path == LEGACY_SIGN_IN_PATH
}

fn allow_only_on(path: &str, page: &str) -> Decision {
    if path == page {
        Decision::Allow
    } else {
        Decision::RedirectTo(page.to_string())
    }
}

/// Decide whether a request may proceed.
pub fn decide(request: &AccessRequest<'_>) -> Decision {
    let AccessRequest {
        has_valid_token,
        role,
        status,
        tier,
        path,
    } = *request;

    // Signed-in users are sent from the sign-in page to where they belong.
    if has_valid_token && is_sign_in_page(path) {
        if let (Some(_), Some(status)) = (role, status) {
            return Decision::RedirectTo(landing_page(status).to_string());
        }
    }

    if tier == RouteTier::Public {
        return Decision::Allow;
    }

    if !has_valid_token {
        return Decision::RedirectTo(sign_in_redirect(path));
    }

    let (Some(role), Some(status)) = (role, status) else {
        return Decision::Deny;
    };

    match status {
        Status::Suspended | Status::Inactive => return allow_only_on(path, SUSPENDED_PATH),
        Status::Rejected => return allow_only_on(path, REJECTED_PATH),
        Status::Pending => {
            return if tier == RouteTier::Pending {
                Decision::Allow
            } else {
                Decision::RedirectTo(PENDING_PATH.to_string())
            };
        }
        Status::Active => {
            if is_under(path, PENDING_PATH) {
                return Decision::RedirectTo(DASHBOARD_PATH.to_string());
            }
        }
    }

    match tier {
        RouteTier::Admin if !role.is_admin() => Decision::RedirectTo(DASHBOARD_PATH.to_string()),
        RouteTier::Staff if role == Role::Volunteer => {
            Decision::RedirectTo(DASHBOARD_PATH.to_string())
        }
        _ => Decision::Allow,
    }
}
