//! Structured auth events.
//!
//! All events are emitted under the `gatehouse::auth::events` target so they
//! can be filtered independently of request tracing.

use tracing::{debug, info, warn};

use crate::access::{Decision, RouteTier};

/// Why a refresh kept the previous claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshFailure {
    UserMissing,
    StoreUnavailable,
    TimedOut,
    InvalidRecord,
}

impl RefreshFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshFailure::UserMissing => "user_missing",
            RefreshFailure::StoreUnavailable => "store_unavailable",
            RefreshFailure::TimedOut => "timed_out",
            RefreshFailure::InvalidRecord => "invalid_record",
        }
    }
}

pub fn decision_taken(path: &str, tier: RouteTier, user_id: Option<&str>, decision: &Decision) {
    match decision {
        Decision::Allow => debug!(
            event = "decision_taken",
            path,
            %tier,
            user_id = user_id.unwrap_or("-"),
            outcome = "allow"
        ),
        Decision::RedirectTo(location) => debug!(
            event = "decision_taken",
            path,
            %tier,
            user_id = user_id.unwrap_or("-"),
            outcome = "redirect",
            location = location.as_str()
        ),
        Decision::Deny => warn!(
            event = "decision_taken",
            path,
            %tier,
            user_id = user_id.unwrap_or("-"),
            outcome = "deny"
        ),
    }
}

pub fn signed_in(user_id: &str, method: &str) {
    info!(event = "signed_in", user_id, method, "user signed in");
}

pub fn signed_out(user_id: Option<&str>) {
    info!(event = "signed_out", user_id = user_id.unwrap_or("-"), "user signed out");
}

pub fn refresh_performed(user_id: &str, changed: bool) {
    if changed {
        info!(event = "refresh_performed", user_id, changed, "role/status updated from store");
    } else {
        debug!(event = "refresh_performed", user_id, changed);
    }
}

pub fn refresh_failed(user_id: &str, reason: RefreshFailure, detail: Option<&str>) {
    warn!(
        event = "refresh_failed",
        user_id,
        reason = reason.as_str(),
        detail = detail.unwrap_or(""),
        "keeping previous claims"
    );
}
