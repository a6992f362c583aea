//! Route classification, authorization decisions and redirect validation.
//!
//! Everything here is pure: no I/O, no clocks, no configuration lookups.

mod decision;
mod redirect;
mod routes;

pub use decision::{
    AccessRequest, DASHBOARD_PATH, Decision, LEGACY_SIGN_IN_PATH, PENDING_PATH, REJECTED_PATH,
    SIGN_IN_PATH, SUSPENDED_PATH, decide, landing_page, sign_in_redirect,
};
pub use redirect::resolve_redirect;
pub use routes::{RouteSettings, RouteTable, RouteTableError, RouteTier, canonical_path};
