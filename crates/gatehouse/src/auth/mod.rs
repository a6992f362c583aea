//! Authentication module.
//!
//! Provides:
//! - Credential verification against the user store
//! - Session token issuance, verification and periodic refresh
//! - The session view exposed to clients
//! - The access gate middleware and `CurrentUser` extractor

mod claims;
mod config;
mod cookies;
mod credentials;
mod error;
pub mod events;
mod middleware;
mod session;
mod token;

pub use claims::{Claims, Role, Status};
pub use self::config::{AuthConfig, AuthSettings, ConfigValidationError, EnvSnapshot, Environment};
pub use cookies::{CookieKind, CookiePolicy};
pub use credentials::{CredentialVerifier, VerifiedIdentity, hash_password, verify_password};
pub use error::{AuthError, AuthErrorResponse};
pub use middleware::{AuthState, CurrentUser, ResolvedSession, SignedIn, access_gate};
pub use session::{SessionView, materialize};
pub use token::{RefreshOutcome, RefreshTrigger, TokenIssuer, TokenRefresher, needs_refresh};
