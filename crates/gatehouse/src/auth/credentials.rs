//! Email/password verification against the user store.

use serde::Serialize;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use super::{AuthError, Role, Status};
use crate::user::{User, UserStore};

/// bcrypt cost. Lower in debug builds so tests stay fast.
#[cfg(debug_assertions)]
const BCRYPT_COST: u32 = 4;
#[cfg(not(debug_assertions))]
const BCRYPT_COST: u32 = 10;

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, BCRYPT_COST)
}

/// Check a password against a stored hash. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Hash checked on paths that have no stored hash, so every failed sign-in
/// costs one bcrypt verification.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("gatehouse-dummy-password").ok());

fn burn_verification(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}

/// Identity projection of a user whose credentials checked out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedIdentity {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub status: Status,
}

impl From<&User> for VerifiedIdentity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.display_name(),
            role: user.role,
            status: user.status,
        }
    }
}

/// Checks email/password pairs. Every failure looks the same to the caller.
#[derive(Clone)]
pub struct CredentialVerifier {
    store: Arc<dyn UserStore>,
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn verify(&self, email: &str, password: &str) -> Result<VerifiedIdentity, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let user = match self.store.find_by_email(email).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("sign-in for unknown email");
                burn_verification(password);
                return Err(AuthError::InvalidCredentials);
            }
            Err(err) => {
                warn!(error = %err, "user store failed during sign-in");
                burn_verification(password);
                return Err(AuthError::InvalidCredentials);
            }
        };

        let Some(hash) = user.password_hash.as_deref() else {
            debug!(user_id = %user.id, "sign-in for account without a password");
            burn_verification(password);
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, hash) {
            debug!(user_id = %user.id, "password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(VerifiedIdentity::from(&user))
    }
}
