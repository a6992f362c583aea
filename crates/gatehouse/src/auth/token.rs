//! Session token issuance, verification and refresh.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use std::sync::Arc;
use std::time::Duration;

use super::credentials::VerifiedIdentity;
use super::events::{self, RefreshFailure};
use super::{AuthConfig, AuthError, Claims};
use crate::user::{StoreError, UserStore};

/// What caused a token to be looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// Ordinary request; refresh only when the claims are old.
    Verify,
    /// The client asked for a session update; always refresh.
    Update,
}

/// Signs and verifies session tokens (HS256).
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    max_age_secs: i64,
    update_age_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, max_age_secs: i64, update_age_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            max_age_secs,
            update_age_secs,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            &config.jwt_secret,
            config.session_max_age_secs,
            config.session_update_age_secs,
        )
    }

    /// Claims for a freshly signed-in identity.
    pub fn issue_claims(&self, identity: &VerifiedIdentity, now: DateTime<Utc>) -> Claims {
        Claims {
            sub: identity.id.clone(),
            email: Some(identity.email.clone()),
            name: Some(identity.name.clone()),
            role: Some(identity.role.to_string()),
            status: Some(identity.status.to_string()),
            last_refresh: Some(now.timestamp_millis()),
            iat: now.timestamp(),
            exp: now.timestamp() + self.max_age_secs,
        }
    }

    /// Sign claims into a compact JWT.
    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    /// Verify signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }

    /// Whether a verified token is old enough to be re-issued.
    pub fn needs_renewal(&self, claims: &Claims, now: DateTime<Utc>) -> bool {
        now.timestamp() - claims.iat > self.update_age_secs
    }

    /// Restart the token's lifetime.
    pub fn renew(&self, mut claims: Claims, now: DateTime<Utc>) -> Claims {
        claims.iat = now.timestamp();
        claims.exp = now.timestamp() + self.max_age_secs;
        claims
    }
}

/// Whether role/status must be re-read from the store.
pub fn needs_refresh(
    claims: &Claims,
    trigger: RefreshTrigger,
    interval: Duration,
    now: DateTime<Utc>,
) -> bool {
    if trigger == RefreshTrigger::Update {
        return true;
    }
    match claims.last_refresh {
        None => true,
        Some(last) => now.timestamp_millis() - last > interval.as_millis() as i64,
    }
}

/// Result of a refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    NotNeeded,
    Refreshed { changed: bool },
    Failed(RefreshFailure),
}

impl RefreshOutcome {
    /// Whether role, status or identity differ from what the client holds.
    pub fn claims_changed(&self) -> bool {
        matches!(
            self,
            RefreshOutcome::Refreshed { changed: true }
                | RefreshOutcome::Failed(RefreshFailure::InvalidRecord)
        )
    }

    /// Whether the claims were rewritten from a store read.
    pub fn rewrote_claims(&self) -> bool {
        matches!(
            self,
            RefreshOutcome::Refreshed { .. } | RefreshOutcome::Failed(RefreshFailure::InvalidRecord)
        )
    }
}

/// Re-reads role and status from the user store.
#[derive(Clone)]
pub struct TokenRefresher {
    store: Arc<dyn UserStore>,
    interval: Duration,
    timeout: Duration,
}

impl TokenRefresher {
    pub fn new(store: Arc<dyn UserStore>, interval: Duration, timeout: Duration) -> Self {
        Self {
            store,
            interval,
            timeout,
        }
    }

    /// Refresh `claims` in place when the policy requires it.
    ///
    /// Store failures never fail the request: the previous claims are kept.
    /// A record whose role or status cannot be mapped clears that field.
    pub async fn refresh(
        &self,
        claims: &mut Claims,
        trigger: RefreshTrigger,
        now: DateTime<Utc>,
    ) -> RefreshOutcome {
        if !needs_refresh(claims, trigger, self.interval, now) {
            return RefreshOutcome::NotNeeded;
        }

        let lookup = tokio::time::timeout(self.timeout, self.store.find_by_id(&claims.sub)).await;

        match lookup {
            Ok(Ok(Some(user))) => {
                let role = Some(user.role.to_string());
                let status = Some(user.status.to_string());
                let email = Some(user.email.clone());
                let name = Some(user.display_name());

                let changed = claims.role != role
                    || claims.status != status
                    || claims.email != email
                    || claims.name != name;

                claims.role = role;
                claims.status = status;
                claims.email = email;
                claims.name = name;
                claims.last_refresh = Some(now.timestamp_millis());

                events::refresh_performed(&claims.sub, changed);
                RefreshOutcome::Refreshed { changed }
            }
            Ok(Ok(None)) => {
                events::refresh_failed(&claims.sub, RefreshFailure::UserMissing, None);
                RefreshOutcome::Failed(RefreshFailure::UserMissing)
            }
            Ok(Err(StoreError::InvalidRecord { role, status, .. })) => {
                claims.role = role.map(|r| r.to_string());
                claims.status = status.map(|s| s.to_string());
                events::refresh_failed(&claims.sub, RefreshFailure::InvalidRecord, None);
                RefreshOutcome::Failed(RefreshFailure::InvalidRecord)
            }
            Ok(Err(StoreError::Unavailable(detail))) => {
                events::refresh_failed(
                    &claims.sub,
                    RefreshFailure::StoreUnavailable,
                    Some(&detail),
                );
                RefreshOutcome::Failed(RefreshFailure::StoreUnavailable)
            }
            Err(_) => {
                events::refresh_failed(&claims.sub, RefreshFailure::TimedOut, None);
                RefreshOutcome::Failed(RefreshFailure::TimedOut)
            }
        }
    }
}
