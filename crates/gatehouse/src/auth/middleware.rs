//! Access gate middleware.
//!
//! Composes the route classifier, token verification/refresh and the decision
//! engine for every request that is not bypassed.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{
        HeaderMap, HeaderValue, Request, StatusCode,
        header::{AUTHORIZATION, COOKIE, LOCATION, SET_COOKIE},
        request::Parts,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use super::cookies::{CookieKind, CookiePolicy};
use super::credentials::{CredentialVerifier, VerifiedIdentity};
use super::events;
use super::token::{RefreshOutcome, RefreshTrigger, TokenIssuer, TokenRefresher};
use super::{AuthConfig, AuthError, Claims, Role, Status};
use crate::access::{AccessRequest, Decision, RouteTable, SIGN_IN_PATH, canonical_path, decide};
use crate::user::UserStore;

/// Extract a Bearer token from an Authorization header value.
fn bearer_token_from_header(header_value: &str) -> Option<&str> {
    let mut parts = header_value.split_whitespace();
    let scheme = parts.next()?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some(token)
}

/// A successful sign-in: who, and the token to hand back.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub identity: VerifiedIdentity,
    pub claims: Claims,
    pub token: String,
}

/// Verified (and possibly refreshed) claims for a request.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub claims: Claims,
    pub refresh: RefreshOutcome,
    /// Present when the client should store a new token.
    pub reissued: Option<String>,
}

/// Authentication state shared across handlers.
#[derive(Clone)]
pub struct AuthState {
    config: Arc<AuthConfig>,
    store: Arc<dyn UserStore>,
    issuer: TokenIssuer,
    refresher: TokenRefresher,
    verifier: CredentialVerifier,
    cookies: CookiePolicy,
}

impl AuthState {
    pub fn new(config: AuthConfig, store: Arc<dyn UserStore>) -> Self {
        let issuer = TokenIssuer::from_config(&config);
        let refresher = TokenRefresher::new(
            store.clone(),
            config.refresh_interval,
            config.refresh_timeout,
        );
        let verifier = CredentialVerifier::new(store.clone());
        let cookies = CookiePolicy::from_config(&config);

        Self {
            config: Arc::new(config),
            store,
            issuer,
            refresher,
            verifier,
            cookies,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn cookies(&self) -> &CookiePolicy {
        &self.cookies
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn routes(&self) -> &RouteTable {
        &self.config.routes
    }

    /// Sign-in bodies must echo the CSRF cookie on real production hosts.
    pub fn requires_csrf(&self) -> bool {
        self.config.use_secure_cookies()
    }

    fn sign_in(&self, identity: VerifiedIdentity, method: &str) -> Result<SignedIn, AuthError> {
        let claims = self.issuer.issue_claims(&identity, Utc::now());
        let token = self.issuer.encode(&claims)?;
        debug!(user_id = %identity.id, status = %identity.status, "session issued");
        events::signed_in(&identity.id, method);
        Ok(SignedIn {
            identity,
            claims,
            token,
        })
    }

    /// Email/password sign-in.
    pub async fn sign_in_with_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignedIn, AuthError> {
        let identity = self.verifier.verify(email, password).await?;
        self.sign_in(identity, "credentials")
    }

    /// Sign-in asserted by a trusted upstream identity provider.
    pub async fn sign_in_delegated(
        &self,
        provider: &str,
        email: &str,
    ) -> Result<SignedIn, AuthError> {
        if !self.config.delegated_providers.iter().any(|p| p == provider) {
            warn!(provider, "delegated sign-in from unconfigured provider");
            return Err(AuthError::Forbidden);
        }

        let user = match self.store.find_by_email(email.trim()).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(AuthError::InvalidCredentials),
            Err(err) => {
                warn!(provider, error = %err, "user store failed during delegated sign-in");
                return Err(AuthError::InvalidCredentials);
            }
        };

        self.sign_in(VerifiedIdentity::from(&user), provider)
    }

    /// Verify a token, refresh its claims when due and re-issue it when needed.
    pub async fn resolve_session(
        &self,
        token: &str,
        trigger: RefreshTrigger,
    ) -> Result<ResolvedSession, AuthError> {
        let mut claims = self.issuer.verify(token)?;
        let now = Utc::now();

        let refresh = self.refresher.refresh(&mut claims, trigger, now).await;

        // Changed claims and old tokens restart the lifetime. A plain refresh
        // only re-signs so the client carries the new refresh timestamp.
        let renew = refresh.claims_changed() || self.issuer.needs_renewal(&claims, now);
        if renew {
            claims = self.issuer.renew(claims, now);
        }
        let reissued = if renew || refresh.rewrote_claims() {
            Some(self.issuer.encode(&claims)?)
        } else {
            None
        };

        Ok(ResolvedSession {
            claims,
            refresh,
            reissued,
        })
    }

    /// Session token from the Authorization header or the session cookie.
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        if let Some(token) = headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(bearer_token_from_header)
        {
            return Some(token.to_string());
        }

        self.cookie_token(headers)
    }

    /// Session token carried in the session cookie, ignoring any Bearer header.
    pub fn cookie_token(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get(COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|cookie| self.cookies.read(CookieKind::SessionToken, cookie))
            .map(str::to_string)
    }

    /// `Set-Cookie` value for a session token.
    pub fn session_cookie(&self, token: &str) -> String {
        self.cookies.set(CookieKind::SessionToken, token)
    }
}

/// Authenticated user extracted from request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// User claims.
    pub claims: Claims,
}

impl CurrentUser {
    /// Get the user ID.
    pub fn id(&self) -> &str {
        &self.claims.sub
    }

    pub fn role(&self) -> Option<Role> {
        self.claims.role()
    }

    pub fn status(&self) -> Option<Status> {
        self.claims.status()
    }

    /// Get display name.
    pub fn display_name(&self) -> &str {
        self.claims.display_name()
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::NoSession)
    }
}

fn append_cookie(response: &mut Response, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(err) => warn!(error = %err, "dropping unrepresentable cookie"),
    }
}

fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(LOCATION, value)]).into_response(),
        Err(_) => AuthError::Internal(format!("unrepresentable redirect: {location}")).into_response(),
    }
}

/// Access gate.
///
/// Non-canonical paths are redirected to their canonical form. Bypassed paths
/// go straight through. Everything else is classified, the
/// session token (if any) is verified and refreshed, and the decision engine
/// picks between running the handler, a `302` redirect and a `403`.
pub async fn access_gate(
    State(auth): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();

    // Classification only ever sees canonical paths.
    let canonical = canonical_path(&path);
    if canonical != path {
        let location = match req.uri().query() {
            Some(query) => format!("{canonical}?{query}"),
            None => canonical,
        };
        debug!(path = %path, location = %location, "redirecting to canonical path");
        return redirect(&location);
    }

    if auth.routes().is_bypassed(&path) {
        return next.run(req).await;
    }

    let tier = auth.routes().classify(&path);
    let token = auth.token_from_headers(req.headers());
    let cookie_token = auth.cookie_token(req.headers());

    let session = match token.as_deref() {
        Some(token) => match auth.resolve_session(token, RefreshTrigger::Verify).await {
            Ok(session) => Some(session),
            Err(err) => {
                debug!(error = %err, "session token rejected");
                None
            }
        },
        None => None,
    };

    let claims = session.as_ref().map(|s| &s.claims);
    let decision = decide(&AccessRequest {
        has_valid_token: session.is_some(),
        role: claims.and_then(Claims::role),
        status: claims.and_then(Claims::status),
        tier,
        path: &path,
    });
    events::decision_taken(&path, tier, claims.map(|c| c.sub.as_str()), &decision);

    let reissued = session.as_ref().and_then(|s| s.reissued.clone());
    // Only a rejected cookie is cleared, never one shadowed by a bad Bearer header.
    let stale_cookie = session.is_none() && token.is_some() && token == cookie_token;

    let mut response = match decision {
        Decision::Allow => {
            if let Some(session) = session {
                req.extensions_mut().insert(CurrentUser {
                    claims: session.claims,
                });
            }
            next.run(req).await
        }
        Decision::RedirectTo(location) => {
            let mut response = redirect(&location);
            if session.is_none() && location.starts_with(SIGN_IN_PATH) {
                let callback = urlencoding::encode(&path);
                append_cookie(
                    &mut response,
                    &auth.cookies().set(CookieKind::CallbackUrl, &callback),
                );
            }
            response
        }
        Decision::Deny => AuthError::Forbidden.into_response(),
    };

    if let Some(token) = reissued {
        append_cookie(&mut response, &auth.session_cookie(&token));
    } else if stale_cookie {
        append_cookie(&mut response, &auth.cookies().clear(CookieKind::SessionToken));
    }

    response
}
