//! HTTP handlers.

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode, Uri, header::COOKIE, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{instrument, warn};

use super::state::AppState;
use crate::access::{landing_page, resolve_redirect};
use crate::auth::{
    AuthError, CookieKind, CurrentUser, RefreshTrigger, SessionView, VerifiedIdentity, events,
    materialize,
};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfResponse {
    pub csrf_token: String,
}

fn random_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

/// Issue a CSRF token. The same value is set as a cookie and returned in the
/// body; sign-in requests echo it back.
pub async fn csrf(State(state): State<AppState>) -> impl IntoResponse {
    let token = random_token();
    let cookie = state.auth.cookies().set(CookieKind::CsrfToken, &token);
    (
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(CsrfResponse { csrf_token: token }),
    )
}

/// Sign-in request body.
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
    #[serde(default, alias = "callbackUrl")]
    pub callback_url: Option<String>,
    #[serde(default, alias = "csrfToken")]
    pub csrf_token: Option<String>,
}

/// Sign-in response body.
#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub user: VerifiedIdentity,
    /// Where the client should navigate next.
    pub url: String,
}

fn cookie_header(headers: &HeaderMap) -> &str {
    headers
        .get(COOKIE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
}

/// Double-submit check: the body must echo the cookie, compared in constant time.
fn csrf_tokens_match(cookie: Option<&str>, submitted: Option<&str>) -> bool {
    match (cookie, submitted) {
        (Some(cookie), Some(submitted)) => cookie.as_bytes().ct_eq(submitted.as_bytes()).into(),
        _ => false,
    }
}

/// Credential sign-in.
#[instrument(skip(state, headers, request))]
pub async fn signin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SignInRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let cookies = state.auth.cookies();
    let cookie_header = cookie_header(&headers);

    if state.auth.requires_csrf() {
        let expected = cookies.read(CookieKind::CsrfToken, cookie_header);
        if !csrf_tokens_match(expected, request.csrf_token.as_deref()) {
            warn!("sign-in rejected: csrf token mismatch");
            return Err(AuthError::CsrfMismatch);
        }
    }

    let signed_in = state
        .auth
        .sign_in_with_credentials(&request.email, &request.password)
        .await?;

    // Body first, then the callback cookie (stored percent-encoded), then the
    // landing page for the user's status.
    let requested = request
        .callback_url
        .clone()
        .or_else(|| {
            cookies
                .read(CookieKind::CallbackUrl, cookie_header)
                .and_then(|c| urlencoding::decode(c).ok())
                .map(|c| c.into_owned())
        })
        .unwrap_or_else(|| landing_page(signed_in.identity.status).to_string());
    let url = resolve_redirect(&requested, &state.auth.config().base_url);

    Ok((
        AppendHeaders([
            (SET_COOKIE, state.auth.session_cookie(&signed_in.token)),
            (SET_COOKIE, cookies.clear(CookieKind::CallbackUrl)),
        ]),
        Json(SignInResponse {
            user: signed_in.identity,
            url,
        }),
    ))
}

/// Sign out (clears the session cookie).
pub async fn signout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let user_id = state
        .auth
        .token_from_headers(&headers)
        .and_then(|token| state.auth.issuer().verify(&token).ok())
        .map(|claims| claims.sub);
    events::signed_out(user_id.as_deref());

    (
        AppendHeaders([(SET_COOKIE, state.auth.cookies().clear(CookieKind::SessionToken))]),
        StatusCode::NO_CONTENT,
    )
}

/// Current session view. Reads only the token.
pub async fn get_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionView>, AuthError> {
    let token = state.auth.token_from_headers(&headers);
    materialize(state.auth.issuer(), token.as_deref()).map(Json)
}

/// Force a refresh of role and status and return the updated view.
#[instrument(skip(state, headers))]
pub async fn update_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    let token = state
        .auth
        .token_from_headers(&headers)
        .ok_or(AuthError::NoSession)?;

    let session = state
        .auth
        .resolve_session(&token, RefreshTrigger::Update)
        .await
        .map_err(|_| AuthError::NoSession)?;

    let cookie = session
        .reissued
        .as_deref()
        .map(|token| state.auth.session_cookie(token));

    Ok((
        AppendHeaders(cookie.map(|c| (SET_COOKIE, c))),
        Json(SessionView::from(&session.claims)),
    ))
}

/// Page response for routes the gate let through.
#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub path: String,
    pub session: Option<SessionView>,
}

/// Stand-in for the page layer: reports which page was granted and to whom.
pub async fn page(uri: Uri, user: Option<Extension<CurrentUser>>) -> Json<PageResponse> {
    Json(PageResponse {
        path: uri.path().to_string(),
        session: user.map(|Extension(user)| SessionView::from(&user.claims)),
    })
}
