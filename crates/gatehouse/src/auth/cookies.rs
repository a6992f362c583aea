//! Auth cookie naming and attributes.

use super::AuthConfig;

/// Cookies managed by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieKind {
    SessionToken,
    CallbackUrl,
    CsrfToken,
    State,
    PkceCodeVerifier,
}

impl CookieKind {
    fn base_name(&self) -> &'static str {
        match self {
            CookieKind::SessionToken => "gatehouse.session-token",
            CookieKind::CallbackUrl => "gatehouse.callback-url",
            CookieKind::CsrfToken => "gatehouse.csrf-token",
            CookieKind::State => "gatehouse.state",
            CookieKind::PkceCodeVerifier => "gatehouse.pkce.code_verifier",
        }
    }
}

/// Short-lived OAuth handshake cookies.
const HANDSHAKE_MAX_AGE_SECS: i64 = 15 * 60;

/// Builds and reads auth cookies for one deployment.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    secure: bool,
    session_max_age_secs: i64,
}

impl CookiePolicy {
    pub fn new(secure: bool, session_max_age_secs: i64) -> Self {
        Self {
            secure,
            session_max_age_secs,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.use_secure_cookies(), config.session_max_age_secs)
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Cookie name, with the `__Secure-` prefix when cookies are secure.
    pub fn name(&self, kind: CookieKind) -> String {
        if self.secure {
            format!("__Secure-{}", kind.base_name())
        } else {
            kind.base_name().to_string()
        }
    }

    fn max_age(&self, kind: CookieKind) -> Option<i64> {
        match kind {
            CookieKind::SessionToken => Some(self.session_max_age_secs),
            CookieKind::State | CookieKind::PkceCodeVerifier => Some(HANDSHAKE_MAX_AGE_SECS),
            CookieKind::CallbackUrl | CookieKind::CsrfToken => None,
        }
    }

    fn attributes(&self) -> &'static str {
        if self.secure {
            "HttpOnly; Path=/; SameSite=None; Secure"
        } else {
            "HttpOnly; Path=/; SameSite=Lax"
        }
    }

    /// `Set-Cookie` value storing `value`.
    pub fn set(&self, kind: CookieKind, value: &str) -> String {
        let mut cookie = format!("{}={}; {}", self.name(kind), value, self.attributes());
        if let Some(max_age) = self.max_age(kind) {
            cookie.push_str(&format!("; Max-Age={}", max_age));
        }
        cookie
    }

    /// `Set-Cookie` value that removes the cookie.
    pub fn clear(&self, kind: CookieKind) -> String {
        format!("{}=; {}; Max-Age=0", self.name(kind), self.attributes())
    }

    /// Read this cookie from a `Cookie` request header.
    pub fn read<'a>(&self, kind: CookieKind, cookie_header: &'a str) -> Option<&'a str> {
        let name = self.name(kind);
        cookie_from_header(cookie_header, &name)
    }
}

fn cookie_from_header<'a>(cookie_header: &'a str, cookie_name: &str) -> Option<&'a str> {
    cookie_header.split(';').map(str::trim).find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        if name.trim() == cookie_name {
            Some(value.trim()).filter(|v| !v.is_empty())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_cookie_attributes() {
        let policy = CookiePolicy::new(false, 2_592_000);
        assert_eq!(
            policy.set(CookieKind::SessionToken, "abc"),
            "gatehouse.session-token=abc; HttpOnly; Path=/; SameSite=Lax; Max-Age=2592000"
        );
        assert_eq!(
            policy.set(CookieKind::CsrfToken, "t"),
            "gatehouse.csrf-token=t; HttpOnly; Path=/; SameSite=Lax"
        );
    }

    #[test]
    fn test_secure_cookie_attributes() {
        let policy = CookiePolicy::new(true, 60);
        assert_eq!(
            policy.set(CookieKind::State, "s"),
            "__Secure-gatehouse.state=s; HttpOnly; Path=/; SameSite=None; Secure; Max-Age=900"
        );
        assert_eq!(
            policy.name(CookieKind::PkceCodeVerifier),
            "__Secure-gatehouse.pkce.code_verifier"
        );
    }

    #[test]
    fn test_clear_sets_zero_max_age() {
        let policy = CookiePolicy::new(false, 60);
        assert_eq!(
            policy.clear(CookieKind::SessionToken),
            "gatehouse.session-token=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0"
        );
    }

    #[test]
    fn test_read_from_header() {
        let policy = CookiePolicy::new(false, 60);
        let header = "theme=dark; gatehouse.session-token=tok.en.value ; gatehouse.csrf-token=";
        assert_eq!(
            policy.read(CookieKind::SessionToken, header),
            Some("tok.en.value")
        );
        assert_eq!(policy.read(CookieKind::CsrfToken, header), None);
        assert_eq!(policy.read(CookieKind::State, header), None);

        // A secure deployment ignores the unprefixed name.
        let secure = CookiePolicy::new(true, 60);
        assert_eq!(secure.read(CookieKind::SessionToken, header), None);
    }
}
