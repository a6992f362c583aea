//! Post-sign-in redirect validation.

use reqwest::Url;

/// Resolve a requested redirect target against `base_url`.
///
/// Relative paths are joined to the base URL. Absolute targets are kept only
/// when they share the base URL's origin. Anything else, including malformed
/// input and protocol-relative targets pointing elsewhere, yields the base URL.
pub fn resolve_redirect(requested: &str, base_url: &str) -> String {
    let fallback = || base_url.to_string();

    let Ok(base) = Url::parse(base_url) else {
        return fallback();
    };

    let is_relative =
        requested.starts_with('/') && !requested.starts_with("//") && !requested.starts_with("/\\");
    if is_relative {
        return format!("{}{}", base_url.trim_end_matches('/'), requested);
    }

    // `//host/path` inherits the base scheme and is then origin-checked.
    let target = if requested.starts_with("//") || requested.starts_with("/\\") {
        base.join(requested)
    } else {
        Url::parse(requested)
    };

    match target {
        Ok(target) if target.origin() == base.origin() => target.to_string(),
        _ => fallback(),
    }
}
