//! Route classification.
//!
//! Maps a request path to the access tier it requires using a longest-prefix
//! match over a prefix table. Matching respects path segments: `/dashboard`
//! covers `/dashboard` and `/dashboard/x` but not `/dashboardx`. The root
//! prefix `/` only covers `/` itself.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Access tier required by a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteTier {
    Public,
    Pending,
    Authenticated,
    Staff,
    Admin,
}

impl std::fmt::Display for RouteTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RouteTier::Public => "public",
            RouteTier::Pending => "pending",
            RouteTier::Authenticated => "authenticated",
            RouteTier::Staff => "staff",
            RouteTier::Admin => "admin",
        };
        f.write_str(s)
    }
}

/// Errors building a route table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteTableError {
    #[error("prefix {prefix} is listed under both {first} and {second}")]
    DuplicatePrefix {
        prefix: String,
        first: RouteTier,
        second: RouteTier,
    },

    #[error("invalid route prefix {0:?}: must start with '/'")]
    InvalidPrefix(String),
}

/// Per-tier prefix lists, as they appear in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSettings {
    pub public: Vec<String>,
    pub pending: Vec<String>,
    pub authenticated: Vec<String>,
    pub staff: Vec<String>,
    pub admin: Vec<String>,
    /// Paths that skip the gate entirely (auth endpoints, static assets).
    pub bypass: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self {
            public: strings(&[
                "/",
                "/auth/signin",
                "/auth/signup",
                "/auth/error",
                "/auth/rejected",
                "/auth/suspended",
                "/login",
            ]),
            pending: strings(&["/pending-approval", "/dashboard/profile", "/dashboard/pending"]),
            authenticated: strings(&[
                "/dashboard",
                "/dashboard/tasks",
                "/dashboard/documents",
                "/dashboard/checkin",
            ]),
            staff: strings(&[
                "/dashboard/projects",
                "/dashboard/tasks/create",
                "/dashboard/reports",
                "/dashboard/team",
            ]),
            admin: strings(&["/admin"]),
            bypass: strings(&[
                "/api/auth",
                "/health",
                "/_next/static",
                "/_next/image",
                "/favicon.ico",
                "/public",
            ]),
        }
    }
}

/// Whether `prefix` covers `path` on a segment boundary.
fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return path == "/";
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn is_single_dot(segment: &str) -> bool {
    segment == "." || segment.eq_ignore_ascii_case("%2e")
}

fn is_double_dot(segment: &str) -> bool {
    matches!(
        segment.to_ascii_lowercase().as_str(),
        ".." | ".%2e" | "%2e." | "%2e%2e"
    )
}

/// Canonical form of a request path.
///
/// Repeated separators collapse, `\` counts as `/`, and `.`/`..` segments
/// (plain or percent-encoded) are resolved without climbing above the root.
/// A trailing slash survives, so `/admin/` stays as it is.
pub fn canonical_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        if segment.is_empty() || is_single_dot(segment) {
            continue;
        }
        if is_double_dot(segment) {
            segments.pop();
        } else {
            segments.push(segment);
        }
    }

    let last = path.rsplit(['/', '\\']).next().unwrap_or_default();
    let trailing_slash = last.is_empty() || is_single_dot(last) || is_double_dot(last);

    let mut canonical = format!("/{}", segments.join("/"));
    if trailing_slash && !segments.is_empty() {
        canonical.push('/');
    }
    canonical
}

fn normalize(prefix: &str) -> Result<String, RouteTableError> {
    if !prefix.starts_with('/') {
        return Err(RouteTableError::InvalidPrefix(prefix.to_string()));
    }
    let trimmed = prefix.trim_end_matches('/');
    Ok(if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    })
}

/// Immutable prefix table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    /// Sorted by prefix length, longest first.
    entries: Vec<(String, RouteTier)>,
    bypass: Vec<String>,
}

impl RouteTable {
    /// Build a table from per-tier prefix lists.
    pub fn from_settings(settings: &RouteSettings) -> Result<Self, RouteTableError> {
        let tiers = [
            (RouteTier::Public, &settings.public),
            (RouteTier::Pending, &settings.pending),
            (RouteTier::Authenticated, &settings.authenticated),
            (RouteTier::Staff, &settings.staff),
            (RouteTier::Admin, &settings.admin),
        ];

        let mut seen: HashMap<String, RouteTier> = HashMap::new();
        let mut entries = Vec::new();
        for (tier, prefixes) in tiers {
            for raw in prefixes {
                let prefix = normalize(raw)?;
                if let Some(first) = seen.get(&prefix) {
                    return Err(RouteTableError::DuplicatePrefix {
                        prefix,
                        first: *first,
                        second: tier,
                    });
                }
                seen.insert(prefix.clone(), tier);
                entries.push((prefix, tier));
            }
        }
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let bypass = settings
            .bypass
            .iter()
            .map(|p| normalize(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { entries, bypass })
    }

    /// Tier required by `path`. Unmatched paths require authentication.
    pub fn classify(&self, path: &str) -> RouteTier {
        self.entries
            .iter()
            .find(|(prefix, _)| prefix_matches(prefix, path))
            .map(|(_, tier)| *tier)
            .unwrap_or(RouteTier::Authenticated)
    }

    /// Whether `path` skips the gate.
    pub fn is_bypassed(&self, path: &str) -> bool {
        self.bypass.iter().any(|prefix| prefix_matches(prefix, path))
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        let settings = RouteSettings::default();
        let mut entries = Vec::new();
        for (tier, prefixes) in [
            (RouteTier::Public, settings.public),
            (RouteTier::Pending, settings.pending),
            (RouteTier::Authenticated, settings.authenticated),
            (RouteTier::Staff, settings.staff),
            (RouteTier::Admin, settings.admin),
        ] {
            entries.extend(prefixes.into_iter().map(|p| (p, tier)));
        }
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self {
            entries,
            bypass: settings.bypass,
        }
    }
}
