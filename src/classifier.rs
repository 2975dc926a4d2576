/// RouteCategory
///
/// The access class of a request path. Computed per request, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteCategory {
    /// No session required; the gatekeeper does not even look one up.
    Public,
    /// Any authenticated, active account.
    Protected,
    /// Authenticated, active, and `Role::Admin`.
    AdminOnly,
}

/// ClientKind
///
/// Whether a rejected request should get a JSON error (machine client) or a redirect to a
/// page (browser). Decided by the `/api/` path prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Api,
    Browser,
}

impl ClientKind {
    pub fn for_path(path: &str) -> Self {
        if path.starts_with("/api/") {
            ClientKind::Api
        } else {
            ClientKind::Browser
        }
    }
}

pub const DEFAULT_PUBLIC_PREFIXES: &[&str] = &[
    "/login.html",
    "/auth/login",
    "/auth/logout",
    "/api/auth/login",
    "/api/auth/logout",
    "/api/health",
    "/css/",
    "/js/",
    "/images/",
    "/error/",
    "/swagger-ui",
    "/api-docs",
];

pub const DEFAULT_ADMIN_API_PREFIXES: &[&str] = &[
    "/api/accounts/register",
    "/api/accounts/all",
    "/api/accounts/update",
    "/api/accounts/delete",
    "/api/accounts/deactivate",
];

pub const DEFAULT_ADMIN_PAGES: &[&str] = &["/accounts.html", "/employees.html", "/reports.html"];

/// RoutePolicy
///
/// The three literal path lists that drive classification, loaded once at startup.
///
/// Matching rules:
/// - public entries match by **prefix**, and are checked first, so a public path is never
///   gated even when an admin rule would also match it;
/// - admin API entries match by **prefix** (`/api/accounts/all` covers `/api/accounts/all/7`);
/// - admin pages match by **exact equality**, so `/accounts.html` does not swallow
///   `/accounts.html.bak` or any sibling page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePolicy {
    public_prefixes: Vec<String>,
    admin_api_prefixes: Vec<String>,
    admin_pages: Vec<String>,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::new(
            owned(DEFAULT_PUBLIC_PREFIXES),
            owned(DEFAULT_ADMIN_API_PREFIXES),
            owned(DEFAULT_ADMIN_PAGES),
        )
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl RoutePolicy {
    pub fn new(
        public_prefixes: Vec<String>,
        admin_api_prefixes: Vec<String>,
        admin_pages: Vec<String>,
    ) -> Self {
        Self {
            public_prefixes,
            admin_api_prefixes,
            admin_pages,
        }
    }

    pub fn public_prefixes(&self) -> &[String] {
        &self.public_prefixes
    }

    pub fn admin_api_prefixes(&self) -> &[String] {
        &self.admin_api_prefixes
    }

    pub fn admin_pages(&self) -> &[String] {
        &self.admin_pages
    }

    /// classify
    ///
    /// Expects a path already passed through [`normalize_path`].
    pub fn classify(&self, path: &str) -> RouteCategory {
        if self.public_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return RouteCategory::Public;
        }

        let admin_api = self
            .admin_api_prefixes
            .iter()
            .any(|p| path.starts_with(p.as_str()));
        let admin_page = self.admin_pages.iter().any(|p| path == p);

        if admin_api || admin_page {
            RouteCategory::AdminOnly
        } else {
            RouteCategory::Protected
        }
    }
}

/// normalize_path
///
/// Brings a raw request path into the form the classifier expects: query string removed,
/// context root stripped, `.`/`..`/empty segments collapsed, leading slash guaranteed.
/// Collapsing dot segments means `/css/../api/accounts/all` is judged as the admin path it
/// resolves to, not as a stylesheet.
pub fn normalize_path(raw: &str, context_root: &str) -> String {
    let path = raw.split(['?', '#']).next().unwrap_or_default();

    let root = context_root.trim_end_matches('/');
    let path = match path.strip_prefix(root) {
        Some(rest) if !root.is_empty() && (rest.is_empty() || rest.starts_with('/')) => rest,
        _ => path,
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut normalized = format!("/{}", segments.join("/"));
    if path.ends_with('/') && !segments.is_empty() {
        normalized.push('/');
    }
    normalized
}
