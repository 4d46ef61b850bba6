//! Route gating by session presence and role.
//!
//! Decisions are a pure function of the path and the caller's [`SessionContext`];
//! nothing is cached between requests, so a role change takes effect on the next
//! navigation.

use serde::{Deserialize, Serialize};

use super::domain::{Role, UserId};

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    Allow,
    RedirectToLogin,
    RedirectToDashboard,
    Deny,
}

impl AccessDecision {
    pub const fn label(self) -> &'static str {
        match self {
            AccessDecision::Allow => "allow",
            AccessDecision::RedirectToLogin => "redirect_to_login",
            AccessDecision::RedirectToDashboard => "redirect_to_dashboard",
            AccessDecision::Deny => "deny",
        }
    }

    pub const fn redirect_target(self) -> Option<&'static str> {
        match self {
            AccessDecision::RedirectToLogin => Some(LOGIN_PATH),
            AccessDecision::RedirectToDashboard => Some(DASHBOARD_PATH),
            AccessDecision::Allow | AccessDecision::Deny => None,
        }
    }
}

/// Category a route falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    Auth,
    Protected,
    AdminOnly,
}

/// Route classification table. `auth` entries match exactly; `protected` and
/// `admin_only` entries match as path-segment prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTable {
    pub auth: Vec<String>,
    pub protected: Vec<String>,
    pub admin_only: Vec<String>,
}

impl RouteTable {
    /// Page routes of the web frontend.
    pub fn web() -> Self {
        Self {
            auth: vec!["/login".to_string(), "/register".to_string()],
            protected: vec!["/dashboard".to_string(), "/ambassador".to_string()],
            admin_only: vec!["/admin".to_string()],
        }
    }

    /// Routes served by the HTTP API in this crate.
    pub fn api() -> Self {
        Self {
            auth: Vec::new(),
            protected: vec![
                "/api/v1/register".to_string(),
                "/api/v1/me".to_string(),
                "/api/v1/ambassador".to_string(),
            ],
            admin_only: vec!["/api/v1/admin".to_string()],
        }
    }

    /// Admin-only is checked first so a session alone never unlocks an admin path.
    pub fn classify(&self, path: &str) -> Option<RouteClass> {
        if self
            .admin_only
            .iter()
            .any(|prefix| matches_prefix(path, prefix))
        {
            return Some(RouteClass::AdminOnly);
        }
        if self
            .protected
            .iter()
            .any(|prefix| matches_prefix(path, prefix))
        {
            return Some(RouteClass::Protected);
        }
        if self.auth.iter().any(|route| route == path) {
            return Some(RouteClass::Auth);
        }
        None
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::web()
    }
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    if prefix.ends_with('/') {
        return path.starts_with(prefix);
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Caller identity supplied per request by the session provider.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionContext {
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub role: Role,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(user_id: UserId, role: Role) -> Self {
        Self {
            user_id: Some(user_id),
            role,
        }
    }

    pub fn has_session(&self) -> bool {
        self.user_id.is_some()
    }
}

/// Access policy over a route table.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    routes: RouteTable,
}

impl AccessPolicy {
    pub fn new(routes: RouteTable) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn decide(&self, path: &str, has_session: bool, role: Role) -> AccessDecision {
        match (self.routes.classify(path), has_session) {
            (Some(RouteClass::AdminOnly | RouteClass::Protected), false) => {
                AccessDecision::RedirectToLogin
            }
            (Some(RouteClass::AdminOnly), true) if role != Role::Admin => AccessDecision::Deny,
            (Some(RouteClass::Auth), true) => AccessDecision::RedirectToDashboard,
            _ => AccessDecision::Allow,
        }
    }

    pub fn decide_for(&self, path: &str, session: &SessionContext) -> AccessDecision {
        self.decide(path, session.has_session(), session.role)
    }
}

/// Decision against the web route table.
pub fn decide(path: &str, has_session: bool, role: Role) -> AccessDecision {
    AccessPolicy::default().decide(path, has_session, role)
}
