//! Role Router - where each role lands after authentication

use contech_core::{Role, UserRecord};

pub const BUILDER_HOME: &str = "/builder";
pub const CONTRACTOR_HOME: &str = "/contractor";
pub const SUPPLIER_HOME: &str = "/supplier";
/// Generic dashboard for users whose role is unknown
pub const GENERIC_DASHBOARD: &str = "/dashboard";
pub const LOGIN: &str = "/login";
pub const REGISTER: &str = "/register";

/// Home of a role's area
pub fn home_for(role: Role) -> &'static str {
    match role {
        Role::Builder => BUILDER_HOME,
        Role::Contractor => CONTRACTOR_HOME,
        Role::Supplier => SUPPLIER_HOME,
    }
}

/// Landing destination for a role, the generic dashboard when absent
pub fn landing_route(role: Option<Role>) -> &'static str {
    role.map(home_for).unwrap_or(GENERIC_DASHBOARD)
}

/// Same as [`landing_route`] for an untrusted wire string. Only the exact
/// role names match.
pub fn landing_route_for(role: &str) -> &'static str {
    landing_route(Role::ALL.into_iter().find(|r| r.as_str() == role))
}

/// Destination after a sign-in or sign-up. An absent user falls back to the
/// generic dashboard.
pub fn post_auth_route(user: Option<&UserRecord>) -> &'static str {
    landing_route(user.map(UserRecord::role))
}

/// Strip query, fragment and trailing slashes from a location
pub fn normalize_path(location: &str) -> &str {
    let end = location.find(['?', '#']).unwrap_or(location.len());
    let path = location[..end].trim_end_matches('/');
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

/// Role-gated area a location belongs to, if any
pub fn area_for(location: &str) -> Option<Role> {
    let path = normalize_path(location);
    Role::ALL.into_iter().find(|role| {
        let home = home_for(*role);
        path == home || path.strip_prefix(home).is_some_and(|rest| rest.starts_with('/'))
    })
}
