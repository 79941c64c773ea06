//! Route tables the policy evaluates against.
//!
//! Each business type owns an exclusive path prefix (`/retail`, `/fnb`, ...).
//! Pre-partitioning paths are translated through a legacy table; a fixed set
//! of global routes and public order-taking prefixes is exempt from
//! partitioning.

use std::collections::HashMap;

use posgate_auth::Role;
use posgate_tenancy::BusinessType;

/// Extra global routes, comma separated.
pub const GLOBAL_ROUTES_ENV: &str = "POSGATE_GLOBAL_ROUTES";
/// Extra public order-taking prefixes, comma separated.
pub const PUBLIC_ORDER_PREFIXES_ENV: &str = "POSGATE_PUBLIC_ORDER_PREFIXES";

/// Fixed destinations used by the policy.
pub mod paths {
    pub const AUTH: &str = "/auth";
    pub const ADMIN: &str = "/admin";
    pub const ONBOARDING: &str = "/onboarding";
    pub const ACCOUNT_SUSPENDED: &str = "/account-suspended";
    pub const SUBSCRIPTION_REQUIRED: &str = "/subscription-required";
    pub const ACCESS_DENIED: &str = "/access-denied";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    legacy_routes: Vec<(String, String)>,
    global_routes: Vec<String>,
    public_order_prefixes: Vec<String>,
    cashier_routes: HashMap<BusinessType, Vec<String>>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let legacy_routes = [
            ("/dashboard", "/retail/dashboard"),
            ("/pos", "/retail/pos"),
            ("/products", "/retail/products"),
            ("/inventory", "/retail/inventory"),
            ("/customers", "/retail/customers"),
            ("/sales", "/retail/sales"),
            ("/reports", "/retail/reports"),
            ("/menu", "/fnb/menu"),
            ("/tables", "/fnb/tables"),
            ("/kitchen", "/fnb/kitchen"),
            ("/appointments", "/service/appointments"),
            ("/bookings", "/venue/bookings"),
        ]
        .into_iter()
        .map(|(old, new)| (old.to_string(), new.to_string()))
        .collect();

        let global_routes = [
            "/settings",
            "/profile",
            "/billing",
            "/help",
            "/notifications",
            paths::ACCOUNT_SUSPENDED,
            paths::SUBSCRIPTION_REQUIRED,
            paths::ACCESS_DENIED,
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        let cashier_routes = BusinessType::ALL
            .into_iter()
            .map(|bt| {
                let sections: &[&str] = match bt {
                    BusinessType::Retail | BusinessType::Service => &["pos", "products"],
                    BusinessType::Fnb => &["pos", "menu", "products"],
                    BusinessType::Venue => &["pos", "menu"],
                };
                let routes = sections
                    .iter()
                    .map(|s| format!("{}/{}", route_prefix(bt), s))
                    .collect();
                (bt, routes)
            })
            .collect();

        Self {
            legacy_routes,
            global_routes,
            public_order_prefixes: vec!["/order".to_string(), "/public".to_string()],
            cashier_routes,
        }
    }
}

impl PolicyConfig {
    /// Defaults plus any extras from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        for route in env_paths(GLOBAL_ROUTES_ENV) {
            config = config.with_global_route(route);
        }
        for prefix in env_paths(PUBLIC_ORDER_PREFIXES_ENV) {
            config = config.with_public_prefix(prefix);
        }
        config
    }

    pub fn with_global_route(mut self, route: impl Into<String>) -> Self {
        let route = normalize_path(&route.into());
        if !self.global_routes.contains(&route) {
            self.global_routes.push(route);
        }
        self
    }

    pub fn with_public_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = normalize_path(&prefix.into());
        if !self.public_order_prefixes.contains(&prefix) {
            self.public_order_prefixes.push(prefix);
        }
        self
    }

    /// Add or replace a legacy old→new mapping.
    pub fn with_legacy_route(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        let old = normalize_path(&old.into());
        let new = normalize_path(&new.into());
        self.legacy_routes.retain(|(o, _)| *o != old);
        self.legacy_routes.push((old, new));
        self
    }

    /// Whether `path` is exempt from business-type partitioning.
    pub fn is_partition_exempt(&self, path: &str) -> bool {
        self.global_routes.iter().any(|r| path_within(path, r))
            || self.public_order_prefixes.iter().any(|p| path_within(path, p))
    }

    /// Translate a legacy un-prefixed path; other paths are returned as is.
    pub fn translate_legacy(&self, path: &str) -> String {
        for (old, new) in &self.legacy_routes {
            if path_within(path, old) {
                return format!("{}{}", new, &path[old.len()..]);
            }
        }
        path.to_string()
    }

    pub fn cashier_may_visit(&self, business_type: BusinessType, path: &str) -> bool {
        self.cashier_routes
            .get(&business_type)
            .is_some_and(|routes| routes.iter().any(|r| path_within(path, r)))
    }

    pub fn route_prefix(&self, business_type: BusinessType) -> String {
        route_prefix(business_type)
    }

    pub fn landing_route(&self, business_type: BusinessType) -> String {
        format!("{}/dashboard", route_prefix(business_type))
    }

    pub fn cashier_default_route(&self, business_type: BusinessType) -> String {
        format!("{}/pos", route_prefix(business_type))
    }

    /// Where a role lands when bounced from a page it may not see.
    pub fn role_default_route(&self, role: Role, business_type: BusinessType) -> String {
        match role {
            Role::Cashier => self.cashier_default_route(business_type),
            Role::Admin | Role::Owner => self.landing_route(business_type),
        }
    }
}

fn route_prefix(business_type: BusinessType) -> String {
    format!("/{}", business_type.as_str())
}

fn env_paths(var: &str) -> Vec<String> {
    let Ok(raw) = std::env::var(var) else {
        return Vec::new();
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            if s.starts_with('/') {
                Some(s.to_string())
            } else {
                tracing::warn!(var, entry = s, "ignoring route that does not start with '/'");
                None
            }
        })
        .collect()
}

/// Strip query and fragment, collapse trailing slashes, ensure a leading `/`.
pub fn normalize_path(path: &str) -> String {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let trimmed = path[..end].trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// The query and fragment of `path`, `""` when it has neither.
pub fn query_suffix(path: &str) -> &str {
    path.find(['?', '#']).map_or("", |start| &path[start..])
}

/// Segment-aware prefix match: `/retail` covers `/retail/pos` but not `/retailer`.
pub fn path_within(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize() {
        assert_eq!(normalize_path("/retail/pos/"), "/retail/pos");
        assert_eq!(normalize_path("/reports?range=7d"), "/reports");
        assert_eq!(normalize_path("fnb/menu#top"), "/fnb/menu");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("///"), "/");
    }

    #[test]
    fn query_suffix_keeps_query_and_fragment() {
        assert_eq!(query_suffix("/products?sku=9"), "?sku=9");
        assert_eq!(query_suffix("/menu#drinks"), "#drinks");
        assert_eq!(query_suffix("/pos"), "");
    }

    #[test]
    fn prefix_matching_respects_segments() {
        assert!(path_within("/retail", "/retail"));
        assert!(path_within("/retail/pos", "/retail"));
        assert!(!path_within("/retailer", "/retail"));
        assert!(!path_within("/fnb", "/retail"));
    }

    #[test]
    fn legacy_paths_translate_with_suffix() {
        let config = PolicyConfig::default();
        assert_eq!(config.translate_legacy("/pos"), "/retail/pos");
        assert_eq!(config.translate_legacy("/products/42"), "/retail/products/42");
        assert_eq!(config.translate_legacy("/menu"), "/fnb/menu");
        assert_eq!(config.translate_legacy("/fnb/menu"), "/fnb/menu");
        assert_eq!(config.translate_legacy("/possum"), "/possum");
    }

    #[test]
    fn exemptions() {
        let config = PolicyConfig::default();
        assert!(config.is_partition_exempt("/settings"));
        assert!(config.is_partition_exempt("/settings/staff"));
        assert!(config.is_partition_exempt("/order/abc123"));
        assert!(!config.is_partition_exempt("/reports"));

        let config = config.with_global_route("/changelog/");
        assert!(config.is_partition_exempt("/changelog"));
    }

    #[test]
    fn cashier_allow_lists_per_business_type() {
        let config = PolicyConfig::default();
        assert!(config.cashier_may_visit(BusinessType::Retail, "/retail/pos"));
        assert!(config.cashier_may_visit(BusinessType::Retail, "/retail/products/9"));
        assert!(!config.cashier_may_visit(BusinessType::Retail, "/retail/menu"));
        assert!(config.cashier_may_visit(BusinessType::Fnb, "/fnb/menu"));
        assert!(!config.cashier_may_visit(BusinessType::Venue, "/venue/products"));
        assert!(!config.cashier_may_visit(BusinessType::Retail, "/fnb/pos"));
    }

    #[test]
    fn landing_routes() {
        let config = PolicyConfig::default();
        assert_eq!(config.landing_route(BusinessType::Fnb), "/fnb/dashboard");
        assert_eq!(config.role_default_route(Role::Cashier, BusinessType::Retail), "/retail/pos");
        assert_eq!(config.role_default_route(Role::Admin, BusinessType::Venue), "/venue/dashboard");
    }

    #[test]
    fn legacy_override_replaces_mapping() {
        let config = PolicyConfig::default().with_legacy_route("/pos", "/fnb/pos");
        assert_eq!(config.translate_legacy("/pos"), "/fnb/pos");
    }

    #[test]
    fn from_env_appends_valid_entries_and_skips_the_rest() {
        // SAFETY: the only test in this binary that touches these variables.
        unsafe {
            std::env::set_var(GLOBAL_ROUTES_ENV, "/whats-new, promo ,/loyalty/,");
            std::env::set_var(PUBLIC_ORDER_PREFIXES_ENV, "/kiosk");
        }
        let config = PolicyConfig::from_env();
        unsafe {
            std::env::remove_var(GLOBAL_ROUTES_ENV);
            std::env::remove_var(PUBLIC_ORDER_PREFIXES_ENV);
        }

        assert!(config.is_partition_exempt("/whats-new"));
        assert!(config.is_partition_exempt("/loyalty/points"));
        assert!(config.is_partition_exempt("/kiosk/12"));
        assert!(!config.is_partition_exempt("/promo"));
        // Defaults survive.
        assert!(config.is_partition_exempt("/settings"));
        assert!(config.is_partition_exempt("/order/abc"));
    }
}
