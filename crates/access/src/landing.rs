//! Default landing routes and redirect suggestions.
//!
//! Every role has one primary landing page and an ordered fallback list.
//! A redirect is only ever suggested after the target has been run through
//! `decide` for the same context, so a denial can never bounce the user to
//! another denial. The per-role emergency routes are public pages and
//! therefore always reachable.

use campusgate_auth::{Role, SessionContext};

use crate::decision::{AccessDecision, DenialReason, decide};
use crate::route::{
    DEPENDENT_SELECTION_ROUTE, MAINTENANCE_ROUTE, ONBOARDING_ROUTE, RouteTable,
    TENANT_SELECTION_ROUTE,
};

/// The landing page a role is sent to after sign-in.
pub fn primary_route(role: Role) -> &'static str {
    match role {
        Role::SuperAdmin => "/platform",
        Role::SchoolAdmin => "/admin",
        Role::Teacher => "/teacher",
        Role::Student => "/dashboard",
        Role::Guardian => "/guardian",
    }
}

/// Ordered alternatives when the primary landing is not reachable.
pub fn fallback_routes(role: Role) -> &'static [&'static str] {
    match role {
        Role::SuperAdmin => &["/profile"],
        Role::SchoolAdmin => &["/admin/staff", "/profile"],
        Role::Teacher => &["/teacher/classes", "/profile"],
        Role::Student => &["/profile"],
        Role::Guardian => &["/guardian/children", "/profile"],
    }
}

/// Hard-coded last resort per role. These are public pages: they are never
/// evaluated, so they must never be able to deny.
pub fn emergency_route(role: Role) -> &'static str {
    match role {
        Role::SuperAdmin | Role::SchoolAdmin | Role::Teacher => "/support",
        Role::Student | Role::Guardian => "/help",
    }
}

/// The first landing candidate this context can actually open.
///
/// Walks primary-then-fallbacks, accepting only candidates that evaluate to
/// `Granted`; when none do, the emergency route is returned without
/// evaluation.
pub fn landing_route(table: &RouteTable, context: &SessionContext) -> &'static str {
    let role = context.role;
    std::iter::once(primary_route(role))
        .chain(fallback_routes(role).iter().copied())
        .find(|candidate| decide(table, candidate, context).is_granted())
        .unwrap_or_else(|| emergency_route(role))
}

/// Suggested redirect for a decision, where one helps the caller recover.
pub fn redirect_for(
    decision: &AccessDecision,
    table: &RouteTable,
    context: &SessionContext,
) -> Option<String> {
    match decision {
        AccessDecision::NeedsTenantSelection => Some(TENANT_SELECTION_ROUTE.to_string()),
        AccessDecision::NeedsDependentSelection => Some(DEPENDENT_SELECTION_ROUTE.to_string()),
        AccessDecision::NeedsOnboarding => Some(ONBOARDING_ROUTE.to_string()),
        AccessDecision::Denied(DenialReason::RoleMismatch | DenialReason::StaleSelectionRoute) => {
            Some(landing_route(table, context).to_string())
        }
        AccessDecision::Denied(DenialReason::Maintenance) => Some(MAINTENANCE_ROUTE.to_string()),
        AccessDecision::Denied(DenialReason::Internal) => {
            Some(emergency_route(context.role).to_string())
        }
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
