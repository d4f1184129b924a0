//! The route-access decision.
//!
//! `decide` is a pure function of the route table and a resolved context.
//! Its checks run in a fixed priority order, and that order is part of the
//! contract: a user who needs both a school selection and onboarding must
//! land on school selection, so the tenant check always comes first.
//!
//! Evaluation order:
//!
//! ```text
//! public pattern        → Public
//! selection pattern     → Granted when that step is actually needed,
//!                         otherwise Denied(StaleSelectionRoute)
//! unmatched pattern     → Denied(Internal)  (never fail open)
//! platform operator     → Granted
//! role allowlist        → Denied(RoleMismatch)
//! tenant required       → NeedsTenantSelection
//! dependent required    → NeedsDependentSelection
//! onboarding required   → NeedsOnboarding
//! permission required   → Denied(InsufficientPermission)
//! otherwise             → Granted
//! ```

use std::fmt;

use serde::Serialize;

use campusgate_auth::{Role, SessionContext, TokenError};

use crate::route::{RouteClass, RouteRule, RouteTable, SelectionStep};

/// Why a caller is unauthenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnauthenticatedKind {
    /// No token was presented at all.
    Missing,
    /// Malformed token or bad signature.
    Invalid,
    /// Past its expiry; a refresh may fix it.
    Expired,
    /// On the revocation list.
    Revoked,
}

impl UnauthenticatedKind {
    pub fn from_error(error: &TokenError) -> Self {
        match error {
            TokenError::Expired => UnauthenticatedKind::Expired,
            TokenError::Revoked => UnauthenticatedKind::Revoked,
            TokenError::Invalid | TokenError::Issue(_) => UnauthenticatedKind::Invalid,
        }
    }
}

/// Why access was refused.
///
/// Reasons map onto HTTP classes for the transport layer that hosts this
/// engine: `Unauthenticated` is the 401 class, `RateLimited` and `Blocked`
/// are 429, `Internal` is 500, everything else is 403. `Internal` never
/// carries detail past this boundary; the caller gets the role's emergency
/// route and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    Unauthenticated(UnauthenticatedKind),
    /// A selection page was visited by a context that does not need it.
    StaleSelectionRoute,
    RoleMismatch,
    InsufficientPermission,
    /// The caller's active school is suspended or archived.
    TenantInactive,
    /// Cross-tenant access attempt. Audited at critical severity.
    TenantIsolation,
    RateLimited,
    Blocked,
    Maintenance,
    /// Internal fault; the engine fails closed rather than guessing.
    Internal,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DenialReason::Unauthenticated(UnauthenticatedKind::Missing) => "no token presented",
            DenialReason::Unauthenticated(UnauthenticatedKind::Invalid) => "token invalid",
            DenialReason::Unauthenticated(UnauthenticatedKind::Expired) => "token expired",
            DenialReason::Unauthenticated(UnauthenticatedKind::Revoked) => "token revoked",
            DenialReason::StaleSelectionRoute => "selection page no longer applies",
            DenialReason::RoleMismatch => "role not allowed for route",
            DenialReason::InsufficientPermission => "missing required permission",
            DenialReason::TenantInactive => "school is not active",
            DenialReason::TenantIsolation => "cross-tenant access refused",
            DenialReason::RateLimited => "rate limit exceeded",
            DenialReason::Blocked => "identifier is blocked",
            DenialReason::Maintenance => "platform is in maintenance",
            DenialReason::Internal => "access check failed",
        };
        f.write_str(text)
    }
}

/// Outcome of the route-access state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    /// No credential needed for this route.
    Public,
    NeedsTenantSelection,
    NeedsDependentSelection,
    NeedsOnboarding,
    Granted,
    Denied(DenialReason),
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted)
    }
}

/// Evaluate route access for a resolved context.
pub fn decide(table: &RouteTable, path: &str, context: &SessionContext) -> AccessDecision {
    match table.classify(path) {
        // 1) Public routes win over everything, even for signed-in users.
        RouteClass::Public => AccessDecision::Public,

        // 2) Selection pages are only for contexts that need that step.
        RouteClass::Selection(step) => {
            if selection_needed(step, context) {
                AccessDecision::Granted
            } else {
                AccessDecision::Denied(DenialReason::StaleSelectionRoute)
            }
        }

        // A path nothing claims is an internal fault, not an open door.
        RouteClass::Unknown => AccessDecision::Denied(DenialReason::Internal),

        RouteClass::Protected(rule) => decide_protected(&rule, context),
    }
}

fn selection_needed(step: SelectionStep, context: &SessionContext) -> bool {
    match step {
        SelectionStep::School => context.needs_tenant_selection,
        SelectionStep::Child => context.needs_dependent_selection,
        // Onboarding status is per tenant, so it cannot be "needed" until a
        // tenant is active; the tenant-selection step outranks it.
        SelectionStep::Onboarding => {
            context.active_tenant_id.is_some() && !context.onboarding_complete
        }
    }
}

fn decide_protected(rule: &RouteRule, context: &SessionContext) -> AccessDecision {
    // 3) Platform operators bypass every per-route requirement.
    if context.role == Role::SuperAdmin {
        return AccessDecision::Granted;
    }

    // 4) Role allowlist.
    if !rule.allowed_roles.contains(&context.role) {
        return AccessDecision::Denied(DenialReason::RoleMismatch);
    }

    // 5) Tenant context before anything tenant-scoped.
    if rule.requires_tenant && context.active_tenant_id.is_none() {
        return AccessDecision::NeedsTenantSelection;
    }

    // 6) Dependent sub-context.
    if rule.requires_dependent && context.active_dependent_id.is_none() {
        return AccessDecision::NeedsDependentSelection;
    }

    // 7) Onboarding.
    if rule.requires_onboarding && !context.onboarding_complete {
        return AccessDecision::NeedsOnboarding;
    }

    // 8) Fine-grained permission.
    if let Some(required) = &rule.required_permission {
        if !context.has_permission(required) {
            return AccessDecision::Denied(DenialReason::InsufficientPermission);
        }
    }

    // 9) Nothing left to demand.
    AccessDecision::Granted
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::RouteRule;
    use campusgate_auth::Permission;
    use campusgate_core::{DependentId, TenantId, UserId};

    fn context(role: Role) -> SessionContext {
        let tenant = TenantId::new();
        SessionContext {
            user_id: UserId::new(),
            role,
            tenant_ids: vec![tenant],
            active_tenant_id: Some(tenant),
            active_dependent_id: None,
            dependents: Vec::new(),
            permissions: Vec::new(),
            onboarding_complete: true,
            needs_tenant_selection: false,
            needs_dependent_selection: false,
        }
    }

    fn table() -> RouteTable {
        RouteTable::default_platform()
    }

    #[test]
    fn public_routes_outrank_everything() {
        // Even a platform operator lands in Public, not Granted.
        assert_eq!(
            decide(&table(), "/login", &context(Role::SuperAdmin)),
            AccessDecision::Public
        );
    }

    #[test]
    fn selection_page_is_granted_only_while_needed() {
        let mut ctx = context(Role::SchoolAdmin);
        ctx.active_tenant_id = None;
        ctx.needs_tenant_selection = true;

        assert_eq!(
            decide(&table(), "/select-school", &ctx),
            AccessDecision::Granted
        );

        let settled = context(Role::SchoolAdmin);
        assert_eq!(
            decide(&table(), "/select-school", &settled),
            AccessDecision::Denied(DenialReason::StaleSelectionRoute)
        );
    }

    #[test]
    fn onboarding_page_needs_an_active_tenant_first() {
        let mut ctx = context(Role::SchoolAdmin);
        ctx.active_tenant_id = None;
        ctx.needs_tenant_selection = true;
        ctx.onboarding_complete = false;

        // Without a school there is nothing to onboard into.
        assert_eq!(
            decide(&table(), "/onboarding", &ctx),
            AccessDecision::Denied(DenialReason::StaleSelectionRoute)
        );
    }

    #[test]
    fn platform_operator_is_granted_any_protected_route() {
        let mut ctx = context(Role::SuperAdmin);
        ctx.active_tenant_id = None;
        ctx.tenant_ids = Vec::new();

        assert_eq!(decide(&table(), "/admin", &ctx), AccessDecision::Granted);
        assert_eq!(
            decide(&table(), "/guardian/child/x1/grades", &ctx),
            AccessDecision::Granted
        );
    }

    #[test]
    fn role_allowlist_is_enforced() {
        assert_eq!(
            decide(&table(), "/admin", &context(Role::Student)),
            AccessDecision::Denied(DenialReason::RoleMismatch)
        );
    }

    #[test]
    fn tenant_selection_outranks_every_later_step() {
        let mut table = RouteTable::new();
        table.add_rule(
            RouteRule::new("/everything", [Role::Guardian])
                .needs_dependent()
                .needs_onboarding()
                .needs_permission("grades.read"),
        );

        let mut ctx = context(Role::Guardian);
        ctx.active_tenant_id = None;
        ctx.needs_tenant_selection = true;
        ctx.onboarding_complete = false;

        assert_eq!(
            decide(&table, "/everything", &ctx),
            AccessDecision::NeedsTenantSelection
        );
    }

    #[test]
    fn dependent_selection_outranks_onboarding() {
        let mut table = RouteTable::new();
        table.add_rule(
            RouteRule::new("/child-page", [Role::Guardian])
                .needs_dependent()
                .needs_onboarding(),
        );

        let mut ctx = context(Role::Guardian);
        ctx.onboarding_complete = false;
        ctx.needs_dependent_selection = true;

        assert_eq!(
            decide(&table, "/child-page", &ctx),
            AccessDecision::NeedsDependentSelection
        );
    }

    #[test]
    fn dependent_route_with_selected_child_is_granted() {
        let mut ctx = context(Role::Guardian);
        ctx.active_dependent_id = Some(DependentId::new());

        assert_eq!(
            decide(&table(), "/guardian/child/abc/grades", &ctx),
            AccessDecision::Granted
        );
    }

    #[test]
    fn permission_gate_honors_the_wildcard() {
        let mut ctx = context(Role::SchoolAdmin);
        assert_eq!(
            decide(&table(), "/admin/settings", &ctx),
            AccessDecision::Denied(DenialReason::InsufficientPermission)
        );

        ctx.permissions = vec![Permission::wildcard()];
        assert_eq!(
            decide(&table(), "/admin/settings", &ctx),
            AccessDecision::Granted
        );

        ctx.permissions = vec![Permission::new("school.settings.manage")];
        assert_eq!(
            decide(&table(), "/admin/settings", &ctx),
            AccessDecision::Granted
        );
    }

    #[test]
    fn unknown_routes_fail_closed() {
        assert_eq!(
            decide(&table(), "/definitely-not-a-page", &context(Role::SuperAdmin)),
            AccessDecision::Denied(DenialReason::Internal)
        );
    }
}
