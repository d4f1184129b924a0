use serde::{Deserialize, Serialize};

use campusgate_core::{DependentId, TenantId, UserId};

use crate::{Permission, Role};

/// A dependent available for selection within the active tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependentRef {
    pub id: DependentId,
    pub display_name: String,
}

/// Fully resolved request context: who is acting, where, and as whom.
///
/// Built by the resolver from verified claims plus directory lookups. The
/// decision engine treats this as read-only input; it is never persisted
/// and never outlives the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    pub user_id: UserId,
    pub role: Role,

    /// Every tenant the user may act within (from claims).
    pub tenant_ids: Vec<TenantId>,
    pub active_tenant_id: Option<TenantId>,
    pub active_dependent_id: Option<DependentId>,

    /// Dependents selectable in the active tenant (guardians only).
    pub dependents: Vec<DependentRef>,
    pub permissions: Vec<Permission>,
    pub onboarding_complete: bool,

    /// The role needs a tenant and none is active.
    pub needs_tenant_selection: bool,
    /// More than one dependent is available and none is active.
    pub needs_dependent_selection: bool,
}

impl SessionContext {
    /// Membership check honoring the platform-operator bypass.
    pub fn is_member_of(&self, tenant_id: TenantId) -> bool {
        self.role == Role::SuperAdmin || self.tenant_ids.contains(&tenant_id)
    }

    /// Wildcard-aware permission check.
    pub fn has_permission(&self, required: &Permission) -> bool {
        self.permissions.iter().any(|p| p.grants(required))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(role: Role, tenant_ids: Vec<TenantId>, permissions: Vec<Permission>) -> SessionContext {
        SessionContext {
            user_id: UserId::new(),
            role,
            tenant_ids,
            active_tenant_id: None,
            active_dependent_id: None,
            dependents: Vec::new(),
            permissions,
            onboarding_complete: true,
            needs_tenant_selection: false,
            needs_dependent_selection: false,
        }
    }

    #[test]
    fn membership_is_limited_to_authorized_tenants() {
        let home = TenantId::new();
        let ctx = context(Role::Teacher, vec![home], vec![]);

        assert!(ctx.is_member_of(home));
        assert!(!ctx.is_member_of(TenantId::new()));
    }

    #[test]
    fn super_admin_is_member_everywhere() {
        let ctx = context(Role::SuperAdmin, vec![], vec![]);
        assert!(ctx.is_member_of(TenantId::new()));
    }

    #[test]
    fn wildcard_satisfies_any_permission() {
        let ctx = context(Role::SchoolAdmin, vec![], vec![Permission::wildcard()]);
        assert!(ctx.has_permission(&Permission::new("payments.refund")));
    }

    #[test]
    fn missing_permission_is_not_granted() {
        let ctx = context(
            Role::Teacher,
            vec![],
            vec![Permission::new("students.read")],
        );
        assert!(ctx.has_permission(&Permission::new("students.read")));
        assert!(!ctx.has_permission(&Permission::new("students.write")));
    }
}
