use thiserror::Error;

use campusgate_auth::{IdentityClaims, Role, SessionContext};
use campusgate_core::{TenantId, UserId};

use crate::directory::Directory;
use crate::tenant::Tenant;

/// Context resolution failure.
///
/// Both variants are denials, not internal faults; the gate maps them onto
/// audited outcomes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The active tenant does not exist or is not in `Active` status.
    #[error("tenant {0} is unknown or inactive")]
    TenantInactive(TenantId),

    /// The active tenant is not in the claims' authorized set.
    #[error("user {user} is not a member of tenant {tenant}")]
    IsolationViolation { user: UserId, tenant: TenantId },
}

/// Builds a `SessionContext` from verified claims plus directory lookups.
pub struct ContextResolver<D> {
    directory: D,
}

impl<D: Directory> ContextResolver<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Schools the user can select right now.
    ///
    /// Backed by live memberships rather than the claims snapshot, so a
    /// grant added or a school suspended after sign-in shows up here
    /// immediately. Only active schools are offered.
    pub fn available_tenants(&self, user_id: UserId) -> Vec<Tenant> {
        self.directory
            .memberships(user_id)
            .into_iter()
            .filter_map(|m| self.directory.tenant(m.tenant_id))
            .filter(|t| t.status.is_active())
            .collect()
    }

    /// Resolve verified claims into a request context.
    ///
    /// Platform operators bypass tenant scoping entirely. For everyone else
    /// the active tenant is re-validated against the directory on every
    /// call: status is read fresh, then membership is confirmed against the
    /// authorized set in the claims.
    pub fn resolve(&self, claims: &IdentityClaims) -> Result<SessionContext, ResolveError> {
        if claims.role == Role::SuperAdmin {
            return Ok(SessionContext {
                user_id: claims.sub,
                role: claims.role,
                tenant_ids: claims.tenant_ids.clone(),
                active_tenant_id: claims.active_tenant_id,
                active_dependent_id: None,
                dependents: Vec::new(),
                permissions: claims.permissions.clone(),
                onboarding_complete: true,
                needs_tenant_selection: false,
                needs_dependent_selection: false,
            });
        }

        let Some(active) = claims.active_tenant_id else {
            // Nothing tenant-scoped can be resolved until a tenant is chosen.
            return Ok(SessionContext {
                user_id: claims.sub,
                role: claims.role,
                tenant_ids: claims.tenant_ids.clone(),
                active_tenant_id: None,
                active_dependent_id: None,
                dependents: Vec::new(),
                permissions: claims.permissions.clone(),
                onboarding_complete: false,
                needs_tenant_selection: claims.role.requires_tenant(),
                needs_dependent_selection: false,
            });
        };

        match self.directory.tenant(active) {
            Some(tenant) if tenant.status.is_active() => {}
            _ => return Err(ResolveError::TenantInactive(active)),
        }

        if !claims.tenant_ids.contains(&active) {
            return Err(ResolveError::IsolationViolation {
                user: claims.sub,
                tenant: active,
            });
        }

        let dependents = if claims.role.supports_dependents() {
            self.directory.dependents(claims.sub, active)
        } else {
            Vec::new()
        };

        // An active dependent no longer in the available set is dropped
        // rather than trusted: the claim is stale directory state, not
        // authority.
        let mut active_dependent = claims
            .active_dependent_id
            .filter(|id| dependents.iter().any(|d| d.id == *id));

        // A lone dependent is selected automatically; selection is only
        // demanded when there is an actual choice.
        if active_dependent.is_none() && dependents.len() == 1 {
            active_dependent = Some(dependents[0].id);
        }

        let needs_dependent_selection = claims.role.supports_dependents()
            && active_dependent.is_none()
            && dependents.len() > 1;

        Ok(SessionContext {
            user_id: claims.sub,
            role: claims.role,
            tenant_ids: claims.tenant_ids.clone(),
            active_tenant_id: Some(active),
            active_dependent_id: active_dependent,
            dependents,
            permissions: claims.permissions.clone(),
            onboarding_complete: self.directory.onboarding_complete(claims.sub, active),
            needs_tenant_selection: false,
            needs_dependent_selection,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::tenant::{Tenant, TenantStatus};
    use campusgate_auth::{DependentRef, Permission};
    use campusgate_core::DependentId;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    fn claims_for(role: Role, tenant_ids: Vec<TenantId>) -> IdentityClaims {
        IdentityClaims::new(
            UserId::new(),
            role,
            tenant_ids,
            vec![Permission::new("students.read")],
            Utc::now(),
            Duration::minutes(30),
        )
    }

    fn dependent(name: &str) -> DependentRef {
        DependentRef {
            id: DependentId::new(),
            display_name: name.to_string(),
        }
    }

    fn active_school(directory: &InMemoryDirectory) -> TenantId {
        let id = TenantId::new();
        directory.upsert_tenant(Tenant::new(id, "Northside High"));
        id
    }

    #[test]
    fn super_admin_bypasses_directory_entirely() {
        let directory = InMemoryDirectory::new();
        let school = TenantId::new();
        directory.upsert_tenant(Tenant::new(school, "Closed").with_status(TenantStatus::Archived));

        let resolver = ContextResolver::new(directory);
        let claims = claims_for(Role::SuperAdmin, vec![]).with_active_tenant(school);

        let ctx = resolver.resolve(&claims).unwrap();
        assert_eq!(ctx.active_tenant_id, Some(school));
        assert!(!ctx.needs_tenant_selection);
        assert!(ctx.onboarding_complete);
    }

    #[test]
    fn missing_tenant_selection_is_flagged_not_failed() {
        let resolver = ContextResolver::new(InMemoryDirectory::new());
        let claims = claims_for(Role::Teacher, vec![TenantId::new(), TenantId::new()]);

        let ctx = resolver.resolve(&claims).unwrap();
        assert!(ctx.needs_tenant_selection);
        assert_eq!(ctx.active_tenant_id, None);
        assert!(!ctx.onboarding_complete);
    }

    #[test]
    fn unknown_tenant_is_inactive() {
        let resolver = ContextResolver::new(InMemoryDirectory::new());
        let ghost = TenantId::new();
        let claims = claims_for(Role::Student, vec![ghost]).with_active_tenant(ghost);

        assert_eq!(
            resolver.resolve(&claims),
            Err(ResolveError::TenantInactive(ghost))
        );
    }

    #[test]
    fn suspension_takes_effect_mid_session() {
        let directory = Arc::new(InMemoryDirectory::new());
        let school = active_school(&directory);
        let resolver = ContextResolver::new(Arc::clone(&directory));

        let claims = claims_for(Role::Teacher, vec![school]).with_active_tenant(school);
        assert!(resolver.resolve(&claims).is_ok());

        directory
            .upsert_tenant(Tenant::new(school, "Northside High").with_status(TenantStatus::Suspended));

        assert_eq!(
            resolver.resolve(&claims),
            Err(ResolveError::TenantInactive(school))
        );
    }

    #[test]
    fn non_member_is_an_isolation_violation() {
        let directory = InMemoryDirectory::new();
        let school = active_school(&directory);
        let resolver = ContextResolver::new(directory);

        let claims = claims_for(Role::Teacher, vec![TenantId::new()]).with_active_tenant(school);
        let err = resolver.resolve(&claims).unwrap_err();

        assert_eq!(
            err,
            ResolveError::IsolationViolation {
                user: claims.sub,
                tenant: school,
            }
        );
    }

    #[test]
    fn lone_dependent_is_selected_automatically() {
        let directory = InMemoryDirectory::new();
        let school = active_school(&directory);
        let claims = claims_for(Role::Guardian, vec![school]).with_active_tenant(school);

        let only = dependent("Maya");
        directory.set_dependents(claims.sub, school, vec![only.clone()]);

        let ctx = ContextResolver::new(directory).resolve(&claims).unwrap();
        assert_eq!(ctx.active_dependent_id, Some(only.id));
        assert!(!ctx.needs_dependent_selection);
    }

    #[test]
    fn multiple_dependents_require_a_choice() {
        let directory = InMemoryDirectory::new();
        let school = active_school(&directory);
        let claims = claims_for(Role::Guardian, vec![school]).with_active_tenant(school);

        directory.set_dependents(claims.sub, school, vec![dependent("Maya"), dependent("Arjun")]);

        let ctx = ContextResolver::new(directory).resolve(&claims).unwrap();
        assert_eq!(ctx.active_dependent_id, None);
        assert!(ctx.needs_dependent_selection);
        assert_eq!(ctx.dependents.len(), 2);
    }

    #[test]
    fn stale_dependent_claim_is_dropped() {
        let directory = InMemoryDirectory::new();
        let school = active_school(&directory);
        let gone = DependentId::new();
        let claims = claims_for(Role::Guardian, vec![school])
            .with_active_tenant(school)
            .with_active_dependent(gone);

        directory.set_dependents(claims.sub, school, vec![dependent("Maya"), dependent("Arjun")]);

        let ctx = ContextResolver::new(directory).resolve(&claims).unwrap();
        assert_eq!(ctx.active_dependent_id, None);
        assert!(ctx.needs_dependent_selection);
    }

    #[test]
    fn guardian_with_no_dependents_is_not_asked_to_choose() {
        let directory = InMemoryDirectory::new();
        let school = active_school(&directory);
        let claims = claims_for(Role::Guardian, vec![school]).with_active_tenant(school);

        let ctx = ContextResolver::new(directory).resolve(&claims).unwrap();
        assert_eq!(ctx.active_dependent_id, None);
        assert!(!ctx.needs_dependent_selection);
        assert!(ctx.dependents.is_empty());
    }

    #[test]
    fn non_guardian_roles_carry_no_dependents() {
        let directory = InMemoryDirectory::new();
        let school = active_school(&directory);
        let claims = claims_for(Role::Student, vec![school]).with_active_tenant(school);

        // Even if the directory has records under this key, they are for
        // someone else's role semantics; a student never acts through one.
        directory.set_dependents(claims.sub, school, vec![dependent("Maya")]);

        let ctx = ContextResolver::new(directory).resolve(&claims).unwrap();
        assert!(ctx.dependents.is_empty());
        assert_eq!(ctx.active_dependent_id, None);
    }

    #[test]
    fn onboarding_flag_is_read_per_tenant() {
        let directory = InMemoryDirectory::new();
        let school = active_school(&directory);
        let claims = claims_for(Role::Student, vec![school]).with_active_tenant(school);

        let resolver = ContextResolver::new(directory);
        assert!(!resolver.resolve(&claims).unwrap().onboarding_complete);

        resolver.directory().set_onboarded(claims.sub, school, true);
        assert!(resolver.resolve(&claims).unwrap().onboarding_complete);
    }

    #[test]
    fn selection_offers_only_active_memberships() {
        let directory = InMemoryDirectory::new();
        let user = UserId::new();

        let open = active_school(&directory);
        let closed = TenantId::new();
        directory
            .upsert_tenant(Tenant::new(closed, "Shut Down").with_status(TenantStatus::Suspended));
        let orphaned = TenantId::new();

        directory.add_membership(user, open, Role::Teacher);
        directory.add_membership(user, closed, Role::Teacher);
        // A grant pointing at a school the directory no longer knows.
        directory.add_membership(user, orphaned, Role::Teacher);

        let options = ContextResolver::new(directory).available_tenants(user);
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].id, open);
    }

    #[test]
    fn duplicate_grants_are_not_stacked() {
        let directory = InMemoryDirectory::new();
        let user = UserId::new();
        let school = active_school(&directory);

        directory.add_membership(user, school, Role::Teacher);
        directory.add_membership(user, school, Role::Teacher);

        assert_eq!(directory.memberships(user).len(), 1);
    }
}
