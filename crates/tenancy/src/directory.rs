//! Directory lookups backing context resolution.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use campusgate_auth::{DependentRef, Role};
use campusgate_core::{TenantId, UserId};

use crate::tenant::Tenant;

/// A live grant tying a user to a school.
///
/// Claims snapshot this set at sign-in; the directory stays the record of
/// truth, so selection flows list memberships fresh instead of trusting
/// the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub tenant_id: TenantId,
    pub role: Role,
}

/// Read-side directory the resolver consults on every request.
///
/// Implementations are expected to answer from fresh data: a tenant
/// suspension must take effect on the member's next request, not their
/// next login.
pub trait Directory: Send + Sync {
    fn tenant(&self, tenant_id: TenantId) -> Option<Tenant>;

    /// Every school the user currently holds a grant for.
    fn memberships(&self, user_id: UserId) -> Vec<Membership>;

    /// Dependents the user may act for within a tenant.
    fn dependents(&self, user_id: UserId, tenant_id: TenantId) -> Vec<DependentRef>;

    /// Whether the user has completed onboarding for the tenant.
    fn onboarding_complete(&self, user_id: UserId, tenant_id: TenantId) -> bool;
}

impl<D> Directory for Arc<D>
where
    D: Directory + ?Sized,
{
    fn tenant(&self, tenant_id: TenantId) -> Option<Tenant> {
        (**self).tenant(tenant_id)
    }

    fn memberships(&self, user_id: UserId) -> Vec<Membership> {
        (**self).memberships(user_id)
    }

    fn dependents(&self, user_id: UserId, tenant_id: TenantId) -> Vec<DependentRef> {
        (**self).dependents(user_id, tenant_id)
    }

    fn onboarding_complete(&self, user_id: UserId, tenant_id: TenantId) -> bool {
        (**self).onboarding_complete(user_id, tenant_id)
    }
}

/// In-memory directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    tenants: RwLock<HashMap<TenantId, Tenant>>,
    memberships: RwLock<HashMap<UserId, Vec<Membership>>>,
    dependents: RwLock<HashMap<(UserId, TenantId), Vec<DependentRef>>>,
    onboarded: RwLock<HashSet<(UserId, TenantId)>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_tenant(&self, tenant: Tenant) {
        if let Ok(mut tenants) = self.tenants.write() {
            tenants.insert(tenant.id, tenant);
        }
    }

    pub fn add_membership(&self, user_id: UserId, tenant_id: TenantId, role: Role) {
        if let Ok(mut map) = self.memberships.write() {
            let grants = map.entry(user_id).or_default();
            if !grants.iter().any(|m| m.tenant_id == tenant_id) {
                grants.push(Membership { tenant_id, role });
            }
        }
    }

    pub fn set_dependents(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
        dependents: Vec<DependentRef>,
    ) {
        if let Ok(mut map) = self.dependents.write() {
            map.insert((user_id, tenant_id), dependents);
        }
    }

    pub fn set_onboarded(&self, user_id: UserId, tenant_id: TenantId, complete: bool) {
        if let Ok(mut set) = self.onboarded.write() {
            if complete {
                set.insert((user_id, tenant_id));
            } else {
                set.remove(&(user_id, tenant_id));
            }
        }
    }
}

impl Directory for InMemoryDirectory {
    fn tenant(&self, tenant_id: TenantId) -> Option<Tenant> {
        let tenants = self.tenants.read().ok()?;
        tenants.get(&tenant_id).cloned()
    }

    fn memberships(&self, user_id: UserId) -> Vec<Membership> {
        let map = match self.memberships.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };
        map.get(&user_id).cloned().unwrap_or_default()
    }

    fn dependents(&self, user_id: UserId, tenant_id: TenantId) -> Vec<DependentRef> {
        let map = match self.dependents.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };
        map.get(&(user_id, tenant_id)).cloned().unwrap_or_default()
    }

    fn onboarding_complete(&self, user_id: UserId, tenant_id: TenantId) -> bool {
        self.onboarded
            .read()
            .map(|set| set.contains(&(user_id, tenant_id)))
            .unwrap_or(false)
    }
}
