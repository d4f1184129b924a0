use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use campusgate_core::{DependentId, TenantId, TokenId, UserId};

use crate::{Permission, Role};

/// Claims carried by an issued access token (transport-agnostic).
///
/// Timestamps serialize as epoch seconds under the standard `iat`/`exp`
/// names so the encoded form is an ordinary JWT payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Token identifier, the unit of revocation.
    pub jti: TokenId,

    /// Subject: the authenticated user.
    pub sub: UserId,

    /// Platform role of the subject.
    pub role: Role,

    /// Every tenant the subject may act within.
    pub tenant_ids: Vec<TenantId>,

    /// Tenant the subject is currently acting within, if one is selected.
    pub active_tenant_id: Option<TenantId>,

    /// Dependent the subject is currently acting for, if one is selected.
    pub active_dependent_id: Option<DependentId>,

    /// Permissions granted to the subject.
    pub permissions: Vec<Permission>,

    /// Issued-at timestamp.
    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl IdentityClaims {
    /// Fresh claims for a newly authenticated user.
    ///
    /// Context selection starts empty; the resolver derives what still has
    /// to be chosen. Timestamps are truncated to whole seconds — that is
    /// their wire precision, and equality should survive a round trip.
    pub fn new(
        sub: UserId,
        role: Role,
        tenant_ids: Vec<TenantId>,
        permissions: Vec<Permission>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            jti: TokenId::new(),
            sub,
            role,
            tenant_ids,
            active_tenant_id: None,
            active_dependent_id: None,
            permissions,
            issued_at: now.trunc_subsecs(0),
            expires_at: (now + ttl).trunc_subsecs(0),
        }
    }

    #[must_use]
    pub fn with_active_tenant(mut self, tenant_id: TenantId) -> Self {
        self.active_tenant_id = Some(tenant_id);
        self
    }

    #[must_use]
    pub fn with_active_dependent(mut self, dependent_id: DependentId) -> Self {
        self.active_dependent_id = Some(dependent_id);
        self
    }

    /// Claims for a context switch to another tenant.
    ///
    /// A switch is a re-issuance: fresh `jti` and time window, active
    /// dependent cleared (dependents are tenant-scoped). The caller is
    /// responsible for authorizing the target first.
    pub fn switched_to_tenant(
        &self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            jti: TokenId::new(),
            active_tenant_id: Some(tenant_id),
            active_dependent_id: None,
            issued_at: now.trunc_subsecs(0),
            expires_at: (now + ttl).trunc_subsecs(0),
            ..self.clone()
        }
    }

    /// Claims for a context switch to another dependent within the active
    /// tenant. Same re-issuance rules as a tenant switch.
    pub fn switched_to_dependent(
        &self,
        dependent_id: DependentId,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            jti: TokenId::new(),
            active_dependent_id: Some(dependent_id),
            issued_at: now.trunc_subsecs(0),
            expires_at: (now + ttl).trunc_subsecs(0),
            ..self.clone()
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate the claims time window.
///
/// Given the same claims and instant this always produces the same outcome;
/// signature verification lives in the token service, not here.
pub fn validate_claims(claims: &IdentityClaims, now: DateTime<Utc>) -> Result<(), ClaimsError> {
    if claims.expires_at <= claims.issued_at {
        return Err(ClaimsError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(ClaimsError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(ClaimsError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_claims(now: DateTime<Utc>) -> IdentityClaims {
        IdentityClaims::new(
            UserId::new(),
            Role::Teacher,
            vec![TenantId::new()],
            vec![Permission::new("students.read")],
            now,
            Duration::minutes(30),
        )
    }

    #[test]
    fn window_validation_is_deterministic() {
        let now = Utc::now();
        let claims = sample_claims(now);

        assert_eq!(validate_claims(&claims, now), Ok(()));
        assert_eq!(
            validate_claims(&claims, now + Duration::hours(1)),
            Err(ClaimsError::Expired)
        );
        assert_eq!(
            validate_claims(&claims, now - Duration::seconds(1)),
            Err(ClaimsError::NotYetValid)
        );
    }

    #[test]
    fn inverted_window_is_rejected() {
        let now = Utc::now();
        let mut claims = sample_claims(now);
        claims.expires_at = claims.issued_at;

        assert_eq!(
            validate_claims(&claims, now),
            Err(ClaimsError::InvalidTimeWindow)
        );
    }

    #[test]
    fn tenant_switch_reissues_identity() {
        let now = Utc::now();
        let tenant = TenantId::new();
        let original = sample_claims(now)
            .with_active_tenant(TenantId::new())
            .with_active_dependent(DependentId::new());

        let switched = original.switched_to_tenant(tenant, now + Duration::minutes(5), Duration::minutes(30));

        assert_ne!(switched.jti, original.jti);
        assert_eq!(switched.active_tenant_id, Some(tenant));
        assert_eq!(switched.active_dependent_id, None);
        assert_eq!(switched.sub, original.sub);
        assert_eq!(switched.tenant_ids, original.tenant_ids);
        assert!(switched.expires_at > original.issued_at);
    }

    #[test]
    fn dependent_switch_keeps_tenant() {
        let now = Utc::now();
        let tenant = TenantId::new();
        let dependent = DependentId::new();
        let original = sample_claims(now).with_active_tenant(tenant);

        let switched = original.switched_to_dependent(dependent, now, Duration::minutes(30));

        assert_ne!(switched.jti, original.jti);
        assert_eq!(switched.active_tenant_id, Some(tenant));
        assert_eq!(switched.active_dependent_id, Some(dependent));
    }

    #[test]
    fn wire_form_uses_standard_jwt_names() {
        let claims = sample_claims(Utc::now());
        let value = serde_json::to_value(&claims).unwrap();

        assert!(value.get("iat").is_some_and(|v| v.is_i64()));
        assert!(value.get("exp").is_some_and(|v| v.is_i64()));
        assert!(value.get("jti").is_some());
        assert!(value.get("sub").is_some());
        assert!(value.get("issued_at").is_none());
    }
}
