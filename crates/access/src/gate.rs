//! Request gate: the composed authorization pipeline.
//!
//! This is the one entry point protected callers go through. It composes
//! the abuse engine, the token service, the context resolver, and the
//! route decision into a single ordered pipeline:
//!
//! ```text
//! request
//!   ↓
//! 1. Blocklist check (keyed on network identity; covers public paths)
//!   ↓
//! 2. Route classification (public paths short-circuit here)
//!   ↓
//! 3. Token verification (signature, expiry, revocation)
//!   ↓
//! 4. Context resolution (tenant status, membership, dependents)
//!   ↓
//! 5. Explicit target-tenant isolation check
//!   ↓
//! 6. Maintenance gate (platform operators ride through)
//!   ↓
//! 7. Route decision + suggested redirect
//! ```
//!
//! Every security-relevant outcome is audited at this boundary rather than
//! inside the components, so the emission contract lives in one place.
//! Audit failures are swallowed by design: a dead sink must never take
//! authorization down with it.
//!
//! The gate is generic over its stores and sink so tests run fully in
//! memory and deployments can swap in shared backends without touching the
//! pipeline.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Duration, Utc};
use serde_json::json;
use thiserror::Error;

use campusgate_abuse::{AbuseDecision, AbuseEngine, AbuseStore, Identifier, OperationKind};
use campusgate_audit::{ActionCategory, AuditEvent, AuditOutcome, AuditSink, ClientMeta, Severity};
use campusgate_auth::{
    IdentityClaims, Role, SessionContext, SignedToken, TokenError, TokenService,
};
use campusgate_core::{DependentId, TenantId, UserId};
use campusgate_tenancy::{ContextResolver, Directory, ResolveError};

use crate::decision::{AccessDecision, DenialReason, UnauthenticatedKind, decide};
use crate::landing::redirect_for;
use crate::route::{LOGIN_ROUTE, MAINTENANCE_ROUTE, RouteClass, RouteTable, TENANT_SELECTION_ROUTE};

/// Result of an authorization query.
#[derive(Debug, Clone)]
pub struct AccessOutcome {
    pub decision: AccessDecision,
    /// Present when resolution succeeded and the decision is not a denial.
    pub context: Option<SessionContext>,
    /// Where to send the user instead, when that helps them recover.
    pub redirect: Option<String>,
    /// How long to wait, on rate-limit and block denials.
    pub retry_after: Option<Duration>,
}

impl AccessOutcome {
    fn decision_only(decision: AccessDecision) -> Self {
        Self {
            decision,
            context: None,
            redirect: None,
            retry_after: None,
        }
    }

    fn denied(reason: DenialReason, redirect: Option<String>) -> Self {
        Self {
            decision: AccessDecision::Denied(reason),
            context: None,
            redirect,
            retry_after: None,
        }
    }
}

/// Target of a context switch. Tenant and dependent switches are distinct
/// operations by construction; there is no way to ask for both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchTarget {
    Tenant(TenantId),
    Dependent(DependentId),
}

/// A completed context switch: fresh token, fresh context.
#[derive(Debug, Clone)]
pub struct SwitchGrant {
    pub token: SignedToken,
    pub context: SessionContext,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SwitchError {
    #[error("authentication required: {0}")]
    Unauthenticated(#[from] TokenError),

    /// The target is outside the caller's authorized set.
    #[error("unauthorized context switch")]
    UnauthorizedAccess,

    #[error("target school is not active")]
    TenantInactive,

    #[error("context switch failed")]
    Internal,
}

/// The composed authorization pipeline. See the module docs for the order
/// of checks.
pub struct RequestGate<D, S, A> {
    tokens: TokenService,
    resolver: ContextResolver<D>,
    abuse: AbuseEngine<S>,
    audit: A,
    table: RouteTable,
    maintenance: AtomicBool,
}

impl<D, S, A> RequestGate<D, S, A>
where
    D: Directory,
    S: AbuseStore,
    A: AuditSink,
{
    pub fn new(
        tokens: TokenService,
        resolver: ContextResolver<D>,
        abuse: AbuseEngine<S>,
        audit: A,
        table: RouteTable,
    ) -> Self {
        Self {
            tokens,
            resolver,
            abuse,
            audit,
            table,
            maintenance: AtomicBool::new(false),
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn resolver(&self) -> &ContextResolver<D> {
        &self.resolver
    }

    pub fn abuse(&self) -> &AbuseEngine<S> {
        &self.abuse
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Authorize one request against one route.
    ///
    /// `target_tenant` is passed by callers whose request names a tenant
    /// explicitly (exports, admin lookups); it is checked against the
    /// resolved membership on top of the ordinary route decision.
    pub fn authorize(
        &self,
        token: Option<&SignedToken>,
        path: &str,
        client: &ClientMeta,
        target_tenant: Option<TenantId>,
    ) -> AccessOutcome {
        let now = Utc::now();

        // 1) Blocklist first; it applies before any identity work, and to
        //    public paths too.
        if let Some(identifier) = client_identifier(client) {
            if let Some(block) = self.abuse.active_block(&identifier, now) {
                self.emit(
                    AuditEvent::new(
                        ActionCategory::Block,
                        AuditOutcome::Failure,
                        Severity::High,
                        "request from blocked identifier",
                    )
                    .with_client(client.clone())
                    .with_metadata(json!({
                        "identifier": identifier.key(),
                        "reason": block.reason.as_str(),
                    })),
                );
                let mut outcome = AccessOutcome::denied(DenialReason::Blocked, None);
                outcome.retry_after = Some(block.retry_after(now));
                return outcome;
            }
        }

        // 2) Public routes need no identity at all.
        if matches!(self.table.classify(path), RouteClass::Public) {
            return AccessOutcome::decision_only(AccessDecision::Public);
        }

        // 3) Identity.
        let Some(token) = token else {
            self.emit(
                AuditEvent::new(
                    ActionCategory::Authentication,
                    AuditOutcome::Failure,
                    Severity::Low,
                    "no token presented",
                )
                .with_client(client.clone()),
            );
            return AccessOutcome::denied(
                DenialReason::Unauthenticated(UnauthenticatedKind::Missing),
                Some(LOGIN_ROUTE.to_string()),
            );
        };

        let claims = match self.tokens.verify(token.as_str()) {
            Ok(claims) => claims,
            Err(err) => {
                let severity = match err {
                    TokenError::Expired => Severity::Low,
                    _ => Severity::Medium,
                };
                self.emit(
                    AuditEvent::new(
                        ActionCategory::Authentication,
                        AuditOutcome::Failure,
                        severity,
                        format!("token rejected: {err}"),
                    )
                    .with_client(client.clone()),
                );
                return AccessOutcome::denied(
                    DenialReason::Unauthenticated(UnauthenticatedKind::from_error(&err)),
                    Some(LOGIN_ROUTE.to_string()),
                );
            }
        };

        // 4) Context.
        let context = match self.resolver.resolve(&claims) {
            Ok(context) => context,
            Err(ResolveError::TenantInactive(tenant)) => {
                self.emit(
                    AuditEvent::new(
                        ActionCategory::Authorization,
                        AuditOutcome::Failure,
                        Severity::High,
                        "active school is suspended or unknown",
                    )
                    .with_actor(claims.sub)
                    .with_tenant(tenant)
                    .with_client(client.clone()),
                );
                // The user may hold other memberships; let them re-pick.
                return AccessOutcome::denied(
                    DenialReason::TenantInactive,
                    Some(TENANT_SELECTION_ROUTE.to_string()),
                );
            }
            Err(ResolveError::IsolationViolation { user, tenant }) => {
                self.emit(
                    AuditEvent::new(
                        ActionCategory::Authorization,
                        AuditOutcome::Failure,
                        Severity::Critical,
                        "active school outside the authorized set",
                    )
                    .with_actor(user)
                    .with_tenant(tenant)
                    .with_client(client.clone()),
                );
                return AccessOutcome::denied(DenialReason::TenantIsolation, None);
            }
        };

        // 5) Explicit cross-tenant checks requested by the caller.
        if let Some(target) = target_tenant {
            if !context.is_member_of(target) {
                self.emit(
                    AuditEvent::new(
                        ActionCategory::Authorization,
                        AuditOutcome::Failure,
                        Severity::Critical,
                        "request targeted a school the caller is not a member of",
                    )
                    .with_actor(context.user_id)
                    .with_tenant(target)
                    .with_client(client.clone()),
                );
                return AccessOutcome::denied(DenialReason::TenantIsolation, None);
            }
        }

        // 6) Maintenance turns everyone but platform operators away.
        if self.maintenance.load(Ordering::Relaxed) && context.role != Role::SuperAdmin {
            return AccessOutcome::denied(
                DenialReason::Maintenance,
                Some(MAINTENANCE_ROUTE.to_string()),
            );
        }

        // 7) The route decision proper.
        let decision = decide(&self.table, path, &context);
        let redirect = redirect_for(&decision, &self.table, &context);

        match &decision {
            AccessDecision::Granted | AccessDecision::Public => {
                self.emit(
                    AuditEvent::new(
                        ActionCategory::Authorization,
                        AuditOutcome::Success,
                        Severity::Low,
                        format!("route granted: {path}"),
                    )
                    .with_actor(context.user_id),
                );
            }
            AccessDecision::Denied(reason) => {
                let severity = match reason {
                    DenialReason::Internal => Severity::High,
                    DenialReason::StaleSelectionRoute => Severity::Low,
                    _ => Severity::Medium,
                };
                let mut event = AuditEvent::new(
                    ActionCategory::Authorization,
                    AuditOutcome::Failure,
                    severity,
                    format!("route denied: {path} ({reason})"),
                )
                .with_actor(context.user_id)
                .with_client(client.clone());
                if let Some(tenant) = context.active_tenant_id {
                    event = event.with_tenant(tenant);
                }
                self.emit(event);
            }
            // Selection redirects are navigation, not security events.
            _ => {}
        }

        let context = match decision {
            AccessDecision::Denied(_) => None,
            _ => Some(context),
        };
        AccessOutcome {
            decision,
            context,
            redirect,
            retry_after: None,
        }
    }

    /// Switch the active tenant or dependent, re-validating authorization
    /// and re-issuing the token.
    ///
    /// The previous token is revoked on success: a switch is a new session,
    /// not a mutation of the old one.
    pub fn switch_context(
        &self,
        token: &SignedToken,
        target: SwitchTarget,
        client: &ClientMeta,
    ) -> Result<SwitchGrant, SwitchError> {
        let claims = self.tokens.verify(token.as_str())?;
        let now = Utc::now();

        let next = match target {
            SwitchTarget::Tenant(tenant_id) => {
                // Membership comes from the claims: that list is the record
                // of legitimate grants.
                if claims.role != Role::SuperAdmin && !claims.tenant_ids.contains(&tenant_id) {
                    self.emit(
                        AuditEvent::new(
                            ActionCategory::ContextSwitch,
                            AuditOutcome::Failure,
                            Severity::Critical,
                            "switch to a school outside the authorized set",
                        )
                        .with_actor(claims.sub)
                        .with_tenant(tenant_id)
                        .with_client(client.clone()),
                    );
                    return Err(SwitchError::UnauthorizedAccess);
                }

                match self.resolver.directory().tenant(tenant_id) {
                    Some(tenant) if tenant.status.is_active() => {}
                    _ => {
                        self.emit(
                            AuditEvent::new(
                                ActionCategory::ContextSwitch,
                                AuditOutcome::Failure,
                                Severity::High,
                                "switch to a suspended or unknown school",
                            )
                            .with_actor(claims.sub)
                            .with_tenant(tenant_id)
                            .with_client(client.clone()),
                        );
                        return Err(SwitchError::TenantInactive);
                    }
                }

                claims.switched_to_tenant(tenant_id, now, self.tokens.ttl())
            }

            SwitchTarget::Dependent(dependent_id) => {
                let authorized = claims.role.supports_dependents()
                    && claims.active_tenant_id.is_some_and(|tenant| {
                        self.resolver
                            .directory()
                            .dependents(claims.sub, tenant)
                            .iter()
                            .any(|d| d.id == dependent_id)
                    });
                if !authorized {
                    self.emit(
                        AuditEvent::new(
                            ActionCategory::ContextSwitch,
                            AuditOutcome::Failure,
                            Severity::Critical,
                            "switch to a dependent outside the linked set",
                        )
                        .with_actor(claims.sub)
                        .with_client(client.clone()),
                    );
                    return Err(SwitchError::UnauthorizedAccess);
                }

                claims.switched_to_dependent(dependent_id, now, self.tokens.ttl())
            }
        };

        self.finish_switch(&claims, next, client)
    }

    fn finish_switch(
        &self,
        previous: &IdentityClaims,
        next: IdentityClaims,
        client: &ClientMeta,
    ) -> Result<SwitchGrant, SwitchError> {
        let context = match self.resolver.resolve(&next) {
            Ok(context) => context,
            Err(err) => {
                self.emit(
                    AuditEvent::new(
                        ActionCategory::ContextSwitch,
                        AuditOutcome::Failure,
                        Severity::High,
                        format!("context switch could not be completed: {err}"),
                    )
                    .with_actor(next.sub)
                    .with_client(client.clone()),
                );
                return Err(match err {
                    ResolveError::TenantInactive(_) => SwitchError::TenantInactive,
                    ResolveError::IsolationViolation { .. } => SwitchError::UnauthorizedAccess,
                });
            }
        };

        let token = self
            .tokens
            .issue(&next)
            .map_err(|_| SwitchError::Internal)?;

        // One live token per session; the superseded one dies here.
        self.tokens.revocations().revoke_token(previous.jti);

        let mut event = AuditEvent::new(
            ActionCategory::ContextSwitch,
            AuditOutcome::Success,
            Severity::Low,
            "context switched",
        )
        .with_actor(next.sub)
        .with_client(client.clone())
        .with_metadata(json!({
            "dependent": next.active_dependent_id,
        }));
        if let Some(tenant) = next.active_tenant_id {
            event = event.with_tenant(tenant);
        }
        self.emit(event);

        Ok(SwitchGrant { token, context })
    }

    /// Screen a sensitive operation before authentication. Denials are
    /// audited here so callers do not have to remember to.
    pub fn check_abuse(
        &self,
        identifier: &Identifier,
        kind: OperationKind,
        client: &ClientMeta,
    ) -> AbuseDecision {
        let decision = self.abuse.check(identifier, kind, Utc::now());
        if !decision.allowed {
            self.emit(
                AuditEvent::new(
                    ActionCategory::RateLimit,
                    AuditOutcome::Failure,
                    Severity::Medium,
                    format!("{kind} refused"),
                )
                .with_client(client.clone())
                .with_metadata(json!({
                    "identifier": identifier.key(),
                    "denial": format!("{:?}", decision.denial),
                    "retry_after_secs": decision.retry_after.map(|d| d.num_seconds()),
                })),
            );
        }
        decision
    }

    /// Record a failed credential attempt; an automatic block created by
    /// the escalation rules is audited as a warning.
    pub fn record_login_failure(&self, identifier: &Identifier, client: &ClientMeta) {
        if let Some(block) = self.abuse.record_failure(identifier, Utc::now()) {
            self.emit(
                AuditEvent::new(
                    ActionCategory::Block,
                    AuditOutcome::Warning,
                    Severity::High,
                    format!("identifier blocked: {}", block.reason),
                )
                .with_client(client.clone())
                .with_metadata(json!({
                    "identifier": identifier.key(),
                    "attempts": block.attempts,
                    "expires_at": block.expires_at,
                })),
            );
        }
    }

    pub fn record_login_success(&self, identifier: &Identifier) {
        self.abuse.record_success(identifier);
    }

    /// Administrative unblock. Audited regardless of whether anything was
    /// actually released.
    pub fn unblock(&self, identifier: &Identifier, admin_id: UserId) -> bool {
        let released = self.abuse.unblock(identifier, Utc::now());
        let outcome = if released {
            AuditOutcome::Success
        } else {
            AuditOutcome::Failure
        };
        self.emit(
            AuditEvent::new(
                ActionCategory::AdminAction,
                outcome,
                Severity::Medium,
                "identifier unblocked",
            )
            .with_actor(admin_id)
            .with_metadata(json!({
                "identifier": identifier.key(),
                "released": released,
            })),
        );
        released
    }

    pub fn set_maintenance(&self, enabled: bool) {
        self.maintenance.store(enabled, Ordering::Relaxed);
        tracing::info!(enabled, "maintenance mode toggled");
    }

    pub fn maintenance_enabled(&self) -> bool {
        self.maintenance.load(Ordering::Relaxed)
    }

    fn emit(&self, event: AuditEvent) {
        // Best-effort by contract; a dead sink must not fail the request.
        if let Err(err) = self.audit.emit(event) {
            tracing::warn!(error = %err, "audit emit failed");
        }
    }
}

fn client_identifier(client: &ClientMeta) -> Option<Identifier> {
    let ip = client.ip?;
    Some(Identifier::network(
        ip,
        client.user_agent.clone().unwrap_or_default(),
    ))
}
