use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campusgate_core::{TenantId, UserId};

/// What kind of action an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    /// Token issuance, verification, revocation.
    Authentication,
    /// Route and permission decisions.
    Authorization,
    /// Tenant or dependent switches.
    ContextSwitch,
    /// Fixed-window and backoff rejections.
    RateLimit,
    /// Block creation, extension, expiry.
    Block,
    /// Operator interventions (unblock, revocation sweeps).
    AdminAction,
}

/// How the recorded action ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    /// The action was evaluated and refused.
    Failure,
    /// The action could not be evaluated (internal fault).
    Error,
    /// The action was allowed but something about it warrants attention.
    Warning,
}

/// Severity for triage.
///
/// `Critical` is reserved for cross-tenant access attempts and unauthorized
/// context switches — the records someone gets paged for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Client network identity attached to audit records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMeta {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

impl ClientMeta {
    pub fn new(ip: IpAddr, user_agent: impl Into<String>) -> Self {
        Self {
            ip: Some(ip),
            user_agent: Some(user_agent.into()),
        }
    }
}

/// A single audit record.
///
/// Producers fill in what they know; a missing actor or tenant means the
/// action never got far enough to establish one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub actor: Option<UserId>,
    pub tenant_id: Option<TenantId>,
    pub category: ActionCategory,
    pub outcome: AuditOutcome,
    pub severity: Severity,

    /// Short human-readable description ("token expired", "switch denied").
    pub detail: String,

    /// Structured extras; shape varies by category.
    pub metadata: serde_json::Value,

    pub client: ClientMeta,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        category: ActionCategory,
        outcome: AuditOutcome,
        severity: Severity,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            actor: None,
            tenant_id: None,
            category,
            outcome,
            severity,
            detail: detail.into(),
            metadata: serde_json::Value::Null,
            client: ClientMeta::default(),
            occurred_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_actor(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }

    #[must_use]
    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: ClientMeta) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
