//! Token issuance and verification (HS256) with a revocation deny-list.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use chrono::Duration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use campusgate_core::{TokenId, UserId};

use crate::{IdentityClaims, validate_claims};

/// Clock-skew tolerance applied to expiry checks, in seconds.
const LEEWAY_SECS: u64 = 30;

/// Token lifetime when none is configured.
const DEFAULT_TTL_MINS: i64 = 30;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Signing configuration for the token service.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub ttl: Duration,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    /// Read configuration from the environment.
    ///
    /// `CAMPUSGATE_TOKEN_SECRET` must be set in production. The fallback
    /// exists so development environments come up without ceremony.
    pub fn from_env() -> Self {
        let secret = match std::env::var("CAMPUSGATE_TOKEN_SECRET") {
            Ok(s) if !s.is_empty() => s,
            _ => {
                tracing::warn!(
                    "CAMPUSGATE_TOKEN_SECRET not set; using an insecure development secret"
                );
                "campusgate-dev-secret".to_string()
            }
        };
        let ttl_mins = std::env::var("CAMPUSGATE_TOKEN_TTL_MINS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TTL_MINS);

        Self {
            secret,
            ttl: Duration::minutes(ttl_mins),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Signed token & errors
// ─────────────────────────────────────────────────────────────────────────────

/// An encoded, signed bearer token. Opaque to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedToken(String);

impl SignedToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl core::fmt::Display for SignedToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Malformed token, bad signature, or undecodable claims.
    #[error("token is invalid")]
    Invalid,

    #[error("token has expired")]
    Expired,

    #[error("token has been revoked")]
    Revoked,

    /// Signing-side failure; carries the underlying reason.
    #[error("token could not be issued: {0}")]
    Issue(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Revocation list
// ─────────────────────────────────────────────────────────────────────────────

/// Deny-list consulted on every verification.
///
/// Revocation is token-granular (`jti`) with a user-wide sweep for
/// compromised accounts. Entries only need to outlive the longest token
/// lifetime; expiry takes over after that.
pub trait RevocationList: Send + Sync {
    fn revoke_token(&self, token_id: TokenId);
    fn revoke_user(&self, user_id: UserId);
    fn is_revoked(&self, token_id: TokenId, user_id: UserId) -> bool;
}

impl<R: RevocationList> RevocationList for Arc<R> {
    fn revoke_token(&self, token_id: TokenId) {
        self.as_ref().revoke_token(token_id);
    }

    fn revoke_user(&self, user_id: UserId) {
        self.as_ref().revoke_user(user_id);
    }

    fn is_revoked(&self, token_id: TokenId, user_id: UserId) -> bool {
        self.as_ref().is_revoked(token_id, user_id)
    }
}

/// In-memory revocation list.
#[derive(Default)]
pub struct InMemoryRevocationList {
    tokens: RwLock<HashSet<TokenId>>,
    users: RwLock<HashSet<UserId>>,
}

impl InMemoryRevocationList {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RevocationList for InMemoryRevocationList {
    fn revoke_token(&self, token_id: TokenId) {
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.insert(token_id);
        }
    }

    fn revoke_user(&self, user_id: UserId) {
        if let Ok(mut users) = self.users.write() {
            users.insert(user_id);
        }
    }

    fn is_revoked(&self, token_id: TokenId, user_id: UserId) -> bool {
        // A poisoned lock counts as revoked: this list must never fail open.
        let token_hit = self
            .tokens
            .read()
            .map(|t| t.contains(&token_id))
            .unwrap_or(true);
        let user_hit = self
            .users
            .read()
            .map(|u| u.contains(&user_id))
            .unwrap_or(true);
        token_hit || user_hit
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Token service
// ─────────────────────────────────────────────────────────────────────────────

/// Issues and verifies signed access tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    revocations: Arc<dyn RevocationList>,
}

impl TokenService {
    pub fn new(config: &TokenConfig) -> Self {
        Self::with_revocations(config, Arc::new(InMemoryRevocationList::new()))
    }

    pub fn with_revocations(config: &TokenConfig, revocations: Arc<dyn RevocationList>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = LEEWAY_SECS;

        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            ttl: config.ttl,
            revocations,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn revocations(&self) -> &Arc<dyn RevocationList> {
        &self.revocations
    }

    /// Sign claims into a bearer token.
    ///
    /// Refuses inverted time windows up front: a token that could never
    /// verify is an issuing bug, not a verification edge case. Nothing is
    /// recorded anywhere on failure.
    pub fn issue(&self, claims: &IdentityClaims) -> Result<SignedToken, TokenError> {
        validate_claims(claims, claims.issued_at)
            .map_err(|e| TokenError::Issue(e.to_string()))?;

        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map(SignedToken)
            .map_err(|e| TokenError::Issue(e.to_string()))
    }

    /// Verify a bearer token: signature, expiry, then the revocation list.
    ///
    /// Expiry is reported distinctly so callers can prompt re-authentication
    /// instead of treating the token as hostile.
    pub fn verify(&self, token: &str) -> Result<IdentityClaims, TokenError> {
        let data =
            decode::<IdentityClaims>(token, &self.decoding, &self.validation).map_err(|e| {
                use jsonwebtoken::errors::ErrorKind;
                match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Invalid,
                }
            })?;

        let claims = data.claims;
        if self.revocations.is_revoked(claims.jti, claims.sub) {
            return Err(TokenError::Revoked);
        }
        Ok(claims)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
