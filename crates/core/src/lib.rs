//! `campusgate-core` — shared foundation for the authorization core.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{DependentId, TenantId, TokenId, UserId};
