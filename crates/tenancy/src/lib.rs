//! `campusgate-tenancy` — tenant directory and per-request context resolution.
//!
//! The resolver turns verified claims into a `SessionContext`, re-reading
//! tenant status from the directory on every call so suspensions bite
//! immediately.

pub mod directory;
pub mod resolver;
pub mod tenant;

pub use directory::{Directory, InMemoryDirectory, Membership};
pub use resolver::{ContextResolver, ResolveError};
pub use tenant::{Tenant, TenantStatus};
