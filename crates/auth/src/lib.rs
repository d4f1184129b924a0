//! `campusgate-auth` — token service and identity model (zero-trust boundary).
//!
//! This crate is intentionally decoupled from HTTP and storage: encoded
//! tokens go in, verified claims and session contexts come out.

pub mod claims;
pub mod permissions;
pub mod roles;
pub mod session;
pub mod token;

pub use claims::{ClaimsError, IdentityClaims, validate_claims};
pub use permissions::Permission;
pub use roles::Role;
pub use session::{DependentRef, SessionContext};
pub use token::{
    InMemoryRevocationList, RevocationList, SignedToken, TokenConfig, TokenError, TokenService,
};
