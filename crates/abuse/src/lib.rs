//! Abuse prevention: fixed-window quotas, credential backoff, suspicion
//! scoring, and blocklisting, all keyed on pre-auth identifiers.

pub mod backoff;
pub mod block;
pub mod engine;
pub mod identifier;
pub mod policy;
pub mod store;
pub mod suspicion;

pub use backoff::{FailureStreak, required_delay};
pub use block::{BlockReason, BlockRecord};
pub use engine::{AbuseDecision, AbuseDenial, AbuseEngine};
pub use identifier::Identifier;
pub use policy::{OperationKind, Quota};
pub use store::{AbuseStore, InMemoryAbuseStore, WindowSnapshot};
pub use suspicion::SuspicionSignal;
