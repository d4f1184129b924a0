//! `campusgate-access` — route rules, the access decision, and the gate.
//!
//! The crate splits into a pure layer and a composed one. `route`,
//! `decision`, and `landing` are deterministic functions over a
//! [`RouteTable`] and a resolved session context; `gate` wires them to the
//! token service, the tenant resolver, the abuse engine, and the audit
//! sink, and is the boundary callers actually talk to.

pub mod decision;
pub mod gate;
pub mod landing;
pub mod route;


pub use decision::{AccessDecision, DenialReason, UnauthenticatedKind, decide};
pub use gate::{AccessOutcome, RequestGate, SwitchError, SwitchGrant, SwitchTarget};
pub use landing::{emergency_route, fallback_routes, landing_route, primary_route, redirect_for};
pub use route::{
    DEPENDENT_SELECTION_ROUTE, LOGIN_ROUTE, MAINTENANCE_ROUTE, ONBOARDING_ROUTE, RouteClass,
    RoutePattern, RouteRule, RouteTable, SelectionStep, TENANT_SELECTION_ROUTE,
};
