//! axum pipeline stage for the gatekeeping layer.
//!
//! The routing layer owns the route table; it attaches [`require_token`] to
//! protected route groups and [`enforce_rate_limit`] to rate-limited routes,
//! with authentication layered outside admission.

mod middleware;
mod rejection;

pub use middleware::{client_identity, enforce_rate_limit, require_token, route_identity, Gatekeeper};
pub use rejection::GateRejection;
