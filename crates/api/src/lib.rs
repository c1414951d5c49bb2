//! HTTP API layer for the grievance workflow.
//!
//! - **Endpoints**: complaint lifecycle, auth, notifications, admin views
//! - **Extractors**: authenticated user from request extensions
//! - **Middleware**: bearer-token authentication
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::AppState;
