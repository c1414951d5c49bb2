//! Core business logic for grievance-rs.

pub mod services;

pub use services::*;
