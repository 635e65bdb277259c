//! Security middleware.
//!
//! Currently implemented:
//!
//! - [`Cors`] — Cross-Origin Resource Sharing headers and preflight short-circuiting.

pub mod cors;

pub use cors::Cors;
