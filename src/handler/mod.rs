//! Request handler module
//!
//! Request routing for the placeholder entry point.

pub mod router;

// Re-export main entry point
pub use router::handle_request;
