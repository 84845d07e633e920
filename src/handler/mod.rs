//! Request handler module
//!
//! Route dispatch, frame detection, the three page handlers and static assets.

pub mod frame;
pub mod router;
pub mod site;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;
