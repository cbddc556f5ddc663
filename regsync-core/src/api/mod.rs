//! HTTP clients for both sides of the sync.
//!
//! This module wraps the two remote systems a reconciliation pass talks
//! to: the participant directory (mutual-TLS, OpenID Connect discovery
//! and client credentials grant) and the federation server's admin API
//! (basic auth plus the XSRF header it insists on).

pub mod admin;
pub mod directory;
pub mod error;
pub mod types;

// Re-export main types for convenience
pub use admin::{AdminApi, AdminClient, TargetSettings};
pub use directory::{DirectoryApi, DirectorySettings};
pub use error::{ApiError, Result};
pub use types::*;
