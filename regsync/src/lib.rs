//! Reconciliation Engine
//!
//! Keeps a federation server's OAuth client inventory converged with a
//! participant directory:
//! - Scope classification with ignore lists, disabled lists and filter
//!   patterns
//! - Copy-on-write field mapping from directory records onto target
//!   clients
//! - Deterministic mutation plans (deactivate, create/update, orphan
//!   sweep) gated by a `register_last_updated` watermark
//! - Sequential execution with fail-safe compensation for failed updates

pub mod error;
pub mod mapper;
pub mod metrics;
pub mod plan;
pub mod policy;
pub mod reconciler;

// Re-export main types and functions
pub use error::{EngineError, Result};
pub use mapper::merge;
pub use metrics::PassMetrics;
pub use plan::{Compensation, PlanSummary, SyncAction, SyncPlan};
pub use policy::{default_claims_mapping, Scope, ScopeFilter, SyncPolicy};
pub use reconciler::Reconciler;
