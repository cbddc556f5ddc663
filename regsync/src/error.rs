//! Error types for the reconciliation engine

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A configured filter pattern is not a valid regular expression
    #[error("Filter pattern error: {0}")]
    FilterPattern(String),
}
