use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Issuer discovery failed: {0}")]
    Discovery(String),

    #[error("Token request failed: {0}")]
    Token(String),

    #[error("Client certificate setup failed: {0}")]
    Identity(String),

    #[error("Directory error: {status} - {message}")]
    Directory { status: u16, message: String },

    #[error("Directory returned {retrieved} clients but reported a total of {expected}")]
    FetchIncomplete { expected: usize, retrieved: usize },

    #[error("Admin API error: {status} - {message}")]
    Admin { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, ApiError>;
