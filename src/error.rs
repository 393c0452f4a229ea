use thiserror::Error;

/// Error taxonomy surfaced across the RPC boundary. Never a raw I/O error —
/// every fallible operation in the core maps into one of these variants.
#[derive(Error, Debug)]
pub enum RlmError {
    #[error("invalid chunk id: {0}")]
    InvalidId(String),

    #[error("path escapes storage root: {0}")]
    PathEscape(String),

    #[error("content too large: {0}")]
    InvalidSize(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid regex pattern: {0}")]
    InvalidPattern(String),

    #[error("utf-8 decode error: {0}")]
    EncodingError(String),

    #[error("embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, RlmError>;
