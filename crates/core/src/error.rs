//! Unified error types for iconcache.
//!
//! Public cache operations never return these to their callers; they are
//! logged and folded into sentinel values. The MCP server surfaces them as
//! tool errors.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the icon cache.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty cache key).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Settings record could not be read or written.
    #[error("SETTINGS_ERROR: {0}")]
    Settings(String),

    /// A cache operation failed and the store reported no further detail.
    #[error("CACHE_ERROR: {0}")]
    Store(String),

    /// Cache handle has been destroyed.
    #[error("CACHE_DESTROYED")]
    Destroyed,

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// SSRF blocked - private/internal address not allowed.
    #[error("SSRF_BLOCKED: {0}")]
    SsrfBlocked(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Response was not an image.
    #[error("UNSUPPORTED_CONTENT: {0}")]
    UnsupportedContent(String),

    /// HTTP error response.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),
}

impl Error {
    /// Whether the underlying connection is gone and must be reopened.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Error::Database(tokio_rusqlite::Error::ConnectionClosed))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Settings(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::SsrfBlocked(msg) => (-32004, msg.clone()),
            Error::FetchTimeout(msg) => (-32006, msg.clone()),
            Error::FetchTooLarge(msg) => (-32007, msg.clone()),
            Error::HttpError(msg) => (-32008, msg.clone()),
            Error::UnsupportedContent(msg) => (-32009, msg.clone()),
            Error::Destroyed => (-32011, "Icon cache has been shut down".to_string()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::Store(msg) => (-32002, msg.clone()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::Settings(msg) => (-32002, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidUrl("ftp://abc".to_string());
        assert!(err.to_string().contains("INVALID_URL"));
        assert!(err.to_string().contains("ftp://abc"));
    }

    #[test]
    fn test_error_to_mcp_error() {
        let mcp_err: McpError = Error::InvalidInput("empty key".to_string()).into();
        assert_eq!(mcp_err.code.0, -32602);

        let mcp_err: McpError = Error::Store("clear failed".to_string()).into();
        assert_eq!(mcp_err.code.0, -32002);

        let mcp_err: McpError = Error::Destroyed.into();
        assert_eq!(mcp_err.code.0, -32011);
    }

    #[test]
    fn test_connection_lost() {
        assert!(Error::Database(tokio_rusqlite::Error::ConnectionClosed).is_connection_lost());
        assert!(!Error::Destroyed.is_connection_lost());
    }
}
