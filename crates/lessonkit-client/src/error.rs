//! Client error types.

use thiserror::Error;

/// Errors that can occur when talking to the lessonkit backend.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No bearer token is configured or stored.
    #[error("no access token; run `lessonkit token set` or set LESSONKIT_TOKEN")]
    MissingToken,

    /// The backend rejected the token (HTTP 401/403).
    #[error("unauthorized (HTTP {status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// The response body was not what the endpoint promises.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}
