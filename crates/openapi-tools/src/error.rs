//! Error types for `rest-mcp-openapi-tools`.
//!
//! Two families live here:
//! - [`OpenApiToolsError`]: anything that prevents serving at all (startup-fatal).
//! - [`InvocationError`]: anything scoped to a single `tools/call`. These are converted into
//!   tool-error results at the handler boundary and never escape as protocol errors.

use thiserror::Error;

/// Main error type for document loading and configuration resolution.
#[derive(Error, Debug)]
pub enum OpenApiToolsError {
    /// Configuration errors (invalid base URL, bad injection rule).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A credential environment variable was not set.
    #[error("Configuration error: credential for query parameter '{param}' requires env var '{var}', which is not set")]
    MissingCredential { param: String, var: String },

    /// `OpenAPI` errors (unsupported version, unresolvable structure).
    #[error("OpenAPI error: {0}")]
    OpenApi(String),

    #[error("OpenAPI error: failed to read spec file '{path}': {source}")]
    OpenApiSpecReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OpenAPI error: failed to parse OpenAPI spec from '{location}': {source}")]
    OpenApiSpecParse {
        location: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// The document declares no servers and no base URL override was given.
    #[error("OpenAPI error: no servers declared in '{location}' and no base URL configured")]
    NoServers { location: String },

    /// JSON errors (reference resolution goes through `serde_json::Value`).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for `OpenAPI` tooling operations.
pub type Result<T> = std::result::Result<T, OpenApiToolsError>;

/// Failure of a single tool invocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    #[error("Required param {0} but not provided.")]
    MissingParameter(String),

    /// A required parameter that this bridge cannot bind (non-query location or non-string type).
    #[error("Required param {name} cannot be provided: {reason}")]
    UnbindableParameter { name: String, reason: String },

    #[error("Unsupported method {0}")]
    UnsupportedMethod(String),

    #[error("Invalid request URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// Transport-level failure. `message` carries the underlying cause with the URL redacted.
    #[error("Error when performing {method} {url}: {message}")]
    Transport {
        method: String,
        url: String,
        message: String,
    },
}
