use crate::credentials::{CredentialPolicy, ResolvedCredentials};
use crate::document::Document;
use crate::error::{OpenApiToolsError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Default outbound request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How tool identifiers are derived from operations.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ToolNaming {
    /// Sanitized path only. Operations sharing a path (or sanitizing to the same string)
    /// overwrite each other; the last one registered wins.
    #[default]
    Path,
    /// Sanitized `{method}_{path}`.
    MethodPath,
}

/// User-facing configuration for turning an `OpenAPI` document into tools.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Override base URL from the document's first server.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Query parameters injected by this process.
    #[serde(default)]
    pub credentials: CredentialPolicy,

    /// Outbound request deadline. `None` disables it.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Option<Duration>,

    /// Maximum response body size (bytes). `None` = unlimited.
    #[serde(default)]
    pub max_response_bytes: Option<usize>,

    #[serde(default)]
    pub tool_naming: ToolNaming,
}

#[allow(clippy::unnecessary_wraps)]
fn default_request_timeout() -> Option<Duration> {
    Some(DEFAULT_REQUEST_TIMEOUT)
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            credentials: CredentialPolicy::default(),
            request_timeout: default_request_timeout(),
            max_response_bytes: None,
            tool_naming: ToolNaming::default(),
        }
    }
}

impl BridgeConfig {
    /// Resolve the base URL and credentials against a loaded document.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL is available, the base URL is not an absolute `http(s)`
    /// URL, or a credential cannot be resolved.
    pub fn resolve<F>(&self, document: &Document, location: &str, env: F) -> Result<ResolvedConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = self
            .base_url
            .as_deref()
            .or_else(|| document.first_server_url())
            .ok_or_else(|| OpenApiToolsError::NoServers {
                location: location.to_string(),
            })?;
        let base_url = validate_base_url(base_url)?;

        let credentials = self.credentials.resolve(env)?;

        Ok(ResolvedConfig {
            base_url,
            credentials,
            request_timeout: self.request_timeout,
            max_response_bytes: self.max_response_bytes,
            tool_naming: self.tool_naming,
        })
    }
}

/// Read-only runtime configuration shared (via `Arc`) by every registered tool.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute base URL, without a trailing slash.
    pub base_url: String,
    pub credentials: ResolvedCredentials,
    pub request_timeout: Option<Duration>,
    pub max_response_bytes: Option<usize>,
    pub tool_naming: ToolNaming,
}

impl ResolvedConfig {
    /// Minimal config for a base URL, used by hosts that manage credentials themselves.
    #[must_use]
    pub fn new(base_url: impl Into<String>, credentials: ResolvedCredentials) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            max_response_bytes: None,
            tool_naming: ToolNaming::default(),
        }
    }
}

fn validate_base_url(base_url: &str) -> Result<String> {
    let url = Url::parse(base_url).map_err(|e| {
        OpenApiToolsError::Config(format!(
            "Invalid baseUrl '{base_url}': {e} (must be an absolute http(s) URL; set --base-url)",
        ))
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(OpenApiToolsError::Config(format!(
            "Invalid baseUrl '{base_url}': unsupported scheme '{}'",
            url.scheme()
        )));
    }
    Ok(base_url.trim_end_matches('/').to_string())
}
