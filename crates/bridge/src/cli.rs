use crate::logging::LogFormat;
use clap::{Parser, ValueEnum};
use rest_mcp_openapi_tools::config::{BridgeConfig, ToolNaming};
use rest_mcp_openapi_tools::credentials::{
    CredentialPolicy, CredentialRule, DEFAULT_CREDENTIAL_ENV, DEFAULT_CREDENTIAL_PARAM,
};
use std::path::PathBuf;
use std::time::Duration;

/// Expose the operations of an `OpenAPI` 3.x REST API as MCP tools over stdio
#[derive(Parser, Debug)]
#[command(name = "rest-mcp-bridge", version, about)]
pub struct Cli {
    /// Path to the `OpenAPI` 3.x document (YAML or JSON)
    pub spec: PathBuf,

    /// Base URL override (defaults to the document's first server)
    #[arg(long, env = "REST_MCP_BASE_URL")]
    pub base_url: Option<String>,

    /// Query parameter that carries the API credential
    #[arg(long, default_value = DEFAULT_CREDENTIAL_PARAM)]
    pub credential_param: String,

    /// Environment variable holding the API credential
    #[arg(long, default_value = DEFAULT_CREDENTIAL_ENV)]
    pub credential_env: String,

    /// Inject another query parameter from the environment (repeatable)
    #[arg(long = "inject", value_name = "PARAM=ENV_VAR")]
    pub inject: Vec<CredentialRule>,

    /// Outbound request timeout in seconds (0 disables it)
    #[arg(long, default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Maximum upstream response body size in bytes
    #[arg(long)]
    pub max_response_bytes: Option<usize>,

    /// How tool names are derived from operations
    #[arg(long, value_enum, default_value_t = NamingArg::Path)]
    pub tool_naming: NamingArg,

    /// Name reported in the MCP `serverInfo`
    #[arg(long, default_value = "rest-mcp")]
    pub server_name: String,

    /// Log level (error, warn, info, debug, trace); `RUST_LOG` takes precedence
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log output format (written to stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NamingArg {
    /// Sanitized path (operations on the same path collide)
    Path,
    /// Sanitized `{method}_{path}`
    MethodPath,
}

impl From<NamingArg> for ToolNaming {
    fn from(value: NamingArg) -> Self {
        match value {
            NamingArg::Path => ToolNaming::Path,
            NamingArg::MethodPath => ToolNaming::MethodPath,
        }
    }
}

impl Cli {
    /// Fold the flags into the library configuration. `--inject` rules apply after the default
    /// credential rule.
    #[must_use]
    pub fn bridge_config(&self) -> BridgeConfig {
        let mut rules = vec![CredentialRule::from_env(
            self.credential_param.as_str(),
            self.credential_env.as_str(),
        )];
        rules.extend(self.inject.iter().cloned());

        BridgeConfig {
            base_url: self.base_url.clone(),
            credentials: CredentialPolicy::new(rules),
            request_timeout: (self.request_timeout_secs > 0)
                .then(|| Duration::from_secs(self.request_timeout_secs)),
            max_response_bytes: self.max_response_bytes,
            tool_naming: self.tool_naming.into(),
        }
    }
}
