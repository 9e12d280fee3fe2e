//! MCP server surface over the generated tool table.

use rest_mcp_openapi_tools::document::Document;
use rest_mcp_openapi_tools::registry::ToolTable;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Implementation, JsonObject, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData, RoleServer, ServerHandler};
use std::sync::Arc;

/// Serves `tools/list` and `tools/call` from a fixed [`ToolTable`].
#[derive(Debug, Clone)]
pub struct RestMcpServer {
    name: String,
    instructions: String,
    tools: Arc<ToolTable>,
}

impl RestMcpServer {
    #[must_use]
    pub fn new(name: String, document: &Document, tools: ToolTable) -> Self {
        let mut instructions = format!("Tools for the {} REST API.", document.title);
        if !document.description.is_empty() {
            instructions.push(' ');
            instructions.push_str(&document.description);
        }
        Self {
            name,
            instructions,
            tools: Arc::new(tools),
        }
    }

    #[must_use]
    pub fn tools(&self) -> &ToolTable {
        &self.tools
    }

    /// Route one call. Unknown tools are a protocol error; everything else is a tool result.
    ///
    /// # Errors
    ///
    /// Returns `invalid_params` if no tool is registered under `name`.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: JsonObject,
    ) -> Result<CallToolResult, ErrorData> {
        match self.tools.call(name, arguments) {
            Some(call) => Ok(call.await),
            None => {
                tracing::warn!(tool = %name, "Call to unknown tool");
                Err(ErrorData::invalid_params(format!("Unknown tool: {name}"), None))
            }
        }
    }
}

impl ServerHandler for RestMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut server_info = Implementation::from_build_env();
        server_info.name.clone_from(&self.name);
        server_info.version = env!("CARGO_PKG_VERSION").to_string();

        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info,
            instructions: Some(self.instructions.clone()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult {
            tools: self.tools.list_tools(),
            ..Default::default()
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        self.dispatch(&request.name, request.arguments.unwrap_or_default())
            .await
    }
}
