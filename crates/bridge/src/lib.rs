//! `rest-mcp-bridge`: serve the tools generated from an `OpenAPI` document over MCP stdio.

pub mod cli;
pub mod logging;
pub mod server;

use anyhow::Context as _;
use rest_mcp_openapi_tools::document::Document;
use rest_mcp_openapi_tools::executor::RequestExecutor;
use rest_mcp_openapi_tools::registry::{ToolTable, register_tools};
use rmcp::ServiceExt as _;
use std::sync::Arc;

/// Load, register, and serve until the client disconnects.
///
/// # Errors
///
/// Returns an error if the document cannot be loaded, the configuration cannot be resolved, or
/// the stdio transport fails.
pub async fn run(cli: cli::Cli) -> anyhow::Result<()> {
    let location = cli.spec.display().to_string();
    let document = Document::load(&cli.spec)
        .with_context(|| format!("failed to load OpenAPI document '{location}'"))?;

    let config = cli
        .bridge_config()
        .resolve(&document, &location, |var| std::env::var(var).ok())
        .context("invalid configuration")?;

    let client = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let base_url = config.base_url.clone();
    let executor = RequestExecutor::new(client, Arc::new(config));

    let mut tools = ToolTable::new();
    let report = register_tools(&mut tools, &document, &executor);
    tracing::info!(
        tools = report.tools(),
        operations = report.operations,
        base_url = %base_url,
        "Serving {} over stdio",
        document.title
    );

    let server = server::RestMcpServer::new(cli.server_name, &document, tools);
    let service = server
        .serve(rmcp::transport::stdio())
        .await
        .context("failed to start MCP stdio transport")?;
    let reason = service.waiting().await.context("MCP server task failed")?;
    tracing::info!(?reason, "MCP client disconnected");
    Ok(())
}
