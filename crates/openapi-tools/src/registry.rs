//! Tool registration: one tool per `(path, method)` operation.

use crate::config::ToolNaming;
use crate::describe::describe_operation;
use crate::document::Document;
use crate::executor::{BoundOperation, RequestExecutor, ToolHandler};
use crate::sanitize::sanitize_identifier;
use crate::schema::{ExposedParameter, ParameterSchema, input_schema};
use crate::semantics::annotations_for_method;
use futures::future::BoxFuture;
use reqwest::Method;
use rmcp::model::{CallToolResult, JsonObject, Tool};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Everything a host needs to advertise one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ExposedParameter>,
    pub method: Method,
    /// Literal path the tool was generated from.
    pub path: String,
}

impl ToolDefinition {
    #[must_use]
    pub fn to_mcp_tool(&self) -> Tool {
        let mut tool = Tool::new(
            self.name.clone(),
            self.description.clone(),
            Arc::new(input_schema(&self.parameters)),
        );
        tool.annotations = Some(annotations_for_method(&self.method));
        tool
    }
}

/// Host-side sink for generated tools.
pub trait ToolRegistrar {
    /// Add `definition`, replacing any tool with the same name. Returns the replaced definition.
    fn add_tool(&mut self, definition: ToolDefinition, handler: ToolHandler)
    -> Option<ToolDefinition>;
}

#[derive(Clone)]
struct RegisteredTool {
    definition: ToolDefinition,
    handler: ToolHandler,
}

/// In-memory registrar, and the lookup table the MCP server dispatches through.
#[derive(Clone, Default)]
pub struct ToolTable {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name).map(|t| &t.definition)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// MCP tool listing, sorted by name.
    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.names()
            .into_iter()
            .filter_map(|name| self.get(name))
            .map(ToolDefinition::to_mcp_tool)
            .collect()
    }

    /// Start a call to `name`. `None` if no such tool exists.
    #[must_use]
    pub fn call(&self, name: &str, arguments: JsonObject) -> Option<BoxFuture<'static, CallToolResult>> {
        self.tools.get(name).map(|t| (t.handler)(arguments))
    }
}

impl ToolRegistrar for ToolTable {
    fn add_tool(
        &mut self,
        definition: ToolDefinition,
        handler: ToolHandler,
    ) -> Option<ToolDefinition> {
        self.tools
            .insert(definition.name.clone(), RegisteredTool { definition, handler })
            .map(|previous| previous.definition)
    }
}

impl fmt::Debug for ToolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolTable")
            .field("tools", &self.names())
            .finish()
    }
}

/// A tool that replaced an earlier one with the same identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overwrite {
    pub name: String,
    pub replaced: (Method, String),
    pub by: (Method, String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    /// Operations registered (including those later overwritten).
    pub operations: usize,
    /// Declared parameters left out of some tool's schema.
    pub diagnostics: usize,
    pub overwrites: Vec<Overwrite>,
}

impl RegistrationReport {
    /// Distinct tools left after overwrites.
    #[must_use]
    pub fn tools(&self) -> usize {
        self.operations - self.overwrites.len()
    }
}

#[must_use]
pub fn tool_name(naming: ToolNaming, method: &Method, path: &str) -> String {
    match naming {
        ToolNaming::Path => sanitize_identifier(path),
        ToolNaming::MethodPath => {
            sanitize_identifier(&format!("{}_{path}", method.as_str().to_ascii_lowercase()))
        }
    }
}

/// Register one tool per operation of `document`, in document order.
///
/// Paths are visited in declaration order and methods in a fixed order, so when two operations
/// map to the same identifier the later one replaces the earlier one. Each replacement is logged
/// and reported.
pub fn register_tools<R>(
    registrar: &mut R,
    document: &Document,
    executor: &RequestExecutor,
) -> RegistrationReport
where
    R: ToolRegistrar + ?Sized,
{
    let config = executor.config();
    let mut report = RegistrationReport::default();

    for (path, item) in &document.paths {
        let sanitized_path = sanitize_identifier(path);
        for (method, operation) in &item.operations {
            let name = tool_name(config.tool_naming, method, path);
            let schema = ParameterSchema::build(operation, &config.credentials);

            for d in &schema.diagnostics {
                tracing::warn!(
                    tool = %name,
                    method = %method,
                    path = %path,
                    param = %d.param,
                    required = d.required,
                    "{}; parameter left out of the tool schema",
                    d.reason
                );
            }
            report.diagnostics += schema.diagnostics.len();

            let definition = ToolDefinition {
                name: name.clone(),
                description: describe_operation(document, method, &sanitized_path, operation),
                parameters: schema.exposed,
                method: method.clone(),
                path: path.clone(),
            };
            let handler = executor.handler(Arc::new(BoundOperation {
                tool_name: name.clone(),
                method: method.clone(),
                path: path.clone(),
                operation: operation.clone(),
            }));

            report.operations += 1;
            if let Some(previous) = registrar.add_tool(definition, handler) {
                tracing::warn!(
                    tool = %name,
                    replaced = %format!("{} {}", previous.method, previous.path),
                    by = %format!("{method} {path}"),
                    "Tool identifier collision; the later operation wins"
                );
                report.overwrites.push(Overwrite {
                    name,
                    replaced: (previous.method, previous.path),
                    by: (method.clone(), path.clone()),
                });
            }
        }
    }

    tracing::debug!(
        tools = report.tools(),
        operations = report.operations,
        overwrites = report.overwrites.len(),
        "Registered tools"
    );
    report
}
