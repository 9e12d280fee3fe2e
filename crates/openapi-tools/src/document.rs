//! Normalized, read-only view of an `OpenAPI` 3.x document.
//!
//! Parsing and structural validation are delegated to `openapiv3`; this module flattens the parsed
//! tree into the few facts tool generation needs (paths, methods, parameters) and resolves
//! `$ref`s on the way. Anything that cannot be resolved degrades with a warning.

use crate::error::{OpenApiToolsError, Result};
use crate::resolver::{DocId, OpenApiResolver};
use openapiv3::{OpenAPI, ParameterSchemaOrContent, ReferenceOr, SchemaKind, Type};
use reqwest::Method;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Where a parameter travels in the HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamLocation {
    Query,
    Header,
    Path,
    Cookie,
}

impl ParamLocation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ParamLocation::Query => "query",
            ParamLocation::Header => "header",
            ParamLocation::Path => "path",
            ParamLocation::Cookie => "cookie",
        }
    }
}

impl fmt::Display for ParamLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared parameter type. Only strings are bindable today.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    String,
    /// Any other declared shape, named for diagnostics (`integer`, `array`, `oneOf`, ...).
    Other(String),
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::String => f.write_str("string"),
            ParamType::Other(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub location: ParamLocation,
    pub required: bool,
    pub param_type: ParamType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Operation {
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// Path-level parameters merged with operation-level ones, in declaration order.
    pub parameters: Vec<Parameter>,
}

/// Operations of one path, in a fixed method order.
#[derive(Debug, Clone, Default)]
pub struct PathItem {
    pub operations: Vec<(Method, Operation)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    /// Server URL with `{variable}` placeholders replaced by their defaults.
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    pub title: String,
    pub description: String,
    pub servers: Vec<Server>,
    /// Paths in declaration order.
    pub paths: Vec<(String, PathItem)>,
}

impl Document {
    /// Load and normalize an `OpenAPI` document (YAML or JSON) from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse as `OpenAPI` 3.x, or declares a
    /// different major version.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::info!("Loading OpenAPI spec from {}", path.display());
        let content =
            std::fs::read_to_string(path).map_err(|e| OpenApiToolsError::OpenApiSpecReadFile {
                path: path.display().to_string(),
                source: e,
            })?;
        Self::parse(&content, &path.display().to_string(), DocId::file(path))
    }

    /// Parse and normalize a document held in memory. Only local `$ref`s resolve.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`], minus the file read.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Self::parse(content, "<inline>", DocId::Inline)
    }

    fn parse(content: &str, location: &str, doc_id: DocId) -> Result<Self> {
        // JSON is a valid subset of YAML, so serde_yaml alone is enough.
        let spec: OpenAPI =
            serde_yaml::from_str(content).map_err(|e| OpenApiToolsError::OpenApiSpecParse {
                location: location.to_string(),
                source: e,
            })?;

        if !spec.openapi.starts_with("3.") {
            return Err(OpenApiToolsError::OpenApi(format!(
                "Unsupported OpenAPI version '{}' in '{location}' (only 3.x is supported)",
                spec.openapi
            )));
        }

        let resolver = OpenApiResolver::new(doc_id, &spec)?;
        Ok(Self::normalize(&spec, &resolver))
    }

    fn normalize(spec: &OpenAPI, resolver: &OpenApiResolver) -> Self {
        let servers = spec
            .servers
            .iter()
            .map(|s| Server {
                url: expand_server_variables(s),
            })
            .collect();

        let mut paths = Vec::with_capacity(spec.paths.paths.len());
        for (path, item) in &spec.paths.paths {
            let (path_doc, item) = match resolver.resolve(resolver.root_doc(), item) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(path = %path, "Skipping path: {e}");
                    continue;
                }
            };

            let methods = [
                (Method::GET, &item.get),
                (Method::PUT, &item.put),
                (Method::POST, &item.post),
                (Method::DELETE, &item.delete),
                (Method::OPTIONS, &item.options),
                (Method::HEAD, &item.head),
                (Method::PATCH, &item.patch),
                (Method::TRACE, &item.trace),
            ];

            let operations = methods
                .into_iter()
                .filter_map(|(method, op)| op.as_ref().map(|op| (method, op)))
                .map(|(method, op)| {
                    let parameters =
                        merge_parameters(resolver, &path_doc, &item.parameters, &op.parameters);
                    let operation = Operation {
                        operation_id: op.operation_id.clone(),
                        summary: op.summary.clone(),
                        description: op.description.clone(),
                        parameters,
                    };
                    (method, operation)
                })
                .collect();

            paths.push((path.clone(), PathItem { operations }));
        }

        Self {
            title: spec.info.title.clone(),
            description: spec.info.description.clone().unwrap_or_default(),
            servers,
            paths,
        }
    }

    /// URL of the first declared server, if any.
    #[must_use]
    pub fn first_server_url(&self) -> Option<&str> {
        self.servers.first().map(|s| s.url.as_str())
    }

    /// Total number of (path, method) operations.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.paths.iter().map(|(_, item)| item.operations.len()).sum()
    }
}

fn expand_server_variables(server: &openapiv3::Server) -> String {
    let mut url = server.url.clone();
    if let Some(vars) = &server.variables {
        for (name, var) in vars {
            url = url.replace(&format!("{{{name}}}"), &var.default);
        }
    }
    url
}

/// Merge path-level and operation-level parameters; operation entries win on (location, name).
fn merge_parameters(
    resolver: &OpenApiResolver,
    current_doc: &DocId,
    path_item_params: &[ReferenceOr<openapiv3::Parameter>],
    operation_params: &[ReferenceOr<openapiv3::Parameter>],
) -> Vec<Parameter> {
    let mut merged: Vec<Parameter> = Vec::new();
    let mut index: HashMap<(ParamLocation, String), usize> = HashMap::new();

    for p in path_item_params.iter().chain(operation_params) {
        let param = match resolver.resolve(current_doc, p) {
            Ok((param_doc, param)) => normalize_parameter(resolver, &param_doc, &param),
            Err(e) => {
                tracing::warn!("Skipping unresolvable parameter: {e}");
                continue;
            }
        };

        let key = (param.location, param.name.clone());
        if let Some(i) = index.get(&key).copied() {
            merged[i] = param;
        } else {
            index.insert(key, merged.len());
            merged.push(param);
        }
    }

    merged
}

fn normalize_parameter(
    resolver: &OpenApiResolver,
    current_doc: &DocId,
    param: &openapiv3::Parameter,
) -> Parameter {
    let (data, location) = match param {
        openapiv3::Parameter::Query { parameter_data, .. } => (parameter_data, ParamLocation::Query),
        openapiv3::Parameter::Header { parameter_data, .. } => {
            (parameter_data, ParamLocation::Header)
        }
        openapiv3::Parameter::Path { parameter_data, .. } => (parameter_data, ParamLocation::Path),
        openapiv3::Parameter::Cookie { parameter_data, .. } => {
            (parameter_data, ParamLocation::Cookie)
        }
    };

    Parameter {
        name: data.name.clone(),
        location,
        required: data.required,
        param_type: declared_type(resolver, current_doc, &data.format),
    }
}

fn declared_type(
    resolver: &OpenApiResolver,
    current_doc: &DocId,
    format: &ParameterSchemaOrContent,
) -> ParamType {
    let schema_ref = match format {
        ParameterSchemaOrContent::Schema(s) => s,
        ParameterSchemaOrContent::Content(_) => return ParamType::Other("content".to_string()),
    };

    let schema = match resolver.resolve(current_doc, schema_ref) {
        Ok((_doc, schema)) => schema,
        Err(e) => {
            tracing::warn!("Unresolvable parameter schema: {e}");
            return ParamType::Other("unresolved $ref".to_string());
        }
    };

    let name = match &schema.schema_kind {
        SchemaKind::Type(Type::String(_)) => return ParamType::String,
        SchemaKind::Type(Type::Number(_)) => "number",
        SchemaKind::Type(Type::Integer(_)) => "integer",
        SchemaKind::Type(Type::Boolean(_)) => "boolean",
        SchemaKind::Type(Type::Array(_)) => "array",
        SchemaKind::Type(Type::Object(_)) => "object",
        SchemaKind::OneOf { .. } => "oneOf",
        SchemaKind::AllOf { .. } => "allOf",
        SchemaKind::AnyOf { .. } => "anyOf",
        SchemaKind::Not { .. } => "not",
        SchemaKind::Any(any) => match any.typ.as_deref() {
            Some("string") => return ParamType::String,
            Some(other) => return ParamType::Other(other.to_string()),
            None => "any",
        },
    };
    ParamType::Other(name.to_string())
}
