//! Exposed parameter schema for a tool.
//!
//! Every declared parameter is classified exactly once by [`classify_parameter`]; the schema
//! builder and the request executor both act on that classification.

use crate::credentials::ResolvedCredentials;
use crate::document::{Operation, ParamLocation, ParamType, Parameter};
use rmcp::model::JsonObject;
use serde_json::{Value, json};
use std::fmt;

/// How a declared parameter is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamBinding {
    /// Query parameter filled from configuration; never exposed to the caller.
    Credential,
    /// String query parameter filled from caller arguments.
    Caller,
    /// Recognized but not bindable.
    Unsupported(Unsupported),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unsupported {
    Location(ParamLocation),
    Type(ParamType),
}

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unsupported::Location(loc) => write!(f, "params in {loc} are not supported"),
            Unsupported::Type(ty) => write!(f, "param type {ty} is not supported"),
        }
    }
}

#[must_use]
pub fn classify_parameter(param: &Parameter, credentials: &ResolvedCredentials) -> ParamBinding {
    match (param.location, &param.param_type) {
        (ParamLocation::Query, _) if credentials.is_credential(&param.name) => {
            ParamBinding::Credential
        }
        (ParamLocation::Query, ParamType::String) => ParamBinding::Caller,
        (ParamLocation::Query, other) => ParamBinding::Unsupported(Unsupported::Type(other.clone())),
        (loc @ (ParamLocation::Header | ParamLocation::Path | ParamLocation::Cookie), _) => {
            ParamBinding::Unsupported(Unsupported::Location(loc))
        }
    }
}

/// One parameter the caller may fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposedParameter {
    pub name: String,
    pub required: bool,
    pub description: String,
}

/// A parameter left out of the schema, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDiagnostic {
    pub param: String,
    pub required: bool,
    pub reason: Unsupported,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSchema {
    pub exposed: Vec<ExposedParameter>,
    pub diagnostics: Vec<SchemaDiagnostic>,
}

impl ParameterSchema {
    /// Build the exposed schema for an operation. Never fails; unsupported parameters are
    /// reported in `diagnostics` instead.
    #[must_use]
    pub fn build(operation: &Operation, credentials: &ResolvedCredentials) -> Self {
        let mut schema = Self::default();
        for param in &operation.parameters {
            match classify_parameter(param, credentials) {
                ParamBinding::Credential => {}
                ParamBinding::Caller => schema.exposed.push(ExposedParameter {
                    name: param.name.clone(),
                    required: param.required,
                    description: param.name.clone(),
                }),
                ParamBinding::Unsupported(reason) => schema.diagnostics.push(SchemaDiagnostic {
                    param: param.name.clone(),
                    required: param.required,
                    reason,
                }),
            }
        }
        schema
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ExposedParameter> {
        self.exposed.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn input_schema(&self) -> JsonObject {
        input_schema(&self.exposed)
    }
}

/// JSON Schema object for MCP `Tool.input_schema`. Properties keep the order of `parameters`.
#[must_use]
pub fn input_schema(parameters: &[ExposedParameter]) -> JsonObject {
    let mut properties = JsonObject::new();
    let mut required: Vec<Value> = Vec::new();

    for param in parameters {
        properties.insert(
            param.name.clone(),
            json!({ "type": "string", "description": param.description }),
        );
        if param.required {
            required.push(Value::String(param.name.clone()));
        }
    }

    let mut schema = JsonObject::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    schema
}
