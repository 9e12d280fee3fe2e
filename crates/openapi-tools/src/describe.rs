//! Tool description synthesis.

use crate::document::{Document, Operation};
use reqwest::Method;

/// Build the description shown to the calling agent.
///
/// Always emits the API title, API description, method and path, one labelled line each (empty
/// values keep their line). The operationId, summary and description follow when the document has
/// them.
#[must_use]
pub fn describe_operation(
    document: &Document,
    method: &Method,
    path: &str,
    operation: &Operation,
) -> String {
    let mut lines = vec![
        format!("API: {}", document.title),
        format!("API description: {}", document.description),
        format!("HTTP method {method}"),
        format!("HTTP path {path}"),
    ];

    if let Some(id) = operation.operation_id.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("Operation: {id}"));
    }
    if let Some(summary) = operation.summary.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("Summary: {summary}"));
    }
    if let Some(details) = operation.description.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("Details: {details}"));
    }

    lines.join("\n")
}
