//! HTTP method semantics as MCP `ToolAnnotations`.

use reqwest::Method;
use rmcp::model::ToolAnnotations;

/// Annotations for a tool that issues `method` against an external API.
///
/// `openWorldHint` is always `true`. Extension methods only get that hint.
#[must_use]
pub fn annotations_for_method(method: &Method) -> ToolAnnotations {
    // (read_only, destructive, idempotent)
    let hints = match method.as_str() {
        "GET" | "HEAD" | "OPTIONS" | "TRACE" => Some((true, false, Some(true))),
        "POST" => Some((false, false, Some(false))),
        "PUT" | "DELETE" => Some((false, true, Some(true))),
        // PATCH may or may not be idempotent; do not guess.
        "PATCH" => Some((false, true, None)),
        _ => None,
    };

    let (read_only_hint, destructive_hint, idempotent_hint) = match hints {
        Some((read_only, destructive, idempotent)) => {
            (Some(read_only), Some(destructive), idempotent)
        }
        None => (None, None, None),
    };

    ToolAnnotations {
        title: None,
        read_only_hint,
        destructive_hint,
        idempotent_hint,
        open_world_hint: Some(true),
    }
}
