//! Request execution for a single tool invocation.
//!
//! Each registered tool owns a [`BoundOperation`] (captured by value at registration time) and a
//! clone of the shared [`RequestExecutor`]. Invocations never touch shared mutable state, so any
//! number of them may run concurrently.

use crate::config::ResolvedConfig;
use crate::document::Operation;
use crate::error::InvocationError;
use crate::safety::{read_response_body_limited, redact_url, sanitize_reqwest_error};
use crate::schema::{ParamBinding, classify_parameter};
use base64::Engine as _;
use futures::FutureExt as _;
use futures::future::BoxFuture;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Method, StatusCode, Version};
use rmcp::model::{CallToolResult, Content, JsonObject};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

/// Boxed per-tool invocation entry point.
pub type ToolHandler = Arc<dyn Fn(JsonObject) -> BoxFuture<'static, CallToolResult> + Send + Sync>;

/// The operation a tool is bound to.
#[derive(Debug, Clone)]
pub struct BoundOperation {
    pub tool_name: String,
    pub method: Method,
    /// Literal path template from the document (not the sanitized identifier).
    pub path: String,
    pub operation: Operation,
}

/// Concrete query pairs for one invocation, in declaration order.
pub type InvocationBinding = Vec<(String, String)>;

/// Result of a completed HTTP exchange, whatever its status code.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseArtifact {
    pub status: StatusCode,
    pub version: Version,
    /// Header names are lowercase; repeated values are joined with `", "`.
    pub headers: BTreeMap<String, String>,
    /// UTF-8 body as a string, otherwise `{"encoding":"base64","mimeType":..,"data":..}`.
    pub body: Value,
}

impl ResponseArtifact {
    #[must_use]
    pub fn render(&self) -> String {
        let reason = self.status.canonical_reason().unwrap_or("");
        let headers = serde_json::to_string(&self.headers).unwrap_or_else(|_| "{}".to_string());
        let body = match &self.body {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        format!(
            "Status: {} {reason}\nStatus Code: {}\nProtocol: {}\nHeaders: {headers}\nBody: {body}",
            self.status.as_u16(),
            self.status.as_u16(),
            protocol_name(self.version),
        )
    }

    #[must_use]
    pub fn structured(&self) -> Value {
        json!({
            "status": self.status.canonical_reason().unwrap_or(""),
            "statusCode": self.status.as_u16(),
            "protocol": protocol_name(self.version),
            "headers": self.headers,
            "body": self.body,
        })
    }

    #[must_use]
    pub fn into_call_tool_result(self) -> CallToolResult {
        let text = self.render();
        let structured = self.structured();
        CallToolResult {
            content: vec![Content::text(text)],
            structured_content: Some(structured),
            is_error: Some(false),
            meta: None,
        }
    }
}

fn protocol_name(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/1.1",
    }
}

/// Executes bound operations against the configured base URL.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: Client,
    config: Arc<ResolvedConfig>,
}

impl RequestExecutor {
    #[must_use]
    pub fn new(client: Client, config: Arc<ResolvedConfig>) -> Self {
        Self { client, config }
    }

    #[must_use]
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Compute the query pairs for one call.
    ///
    /// Credential parameters always take their configured value; a caller-supplied value under
    /// the same name is ignored. Arguments that match no declared parameter are ignored too.
    ///
    /// # Errors
    ///
    /// Fails on the first required parameter that has no value or cannot be bound.
    pub fn bind(
        &self,
        operation: &BoundOperation,
        arguments: &JsonObject,
    ) -> Result<InvocationBinding, InvocationError> {
        let credentials = &self.config.credentials;
        let mut pairs = InvocationBinding::new();

        for param in &operation.operation.parameters {
            match classify_parameter(param, credentials) {
                ParamBinding::Credential => {
                    if let Some(value) = credentials.value_for(&param.name) {
                        pairs.push((param.name.clone(), value.to_string()));
                    }
                }
                ParamBinding::Caller => match arguments.get(&param.name).and_then(argument_value) {
                    Some(value) => pairs.push((param.name.clone(), value)),
                    None if param.required => {
                        return Err(InvocationError::MissingParameter(param.name.clone()));
                    }
                    None => {}
                },
                ParamBinding::Unsupported(reason) => {
                    if param.required {
                        return Err(InvocationError::UnbindableParameter {
                            name: param.name.clone(),
                            reason: reason.to_string(),
                        });
                    }
                    tracing::debug!(
                        tool = %operation.tool_name,
                        param = %param.name,
                        "Skipping optional parameter: {reason}"
                    );
                }
            }
        }

        Ok(pairs)
    }

    /// `base_url + path`, with the binding appended as the query string.
    ///
    /// # Errors
    ///
    /// Returns an error if the concatenation is not a valid URL.
    pub fn target_url(
        &self,
        operation: &BoundOperation,
        binding: &InvocationBinding,
    ) -> Result<Url, InvocationError> {
        let raw = format!("{}{}", self.config.base_url, operation.path);
        let mut url = Url::parse(&raw).map_err(|e| InvocationError::InvalidUrl {
            url: raw.clone(),
            message: e.to_string(),
        })?;
        if !binding.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(binding.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    /// Perform the HTTP exchange for one call.
    ///
    /// Any HTTP status is a successful exchange. Only GET is dispatched; other methods fail
    /// before binding and never reach the network.
    ///
    /// # Errors
    ///
    /// Returns an [`InvocationError`] for unsupported methods, binding failures, and transport
    /// failures (including timeouts and oversized bodies).
    pub async fn execute(
        &self,
        operation: &BoundOperation,
        arguments: &JsonObject,
    ) -> Result<ResponseArtifact, InvocationError> {
        if operation.method != Method::GET {
            return Err(InvocationError::UnsupportedMethod(
                operation.method.to_string(),
            ));
        }

        let binding = self.bind(operation, arguments)?;
        let url = self.target_url(operation, &binding)?;
        let redacted = redact_url(&url);
        let transport = |message: String| InvocationError::Transport {
            method: operation.method.to_string(),
            url: redacted.clone(),
            message,
        };

        tracing::debug!(tool = %operation.tool_name, url = %redacted, "Dispatching request");

        let mut request = self.client.request(operation.method.clone(), url);
        if let Some(timeout) = self.config.request_timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport(sanitize_reqwest_error(&e)))?;

        let status = response.status();
        let version = response.version();
        let headers = collect_headers(response.headers());
        let content_type = headers.get(CONTENT_TYPE.as_str()).cloned();

        let bytes = read_response_body_limited(response, self.config.max_response_bytes)
            .await
            .map_err(|e| transport(e.message()))?;

        Ok(ResponseArtifact {
            status,
            version,
            headers,
            body: body_value(&bytes, content_type.as_deref()),
        })
    }

    /// Run one call and fold the outcome into a tool result. Never fails: every error becomes
    /// an `is_error` result carrying the message.
    pub async fn invoke(&self, operation: &BoundOperation, arguments: &JsonObject) -> CallToolResult {
        match self.execute(operation, arguments).await {
            Ok(artifact) => {
                tracing::info!(
                    tool = %operation.tool_name,
                    status = artifact.status.as_u16(),
                    "Tool call completed"
                );
                artifact.into_call_tool_result()
            }
            Err(e) => {
                tracing::warn!(tool = %operation.tool_name, "Tool call failed: {e}");
                CallToolResult::error(vec![Content::text(e.to_string())])
            }
        }
    }

    /// Handler closure owning this executor and `operation`.
    #[must_use]
    pub fn handler(&self, operation: Arc<BoundOperation>) -> ToolHandler {
        let executor = self.clone();
        Arc::new(move |arguments: JsonObject| {
            let executor = executor.clone();
            let operation = Arc::clone(&operation);
            async move { executor.invoke(&operation, &arguments).await }.boxed()
        })
    }
}

/// Caller argument as a query value. `null` counts as absent.
fn argument_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    out
}

fn body_value(bytes: &[u8], content_type: Option<&str>) -> Value {
    if let Ok(s) = std::str::from_utf8(bytes) {
        Value::String(s.to_string())
    } else {
        json!({
            "encoding": "base64",
            "mimeType": content_type,
            "data": base64::engine::general_purpose::STANDARD.encode(bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::ResolvedCredentials;
    use crate::document::{ParamLocation, ParamType, Parameter};
    use rest_mcp_test_support::{MockResponse, MockUpstream};
    use std::time::Duration;

    fn query(name: &str, required: bool) -> Parameter {
        Parameter {
            name: name.to_string(),
            location: ParamLocation::Query,
            required,
            param_type: ParamType::String,
        }
    }

    fn ip_geo(method: Method) -> BoundOperation {
        BoundOperation {
            tool_name: "_v1_ip-geo".to_string(),
            method,
            path: "/v1/ip-geo".to_string(),
            operation: Operation {
                parameters: vec![query("api_key", true), query("ip", true), query("lang", false)],
                ..Operation::default()
            },
        }
    }

    fn executor(base_url: &str) -> RequestExecutor {
        let credentials: ResolvedCredentials = [("api_key", "K")].into_iter().collect();
        RequestExecutor::new(
            Client::new(),
            Arc::new(ResolvedConfig::new(base_url, credentials)),
        )
    }

    fn args(value: Value) -> JsonObject {
        value.as_object().cloned().unwrap_or_default()
    }

    fn result_text(result: &CallToolResult) -> String {
        let v = serde_json::to_value(result).expect("CallToolResult serializes");
        v["content"][0]["text"].as_str().expect("content[0].text").to_string()
    }

    #[test]
    fn test_bind_injects_credential_and_orders_by_declaration() {
        let exec = executor("http://127.0.0.1:9");
        let binding = exec
            .bind(&ip_geo(Method::GET), &args(json!({ "lang": "en", "ip": "8.8.8.8" })))
            .unwrap();
        assert_eq!(
            binding,
            vec![
                ("api_key".to_string(), "K".to_string()),
                ("ip".to_string(), "8.8.8.8".to_string()),
                ("lang".to_string(), "en".to_string()),
            ]
        );
    }

    #[test]
    fn test_bind_treats_null_as_absent() {
        let exec = executor("http://127.0.0.1:9");
        let err = exec
            .bind(&ip_geo(Method::GET), &args(json!({ "ip": null })))
            .unwrap_err();
        assert_eq!(err, InvocationError::MissingParameter("ip".to_string()));
        assert_eq!(err.to_string(), "Required param ip but not provided.");
    }

    #[test]
    fn test_target_url_keeps_literal_path() {
        let exec = executor("https://api.example.com/base/");
        let op = BoundOperation {
            path: "/pet/{petId}".to_string(),
            ..ip_geo(Method::GET)
        };
        let url = exec.target_url(&op, &InvocationBinding::new()).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/base/pet/%7BpetId%7D");
        assert_eq!(url.query(), None);
    }

    #[tokio::test]
    async fn test_missing_required_param_makes_no_request() {
        let upstream = MockUpstream::respond_with(200, r#"{"ok":true}"#).await.unwrap();
        let exec = executor(upstream.base_url());

        let result = exec.invoke(&ip_geo(Method::GET), &args(json!({}))).await;

        assert_eq!(result.is_error, Some(true));
        assert_eq!(result_text(&result), "Required param ip but not provided.");
        assert_eq!(upstream.hits(), 0);
    }

    #[tokio::test]
    async fn test_get_returns_full_response_artifact() {
        let upstream = MockUpstream::respond_with(200, r#"{"ok":true}"#).await.unwrap();
        let exec = executor(upstream.base_url());

        let result = exec
            .invoke(&ip_geo(Method::GET), &args(json!({ "ip": "8.8.8.8" })))
            .await;

        assert_eq!(result.is_error, Some(false));
        let text = result_text(&result);
        assert!(text.starts_with("Status: 200 OK\nStatus Code: 200\n"), "{text}");
        assert!(text.contains("Protocol: HTTP/1.1"), "{text}");
        assert!(text.contains(r#""content-type":"application/json""#), "{text}");
        assert!(text.ends_with(r#"Body: {"ok":true}"#), "{text}");

        let structured = result.structured_content.expect("structured content");
        assert_eq!(structured["statusCode"], 200);
        assert_eq!(structured["body"], r#"{"ok":true}"#);

        let requests = upstream.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[0].path, "/v1/ip-geo");
        assert_eq!(requests[0].query_value("api_key"), Some("K"));
        assert_eq!(requests[0].query_value("ip"), Some("8.8.8.8"));
        assert_eq!(requests[0].query_value("lang"), None);
    }

    #[tokio::test]
    async fn test_caller_cannot_override_credential() {
        let upstream = MockUpstream::respond_with(200, "{}").await.unwrap();
        let exec = executor(upstream.base_url());

        let result = exec
            .invoke(
                &ip_geo(Method::GET),
                &args(json!({ "ip": "1.1.1.1", "api_key": "evil", "extra": "x" })),
            )
            .await;

        assert_eq!(result.is_error, Some(false));
        let requests = upstream.requests();
        assert_eq!(requests[0].query_value("api_key"), Some("K"));
        assert_eq!(requests[0].query_value("extra"), None);
    }

    #[tokio::test]
    async fn test_non_get_methods_never_reach_upstream() {
        let upstream = MockUpstream::respond_with(200, "{}").await.unwrap();
        let exec = executor(upstream.base_url());

        for method in [Method::POST, Method::PUT, Method::DELETE, Method::PATCH] {
            for input in [json!({}), json!({ "ip": "8.8.8.8" })] {
                let result = exec.invoke(&ip_geo(method.clone()), &args(input)).await;
                assert_eq!(result.is_error, Some(true));
                assert_eq!(result_text(&result), format!("Unsupported method {method}"));
            }
        }
        assert_eq!(upstream.hits(), 0);
    }

    #[tokio::test]
    async fn test_required_header_param_is_unbindable() {
        let upstream = MockUpstream::respond_with(200, "{}").await.unwrap();
        let exec = executor(upstream.base_url());
        let mut op = ip_geo(Method::GET);
        op.operation.parameters.push(Parameter {
            name: "X-Trace".to_string(),
            location: ParamLocation::Header,
            required: true,
            param_type: ParamType::String,
        });

        let err = exec
            .execute(&op, &args(json!({ "ip": "8.8.8.8", "X-Trace": "t" })))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Required param X-Trace cannot be provided: params in header are not supported"
        );
        assert_eq!(upstream.hits(), 0);
    }

    #[tokio::test]
    async fn test_error_status_is_still_a_successful_call() {
        let upstream = MockUpstream::respond_with(404, r#"{"error":"nope"}"#).await.unwrap();
        let exec = executor(upstream.base_url());

        let result = exec
            .invoke(&ip_geo(Method::GET), &args(json!({ "ip": "8.8.8.8" })))
            .await;

        assert_eq!(result.is_error, Some(false));
        let text = result_text(&result);
        assert!(text.starts_with("Status: 404 Not Found\nStatus Code: 404"), "{text}");
        assert!(text.ends_with(r#"Body: {"error":"nope"}"#), "{text}");
    }

    #[tokio::test]
    async fn test_transport_failure_is_redacted_error_result() {
        let exec = executor("http://127.0.0.1:1");

        let result = exec
            .invoke(&ip_geo(Method::GET), &args(json!({ "ip": "8.8.8.8" })))
            .await;

        assert_eq!(result.is_error, Some(true));
        let text = result_text(&result);
        assert!(
            text.starts_with("Error when performing GET http://127.0.0.1:1/v1/ip-geo: "),
            "{text}"
        );
        assert!(!text.contains("api_key=K"), "{text}");
    }

    #[tokio::test]
    async fn test_request_timeout_is_transport_failure() {
        let upstream = MockUpstream::start(MockResponse {
            delay: Duration::from_secs(5),
            ..MockResponse::fixed(200, "{}")
        })
        .await
        .unwrap();
        let credentials: ResolvedCredentials = [("api_key", "K")].into_iter().collect();
        let mut config = ResolvedConfig::new(upstream.base_url(), credentials);
        config.request_timeout = Some(Duration::from_millis(100));
        let exec = RequestExecutor::new(Client::new(), Arc::new(config));

        let err = exec
            .execute(&ip_geo(Method::GET), &args(json!({ "ip": "8.8.8.8" })))
            .await
            .unwrap_err();

        let InvocationError::Transport { message, .. } = err else {
            panic!("expected transport error, got {err:?}");
        };
        assert!(message.contains("timed out"), "{message}");
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let upstream = MockUpstream::respond_with(200, "x".repeat(1024)).await.unwrap();
        let credentials: ResolvedCredentials = [("api_key", "K")].into_iter().collect();
        let mut config = ResolvedConfig::new(upstream.base_url(), credentials);
        config.max_response_bytes = Some(16);
        let exec = RequestExecutor::new(Client::new(), Arc::new(config));

        let result = exec
            .invoke(&ip_geo(Method::GET), &args(json!({ "ip": "8.8.8.8" })))
            .await;

        assert_eq!(result.is_error, Some(true));
        assert!(result_text(&result).contains("Response too large"));
    }

    #[tokio::test]
    async fn test_concurrent_invocations_do_not_share_bindings() {
        let upstream = MockUpstream::start(MockResponse::echo_query()).await.unwrap();
        let exec = executor(upstream.base_url());
        let op = Arc::new(ip_geo(Method::GET));
        let handler = exec.handler(Arc::clone(&op));

        let calls = (0..16).map(|i| {
            let handler = Arc::clone(&handler);
            async move {
                let ip = format!("10.0.0.{i}");
                let result = handler(args(json!({ "ip": ip.clone() }))).await;
                (ip, result)
            }
        });
        let results = futures::future::join_all(calls).await;

        for (ip, result) in results {
            let structured = result.structured_content.expect("structured content");
            let body = structured["body"].as_str().expect("echoed query");
            assert!(body.contains(&format!("ip={ip}")), "{ip}: {body}");
            assert!(body.starts_with("api_key=K&"), "{body}");
        }
        assert_eq!(upstream.hits(), 16);
    }

    #[test]
    fn test_non_utf8_body_is_base64() {
        let v = body_value(&[0xff, 0xfe], Some("application/octet-stream"));
        assert_eq!(v["encoding"], "base64");
        assert_eq!(v["data"], "//4=");
    }

    #[test]
    fn test_repeated_headers_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append("x-multi", "a".parse().unwrap());
        headers.append("x-multi", "b".parse().unwrap());
        let collected = collect_headers(&headers);
        assert_eq!(collected.get("x-multi").map(String::as_str), Some("a, b"));
    }
}
