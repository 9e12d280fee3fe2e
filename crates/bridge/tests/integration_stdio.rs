use anyhow::Context as _;
use rest_mcp_test_support::{MockUpstream, StdioMcpSession, tool_call_text};
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;

const BIN: &str = env!("CARGO_BIN_EXE_rest-mcp-bridge");
const TIMEOUT: Duration = Duration::from_secs(10);

const IP_GEO: &str = r#"
openapi: "3.0.3"
info:
  title: IP Geolocation
  description: Where is this IP?
  version: "1"
servers:
  - url: https://ip-geo.invalid
paths:
  /v1/ip-geo:
    get:
      summary: Geolocate an IP address
      parameters:
        - name: api_key
          in: query
          required: true
          schema: { type: string }
        - name: ip
          in: query
          required: true
          schema: { type: string }
        - name: fields
          in: query
          schema: { type: string }
        - name: X-Request-Id
          in: header
          schema: { type: string }
      responses:
        "200": { description: ok }
  /v1/ip-geo/bulk:
    post:
      responses:
        "200": { description: ok }
"#;

fn write_spec(content: &str) -> anyhow::Result<tempfile::NamedTempFile> {
    let file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .context("create temp spec")?;
    std::fs::write(file.path(), content).context("write temp spec")?;
    Ok(file)
}

fn bridge_command(spec: &Path, base_url: &str) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(BIN);
    cmd.arg(spec)
        .arg("--base-url")
        .arg(base_url)
        .arg("--log-level")
        .arg("debug")
        .env("API_KEY", "secret-key")
        .env_remove("REST_MCP_BASE_URL")
        .env_remove("RUST_LOG");
    cmd
}

#[tokio::test]
async fn stdio_lists_and_calls_generated_tools() -> anyhow::Result<()> {
    let upstream = MockUpstream::respond_with(200, r#"{"country":"US"}"#).await?;
    let spec = write_spec(IP_GEO)?;
    let mut session = StdioMcpSession::spawn(bridge_command(spec.path(), upstream.base_url()))?;

    let init = session.initialize(TIMEOUT).await?;
    assert_eq!(init["serverInfo"]["name"], "rest-mcp");
    assert!(init["capabilities"].get("tools").is_some());

    let listed = session.request(1, "tools/list", json!({}), TIMEOUT).await?;
    let tools = listed["result"]["tools"]
        .as_array()
        .context("tools/list result.tools")?;
    let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    assert_eq!(names, vec!["_v1_ip-geo", "_v1_ip-geo_bulk"]);

    let geo = &tools[0];
    assert_eq!(geo["inputSchema"]["required"], json!(["ip"]));
    let props = geo["inputSchema"]["properties"]
        .as_object()
        .context("inputSchema.properties")?;
    let mut keys: Vec<&str> = props.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["fields", "ip"]);
    let description = geo["description"].as_str().unwrap_or_default();
    assert!(description.contains("IP Geolocation"), "{description}");
    assert!(description.contains("Where is this IP?"), "{description}");
    assert!(description.contains("GET"), "{description}");
    assert!(description.contains("_v1_ip-geo"), "{description}");

    let called = session
        .request(
            2,
            "tools/call",
            json!({ "name": "_v1_ip-geo", "arguments": { "ip": "8.8.8.8" } }),
            TIMEOUT,
        )
        .await?;
    assert_eq!(called["result"]["isError"], false);
    let text = tool_call_text(&called)?;
    assert!(text.starts_with("Status: 200 OK"), "{text}");
    assert!(text.ends_with(r#"Body: {"country":"US"}"#), "{text}");

    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/v1/ip-geo");
    assert_eq!(requests[0].query_value("api_key"), Some("secret-key"));
    assert_eq!(requests[0].query_value("ip"), Some("8.8.8.8"));

    let missing = session
        .request(
            3,
            "tools/call",
            json!({ "name": "_v1_ip-geo", "arguments": {} }),
            TIMEOUT,
        )
        .await?;
    assert_eq!(missing["result"]["isError"], true);
    assert_eq!(
        tool_call_text(&missing)?,
        "Required param ip but not provided."
    );

    let post = session
        .request(
            4,
            "tools/call",
            json!({ "name": "_v1_ip-geo_bulk", "arguments": {} }),
            TIMEOUT,
        )
        .await?;
    assert_eq!(post["result"]["isError"], true);
    assert_eq!(tool_call_text(&post)?, "Unsupported method POST");

    let unknown = session
        .request(
            5,
            "tools/call",
            json!({ "name": "nope", "arguments": {} }),
            TIMEOUT,
        )
        .await?;
    assert!(unknown.get("error").is_some(), "{unknown}");

    assert_eq!(upstream.hits(), 1);

    let status = session.close(TIMEOUT).await?;
    assert!(status.success(), "exit status {status:?}");
    Ok(())
}

#[tokio::test]
async fn stdio_upstream_error_status_is_not_a_tool_error() -> anyhow::Result<()> {
    let upstream = MockUpstream::respond_with(403, r#"{"message":"bad key"}"#).await?;
    let spec = write_spec(IP_GEO)?;
    let mut session = StdioMcpSession::spawn(bridge_command(spec.path(), upstream.base_url()))?;
    session.initialize(TIMEOUT).await?;

    let called = session
        .request(
            1,
            "tools/call",
            json!({ "name": "_v1_ip-geo", "arguments": { "ip": "1.1.1.1" } }),
            TIMEOUT,
        )
        .await?;

    assert_eq!(called["result"]["isError"], false);
    let structured: &Value = &called["result"]["structuredContent"];
    assert_eq!(structured["statusCode"], 403);
    assert!(tool_call_text(&called)?.contains("Status Code: 403"));
    Ok(())
}

#[test]
fn missing_credential_env_var_is_fatal() -> anyhow::Result<()> {
    let spec = write_spec(IP_GEO)?;
    let output = std::process::Command::new(BIN)
        .arg(spec.path())
        .env_remove("API_KEY")
        .env_remove("RUST_LOG")
        .output()
        .context("run bridge")?;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("API_KEY"), "{stderr}");
    assert!(output.stdout.is_empty());
    Ok(())
}

#[test]
fn missing_spec_argument_is_fatal() -> anyhow::Result<()> {
    let output = std::process::Command::new(BIN)
        .env("API_KEY", "k")
        .output()
        .context("run bridge")?;
    assert!(!output.status.success());
    Ok(())
}

#[test]
fn unreadable_spec_is_fatal() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let output = std::process::Command::new(BIN)
        .arg(dir.path().join("missing.yaml"))
        .env("API_KEY", "k")
        .env_remove("RUST_LOG")
        .output()
        .context("run bridge")?;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing.yaml"), "{stderr}");
    Ok(())
}
