//! Shared fixtures for `rest-mcp` tests: a recording mock REST upstream and a minimal
//! newline-delimited JSON-RPC client for driving the bridge over stdio.

use anyhow::Context as _;
use axum::Router;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader, Lines};
use tokio::net::TcpListener;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// What the mock upstream answers with.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    /// `None` echoes the raw request query string back as the body.
    pub body: Option<String>,
    pub content_type: &'static str,
    /// Wait this long before answering.
    pub delay: Duration,
}

impl MockResponse {
    #[must_use]
    pub fn fixed(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: Some(body.into()),
            content_type: "application/json",
            delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn echo_query() -> Self {
        Self {
            body: None,
            content_type: "text/plain",
            ..Self::fixed(200, "")
        }
    }
}

/// One request as seen by the mock upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// Decoded query pairs, in wire order.
    pub query: Vec<(String, String)>,
}

impl RecordedRequest {
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

struct MockState {
    response: MockResponse,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Local HTTP server that records every request and answers with a canned [`MockResponse`].
///
/// Shuts down when dropped.
pub struct MockUpstream {
    base_url: String,
    state: Arc<MockState>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl MockUpstream {
    /// # Errors
    ///
    /// Returns an error if no localhost port can be bound.
    pub async fn start(response: MockResponse) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            response,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/", any(record))
            .route("/{*path}", any(record))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind mock upstream")?;
        let addr = listener.local_addr().context("mock upstream local_addr")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        let handle = tokio::spawn(async move {
            let _ = server.await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            state,
            shutdown: Some(shutdown_tx),
            handle,
        })
    }

    /// # Errors
    ///
    /// Returns an error if no localhost port can be bound.
    pub async fn respond_with(status: u16, body: impl Into<String>) -> anyhow::Result<Self> {
        Self::start(MockResponse::fixed(status, body)).await
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn hits(&self) -> usize {
        self.state.requests.lock().len()
    }

    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.abort();
    }
}

async fn record(State(state): State<Arc<MockState>>, method: Method, uri: Uri) -> Response {
    let raw_query = uri.query().unwrap_or("");
    let query = url::form_urlencoded::parse(raw_query.as_bytes())
        .into_owned()
        .collect();
    state.requests.lock().push(RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query,
    });

    let response = &state.response;
    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = response
        .body
        .clone()
        .unwrap_or_else(|| raw_query.to_string());
    (status, [(header::CONTENT_TYPE, response.content_type)], body).into_response()
}

/// Minimal MCP client over a child process's stdin/stdout.
///
/// Messages are newline-delimited JSON-RPC. The child is killed if the session is dropped
/// without [`StdioMcpSession::close`].
pub struct StdioMcpSession {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl StdioMcpSession {
    /// Spawn `command` with piped stdin/stdout. Stderr is inherited.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned.
    pub fn spawn(mut command: Command) -> anyhow::Result<Self> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .context("spawn MCP server")?;
        let stdin = child.stdin.take().context("child stdin")?;
        let stdout = child.stdout.take().context("child stdout")?;
        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
        })
    }

    /// `initialize` followed by `notifications/initialized`. Returns the initialize result.
    ///
    /// # Errors
    ///
    /// Returns an error if the handshake fails or times out.
    pub async fn initialize(&mut self, timeout_dur: Duration) -> anyhow::Result<Value> {
        let msg = self
            .request(
                0,
                "initialize",
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": { "name": "rest-mcp-integration-tests", "version": "0" }
                }),
                timeout_dur,
            )
            .await?;
        self.notify("notifications/initialized", Value::Null).await?;
        msg.get("result")
            .cloned()
            .context("initialize response missing result")
    }

    /// Send a notification. `Value::Null` params are omitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn notify(&mut self, method: &str, params: Value) -> anyhow::Result<()> {
        let mut msg = json!({ "jsonrpc": "2.0", "method": method });
        if !params.is_null() {
            msg["params"] = params;
        }
        self.send(&msg).await
    }

    /// Send a request and wait for the response with the same id. Other messages are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error on write failure, timeout, or if stdout closes first.
    pub async fn request(
        &mut self,
        id: u64,
        method: &str,
        params: Value,
        timeout_dur: Duration,
    ) -> anyhow::Result<Value> {
        self.send(&json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .await?;

        tokio::time::timeout(timeout_dur, self.read_response(id, method))
            .await
            .with_context(|| format!("timed out waiting for {method} response"))?
    }

    async fn read_response(&mut self, id: u64, method: &str) -> anyhow::Result<Value> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await
                .context("read child stdout")?
                .with_context(|| format!("stdout closed before response to {method}"))?;
            let msg: Value = serde_json::from_str(&line)
                .with_context(|| format!("non-JSON line on stdout: {line}"))?;
            if msg.get("id") == Some(&json!(id)) {
                return Ok(msg);
            }
        }
    }

    /// Close stdin and wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the process does not exit within `timeout_dur`.
    pub async fn close(mut self, timeout_dur: Duration) -> anyhow::Result<ExitStatus> {
        drop(self.stdin.take());
        tokio::time::timeout(timeout_dur, self.child.wait())
            .await
            .context("timed out waiting for exit")?
            .context("wait for child")
    }

    async fn send(&mut self, msg: &Value) -> anyhow::Result<()> {
        let stdin = self.stdin.as_mut().context("stdin already closed")?;
        let mut line = serde_json::to_string(msg)?;
        line.push('\n');
        stdin.write_all(line.as_bytes()).await.context("write child stdin")?;
        stdin.flush().await.context("flush child stdin")?;
        Ok(())
    }
}

/// `result.content[0].text` of a `tools/call` response.
///
/// # Errors
///
/// Returns an error if the message has no text content.
pub fn tool_call_text(msg: &Value) -> anyhow::Result<&str> {
    msg.pointer("/result/content/0/text")
        .and_then(Value::as_str)
        .context("tools/call response missing result.content[0].text")
}
