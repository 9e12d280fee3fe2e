//! Outbound HTTP hygiene: redaction and response size limits.
//!
//! Credential values travel in the query string, so every URL that reaches a log line or a
//! tool-error message goes through [`redact_url`] first.

use url::Url;

#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    // Best-effort: drop credentials + query + fragment.
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(u) = e.url() {
        msg = msg.replace(u.as_str(), &redact_url(u));
    }
    if e.is_timeout() && !msg.contains("timed out") {
        msg.push_str(" (timed out)");
    }
    msg
}

/// Why a response body could not be read.
#[derive(Debug)]
pub enum BodyReadError {
    TooLarge(String),
    Transport(reqwest::Error),
}

impl From<reqwest::Error> for BodyReadError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value)
    }
}

impl BodyReadError {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            BodyReadError::TooLarge(msg) => msg.clone(),
            BodyReadError::Transport(e) => sanitize_reqwest_error(e),
        }
    }
}

/// Read the whole response body, failing once it exceeds `max_bytes`.
///
/// # Errors
///
/// Returns an error on transport failures while streaming or if the body is too large.
pub async fn read_response_body_limited(
    mut response: reqwest::Response,
    max_bytes: Option<usize>,
) -> Result<Vec<u8>, BodyReadError> {
    let Some(max) = max_bytes else {
        return Ok(response.bytes().await?.to_vec());
    };

    if let Some(len) = response.content_length()
        && len > max as u64
    {
        return Err(BodyReadError::TooLarge(format!(
            "Response too large: {len} bytes (limit {max})"
        )));
    }

    let mut out: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if out.len().saturating_add(chunk.len()) > max {
            return Err(BodyReadError::TooLarge(format!(
                "Response too large: exceeded {max} bytes"
            )));
        }
        out.extend_from_slice(&chunk);
    }

    Ok(out)
}
