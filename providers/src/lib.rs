//! HTTP clients for rimport.
//!
//! # Architecture
//!
//! - [`forum`] - XenForo resource-manager REST API (connection check, resource upload)
//! - [`gemini`] - Google Gemini GenerateContent API (tagline and description copy)
//!
//! Both clients are built on a shared [`reqwest::ClientBuilder`] baseline and
//! never retry: each call makes exactly one request and reports what happened.
//!
//! # Error Handling
//!
//! Upload failures are returned as data (a list of [`ApiError`](rimport_types::ApiError))
//! so that a caller looping over rows can log them and keep going. The connection
//! check returns a classified [`ConnectionError`].

pub mod forum;
pub mod gemini;

pub use forum::{CategoryInfo, ConnectionError, ForumClient};
pub use gemini::{GeminiClient, GenerateError};

use rimport_types::{BaseUrl, ProxyPrefix};
use std::time::Duration;
use url::form_urlencoded;

const CONNECT_TIMEOUT_SECS: u64 = 30;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

const MAX_BODY_BYTES: usize = 1024 * 1024;

fn base_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .user_agent(concat!("rimport/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        // Redirects would replay the API key against another host.
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}

pub fn http_client_with_timeout(timeout_secs: u64) -> Result<reqwest::Client, reqwest::Error> {
    base_client_builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}

/// Read a response body as text, capped at 1 MiB.
pub async fn read_capped_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_BODY_BYTES {
            body.truncate(MAX_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// Full request URL for an API path, routed through the CORS proxy when set.
///
/// The proxy receives the target URL percent-encoded as a single component,
/// appended directly to its prefix.
#[must_use]
pub fn endpoint_url(base: &BaseUrl, path: &str, proxy: Option<&ProxyPrefix>) -> String {
    let url = base.join(path);
    match proxy {
        Some(prefix) => format!("{}{}", prefix.as_str(), encode_component(&url)),
        None => url,
    }
}

fn encode_component(raw: &str) -> String {
    // byte_serialize leaves '+' for spaces; a literal '+' is already %2B.
    form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
