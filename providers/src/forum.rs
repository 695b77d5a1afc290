//! XenForo resource-manager REST client.
//!
//! Headers sent on every request:
//!
//! | Header | When |
//! |--------|------|
//! | `XF-Api-Key` | always |
//! | `Accept: application/json` | always |
//! | `X-Requested-With: XMLHttpRequest` | direct requests only; public proxies tend to flag it |
//! | `XF-Api-User` | when a user id is configured |

use reqwest::StatusCode;
use rimport_core::ResourcePayload;
use rimport_types::{ApiError, CategoryId, CreatedResource, ForumSite};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::{DEFAULT_REQUEST_TIMEOUT_SECS, endpoint_url, http_client_with_timeout, read_capped_body};

const RESOURCES_PATH: &str = "/api/resources/";

/// Outcome classes of the connection check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error(
        "the CORS proxy refused or blocked the request; try a different proxy or connect directly"
    )]
    ProxyBlocked,
    #[error("could not reach the forum: {0}")]
    Unreachable(String),
    #[error(
        "server returned non-JSON data (HTTP {status}); a proxy or firewall may have answered instead of the forum"
    )]
    NotJson { status: u16 },
    #[error("connected, but resource category {0} was not found")]
    CategoryNotFound(CategoryId),
    #[error("permission denied (HTTP {status}); check the API key and user id")]
    Unauthorized { status: u16 },
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("unexpected response: no category data")]
    UnexpectedResponse,
    #[error(
        "server redirected (HTTP {status}) to {location}; use that address as the forum URL"
    )]
    Redirected { status: u16, location: String },
}

/// Category returned by a successful connection check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryInfo {
    pub id: CategoryId,
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct CategoryEnvelope {
    category: Option<CategoryBody>,
}

#[derive(Debug, Deserialize)]
struct CategoryBody {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct ResourceEnvelope {
    resource: Option<CreatedResource>,
}

/// Client for one forum site.
#[derive(Debug, Clone)]
pub struct ForumClient {
    http: reqwest::Client,
    site: ForumSite,
}

impl ForumClient {
    pub fn new(site: ForumSite) -> Result<Self, reqwest::Error> {
        Self::with_timeout(site, DEFAULT_REQUEST_TIMEOUT_SECS)
    }

    pub fn with_timeout(site: ForumSite, timeout_secs: u64) -> Result<Self, reqwest::Error> {
        if site.proxy.is_none() && site.base_url.is_plain_http() {
            tracing::warn!(
                base_url = %site.base_url,
                "Forum URL is plain http; the API key will be sent unencrypted"
            );
        }
        Ok(Self {
            http: http_client_with_timeout(timeout_secs)?,
            site,
        })
    }

    fn is_proxied(&self) -> bool {
        self.site.proxy.is_some()
    }

    fn endpoint(&self, path: &str) -> String {
        endpoint_url(&self.site.base_url, path, self.site.proxy.as_ref())
    }

    fn with_headers(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request = request
            .header("XF-Api-Key", self.site.api_key.expose_secret())
            .header("Accept", "application/json");
        if !self.is_proxied() {
            request = request.header("X-Requested-With", "XMLHttpRequest");
        }
        if let Some(user_id) = self.site.user_id {
            request = request.header("XF-Api-User", user_id.to_string());
        }
        request
    }

    /// Fetch the configured category to prove URL, key, and permissions work.
    pub async fn test_connection(&self) -> Result<CategoryInfo, ConnectionError> {
        let category_id = self.site.category_id;
        let url = self.endpoint(&format!("/api/resource-categories/{category_id}/"));
        tracing::debug!(%url, proxied = self.is_proxied(), "Testing forum connection");

        let response = match self.with_headers(self.http.get(&url)).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%e, "Connection check failed before a response");
                return Err(if self.is_proxied() {
                    ConnectionError::ProxyBlocked
                } else {
                    ConnectionError::Unreachable(describe_transport_error(&e))
                });
            }
        };

        let status = response.status();
        if status.is_redirection() {
            return Err(ConnectionError::Redirected {
                status: status.as_u16(),
                location: redirect_location(&response),
            });
        }
        if self.is_proxied()
            && matches!(
                status,
                StatusCode::FORBIDDEN | StatusCode::SERVICE_UNAVAILABLE | StatusCode::TOO_MANY_REQUESTS
            )
        {
            return Err(ConnectionError::ProxyBlocked);
        }

        let body = read_capped_body(response).await;
        let Ok(json) = serde_json::from_str::<Value>(&body) else {
            return Err(ConnectionError::NotJson {
                status: status.as_u16(),
            });
        };

        if !status.is_success() {
            return Err(match status {
                StatusCode::NOT_FOUND => ConnectionError::CategoryNotFound(category_id),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ConnectionError::Unauthorized {
                    status: status.as_u16(),
                },
                _ => ConnectionError::Api {
                    status: status.as_u16(),
                    message: parse_errors(&json)
                        .into_iter()
                        .next()
                        .map(|e| e.message)
                        .unwrap_or_else(|| "unknown error".to_string()),
                },
            });
        }

        match serde_json::from_value::<CategoryEnvelope>(json) {
            Ok(CategoryEnvelope {
                category: Some(category),
            }) => {
                tracing::info!(category = %category_id, title = %category.title, "Forum connection OK");
                Ok(CategoryInfo {
                    id: category_id,
                    title: category.title,
                })
            }
            _ => Err(ConnectionError::UnexpectedResponse),
        }
    }

    /// Create one resource. Exactly one request; failures come back as API errors.
    ///
    /// `Ok(None)` means the server accepted the request but did not echo the resource.
    pub async fn post_resource(
        &self,
        payload: &ResourcePayload,
    ) -> Result<Option<CreatedResource>, Vec<ApiError>> {
        let url = self.endpoint(RESOURCES_PATH);
        let request = self
            .with_headers(self.http.post(&url))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(payload.encode());

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%e, "Resource upload failed before a response");
                let message = if self.is_proxied() {
                    format!("Proxy or firewall blocked the connection: {}", describe_transport_error(&e))
                } else {
                    format!("Could not connect to the forum: {}", describe_transport_error(&e))
                };
                return Err(vec![ApiError::new(ApiError::NETWORK_ERROR, message)]);
            }
        };

        let status = response.status();
        if status.is_redirection() {
            return Err(vec![ApiError::new(
                ApiError::REDIRECTED,
                format!(
                    "Server redirected (status {}) to {}; use that address as the forum URL.",
                    status.as_u16(),
                    redirect_location(&response)
                ),
            )]);
        }
        let body = read_capped_body(response).await;
        let Ok(json) = serde_json::from_str::<Value>(&body) else {
            return Err(vec![ApiError::new(
                ApiError::INVALID_RESPONSE,
                format!("Server did not return JSON (status {}).", status.as_u16()),
            )]);
        };

        if !status.is_success() {
            let errors = parse_errors(&json);
            tracing::debug!(status = status.as_u16(), errors = errors.len(), "Resource rejected");
            if errors.is_empty() {
                return Err(vec![ApiError::new(
                    ApiError::HTTP_ERROR,
                    format!("HTTP error {}", status.as_u16()),
                )]);
            }
            return Err(errors);
        }

        let resource = serde_json::from_value::<ResourceEnvelope>(json)
            .ok()
            .and_then(|envelope| envelope.resource);
        Ok(resource)
    }
}

/// Entries of a response's `errors` array. An entry without a message is
/// rendered as its raw JSON.
fn parse_errors(json: &Value) -> Vec<ApiError> {
    let Some(entries) = json.get("errors").and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .map(|entry| {
            let code = entry
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let message = entry
                .get("message")
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .unwrap_or_else(|| entry.to_string());
            ApiError::new(code, message)
        })
        .collect()
}

fn redirect_location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("an unknown location")
        .to_string()
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("connection failed ({e})")
    } else if e.is_builder() {
        format!("invalid request ({e})")
    } else {
        e.to_string()
    }
}
