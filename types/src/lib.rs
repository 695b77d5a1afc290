//! Core domain types for rimport.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the importer.

#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod field;
mod row;
mod stats;
mod text;

pub use field::{DestField, FieldMapping, UnknownFieldError};
pub use row::{CsvRow, CsvTable};
pub use stats::ImportStats;
pub use text::{truncate_chars, truncate_with_ellipsis};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use thiserror::Error;

// ============================================================================
// NonEmpty String Types
// ============================================================================

/// A string guaranteed to be non-empty (after trimming).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

#[derive(Debug, Error)]
#[error("value must not be empty")]
pub struct EmptyStringError;

impl NonEmptyString {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyStringError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(EmptyStringError)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::ops::Deref for NonEmptyString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Secret API key.
///
/// `Debug` is manually implemented to redact the key value, preventing accidental
/// credential disclosure in logs or error messages.
#[derive(Clone)]
pub struct ApiKey(NonEmptyString);

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyStringError> {
        let value: String = value.into();
        NonEmptyString::new(value.trim()).map(Self)
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        self.0.as_str()
    }
}

// ============================================================================
// Forum Site
// ============================================================================

/// Resource category the import posts into. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryId(NonZeroU32);

impl CategoryId {
    #[must_use]
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Forum user the API acts as (sent as `XF-Api-User`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(NonZeroU32);

impl UserId {
    #[must_use]
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BaseUrlError {
    #[error("forum base URL is empty")]
    Empty,
    #[error("forum base URL must start with http:// or https:// (got {0:?})")]
    MissingScheme(String),
}

/// Forum root URL with trailing slashes removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(String);

impl BaseUrl {
    pub fn parse(raw: &str) -> Result<Self, BaseUrlError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(BaseUrlError::Empty);
        }
        if !has_http_scheme(trimmed) {
            return Err(BaseUrlError::MissingScheme(trimmed.to_string()));
        }
        Ok(Self(trimmed.trim_end_matches('/').to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for plain `http://` URLs, where the API key travels unencrypted.
    #[must_use]
    pub fn is_plain_http(&self) -> bool {
        self.0
            .get(..7)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("http://"))
    }

    /// Join an absolute API path (`/api/...`) onto the base.
    #[must_use]
    pub fn join(&self, path: &str) -> String {
        format!("{}{path}", self.0)
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn has_http_scheme(raw: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        raw.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

/// CORS proxy prefix; the percent-encoded target URL is appended to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyPrefix(String);

impl ProxyPrefix {
    pub const DEFAULT: &'static str = "https://corsproxy.io/?";

    /// Blank input selects [`ProxyPrefix::DEFAULT`].
    #[must_use]
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self(Self::DEFAULT.to_string())
        } else {
            Self(trimmed.to_string())
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProxyPrefix {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

/// Everything needed to talk to one forum's REST API.
#[derive(Debug, Clone)]
pub struct ForumSite {
    pub base_url: BaseUrl,
    pub api_key: ApiKey,
    pub category_id: CategoryId,
    pub user_id: Option<UserId>,
    /// `Some` routes every request through a CORS proxy.
    pub proxy: Option<ProxyPrefix>,
}

// ============================================================================
// API Results
// ============================================================================

/// One entry of the forum API's `errors` array, or a locally classified failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl ApiError {
    pub const NETWORK_ERROR: &'static str = "network_error";
    pub const INVALID_RESPONSE: &'static str = "invalid_response";
    pub const HTTP_ERROR: &'static str = "http_error";
    pub const REDIRECTED: &'static str = "redirected";

    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Resource created by a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedResource {
    pub resource_id: u64,
    #[serde(default)]
    pub title: Option<String>,
}
