//! Configuration for rimport.
//!
//! Settings come from three places, highest precedence first:
//!
//! 1. command-line flags ([`Overrides`])
//! 2. the TOML config file (`~/.rimport/config.toml` or `--config`)
//! 3. environment fallbacks for secrets (`XF_API_KEY`, `GEMINI_API_KEY`)
//!
//! ```toml
//! [forum]
//! base_url = "https://forum.example.com"
//! api_key = "${XF_API_KEY}"
//! category_id = 2
//! user_id = 1
//!
//! [proxy]
//! enabled = false
//! url = "https://corsproxy.io/?"
//!
//! [gemini]
//! enabled = true
//! model = "gemini-3-flash-preview"
//! enhance_description = false
//!
//! [import]
//! delay_ms = 500
//! delimiter = ","
//! timeout_secs = 60
//!
//! [mapping]
//! title = "Name"
//! description = "Body"
//! ```
//!
//! String values may reference environment variables as `${VAR}`.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use rimport_types::{
    ApiKey, BaseUrl, BaseUrlError, CategoryId, FieldMapping, ForumSite, ProxyPrefix, UserId,
};

pub const FORUM_API_KEY_ENV: &str = "XF_API_KEY";
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_DELAY_MS: u64 = 500;
pub const MAX_DELAY_MS: u64 = 60_000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

// Default value function for serde (bool::default() is false, so only true needs a fn)
const fn default_true() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("forum base URL is not set (use --base-url or [forum] base_url)")]
    MissingBaseUrl,
    #[error(transparent)]
    InvalidBaseUrl(#[from] BaseUrlError),
    #[error("forum API key is not set (use --api-key, [forum] api_key, or {FORUM_API_KEY_ENV})")]
    MissingApiKey,
    #[error("resource category id must be a positive number (use --category-id or [forum] category_id)")]
    InvalidCategoryId,
    #[error("user id must be a positive number when set")]
    InvalidUserId,
    #[error("delay of {0} ms exceeds the {MAX_DELAY_MS} ms limit")]
    DelayTooLong(u64),
    #[error("delimiter must be a single ASCII character or \"tab\" (got {0:?})")]
    InvalidDelimiter(String),
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Raw config file contents.
#[derive(Debug, Default, Deserialize)]
pub struct RimportConfig {
    pub forum: Option<ForumConfig>,
    pub proxy: Option<ProxyConfig>,
    pub gemini: Option<GeminiConfig>,
    pub import: Option<ImportConfig>,
    pub mapping: Option<FieldMapping>,
}

#[derive(Default, Deserialize)]
pub struct ForumConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub category_id: Option<u32>,
    pub user_id: Option<u32>,
}

// Manual Debug impl to prevent leaking API keys in logs.
impl fmt::Debug for ForumConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForumConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("category_id", &self.category_id)
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// CORS proxy routing.
#[derive(Debug, Default, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Prefix the encoded target URL is appended to. Blank selects the default.
    pub url: Option<String>,
}

/// Gemini tagline generation.
#[derive(Default, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// Rewrite each description through the model before upload. Default: false.
    #[serde(default)]
    pub enhance_description: bool,
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("enabled", &self.enabled)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("enhance_description", &self.enhance_description)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ImportConfig {
    /// Pause between uploads. Default: 500.
    pub delay_ms: Option<u64>,
    pub delimiter: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Values supplied on the command line. `None` defers to the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub category_id: Option<u32>,
    pub user_id: Option<u32>,
    /// `Some("")` enables the proxy with its default prefix.
    pub proxy: Option<String>,
    pub no_ai: bool,
    pub enhance_description: bool,
    pub delay_ms: Option<u64>,
    pub delimiter: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Tagline generation settings after precedence is applied.
#[derive(Debug, Clone)]
pub struct AiSettings {
    pub enabled: bool,
    /// `None` with `enabled` means generation was requested but no key exists.
    pub api_key: Option<ApiKey>,
    pub model: String,
    pub enhance_description: bool,
}

#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub delay: Duration,
    pub delimiter: u8,
    pub timeout_secs: u64,
}

/// Validated settings for the connection check and the importer.
#[derive(Debug, Clone)]
pub struct Settings {
    pub site: ForumSite,
    pub ai: AiSettings,
    pub import: ImportSettings,
    pub mapping: FieldMapping,
}

/// Delimiter and timing settings, valid without any forum credentials.
pub fn resolve_import(config: &RimportConfig, overrides: &Overrides) -> Result<ImportSettings, ConfigError> {
    let file = config.import.as_ref();

    let delay_ms = overrides
        .delay_ms
        .or_else(|| file.and_then(|i| i.delay_ms))
        .unwrap_or(DEFAULT_DELAY_MS);
    if delay_ms > MAX_DELAY_MS {
        return Err(ConfigError::DelayTooLong(delay_ms));
    }

    let delimiter = match overrides
        .delimiter
        .as_deref()
        .or_else(|| file.and_then(|i| i.delimiter.as_deref()))
    {
        Some(raw) => parse_delimiter(raw)?,
        None => b',',
    };

    let timeout_secs = overrides
        .timeout_secs
        .or_else(|| file.and_then(|i| i.timeout_secs))
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    Ok(ImportSettings {
        delay: Duration::from_millis(delay_ms),
        delimiter,
        timeout_secs,
    })
}

impl RimportConfig {
    /// Load the default config file. A missing file is not an error.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    /// Load an explicit config file. It must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };
        Self::parse(&content).map_err(|source| {
            tracing::warn!("Failed to parse config at {:?}: {}", path, source);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Apply overrides and environment fallbacks, then validate.
    ///
    /// `env` looks up environment variables; pass `|name| std::env::var(name).ok()`
    /// outside of tests.
    pub fn resolve<F>(&self, overrides: &Overrides, env: F) -> Result<Settings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let forum = self.forum.as_ref();
        let expand = |value: &String| expand_env_vars_with(value, &env);

        let base_url = overrides
            .base_url
            .clone()
            .or_else(|| forum.and_then(|f| f.base_url.as_ref()).map(expand))
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingBaseUrl)?;
        let base_url = BaseUrl::parse(&base_url)?;

        let api_key = overrides
            .api_key
            .clone()
            .or_else(|| forum.and_then(|f| f.api_key.as_ref()).map(expand))
            .filter(|key| !key.trim().is_empty())
            .or_else(|| env(FORUM_API_KEY_ENV))
            .and_then(|key| ApiKey::new(key).ok())
            .ok_or(ConfigError::MissingApiKey)?;

        let category_id = overrides
            .category_id
            .or_else(|| forum.and_then(|f| f.category_id))
            .and_then(CategoryId::new)
            .ok_or(ConfigError::InvalidCategoryId)?;

        let user_id = match overrides.user_id.or_else(|| forum.and_then(|f| f.user_id)) {
            Some(raw) => Some(UserId::new(raw).ok_or(ConfigError::InvalidUserId)?),
            None => None,
        };

        let proxy = match &overrides.proxy {
            Some(prefix) => Some(ProxyPrefix::new(prefix)),
            None => self
                .proxy
                .as_ref()
                .filter(|p| p.enabled)
                .map(|p| ProxyPrefix::new(&p.url.as_ref().map(expand).unwrap_or_default())),
        };

        let gemini = self.gemini.as_ref();
        let ai_enabled = !overrides.no_ai && gemini.is_none_or(|g| g.enabled);
        let ai_key = gemini
            .and_then(|g| g.api_key.as_ref())
            .map(expand)
            .filter(|key| !key.trim().is_empty())
            .or_else(|| env(GEMINI_API_KEY_ENV))
            .and_then(|key| ApiKey::new(key).ok());
        let ai = AiSettings {
            enabled: ai_enabled,
            api_key: ai_key,
            model: gemini
                .and_then(|g| g.model.clone())
                .filter(|model| !model.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            enhance_description: overrides.enhance_description
                || gemini.is_some_and(|g| g.enhance_description),
        };

        Ok(Settings {
            site: ForumSite {
                base_url,
                api_key,
                category_id,
                user_id,
                proxy,
            },
            ai,
            import: resolve_import(self, overrides)?,
            mapping: self.mapping.clone().unwrap_or_default(),
        })
    }
}

fn parse_delimiter(raw: &str) -> Result<u8, ConfigError> {
    if raw.eq_ignore_ascii_case("tab") || raw == "\\t" {
        return Ok(b'\t');
    }
    match raw.as_bytes() {
        [byte] if byte.is_ascii() && *byte != b'"' && *byte != b'\n' && *byte != b'\r' => Ok(*byte),
        _ => Err(ConfigError::InvalidDelimiter(raw.to_string())),
    }
}

/// Replace `${VAR}` references using `lookup`. Unset variables expand to "".
/// An unterminated `${` is kept literally.
pub fn expand_env_vars_with<F>(value: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&lookup(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".rimport").join("config.toml"))
}
