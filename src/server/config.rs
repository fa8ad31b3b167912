//! Connection settings loading.
//!
//! Settings come from defaults, an optional YAML file, and a couple of
//! environment overrides. String values in the YAML file may reference
//! environment variables as `${VAR}` or `${VAR:-default}`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::{ConnectError, Result};

/// Default host of a local LM Studio server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:1234";

/// API key LM Studio accepts (and ignores); agent frameworks insist on one.
pub const DEFAULT_API_KEY: &str = "lm-studio";

/// File name of the persisted model library inside the data directory.
pub const LIBRARY_FILE_NAME: &str = "model_library.json";

/// Environment variable overriding `base_url`.
pub const ENV_BASE_URL: &str = "LMSTUDIO_BASE_URL";

/// Environment variable overriding `library_path`.
pub const ENV_LIBRARY_PATH: &str = "LMSTUDIO_CONNECT_LIBRARY";

// ─── Public Types ────────────────────────────────────────────────────────────

/// Defaults applied to outgoing prompt/chat payloads when the caller leaves
/// the option unset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PromptDefaults {
    #[serde(default = "default_prompt_max_tokens")]
    pub max_tokens: i32,
    #[serde(default = "default_prompt_temperature")]
    pub temperature: f32,
}

impl Default for PromptDefaults {
    fn default() -> Self {
        Self {
            max_tokens: default_prompt_max_tokens(),
            temperature: default_prompt_temperature(),
        }
    }
}

/// Everything needed to reach the server and locate the model library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectSettings {
    /// Server root, without the `/v1` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Written into model records for agent frameworks.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_library_path")]
    pub library_path: PathBuf,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// `max_tokens` written into records for newly discovered models.
    #[serde(default = "default_record_max_tokens")]
    pub default_max_tokens: i32,
    #[serde(default)]
    pub prompt_defaults: PromptDefaults,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_api_key() -> String {
    DEFAULT_API_KEY.to_string()
}
fn default_library_path() -> PathBuf {
    crate::data_dir().join(LIBRARY_FILE_NAME)
}
fn default_connect_timeout_secs() -> u64 {
    5
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_record_max_tokens() -> i32 {
    1024
}
fn default_prompt_max_tokens() -> i32 {
    256
}
fn default_prompt_temperature() -> f32 {
    0.7
}

impl Default for ConnectSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: default_api_key(),
            library_path: default_library_path(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            default_max_tokens: default_record_max_tokens(),
            prompt_defaults: PromptDefaults::default(),
        }
    }
}

impl ConnectSettings {
    /// Defaults plus `LMSTUDIO_BASE_URL` / `LMSTUDIO_CONNECT_LIBRARY` overrides.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.apply_env_overrides();
        settings
    }

    /// Load settings from a YAML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConnectError::Settings {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;

        let mut settings = Self::from_yaml_str(&raw)?;
        settings.apply_env_overrides();

        tracing::info!(
            path = %path.display(),
            base_url = %settings.base_url,
            library = %settings.library_path.display(),
            "loaded connect settings"
        );
        Ok(settings)
    }

    /// Parse settings from YAML text (after env-var interpolation).
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let interpolated = interpolate_env_vars(raw);
        if interpolated.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut settings: Self =
            serde_yaml::from_str(&interpolated).map_err(|e| ConnectError::Settings {
                reason: format!("failed to parse settings: {e}"),
            })?;

        settings.library_path = PathBuf::from(expand_tilde(&settings.library_path.to_string_lossy()));
        settings.base_url = settings.base_url.trim_end_matches('/').to_string();
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            if !url.trim().is_empty() {
                self.base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        if let Ok(path) = std::env::var(ENV_LIBRARY_PATH) {
            if !path.trim().is_empty() {
                self.library_path = PathBuf::from(expand_tilde(path.trim()));
            }
        }
    }

    /// The OpenAI-style API root, e.g. `http://localhost:1234/v1`.
    pub fn api_base(&self) -> String {
        format!("{}/v1", self.base_url.trim_end_matches('/'))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in settings text.
///
/// An unset variable without a default becomes the empty string. A `${`
/// with no closing brace is kept as written.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find("${") {
        result.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        match after_open.find('}') {
            Some(close) => {
                result.push_str(&resolve_var_expr(&after_open[..close]));
                rest = &after_open[close + 1..];
            }
            None => {
                result.push_str(&rest[open..]);
                return result;
            }
        }
    }
    result.push_str(rest);
    result
}

/// Resolve `VAR` or `VAR:-default`; the default gets `~` expansion.
fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((name, default)) => {
            std::env::var(name.trim()).unwrap_or_else(|_| expand_tilde(default))
        }
        None => std::env::var(expr.trim()).unwrap_or_default(),
    }
}

/// Expand `~` or a leading `~/` to the home directory. `~user` is left alone.
fn expand_tilde(path: &str) -> String {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return path.to_string(),
    };
    match dirs::home_dir() {
        Some(home) => format!("{}{rest}", home.display()),
        None => path.to_string(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
