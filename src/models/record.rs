//! Per-model configuration records.
//!
//! A record serializes to the `llm_config` shape agent frameworks expect:
//! a `config_list` of endpoints, `cache_seed`, and the sampling options at
//! the top level.

use serde::{Deserialize, Serialize};

use crate::server::config::ConnectSettings;
use crate::server::errors::{ConnectError, Result};
use crate::server::parameters::RequestParameters;

/// Display name of a model: the last `/`-separated segment of its identifier.
///
/// `"lmstudio-community/Meta-Llama-3-8B-Instruct-GGUF"` → `"Meta-Llama-3-8B-Instruct-GGUF"`.
pub fn short_name(identifier: &str) -> &str {
    identifier.rsplit('/').next().unwrap_or(identifier)
}

/// Check the non-empty identifier invariant.
pub fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.trim().is_empty() {
        return Err(ConnectError::InvalidRecord {
            identifier: identifier.to_string(),
            reason: "model identifier must not be empty".into(),
        });
    }
    Ok(())
}

/// One endpoint an agent framework can call for this model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub model: String,
    pub base_url: String,
    pub api_key: String,
}

/// The list-wrapped shape consumed by multi-config agent frameworks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmConfigList {
    pub config_list: Vec<EndpointConfig>,
}

/// Persisted configuration for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfigRecord {
    /// Short name shown to users.
    #[serde(default)]
    pub display_name: String,
    pub config_list: Vec<EndpointConfig>,
    /// `null` disables response caching in agent frameworks.
    #[serde(default)]
    pub cache_seed: Option<i64>,
    /// RFC 3339 time the model was first seen loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovered_at: Option<String>,
    /// Tuned sampling options, serialized at the top level.
    #[serde(flatten)]
    pub parameters: RequestParameters,
}

impl ModelConfigRecord {
    /// The record synthesized for a model seen loaded for the first time.
    pub fn default_for(identifier: &str, settings: &ConnectSettings) -> Self {
        Self {
            display_name: short_name(identifier).to_string(),
            config_list: vec![EndpointConfig {
                model: identifier.to_string(),
                base_url: settings.api_base(),
                api_key: settings.api_key.clone(),
            }],
            cache_seed: None,
            discovered_at: Some(chrono::Utc::now().to_rfc3339()),
            parameters: RequestParameters {
                max_tokens: Some(settings.default_max_tokens),
                ..Default::default()
            },
        }
    }

    /// Check the record's invariants. `identifier` is only used for messages.
    pub fn validate(&self, identifier: &str) -> Result<()> {
        validate_identifier(identifier)?;
        if self.config_list.is_empty() {
            return Err(ConnectError::InvalidRecord {
                identifier: identifier.to_string(),
                reason: "config_list is empty".into(),
            });
        }
        if let Some(endpoint) = self.config_list.iter().find(|e| e.model.trim().is_empty()) {
            return Err(ConnectError::InvalidRecord {
                identifier: identifier.to_string(),
                reason: format!("endpoint {} has no model name", endpoint.base_url),
            });
        }
        self.parameters.validate()
    }

    /// The first endpoint, which is the one requests go to.
    pub fn primary_endpoint(&self) -> Option<&EndpointConfig> {
        self.config_list.first()
    }

    /// The name to send as `model` in requests.
    pub fn request_model<'a>(&'a self, identifier: &'a str) -> &'a str {
        self.primary_endpoint()
            .map(|e| e.model.as_str())
            .unwrap_or(identifier)
    }

    /// The list-wrapped form.
    pub fn to_config_list(&self) -> LlmConfigList {
        LlmConfigList {
            config_list: self.config_list.clone(),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
