//! Model manager: keeps the model library in step with the server and
//! dispatches requests with each model's stored configuration.
//!
//! The manager owns one [`ModelServer`] and one [`ModelLibrary`]. It is
//! constructed explicitly and passed to whoever needs it; mutating
//! operations take `&mut self`, so the borrow checker serializes the
//! library's load/modify/save sequence within a process.

use serde::{Deserialize, Serialize};

use super::library::{ModelConfigs, ModelLibrary};
use super::record::{LlmConfigList, ModelConfigRecord};
use crate::server::client::LmStudioClient;
use crate::server::config::ConnectSettings;
use crate::server::errors::{ConnectError, Result};
use crate::server::gateway::ModelServer;
use crate::server::parameters::RequestParameters;
use crate::server::types::{ChatCompletionResponse, ChatMessage, CompletionResponse};

/// What the server is doing right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ServerStatus {
    /// Reachable with at least one model loaded.
    Active { models: Vec<String> },
    /// Reachable, nothing loaded.
    Idle,
    /// Could not be reached.
    Error { message: String },
}

/// Orchestrates a model server and the persisted model library.
pub struct ModelManager<S: ModelServer> {
    server: S,
    library: ModelLibrary,
    settings: ConnectSettings,
}

impl ModelManager<LmStudioClient> {
    /// Manager talking HTTP to the server named in `settings`.
    pub fn from_settings(settings: ConnectSettings) -> Result<Self> {
        let server = LmStudioClient::from_settings(&settings)?;
        let library = ModelLibrary::from_settings(&settings);
        Ok(Self::new(server, library, settings))
    }
}

impl<S: ModelServer> ModelManager<S> {
    pub fn new(server: S, library: ModelLibrary, settings: ConnectSettings) -> Self {
        Self {
            server,
            library,
            settings,
        }
    }

    pub fn server(&self) -> &S {
        &self.server
    }

    pub fn library(&self) -> &ModelLibrary {
        &self.library
    }

    pub fn settings(&self) -> &ConnectSettings {
        &self.settings
    }

    // ─── Reconciliation ─────────────────────────────────────────────────────

    /// Add every newly loaded model to the library and return what is loaded.
    ///
    /// Existing records are never replaced. If the server cannot be reached
    /// the library file is not touched.
    pub async fn load_and_save_models(&mut self) -> Result<Vec<String>> {
        self.ensure_reachable().await?;

        let loaded = self.server.list_loaded_models().await?;
        if loaded.is_empty() {
            tracing::warn!("server reports no loaded models");
        }

        let mut configs = self.library.load()?;
        let added = reconcile(&mut configs, &loaded, &self.settings);
        self.library.save(&configs)?;

        tracing::info!(
            loaded = loaded.len(),
            added = added.len(),
            stored = configs.len(),
            "model library reconciled"
        );
        Ok(loaded)
    }

    async fn ensure_reachable(&self) -> Result<()> {
        match self.server.check_status().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ConnectError::ServerUnreachable {
                endpoint: self.settings.api_base(),
                reason: "status check did not succeed".into(),
            }),
            Err(e) => {
                tracing::warn!(error = %e, "model server status check failed");
                Err(e)
            }
        }
    }

    // ─── Server queries ─────────────────────────────────────────────────────

    /// `Active` when models are loaded, `Idle` when the server answers with none.
    ///
    /// Connectivity failures become `ServerStatus::Error`; anything else
    /// (say, a rejected model listing) is returned as an error.
    pub async fn server_status(&self) -> Result<ServerStatus> {
        let listed = match self.ensure_reachable().await {
            Ok(()) => self.server.list_loaded_models().await,
            Err(e) => Err(e),
        };

        match listed {
            Ok(models) if models.is_empty() => Ok(ServerStatus::Idle),
            Ok(models) => Ok(ServerStatus::Active { models }),
            Err(e) if e.is_connectivity() => {
                tracing::debug!(error = %e, "model server not reachable");
                Ok(ServerStatus::Error {
                    message: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Identifiers of the currently loaded models.
    pub async fn loaded_model_names(&self) -> Result<Vec<String>> {
        self.server.list_loaded_models().await
    }

    /// Whether any loaded identifier contains `name`.
    pub async fn is_model_loaded(&self, name: &str) -> Result<bool> {
        let loaded = self.server.list_loaded_models().await?;
        Ok(loaded.iter().any(|id| id.contains(name)))
    }

    // ─── Library access ─────────────────────────────────────────────────────

    /// Every identifier the library has a record for, loaded or not.
    pub fn available_model_names(&self) -> Result<Vec<String>> {
        self.library.model_names()
    }

    pub fn get_model_config(&self, identifier: &str) -> Result<ModelConfigRecord> {
        self.library.get(identifier)
    }

    /// The record in the list-wrapped form agent frameworks consume.
    pub fn get_model_config_list(&self, identifier: &str) -> Result<LlmConfigList> {
        Ok(self.library.get(identifier)?.to_config_list())
    }

    /// Explicit edit of one model's record.
    pub fn update_model_config(&mut self, identifier: &str, record: ModelConfigRecord) -> Result<()> {
        self.library.upsert(identifier, record)
    }

    // ─── Requests ───────────────────────────────────────────────────────────

    /// Send a prompt using the model's stored options, with `overrides` on top.
    pub async fn send_prompt(
        &self,
        identifier: &str,
        prompt: &str,
        overrides: &RequestParameters,
    ) -> Result<CompletionResponse> {
        let (record, parameters) = self.prepare(identifier, overrides)?;
        let model = record.request_model(identifier);
        tracing::info!(model = %model, prompt_len = prompt.len(), "sending prompt");
        self.server.send_prompt(model, prompt, &parameters).await
    }

    /// Send a chat using the model's stored options, with `overrides` on top.
    pub async fn send_chat(
        &self,
        identifier: &str,
        messages: &[ChatMessage],
        overrides: &RequestParameters,
    ) -> Result<ChatCompletionResponse> {
        let (record, parameters) = self.prepare(identifier, overrides)?;
        let model = record.request_model(identifier);
        tracing::info!(model = %model, messages = messages.len(), "sending chat");
        self.server.send_chat(model, messages, &parameters).await
    }

    /// Embedding for `input` from the model's configured endpoint.
    pub async fn generate_embedding(&self, identifier: &str, input: &str) -> Result<Vec<f32>> {
        let record = self.library.get(identifier)?;
        let model = record.request_model(identifier);
        tracing::info!(model = %model, input_len = input.len(), "generating embedding");
        self.server.generate_embedding(model, input).await
    }

    /// Validate `overrides` before any I/O, then merge with the stored record.
    fn prepare(
        &self,
        identifier: &str,
        overrides: &RequestParameters,
    ) -> Result<(ModelConfigRecord, RequestParameters)> {
        overrides.validate()?;
        let record = self.library.get(identifier)?;
        let parameters = record.parameters.overlay(overrides);
        Ok((record, parameters))
    }
}

// ─── Reconciliation ─────────────────────────────────────────────────────────

/// Add a default record for each loaded identifier missing from `configs`.
///
/// Existing entries, including ones for models no longer loaded, are left
/// exactly as they were. Returns the identifiers that were added, in
/// server order.
pub fn reconcile(
    configs: &mut ModelConfigs,
    loaded: &[String],
    settings: &ConnectSettings,
) -> Vec<String> {
    let mut added = Vec::new();
    for identifier in loaded {
        if identifier.trim().is_empty() {
            tracing::warn!("server reported a model with an empty identifier, skipping");
            continue;
        }
        if configs.contains_key(identifier) {
            continue;
        }
        configs.insert(
            identifier.clone(),
            ModelConfigRecord::default_for(identifier, settings),
        );
        tracing::info!(model = %identifier, "discovered new model");
        added.push(identifier.clone());
    }
    added
}

// ─── Tests ───────────────────────────────────────────────────────────────────
