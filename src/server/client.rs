//! HTTP client for a local LM Studio server.
//!
//! Speaks the OpenAI-style endpoints under `/v1`. Each public call is one
//! request/response pair: parameters are validated first, the response is
//! decoded once into a typed result or a typed error, and nothing is retried.

use async_trait::async_trait;
use futures::Stream;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::config::{ConnectSettings, PromptDefaults};
use super::errors::{ConnectError, Result};
use super::gateway::ModelServer;
use super::parameters::RequestParameters;
use super::streaming::{collect_chat, collect_completion, parse_sse_stream};
use super::types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, CompletionRequest,
    CompletionResponse, EmbeddingRequest, EmbeddingResponse, ModelList, StreamDelta,
};

// ─── LmStudioClient ──────────────────────────────────────────────────────────

/// Client for the local model server.
///
/// Timeouts come from [`ConnectSettings`]; the status check uses only the
/// connect timeout so a dead server is detected quickly.
#[derive(Debug, Clone)]
pub struct LmStudioClient {
    http: HttpClient,
    /// e.g. `http://localhost:1234/v1`
    api_base: String,
    prompt_defaults: PromptDefaults,
    status_timeout: std::time::Duration,
}

impl LmStudioClient {
    /// Build a client from connection settings. Does not touch the network.
    pub fn from_settings(settings: &ConnectSettings) -> Result<Self> {
        let api_base = settings.api_base();

        let http = HttpClient::builder()
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| ConnectError::Transport {
                endpoint: api_base.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            api_base,
            prompt_defaults: settings.prompt_defaults,
            status_timeout: settings.connect_timeout(),
        })
    }

    /// The API root this client talks to.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    /// Caller parameters layered over the configured payload defaults.
    fn prepare_parameters(&self, parameters: &RequestParameters) -> Result<RequestParameters> {
        parameters.validate()?;
        let defaults = RequestParameters {
            max_tokens: Some(self.prompt_defaults.max_tokens),
            temperature: Some(self.prompt_defaults.temperature),
            ..Default::default()
        };
        Ok(defaults.overlay(parameters))
    }

    /// POST a JSON body and return the successful response.
    async fn post<B: serde::Serialize>(
        &self,
        url: &str,
        body: &B,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let mut request = self.http.post(url).json(body);
        if stream {
            request = request.header("Accept", "text/event-stream");
        }

        let response = request
            .send()
            .await
            .map_err(|e| send_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            tracing::warn!(url = %url, status = status.as_u16(), "server rejected request");
            return Err(ConnectError::RequestRejected {
                status: status.as_u16(),
                body: error_message_from_body(&body_text),
            });
        }

        Ok(response)
    }

    /// Read a successful response body and decode it.
    async fn read_json<T: DeserializeOwned>(
        url: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(|e| ConnectError::Transport {
            endpoint: url.to_string(),
            reason: format!("failed to read response body: {e}"),
        })?;
        decode_body(status, &body_text)
    }

    // ─── Streaming ───────────────────────────────────────────────────────

    /// Send a chat request with `stream: true` and return the decoded deltas.
    pub async fn stream_chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        parameters: &RequestParameters,
    ) -> Result<impl Stream<Item = Result<StreamDelta>>> {
        let mut parameters = self.prepare_parameters(parameters)?;
        parameters.stream = Some(true);

        let url = self.url("/chat/completions");
        let body = ChatCompletionRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            parameters,
        };

        tracing::info!(
            url = %url,
            model = %body.model,
            message_count = body.messages.len(),
            "=== STREAMING CHAT REQUEST ==="
        );

        let response = self.post(&url, &body, true).await?;
        Ok(parse_sse_stream(response))
    }
}

fn is_event_stream(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/event-stream"))
}

#[async_trait]
impl ModelServer for LmStudioClient {
    async fn check_status(&self) -> Result<bool> {
        let url = self.url("/models");

        match self.http.get(&url).timeout(self.status_timeout).send().await {
            Ok(resp) => {
                tracing::debug!(url = %url, status = resp.status().as_u16(), "status check");
                Ok(resp.status().is_success())
            }
            Err(e) => Err(ConnectError::ServerUnreachable {
                endpoint: url,
                reason: e.to_string(),
            }),
        }
    }

    async fn list_loaded_models(&self) -> Result<Vec<String>> {
        let url = self.url("/models");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| send_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ConnectError::RequestRejected {
                status: status.as_u16(),
                body: error_message_from_body(&body_text),
            });
        }

        let list: ModelList = Self::read_json(&url, response).await?;
        let models: Vec<String> = list
            .data
            .into_iter()
            .map(|m| m.id)
            .filter(|id| !id.trim().is_empty())
            .collect();

        tracing::debug!(count = models.len(), "listed loaded models");
        Ok(models)
    }

    async fn send_prompt(
        &self,
        model: &str,
        prompt: &str,
        parameters: &RequestParameters,
    ) -> Result<CompletionResponse> {
        let parameters = self.prepare_parameters(parameters)?;
        let stream = parameters.wants_stream();

        let url = self.url("/completions");
        let body = CompletionRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            parameters,
        };

        tracing::info!(
            url = %url,
            model = %body.model,
            prompt_chars = body.prompt.len(),
            max_tokens = ?body.parameters.max_tokens,
            stream,
            "=== PROMPT REQUEST ==="
        );

        let response = self.post(&url, &body, stream).await?;
        let completion: CompletionResponse = if is_event_stream(&response) {
            collect_completion(parse_sse_stream(response)).await?
        } else {
            Self::read_json(&url, response).await?
        };

        if completion.choices.is_empty() {
            return Err(ConnectError::MalformedResponse {
                reason: "completion response has no choices".into(),
            });
        }
        Ok(completion)
    }

    async fn send_chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        parameters: &RequestParameters,
    ) -> Result<ChatCompletionResponse> {
        let parameters = self.prepare_parameters(parameters)?;
        let stream = parameters.wants_stream();

        let url = self.url("/chat/completions");
        let body = ChatCompletionRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            parameters,
        };

        tracing::info!(
            url = %url,
            model = %body.model,
            message_count = body.messages.len(),
            max_tokens = ?body.parameters.max_tokens,
            stream,
            "=== CHAT REQUEST ==="
        );

        let response = self.post(&url, &body, stream).await?;
        let chat: ChatCompletionResponse = if is_event_stream(&response) {
            collect_chat(parse_sse_stream(response)).await?
        } else {
            Self::read_json(&url, response).await?
        };

        if chat.choices.is_empty() {
            return Err(ConnectError::MalformedResponse {
                reason: "chat response has no choices".into(),
            });
        }
        Ok(chat)
    }

    async fn generate_embedding(&self, model: &str, input: &str) -> Result<Vec<f32>> {
        let url = self.url("/embeddings");
        let body = EmbeddingRequest {
            model: model.to_string(),
            input: input.to_string(),
        };

        tracing::info!(url = %url, model = %body.model, input_chars = input.len(), "embedding request");

        let response = self.post(&url, &body, false).await?;
        let embeddings: EmbeddingResponse = Self::read_json(&url, response).await?;

        embeddings
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ConnectError::MalformedResponse {
                reason: "embedding response has no data".into(),
            })
    }
}

// ─── Response decoding ───────────────────────────────────────────────────────

/// Map a `reqwest` send failure: no connection at all is `ServerUnreachable`,
/// anything after that is `Transport`.
fn send_error(url: &str, e: reqwest::Error) -> ConnectError {
    if e.is_connect() {
        ConnectError::ServerUnreachable {
            endpoint: url.to_string(),
            reason: e.to_string(),
        }
    } else {
        ConnectError::Transport {
            endpoint: url.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Decode a 2xx body. A body carrying an `error` field is a rejection even
/// though the status said otherwise.
fn decode_body<T: DeserializeOwned>(status: u16, body: &str) -> Result<T> {
    let value: Value = serde_json::from_str(body).map_err(|e| ConnectError::MalformedResponse {
        reason: format!("response is not JSON: {e}"),
    })?;

    if let Some(error) = value.get("error") {
        return Err(ConnectError::RequestRejected {
            status,
            body: error_message(error),
        });
    }

    serde_json::from_value(value).map_err(|e| ConnectError::MalformedResponse {
        reason: format!("unexpected response shape: {e}"),
    })
}

/// Pull the human-readable message out of an error body, falling back to the raw text.
fn error_message_from_body(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => match value.get("error") {
            Some(error) => error_message(error),
            None => body.to_string(),
        },
        Err(_) => body.to_string(),
    }
}

fn error_message(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
