//! The seam between the model manager and the model server.

use async_trait::async_trait;

use super::errors::Result;
use super::parameters::RequestParameters;
use super::types::{ChatCompletionResponse, ChatMessage, CompletionResponse};

/// One network round trip per call, no retries.
///
/// [`LmStudioClient`](super::client::LmStudioClient) is the HTTP
/// implementation. Request parameters are validated before anything is sent,
/// so an invalid parameter never costs a round trip.
#[async_trait]
pub trait ModelServer: Send + Sync {
    /// `Ok(true)` when the server answers with a 2xx status.
    ///
    /// Fails with `ServerUnreachable` when no connection can be made.
    async fn check_status(&self) -> Result<bool>;

    /// Identifiers of the models currently loaded, in server order.
    async fn list_loaded_models(&self) -> Result<Vec<String>>;

    /// Text completion for a single prompt.
    async fn send_prompt(
        &self,
        model: &str,
        prompt: &str,
        parameters: &RequestParameters,
    ) -> Result<CompletionResponse>;

    /// Chat completion for an ordered message sequence.
    async fn send_chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        parameters: &RequestParameters,
    ) -> Result<ChatCompletionResponse>;

    /// Embedding vector for `input`.
    async fn generate_embedding(&self, model: &str, input: &str) -> Result<Vec<f32>>;
}
