//! Server gateway: OpenAI-style HTTP client for the local model server.
//!
//! This module handles all communication with the server:
//! - Liveness check and listing of loaded models
//! - Prompt, chat and embedding requests (non-streaming and SSE)
//! - The recognized-parameter guard run before every request
//! - Connection settings (YAML + environment overrides)

pub mod client;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod parameters;
pub mod streaming;
pub mod types;

pub use client::LmStudioClient;
pub use config::{ConnectSettings, PromptDefaults};
pub use errors::{ConnectError, Result};
pub use gateway::ModelServer;
pub use parameters::{validate_object, RequestParameters, StopSequences, RECOGNIZED_PARAMETERS};
pub use types::{ChatCompletionResponse, ChatMessage, CompletionResponse, Role, StreamDelta};
