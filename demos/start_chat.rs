//! Stream a short chat from a loaded model to stdout.
//!
//! ```text
//! cargo run --example start_chat
//! ```

use std::io::Write;

use futures::StreamExt;
use lmstudio_connect::{
    select_model_name, ChatMessage, ConnectSettings, ModelManager, RequestParameters,
    SelectionMode,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lmstudio_connect::init_tracing()?;

    let mut manager = ModelManager::from_settings(ConnectSettings::from_env())?;
    let loaded = manager.load_and_save_models().await?;
    let identifier = select_model_name(&loaded, &SelectionMode::Random)?;
    let record = manager.get_model_config(&identifier)?;

    let messages = [
        ChatMessage::system("You are a helpful coding assistant."),
        ChatMessage::user("How do I init and update a git submodule?"),
    ];
    let parameters = record.parameters.overlay(&RequestParameters {
        temperature: Some(0.7),
        ..Default::default()
    });

    let deltas = manager
        .server()
        .stream_chat(record.request_model(&identifier), &messages, &parameters)
        .await?;
    futures::pin_mut!(deltas);

    let mut stdout = std::io::stdout();
    while let Some(delta) = deltas.next().await {
        write!(stdout, "{}", delta?.text)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}
