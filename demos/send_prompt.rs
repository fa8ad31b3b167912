//! Reconcile the model library, pick a loaded model and send it one prompt.
//!
//! ```text
//! cargo run --example send_prompt
//! ```

use lmstudio_connect::{
    select_model_name, ConnectSettings, ModelManager, RequestParameters, SelectionMode,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lmstudio_connect::init_tracing()?;

    let mut manager = ModelManager::from_settings(ConnectSettings::from_env())?;
    let loaded = manager.load_and_save_models().await?;
    let model = select_model_name(&loaded, &SelectionMode::First)?;

    let parameters = RequestParameters {
        max_tokens: Some(1024),
        ..Default::default()
    };
    let response = manager
        .send_prompt(
            &model,
            "Tell me about something advanced and interesting about Rust",
            &parameters,
        )
        .await?;

    println!("[{model}] {}", response.text());
    Ok(())
}
