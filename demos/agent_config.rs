//! Print the `llm_config` an agent framework needs for one loaded model.
//!
//! ```text
//! cargo run --example agent_config -- lmstudio-community/Meta-Llama-3-8B-Instruct-GGUF
//! ```

use lmstudio_connect::{select_model_name, ConnectSettings, ModelManager, SelectionMode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lmstudio_connect::init_tracing()?;

    let mut manager = ModelManager::from_settings(ConnectSettings::from_env())?;
    let loaded = manager.load_and_save_models().await?;

    let mode = match std::env::args().nth(1) {
        Some(name) => SelectionMode::Specific(name),
        None => SelectionMode::First,
    };
    let model = select_model_name(&loaded, &mode)?;

    let config_list = manager.get_model_config_list(&model)?;
    println!("{}", serde_json::to_string_pretty(&config_list)?);
    Ok(())
}
