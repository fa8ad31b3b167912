//! Picking one model name out of a list.

use rand::Rng;

use crate::server::errors::{ConnectError, Result};

/// How [`select_model_name`] chooses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionMode {
    /// The first model in the list.
    First,
    /// Exactly this name, which must be in the list.
    Specific(String),
    /// Uniformly at random.
    Random,
}

/// Pick a model name from `models` according to `mode`.
pub fn select_model_name(models: &[String], mode: &SelectionMode) -> Result<String> {
    if models.is_empty() {
        return Err(ConnectError::NoModelsAvailable);
    }

    let selected = match mode {
        SelectionMode::First => models[0].clone(),
        SelectionMode::Specific(name) => models
            .iter()
            .find(|m| *m == name)
            .cloned()
            .ok_or_else(|| ConnectError::ModelNotFound { name: name.clone() })?,
        SelectionMode::Random => {
            let index = rand::thread_rng().gen_range(0..models.len());
            models[index].clone()
        }
    };

    tracing::debug!(model = %selected, mode = ?mode, "model selected");
    Ok(selected)
}
