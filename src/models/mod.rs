//! Model library and the manager that keeps it reconciled with the server.

pub mod library;
pub mod manager;
pub mod record;
pub mod selector;

pub use library::{ModelConfigs, ModelLibrary};
pub use manager::{reconcile, ModelManager, ServerStatus};
pub use record::{short_name, EndpointConfig, LlmConfigList, ModelConfigRecord};
pub use selector::{select_model_name, SelectionMode};
