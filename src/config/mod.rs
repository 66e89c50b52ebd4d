// Configuration module
// TOML-backed settings plus an interactive editor for first-time setup

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, EmbeddingConfig, GenerationConfig, RetrievalConfig, SpeechConfig,
};
