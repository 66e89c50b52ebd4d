use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};
use std::path::Path;

use super::settings::Config;

/// Print the current configuration to stdout.
#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir)?;

    println!("{}", style("Current configuration").bold());
    println!("  Config file: {}", config.config_file_path().display());
    println!();
    println!("{}", style("[embedding]").cyan());
    println!("  endpoint   = {}", config.embedding.endpoint);
    println!("  model      = {}", config.embedding.model);
    println!("  batch_size = {}", config.embedding.batch_size);
    println!("{}", style("[generation]").cyan());
    println!("  endpoint = {}", config.generation.endpoint);
    println!("  model    = {}", config.generation.model);
    println!("{}", style("[speech]").cyan());
    println!("  enabled          = {}", config.speech.enabled);
    println!("  voice            = {}", config.speech.voice);
    println!("  cooldown_seconds = {}", config.speech.cooldown_seconds);
    println!("{}", style("[retrieval]").cyan());
    println!("  collection     = {}", config.retrieval.collection);
    println!("  max_chunk_size = {}", config.retrieval.chunking.max_chunk_size);
    println!("  top_k          = {}", config.retrieval.top_k);
    println!("  history_window = {}", config.retrieval.history_window);

    Ok(())
}

/// Walk through the configuration interactively and save it.
#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    let mut config = Config::load(config_dir)?;

    println!("{}", style("support-rag configuration").bold());
    println!();

    config.embedding.endpoint = Input::new()
        .with_prompt("Embedding endpoint")
        .default(config.embedding.endpoint.clone())
        .interact_text()
        .context("Failed to read embedding endpoint")?;

    config.embedding.model = Input::new()
        .with_prompt("Embedding model")
        .default(config.embedding.model.clone())
        .interact_text()
        .context("Failed to read embedding model")?;

    config.generation.endpoint = Input::new()
        .with_prompt("Generation endpoint")
        .default(config.generation.endpoint.clone())
        .interact_text()
        .context("Failed to read generation endpoint")?;

    config.generation.model = Input::new()
        .with_prompt("Generation model")
        .default(config.generation.model.clone())
        .interact_text()
        .context("Failed to read generation model")?;

    config.speech.enabled = Confirm::new()
        .with_prompt("Enable speech synthesis?")
        .default(config.speech.enabled)
        .interact()
        .context("Failed to read speech toggle")?;

    if config.speech.enabled {
        config.speech.voice = Input::new()
            .with_prompt("Voice")
            .default(config.speech.voice.clone())
            .interact_text()
            .context("Failed to read voice")?;
    }

    config.retrieval.top_k = Input::new()
        .with_prompt("Retrieval top_k")
        .default(config.retrieval.top_k)
        .interact_text()
        .context("Failed to read top_k")?;

    if let Err(e) = config.validate() {
        println!("{} {}", style("Invalid configuration:").red(), e);
        return Err(e.into());
    }

    config.save()?;
    println!(
        "{} {}",
        style("Saved").green(),
        config.config_file_path().display()
    );

    Ok(())
}
