use std::path::PathBuf;

use clap::{Parser, Subcommand};
use support_rag::Result;
use support_rag::commands::{ask, chat};
use support_rag::config::{run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "support-rag")]
#[command(about = "A retrieval-grounded customer support assistant")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml
    #[arg(long, global = true, default_value = ".support-rag")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure service endpoints and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Answer a single question against the given knowledge base
    Ask {
        /// The customer question
        question: String,
        /// Knowledge-base source: a file path or http(s) URL (repeatable)
        #[arg(long = "kb")]
        kb: Vec<String>,
        /// Also synthesize the answer as speech
        #[arg(long)]
        audio: bool,
        /// Where to write the synthesized audio
        #[arg(long, default_value = "answer.mp3")]
        audio_out: PathBuf,
    },
    /// Start an interactive support chat session
    Chat {
        /// Knowledge-base source: a file path or http(s) URL (repeatable)
        #[arg(long = "kb")]
        kb: Vec<String>,
        /// Synthesize each answer as speech
        #[arg(long)]
        audio: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&cli.config_dir)?;
            } else {
                run_interactive_config(&cli.config_dir)?;
            }
        }
        Commands::Ask {
            question,
            kb,
            audio,
            audio_out,
        } => {
            ask(&cli.config_dir, &question, &kb, audio, &audio_out)?;
        }
        Commands::Chat { kb, audio } => {
            chat(&cli.config_dir, &kb, audio)?;
        }
    }

    Ok(())
}
