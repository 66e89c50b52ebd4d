use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::agent::SupportAgent;
use crate::config::Config;
use crate::retriever::Document;

/// Load a knowledge-base document from a local path or an http(s) URL.
fn load_document(source: &str) -> Result<Document> {
    if source.starts_with("http://") || source.starts_with("https://") {
        info!("Fetching document from {}", source);
        let text = ureq::get(source)
            .call()
            .with_context(|| format!("Failed to fetch document: {}", source))?
            .body_mut()
            .read_to_string()
            .with_context(|| format!("Failed to read document body: {}", source))?;
        return Ok(Document::new(source, text));
    }

    let path = Path::new(source);
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read document file: {}", source))?;

    let title = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned());
    let mut document = Document::new(format!("file://{}", path.display()), text);
    if let Some(title) = title {
        document = document.with_title(title);
    }
    Ok(document)
}

/// Ingest every source into the agent's knowledge base, with progress output.
fn ingest_sources(agent: &SupportAgent, sources: &[String]) -> Result<()> {
    if sources.is_empty() {
        bail!("No knowledge-base sources given. Pass at least one --kb <path-or-url>.");
    }

    let bar = ProgressBar::new(sources.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
            .context("Invalid progress template")?,
    );

    let mut chunks_indexed = 0;
    for source in sources {
        bar.set_message(source.clone());
        let document = load_document(source)?;
        let report = agent
            .ingest(&document)
            .with_context(|| format!("Failed to ingest document: {}", source))?;
        chunks_indexed += report.chunks_indexed;
        bar.inc(1);
    }
    bar.finish_and_clear();

    println!(
        "{} {} document(s), {} chunk(s) indexed",
        style("Ingested").green(),
        sources.len(),
        chunks_indexed
    );
    Ok(())
}

fn print_reply(reply: &crate::agent::AgentReply) {
    println!("{} {}", style("Answer:").bold(), reply.answer);
    if !reply.sources.is_empty() {
        println!("{} {}", style("Sources:").dim(), reply.sources.join(", "));
    }
    if let Some(warning) = &reply.warning {
        println!("{} {}", style("Note:").yellow(), warning);
    }
}

fn write_audio(reply: &crate::agent::AgentReply, audio_out: &Path) -> Result<()> {
    if let Some(audio) = &reply.audio {
        fs::write(audio_out, audio)
            .with_context(|| format!("Failed to write audio file: {}", audio_out.display()))?;
        println!(
            "{} {} ({} bytes)",
            style("Audio:").dim(),
            audio_out.display(),
            audio.len()
        );
    }
    Ok(())
}

/// Answer a single question against the given knowledge-base sources.
#[inline]
pub fn ask(
    config_dir: &Path,
    question: &str,
    sources: &[String],
    with_audio: bool,
    audio_out: &Path,
) -> Result<()> {
    let config = Config::load(config_dir)?;
    let agent = SupportAgent::from_config(&config)?;

    ingest_sources(&agent, sources)?;

    let reply = agent
        .ask(question, with_audio)?
        .context("Answer was superseded before completion")?;

    print_reply(&reply);
    write_audio(&reply, audio_out)?;
    Ok(())
}

/// Interactive support chat. Type `clear` to reset the conversation and an
/// empty line, `exit`, or `quit` to leave.
#[inline]
pub fn chat(config_dir: &Path, sources: &[String], with_audio: bool) -> Result<()> {
    let config = Config::load(config_dir)?;
    let agent = SupportAgent::from_config(&config)?;

    ingest_sources(&agent, sources)?;

    println!(
        "{}",
        style("Support chat ready. Empty line, 'exit', or 'quit' to leave.").dim()
    );

    loop {
        let question: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read question")?;

        let question = question.trim().to_string();
        match question.as_str() {
            "" | "exit" | "quit" => break,
            "clear" => {
                agent.clear_session();
                println!("{}", style("Conversation cleared.").dim());
                continue;
            }
            _ => {}
        }

        match agent.ask(&question, with_audio) {
            Ok(Some(reply)) => print_reply(&reply),
            Ok(None) => {}
            Err(e) => {
                warn!("Question failed: {}", e);
                println!("{} {}", style("Error:").red(), e);
            }
        }
    }

    Ok(())
}
