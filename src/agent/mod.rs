
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::SupportError;
use crate::composer::{AnswerComposer, BusinessPolicy};
use crate::config::Config;
use crate::embeddings::HttpEmbeddingClient;
use crate::generation::{AnswerGenerator, HttpGenerationClient};
use crate::index::VectorIndex;
use crate::retriever::{Document, IngestReport, Retriever};
use crate::session::{ConversationTurn, SessionState};
use crate::speech::{HttpSpeechClient, SpeechSynthesizer, SynthesisGate, styling_prompt};
use crate::{Capability, Result};

/// Ticket identifying one submitted question. Completed answers are appended
/// to the session in ticket order; a result whose ticket has been overtaken
/// is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct QuestionTicket(u64);

/// One completed pipeline pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    pub answer: String,
    pub sources: Vec<String>,
    pub audio: Option<Vec<u8>>,
    /// Non-fatal degradation notice (synthesis failure or cooldown).
    pub warning: Option<String>,
}

/// Explicit pipeline context: owns the retriever, composer, capability
/// clients, cooldown gate, and session state. Every call flows through this
/// object; there is no ambient global state.
pub struct SupportAgent {
    retriever: Retriever,
    composer: AnswerComposer,
    generator: Arc<dyn AnswerGenerator>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    voice: String,
    gate: SynthesisGate,
    chunk_size: usize,
    top_k: usize,
    session: Mutex<SessionState>,
    submitted: AtomicU64,
    completed: Mutex<u64>,
}

impl SupportAgent {
    #[inline]
    pub fn new(
        retriever: Retriever,
        composer: AnswerComposer,
        generator: Arc<dyn AnswerGenerator>,
        chunk_size: usize,
        top_k: usize,
        cooldown: Duration,
    ) -> Self {
        Self {
            retriever,
            composer,
            generator,
            synthesizer: None,
            voice: String::new(),
            gate: SynthesisGate::new(cooldown),
            chunk_size,
            top_k,
            session: Mutex::new(SessionState::new()),
            submitted: AtomicU64::new(0),
            completed: Mutex::new(0),
        }
    }

    #[inline]
    pub fn with_synthesizer(
        mut self,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        voice: impl Into<String>,
    ) -> Self {
        self.synthesizer = Some(synthesizer);
        self.voice = voice.into();
        self
    }

    /// Wire up an agent from configuration using the HTTP capability clients.
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let index = Arc::new(VectorIndex::new());
        let embedder = Arc::new(HttpEmbeddingClient::new(&config.embedding)?);
        let generator: Arc<dyn AnswerGenerator> =
            Arc::new(HttpGenerationClient::new(&config.generation)?);

        let retriever = Retriever::new(
            index,
            embedder,
            config.retrieval.collection.clone(),
            config.retrieval.distance,
        );

        let policy = BusinessPolicy {
            history_window: config.retrieval.history_window,
            ..BusinessPolicy::default()
        };
        let composer = AnswerComposer::new(policy, Arc::clone(&generator));

        let mut agent = Self::new(
            retriever,
            composer,
            generator,
            config.retrieval.chunking.max_chunk_size,
            config.retrieval.top_k,
            Duration::from_secs(config.speech.cooldown_seconds),
        );

        if config.speech.enabled {
            let synthesizer = Arc::new(HttpSpeechClient::new(&config.speech)?);
            agent = agent.with_synthesizer(synthesizer, config.speech.voice.clone());
        }

        Ok(agent)
    }

    /// Ingest one document into the knowledge base.
    #[inline]
    pub fn ingest(&self, document: &Document) -> Result<IngestReport> {
        self.retriever.ingest(document, self.chunk_size)
    }

    /// Register a question submission and return its ordering ticket.
    #[inline]
    pub fn submit_question(&self) -> QuestionTicket {
        QuestionTicket(self.submitted.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Run the full pipeline for one question: retrieve, compose, optionally
    /// synthesize speech, then append the exchange to the session.
    #[inline]
    pub fn ask(&self, question: &str, with_audio: bool) -> Result<Option<AgentReply>> {
        let ticket = self.submit_question();
        self.ask_submitted(ticket, question, with_audio)
    }

    /// Run the pipeline for an already-submitted question. Returns `Ok(None)`
    /// when a newer question completed first; the stale result is discarded
    /// and nothing is appended, so session order always matches completion
    /// order.
    #[inline]
    pub fn ask_submitted(
        &self,
        ticket: QuestionTicket,
        question: &str,
        with_audio: bool,
    ) -> Result<Option<AgentReply>> {
        debug!("Answering question (ticket {:?})", ticket);

        let history: Vec<ConversationTurn> = {
            let session = self.lock_session();
            session
                .recent(self.composer.policy().history_window)
                .to_vec()
        };

        // A failed retrieval or generation aborts here; the session is left
        // untouched for the failed turn.
        let outcome = self.retriever.answer_context(question, self.top_k)?;
        let composed = self.composer.compose(&outcome, question, &history)?;

        let mut audio = None;
        let mut warning = None;
        if with_audio {
            match self.synthesize_answer(&composed.text) {
                Ok(bytes) => audio = Some(bytes),
                Err(SupportError::RateLimited { retry_after }) => {
                    warn!("Synthesis cooldown active, answering without audio");
                    warning = Some(format!(
                        "speech synthesis is cooling down, retry in {:.0?}",
                        retry_after
                    ));
                }
                Err(e) => {
                    warn!("Speech synthesis failed: {}", e);
                    warning = Some(format!("speech synthesis unavailable: {}", e));
                }
            }
        }

        {
            let mut completed = self
                .completed
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if ticket.0 <= *completed {
                info!("Discarding stale answer for ticket {:?}", ticket);
                return Ok(None);
            }
            *completed = ticket.0;

            let audio_ref = audio.as_ref().map(|_| format!("audio/{}", Uuid::new_v4()));
            let mut session = self.lock_session();
            session.append(ConversationTurn::user(question));
            let mut turn = ConversationTurn::assistant(composed.text.clone());
            if let Some(reference) = audio_ref {
                turn = turn.with_audio_ref(reference);
            }
            session.append(turn);
        }

        Ok(Some(AgentReply {
            answer: composed.text,
            sources: composed.cited_sources,
            audio,
            warning,
        }))
    }

    fn synthesize_answer(&self, answer: &str) -> Result<Vec<u8>> {
        let synthesizer =
            self.synthesizer
                .as_ref()
                .ok_or_else(|| SupportError::ExternalService {
                    capability: Capability::Synthesis,
                    message: "no speech synthesizer configured".to_string(),
                })?;

        self.gate.try_acquire()?;

        // Styling failures degrade to plain synthesis rather than losing audio.
        let instructions = match self.generator.generate(&styling_prompt(answer)) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Speech styling pass failed, synthesizing unstyled: {}", e);
                None
            }
        };

        let audio = synthesizer.synthesize(answer, &self.voice, instructions.as_deref())?;
        self.gate.record_success();
        Ok(audio)
    }

    /// Snapshot of the conversation so far.
    #[inline]
    pub fn history(&self) -> Vec<ConversationTurn> {
        self.lock_session().turns().to_vec()
    }

    /// Explicit user action: wipe the conversation.
    #[inline]
    pub fn clear_session(&self) {
        self.lock_session().clear();
    }

    fn lock_session(&self) -> MutexGuard<'_, SessionState> {
        self.session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
