
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::generation::AnswerGenerator;
use crate::retriever::{RetrievalOutcome, RetrievalResult};
use crate::session::{ConversationTurn, Role};

/// Business rules baked into every prompt, plus the deterministic fallback
/// used when retrieval finds nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessPolicy {
    pub business_name: String,
    pub contact_instructions: String,
    pub fallback_answer: String,
    /// Most recent turns included in the prompt, bounding its size.
    pub history_window: usize,
}

impl Default for BusinessPolicy {
    #[inline]
    fn default() -> Self {
        Self {
            business_name: "Shikhar Traders".to_string(),
            contact_instructions:
                "tell the customer to contact the store directly by phone or email".to_string(),
            fallback_answer: "Sorry, I couldn't find that in the documentation. \
                              Please contact support or try again later."
                .to_string(),
            history_window: 10,
        }
    }
}

impl BusinessPolicy {
    fn preamble(&self) -> String {
        format!(
            "You are the {name} customer support assistant.\n\
             Rules:\n\
             - Answer from the documentation context only.\n\
             - Be short, clear, and professional.\n\
             - Prices are approximate.\n\
             - For payment confirmation and final pricing, {contact}.\n\
             - Only discuss products covered by the documentation.\n\
             - Reply in the same language the customer used.\n",
            name = self.business_name,
            contact = self.contact_instructions,
        )
    }
}

/// A grounded answer with the sources it cites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedAnswer {
    pub text: String,
    pub cited_sources: Vec<String>,
}

/// Builds a grounded prompt from retrieved chunks, conversation history, and
/// the business policy, then delegates generation.
pub struct AnswerComposer {
    policy: BusinessPolicy,
    generator: Arc<dyn AnswerGenerator>,
}

impl AnswerComposer {
    #[inline]
    pub fn new(policy: BusinessPolicy, generator: Arc<dyn AnswerGenerator>) -> Self {
        Self { policy, generator }
    }

    #[inline]
    pub fn policy(&self) -> &BusinessPolicy {
        &self.policy
    }

    /// Compose an answer for `question` given the retrieval outcome and the
    /// session history.
    ///
    /// When retrieval found nothing, the fixed fallback answer is returned
    /// without invoking the generation capability at all.
    #[inline]
    pub fn compose(
        &self,
        outcome: &RetrievalOutcome,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<ComposedAnswer> {
        let retrieval = match outcome {
            RetrievalOutcome::Hits(retrieval) => retrieval,
            RetrievalOutcome::NoRelevantContent => {
                debug!("No relevant content, returning fallback answer");
                return Ok(ComposedAnswer {
                    text: self.policy.fallback_answer.clone(),
                    cited_sources: Vec::new(),
                });
            }
        };

        let prompt = self.build_prompt(retrieval, question, history);
        let text = self.generator.generate(&prompt)?;

        Ok(ComposedAnswer {
            text,
            cited_sources: retrieval.sources.clone(),
        })
    }

    fn build_prompt(
        &self,
        retrieval: &RetrievalResult,
        question: &str,
        history: &[ConversationTurn],
    ) -> String {
        let mut prompt = self.policy.preamble();

        prompt.push_str("\nDocumentation context:\n");
        for chunk in &retrieval.chunks {
            prompt.push_str(&format!("Source: {}\n{}\n\n", chunk.url, chunk.text));
        }

        let window_start = history.len().saturating_sub(self.policy.history_window);
        let recent = &history[window_start..];
        if !recent.is_empty() {
            prompt.push_str("Conversation so far:\n");
            for turn in recent {
                let speaker = match turn.role {
                    Role::User => "Customer",
                    Role::Assistant => "Assistant",
                };
                prompt.push_str(&format!("{}: {}\n", speaker, turn.content));
            }
            prompt.push('\n');
        }

        prompt.push_str(&format!("Customer question: {}\n", question));
        prompt
    }
}
