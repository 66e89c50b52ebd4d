
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::GenerationConfig;
use crate::{Capability, Result, SupportError};

/// External text-generation capability. This crate never generates language
/// itself; it only assembles prompts and delegates.
pub trait AnswerGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Blocking chat-completions client.
#[derive(Debug, Clone)]
pub struct HttpGenerationClient {
    endpoint: Url,
    model: String,
    api_key: Option<String>,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl HttpGenerationClient {
    #[inline]
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let endpoint = config.endpoint_url()?;

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            agent,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }
}

impl AnswerGenerator for HttpGenerationClient {
    #[inline]
    fn generate(&self, prompt: &str) -> Result<String> {
        debug!("Generating answer ({} prompt chars)", prompt.len());

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let request_json =
            serde_json::to_string(&request).map_err(|e| SupportError::ExternalService {
                capability: Capability::Generation,
                message: format!("failed to serialize generation request: {}", e),
            })?;

        let mut builder = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", &format!("Bearer {}", key));
        }

        let response_text = builder
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| SupportError::ExternalService {
                capability: Capability::Generation,
                message: e.to_string(),
            })?;

        let response: ChatResponse =
            serde_json::from_str(&response_text).map_err(|e| SupportError::ExternalService {
                capability: Capability::Generation,
                message: format!("malformed generation response: {}", e),
            })?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| SupportError::ExternalService {
                capability: Capability::Generation,
                message: "generation response contained no choices".to_string(),
            })
    }
}

#[cfg(test)]
pub(crate) use test_support::StubGenerator;

#[cfg(test)]
mod test_support {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Canned generator that records every prompt it sees.
    #[derive(Debug, Default)]
    pub(crate) struct StubGenerator {
        pub calls: AtomicUsize,
        pub prompts: Mutex<Vec<String>>,
        pub fail_next: std::sync::atomic::AtomicBool,
    }

    impl StubGenerator {
        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn last_prompt(&self) -> Option<String> {
            self.prompts
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .last()
                .cloned()
        }
    }

    impl AnswerGenerator for StubGenerator {
        fn generate(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(SupportError::ExternalService {
                    capability: Capability::Generation,
                    message: "stubbed generation failure".to_string(),
                });
            }
            self.prompts
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(prompt.to_string());
            Ok("The price is approximately 415 per bag.".to_string())
        }
    }
}
