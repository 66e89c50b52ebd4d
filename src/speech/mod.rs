
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::config::SpeechConfig;
use crate::{Capability, Result, SupportError};

/// External speech-synthesis capability. Strictly optional decoration: the
/// text answer must remain usable when synthesis fails.
pub trait SpeechSynthesizer: Send + Sync {
    /// Render `text` as audio bytes. `instructions` optionally carries
    /// delivery guidance produced by the styling pass.
    fn synthesize(&self, text: &str, voice: &str, instructions: Option<&str>) -> Result<Vec<u8>>;
}

/// Prompt for the generator's second pass that turns an answer into delivery
/// instructions for the synthesizer.
#[inline]
pub fn styling_prompt(answer: &str) -> String {
    format!(
        "Convert the following support answer into natural spoken speech \
         instructions. Keep it friendly and clear.\n\nAnswer:\n{}\n",
        answer
    )
}

/// Blocking HTTP speech-synthesis client.
#[derive(Debug, Clone)]
pub struct HttpSpeechClient {
    endpoint: Url,
    model: String,
    api_key: Option<String>,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
    response_format: &'a str,
}

impl HttpSpeechClient {
    #[inline]
    pub fn new(config: &SpeechConfig) -> Result<Self> {
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
}

impl SpeechSynthesizer for HttpSpeechClient {
    #[inline]
    fn synthesize(&self, text: &str, voice: &str, instructions: Option<&str>) -> Result<Vec<u8>> {
        debug!("Synthesizing {} characters with voice '{}'", text.len(), voice);

        let request = SpeechRequest {
            model: &self.model,
            voice,
            input: text,
            instructions,
            response_format: "mp3",
        };

        let request_json =
            serde_json::to_string(&request).map_err(|e| SupportError::ExternalService {
                capability: Capability::Synthesis,
                message: format!("failed to serialize synthesis request: {}", e),
            })?;

        let mut builder = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", &format!("Bearer {}", key));
        }

        let audio = builder
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_vec())
            .map_err(|e| SupportError::ExternalService {
                capability: Capability::Synthesis,
                message: e.to_string(),
            })?;

        if audio.is_empty() {
            return Err(SupportError::ExternalService {
                capability: Capability::Synthesis,
                message: "synthesis returned no audio bytes".to_string(),
            });
        }

        Ok(audio)
    }
}

/// Cooldown gate around the synthesis capability. Tracks the last successful
/// synthesis and refuses to re-invoke the service within the minimum
/// interval, returning `RateLimited` instead of calling out.
#[derive(Debug)]
pub struct SynthesisGate {
    min_interval: Duration,
    last_success: Mutex<Option<Instant>>,
}

impl SynthesisGate {
    #[inline]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_success: Mutex::new(None),
        }
    }

    /// Check whether synthesis may run now.
    #[inline]
    pub fn try_acquire(&self) -> Result<()> {
        let last = self
            .last_success
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(instant) = *last {
            let elapsed = instant.elapsed();
            if elapsed < self.min_interval {
                return Err(SupportError::RateLimited {
                    retry_after: self.min_interval - elapsed,
                });
            }
        }

        Ok(())
    }

    /// Record a successful synthesis, starting a new cooldown window.
    #[inline]
    pub fn record_success(&self) {
        let mut last = self
            .last_success
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
pub(crate) use test_support::StubSynthesizer;
