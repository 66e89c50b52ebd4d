#[cfg(test)]
mod tests;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use url::Url;

use crate::config::EmbeddingConfig;
use crate::{Capability, Result, SupportError};

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Fixed probe string used to discover the model's vector dimension once.
const DIMENSION_PROBE: &str = "dimension probe";

/// External embedding capability: one vector per input text, all vectors of
/// the same model-determined dimension.
pub trait TextEmbedder: Send + Sync {
    /// Embed each text, preserving input order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Discover the embedding dimension by embedding a known probe string.
    #[inline]
    fn probe_dimension(&self) -> Result<usize> {
        let vectors = self.embed(&[DIMENSION_PROBE.to_string()])?;
        vectors
            .first()
            .map(Vec::len)
            .filter(|dim| *dim > 0)
            .ok_or_else(|| SupportError::ExternalService {
                capability: Capability::Embedding,
                message: "probe embedding returned no vector".to_string(),
            })
    }
}

/// Blocking HTTP embedding client.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingClient {
    endpoint: Url,
    model: String,
    batch_size: usize,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    #[serde(rename = "input")]
    inputs: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl HttpEmbeddingClient {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let endpoint = config.endpoint_url()?;

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            batch_size: config.batch_size,
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
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

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.model,
            inputs: texts,
        };

        let request_json = serde_json::to_string(&request).map_err(|e| {
            SupportError::ExternalService {
                capability: Capability::Embedding,
                message: format!("failed to serialize embedding request: {}", e),
            }
        })?;

        let response_text = self.make_request_with_retry(|| {
            self.agent
                .post(self.endpoint.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let response: EmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            SupportError::ExternalService {
                capability: Capability::Embedding,
                message: format!("malformed embedding response: {}", e),
            }
        })?;

        if response.embeddings.len() != texts.len() {
            return Err(SupportError::ExternalService {
                capability: Capability::Embedding,
                message: format!(
                    "requested {} embeddings but received {}",
                    texts.len(),
                    response.embeddings.len()
                ),
            });
        }

        // A vector of zero length would silently poison the index.
        if let Some(dim) = response.embeddings.first().map(Vec::len) {
            if dim == 0 || response.embeddings.iter().any(|v| v.len() != dim) {
                return Err(SupportError::ExternalService {
                    capability: Capability::Embedding,
                    message: "embedding response vectors have inconsistent dimensions".to_string(),
                });
            }
        }

        Ok(response.embeddings)
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> std::result::Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("Embedding request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => return Ok(response_text),
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 {
                                warn!(
                                    "Embedding server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                return Err(SupportError::ExternalService {
                                    capability: Capability::Embedding,
                                    message: format!("HTTP {}", status),
                                });
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Embedding transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => false,
                    };

                    if !should_retry {
                        return Err(SupportError::ExternalService {
                            capability: Capability::Embedding,
                            message: error.to_string(),
                        });
                    }

                    last_error = Some(error.to_string());

                    if attempt < self.retry_attempts {
                        let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                        std::thread::sleep(Duration::from_millis(delay_ms));
                    }
                }
            }
        }

        error!(
            "All {} embedding attempts failed for {}",
            self.retry_attempts, self.endpoint
        );

        Err(SupportError::ExternalService {
            capability: Capability::Embedding,
            message: last_error.unwrap_or_else(|| "request failed after retries".to_string()),
        })
    }
}

impl TextEmbedder for HttpEmbeddingClient {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Embedding {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            results.extend(self.embed_single_batch(batch)?);
        }

        Ok(results)
    }
}

#[cfg(test)]
pub(crate) use test_support::StubEmbedder;
