use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SupportError>;

/// External capability that a pipeline stage delegates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Embedding,
    Search,
    Generation,
    Synthesis,
}

impl fmt::Display for Capability {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Embedding => write!(f, "embedding"),
            Capability::Search => write!(f, "search"),
            Capability::Generation => write!(f, "generation"),
            Capability::Synthesis => write!(f, "synthesis"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SupportError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("External {capability} service failed: {message}")]
    ExternalService {
        capability: Capability,
        message: String,
    },

    #[error("Configuration mismatch: {0}")]
    ConfigMismatch(String),

    #[error("Rate limited: retry in {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl SupportError {
    /// True for failures that must abort the operation and must not be retried.
    #[inline]
    pub fn is_non_retryable(&self) -> bool {
        matches!(
            self,
            SupportError::InvalidArgument(_)
                | SupportError::ConfigMismatch(_)
                | SupportError::Config(_)
        )
    }
}

pub mod agent;
pub mod chunking;
pub mod commands;
pub mod composer;
pub mod config;
pub mod embeddings;
pub mod generation;
pub mod index;
pub mod retriever;
pub mod session;
pub mod speech;
