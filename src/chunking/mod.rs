
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Result, SupportError};

/// Configuration for document chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub max_chunk_size: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
        }
    }
}

/// Split text into contiguous, non-overlapping windows of at most `max_size`
/// characters, preserving original order. The final chunk may be shorter.
///
/// Concatenating the returned chunks reproduces the input exactly, so the
/// split is deterministic and lossless. Whitespace-only input yields no
/// chunks rather than a degenerate empty chunk.
#[inline]
pub fn chunk_text(text: &str, max_size: usize) -> Result<Vec<String>> {
    if max_size == 0 {
        return Err(SupportError::InvalidArgument(
            "chunk size must be greater than zero".to_string(),
        ));
    }

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut chunks = Vec::new();
    let mut current = String::with_capacity(max_size.min(text.len()));
    let mut current_chars = 0;

    for ch in text.chars() {
        if current_chars == max_size {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        current.push(ch);
        current_chars += 1;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    debug!(
        "Chunked {} characters into {} chunks (max size {})",
        text.chars().count(),
        chunks.len(),
        max_size
    );

    Ok(chunks)
}
