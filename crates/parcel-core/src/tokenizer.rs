//! Token estimation for keeping attachments within a model's context budget.
//!
//! Text uses either a characters-per-token heuristic (default) or tiktoken's
//! cl100k BPE. Images bypass both and are priced by pixel area.

use std::sync::Arc;

use crate::config::TokenCounter;
use crate::defaults::{CHARS_PER_TOKEN, IMAGE_PIXELS_PER_TOKEN};
use crate::error::{Error, Result};

/// Approximate token counter for extracted content.
#[derive(Clone, Default)]
pub enum TokenEstimator {
    /// `ceil(chars / 3.7)`. Monotonic in input length.
    #[default]
    Heuristic,
    /// Exact cl100k count via tiktoken.
    Tiktoken(Arc<tiktoken_rs::CoreBPE>),
}

impl std::fmt::Debug for TokenEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl TokenEstimator {
    /// Build the estimator selected in configuration.
    ///
    /// # Errors
    /// Returns an error if the cl100k BPE tables fail to initialize.
    pub fn from_counter(counter: TokenCounter) -> Result<Self> {
        match counter {
            TokenCounter::Heuristic => Ok(Self::Heuristic),
            TokenCounter::Cl100k => Self::cl100k(),
        }
    }

    /// Create a tiktoken-backed estimator (cl100k_base).
    pub fn cl100k() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| Error::Config(format!("Failed to initialize cl100k_base: {}", e)))?;
        Ok(Self::Tiktoken(Arc::new(bpe)))
    }

    /// Estimate tokens for a piece of text content.
    pub fn estimate(&self, text: &str) -> usize {
        match self {
            Self::Heuristic => estimate_tokens(text),
            Self::Tiktoken(bpe) => bpe.encode_ordinary(text).len(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Heuristic => "heuristic",
            Self::Tiktoken(_) => "cl100k_base",
        }
    }
}

/// Quickly estimate token count without full tokenization.
///
/// Uses a heuristic ratio of ~3.7 characters per token for English text.
/// Counts characters, not bytes, so multi-byte scripts are not overpriced.
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() as f32 / CHARS_PER_TOKEN).ceil() as usize
}

/// Token cost of an image of the given pixel dimensions: `round(w * h / 750)`.
pub fn estimate_image_tokens(width: u32, height: u32) -> usize {
    ((width as f64 * height as f64) / IMAGE_PIXELS_PER_TOKEN).round() as usize
}

/// Check if text likely exceeds a token limit using estimation.
///
/// Useful for quick filtering before expensive tokenization.
pub fn likely_exceeds_limit(text: &str, limit: usize) -> bool {
    estimate_tokens(text) > limit
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_ENGLISH: &str = "The quick brown fox jumps over the lazy dog.";

    #[test]
    fn test_estimate_tokens_empty() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_estimate_tokens_short() {
        // "Hello" is 5 chars -> ceil(5 / 3.7) = 2
        assert_eq!(estimate_tokens("Hello"), 2);
    }

    #[test]
    fn test_estimate_tokens_monotonic() {
        let mut previous = 0;
        let mut text = String::new();
        for _ in 0..500 {
            text.push('a');
            let current = estimate_tokens(&text);
            assert!(current >= previous, "estimate decreased at len {}", text.len());
            previous = current;
        }
    }

    #[test]
    fn test_estimate_tokens_deterministic() {
        assert_eq!(estimate_tokens(SIMPLE_ENGLISH), estimate_tokens(SIMPLE_ENGLISH));
    }

    #[test]
    fn test_estimate_tokens_counts_chars_not_bytes() {
        // 4 chars, 12 bytes
        assert_eq!(estimate_tokens("日本語字"), 2);
    }

    #[test]
    fn test_image_tokens() {
        assert_eq!(estimate_image_tokens(750, 1), 1);
        assert_eq!(estimate_image_tokens(1000, 1000), 1333);
        assert_eq!(estimate_image_tokens(0, 100), 0);
    }

    #[test]
    fn test_image_tokens_scale_quadratically() {
        let base = estimate_image_tokens(400, 300);
        let doubled = estimate_image_tokens(800, 600);
        assert_eq!(base, 160);
        assert_eq!(doubled, 640);
        assert_eq!(doubled, base * 4);
    }

    #[test]
    fn test_likely_exceeds_limit() {
        assert!(!likely_exceeds_limit(SIMPLE_ENGLISH, 100));
        assert!(likely_exceeds_limit(&"word ".repeat(1000), 100));
    }

    #[test]
    fn test_heuristic_estimator_matches_free_fn() {
        let estimator = TokenEstimator::default();
        assert_eq!(estimator.name(), "heuristic");
        assert_eq!(estimator.estimate(SIMPLE_ENGLISH), estimate_tokens(SIMPLE_ENGLISH));
    }

    #[test]
    fn test_tiktoken_estimator() {
        let estimator = TokenEstimator::from_counter(TokenCounter::Cl100k).unwrap();
        assert_eq!(estimator.name(), "cl100k_base");
        let count = estimator.estimate(SIMPLE_ENGLISH);
        // "The quick brown fox jumps over the lazy dog." is typically ~10 tokens
        assert!((8..=12).contains(&count), "Expected ~10 tokens, got {}", count);
        assert_eq!(estimator.estimate(""), 0);
    }
}
