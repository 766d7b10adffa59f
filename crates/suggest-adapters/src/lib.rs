//! # suggest-adapters
//!
//! Implementations of [`ReplySuggester`](domains::ReplySuggester).

mod disabled;
mod gemini;
mod prompt;

pub use disabled::DisabledSuggester;
pub use gemini::{GeminiConfig, GeminiSuggester, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};

/// Upper bound on suggestions handed to the caller.
pub const MAX_SUGGESTIONS: usize = 3;
