//! LLM provider access for the text bot.
//!
//! This module provides:
//! * [`LlmBackend`] — async trait for one provider call with one key.
//! * [`GroqClient`] — OpenAI-compatible REST implementation (chat,
//!   transcription, vision).
//! * [`TextProcessor`] — transcription, correction, summaries, OCR and
//!   document Q&A, each routed through the key-rotating
//!   [`Dispatcher`](crate::pool::Dispatcher).
//! * [`FriendlyProcessor`] — wraps a processor; turns failures into
//!   user-facing text.
//! * [`PromptBuilder`] / [`ProcessingMode`] — prompts per task.
//! * [`LlmError`] / [`ProcessError`] — error variants.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use textfix_bot::config::AppConfig;
//! use textfix_bot::llm::{FriendlyProcessor, GroqClient, ProcessingMode, TextProcessor};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!
//!     // Keys come from GROQ_API_KEYS; an empty pool degrades to a
//!     // "service unavailable" reply.
//!     let processor = FriendlyProcessor::new(TextProcessor::new(
//!         config.build_dispatcher(),
//!         Arc::new(GroqClient::from_config(&config.provider)),
//!         config.text.clone(),
//!     ));
//!
//!     let reply = processor.correct(ProcessingMode::Premium, "ну типа привет").await;
//!     println!("{reply}");
//! }
//! ```

pub mod client;
pub mod fallback;
pub mod processor;
pub mod prompt;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{ChatMessage, GroqClient, LlmBackend, LlmError};
pub use fallback::FriendlyProcessor;
pub use processor::{ProcessError, TextProcessor};
pub use prompt::{ProcessingMode, PromptBuilder};
