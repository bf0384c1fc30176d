//! Language-model helpers for request intake.
//!
//! Every entry point degrades to deterministic heuristics from `fixquote-core` when no model
//! is configured or the model answer is unusable. The model only ever structures customer
//! text or suggests a market range; it never decides what a handyman quotes.

pub mod estimator;
pub mod llm;
pub mod parser;
pub mod vision;

pub use estimator::{EstimateSource, PriceEstimator};
pub use llm::{ChatMessage, ChatRequest, LlmClient, LlmError, OpenAiCompatibleClient};
pub use parser::{ParseOutcome, ParseSource, RequestParser};
pub use vision::ImageDescriber;
