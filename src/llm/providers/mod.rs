//! Concrete [`LlmProvider`](crate::llm::LlmProvider) implementations

pub mod anthropic;
pub mod openai;

pub use anthropic::*;
pub use openai::*;
