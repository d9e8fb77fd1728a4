//! LLM provider abstraction layer
//!
//! Provider-agnostic completion interface with Anthropic and OpenAI backends.

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;
