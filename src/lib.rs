pub mod api;
pub mod chunker;
pub mod config;
pub mod llm_provider;
pub mod processor;

pub use chunker::SplitPolicy;
pub use llm_provider::{LlmProvider, OpenAiProvider};
