// Document generation: prompt construction, the end-to-end pipeline and keyword extraction.
// All remote calls go through llm_client; nothing here speaks HTTP to the service directly.

pub mod generator;
pub mod handlers;
pub mod keywords;
pub mod prompt_builder;
pub mod prompts;
