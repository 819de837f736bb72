// Question generation: request validation, tech-stack normalisation,
// prompt construction and the LLM-backed generator.
// All LLM calls go through llm_client.

pub mod generator;
pub mod handlers;
pub mod prompts;
pub mod request;
