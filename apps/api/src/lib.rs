//! Mock interview service: question generation over HTTP, a pluggable
//! Firebase / self-hosted backend, and the client-side capture pipeline
//! (camera session, presence detection, overlay, recording upload).

pub mod backend;
pub mod capture;
pub mod config;
pub mod errors;
pub mod generation;
pub mod interviews;
pub mod llm_client;
pub mod models;
pub mod routes;
pub mod state;
