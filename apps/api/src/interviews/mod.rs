// Stored interviews: card summaries and server-side recording ingestion.

pub mod handlers;
pub mod summary;
