//! Question generation — pluggable, trait-based generator plus the pipeline
//! that turns a validated request into a stored interview record.
//!
//! Default: `LlmQuestionGenerator` (Gemini via `llm_client`).
//! `AppState` holds an `Arc<dyn QuestionGenerator>`.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::backend::DocumentStore;
use crate::errors::AppError;
use crate::generation::prompts::{NO_TECHSTACK, QUESTIONS_PROMPT_TEMPLATE};
use crate::generation::request::QuestionRequest;
use crate::llm_client::LlmClient;
use crate::models::interview::{InterviewRecord, INTERVIEWS_COLLECTION};

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate(&self, request: &QuestionRequest) -> Result<Vec<String>, AppError>;
}

/// Asks the model for a JSON array of questions. The reply is parsed as a
/// list of strings with no further validation; malformed output is an error.
pub struct LlmQuestionGenerator(pub LlmClient);

#[async_trait]
impl QuestionGenerator for LlmQuestionGenerator {
    async fn generate(&self, request: &QuestionRequest) -> Result<Vec<String>, AppError> {
        let prompt = build_prompt(request);
        Ok(self.0.call_json::<Vec<String>>(&prompt).await?)
    }
}

pub fn build_prompt(request: &QuestionRequest) -> String {
    let techstack = if request.techstack.is_empty() {
        NO_TECHSTACK.to_string()
    } else {
        request.techstack.join(", ")
    };

    QUESTIONS_PROMPT_TEMPLATE
        .replace("{role}", &request.role)
        .replace("{level}", &request.level)
        .replace("{techstack}", &techstack)
        .replace("{type}", &request.interview_type)
        .replace("{amount}", &request.amount)
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Generates the questions and appends one interview record.
/// Returns the new record's id.
pub async fn create_interview(
    documents: &dyn DocumentStore,
    generator: &dyn QuestionGenerator,
    request: QuestionRequest,
) -> Result<String, AppError> {
    let questions = generator.generate(&request).await?;

    let record = InterviewRecord::new(
        request.role,
        request.interview_type,
        request.level,
        request.techstack,
        questions,
        request.user_id,
    );

    let document = match serde_json::to_value(&record) {
        Ok(Value::Object(map)) => map,
        Ok(_) => return Err(AppError::Internal("interview record is not an object".to_string())),
        Err(e) => return Err(AppError::Internal(format!("Failed to serialize interview: {e}"))),
    };

    let id = documents.add(INTERVIEWS_COLLECTION, &document).await?;
    info!(
        "Created interview {id} with {} question(s) for user {}",
        record.questions.len(),
        record.user_id
    );
    Ok(id)
}
