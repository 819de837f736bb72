use serde::Deserialize;

pub const FEEDBACK_COLLECTION: &str = "feedback";

/// Field written by the upload pipeline.
pub const VIDEO_URL_FIELD: &str = "videoUrl";

/// The subset of a feedback document this service reads back. Feedback
/// documents are free-form and merged into, so every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackView {
    pub user_id: Option<String>,
    pub total_score: Option<serde_json::Value>,
    pub final_assessment: Option<String>,
    pub created_at: Option<String>,
    pub video_url: Option<String>,
}
