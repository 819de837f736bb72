use chrono::{SecondsFormat, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

pub const INTERVIEWS_COLLECTION: &str = "interviews";

const INTERVIEW_COVERS: &[&str] = &[
    "/adobe.png",
    "/amazon.png",
    "/facebook.png",
    "/hostinger.png",
    "/pinterest.png",
    "/quora.png",
    "/reddit.png",
    "/skype.png",
    "/spotify.png",
    "/telegram.png",
    "/tiktok.png",
    "/yahoo.png",
];

/// A generated mock interview. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewRecord {
    pub role: String,
    #[serde(rename = "type")]
    pub interview_type: String,
    pub level: String,
    #[serde(default)]
    pub techstack: Vec<String>,
    #[serde(default)]
    pub questions: Vec<String>,
    pub user_id: String,
    #[serde(default)]
    pub finalized: bool,
    #[serde(default)]
    pub cover_image: String,
    /// RFC 3339 UTC timestamp.
    #[serde(default)]
    pub created_at: String,
}

impl InterviewRecord {
    pub fn new(
        role: String,
        interview_type: String,
        level: String,
        techstack: Vec<String>,
        questions: Vec<String>,
        user_id: String,
    ) -> Self {
        Self {
            role,
            interview_type,
            level,
            techstack,
            questions,
            user_id,
            finalized: true,
            cover_image: random_interview_cover(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

pub fn random_interview_cover() -> String {
    let cover = INTERVIEW_COVERS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("/adobe.png");
    format!("/covers{cover}")
}
