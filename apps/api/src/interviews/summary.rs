//! Interview card summary: the values an interview list renders per card.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::models::feedback::FeedbackView;
use crate::models::interview::InterviewRecord;

pub const MAX_TECH_ICONS: usize = 3;
pub const NOT_TAKEN_ASSESSMENT: &str =
    "You haven't taken this interview yet. Take it now to improve your skills!";

const DEVICON_BASE_URL: &str = "https://cdn.jsdelivr.net/gh/devicons/devicon/icons";
const FALLBACK_TECH_ICON: &str = "/tech.svg";

/// Spellings that differ from the devicon directory name.
const TECH_ALIASES: &[(&str, &str)] = &[
    ("js", "javascript"),
    ("ts", "typescript"),
    ("node", "nodejs"),
    ("next", "nextjs"),
    ("vue", "vuejs"),
    ("postgres", "postgresql"),
    ("mongo", "mongodb"),
    ("k8s", "kubernetes"),
    ("golang", "go"),
    ("aws", "amazonwebservices"),
    ("tailwind", "tailwindcss"),
    ("c++", "cplusplus"),
    ("c#", "csharp"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechIcon {
    pub tech: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardAction {
    pub label: &'static str,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewSummary {
    pub id: String,
    pub role: String,
    #[serde(rename = "type")]
    pub interview_type: String,
    pub cover_image: String,
    pub date: String,
    pub score: String,
    pub assessment: String,
    pub tech_icons: Vec<TechIcon>,
    pub action: CardAction,
}

/// Builds the card for `interview`. `feedback` is the caller's own feedback
/// on it, if any.
pub fn summarize(
    id: &str,
    interview: &InterviewRecord,
    feedback: Option<&FeedbackView>,
    now: DateTime<Utc>,
) -> InterviewSummary {
    let created_at = feedback
        .and_then(|f| parse_timestamp(f.created_at.as_deref()))
        .or_else(|| parse_timestamp(Some(&interview.created_at)))
        .unwrap_or(now);

    let score = feedback
        .and_then(|f| display_score(f.total_score.as_ref()))
        .unwrap_or_else(|| "---".to_string());

    let assessment = feedback
        .and_then(|f| f.final_assessment.clone())
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| NOT_TAKEN_ASSESSMENT.to_string());

    let action = match feedback {
        Some(_) => CardAction {
            label: "View Feedback",
            href: format!("/interview/{id}/feedback"),
        },
        None => CardAction {
            label: "Take Interview",
            href: format!("/interview/{id}"),
        },
    };

    InterviewSummary {
        id: id.to_string(),
        role: interview.role.clone(),
        interview_type: normalize_type(&interview.interview_type),
        cover_image: interview.cover_image.clone(),
        date: created_at.format("%b %-d, %Y").to_string(),
        score: format!("{score}/100"),
        assessment,
        tech_icons: tech_icons(&interview.techstack),
        action,
    }
}

/// Any type mentioning "mix" is shown as `Mixed`.
pub fn normalize_type(interview_type: &str) -> String {
    if interview_type.to_lowercase().contains("mix") {
        "Mixed".to_string()
    } else {
        interview_type.to_string()
    }
}

pub fn tech_icons(techstack: &[String]) -> Vec<TechIcon> {
    techstack
        .iter()
        .filter(|t| !t.trim().is_empty())
        .take(MAX_TECH_ICONS)
        .map(|tech| TechIcon {
            tech: tech.trim().to_string(),
            url: tech_icon_url(tech),
        })
        .collect()
}

fn tech_icon_url(tech: &str) -> String {
    let key = tech
        .trim()
        .to_lowercase()
        .trim_end_matches(".js")
        .replace([' ', '.', '-'], "");
    let name = TECH_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, name)| name.to_string())
        .unwrap_or(key);

    if name.is_empty() {
        return FALLBACK_TECH_ICON.to_string();
    }
    format!("{DEVICON_BASE_URL}/{name}/{name}-original.svg")
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw?)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Missing, zero and empty scores are shown as not yet scored.
fn display_score(score: Option<&Value>) -> Option<String> {
    match score? {
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
