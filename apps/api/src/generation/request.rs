//! Request validation and tech-stack normalisation for `POST /generate`.
//!
//! Fields arrive loosely typed (amount may be a number or a string, the tech
//! stack a string or a list), so the raw body keeps them as JSON values and
//! [`GenerateRequest::validate`] turns them into a [`QuestionRequest`].

use serde::Deserialize;
use serde_json::Value;

use crate::errors::AppError;

pub const MISSING_PARAMETERS: &str = "Missing required parameters";

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(rename = "type")]
    pub interview_type: Option<Value>,
    pub role: Option<Value>,
    pub level: Option<Value>,
    pub techstack: Option<Value>,
    pub amount: Option<Value>,
    pub userid: Option<Value>,
}

/// A validated generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionRequest {
    pub interview_type: String,
    pub role: String,
    pub level: String,
    pub techstack: Vec<String>,
    pub amount: String,
    pub user_id: String,
}

impl GenerateRequest {
    /// Every one of `type`, `role`, `level`, `userid`, `amount` must be
    /// present and truthy. The tech stack is optional.
    pub fn validate(&self) -> Result<QuestionRequest, AppError> {
        let required = [
            &self.interview_type,
            &self.role,
            &self.level,
            &self.userid,
            &self.amount,
        ];
        if !required.iter().all(|v| v.as_ref().is_some_and(is_truthy)) {
            return Err(AppError::Validation(MISSING_PARAMETERS.to_string()));
        }

        Ok(QuestionRequest {
            interview_type: text_of(&self.interview_type),
            role: text_of(&self.role),
            level: text_of(&self.level),
            techstack: normalize_techstack(self.techstack.as_ref()),
            amount: text_of(&self.amount),
            user_id: text_of(&self.userid),
        })
    }
}

/// String → split on `,`; list → as given; anything else → empty.
pub fn normalize_techstack(techstack: Option<&Value>) -> Vec<String> {
    match techstack {
        Some(Value::String(s)) => s.split(',').map(String::from).collect(),
        Some(Value::Array(items)) => items.iter().map(value_text).collect(),
        _ => Vec::new(),
    }
}

/// Truthiness as the client side understands it: empty strings, zero,
/// `false` and `null` are missing values.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Strings as-is, everything else as its JSON text. Whole floats drop the
/// fraction, so `5.0` reads `5`.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) if n.is_f64() => n.as_f64().map(|f| f.to_string()).unwrap_or_default(),
        other => other.to_string(),
    }
}

fn text_of(value: &Option<Value>) -> String {
    value.as_ref().map(value_text).unwrap_or_default()
}
