use anyhow::{bail, Context, Result};

use crate::backend::{BackendConfig, FirebaseConfig, SelfHostedConfig};

const DEFAULT_MAX_RECORDING_BYTES: usize = 512 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub llm_base_url: Option<String>,
    /// Total LLM attempts per request. 1 means a single attempt, no retry.
    pub llm_max_attempts: u32,
    pub backend: BackendConfig,
    /// Whether 500 responses carry the underlying error message.
    pub expose_internal_errors: bool,
    pub max_recording_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            llm_base_url: std::env::var("LLM_BASE_URL").ok(),
            llm_max_attempts: optional_env("LLM_MAX_ATTEMPTS")
                .map(|v| v.parse::<u32>())
                .transpose()
                .context("LLM_MAX_ATTEMPTS must be a positive integer")?
                .unwrap_or(1)
                .max(1),
            backend: backend_from_env()?,
            expose_internal_errors: optional_env("EXPOSE_INTERNAL_ERRORS")
                .map(|v| parse_bool(&v))
                .transpose()
                .context("EXPOSE_INTERNAL_ERRORS must be true or false")?
                .unwrap_or(true),
            max_recording_bytes: optional_env("MAX_RECORDING_BYTES")
                .map(|v| v.parse::<usize>())
                .transpose()
                .context("MAX_RECORDING_BYTES must be a byte count")?
                .unwrap_or(DEFAULT_MAX_RECORDING_BYTES),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn backend_from_env() -> Result<BackendConfig> {
    let kind = std::env::var("BACKEND").unwrap_or_else(|_| "firebase".to_string());
    match kind.as_str() {
        "firebase" => Ok(BackendConfig::Firebase(FirebaseConfig {
            api_key: require_env("FIREBASE_API_KEY")?,
            project_id: require_env("FIREBASE_PROJECT_ID")?,
            storage_bucket: require_env("FIREBASE_STORAGE_BUCKET")?,
            endpoints: Default::default(),
        })),
        "self-hosted" => Ok(BackendConfig::SelfHosted(SelfHostedConfig {
            database_url: require_env("DATABASE_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
        })),
        other => bail!("BACKEND must be 'firebase' or 'self-hosted', got '{other}'"),
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("not a boolean: '{other}'"),
    }
}
