use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{BackendError, Session};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    id_token: String,
    local_id: String,
}

/// Firebase Identity Toolkit client, used only to obtain an anonymous session.
pub struct FirebaseAuth {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FirebaseAuth {
    pub fn new(client: Client, api_key: &str, base_url: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Creates a fresh anonymous account and returns its session.
    // TODO: refresh the id token through securetoken.googleapis.com before its one-hour expiry.
    pub async fn sign_in_anonymously(&self) -> Result<Session, BackendError> {
        let response = self
            .client
            .post(format!("{}/v1/accounts:signUp", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "returnSecureToken": true }))
            .send()
            .await
            .map_err(|e| BackendError::Auth(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Auth(format!("status {status}: {body}")));
        }

        let body: SignUpResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Auth(e.to_string()))?;

        Ok(Session {
            uid: body.local_id,
            id_token: Some(body.id_token),
        })
    }
}
