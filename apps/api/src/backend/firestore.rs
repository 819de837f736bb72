//! Firestore REST client.
//!
//! Documents travel as typed values (`{"stringValue": ...}` etc.); this module
//! converts between those and plain `serde_json::Value`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Number, Value};
use tracing::debug;

use super::{BackendError, DocumentStore};

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

pub struct Firestore {
    client: Client,
    documents_url: String,
    id_token: String,
}

impl Firestore {
    pub fn new(client: Client, base_url: &str, project_id: &str, id_token: String) -> Self {
        Self {
            client,
            documents_url: format!(
                "{}/v1/projects/{}/databases/(default)/documents",
                base_url.trim_end_matches('/'),
                project_id
            ),
            id_token,
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.id_token)
    }
}

#[async_trait]
impl DocumentStore for Firestore {
    async fn add(
        &self,
        collection: &str,
        document: &Map<String, Value>,
    ) -> Result<String, BackendError> {
        let url = format!("{}/{}", self.documents_url, collection);
        let response = self
            .authorized(self.client.post(&url))
            .json(&json!({ "fields": encode_fields(document) }))
            .send()
            .await?;
        let created: FirestoreDocument = check(response).await?.json().await?;

        let id = created
            .name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        debug!("Created {collection}/{id}");
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, BackendError> {
        let url = format!("{}/{}/{}", self.documents_url, collection, id);
        let response = self.authorized(self.client.get(&url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let doc: FirestoreDocument = check(response).await?.json().await?;
        Ok(Some(Value::Object(decode_fields(&doc.fields)?)))
    }

    async fn merge(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), BackendError> {
        let url = format!("{}/{}/{}", self.documents_url, collection, id);
        let mask: Vec<(&str, &str)> = fields
            .keys()
            .map(|k| ("updateMask.fieldPaths", k.as_str()))
            .collect();
        let response = self
            .authorized(self.client.patch(&url))
            .query(&mask)
            .json(&json!({ "fields": encode_fields(fields) }))
            .send()
            .await?;
        check(response).await?;
        debug!("Merged {} field(s) into {collection}/{id}", fields.len());
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or(body);
    Err(BackendError::Api {
        status: status.as_u16(),
        message,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Typed value encoding
// ────────────────────────────────────────────────────────────────────────────

pub fn encode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

pub fn decode_fields(fields: &Map<String, Value>) -> Result<Map<String, Value>, BackendError> {
    fields
        .iter()
        .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
        .collect()
}

pub fn decode_value(value: &Value) -> Result<Value, BackendError> {
    let (kind, inner) = value
        .as_object()
        .and_then(|m| m.iter().next())
        .ok_or_else(|| BackendError::Decode(format!("not a typed value: {value}")))?;

    Ok(match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().unwrap_or_default()),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                other => other.as_i64(),
            };
            parsed
                .map(|i| Value::Number(i.into()))
                .ok_or_else(|| BackendError::Decode(format!("bad integer: {inner}")))?
        }
        "doubleValue" => inner
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect::<Result<Vec<_>, _>>())
                .transpose()?
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .transpose()?
                .unwrap_or_default(),
        ),
        other => return Err(BackendError::Decode(format!("unsupported value type {other}"))),
    })
}
