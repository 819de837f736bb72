use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{BackendError, DocumentStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (collection, id)
)
"#;

/// Creates a PostgreSQL connection pool and makes sure the document table exists.
pub async fn create_pool(database_url: &str) -> Result<PgPool, BackendError> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    sqlx::query(SCHEMA).execute(&pool).await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Collections of JSONB documents in one table, keyed by `(collection, id)`.
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn add(
        &self,
        collection: &str,
        document: &Map<String, Value>,
    ) -> Result<String, BackendError> {
        let id = Uuid::new_v4().simple().to_string();
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&id)
            .bind(Value::Object(document.clone()))
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, BackendError> {
        let data: Option<Value> =
            sqlx::query_scalar("SELECT data FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(data)
    }

    async fn merge(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), BackendError> {
        // Shallow merge: top-level keys in `fields` overwrite, all others survive.
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id)
            DO UPDATE SET data = documents.data || EXCLUDED.data, updated_at = now()
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Value::Object(fields.clone()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
