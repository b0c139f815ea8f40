//! Vector index adapter
//!
//! Pinecone-style REST client: upsert/query/delete with exact-match metadata
//! filters. Conversation memories and knowledge-base documents live in
//! separate namespaces of the same index. Metadata crosses this boundary as
//! raw JSON; the memory and knowledge modules deserialize it into their typed
//! records immediately after each call and reject malformed payloads there.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::VectorConfig;

#[derive(Debug, Clone, Serialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub metadata: Value,
}

/// Builder for exact-match metadata filters (`$eq` / `$gte` / `$lte`).
#[derive(Debug, Default)]
pub struct Filter {
    clauses: Map<String, Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.clauses.insert(key.to_string(), json!({ "$eq": value.into() }));
        self
    }

    pub fn gte(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.clauses.insert(key.to_string(), json!({ "$gte": value.into() }));
        self
    }

    pub fn build(self) -> Value {
        Value::Object(self.clauses)
    }
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, namespace: &str, record: VectorRecord) -> Result<()>;

    async fn query(
        &self,
        namespace: &str,
        vector: Vec<f32>,
        top_k: usize,
        filter: Value,
    ) -> Result<Vec<VectorMatch>>;

    async fn delete(&self, namespace: &str, id: &str) -> Result<()>;
}

// ============================================
// WIRE TYPES
// ============================================

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<&'a VectorRecord>,
    namespace: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: Vec<f32>,
    top_k: usize,
    filter: Value,
    include_metadata: bool,
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<VectorMatch>,
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    ids: Vec<&'a str>,
    namespace: &'a str,
}

// ============================================
// CLIENT
// ============================================

pub struct PineconeIndex {
    http: Client,
    base_url: String,
    api_key: String,
}

impl PineconeIndex {
    pub fn new(config: &VectorConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("missing API key in ${}", config.api_key_env))?;

        Ok(Self {
            http: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    #[cfg(test)]
    pub fn with_base_url(base_url: &str, api_key: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, namespace: &str, record: VectorRecord) -> Result<()> {
        let request = UpsertRequest {
            vectors: vec![&record],
            namespace,
        };

        self.http
            .post(self.url("/vectors/upsert"))
            .header("Api-Key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("vector upsert request failed")?
            .error_for_status()
            .context("vector upsert returned error status")?;
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: Vec<f32>,
        top_k: usize,
        filter: Value,
    ) -> Result<Vec<VectorMatch>> {
        let request = QueryRequest {
            vector,
            top_k,
            filter,
            include_metadata: true,
            namespace,
        };

        let response = self
            .http
            .post(self.url("/query"))
            .header("Api-Key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("vector query request failed")?
            .error_for_status()
            .context("vector query returned error status")?;

        let body: QueryResponse = response
            .json()
            .await
            .context("malformed vector query response")?;
        Ok(body.matches)
    }

    async fn delete(&self, namespace: &str, id: &str) -> Result<()> {
        let request = DeleteRequest {
            ids: vec![id],
            namespace,
        };

        self.http
            .post(self.url("/vectors/delete"))
            .header("Api-Key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("vector delete request failed")?
            .error_for_status()
            .context("vector delete returned error status")?;
        Ok(())
    }
}
