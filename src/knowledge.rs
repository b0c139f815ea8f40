//! Knowledge-base documents
//!
//! Per-child reference documents live only in the vector index; there is no
//! relational mirror, so the metadata record *is* the document record. All
//! three operations go through this one write path and propagate failures
//! honestly instead of reporting success over a silent delete error.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::llm::LanguageModel;
use crate::vector::{Filter, VectorIndex, VectorRecord};

/// Longest content preview persisted in metadata.
const PREVIEW_LIMIT: usize = 200;

const LIST_SCAN_LIMIT: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub child_id: String,
    pub filename: String,
    pub content_preview: String,
    pub uploaded_at: String,
}

#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: String,
    pub metadata: DocumentMetadata,
}

pub struct KnowledgeBase {
    model: Arc<dyn LanguageModel>,
    index: Arc<dyn VectorIndex>,
    namespace: String,
    dimensions: usize,
}

impl KnowledgeBase {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        index: Arc<dyn VectorIndex>,
        namespace: String,
        dimensions: usize,
    ) -> Self {
        Self {
            model,
            index,
            namespace,
            dimensions,
        }
    }

    pub async fn add_document(
        &self,
        child_id: &str,
        filename: &str,
        content: &str,
    ) -> Result<DocumentRecord> {
        let vector = self
            .model
            .embed(content)
            .await
            .context("embedding document content")?;

        let metadata = DocumentMetadata {
            child_id: child_id.to_string(),
            filename: filename.to_string(),
            content_preview: preview(content),
            uploaded_at: Utc::now().to_rfc3339(),
        };
        let id = Uuid::new_v4().to_string();

        let record = VectorRecord {
            id: id.clone(),
            values: vector,
            metadata: serde_json::to_value(&metadata).context("serializing document metadata")?,
        };
        self.index.upsert(&self.namespace, record).await?;

        Ok(DocumentRecord { id, metadata })
    }

    /// Metadata scan (zero query vector) for a child's documents.
    pub async fn list_documents(&self, child_id: &str) -> Result<Vec<DocumentRecord>> {
        let filter = Filter::new().eq("child_id", child_id).build();
        let matches = self
            .index
            .query(&self.namespace, vec![0.0; self.dimensions], LIST_SCAN_LIMIT, filter)
            .await?;

        Ok(matches
            .into_iter()
            .filter_map(|m| match serde_json::from_value(m.metadata) {
                Ok(metadata) => Some(DocumentRecord { id: m.id, metadata }),
                Err(e) => {
                    warn!(record_id = %m.id, error = %e, "skipping malformed document record");
                    None
                }
            })
            .collect())
    }

    /// Delete by id. The vector entry is the only copy of the document, so a
    /// propagated error here means the document still exists.
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        self.index.delete(&self.namespace, id).await
    }
}

fn preview(content: &str) -> String {
    if content.len() <= PREVIEW_LIMIT {
        return content.to_string();
    }
    let mut end = PREVIEW_LIMIT;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    content[..end].to_string()
}
