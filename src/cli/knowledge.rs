//! Knowledge-base document commands

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::service::HarborService;

pub async fn add(
    service: &HarborService,
    family_id: String,
    child_id: String,
    file: PathBuf,
) -> Result<()> {
    let content = std::fs::read_to_string(&file)
        .with_context(|| format!("reading {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "document.txt".to_string());

    let record = service
        .add_document(&family_id, &child_id, &filename, &content)
        .await?;
    println!("Stored document {} ({})", record.metadata.filename, record.id);
    Ok(())
}

pub async fn list(service: &HarborService, family_id: String, child_id: String) -> Result<()> {
    let documents = service.list_documents(&family_id, &child_id).await?;

    if documents.is_empty() {
        println!("No documents stored for this child.");
        return Ok(());
    }

    for doc in documents {
        println!(
            "{}  {}  (uploaded {})",
            doc.id, doc.metadata.filename, doc.metadata.uploaded_at
        );
    }
    Ok(())
}

pub async fn delete(
    service: &HarborService,
    family_id: String,
    child_id: String,
    document_id: String,
) -> Result<()> {
    service
        .delete_document(&family_id, &child_id, &document_id)
        .await?;
    println!("Deleted document {document_id}");
    Ok(())
}
