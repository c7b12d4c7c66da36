//! Batched extraction: all classified documents go to the analyzer in one
//! call, and the response is normalized into a [`StructuredExtraction`].

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use super::ai::{AnalyzerError, DocumentAnalyzer, ExtractionDocument};
use super::domain::{AnalysisContext, Document, DossierId};
use super::repository::{ContentStore, ContentStoreError};
use super::schema::StructuredExtraction;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
    #[error(transparent)]
    Content(#[from] ContentStoreError),
    #[error("empty extraction")]
    Empty,
    #[error("extraction failed: {0}")]
    Malformed(String),
}

#[derive(Debug)]
pub struct ExtractionOutcome {
    pub extraction: StructuredExtraction,
    pub raw: Value,
    pub duplicates_removed: usize,
}

pub struct ExtractionOrchestrator<C, A> {
    content_store: Arc<C>,
    analyzer: Arc<A>,
}

impl<C, A> ExtractionOrchestrator<C, A>
where
    C: ContentStore,
    A: DocumentAnalyzer,
{
    pub fn new(content_store: Arc<C>, analyzer: Arc<A>) -> Self {
        Self {
            content_store,
            analyzer,
        }
    }

    pub async fn extract(
        &self,
        dossier_id: &DossierId,
        documents: &[Document],
        context: &AnalysisContext,
    ) -> Result<ExtractionOutcome, ExtractionError> {
        let (unique, duplicates_removed) = dedup_documents(documents);
        if duplicates_removed > 0 {
            tracing::info!(%dossier_id, duplicates_removed, "duplicate uploads skipped");
        }

        let mut batch = Vec::with_capacity(unique.len());
        for document in &unique {
            let content = self.content_store.fetch(&document.storage_ref).await?;
            batch.push(ExtractionDocument {
                filename: document.original_filename.clone(),
                mime_type: document.mime_type.clone(),
                content,
            });
        }

        let response = self.analyzer.extract(&batch, dossier_id, context).await?;
        let raw = normalize_response(response)?;
        let extraction: StructuredExtraction = serde_json::from_value(raw.clone())
            .map_err(|err| ExtractionError::Malformed(err.to_string()))?;

        Ok(ExtractionOutcome {
            extraction,
            raw,
            duplicates_removed,
        })
    }
}

/// Keeps the first upload for each original filename, preserving order.
pub fn dedup_documents(documents: &[Document]) -> (Vec<Document>, usize) {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(documents.len());
    for document in documents {
        if seen.insert(document.original_filename.clone()) {
            unique.push(document.clone());
        }
    }
    let removed = documents.len() - unique.len();
    (unique, removed)
}

/// Models sometimes wrap the extraction object in a one-element array.
/// Arrays collapse to their first element; anything that is not an object
/// after that is a failure, and an object with no fields counts as empty.
pub fn normalize_response(response: Value) -> Result<Value, ExtractionError> {
    let candidate = match response {
        Value::Array(items) => items.into_iter().next().ok_or(ExtractionError::Empty)?,
        other => other,
    };
    match candidate {
        Value::Object(ref map) if map.is_empty() => Err(ExtractionError::Empty),
        Value::Object(_) => Ok(candidate),
        other => Err(ExtractionError::Malformed(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}
