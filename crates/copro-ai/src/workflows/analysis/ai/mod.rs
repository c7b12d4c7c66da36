//! Boundary to the hosted generative-AI document service.
//!
//! The pipeline only ever talks to [`DocumentAnalyzer`]; the production
//! implementation is [`gemini::GeminiAnalyzer`], and [`mock::MockAnalyzer`]
//! backs tests and the CLI demo. Retryability is a structured property of
//! [`AnalyzerError`]; callers must never inspect error messages.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use serde_json::Value;

use super::domain::{AnalysisContext, DocumentCategory, DossierId};

/// Result of classifying one document.
#[derive(Debug, Clone)]
pub struct Classification {
    pub category: DocumentCategory,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f64,
    /// The service's raw structured output, persisted for audit.
    pub raw_payload: Value,
    /// Individual diagnostics the file covers; more than one means the file
    /// is a combined diagnostic bundle.
    pub covered_diagnostics: Vec<DocumentCategory>,
    /// Candidate energy-certificate identifier, if the model spotted one.
    pub detected_energy_certificate_id: Option<String>,
    /// Document date as the model read it, in whatever format it found.
    pub document_date: Option<String>,
}

/// One document attached to the batched extraction request.
#[derive(Debug, Clone)]
pub struct ExtractionDocument {
    pub filename: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}

/// Failures from the AI collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AnalyzerError {
    #[error("AI service rate limited the request")]
    RateLimited,
    #[error("AI service rejected the request: {0}")]
    Api(String),
    #[error("network failure reaching the AI service: {0}")]
    Network(String),
    #[error("AI response could not be interpreted: {0}")]
    Malformed(String),
    #[error("AI collaborator not configured: {0}")]
    NotConfigured(String),
}

impl AnalyzerError {
    /// Only rate limiting is worth retrying; everything else is terminal for
    /// the current call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

/// Contract the pipeline assumes of the hosted document service.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    /// Classify a single document into the disclosure taxonomy.
    async fn classify(
        &self,
        content: &[u8],
        filename: &str,
        dossier_id: &DossierId,
    ) -> Result<Classification, AnalyzerError>;

    /// Run one extraction spanning all documents of a dossier. The response
    /// shape is returned raw; the orchestrator normalizes it.
    async fn extract(
        &self,
        documents: &[ExtractionDocument],
        dossier_id: &DossierId,
        context: &AnalysisContext,
    ) -> Result<Value, AnalyzerError>;
}
