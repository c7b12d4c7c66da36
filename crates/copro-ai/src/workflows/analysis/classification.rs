//! Per-document classification: analyzer call with rate-limit retry, then
//! category, rank, and display filename written back to the repository.

use std::sync::Arc;
use std::time::Duration;

use chrono::Datelike;
use rand::Rng;
use thiserror::Error;

use super::ai::{AnalyzerError, Classification, DocumentAnalyzer};
use super::coerce::to_iso_date;
use super::domain::{AnalysisContext, Document, DocumentCategory, DossierId};
use super::repository::{
    ClassificationUpdate, ContentStore, ContentStoreError, DossierRepository, RepositoryError,
};

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error(transparent)]
    Content(#[from] ContentStoreError),
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Retry schedule for rate-limited analyzer calls. Each floor is the minimum
/// wait before the matching retry; a random jitter below `jitter_ceiling` is
/// added on top so parallel workers drift apart.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub backoff_floors: Vec<Duration>,
    pub jitter_ceiling: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff_floors: vec![Duration::from_secs(5), Duration::from_secs(15)],
            jitter_ceiling: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry_index` (zero-based), or `None` when
    /// the schedule is exhausted.
    pub fn delay_before_retry(&self, retry_index: usize) -> Option<Duration> {
        let floor = *self.backoff_floors.get(retry_index)?;
        let jitter = if self.jitter_ceiling.is_zero() {
            Duration::ZERO
        } else {
            Duration::from_millis(
                rand::thread_rng().gen_range(0..self.jitter_ceiling.as_millis() as u64),
            )
        };
        Some(floor + jitter)
    }

    pub fn max_retries(&self) -> usize {
        self.backoff_floors.len()
    }
}

/// Calls the analyzer, sleeping through the retry schedule on rate limits.
/// Non-retryable errors surface immediately.
pub async fn classify_with_retry<A: DocumentAnalyzer + ?Sized>(
    analyzer: &A,
    content: &[u8],
    filename: &str,
    dossier_id: &DossierId,
    policy: &RetryPolicy,
) -> Result<Classification, AnalyzerError> {
    let mut retry_index = 0;
    loop {
        match analyzer.classify(content, filename, dossier_id).await {
            Ok(classification) => return Ok(classification),
            Err(err) if err.is_retryable() => match policy.delay_before_retry(retry_index) {
                Some(delay) => {
                    tracing::warn!(
                        %dossier_id,
                        filename,
                        retry = retry_index + 1,
                        delay_ms = delay.as_millis() as u64,
                        "analyzer rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    retry_index += 1;
                }
                None => return Err(err),
            },
            Err(err) => return Err(err),
        }
    }
}

pub struct ClassificationWorker<R, C, A> {
    repository: Arc<R>,
    content_store: Arc<C>,
    analyzer: Arc<A>,
    retry_policy: RetryPolicy,
}

impl<R, C, A> ClassificationWorker<R, C, A>
where
    R: DossierRepository,
    C: ContentStore,
    A: DocumentAnalyzer,
{
    pub fn new(repository: Arc<R>, content_store: Arc<C>, analyzer: Arc<A>) -> Self {
        Self {
            repository,
            content_store,
            analyzer,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Classifies one document end to end and persists the result.
    pub async fn classify_document(
        &self,
        dossier_id: &DossierId,
        document: &Document,
        context: &AnalysisContext,
    ) -> Result<DocumentCategory, ClassificationError> {
        let content = self.content_store.fetch(&document.storage_ref).await?;
        let classification = classify_with_retry(
            self.analyzer.as_ref(),
            &content,
            &document.original_filename,
            dossier_id,
            &self.retry_policy,
        )
        .await?;

        // A seller-provided hint wins over the model's category.
        let category = context
            .category_hints
            .get(&document.original_filename)
            .copied()
            .unwrap_or(classification.category);

        let combined = classification.covered_diagnostics.len() > 1;
        let sort_rank = if combined {
            DocumentCategory::COMBINED_DIAGNOSTICS_RANK
        } else {
            category.sort_rank()
        };
        let display_filename =
            display_filename(category, combined, sort_rank, classification.document_date.as_deref());

        if let Some(certificate_id) = classification
            .detected_energy_certificate_id
            .as_deref()
            .filter(|id| plausible_certificate_id(id))
        {
            // Secondary write; a failure here must not sink the document.
            if let Err(err) = self
                .repository
                .record_energy_certificate(dossier_id, certificate_id)
                .await
            {
                tracing::warn!(%dossier_id, %err, "energy certificate not recorded");
            }
        }

        self.repository
            .save_classification(
                dossier_id,
                &document.id,
                ClassificationUpdate {
                    category,
                    confidence: classification.confidence,
                    raw_payload: classification.raw_payload,
                    display_filename,
                    sort_rank,
                    combined_diagnostics: combined,
                },
            )
            .await?;

        tracing::info!(
            %dossier_id,
            document = %document.id,
            category = category.label(),
            "document classified"
        );
        Ok(category)
    }
}

fn display_filename(
    category: DocumentCategory,
    combined: bool,
    sort_rank: u32,
    document_date: Option<&str>,
) -> String {
    let slug = if combined {
        "diagnostics-groupes"
    } else {
        category.slug()
    };
    let year = document_date
        .and_then(|date| to_iso_date(&serde_json::Value::String(date.to_string())))
        .and_then(|iso| iso.get(..4).map(str::to_string))
        .unwrap_or_else(|| chrono::Utc::now().year().to_string());
    format!("{sort_rank:02}-{slug}-{year}.pdf")
}

/// DPE numbers are at least 10 alphanumeric characters; anything shorter or
/// punctuated is model noise.
fn plausible_certificate_id(id: &str) -> bool {
    id.len() >= 10 && id.chars().all(|c| c.is_ascii_alphanumeric())
}
