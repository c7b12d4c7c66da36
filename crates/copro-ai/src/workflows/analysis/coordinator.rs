//! Orchestrates a full analysis run and guards against duplicate runs.
//!
//! One dossier gets at most one concurrent run. The permit is taken
//! synchronously before the first await of a run, so two tasks racing on the
//! same dossier cannot both get past the guard.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use super::ai::DocumentAnalyzer;
use super::classification::{ClassificationWorker, RetryPolicy};
use super::domain::{AnalysisContext, Document, DossierId, DossierStatus};
use super::dossier::DossierUpdate;
use super::extraction::{ExtractionError, ExtractionOrchestrator};
use super::flatten::{append_alerts, flatten_extraction};
use super::progress::{AnalysisStatusView, ProgressSink, ProgressSnapshot};
use super::reconcile::{reconcile_charges, ReconciliationInput};
use super::repository::{ContentStore, DossierRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// Logical name under which the raw extraction payload is archived.
pub const RAW_EXTRACTION_ARTIFACT: &str = "extraction-brute.json";

#[derive(Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed(String),
    AlreadyRunning,
}

/// Tracks which dossiers currently have a run in flight.
#[derive(Default)]
pub struct RunGuard {
    running: Mutex<HashSet<DossierId>>,
}

impl RunGuard {
    pub fn try_acquire(self: &Arc<Self>, dossier_id: &DossierId) -> Option<RunPermit> {
        let mut running = self.running.lock().expect("run guard mutex poisoned");
        if running.insert(dossier_id.clone()) {
            Some(RunPermit {
                guard: Arc::clone(self),
                dossier_id: dossier_id.clone(),
            })
        } else {
            None
        }
    }

    pub fn is_running(&self, dossier_id: &DossierId) -> bool {
        self.running
            .lock()
            .expect("run guard mutex poisoned")
            .contains(dossier_id)
    }
}

/// Releases the dossier's slot on drop, whichever way the run ends.
pub struct RunPermit {
    guard: Arc<RunGuard>,
    dossier_id: DossierId,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.guard
            .running
            .lock()
            .expect("run guard mutex poisoned")
            .remove(&self.dossier_id);
    }
}

pub struct AnalysisCoordinator<R, C, A, P> {
    repository: Arc<R>,
    content_store: Arc<C>,
    analyzer: Arc<A>,
    progress: Arc<P>,
    guard: Arc<RunGuard>,
    classifier: Arc<ClassificationWorker<R, C, A>>,
    extractor: ExtractionOrchestrator<C, A>,
    upload_stagger: Duration,
}

impl<R, C, A, P> AnalysisCoordinator<R, C, A, P>
where
    R: DossierRepository + 'static,
    C: ContentStore + 'static,
    A: DocumentAnalyzer + 'static,
    P: ProgressSink + 'static,
{
    pub fn new(
        repository: Arc<R>,
        content_store: Arc<C>,
        analyzer: Arc<A>,
        progress: Arc<P>,
    ) -> Self {
        Self {
            classifier: Arc::new(ClassificationWorker::new(
                Arc::clone(&repository),
                Arc::clone(&content_store),
                Arc::clone(&analyzer),
            )),
            extractor: ExtractionOrchestrator::new(
                Arc::clone(&content_store),
                Arc::clone(&analyzer),
            ),
            repository,
            content_store,
            analyzer,
            progress,
            guard: Arc::new(RunGuard::default()),
            upload_stagger: Duration::from_millis(1500),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.classifier = Arc::new(
            ClassificationWorker::new(
                Arc::clone(&self.repository),
                Arc::clone(&self.content_store),
                Arc::clone(&self.analyzer),
            )
            .with_retry_policy(retry_policy),
        );
        self
    }

    pub fn with_upload_stagger(mut self, upload_stagger: Duration) -> Self {
        self.upload_stagger = upload_stagger;
        self
    }

    /// Runs the whole pipeline for a dossier. Returns
    /// [`RunOutcome::AlreadyRunning`] without touching anything when a run
    /// is already in flight.
    pub async fn start_analysis(
        &self,
        dossier_id: &DossierId,
        context: &AnalysisContext,
    ) -> RunOutcome {
        let Some(_permit) = self.guard.try_acquire(dossier_id) else {
            tracing::info!(%dossier_id, "analysis already in flight, request ignored");
            return RunOutcome::AlreadyRunning;
        };

        match self.run_pipeline(dossier_id, context).await {
            Ok(()) => RunOutcome::Completed,
            Err(err) => {
                tracing::error!(%dossier_id, %err, "analysis run failed");
                self.progress
                    .update(dossier_id, ProgressSnapshot::error(&err.to_string()));
                if let Err(status_err) = self
                    .repository
                    .set_status(dossier_id, DossierStatus::Error)
                    .await
                {
                    tracing::warn!(%dossier_id, %status_err, "error status not persisted");
                }
                RunOutcome::Failed(err.to_string())
            }
        }
    }

    async fn run_pipeline(
        &self,
        dossier_id: &DossierId,
        context: &AnalysisContext,
    ) -> Result<(), AnalysisError> {
        self.repository
            .set_status(dossier_id, DossierStatus::Analyzing)
            .await?;

        let documents = self.repository.documents(dossier_id).await?;
        let unclassified: Vec<&Document> =
            documents.iter().filter(|doc| !doc.is_classified()).collect();
        let total = unclassified.len() as u32;

        if unclassified.is_empty() {
            // Everything was classified at upload time; report the phase as
            // already finished so the client sees a full bar.
            let count = documents.len() as u32;
            self.progress
                .update(dossier_id, ProgressSnapshot::classification(count, count));
        } else {
            for (index, document) in unclassified.iter().enumerate() {
                self.progress.update(
                    dossier_id,
                    ProgressSnapshot::classification(index as u32, total),
                );
                if let Err(err) = self
                    .classifier
                    .classify_document(dossier_id, document, context)
                    .await
                {
                    // One unreadable document must not sink the run.
                    tracing::warn!(
                        %dossier_id,
                        filename = %document.original_filename,
                        %err,
                        "document skipped after classification failure"
                    );
                    self.progress.document_failed(
                        dossier_id,
                        &document.original_filename,
                        &err.to_string(),
                    );
                }
            }
            self.progress
                .update(dossier_id, ProgressSnapshot::classification(total, total));
        }

        self.progress
            .update(dossier_id, ProgressSnapshot::extraction());

        let documents = self.repository.documents(dossier_id).await?;
        let outcome = self.extractor.extract(dossier_id, &documents, context).await?;

        let input = ReconciliationInput::from_extraction(&outcome.extraction);
        let reconciliation = reconcile_charges(&input);

        let mut raw = outcome.raw;
        append_alerts(&mut raw, &reconciliation.alerts);

        // Archive the analyzer's payload next to the documents; losing the
        // snapshot must not fail a run that already produced valid fields.
        if let Ok(snapshot) = serde_json::to_vec_pretty(&raw) {
            if let Err(err) = self
                .content_store
                .store_artifact(dossier_id, RAW_EXTRACTION_ARTIFACT, snapshot)
                .await
            {
                tracing::warn!(%dossier_id, %err, "raw extraction snapshot not archived");
            }
        }

        let fields = flatten_extraction(&outcome.extraction, context, &reconciliation);
        self.repository
            .merge_update(
                dossier_id,
                DossierUpdate {
                    status: Some(DossierStatus::PendingValidation),
                    raw_extraction: Some(raw),
                    fields,
                },
            )
            .await?;

        self.progress.update(dossier_id, ProgressSnapshot::done());
        tracing::info!(%dossier_id, "analysis run completed");
        Ok(())
    }

    pub fn status(&self, dossier_id: &DossierId) -> AnalysisStatusView {
        AnalysisStatusView {
            is_running: self.guard.is_running(dossier_id),
            progress: self
                .progress
                .latest(dossier_id)
                .unwrap_or_else(ProgressSnapshot::idle),
        }
    }

    pub fn is_running(&self, dossier_id: &DossierId) -> bool {
        self.guard.is_running(dossier_id)
    }

    /// How many documents the dossier holds; lets callers refuse to start a
    /// run on an empty dossier.
    pub async fn document_count(&self, dossier_id: &DossierId) -> Result<usize, RepositoryError> {
        Ok(self.repository.documents(dossier_id).await?.len())
    }

    /// Classifies freshly uploaded documents in the background, staggering
    /// the starts so a burst of uploads does not trip the analyzer's rate
    /// limit. Failures are logged and reported, never returned.
    pub fn classify_uploads(
        self: &Arc<Self>,
        dossier_id: DossierId,
        documents: Vec<Document>,
        context: AnalysisContext,
    ) -> Vec<JoinHandle<()>> {
        documents
            .into_iter()
            .enumerate()
            .map(|(index, document)| {
                let delay = self.upload_stagger * index as u32;
                let classifier = Arc::clone(&self.classifier);
                let progress = Arc::clone(&self.progress);
                let dossier_id = dossier_id.clone();
                let context = context.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(err) = classifier
                        .classify_document(&dossier_id, &document, &context)
                        .await
                    {
                        tracing::warn!(
                            %dossier_id,
                            filename = %document.original_filename,
                            %err,
                            "upload classification failed"
                        );
                        progress.document_failed(
                            &dossier_id,
                            &document.original_filename,
                            &err.to_string(),
                        );
                    }
                })
            })
            .collect()
    }
}
