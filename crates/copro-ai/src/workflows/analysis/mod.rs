//! Dossier analysis pipeline for co-ownership sale disclosures.
//!
//! Uploaded paperwork is classified document by document, then sent as one
//! batch through structured extraction. The extracted figures are reconciled
//! against the tantièmes arithmetic before everything is flattened onto the
//! dossier for human validation.

pub mod ai;
pub(crate) mod classification;
pub(crate) mod coerce;
pub mod coordinator;
pub mod domain;
pub mod dossier;
pub(crate) mod extraction;
pub(crate) mod flatten;
pub mod progress;
pub(crate) mod reconcile;
pub mod repository;
pub mod router;
pub mod schema;

#[cfg(test)]
mod tests;

pub use ai::{AnalyzerError, Classification, DocumentAnalyzer, ExtractionDocument};
pub use classification::{classify_with_retry, ClassificationWorker, RetryPolicy};
pub use coordinator::{AnalysisCoordinator, AnalysisError, RunGuard, RunOutcome};
pub use domain::{
    AnalysisContext, Document, DocumentCategory, DocumentId, DossierId, DossierStatus, StorageRef,
};
pub use dossier::{ChargeDiscrepancy, Dossier, DossierFields, DossierUpdate};
pub use extraction::{ExtractionError, ExtractionOrchestrator, ExtractionOutcome};
pub use progress::{AnalysisPhase, AnalysisStatusView, ProgressSink, ProgressSnapshot};
pub use reconcile::{reconcile_charges, Reconciliation, ReconciliationInput};
pub use repository::{
    ClassificationUpdate, ContentStore, ContentStoreError, DossierRepository, RepositoryError,
};
pub use router::analysis_router;
pub use schema::StructuredExtraction;
