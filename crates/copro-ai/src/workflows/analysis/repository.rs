//! Persistence seams for the analysis pipeline.
//!
//! The pipeline never talks to a concrete database or blob store; it goes
//! through these traits so services can wire in whatever backend they run
//! against (the API service ships in-memory implementations).

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::domain::{Document, DocumentCategory, DocumentId, DossierId, DossierStatus, StorageRef};
use super::dossier::{Dossier, DossierUpdate};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("dossier not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Fields written back after a document is classified.
#[derive(Debug, Clone)]
pub struct ClassificationUpdate {
    pub category: DocumentCategory,
    pub confidence: f64,
    pub raw_payload: Value,
    pub display_filename: String,
    pub sort_rank: u32,
    pub combined_diagnostics: bool,
}

#[async_trait]
pub trait DossierRepository: Send + Sync {
    async fn fetch(&self, dossier_id: &DossierId) -> Result<Dossier, RepositoryError>;

    async fn documents(&self, dossier_id: &DossierId) -> Result<Vec<Document>, RepositoryError>;

    async fn set_status(
        &self,
        dossier_id: &DossierId,
        status: DossierStatus,
    ) -> Result<(), RepositoryError>;

    /// Applies a merge update; `None` fields in the update leave stored
    /// values untouched.
    async fn merge_update(
        &self,
        dossier_id: &DossierId,
        update: DossierUpdate,
    ) -> Result<(), RepositoryError>;

    async fn save_classification(
        &self,
        dossier_id: &DossierId,
        document_id: &DocumentId,
        update: ClassificationUpdate,
    ) -> Result<(), RepositoryError>;

    /// Records a DPE certificate number spotted during classification.
    async fn record_energy_certificate(
        &self,
        dossier_id: &DossierId,
        certificate_id: &str,
    ) -> Result<(), RepositoryError>;
}

#[derive(Debug, Error)]
pub enum ContentStoreError {
    #[error("content not found: {0}")]
    NotFound(String),
    #[error("content store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn fetch(&self, storage_ref: &StorageRef) -> Result<Vec<u8>, ContentStoreError>;

    /// Persists a pipeline artifact (raw extraction snapshots and the like)
    /// alongside the dossier's documents.
    async fn store_artifact(
        &self,
        dossier_id: &DossierId,
        name: &str,
        content: Vec<u8>,
    ) -> Result<StorageRef, ContentStoreError>;
}
