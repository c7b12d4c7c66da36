use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use serde_json::{json, Value};

use crate::workflows::analysis::ai::mock::MockAnalyzer;
use crate::workflows::analysis::coordinator::AnalysisCoordinator;
use crate::workflows::analysis::domain::{
    AnalysisContext, Document, DocumentId, DossierId, DossierStatus, StorageRef,
};
use crate::workflows::analysis::dossier::{Dossier, DossierUpdate};
use crate::workflows::analysis::progress::{ProgressSink, ProgressSnapshot};
use crate::workflows::analysis::repository::{
    ClassificationUpdate, ContentStore, ContentStoreError, DossierRepository, RepositoryError,
};

pub(super) fn dossier_id() -> DossierId {
    DossierId("dossier-75011-042".to_string())
}

pub(super) fn context() -> AnalysisContext {
    AnalysisContext {
        lot_number: Some("42".to_string()),
        property_address: Some("12 rue des Lilas, 75011 Paris".to_string()),
        ..Default::default()
    }
}

pub(super) fn document(id: &str, filename: &str) -> Document {
    Document::new(
        DocumentId(id.to_string()),
        filename.to_string(),
        StorageRef(format!("blob/{id}")),
        2048,
        "application/pdf".to_string(),
    )
}

/// A complete, well-formed extraction the mock analyzer can return.
pub(super) fn extraction_payload() -> Value {
    json!({
        "property": {
            "lot_number": 42,
            "property_address": "12 rue des Lilas, 75011 Paris",
            "carrez_area_m2": "64,5"
        },
        "co_ownership": {
            "syndicate_name": "SDC 12 rue des Lilas",
            "lot_share": 150,
            "total_share": "10 000"
        },
        "financial": {
            "annual_budget": "120 000 €",
            "recurring_charge_lot": 1500
        },
        "diagnostics": {
            "energy_class": "C",
            "dpe_date": "15/03/2024"
        },
        "meta": {
            "missing_data": [],
            "alerts": []
        }
    })
}

#[derive(Default)]
pub(super) struct MemoryRepository {
    dossiers: Mutex<HashMap<DossierId, Dossier>>,
    documents: Mutex<HashMap<DossierId, Vec<Document>>>,
    certificates: Mutex<Vec<(DossierId, String)>>,
}

impl MemoryRepository {
    pub(super) fn seed(&self, dossier_id: &DossierId, documents: Vec<Document>) {
        self.dossiers
            .lock()
            .expect("repository mutex poisoned")
            .insert(dossier_id.clone(), Dossier::new(dossier_id.clone()));
        self.documents
            .lock()
            .expect("repository mutex poisoned")
            .insert(dossier_id.clone(), documents);
    }

    pub(super) fn dossier(&self, dossier_id: &DossierId) -> Dossier {
        self.dossiers
            .lock()
            .expect("repository mutex poisoned")
            .get(dossier_id)
            .cloned()
            .expect("dossier seeded")
    }

    pub(super) fn stored_documents(&self, dossier_id: &DossierId) -> Vec<Document> {
        self.documents
            .lock()
            .expect("repository mutex poisoned")
            .get(dossier_id)
            .cloned()
            .unwrap_or_default()
    }

    pub(super) fn certificates(&self) -> Vec<(DossierId, String)> {
        self.certificates
            .lock()
            .expect("repository mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl DossierRepository for MemoryRepository {
    async fn fetch(&self, dossier_id: &DossierId) -> Result<Dossier, RepositoryError> {
        self.dossiers
            .lock()
            .expect("repository mutex poisoned")
            .get(dossier_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn documents(&self, dossier_id: &DossierId) -> Result<Vec<Document>, RepositoryError> {
        self.documents
            .lock()
            .expect("repository mutex poisoned")
            .get(dossier_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn set_status(
        &self,
        dossier_id: &DossierId,
        status: DossierStatus,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.dossiers.lock().expect("repository mutex poisoned");
        let dossier = guard.get_mut(dossier_id).ok_or(RepositoryError::NotFound)?;
        dossier.status = status;
        Ok(())
    }

    async fn merge_update(
        &self,
        dossier_id: &DossierId,
        update: DossierUpdate,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.dossiers.lock().expect("repository mutex poisoned");
        let dossier = guard.get_mut(dossier_id).ok_or(RepositoryError::NotFound)?;
        if let Some(status) = update.status {
            dossier.status = status;
        }
        if let Some(raw) = update.raw_extraction {
            dossier.raw_extraction = Some(raw);
        }
        dossier.fields.merge(update.fields);
        Ok(())
    }

    async fn save_classification(
        &self,
        dossier_id: &DossierId,
        document_id: &DocumentId,
        update: ClassificationUpdate,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.documents.lock().expect("repository mutex poisoned");
        let documents = guard.get_mut(dossier_id).ok_or(RepositoryError::NotFound)?;
        let document = documents
            .iter_mut()
            .find(|doc| doc.id == *document_id)
            .ok_or(RepositoryError::NotFound)?;
        document.category = Some(update.category);
        document.classification_confidence = Some(update.confidence);
        document.classifier_payload = Some(update.raw_payload);
        document.display_filename = Some(update.display_filename);
        document.sort_rank = update.sort_rank;
        document.combined_diagnostics = update.combined_diagnostics;
        Ok(())
    }

    async fn record_energy_certificate(
        &self,
        dossier_id: &DossierId,
        certificate_id: &str,
    ) -> Result<(), RepositoryError> {
        self.certificates
            .lock()
            .expect("repository mutex poisoned")
            .push((dossier_id.clone(), certificate_id.to_string()));
        Ok(())
    }
}

/// Repository that fails every call, for surfacing persistence errors.
pub(super) struct UnavailableRepository;

#[async_trait]
impl DossierRepository for UnavailableRepository {
    async fn fetch(&self, _dossier_id: &DossierId) -> Result<Dossier, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn documents(&self, _dossier_id: &DossierId) -> Result<Vec<Document>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn set_status(
        &self,
        _dossier_id: &DossierId,
        _status: DossierStatus,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn merge_update(
        &self,
        _dossier_id: &DossierId,
        _update: DossierUpdate,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn save_classification(
        &self,
        _dossier_id: &DossierId,
        _document_id: &DocumentId,
        _update: ClassificationUpdate,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn record_energy_certificate(
        &self,
        _dossier_id: &DossierId,
        _certificate_id: &str,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryContentStore {
    blobs: Mutex<HashMap<StorageRef, Vec<u8>>>,
    artifacts: Mutex<Vec<(DossierId, String)>>,
}

impl MemoryContentStore {
    pub(super) fn put(&self, storage_ref: StorageRef, content: Vec<u8>) {
        self.blobs
            .lock()
            .expect("content mutex poisoned")
            .insert(storage_ref, content);
    }

    pub(super) fn put_documents(&self, documents: &[Document]) {
        for document in documents {
            self.put(document.storage_ref.clone(), b"%PDF-1.4 stub".to_vec());
        }
    }

    pub(super) fn stored_artifacts(&self) -> Vec<(DossierId, String)> {
        self.artifacts
            .lock()
            .expect("content mutex poisoned")
            .clone()
    }

    pub(super) fn artifact_content(&self, storage_ref: &StorageRef) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .expect("content mutex poisoned")
            .get(storage_ref)
            .cloned()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn fetch(&self, storage_ref: &StorageRef) -> Result<Vec<u8>, ContentStoreError> {
        self.blobs
            .lock()
            .expect("content mutex poisoned")
            .get(storage_ref)
            .cloned()
            .ok_or_else(|| ContentStoreError::NotFound(storage_ref.0.clone()))
    }

    async fn store_artifact(
        &self,
        dossier_id: &DossierId,
        name: &str,
        content: Vec<u8>,
    ) -> Result<StorageRef, ContentStoreError> {
        let storage_ref = StorageRef(format!("artifacts/{dossier_id}/{name}"));
        self.blobs
            .lock()
            .expect("content mutex poisoned")
            .insert(storage_ref.clone(), content);
        self.artifacts
            .lock()
            .expect("content mutex poisoned")
            .push((dossier_id.clone(), name.to_string()));
        Ok(storage_ref)
    }
}

#[derive(Default)]
pub(super) struct MemoryProgress {
    snapshots: Mutex<HashMap<DossierId, Vec<ProgressSnapshot>>>,
    failures: Mutex<Vec<(String, String)>>,
}

impl MemoryProgress {
    pub(super) fn history(&self, dossier_id: &DossierId) -> Vec<ProgressSnapshot> {
        self.snapshots
            .lock()
            .expect("progress mutex poisoned")
            .get(dossier_id)
            .cloned()
            .unwrap_or_default()
    }

    pub(super) fn failed_documents(&self) -> Vec<(String, String)> {
        self.failures
            .lock()
            .expect("progress mutex poisoned")
            .clone()
    }
}

impl ProgressSink for MemoryProgress {
    fn update(&self, dossier_id: &DossierId, snapshot: ProgressSnapshot) {
        self.snapshots
            .lock()
            .expect("progress mutex poisoned")
            .entry(dossier_id.clone())
            .or_default()
            .push(snapshot);
    }

    fn document_failed(&self, _dossier_id: &DossierId, filename: &str, detail: &str) {
        self.failures
            .lock()
            .expect("progress mutex poisoned")
            .push((filename.to_string(), detail.to_string()));
    }

    fn latest(&self, dossier_id: &DossierId) -> Option<ProgressSnapshot> {
        self.snapshots
            .lock()
            .expect("progress mutex poisoned")
            .get(dossier_id)
            .and_then(|history| history.last().cloned())
    }
}

pub(super) type TestCoordinator =
    AnalysisCoordinator<MemoryRepository, MemoryContentStore, MockAnalyzer, MemoryProgress>;

pub(super) struct Harness {
    pub(super) coordinator: Arc<TestCoordinator>,
    pub(super) repository: Arc<MemoryRepository>,
    pub(super) content_store: Arc<MemoryContentStore>,
    pub(super) analyzer: Arc<MockAnalyzer>,
    pub(super) progress: Arc<MemoryProgress>,
}

pub(super) fn harness() -> Harness {
    let repository = Arc::new(MemoryRepository::default());
    let content_store = Arc::new(MemoryContentStore::default());
    let analyzer = Arc::new(MockAnalyzer::new());
    let progress = Arc::new(MemoryProgress::default());
    let coordinator = Arc::new(AnalysisCoordinator::new(
        Arc::clone(&repository),
        Arc::clone(&content_store),
        Arc::clone(&analyzer),
        Arc::clone(&progress),
    ));
    Harness {
        coordinator,
        repository,
        content_store,
        analyzer,
        progress,
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
