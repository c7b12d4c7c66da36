use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use copro_ai::workflows::analysis::{
    ClassificationUpdate, ContentStore, ContentStoreError, Document, DocumentId, Dossier,
    DossierId, DossierRepository, DossierStatus, DossierUpdate, ProgressSink, ProgressSnapshot,
    RepositoryError, StorageRef,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local dossier store. Production deployments swap this for the
/// hosted persistence backend; the trait seam is the same either way.
#[derive(Default)]
pub(crate) struct InMemoryDossierRepository {
    dossiers: Mutex<HashMap<DossierId, Dossier>>,
    documents: Mutex<HashMap<DossierId, Vec<Document>>>,
    certificates: Mutex<Vec<(DossierId, String)>>,
}

impl InMemoryDossierRepository {
    pub(crate) fn seed(&self, dossier_id: &DossierId, documents: Vec<Document>) {
        self.dossiers
            .lock()
            .expect("repository mutex poisoned")
            .insert(dossier_id.clone(), Dossier::new(dossier_id.clone()));
        self.documents
            .lock()
            .expect("repository mutex poisoned")
            .insert(dossier_id.clone(), documents);
    }

    pub(crate) fn snapshot(&self, dossier_id: &DossierId) -> Option<Dossier> {
        self.dossiers
            .lock()
            .expect("repository mutex poisoned")
            .get(dossier_id)
            .cloned()
    }

    pub(crate) fn document_snapshot(&self, dossier_id: &DossierId) -> Vec<Document> {
        self.documents
            .lock()
            .expect("repository mutex poisoned")
            .get(dossier_id)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn certificates(&self) -> Vec<(DossierId, String)> {
        self.certificates
            .lock()
            .expect("repository mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl DossierRepository for InMemoryDossierRepository {
    async fn fetch(&self, dossier_id: &DossierId) -> Result<Dossier, RepositoryError> {
        self.snapshot(dossier_id).ok_or(RepositoryError::NotFound)
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

#[derive(Default)]
pub(crate) struct InMemoryContentStore {
    blobs: Mutex<HashMap<StorageRef, Vec<u8>>>,
}

impl InMemoryContentStore {
    pub(crate) fn put(&self, storage_ref: StorageRef, content: Vec<u8>) {
        self.blobs
            .lock()
            .expect("content mutex poisoned")
            .insert(storage_ref, content);
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
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
        self.put(storage_ref.clone(), content);
        Ok(storage_ref)
    }
}

/// Keeps only the latest snapshot per dossier, which is all the status
/// endpoint serves.
#[derive(Default)]
pub(crate) struct InMemoryProgressSink {
    latest: Mutex<HashMap<DossierId, ProgressSnapshot>>,
}

impl ProgressSink for InMemoryProgressSink {
    fn update(&self, dossier_id: &DossierId, snapshot: ProgressSnapshot) {
        self.latest
            .lock()
            .expect("progress mutex poisoned")
            .insert(dossier_id.clone(), snapshot);
    }

    fn document_failed(&self, dossier_id: &DossierId, filename: &str, detail: &str) {
        tracing::warn!(%dossier_id, filename, detail, "document failed classification");
    }

    fn latest(&self, dossier_id: &DossierId) -> Option<ProgressSnapshot> {
        self.latest
            .lock()
            .expect("progress mutex poisoned")
            .get(dossier_id)
            .cloned()
    }
}
