use std::sync::Arc;

use serde_json::json;

use super::common::*;
use crate::workflows::analysis::ai::mock::MockAnalyzer;
use crate::workflows::analysis::ai::{AnalyzerError, Classification};
use crate::workflows::analysis::coordinator::{
    AnalysisCoordinator, RunOutcome, RAW_EXTRACTION_ARTIFACT,
};
use crate::workflows::analysis::domain::{DocumentCategory, DossierStatus, StorageRef};
use crate::workflows::analysis::dossier::{DossierFields, DossierUpdate};
use crate::workflows::analysis::progress::{AnalysisPhase, ProgressSink};
use crate::workflows::analysis::repository::DossierRepository;

#[tokio::test]
async fn full_run_lands_on_pending_validation() {
    let Harness {
        coordinator,
        repository,
        content_store,
        analyzer,
        progress,
    } = harness();
    let id = dossier_id();
    let documents = vec![document("d1", "pv-ag.pdf"), document("d2", "dpe.pdf")];
    repository.seed(&id, documents.clone());
    content_store.put_documents(&documents);
    analyzer.script_classification(
        "pv-ag.pdf",
        Ok(Classification::of(
            DocumentCategory::ProcesVerbalAssemblee,
            0.9,
        )),
    );
    analyzer.script_classification(
        "dpe.pdf",
        Ok(Classification::of(
            DocumentCategory::DiagnosticPerformanceEnergetique,
            0.94,
        )),
    );
    analyzer.script_extraction(Ok(extraction_payload()));

    let outcome = coordinator.start_analysis(&id, &context()).await;

    assert_eq!(outcome, RunOutcome::Completed);
    let dossier = repository.dossier(&id);
    assert_eq!(dossier.status, DossierStatus::PendingValidation);
    assert_eq!(dossier.fields.lot_number.as_deref(), Some("42"));
    assert_eq!(dossier.fields.annual_budget, Some(120_000.0));
    // 150/10000 of 120 000 € beats the 1 500 € read off the documents.
    assert_eq!(dossier.fields.estimated_charge, Some(1_800.0));
    assert_eq!(dossier.fields.recurring_charge, Some(1_800.0));
    assert_eq!(dossier.fields.ai_reported_charge, Some(1_500.0));
    assert_eq!(dossier.fields.charge_discrepancy_pct, Some(16.67));
    assert_eq!(dossier.fields.energy_class, Some('C'));
    assert_eq!(dossier.fields.dpe_date.as_deref(), Some("2024-03-15"));

    let raw = dossier.raw_extraction.expect("raw snapshot stored");
    let alerts = raw["meta"]["alerts"].as_array().expect("alerts array");
    assert_eq!(alerts.len(), 1);

    let history = progress.history(&id);
    assert_eq!(history.last().map(|s| s.phase), Some(AnalysisPhase::Done));
    assert!(history
        .iter()
        .any(|s| s.phase == AnalysisPhase::Classification));
    assert!(history.iter().any(|s| s.phase == AnalysisPhase::Extraction));
}

#[tokio::test]
async fn concurrent_starts_collapse_to_one_run() {
    let Harness {
        coordinator,
        repository,
        content_store,
        analyzer,
        ..
    } = harness();
    let id = dossier_id();
    let documents = vec![document("d1", "pv-ag.pdf")];
    repository.seed(&id, documents.clone());
    content_store.put_documents(&documents);
    analyzer.script_extraction(Ok(extraction_payload()));

    let first_context = context();
    let second_context = context();
    let (first, second) = tokio::join!(
        coordinator.start_analysis(&id, &first_context),
        coordinator.start_analysis(&id, &second_context),
    );

    let outcomes = [first, second];
    assert!(outcomes.contains(&RunOutcome::Completed));
    assert!(outcomes.contains(&RunOutcome::AlreadyRunning));
    assert_eq!(analyzer.extract_calls(), 1);
}

#[tokio::test]
async fn the_guard_releases_after_a_run() {
    let Harness {
        coordinator,
        repository,
        content_store,
        analyzer,
        ..
    } = harness();
    let id = dossier_id();
    let documents = vec![document("d1", "pv-ag.pdf")];
    repository.seed(&id, documents.clone());
    content_store.put_documents(&documents);
    analyzer.script_extraction(Ok(extraction_payload()));
    analyzer.script_extraction(Ok(extraction_payload()));

    assert_eq!(
        coordinator.start_analysis(&id, &context()).await,
        RunOutcome::Completed
    );
    assert!(!coordinator.is_running(&id));
    assert_eq!(
        coordinator.start_analysis(&id, &context()).await,
        RunOutcome::Completed
    );
}

#[tokio::test]
async fn one_unreadable_document_does_not_sink_the_run() {
    let Harness {
        coordinator,
        repository,
        content_store,
        analyzer,
        progress,
    } = harness();
    let id = dossier_id();
    let documents = vec![document("d1", "corrompu.pdf"), document("d2", "dpe.pdf")];
    repository.seed(&id, documents.clone());
    content_store.put_documents(&documents);
    analyzer.script_classification(
        "corrompu.pdf",
        Err(AnalyzerError::Malformed("not a document".to_string())),
    );
    analyzer.script_classification(
        "dpe.pdf",
        Ok(Classification::of(
            DocumentCategory::DiagnosticPerformanceEnergetique,
            0.94,
        )),
    );
    analyzer.script_extraction(Ok(extraction_payload()));

    let outcome = coordinator.start_analysis(&id, &context()).await;

    assert_eq!(outcome, RunOutcome::Completed);
    let failures = progress.failed_documents();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "corrompu.pdf");
    let stored = repository.stored_documents(&id);
    assert!(!stored[0].is_classified());
    assert!(stored[1].is_classified());
}

#[tokio::test]
async fn extraction_failure_marks_the_dossier_in_error() {
    let Harness {
        coordinator,
        repository,
        content_store,
        analyzer,
        progress,
    } = harness();
    let id = dossier_id();
    let documents = vec![document("d1", "pv-ag.pdf")];
    repository.seed(&id, documents.clone());
    content_store.put_documents(&documents);
    analyzer.script_extraction(Err(AnalyzerError::Api("500: boom".to_string())));

    let outcome = coordinator.start_analysis(&id, &context()).await;

    assert!(matches!(outcome, RunOutcome::Failed(_)));
    assert_eq!(repository.dossier(&id).status, DossierStatus::Error);
    assert_eq!(
        progress.latest(&id).map(|s| s.phase),
        Some(AnalysisPhase::Error)
    );
    assert!(!coordinator.is_running(&id));
}

#[tokio::test]
async fn unavailable_repository_fails_the_run() {
    let repository = Arc::new(UnavailableRepository);
    let content_store = Arc::new(MemoryContentStore::default());
    let analyzer = Arc::new(MockAnalyzer::new());
    let progress = Arc::new(MemoryProgress::default());
    let coordinator = AnalysisCoordinator::new(
        repository,
        content_store,
        analyzer,
        Arc::clone(&progress),
    );

    let id = dossier_id();
    let outcome = coordinator.start_analysis(&id, &context()).await;

    assert!(matches!(outcome, RunOutcome::Failed(_)));
    assert_eq!(
        progress.latest(&id).map(|s| s.phase),
        Some(AnalysisPhase::Error)
    );
}

#[tokio::test]
async fn merge_updates_never_erase_reviewed_values() {
    let Harness {
        coordinator,
        repository,
        content_store,
        analyzer,
        ..
    } = harness();
    let id = dossier_id();
    let documents = vec![document("d1", "pv-ag.pdf")];
    repository.seed(&id, documents.clone());
    content_store.put_documents(&documents);

    // A reviewer already filled the building in by hand; the payload does not
    // mention it.
    repository
        .merge_update(
            &id,
            DossierUpdate {
                status: None,
                raw_extraction: None,
                fields: DossierFields {
                    building: Some("Bâtiment B".to_string()),
                    ..Default::default()
                },
            },
        )
        .await
        .expect("seed merge");
    analyzer.script_extraction(Ok(extraction_payload()));

    let outcome = coordinator.start_analysis(&id, &context()).await;

    assert_eq!(outcome, RunOutcome::Completed);
    let dossier = repository.dossier(&id);
    assert_eq!(dossier.fields.building.as_deref(), Some("Bâtiment B"));
    assert_eq!(dossier.fields.annual_budget, Some(120_000.0));
}

#[tokio::test(start_paused = true)]
async fn upload_classification_staggers_and_persists() {
    let Harness {
        coordinator,
        repository,
        content_store,
        analyzer,
        ..
    } = harness();
    let id = dossier_id();
    let documents = vec![document("d1", "pv-ag.pdf"), document("d2", "dpe.pdf")];
    repository.seed(&id, documents.clone());
    content_store.put_documents(&documents);
    analyzer.script_classification(
        "pv-ag.pdf",
        Ok(Classification::of(
            DocumentCategory::ProcesVerbalAssemblee,
            0.9,
        )),
    );
    analyzer.script_classification(
        "dpe.pdf",
        Ok(Classification::of(
            DocumentCategory::DiagnosticPerformanceEnergetique,
            0.94,
        )),
    );

    let handles = coordinator.classify_uploads(id.clone(), documents, context());
    for handle in handles {
        handle.await.expect("classification task completes");
    }

    let stored = repository.stored_documents(&id);
    assert!(stored.iter().all(|doc| doc.is_classified()));
    assert_eq!(analyzer.classify_calls(), 2);
}

#[tokio::test]
async fn status_reports_idle_then_done() {
    let Harness {
        coordinator,
        repository,
        content_store,
        analyzer,
        ..
    } = harness();
    let id = dossier_id();

    let view = coordinator.status(&id);
    assert!(!view.is_running);
    assert_eq!(view.progress.phase, AnalysisPhase::Idle);

    let documents = vec![document("d1", "pv-ag.pdf")];
    repository.seed(&id, documents.clone());
    content_store.put_documents(&documents);
    analyzer.script_extraction(Ok(extraction_payload()));
    coordinator.start_analysis(&id, &context()).await;

    let view = coordinator.status(&id);
    assert!(!view.is_running);
    assert_eq!(view.progress.phase, AnalysisPhase::Done);
}

#[tokio::test]
async fn raw_snapshot_is_archived_with_the_dossier() {
    let Harness {
        coordinator,
        repository,
        content_store,
        analyzer,
        ..
    } = harness();
    let id = dossier_id();
    let documents = vec![document("d1", "pv-ag.pdf")];
    repository.seed(&id, documents.clone());
    content_store.put_documents(&documents);
    analyzer.script_extraction(Ok(extraction_payload()));

    let outcome = coordinator.start_analysis(&id, &context()).await;

    assert_eq!(outcome, RunOutcome::Completed);
    let artifacts = content_store.stored_artifacts();
    assert_eq!(
        artifacts,
        vec![(id.clone(), RAW_EXTRACTION_ARTIFACT.to_string())]
    );

    // The archived bytes parse back to the payload, alerts included.
    let storage_ref = StorageRef(format!("artifacts/{id}/{RAW_EXTRACTION_ARTIFACT}"));
    let bytes = content_store
        .artifact_content(&storage_ref)
        .expect("snapshot archived");
    let snapshot: serde_json::Value = serde_json::from_slice(&bytes).expect("valid json");
    assert_eq!(snapshot["financial"]["recurring_charge_lot"], json!(1500));
    assert!(!snapshot["meta"]["alerts"]
        .as_array()
        .expect("alerts array")
        .is_empty());
}

#[tokio::test]
async fn reconciliation_alerts_extend_existing_payload_alerts() {
    let Harness {
        coordinator,
        repository,
        content_store,
        analyzer,
        ..
    } = harness();
    let id = dossier_id();
    let documents = vec![document("d1", "pv-ag.pdf")];
    repository.seed(&id, documents.clone());
    content_store.put_documents(&documents);

    let mut payload = extraction_payload();
    payload["meta"]["alerts"] = json!(["Pré-état daté manquant"]);
    analyzer.script_extraction(Ok(payload));

    coordinator.start_analysis(&id, &context()).await;

    let raw = repository.dossier(&id).raw_extraction.expect("raw stored");
    let alerts = raw["meta"]["alerts"].as_array().expect("alerts array");
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0], "Pré-état daté manquant");
}
