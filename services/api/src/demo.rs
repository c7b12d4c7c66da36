use crate::infra::{InMemoryContentStore, InMemoryDossierRepository, InMemoryProgressSink};
use chrono::Local;
use clap::Args;
use copro_ai::error::AppError;
use copro_ai::workflows::analysis::ai::mock::MockAnalyzer;
use copro_ai::workflows::analysis::{
    AnalysisContext, AnalysisCoordinator, Classification, Document, DocumentCategory, DocumentId,
    DossierId, RunOutcome, StorageRef,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Print the raw extraction payload after the summary.
    #[arg(long)]
    pub(crate) show_raw: bool,
}

/// Runs the full pipeline against an in-memory dossier with a scripted
/// analyzer, so the demo works without any AI credentials.
pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    println!("Dossier analysis demo (generated {})", Local::now().format("%Y-%m-%d %H:%M"));

    let repository = Arc::new(InMemoryDossierRepository::default());
    let content_store = Arc::new(InMemoryContentStore::default());
    let progress = Arc::new(InMemoryProgressSink::default());
    let analyzer = Arc::new(MockAnalyzer::new());

    script_analyzer(&analyzer);

    let dossier_id = DossierId("demo-dossier".to_string());
    let documents = demo_documents();
    for document in &documents {
        content_store.put(
            document.storage_ref.clone(),
            format!("%PDF-{}", document.original_filename).into_bytes(),
        );
    }
    repository.seed(&dossier_id, documents);

    let coordinator = Arc::new(
        AnalysisCoordinator::new(repository.clone(), content_store, analyzer, progress)
            .with_upload_stagger(Duration::ZERO),
    );

    let context = AnalysisContext {
        lot_number: Some("42".to_string()),
        property_address: Some("12 rue des Lilas, 69003 Lyon".to_string()),
        ..AnalysisContext::default()
    };

    let outcome = coordinator.start_analysis(&dossier_id, &context).await;
    match outcome {
        RunOutcome::Completed => {}
        RunOutcome::AlreadyRunning => {
            println!("Analysis already in progress, nothing to do");
            return Ok(());
        }
        RunOutcome::Failed(detail) => {
            println!("Analysis failed: {detail}");
            return Ok(());
        }
    }

    let dossier = match repository.snapshot(&dossier_id) {
        Some(dossier) => dossier,
        None => {
            println!("Dossier disappeared from the repository");
            return Ok(());
        }
    };

    println!("\nDossier status: {}", dossier.status.label());

    println!("\nClassified documents (display order)");
    let mut documents = repository.document_snapshot(&dossier_id);
    documents.sort_by_key(|document| document.sort_rank);
    for document in &documents {
        let label = document
            .category
            .map(DocumentCategory::label)
            .unwrap_or("non classé");
        let renamed = document
            .display_filename
            .as_deref()
            .unwrap_or(&document.original_filename);
        let bundle = if document.combined_diagnostics {
            " [bundle]"
        } else {
            ""
        };
        println!(
            "- {:02} {} <- {} ({}){}",
            document.sort_rank, renamed, document.original_filename, label, bundle
        );
    }

    println!("\nCharges");
    let fields = &dossier.fields;
    if let Some(estimated) = fields.estimated_charge {
        println!("- Estimated from tantièmes: {estimated:.2} EUR/an");
    }
    if let Some(reported) = fields.ai_reported_charge {
        println!("- Reported in documents:    {reported:.2} EUR/an");
    }
    if let Some(final_charge) = fields.recurring_charge {
        println!("- Retained annual charge:   {final_charge:.2} EUR/an");
    }
    match fields.charge_discrepancy_pct {
        Some(pct) => println!("- Discrepancy: {pct:.2}% (above threshold)"),
        None => println!("- Discrepancy: within tolerance"),
    }
    if let Some(energy) = fields.energy_class {
        println!("- Energy class: {energy}");
    }

    let alerts = extraction_alerts(dossier.raw_extraction.as_ref());
    if alerts.is_empty() {
        println!("\nAlerts: none");
    } else {
        println!("\nAlerts");
        for alert in alerts {
            println!("- {alert}");
        }
    }

    let certificates = repository.certificates();
    if !certificates.is_empty() {
        println!("\nEnergy certificates on file");
        for (id, certificate) in certificates {
            println!("- {id}: {certificate}");
        }
    }

    if args.show_raw {
        if let Some(raw) = dossier.raw_extraction.as_ref() {
            match serde_json::to_string_pretty(raw) {
                Ok(payload) => println!("\nRaw extraction payload:\n{payload}"),
                Err(err) => println!("\nRaw extraction payload unavailable: {err}"),
            }
        }
    }

    Ok(())
}

fn demo_documents() -> Vec<Document> {
    vec![
        Document::new(
            DocumentId("doc-1".into()),
            "scan_reglement_immeuble.pdf",
            StorageRef("demo/doc-1".into()),
            845_000,
            "application/pdf",
        ),
        Document::new(
            DocumentId("doc-2".into()),
            "PV AG mars 2024.pdf",
            StorageRef("demo/doc-2".into()),
            312_000,
            "application/pdf",
        ),
        Document::new(
            DocumentId("doc-3".into()),
            "pre-etat-date-notaire.pdf",
            StorageRef("demo/doc-3".into()),
            198_000,
            "application/pdf",
        ),
        Document::new(
            DocumentId("doc-4".into()),
            "dossier_diagnostics_complet.pdf",
            StorageRef("demo/doc-4".into()),
            1_450_000,
            "application/pdf",
        ),
    ]
}

fn script_analyzer(analyzer: &MockAnalyzer) {
    analyzer.script_classification(
        "scan_reglement_immeuble.pdf",
        Ok(Classification::of(
            DocumentCategory::ReglementCopropriete,
            0.97,
        )),
    );

    let mut assembly = Classification::of(DocumentCategory::ProcesVerbalAssemblee, 0.94);
    assembly.document_date = Some("12/03/2024".to_string());
    analyzer.script_classification("PV AG mars 2024.pdf", Ok(assembly));

    analyzer.script_classification(
        "pre-etat-date-notaire.pdf",
        Ok(Classification::of(DocumentCategory::PreEtatDate, 0.91)),
    );

    let mut diagnostics =
        Classification::of(DocumentCategory::DiagnosticPerformanceEnergetique, 0.88);
    diagnostics.covered_diagnostics = vec![
        DocumentCategory::DiagnosticPerformanceEnergetique,
        DocumentCategory::DiagnosticAmiante,
        DocumentCategory::DiagnosticElectricite,
    ];
    diagnostics.detected_energy_certificate_id = Some("2375E1234567Z".to_string());
    diagnostics.document_date = Some("15/01/2024".to_string());
    analyzer.script_classification("dossier_diagnostics_complet.pdf", Ok(diagnostics));

    analyzer.script_extraction(Ok(json!({
        "property": {
            "lot_number": "42",
            "carrez_area_m2": 58.4,
            "property_usage": "habitation"
        },
        "co_ownership": {
            "syndicate_name": "SDC 12 rue des Lilas",
            "lot_share": 150,
            "total_share": "10 000"
        },
        "financial": {
            "annual_budget": "120 000 €",
            "recurring_charge_lot": "1 500",
            "advance_provisions": 1200
        },
        "legal": {
            "last_assembly_date": "12/03/2024"
        },
        "diagnostics": {
            "energy_class": "C",
            "ges_class": "D",
            "dpe_date": "15/01/2024",
            "dpe_certificate_id": "2375E1234567Z"
        }
    })));
}

fn extraction_alerts(raw: Option<&serde_json::Value>) -> Vec<String> {
    raw.and_then(|value| value.pointer("/meta/alerts"))
        .and_then(|alerts| alerts.as_array())
        .map(|alerts| {
            alerts
                .iter()
                .filter_map(|alert| alert.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
