//! Scriptable analyzer used by tests and the demo run.
//!
//! Classification results queue per filename; extraction results queue
//! globally. Unscripted calls fall back to a low-confidence `autre`
//! classification and an empty extraction so happy-path tests stay short.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde_json::{json, Value};

use super::{AnalyzerError, Classification, DocumentAnalyzer, ExtractionDocument};
use crate::workflows::analysis::domain::{AnalysisContext, DocumentCategory, DossierId};

#[derive(Default)]
pub struct MockAnalyzer {
    classifications: Mutex<HashMap<String, VecDeque<Result<Classification, AnalyzerError>>>>,
    extractions: Mutex<VecDeque<Result<Value, AnalyzerError>>>,
    extract_requests: Mutex<Vec<Vec<String>>>,
    classify_calls: AtomicUsize,
    extract_calls: AtomicUsize,
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the next classification outcome for `filename`.
    pub fn script_classification(
        &self,
        filename: &str,
        outcome: Result<Classification, AnalyzerError>,
    ) {
        self.classifications
            .lock()
            .expect("analyzer mutex poisoned")
            .entry(filename.to_string())
            .or_default()
            .push_back(outcome);
    }

    /// Queues the next extraction outcome, shared across all calls.
    pub fn script_extraction(&self, outcome: Result<Value, AnalyzerError>) {
        self.extractions.lock().expect("analyzer mutex poisoned").push_back(outcome);
    }

    pub fn classify_calls(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst)
    }

    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    /// Filenames of each extraction request, in call order.
    pub fn extract_requests(&self) -> Vec<Vec<String>> {
        self.extract_requests.lock().expect("analyzer mutex poisoned").clone()
    }
}

impl Classification {
    /// Shorthand for scripting a plain single-category result.
    pub fn of(category: DocumentCategory, confidence: f64) -> Self {
        Self {
            category,
            confidence,
            raw_payload: json!({ "category": category, "confidence": confidence }),
            covered_diagnostics: Vec::new(),
            detected_energy_certificate_id: None,
            document_date: None,
        }
    }
}

#[async_trait::async_trait]
impl DocumentAnalyzer for MockAnalyzer {
    async fn classify(
        &self,
        _content: &[u8],
        filename: &str,
        _dossier_id: &DossierId,
    ) -> Result<Classification, AnalyzerError> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        // Lets concurrently started classifications interleave under test.
        tokio::task::yield_now().await;

        let scripted = self
            .classifications
            .lock()
            .expect("analyzer mutex poisoned")
            .get_mut(filename)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(outcome) => outcome,
            None => Ok(Classification::of(DocumentCategory::Autre, 0.2)),
        }
    }

    async fn extract(
        &self,
        documents: &[ExtractionDocument],
        _dossier_id: &DossierId,
        _context: &AnalysisContext,
    ) -> Result<Value, AnalyzerError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        self.extract_requests
            .lock()
            .expect("analyzer mutex poisoned")
            .push(documents.iter().map(|doc| doc.filename.clone()).collect());
        tokio::task::yield_now().await;

        match self.extractions.lock().expect("analyzer mutex poisoned").pop_front() {
            Some(outcome) => outcome,
            None => Ok(json!({})),
        }
    }
}
