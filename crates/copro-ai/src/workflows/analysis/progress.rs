//! Progress reporting for long-running analysis runs.

use serde::{Deserialize, Serialize};

use super::domain::DossierId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPhase {
    Idle,
    Classification,
    Extraction,
    Done,
    Error,
}

/// One observable step of a run. `current`/`total` count documents during
/// classification; extraction is one logical step (0/1 while in flight).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub phase: AnalysisPhase,
    pub current: u32,
    pub total: u32,
    pub message: String,
}

impl ProgressSnapshot {
    pub fn idle() -> Self {
        Self {
            phase: AnalysisPhase::Idle,
            current: 0,
            total: 0,
            message: String::new(),
        }
    }

    pub fn classification(current: u32, total: u32) -> Self {
        Self {
            phase: AnalysisPhase::Classification,
            current,
            total,
            message: format!("Classification des documents ({current}/{total})"),
        }
    }

    pub fn extraction() -> Self {
        Self {
            phase: AnalysisPhase::Extraction,
            current: 0,
            total: 1,
            message: "Extraction des données en cours".to_string(),
        }
    }

    pub fn done() -> Self {
        Self {
            phase: AnalysisPhase::Done,
            current: 0,
            total: 0,
            message: "Analyse terminée".to_string(),
        }
    }

    pub fn error(detail: &str) -> Self {
        Self {
            phase: AnalysisPhase::Error,
            current: 0,
            total: 0,
            message: format!("Analyse interrompue: {detail}"),
        }
    }
}

/// Where progress updates land. Implementations must tolerate updates from a
/// spawned task outliving the request that started the run.
pub trait ProgressSink: Send + Sync {
    fn update(&self, dossier_id: &DossierId, snapshot: ProgressSnapshot);

    /// A single document failed classification; the run keeps going.
    fn document_failed(&self, dossier_id: &DossierId, filename: &str, detail: &str);

    fn latest(&self, dossier_id: &DossierId) -> Option<ProgressSnapshot>;
}

/// What the status endpoint returns for a dossier.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisStatusView {
    pub is_running: bool,
    pub progress: ProgressSnapshot,
}
