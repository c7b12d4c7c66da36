use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier wrapper for one disclosure dossier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DossierId(pub String);

impl fmt::Display for DossierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for one uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference into the content-addressed store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageRef(pub String);

/// Fixed taxonomy of co-ownership disclosure documents.
///
/// The sort rank orders documents the way a notary expects to read the
/// dossier: founding deeds first, assembly and financial paperwork next,
/// technical diagnostics last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    ReglementCopropriete,
    EtatDescriptifDivision,
    FicheSynthetique,
    ProcesVerbalAssemblee,
    CarnetEntretien,
    AppelDeFonds,
    ReleveCharges,
    PreEtatDate,
    DiagnosticTechniqueGlobal,
    DiagnosticPerformanceEnergetique,
    DiagnosticAmiante,
    DiagnosticPlomb,
    DiagnosticElectricite,
    DiagnosticGaz,
    EtatRisquesPollutions,
    AttestationCarrez,
    Autre,
}

impl DocumentCategory {
    /// Rank given to a single file covering several individual diagnostics.
    /// Sits between the global technical diagnostic and the individual ones.
    pub const COMBINED_DIAGNOSTICS_RANK: u32 = 10;

    /// Rank assigned to documents the classifier has not seen yet.
    pub const UNRANKED: u32 = 99;

    pub const fn label(self) -> &'static str {
        match self {
            Self::ReglementCopropriete => "Règlement de copropriété",
            Self::EtatDescriptifDivision => "État descriptif de division",
            Self::FicheSynthetique => "Fiche synthétique",
            Self::ProcesVerbalAssemblee => "Procès-verbal d'assemblée générale",
            Self::CarnetEntretien => "Carnet d'entretien",
            Self::AppelDeFonds => "Appel de fonds",
            Self::ReleveCharges => "Relevé de charges",
            Self::PreEtatDate => "Pré-état daté",
            Self::DiagnosticTechniqueGlobal => "Diagnostic technique global",
            Self::DiagnosticPerformanceEnergetique => "Diagnostic de performance énergétique",
            Self::DiagnosticAmiante => "Diagnostic amiante",
            Self::DiagnosticPlomb => "Constat de risque d'exposition au plomb",
            Self::DiagnosticElectricite => "État de l'installation électrique",
            Self::DiagnosticGaz => "État de l'installation gaz",
            Self::EtatRisquesPollutions => "État des risques et pollutions",
            Self::AttestationCarrez => "Attestation de superficie Carrez",
            Self::Autre => "Autre document",
        }
    }

    /// Filename-safe slug used when renaming documents for display.
    pub const fn slug(self) -> &'static str {
        match self {
            Self::ReglementCopropriete => "reglement-copropriete",
            Self::EtatDescriptifDivision => "etat-descriptif-division",
            Self::FicheSynthetique => "fiche-synthetique",
            Self::ProcesVerbalAssemblee => "pv-assemblee-generale",
            Self::CarnetEntretien => "carnet-entretien",
            Self::AppelDeFonds => "appel-de-fonds",
            Self::ReleveCharges => "releve-charges",
            Self::PreEtatDate => "pre-etat-date",
            Self::DiagnosticTechniqueGlobal => "diagnostic-technique-global",
            Self::DiagnosticPerformanceEnergetique => "dpe",
            Self::DiagnosticAmiante => "diagnostic-amiante",
            Self::DiagnosticPlomb => "diagnostic-plomb",
            Self::DiagnosticElectricite => "diagnostic-electricite",
            Self::DiagnosticGaz => "diagnostic-gaz",
            Self::EtatRisquesPollutions => "etat-risques-pollutions",
            Self::AttestationCarrez => "attestation-carrez",
            Self::Autre => "autre",
        }
    }

    /// Fixed priority table ordering the dossier for display.
    pub const fn sort_rank(self) -> u32 {
        match self {
            Self::ReglementCopropriete => 1,
            Self::EtatDescriptifDivision => 2,
            Self::FicheSynthetique => 3,
            Self::ProcesVerbalAssemblee => 4,
            Self::CarnetEntretien => 5,
            Self::AppelDeFonds => 6,
            Self::ReleveCharges => 7,
            Self::PreEtatDate => 8,
            Self::DiagnosticTechniqueGlobal => 9,
            Self::DiagnosticPerformanceEnergetique => 11,
            Self::DiagnosticAmiante => 12,
            Self::DiagnosticPlomb => 13,
            Self::DiagnosticElectricite => 14,
            Self::DiagnosticGaz => 15,
            Self::EtatRisquesPollutions => 16,
            Self::AttestationCarrez => 17,
            Self::Autre => Self::UNRANKED,
        }
    }

    pub const fn is_individual_diagnostic(self) -> bool {
        matches!(
            self,
            Self::DiagnosticPerformanceEnergetique
                | Self::DiagnosticAmiante
                | Self::DiagnosticPlomb
                | Self::DiagnosticElectricite
                | Self::DiagnosticGaz
                | Self::EtatRisquesPollutions
                | Self::AttestationCarrez
        )
    }
}

/// One uploaded file belonging to a dossier.
///
/// Classification fields stay `None` until the classification worker runs;
/// once set, the pipeline never clears them (only explicit deletion, which is
/// outside this crate, removes a document).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub original_filename: String,
    pub storage_ref: StorageRef,
    pub byte_size: u64,
    pub mime_type: String,
    #[serde(default)]
    pub category: Option<DocumentCategory>,
    #[serde(default)]
    pub classification_confidence: Option<f64>,
    #[serde(default)]
    pub classifier_payload: Option<Value>,
    #[serde(default)]
    pub display_filename: Option<String>,
    #[serde(default = "Document::default_rank")]
    pub sort_rank: u32,
    #[serde(default)]
    pub combined_diagnostics: bool,
}

impl Document {
    pub fn new(
        id: DocumentId,
        original_filename: impl Into<String>,
        storage_ref: StorageRef,
        byte_size: u64,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            id,
            original_filename: original_filename.into(),
            storage_ref,
            byte_size,
            mime_type: mime_type.into(),
            category: None,
            classification_confidence: None,
            classifier_payload: None,
            display_filename: None,
            sort_rank: Self::default_rank(),
            combined_diagnostics: false,
        }
    }

    const fn default_rank() -> u32 {
        DocumentCategory::UNRANKED
    }

    pub fn is_classified(&self) -> bool {
        self.category.is_some()
    }
}

/// Lifecycle of a dossier. The pipeline only drives
/// `draft/pending_validation → analyzing → pending_validation | error`;
/// the later transitions belong to the validation and payment surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DossierStatus {
    Draft,
    Analyzing,
    PendingValidation,
    Validated,
    Paid,
    Completed,
    Error,
}

impl DossierStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "Brouillon",
            Self::Analyzing => "Analyse en cours",
            Self::PendingValidation => "En attente de validation",
            Self::Validated => "Validé",
            Self::Paid => "Payé",
            Self::Completed => "Terminé",
            Self::Error => "Erreur",
        }
    }
}

/// Caller-supplied context accompanying a run. Values entered by the seller
/// in an earlier manual step take precedence over extracted ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisContext {
    #[serde(default)]
    pub lot_number: Option<String>,
    #[serde(default)]
    pub property_address: Option<String>,
    /// Free-form questionnaire answers forwarded verbatim to the extractor.
    #[serde(default)]
    pub questionnaire: BTreeMap<String, String>,
    /// Category hints keyed by original filename, from the upload form.
    #[serde(default)]
    pub category_hints: BTreeMap<String, DocumentCategory>,
}
