//! Typed shape of the batched AI extraction.
//!
//! Every field is optional: the model only fills what the documents support,
//! and `missing_data` names what it could not find. Leaf values that need
//! coercion (numbers with French formatting, dates, energy letters) stay as
//! raw JSON values and go through [`super::coerce`] during flattening; plain
//! text fields deserialize directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical record for one batched extraction, after the array-or-object
/// response ambiguity has been resolved at the orchestrator boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredExtraction {
    pub property: PropertyData,
    pub co_ownership: CoOwnershipData,
    pub financial: FinancialData,
    pub legal: LegalData,
    pub diagnostics: DiagnosticsData,
    pub meta: ExtractionMeta,
}

/// Lot and building description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyData {
    pub lot_number: Option<Value>,
    pub property_address: Option<String>,
    pub building: Option<String>,
    pub floor: Option<Value>,
    pub lot_description: Option<String>,
    pub annex_lots: Option<String>,
    pub property_usage: Option<String>,
    pub carrez_area_m2: Option<Value>,
    pub construction_period: Option<String>,
}

/// Syndicate identity and ownership-share arithmetic inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoOwnershipData {
    pub syndicate_name: Option<String>,
    pub syndic_name: Option<String>,
    pub syndic_address: Option<String>,
    pub lot_share: Option<Value>,
    pub total_share: Option<Value>,
    pub total_lots: Option<Value>,
    pub residential_lots: Option<Value>,
    pub bylaws_date: Option<Value>,
    pub bylaws_amendment_count: Option<Value>,
    pub fiche_synthetique_date: Option<Value>,
}

/// Budget, charges, and fund figures feeding the reconciler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FinancialData {
    pub annual_budget: Option<Value>,
    /// Recurring charge for the lot as the model read it off the statements.
    pub recurring_charge_lot: Option<Value>,
    pub prior_year_budget_n1: Option<Value>,
    pub prior_year_budget_n2: Option<Value>,
    pub advance_provisions: Option<Value>,
    pub works_fund_balance: Option<Value>,
    pub works_fund_contribution: Option<Value>,
    pub seller_unpaid_charges: Option<Value>,
    pub supplier_debt: Option<Value>,
    pub voted_works_amount: Option<Value>,
    pub litigation_provision: Option<Value>,
    pub last_regularization_date: Option<Value>,
    pub last_fund_call_date: Option<Value>,
}

/// Assemblies, mandates, and procedural state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LegalData {
    pub last_assembly_date: Option<Value>,
    pub previous_assembly_date: Option<Value>,
    pub pending_procedures: Option<String>,
    pub syndic_mandate_end: Option<Value>,
    pub insurance_policy: Option<String>,
    pub voted_works_summary: Option<String>,
    pub preemption_notice: Option<String>,
    pub edd_date: Option<Value>,
}

/// Technical diagnostic results and report dates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsData {
    pub energy_class: Option<Value>,
    pub ges_class: Option<Value>,
    pub dpe_date: Option<Value>,
    pub dpe_certificate_id: Option<String>,
    pub asbestos_present: Option<String>,
    pub asbestos_report_date: Option<Value>,
    pub lead_report_date: Option<Value>,
    pub electricity_report_date: Option<Value>,
    pub gas_report_date: Option<Value>,
    pub termites_report_date: Option<Value>,
    pub erp_date: Option<Value>,
    pub carrez_certificate_date: Option<Value>,
    pub dtg_date: Option<Value>,
}

/// Model-reported gaps and advisory notes. The reconciler appends its own
/// alerts here; they are advisory and never block the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionMeta {
    pub missing_data: Vec<String>,
    pub alerts: Vec<String>,
}
