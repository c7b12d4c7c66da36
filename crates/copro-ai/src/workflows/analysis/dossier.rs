use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::{DossierId, DossierStatus};

/// Aggregate disclosure record for one transaction.
///
/// The flattened scalar fields are the source of truth once a human has
/// validated them; the raw extraction blob stays alongside so the validation
/// UI can show what the model actually said.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dossier {
    pub id: DossierId,
    pub status: DossierStatus,
    #[serde(default)]
    pub raw_extraction: Option<Value>,
    #[serde(default)]
    pub fields: DossierFields,
}

impl Dossier {
    pub fn new(id: DossierId) -> Self {
        Self {
            id,
            status: DossierStatus::Draft,
            raw_extraction: None,
            fields: DossierFields::default(),
        }
    }
}

/// Partial update merged server-side by the repository: only `Some` values
/// replace what is stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DossierUpdate {
    #[serde(default)]
    pub status: Option<DossierStatus>,
    #[serde(default)]
    pub raw_extraction: Option<Value>,
    #[serde(default)]
    pub fields: DossierFields,
}

/// Recorded when the computed charge estimate and the AI-reported charge
/// disagree by more than five percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChargeDiscrepancy {
    pub estimated_charge: f64,
    pub ai_reported_charge: f64,
    pub difference_pct: f64,
}

/// The ~60 flattened scalars of a dossier, across four domains. Every field
/// is optional; `merge` applies Some-wins semantics so the pipeline can send
/// sparse updates without clobbering validated values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DossierFields {
    // Property / lot
    pub lot_number: Option<String>,
    pub property_address: Option<String>,
    pub building: Option<String>,
    pub floor: Option<String>,
    pub lot_description: Option<String>,
    pub annex_lots: Option<String>,
    pub property_usage: Option<String>,
    pub carrez_area_m2: Option<f64>,
    pub construction_period: Option<String>,

    // Co-ownership
    pub syndicate_name: Option<String>,
    pub syndic_name: Option<String>,
    pub syndic_address: Option<String>,
    pub lot_share: Option<f64>,
    pub total_share: Option<f64>,
    pub total_lots: Option<f64>,
    pub residential_lots: Option<f64>,
    pub bylaws_date: Option<String>,
    pub bylaws_amendment_count: Option<f64>,
    pub fiche_synthetique_date: Option<String>,

    // Financial
    pub annual_budget: Option<f64>,
    /// Final recurring charge: the computed estimate when available,
    /// otherwise the AI-reported value.
    pub recurring_charge: Option<f64>,
    pub ai_reported_charge: Option<f64>,
    pub estimated_charge: Option<f64>,
    pub charge_discrepancy_pct: Option<f64>,
    pub prior_year_budget_n1: Option<f64>,
    pub prior_year_budget_n2: Option<f64>,
    pub advance_provisions: Option<f64>,
    pub works_fund_balance: Option<f64>,
    pub works_fund_contribution: Option<f64>,
    pub seller_unpaid_charges: Option<f64>,
    pub supplier_debt: Option<f64>,
    pub voted_works_amount: Option<f64>,
    pub litigation_provision: Option<f64>,
    pub last_regularization_date: Option<String>,
    pub last_fund_call_date: Option<String>,

    // Legal / procedural
    pub last_assembly_date: Option<String>,
    pub previous_assembly_date: Option<String>,
    pub pending_procedures: Option<String>,
    pub syndic_mandate_end: Option<String>,
    pub insurance_policy: Option<String>,
    pub voted_works_summary: Option<String>,
    pub preemption_notice: Option<String>,
    pub edd_date: Option<String>,

    // Technical diagnostics
    pub energy_class: Option<char>,
    pub ges_class: Option<char>,
    pub dpe_date: Option<String>,
    pub dpe_certificate_id: Option<String>,
    pub asbestos_present: Option<String>,
    pub asbestos_report_date: Option<String>,
    pub lead_report_date: Option<String>,
    pub electricity_report_date: Option<String>,
    pub gas_report_date: Option<String>,
    pub termites_report_date: Option<String>,
    pub erp_date: Option<String>,
    pub carrez_certificate_date: Option<String>,
    pub dtg_date: Option<String>,
}

macro_rules! merge_fields {
    ($dst:expr, $src:expr, [$($field:ident),* $(,)?]) => {
        $(
            if let Some(value) = $src.$field {
                $dst.$field = Some(value);
            }
        )*
    };
}

impl DossierFields {
    /// Apply Some-wins merge semantics, mirroring the server-side merge of
    /// the hosted persistence store.
    pub fn merge(&mut self, update: DossierFields) {
        merge_fields!(
            self,
            update,
            [
                lot_number,
                property_address,
                building,
                floor,
                lot_description,
                annex_lots,
                property_usage,
                carrez_area_m2,
                construction_period,
                syndicate_name,
                syndic_name,
                syndic_address,
                lot_share,
                total_share,
                total_lots,
                residential_lots,
                bylaws_date,
                bylaws_amendment_count,
                fiche_synthetique_date,
                annual_budget,
                recurring_charge,
                ai_reported_charge,
                estimated_charge,
                charge_discrepancy_pct,
                prior_year_budget_n1,
                prior_year_budget_n2,
                advance_provisions,
                works_fund_balance,
                works_fund_contribution,
                seller_unpaid_charges,
                supplier_debt,
                voted_works_amount,
                litigation_provision,
                last_regularization_date,
                last_fund_call_date,
                last_assembly_date,
                previous_assembly_date,
                pending_procedures,
                syndic_mandate_end,
                insurance_policy,
                voted_works_summary,
                preemption_notice,
                edd_date,
                energy_class,
                ges_class,
                dpe_date,
                dpe_certificate_id,
                asbestos_present,
                asbestos_report_date,
                lead_report_date,
                electricity_report_date,
                gas_report_date,
                termites_report_date,
                erp_date,
                carrez_certificate_date,
                dtg_date,
            ]
        );
    }

    pub fn discrepancy(&self) -> Option<ChargeDiscrepancy> {
        match (
            self.estimated_charge,
            self.ai_reported_charge,
            self.charge_discrepancy_pct,
        ) {
            (Some(estimated_charge), Some(ai_reported_charge), Some(difference_pct)) => {
                Some(ChargeDiscrepancy {
                    estimated_charge,
                    ai_reported_charge,
                    difference_pct,
                })
            }
            _ => None,
        }
    }
}
