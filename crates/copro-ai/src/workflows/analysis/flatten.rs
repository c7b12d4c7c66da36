//! Flattens a [`StructuredExtraction`] into [`DossierFields`].
//!
//! Every leaf goes through the coercion helpers so numbers in French
//! formatting and DD/MM/YYYY dates land normalized. Identity the seller
//! already provided (lot number, address) is never overwritten by what the
//! model read.

use serde_json::Value;

use super::coerce::{to_energy_class_letter, to_iso_date, to_number};
use super::domain::AnalysisContext;
use super::dossier::DossierFields;
use super::reconcile::Reconciliation;
use super::schema::StructuredExtraction;

pub fn flatten_extraction(
    extraction: &StructuredExtraction,
    context: &AnalysisContext,
    reconciliation: &Reconciliation,
) -> DossierFields {
    let property = &extraction.property;
    let co_ownership = &extraction.co_ownership;
    let financial = &extraction.financial;
    let legal = &extraction.legal;
    let diagnostics = &extraction.diagnostics;

    DossierFields {
        lot_number: context
            .lot_number
            .clone()
            .or_else(|| property.lot_number.as_ref().and_then(to_text)),
        property_address: context
            .property_address
            .clone()
            .or_else(|| property.property_address.clone()),
        building: property.building.clone(),
        floor: property.floor.as_ref().and_then(to_text),
        lot_description: property.lot_description.clone(),
        annex_lots: property.annex_lots.clone(),
        property_usage: property.property_usage.clone(),
        carrez_area_m2: property.carrez_area_m2.as_ref().and_then(to_number),
        construction_period: property.construction_period.clone(),

        syndicate_name: co_ownership.syndicate_name.clone(),
        syndic_name: co_ownership.syndic_name.clone(),
        syndic_address: co_ownership.syndic_address.clone(),
        lot_share: co_ownership.lot_share.as_ref().and_then(to_number),
        total_share: co_ownership.total_share.as_ref().and_then(to_number),
        total_lots: co_ownership.total_lots.as_ref().and_then(to_number),
        residential_lots: co_ownership.residential_lots.as_ref().and_then(to_number),
        bylaws_date: co_ownership.bylaws_date.as_ref().and_then(to_iso_date),
        bylaws_amendment_count: co_ownership
            .bylaws_amendment_count
            .as_ref()
            .and_then(to_number),
        fiche_synthetique_date: co_ownership
            .fiche_synthetique_date
            .as_ref()
            .and_then(to_iso_date),

        annual_budget: financial.annual_budget.as_ref().and_then(to_number),
        recurring_charge: reconciliation.final_charge,
        ai_reported_charge: financial.recurring_charge_lot.as_ref().and_then(to_number),
        estimated_charge: reconciliation.estimated_charge,
        charge_discrepancy_pct: reconciliation
            .discrepancy
            .as_ref()
            .map(|gap| gap.difference_pct),
        prior_year_budget_n1: financial.prior_year_budget_n1.as_ref().and_then(to_number),
        prior_year_budget_n2: financial.prior_year_budget_n2.as_ref().and_then(to_number),
        advance_provisions: financial.advance_provisions.as_ref().and_then(to_number),
        works_fund_balance: financial.works_fund_balance.as_ref().and_then(to_number),
        works_fund_contribution: financial
            .works_fund_contribution
            .as_ref()
            .and_then(to_number),
        seller_unpaid_charges: financial.seller_unpaid_charges.as_ref().and_then(to_number),
        supplier_debt: financial.supplier_debt.as_ref().and_then(to_number),
        voted_works_amount: financial.voted_works_amount.as_ref().and_then(to_number),
        litigation_provision: financial.litigation_provision.as_ref().and_then(to_number),
        last_regularization_date: financial
            .last_regularization_date
            .as_ref()
            .and_then(to_iso_date),
        last_fund_call_date: financial.last_fund_call_date.as_ref().and_then(to_iso_date),

        last_assembly_date: legal.last_assembly_date.as_ref().and_then(to_iso_date),
        previous_assembly_date: legal.previous_assembly_date.as_ref().and_then(to_iso_date),
        pending_procedures: legal.pending_procedures.clone(),
        syndic_mandate_end: legal.syndic_mandate_end.as_ref().and_then(to_iso_date),
        insurance_policy: legal.insurance_policy.clone(),
        voted_works_summary: legal.voted_works_summary.clone(),
        preemption_notice: legal.preemption_notice.clone(),
        edd_date: legal.edd_date.as_ref().and_then(to_iso_date),

        energy_class: diagnostics
            .energy_class
            .as_ref()
            .and_then(to_energy_class_letter),
        ges_class: diagnostics
            .ges_class
            .as_ref()
            .and_then(to_energy_class_letter),
        dpe_date: diagnostics.dpe_date.as_ref().and_then(to_iso_date),
        dpe_certificate_id: diagnostics.dpe_certificate_id.clone(),
        asbestos_present: diagnostics.asbestos_present.clone(),
        asbestos_report_date: diagnostics
            .asbestos_report_date
            .as_ref()
            .and_then(to_iso_date),
        lead_report_date: diagnostics.lead_report_date.as_ref().and_then(to_iso_date),
        electricity_report_date: diagnostics
            .electricity_report_date
            .as_ref()
            .and_then(to_iso_date),
        gas_report_date: diagnostics.gas_report_date.as_ref().and_then(to_iso_date),
        termites_report_date: diagnostics
            .termites_report_date
            .as_ref()
            .and_then(to_iso_date),
        erp_date: diagnostics.erp_date.as_ref().and_then(to_iso_date),
        carrez_certificate_date: diagnostics
            .carrez_certificate_date
            .as_ref()
            .and_then(to_iso_date),
        dtg_date: diagnostics.dtg_date.as_ref().and_then(to_iso_date),
    }
}

/// Merges reconciliation alerts into the raw payload's `meta.alerts` array so
/// the stored snapshot matches what the dossier reports. Alerts already
/// present are not duplicated.
pub fn append_alerts(raw: &mut Value, alerts: &[String]) {
    if alerts.is_empty() {
        return;
    }
    let Value::Object(root) = raw else {
        return;
    };
    let meta = root
        .entry("meta")
        .or_insert_with(|| Value::Object(Default::default()));
    let Value::Object(meta) = meta else {
        return;
    };
    let slot = meta
        .entry("alerts")
        .or_insert_with(|| Value::Array(Vec::new()));
    let Value::Array(existing) = slot else {
        return;
    };
    for alert in alerts {
        if !existing.iter().any(|v| v.as_str() == Some(alert)) {
            existing.push(Value::String(alert.clone()));
        }
    }
}

fn to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
