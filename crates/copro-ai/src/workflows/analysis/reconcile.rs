//! Financial reconciliation of the extracted figures.
//!
//! The charge the seller will actually pay is recomputed from tantièmes
//! (lot share over total share applied to the annual budget) and compared
//! against what the model read off the paperwork. The recomputed estimate
//! wins when both exist; the model's figure only fills the gap.

use super::coerce::to_number;
use super::dossier::ChargeDiscrepancy;
use super::schema::StructuredExtraction;

/// Relative gap between estimate and reported charge above which a
/// discrepancy is raised, in percent.
const DISCREPANCY_THRESHOLD_PCT: f64 = 5.0;

/// Prior-year budgets drifting further than this from the estimate suggest
/// the tantièmes were misread.
const PRIOR_YEAR_DRIFT_PCT: f64 = 20.0;

/// Advance provisions above this multiple of the recurring charge deserve a
/// second look.
const PROVISION_RATIO: f64 = 1.1;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationInput {
    pub annual_budget: Option<f64>,
    pub lot_share: Option<f64>,
    pub total_share: Option<f64>,
    pub ai_reported_charge: Option<f64>,
    pub prior_year_budget_n1: Option<f64>,
    pub prior_year_budget_n2: Option<f64>,
    pub advance_provisions: Option<f64>,
}

impl ReconciliationInput {
    pub fn from_extraction(extraction: &StructuredExtraction) -> Self {
        let financial = &extraction.financial;
        let co_ownership = &extraction.co_ownership;
        Self {
            annual_budget: financial.annual_budget.as_ref().and_then(to_number),
            lot_share: co_ownership.lot_share.as_ref().and_then(to_number),
            total_share: co_ownership.total_share.as_ref().and_then(to_number),
            ai_reported_charge: financial.recurring_charge_lot.as_ref().and_then(to_number),
            prior_year_budget_n1: financial.prior_year_budget_n1.as_ref().and_then(to_number),
            prior_year_budget_n2: financial.prior_year_budget_n2.as_ref().and_then(to_number),
            advance_provisions: financial.advance_provisions.as_ref().and_then(to_number),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub final_charge: Option<f64>,
    pub estimated_charge: Option<f64>,
    pub discrepancy: Option<ChargeDiscrepancy>,
    pub alerts: Vec<String>,
}

pub fn reconcile_charges(input: &ReconciliationInput) -> Reconciliation {
    let estimated_charge = match (input.lot_share, input.total_share, input.annual_budget) {
        (Some(lot), Some(total), Some(budget)) if total > 0.0 => {
            Some(round2(lot / total * budget))
        }
        _ => None,
    };

    let mut alerts = Vec::new();
    let mut discrepancy = None;

    if let (Some(estimated), Some(reported)) = (estimated_charge, input.ai_reported_charge) {
        if estimated > 0.0 && reported > 0.0 {
            let difference_pct = round2((estimated - reported).abs() / estimated * 100.0);
            if difference_pct > DISCREPANCY_THRESHOLD_PCT {
                alerts.push(format!(
                    "Écart de {difference_pct}% entre la charge estimée par tantièmes \
                     ({estimated} €) et la charge relevée dans les documents ({reported} €)."
                ));
                discrepancy = Some(ChargeDiscrepancy {
                    estimated_charge: estimated,
                    ai_reported_charge: reported,
                    difference_pct,
                });
            }
        }
    }

    if let Some(estimated) = estimated_charge.filter(|c| *c > 0.0) {
        for (label, prior) in [
            ("N-1", input.prior_year_budget_n1),
            ("N-2", input.prior_year_budget_n2),
        ] {
            if let Some(prior) = prior.filter(|p| *p > 0.0) {
                let drift_pct = round2((estimated - prior).abs() / estimated * 100.0);
                if drift_pct > PRIOR_YEAR_DRIFT_PCT {
                    alerts.push(format!(
                        "Le budget {label} ({prior} €) s'écarte de {drift_pct}% de la charge \
                         estimée ; vérifier les tantièmes."
                    ));
                }
            }
        }

        if let Some(provisions) = input.advance_provisions {
            if provisions > estimated * PROVISION_RATIO {
                alerts.push(format!(
                    "Provisions d'avance ({provisions} €) supérieures à la charge courante \
                     estimée ({estimated} €) ; vérifier le pré-état daté."
                ));
            }
        }
    }

    Reconciliation {
        final_charge: estimated_charge.or(input.ai_reported_charge),
        estimated_charge,
        discrepancy,
        alerts,
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
