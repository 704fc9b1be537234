use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{CrossValidationResult, CrossValidationType, ValidationStatus};
use crate::money::Money;

// ---------------------------------------------------------------------------
// Validation report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub total_results: usize,
    pub valid_results: usize,
    pub invalid_results: usize,
    pub warning_results: usize,
    pub not_applicable_results: usize,
    /// Sum of absolute differences.
    pub total_difference: Money,
    /// Result ids per status.
    pub by_status: BTreeMap<ValidationStatus, Vec<String>>,
    /// Result ids per validation type.
    pub by_type: BTreeMap<CrossValidationType, Vec<String>>,
    pub success_rate: f64,
    pub generated_at: DateTime<Utc>,
}

/// Summarize a validation batch. Pure: the same results and timestamp give
/// the same report.
pub fn generate_report(
    results: &[CrossValidationResult],
    generated_at: DateTime<Utc>,
) -> ValidationReport {
    let mut by_status: BTreeMap<ValidationStatus, Vec<String>> = BTreeMap::new();
    let mut by_type: BTreeMap<CrossValidationType, Vec<String>> = BTreeMap::new();
    let mut total_difference = Money::ZERO;

    for r in results {
        by_status.entry(r.status).or_default().push(r.id.clone());
        by_type.entry(r.validation_type).or_default().push(r.id.clone());
        total_difference += r.difference.abs();
    }

    let count = |s: ValidationStatus| by_status.get(&s).map_or(0, Vec::len);
    let valid_results = count(ValidationStatus::Valid);
    let success_rate = if results.is_empty() {
        0.0
    } else {
        valid_results as f64 / results.len() as f64 * 100.0
    };

    ValidationReport {
        total_results: results.len(),
        valid_results,
        invalid_results: count(ValidationStatus::Invalid),
        warning_results: count(ValidationStatus::Warning),
        not_applicable_results: count(ValidationStatus::NotApplicable),
        total_difference,
        success_rate,
        generated_at,
        by_status,
        by_type,
    }
}

// ---------------------------------------------------------------------------
// Difference statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifferenceStats {
    pub min_difference: Money,
    pub max_difference: Money,
    pub average_difference: f64,
    pub min_abs_difference: Money,
    pub max_abs_difference: Money,
    pub average_abs_difference: f64,
    pub median_difference: f64,
    /// Signed sum.
    pub total_difference: Money,
}

/// Spread of signed differences across results. `None` for no results.
pub fn difference_stats(results: &[CrossValidationResult]) -> Option<DifferenceStats> {
    let mut diffs: Vec<Money> = results.iter().map(|r| r.difference).collect();
    if diffs.is_empty() {
        return None;
    }
    diffs.sort();

    let n = diffs.len();
    let total: Money = diffs.iter().sum();
    let abs_total: Money = diffs.iter().map(|d| d.abs()).sum();
    let min_abs = diffs.iter().map(|d| d.abs()).min()?;
    let max_abs = diffs.iter().map(|d| d.abs()).max()?;

    let median = if n % 2 == 0 {
        (diffs[n / 2 - 1].to_f64() + diffs[n / 2].to_f64()) / 2.0
    } else {
        diffs[n / 2].to_f64()
    };

    Some(DifferenceStats {
        min_difference: diffs[0],
        max_difference: diffs[n - 1],
        average_difference: total.to_f64() / n as f64,
        min_abs_difference: min_abs,
        max_abs_difference: max_abs,
        average_abs_difference: abs_total.to_f64() / n as f64,
        median_difference: median,
        total_difference: total,
    })
}

// ---------------------------------------------------------------------------
// Suggestions and labels
// ---------------------------------------------------------------------------

/// Canned remediation hint for a result.
pub fn suggestion(status: ValidationStatus, validation_type: CrossValidationType) -> &'static str {
    use CrossValidationType as T;
    match (status, validation_type) {
        (ValidationStatus::Valid, _) => "Cross-check passed; no action needed.",
        (ValidationStatus::Warning, _) => {
            "Cross-check warning: investigate the cause of the difference and confirm whether an adjustment is needed."
        }
        (ValidationStatus::Invalid, T::OrderFinance) => {
            "Orders and finance records disagree: check order status and finance record completeness for unposted orders or duplicate postings."
        }
        (ValidationStatus::Invalid, T::InvoiceReceipt) => {
            "Invoices and receipts disagree: check issued invoices and receipt records for unpaid invoices or duplicate receipts."
        }
        (ValidationStatus::Invalid, T::ReconciliationLedger) => {
            "Reconciliation and general ledger disagree: check the reconciliation process and ledger entries for unrecorded adjustments or ledger errors."
        }
        (ValidationStatus::Invalid, T::FinanceTax) => {
            "Finance and tax records disagree: check tax rate settings and tax calculations for adjustments or calculation errors."
        }
        (ValidationStatus::Invalid, T::InventoryFinance) => {
            "Inventory and finance records disagree: check stock counts and costing for inventory discrepancies or costing errors."
        }
        (ValidationStatus::Invalid, T::Other) => {
            "Cross-check failed: review the related data, find the cause of the difference and adjust."
        }
        (ValidationStatus::NotApplicable, _) => {
            "Cross-check did not run: verify the data source and configuration."
        }
    }
}

/// Display text and color for a status badge.
pub fn status_label(status: ValidationStatus) -> (&'static str, &'static str) {
    match status {
        ValidationStatus::Valid => ("passed", "green"),
        ValidationStatus::Invalid => ("failed", "red"),
        ValidationStatus::Warning => ("warning", "yellow"),
        ValidationStatus::NotApplicable => ("not applicable", "gray"),
    }
}
