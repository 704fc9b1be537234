use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::model::{
    AnomalySeverity, AnomalyStatistics, AnomalyStatus, AnomalyType, ReconciliationAnomaly,
};
use crate::money::Money;

/// Tally anomalies. `total_records` is the number of input records on both
/// sides (malformed ones included) and drives `anomaly_rate`.
pub fn compute_statistics(
    anomalies: &[ReconciliationAnomaly],
    total_records: usize,
) -> AnomalyStatistics {
    let mut by_type: BTreeMap<AnomalyType, usize> =
        AnomalyType::ALL.iter().map(|t| (*t, 0)).collect();
    let mut by_severity: BTreeMap<AnomalySeverity, usize> =
        AnomalySeverity::ALL.iter().map(|s| (*s, 0)).collect();
    let mut by_status: BTreeMap<AnomalyStatus, usize> =
        AnomalyStatus::ALL.iter().map(|s| (*s, 0)).collect();

    let mut total_amount_mismatch = Money::ZERO;
    let mut orders: HashSet<&str> = HashSet::new();

    for a in anomalies {
        *by_type.entry(a.anomaly_type).or_insert(0) += 1;
        *by_severity.entry(a.severity).or_insert(0) += 1;
        *by_status.entry(a.status).or_insert(0) += 1;

        if let Some(diff) = a.amount_difference {
            total_amount_mismatch += diff.abs();
        }
        if let Some(order_no) = a.order_no() {
            orders.insert(order_no);
        }
    }

    let anomaly_rate = if total_records > 0 {
        anomalies.len() as f64 / total_records as f64 * 100.0
    } else {
        0.0
    };

    AnomalyStatistics {
        total_anomalies: anomalies.len(),
        by_type,
        by_severity,
        by_status,
        total_amount_mismatch,
        total_transactions_with_anomalies: orders.len(),
        anomaly_rate,
    }
}

// ---------------------------------------------------------------------------
// Anomaly report
// ---------------------------------------------------------------------------

const TOP_ISSUES: usize = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyReport {
    pub summary: String,
    pub statistics: AnomalyStatistics,
    /// Most severe anomalies first; ties keep detection order.
    pub top_issues: Vec<ReconciliationAnomaly>,
}

pub fn anomaly_report(anomalies: &[ReconciliationAnomaly], total_records: usize) -> AnomalyReport {
    let statistics = compute_statistics(anomalies, total_records);

    let mut ranked: Vec<&ReconciliationAnomaly> = anomalies.iter().collect();
    // stable sort keeps detection order within a severity
    ranked.sort_by(|a, b| b.severity.cmp(&a.severity));
    let top_issues = ranked.into_iter().take(TOP_ISSUES).cloned().collect();

    let count = |s: AnomalySeverity| statistics.by_severity.get(&s).copied().unwrap_or(0);
    let summary = format!(
        "{} anomalies detected: {} critical, {} high, {} medium, {} low",
        statistics.total_anomalies,
        count(AnomalySeverity::Critical),
        count(AnomalySeverity::High),
        count(AnomalySeverity::Medium),
        count(AnomalySeverity::Low),
    );

    AnomalyReport {
        summary,
        statistics,
        top_issues,
    }
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

pub fn type_label(anomaly_type: AnomalyType) -> &'static str {
    match anomaly_type {
        AnomalyType::SystemOnly => "system-only transaction",
        AnomalyType::ExternalOnly => "external-only transaction",
        AnomalyType::AmountMismatch => "amount mismatch",
        AnomalyType::DateMismatch => "date mismatch",
        AnomalyType::StatusMismatch => "status mismatch",
        AnomalyType::PaymentMethodMismatch => "payment method mismatch",
        AnomalyType::CustomerInfoMismatch => "customer info mismatch",
        AnomalyType::DuplicateTransaction => "duplicate transaction",
        AnomalyType::SuspiciousTransaction => "suspicious transaction",
        AnomalyType::InvalidData => "invalid data",
    }
}

/// Display text and color for a severity badge.
pub fn severity_label(severity: AnomalySeverity) -> (&'static str, &'static str) {
    match severity {
        AnomalySeverity::Low => ("low risk", "green"),
        AnomalySeverity::Medium => ("medium risk", "yellow"),
        AnomalySeverity::High => ("high risk", "orange"),
        AnomalySeverity::Critical => ("critical risk", "red"),
    }
}

pub fn anomaly_status_label(status: AnomalyStatus) -> &'static str {
    match status {
        AnomalyStatus::Open => "open",
        AnomalyStatus::InProgress => "in progress",
        AnomalyStatus::Resolved => "resolved",
        AnomalyStatus::Dismissed => "dismissed",
    }
}
