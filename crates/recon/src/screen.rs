//! Single-side screens: repeated transactions and outlier amounts.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::classify::Finding;
use crate::model::{AnomalyDetail, AnomalySeverity, AnomalyType, Side, TransactionRecord};
use crate::money::Money;

/// Flag every record after the first that shares
/// `(order_no, amount, transaction_date)` with an earlier one on the same side.
pub fn detect_duplicates(side: Side, records: &[TransactionRecord]) -> Vec<Finding> {
    let mut group_sizes: HashMap<(&str, Money, NaiveDate), usize> = HashMap::new();
    for r in records {
        *group_sizes
            .entry((r.order_no.as_str(), r.amount, r.transaction_date))
            .or_insert(0) += 1;
    }

    let mut seen: HashMap<(&str, Money, NaiveDate), usize> = HashMap::new();
    let mut findings = Vec::new();

    for r in records {
        let key = (r.order_no.as_str(), r.amount, r.transaction_date);
        let occurrence = seen.entry(key).or_insert(0);
        *occurrence += 1;
        if *occurrence == 1 {
            continue;
        }

        let group_size = group_sizes.get(&key).copied().unwrap_or(*occurrence);
        let duplicate_key = format!("{}_{}_{}", r.order_no, r.amount, r.transaction_date);
        findings.push(side_finding(
            side,
            r,
            AnomalyType::DuplicateTransaction,
            AnomalySeverity::High,
            format!(
                "duplicate {side} transaction: order {}, amount {}, date {} (occurrence {} of {group_size})",
                r.order_no, r.amount, r.transaction_date, *occurrence
            ),
            AnomalyDetail::DuplicateTransaction {
                order_no: r.order_no.clone(),
                side,
                occurrence: *occurrence,
                group_size,
                duplicate_key,
            },
        ));
    }

    findings
}

/// Population mean and standard deviation of amounts, in major units.
/// `None` for an empty side.
pub fn amount_moments(records: &[TransactionRecord]) -> Option<(f64, f64)> {
    if records.is_empty() {
        return None;
    }
    let n = records.len() as f64;
    let mean = records.iter().map(|r| r.amount.to_f64()).sum::<f64>() / n;
    let variance = records
        .iter()
        .map(|r| (r.amount.to_f64() - mean).powi(2))
        .sum::<f64>()
        / n;
    Some((mean, variance.sqrt()))
}

/// Flag amounts strictly above `mean + z * stddev` for this side.
pub fn detect_suspicious(side: Side, records: &[TransactionRecord], z: f64) -> Vec<Finding> {
    let Some((mean, std_dev)) = amount_moments(records) else {
        return Vec::new();
    };
    let threshold = mean + z * std_dev;

    records
        .iter()
        .filter(|r| r.amount.to_f64() > threshold)
        .map(|r| {
            side_finding(
                side,
                r,
                AnomalyType::SuspiciousTransaction,
                AnomalySeverity::Medium,
                format!(
                    "suspicious {side} transaction: order {}, amount {} exceeds {threshold:.2} (mean {mean:.2} + {z} x stddev {std_dev:.2})",
                    r.order_no, r.amount
                ),
                AnomalyDetail::SuspiciousTransaction {
                    order_no: r.order_no.clone(),
                    side,
                    mean,
                    std_dev,
                    threshold,
                },
            )
        })
        .collect()
}

fn side_finding(
    side: Side,
    record: &TransactionRecord,
    anomaly_type: AnomalyType,
    severity: AnomalySeverity,
    description: String,
    detail: AnomalyDetail,
) -> Finding {
    let (system, external) = match side {
        Side::System => (Some(record.clone()), None),
        Side::External => (None, Some(record.clone())),
    };
    Finding {
        anomaly_type,
        severity,
        description,
        system,
        external,
        amount_difference: None,
        date_difference_days: None,
        detail,
    }
}
