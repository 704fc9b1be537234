use crate::config::AnomalyDetectionConfig;
use crate::matcher::MatchedPair;
use crate::model::{AnomalyDetail, AnomalySeverity, AnomalyType, TransactionRecord};
use crate::money::Money;

/// A detected discrepancy before it is stamped with id, batch and time.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub anomaly_type: AnomalyType,
    pub severity: AnomalySeverity,
    pub description: String,
    pub system: Option<TransactionRecord>,
    pub external: Option<TransactionRecord>,
    pub amount_difference: Option<Money>,
    pub date_difference_days: Option<i64>,
    pub detail: AnomalyDetail,
}

impl Finding {
    fn for_pair(
        pair: &MatchedPair<'_>,
        anomaly_type: AnomalyType,
        severity: AnomalySeverity,
        description: String,
        detail: AnomalyDetail,
    ) -> Self {
        Self {
            anomaly_type,
            severity,
            description,
            system: Some(pair.system.clone()),
            external: Some(pair.external.clone()),
            amount_difference: None,
            date_difference_days: None,
            detail,
        }
    }
}

/// Run every field check on a matched pair. Checks are independent; a pair
/// yields zero to five findings, always in the order amount, date, status,
/// payment method, customer.
pub fn compare_pair(pair: &MatchedPair<'_>, config: &AnomalyDetectionConfig) -> Vec<Finding> {
    [
        check_amount(pair, config),
        check_date(pair, config),
        check_status(pair),
        check_payment_method(pair),
        check_customer(pair),
    ]
    .into_iter()
    .flatten()
    .collect()
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// Mismatch only when the difference exceeds both the absolute and the
/// percentage tolerance. Percentage is relative to the external amount.
pub fn check_amount(pair: &MatchedPair<'_>, config: &AnomalyDetectionConfig) -> Option<Finding> {
    let (sys, ext) = (pair.system, pair.external);
    let diff = (sys.amount - ext.amount).abs();
    let pct = diff.percent_of(ext.amount.abs());

    let over_abs = diff > config.amount_tolerance;
    // Zero external amount: any difference is infinitely large in relative terms.
    let over_pct = pct.map_or(true, |p| p > config.amount_tolerance_percentage);
    if !(over_abs && over_pct) {
        return None;
    }

    let severity = amount_severity(diff, pct);
    let pct_text = pct.map_or_else(|| "n/a".to_string(), |p| format!("{p:.2}%"));
    let mut finding = Finding::for_pair(
        pair,
        AnomalyType::AmountMismatch,
        severity,
        format!(
            "amount mismatch for order {}: system {}, external {}, difference {} ({pct_text})",
            sys.order_no, sys.amount, ext.amount, diff
        ),
        AnomalyDetail::AmountMismatch {
            order_no: sys.order_no.clone(),
            percentage_difference: pct,
        },
    );
    finding.amount_difference = Some(diff);
    Some(finding)
}

/// Tiered on absolute difference OR percentage, highest tier wins.
pub fn amount_severity(diff: Money, pct: Option<f64>) -> AnomalySeverity {
    let pct = pct.unwrap_or(f64::INFINITY);
    if diff > Money::from_major(1000) || pct > 10.0 {
        AnomalySeverity::Critical
    } else if diff > Money::from_major(100) || pct > 5.0 {
        AnomalySeverity::High
    } else if diff > Money::from_major(10) || pct > 2.0 {
        AnomalySeverity::Medium
    } else {
        AnomalySeverity::Low
    }
}

// ---------------------------------------------------------------------------
// Date
// ---------------------------------------------------------------------------

pub fn check_date(pair: &MatchedPair<'_>, config: &AnomalyDetectionConfig) -> Option<Finding> {
    let (sys, ext) = (pair.system, pair.external);
    let days = (sys.transaction_date - ext.transaction_date).num_days().abs();
    if days <= i64::from(config.date_tolerance_days) {
        return None;
    }

    let severity = if days > 7 {
        AnomalySeverity::Medium
    } else {
        AnomalySeverity::Low
    };
    let mut finding = Finding::for_pair(
        pair,
        AnomalyType::DateMismatch,
        severity,
        format!(
            "date mismatch for order {}: system {}, external {}, {days} day(s) apart",
            sys.order_no, sys.transaction_date, ext.transaction_date
        ),
        AnomalyDetail::DateMismatch {
            order_no: sys.order_no.clone(),
            system_date: sys.transaction_date,
            external_date: ext.transaction_date,
        },
    );
    finding.date_difference_days = Some(days);
    Some(finding)
}

// ---------------------------------------------------------------------------
// Exact-match fields
// ---------------------------------------------------------------------------

pub fn check_status(pair: &MatchedPair<'_>) -> Option<Finding> {
    let (sys, ext) = (pair.system, pair.external);
    if sys.status == ext.status {
        return None;
    }
    Some(Finding::for_pair(
        pair,
        AnomalyType::StatusMismatch,
        AnomalySeverity::Medium,
        format!(
            "status mismatch for order {}: system '{}', external '{}'",
            sys.order_no, sys.status, ext.status
        ),
        AnomalyDetail::StatusMismatch {
            order_no: sys.order_no.clone(),
            system_status: sys.status.clone(),
            external_status: ext.status.clone(),
        },
    ))
}

pub fn check_payment_method(pair: &MatchedPair<'_>) -> Option<Finding> {
    let (sys, ext) = (pair.system, pair.external);
    if sys.payment_method == ext.payment_method {
        return None;
    }
    Some(Finding::for_pair(
        pair,
        AnomalyType::PaymentMethodMismatch,
        AnomalySeverity::Low,
        format!(
            "payment method mismatch for order {}: system '{}', external '{}'",
            sys.order_no, sys.payment_method, ext.payment_method
        ),
        AnomalyDetail::PaymentMethodMismatch {
            order_no: sys.order_no.clone(),
            system_method: sys.payment_method.clone(),
            external_method: ext.payment_method.clone(),
        },
    ))
}

pub fn check_customer(pair: &MatchedPair<'_>) -> Option<Finding> {
    let (sys, ext) = (pair.system, pair.external);
    if sys.customer_name == ext.customer_name {
        return None;
    }
    Some(Finding::for_pair(
        pair,
        AnomalyType::CustomerInfoMismatch,
        AnomalySeverity::Medium,
        format!(
            "customer mismatch for order {}: system '{}', external '{}'",
            sys.order_no, sys.customer_name, ext.customer_name
        ),
        AnomalyDetail::CustomerInfoMismatch {
            order_no: sys.order_no.clone(),
            system_customer: sys.customer_name.clone(),
            external_customer: ext.customer_name.clone(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn tx(id: &str, amount: &str, date: &str) -> TransactionRecord {
        TransactionRecord {
            id: id.into(),
            order_no: "SO1".into(),
            customer_id: None,
            customer_name: "Acme".into(),
            amount: Money::parse(amount).unwrap(),
            transaction_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            payment_method: "card".into(),
            status: "paid".into(),
            reference_no: None,
        }
    }

    fn zero_tolerance() -> AnomalyDetectionConfig {
        AnomalyDetectionConfig {
            amount_tolerance: Money::ZERO,
            amount_tolerance_percentage: 0.0,
            ..AnomalyDetectionConfig::default()
        }
    }

    fn severity_for(sys: &str, ext: &str, config: &AnomalyDetectionConfig) -> Option<AnomalySeverity> {
        let s = tx("s", sys, "2025-01-15");
        let e = tx("e", ext, "2025-01-15");
        check_amount(&MatchedPair { system: &s, external: &e }, config).map(|f| f.severity)
    }

    #[test]
    fn amount_tiers_by_absolute_difference() {
        // Large base keeps the percentage far below every tier.
        let cfg = zero_tolerance();
        let base = "10000000.00";
        assert_eq!(severity_for("10001000.01", base, &cfg), Some(AnomalySeverity::Critical));
        assert_eq!(severity_for("10001000.00", base, &cfg), Some(AnomalySeverity::High));
        assert_eq!(severity_for("10000100.01", base, &cfg), Some(AnomalySeverity::High));
        assert_eq!(severity_for("10000010.01", base, &cfg), Some(AnomalySeverity::Medium));
        assert_eq!(severity_for("10000010.00", base, &cfg), Some(AnomalySeverity::Low));
    }

    #[test]
    fn amount_tiers_by_percentage() {
        let cfg = zero_tolerance();
        assert_eq!(severity_for("111", "100", &cfg), Some(AnomalySeverity::Critical));
        assert_eq!(severity_for("106", "100", &cfg), Some(AnomalySeverity::High));
        assert_eq!(severity_for("103", "100", &cfg), Some(AnomalySeverity::Medium));
        assert_eq!(severity_for("101", "100", &cfg), Some(AnomalySeverity::Low));
    }

    #[test]
    fn amount_needs_both_tolerances_exceeded() {
        let cfg = AnomalyDetectionConfig {
            amount_tolerance: Money::from_major(5),
            amount_tolerance_percentage: 0.5,
            ..AnomalyDetectionConfig::default()
        };
        // diff 1.00 is under the absolute tolerance even though 1% > 0.5%
        assert_eq!(severity_for("101", "100", &cfg), None);
        // diff 6.00 over absolute, but 0.06% under percentage
        assert_eq!(severity_for("10006", "10000", &cfg), None);
        // both exceeded
        assert_eq!(severity_for("106", "100", &cfg), Some(AnomalySeverity::High));
    }

    #[test]
    fn amount_difference_is_exact() {
        let s = tx("s", "5000", "2025-01-15");
        let e = tx("e", "4999.99", "2025-01-15");
        let f = check_amount(&MatchedPair { system: &s, external: &e }, &zero_tolerance()).unwrap();
        assert_eq!(f.amount_difference, Some(Money::from_cents(1)));
        assert_eq!(f.severity, AnomalySeverity::Low);
    }

    #[test]
    fn zero_external_amount_is_critical() {
        let cfg = zero_tolerance();
        assert_eq!(severity_for("0.01", "0", &cfg), Some(AnomalySeverity::Critical));
        assert_eq!(severity_for("0", "0", &cfg), None);
    }

    #[test]
    fn date_tolerance_and_tiers() {
        let cfg = AnomalyDetectionConfig::default(); // 1 day
        let s = tx("s", "1", "2025-01-15");
        let near = tx("e", "1", "2025-01-16");
        let mid = tx("e", "1", "2025-01-20");
        let far = tx("e", "1", "2025-01-05");
        assert!(check_date(&MatchedPair { system: &s, external: &near }, &cfg).is_none());

        let f = check_date(&MatchedPair { system: &s, external: &mid }, &cfg).unwrap();
        assert_eq!(f.severity, AnomalySeverity::Low);
        assert_eq!(f.date_difference_days, Some(5));

        let f = check_date(&MatchedPair { system: &s, external: &far }, &cfg).unwrap();
        assert_eq!(f.severity, AnomalySeverity::Medium);
        assert_eq!(f.date_difference_days, Some(10));
    }

    #[test]
    fn one_pair_can_yield_all_five() {
        let s = tx("s", "100", "2025-01-01");
        let mut e = tx("e", "200", "2025-02-01");
        e.status = "refunded".into();
        e.payment_method = "wire".into();
        e.customer_name = "Acme Ltd".into();
        let findings = compare_pair(&MatchedPair { system: &s, external: &e }, &zero_tolerance());
        let types: Vec<AnomalyType> = findings.iter().map(|f| f.anomaly_type).collect();
        assert_eq!(
            types,
            vec![
                AnomalyType::AmountMismatch,
                AnomalyType::DateMismatch,
                AnomalyType::StatusMismatch,
                AnomalyType::PaymentMethodMismatch,
                AnomalyType::CustomerInfoMismatch,
            ]
        );
        assert!(findings.iter().all(|f| f.system.is_some() && f.external.is_some()));
        assert_eq!(findings[3].severity, AnomalySeverity::Low);
    }

    #[test]
    fn identical_pair_is_clean() {
        let s = tx("s", "100", "2025-01-01");
        let e = tx("e", "100", "2025-01-01");
        assert!(compare_pair(&MatchedPair { system: &s, external: &e }, &zero_tolerance()).is_empty());
    }
}
