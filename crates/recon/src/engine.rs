use std::sync::Arc;

use crate::classify::{compare_pair, Finding};
use crate::clock::{Clock, IdGenerator, SystemClock, UuidIds};
use crate::config::AnomalyDetectionConfig;
use crate::ingest::{validate_side, InvalidRecord};
use crate::matcher::match_by_order_no;
use crate::model::{
    AnomalyDetail, AnomalyDetectionResult, AnomalySeverity, AnomalyStatus, AnomalyType,
    RawTransaction, ReconciliationAnomaly, Side, TransactionRecord,
};
use crate::screen::{detect_duplicates, detect_suspicious};
use crate::stats::compute_statistics;

/// Compares a system-of-record transaction set against an external one and
/// emits typed anomalies.
///
/// Stateless across calls: one detector can serve many batches, including
/// concurrently from several threads.
pub struct AnomalyDetector {
    config: AnomalyDetectionConfig,
    batch_id: String,
    reconciliation_id: String,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl AnomalyDetector {
    /// Detector on the wall clock with random ids and generated batch ids.
    pub fn new(config: AnomalyDetectionConfig) -> Self {
        let ids: Arc<dyn IdGenerator> = Arc::new(UuidIds);
        Self {
            batch_id: ids.next_id("batch"),
            reconciliation_id: ids.next_id("reconciliation"),
            config,
            clock: Arc::new(SystemClock),
            ids,
        }
    }

    pub fn with_batch(
        mut self,
        batch_id: impl Into<String>,
        reconciliation_id: impl Into<String>,
    ) -> Self {
        self.batch_id = batch_id.into();
        self.reconciliation_id = reconciliation_id.into();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(&self) -> &AnomalyDetectionConfig {
        &self.config
    }

    /// Validate raw input, flag malformed records as `invalid_data`, then
    /// run [`detect`](Self::detect) on what remains. Never fails.
    pub fn detect_raw(
        &self,
        system: &[RawTransaction],
        external: &[RawTransaction],
    ) -> AnomalyDetectionResult {
        let sys = validate_side(Side::System, system);
        let ext = validate_side(Side::External, external);

        let invalid: Vec<Finding> = sys
            .invalid
            .iter()
            .chain(ext.invalid.iter())
            .map(invalid_finding)
            .collect();

        self.run(
            &sys.records,
            &ext.records,
            invalid,
            system.len() + external.len(),
        )
    }

    /// Detect anomalies between two validated transaction sets.
    pub fn detect(
        &self,
        system: &[TransactionRecord],
        external: &[TransactionRecord],
    ) -> AnomalyDetectionResult {
        self.run(system, external, Vec::new(), system.len() + external.len())
    }

    fn run(
        &self,
        system: &[TransactionRecord],
        external: &[TransactionRecord],
        invalid: Vec<Finding>,
        total_records: usize,
    ) -> AnomalyDetectionResult {
        let detected_at = self.clock.now();
        log::debug!(
            "batch {}: detecting anomalies over {} system / {} external transactions",
            self.batch_id,
            system.len(),
            external.len()
        );

        let mut findings: Vec<Finding> = Vec::new();
        let pairs = match_by_order_no(system, external);

        for tx in &pairs.system_only {
            findings.push(only_finding(Side::System, tx));
        }
        for tx in &pairs.external_only {
            findings.push(only_finding(Side::External, tx));
        }
        for pair in &pairs.matched {
            findings.extend(compare_pair(pair, &self.config));
        }

        if self.config.detect_duplicates {
            findings.extend(detect_duplicates(Side::System, system));
            findings.extend(detect_duplicates(Side::External, external));
        }

        if self.config.detect_suspicious {
            let z = self.config.suspicious_threshold;
            findings.extend(detect_suspicious(Side::System, system, z));
            findings.extend(detect_suspicious(Side::External, external, z));
        }

        findings.extend(invalid);

        let anomalies: Vec<ReconciliationAnomaly> =
            findings.into_iter().map(|f| self.create_anomaly(f)).collect();
        let statistics = compute_statistics(&anomalies, total_records);

        log::debug!(
            "batch {}: {} anomalies ({} matched pairs, {} system-only, {} external-only)",
            self.batch_id,
            anomalies.len(),
            pairs.matched.len(),
            pairs.system_only.len(),
            pairs.external_only.len()
        );

        AnomalyDetectionResult {
            anomalies,
            statistics,
            config: self.config.clone(),
            detected_at,
        }
    }

    fn create_anomaly(&self, f: Finding) -> ReconciliationAnomaly {
        ReconciliationAnomaly {
            id: self.ids.next_id("anomaly"),
            batch_id: self.batch_id.clone(),
            reconciliation_id: self.reconciliation_id.clone(),
            anomaly_type: f.anomaly_type,
            severity: f.severity,
            description: f.description,
            system_transaction_id: f.system.as_ref().map(|t| t.id.clone()),
            external_transaction_id: f.external.as_ref().map(|t| t.id.clone()),
            system_transaction: f.system,
            external_transaction: f.external,
            amount_difference: f.amount_difference,
            date_difference_days: f.date_difference_days,
            detected_at: self.clock.now(),
            status: AnomalyStatus::Open,
            handled_by: None,
            handled_at: None,
            handling_reason: None,
            handling_result: None,
            metadata: f.detail,
        }
    }
}

fn only_finding(side: Side, tx: &TransactionRecord) -> Finding {
    let (anomaly_type, description, detail, system, external) = match side {
        Side::System => (
            AnomalyType::SystemOnly,
            format!("order {} exists in the system but not in the external source", tx.order_no),
            AnomalyDetail::SystemOnly { order_no: tx.order_no.clone() },
            Some(tx.clone()),
            None,
        ),
        Side::External => (
            AnomalyType::ExternalOnly,
            format!("order {} exists in the external source but not in the system", tx.order_no),
            AnomalyDetail::ExternalOnly { order_no: tx.order_no.clone() },
            None,
            Some(tx.clone()),
        ),
    };
    Finding {
        anomaly_type,
        severity: AnomalySeverity::Medium,
        description,
        system,
        external,
        amount_difference: None,
        date_difference_days: None,
        detail,
    }
}

fn invalid_finding(r: &InvalidRecord) -> Finding {
    let who = r
        .record_id
        .as_deref()
        .map_or_else(|| format!("#{}", r.index), |id| format!("'{id}'"));
    Finding {
        anomaly_type: AnomalyType::InvalidData,
        severity: r.severity,
        description: format!("invalid {} record {who}: {}", r.side, r.reason),
        system: None,
        external: None,
        amount_difference: None,
        date_difference_days: None,
        detail: AnomalyDetail::InvalidData {
            side: r.side,
            record_id: r.record_id.clone(),
            missing_fields: r.missing_fields.clone(),
            reason: r.reason.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, SequentialIds};
    use crate::model::RawAmount;
    use crate::money::Money;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn tx(id: &str, order_no: &str, amount: &str, date: &str) -> TransactionRecord {
        TransactionRecord {
            id: id.into(),
            order_no: order_no.into(),
            customer_id: None,
            customer_name: "Acme".into(),
            amount: Money::parse(amount).unwrap(),
            transaction_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            payment_method: "card".into(),
            status: "paid".into(),
            reference_no: None,
        }
    }

    fn detector(config: AnomalyDetectionConfig) -> AnomalyDetector {
        AnomalyDetector::new(config)
            .with_batch("batch_1", "recon_1")
            .with_clock(Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap())))
            .with_ids(Arc::new(SequentialIds::new()))
    }

    #[test]
    fn stamps_batch_ids_and_time() {
        let d = detector(AnomalyDetectionConfig::default());
        let result = d.detect(&[tx("s1", "SO1", "10", "2025-01-01")], &[]);
        assert_eq!(result.anomalies.len(), 1);
        let a = &result.anomalies[0];
        assert_eq!(a.id, "anomaly_1");
        assert_eq!(a.batch_id, "batch_1");
        assert_eq!(a.reconciliation_id, "recon_1");
        assert_eq!(a.anomaly_type, AnomalyType::SystemOnly);
        assert_eq!(a.severity, AnomalySeverity::Medium);
        assert_eq!(a.system_transaction_id.as_deref(), Some("s1"));
        assert!(a.external_transaction.is_none());
        assert_eq!(a.status, AnomalyStatus::Open);
        assert_eq!(a.detected_at, result.detected_at);
    }

    #[test]
    fn output_order_is_fixed() {
        let d = detector(AnomalyDetectionConfig::default());
        let system = vec![
            tx("s1", "SO1", "100", "2025-01-01"),
            tx("s2", "SO2", "100", "2025-01-01"),
            tx("s3", "SO2", "100", "2025-01-01"),
        ];
        let external = vec![tx("e1", "SO1", "200", "2025-01-01"), tx("e9", "SO9", "1", "2025-01-01")];
        let result = d.detect(&system, &external);
        let types: Vec<AnomalyType> = result.anomalies.iter().map(|a| a.anomaly_type).collect();
        assert_eq!(
            types,
            vec![
                AnomalyType::SystemOnly,
                AnomalyType::SystemOnly,
                AnomalyType::ExternalOnly,
                AnomalyType::AmountMismatch,
                AnomalyType::DuplicateTransaction,
            ]
        );
    }

    #[test]
    fn switches_disable_screens() {
        let config = AnomalyDetectionConfig {
            detect_duplicates: false,
            detect_suspicious: false,
            ..AnomalyDetectionConfig::default()
        };
        let d = detector(config);
        let system = vec![tx("s1", "SO1", "1", "2025-01-01"), tx("s2", "SO1", "1", "2025-01-01")];
        let result = d.detect(&system, &system);
        assert!(result.anomalies.is_empty());
    }

    #[test]
    fn raw_input_flags_invalid_records_and_keeps_going() {
        let good = RawTransaction {
            id: Some("s1".into()),
            order_no: Some("SO1".into()),
            customer_id: None,
            customer_name: Some("Acme".into()),
            amount: Some(RawAmount::Number(100.0)),
            transaction_date: Some("2025-01-15".into()),
            payment_method: Some("card".into()),
            status: Some("paid".into()),
            reference_no: None,
        };
        let bad = RawTransaction {
            id: Some("e2".into()),
            order_no: None,
            ..good.clone()
        };
        let d = detector(AnomalyDetectionConfig::default());
        let result = d.detect_raw(&[good.clone()], &[good, bad]);

        let invalid: Vec<&ReconciliationAnomaly> = result
            .anomalies
            .iter()
            .filter(|a| a.anomaly_type == AnomalyType::InvalidData)
            .collect();
        assert_eq!(invalid.len(), 1);
        assert!(invalid[0].description.contains("orderNo"));
        match &invalid[0].metadata {
            AnomalyDetail::InvalidData { side, record_id, missing_fields, .. } => {
                assert_eq!(*side, Side::External);
                assert_eq!(record_id.as_deref(), Some("e2"));
                assert_eq!(missing_fields, &vec!["orderNo".to_string()]);
            }
            other => panic!("unexpected detail {other:?}"),
        }
        // the valid pair still matched cleanly
        assert_eq!(result.anomalies.len(), 1);
        assert!((result.statistics.anomaly_rate - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn extreme_amounts_are_flagged_not_compared() {
        let raw = |id: &str, amount: f64| RawTransaction {
            id: Some(id.into()),
            order_no: Some("SO1".into()),
            customer_id: None,
            customer_name: Some("Acme".into()),
            amount: Some(RawAmount::Number(amount)),
            transaction_date: Some("2025-01-15".into()),
            payment_method: Some("card".into()),
            status: Some("paid".into()),
            reference_no: None,
        };
        let d = detector(AnomalyDetectionConfig::default());
        let result = d.detect_raw(&[raw("s1", 5e16)], &[raw("e1", -5e16)]);

        assert_eq!(result.anomalies.len(), 2);
        assert!(result
            .anomalies
            .iter()
            .all(|a| a.anomaly_type == AnomalyType::InvalidData
                && a.severity == AnomalySeverity::High));
        assert_eq!(result.statistics.total_amount_mismatch, Money::ZERO);
    }

    #[test]
    fn unvalidated_extremes_saturate() {
        let mut sys = tx("s1", "SO1", "0", "2025-01-15");
        sys.amount = Money::from_cents(i64::MAX);
        let mut ext = tx("e1", "SO1", "0", "2025-01-15");
        ext.amount = Money::from_cents(i64::MIN);
        let config = AnomalyDetectionConfig {
            detect_suspicious: false,
            ..AnomalyDetectionConfig::default()
        };
        let result = detector(config).detect(&[sys], &[ext]);

        assert_eq!(result.anomalies.len(), 1);
        let a = &result.anomalies[0];
        assert_eq!(a.anomaly_type, AnomalyType::AmountMismatch);
        assert_eq!(a.severity, AnomalySeverity::Critical);
        assert_eq!(a.amount_difference, Some(Money::from_cents(i64::MAX)));
        assert_eq!(result.statistics.total_amount_mismatch, Money::from_cents(i64::MAX));
    }
}
