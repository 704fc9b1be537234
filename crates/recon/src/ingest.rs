//! Record validation and CSV / JSON loading.
//!
//! A malformed record never aborts a batch: it is dropped from matching and
//! handed back as an [`InvalidRecord`] so the detector can flag it.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::ReconError;
use crate::model::{
    AnomalySeverity, RawAmount, RawTransaction, ReconciliationStatement, Side, TransactionRecord,
};
use crate::money::Money;

/// A record that failed validation, with enough context to diagnose it.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidRecord {
    pub side: Side,
    /// Position in the input sequence.
    pub index: usize,
    pub record_id: Option<String>,
    pub order_no: Option<String>,
    pub missing_fields: Vec<String>,
    pub reason: String,
    pub severity: AnomalySeverity,
}

#[derive(Debug, Clone, Default)]
pub struct ValidatedSide {
    pub records: Vec<TransactionRecord>,
    pub invalid: Vec<InvalidRecord>,
}

/// Split one side into usable records and rejects, preserving input order.
pub fn validate_side(side: Side, raw: &[RawTransaction]) -> ValidatedSide {
    let mut out = ValidatedSide::default();
    for (index, r) in raw.iter().enumerate() {
        match validate_record(r) {
            Ok(rec) => out.records.push(rec),
            Err((missing_fields, reason, severity)) => {
                log::warn!(
                    "skipping malformed {side} record #{index} (id={:?}): {reason}",
                    r.id
                );
                out.invalid.push(InvalidRecord {
                    side,
                    index,
                    record_id: present(&r.id).map(str::to_string),
                    order_no: present(&r.order_no).map(str::to_string),
                    missing_fields,
                    reason,
                    severity,
                });
            }
        }
    }
    out
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

type Rejection = (Vec<String>, String, AnomalySeverity);

fn validate_record(r: &RawTransaction) -> Result<TransactionRecord, Rejection> {
    let amount_present = match &r.amount {
        None => false,
        Some(RawAmount::Text(s)) => !s.trim().is_empty(),
        Some(RawAmount::Number(_)) => true,
    };
    let required = [
        ("id", present(&r.id).is_some()),
        ("orderNo", present(&r.order_no).is_some()),
        ("customerName", present(&r.customer_name).is_some()),
        ("amount", amount_present),
        ("transactionDate", present(&r.transaction_date).is_some()),
        ("paymentMethod", present(&r.payment_method).is_some()),
        ("status", present(&r.status).is_some()),
    ];

    let missing: Vec<String> = required
        .iter()
        .filter(|(_, ok)| !ok)
        .map(|(name, _)| name.to_string())
        .collect();
    if !missing.is_empty() {
        let reason = format!("missing required fields: {}", missing.join(", "));
        return Err((missing, reason, AnomalySeverity::Medium));
    }

    let amount = match &r.amount {
        Some(RawAmount::Number(n)) => {
            Money::from_f64(*n).ok_or_else(|| ReconError::AmountParse { value: n.to_string() })
        }
        Some(RawAmount::Text(s)) => Money::parse(s),
        None => Err(ReconError::AmountParse { value: String::new() }),
    }
    .and_then(|amount| {
        if amount.in_range() {
            Ok(amount)
        } else {
            Err(ReconError::AmountOutOfRange { value: amount.to_string() })
        }
    })
    .map_err(|e| (Vec::new(), e.to_string(), AnomalySeverity::High))?;

    let date_raw = present(&r.transaction_date).unwrap_or_default();
    let transaction_date =
        parse_date(date_raw).map_err(|e| (Vec::new(), e.to_string(), AnomalySeverity::High))?;

    let owned = |v: &Option<String>| present(v).unwrap_or_default().to_string();
    Ok(TransactionRecord {
        id: owned(&r.id),
        order_no: owned(&r.order_no),
        customer_id: present(&r.customer_id).map(str::to_string),
        customer_name: owned(&r.customer_name),
        amount,
        transaction_date,
        payment_method: owned(&r.payment_method),
        status: owned(&r.status),
        reference_no: present(&r.reference_no).map(str::to_string),
    })
}

/// Accepts `YYYY-MM-DD`, RFC 3339, or a naive `YYYY-MM-DD[T ]HH:MM:SS` timestamp.
/// Only the calendar date is kept.
pub fn parse_date(value: &str) -> Result<NaiveDate, ReconError> {
    let s = value.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }
    Err(ReconError::DateParse { value: value.into() })
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

const REQUIRED_COLUMNS: [&str; 7] = [
    "id",
    "order_no",
    "customer_name",
    "amount",
    "transaction_date",
    "payment_method",
    "status",
];

/// Load transactions from CSV text. Header columns are snake_case;
/// `customer_id` and `reference_no` are optional. Empty cells become `None`
/// and are judged later by [`validate_side`].
pub fn load_transactions_csv(csv_data: &str) -> Result<Vec<RawTransaction>, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ReconError::Io(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let idx = |name: &str| headers.iter().position(|h| h == name);
    for column in REQUIRED_COLUMNS {
        if idx(column).is_none() {
            return Err(ReconError::MissingColumn { column: column.into() });
        }
    }

    let id_idx = idx("id");
    let order_no_idx = idx("order_no");
    let customer_id_idx = idx("customer_id");
    let customer_name_idx = idx("customer_name");
    let amount_idx = idx("amount");
    let date_idx = idx("transaction_date");
    let method_idx = idx("payment_method");
    let status_idx = idx("status");
    let reference_idx = idx("reference_no");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ReconError::Io(e.to_string()))?;
        let cell = |i: Option<usize>| -> Option<String> {
            i.and_then(|i| record.get(i))
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string())
        };

        rows.push(RawTransaction {
            id: cell(id_idx),
            order_no: cell(order_no_idx),
            customer_id: cell(customer_id_idx),
            customer_name: cell(customer_name_idx),
            amount: cell(amount_idx).map(RawAmount::Text),
            transaction_date: cell(date_idx),
            payment_method: cell(method_idx),
            status: cell(status_idx),
            reference_no: cell(reference_idx),
        });
    }

    Ok(rows)
}

/// Load transactions from a JSON array of camelCase objects. Amounts may be
/// numbers or decimal strings.
pub fn load_transactions_json(json: &str) -> Result<Vec<RawTransaction>, ReconError> {
    serde_json::from_str(json).map_err(|e| ReconError::Io(format!("transactions JSON: {e}")))
}

/// Load reconciliation statements from a JSON array.
pub fn load_statements_json(json: &str) -> Result<Vec<ReconciliationStatement>, ReconError> {
    serde_json::from_str(json).map_err(|e| ReconError::Io(format!("statements JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, order_no: &str, amount: &str, date: &str) -> RawTransaction {
        RawTransaction {
            id: Some(id.into()),
            order_no: Some(order_no.into()),
            customer_id: None,
            customer_name: Some("Acme".into()),
            amount: Some(RawAmount::Text(amount.into())),
            transaction_date: Some(date.into()),
            payment_method: Some("card".into()),
            status: Some("paid".into()),
            reference_no: None,
        }
    }

    #[test]
    fn valid_record_passes() {
        let side = validate_side(Side::System, &[raw("t1", "SO1", "100.50", "2025-01-15")]);
        assert!(side.invalid.is_empty());
        assert_eq!(side.records[0].amount, Money::from_cents(10_050));
        assert_eq!(
            side.records[0].transaction_date,
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
        );
    }

    #[test]
    fn missing_fields_are_listed() {
        let mut r = raw("t1", "SO1", "100", "2025-01-15");
        r.order_no = None;
        r.customer_name = Some("   ".into());
        r.amount = None;
        let side = validate_side(Side::External, &[r]);
        assert!(side.records.is_empty());
        let bad = &side.invalid[0];
        assert_eq!(bad.side, Side::External);
        assert_eq!(bad.record_id.as_deref(), Some("t1"));
        assert_eq!(bad.missing_fields, vec!["orderNo", "customerName", "amount"]);
        assert_eq!(bad.severity, AnomalySeverity::Medium);
    }

    #[test]
    fn unparseable_amount_is_high_severity() {
        let side = validate_side(Side::System, &[raw("t1", "SO1", "12,00", "2025-01-15")]);
        let bad = &side.invalid[0];
        assert!(bad.missing_fields.is_empty());
        assert!(bad.reason.contains("cannot parse amount"));
        assert_eq!(bad.severity, AnomalySeverity::High);
    }

    #[test]
    fn extreme_amount_is_rejected() {
        let mut huge = raw("t1", "SO1", "0", "2025-01-15");
        huge.amount = Some(RawAmount::Number(5e16));
        let mut negative = raw("t2", "SO2", "0", "2025-01-15");
        negative.amount = Some(RawAmount::Number(-5e16));
        let limit = raw("t3", "SO3", &Money::MAX_ABS.to_string(), "2025-01-15");

        let side = validate_side(Side::System, &[huge, negative, limit]);
        assert_eq!(side.records.len(), 1);
        assert_eq!(side.records[0].amount, Money::MAX_ABS);
        assert_eq!(side.invalid.len(), 2);
        for bad in &side.invalid {
            assert_eq!(bad.severity, AnomalySeverity::High);
            assert!(bad.reason.contains("outside the supported range"));
        }
    }

    #[test]
    fn bad_record_does_not_drop_neighbours() {
        let input = vec![
            raw("t1", "SO1", "1", "2025-01-15"),
            raw("t2", "SO2", "1", "not-a-date"),
            raw("t3", "SO3", "1", "2025-01-17"),
        ];
        let side = validate_side(Side::System, &input);
        assert_eq!(side.records.len(), 2);
        assert_eq!(side.invalid.len(), 1);
        assert_eq!(side.invalid[0].index, 1);
        assert_eq!(side.invalid[0].order_no.as_deref(), Some("SO2"));
    }

    #[test]
    fn numeric_amount_accepted() {
        let mut r = raw("t1", "SO1", "0", "2025-01-15");
        r.amount = Some(RawAmount::Number(4999.99));
        let side = validate_side(Side::System, &[r]);
        assert_eq!(side.records[0].amount, Money::from_cents(499_999));
    }

    #[test]
    fn date_formats() {
        let d = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        assert_eq!(parse_date("2025-01-15").unwrap(), d);
        assert_eq!(parse_date("2025-01-15T23:30:00Z").unwrap(), d);
        assert_eq!(parse_date("2025-01-15T08:00:00+08:00").unwrap(), d);
        assert_eq!(parse_date("2025-01-15 10:00:00").unwrap(), d);
        assert!(parse_date("15/01/2025").is_err());
    }

    #[test]
    fn csv_load_and_optional_columns() {
        let csv = "id,order_no,customer_name,amount,transaction_date,payment_method,status\n\
                   t1,SO1,Acme,100.00,2025-01-15,card,paid\n\
                   t2,,Acme,5,2025-01-16,card,paid\n";
        let rows = load_transactions_csv(csv).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].amount, Some(RawAmount::Text("100.00".into())));
        assert_eq!(rows[0].reference_no, None);
        assert_eq!(rows[1].order_no, None);
    }

    #[test]
    fn csv_missing_required_column() {
        let csv = "id,order_no,customer_name,amount,transaction_date,status\nt1,SO1,A,1,2025-01-01,paid\n";
        let err = load_transactions_csv(csv).unwrap_err();
        assert_eq!(err, ReconError::MissingColumn { column: "payment_method".into() });
    }

    #[test]
    fn json_accepts_number_and_string_amounts() {
        let json = r#"[
            {"id":"t1","orderNo":"SO1","customerName":"Acme","amount":4999.99,
             "transactionDate":"2025-01-15","paymentMethod":"card","status":"paid"},
            {"id":"t2","orderNo":"SO2","amount":"12.30"}
        ]"#;
        let rows = load_transactions_json(json).unwrap();
        assert_eq!(rows.len(), 2);
        let v = validate_side(Side::External, &rows);
        assert_eq!(v.records.len(), 1);
        assert_eq!(v.records[0].amount, Money::parse("4999.99").unwrap());
        assert_eq!(v.invalid.len(), 1);
        assert_eq!(v.invalid[0].record_id.as_deref(), Some("t2"));
    }

    #[test]
    fn statements_json() {
        let json = r#"[{"id":"s1","statementNo":"ST-1","type":"customer","totalAmount":"1000.00",
                        "taxRate":0.13,"items":[{"id":"i1","sourceType":"order","sourceId":"o1",
                        "sourceNo":"SO1","amount":1000,"date":"2025-01-15"}]}]"#;
        let statements = load_statements_json(json).unwrap();
        assert_eq!(statements[0].kind, "customer");
        assert_eq!(statements[0].tax_rate, Some(0.13));
        assert_eq!(statements[0].items_total(), Money::from_major(1000));
        assert!(load_statements_json("{").is_err());
    }
}
