use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AnomalyDetectionConfig;
use crate::money::Money;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Amount as received: JSON number or decimal string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

/// A transaction exactly as a provider handed it over. Nothing is trusted yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawTransaction {
    pub id: Option<String>,
    pub order_no: Option<String>,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub amount: Option<RawAmount>,
    pub transaction_date: Option<String>,
    pub payment_method: Option<String>,
    pub status: Option<String>,
    pub reference_no: Option<String>,
}

/// A validated transaction, from either the system of record or the external source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: String,
    pub order_no: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub amount: Money,
    pub transaction_date: NaiveDate,
    pub payment_method: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_no: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    System,
    External,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::External => write!(f, "external"),
        }
    }
}

// ---------------------------------------------------------------------------
// Anomaly taxonomy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    SystemOnly,
    ExternalOnly,
    AmountMismatch,
    DateMismatch,
    StatusMismatch,
    PaymentMethodMismatch,
    CustomerInfoMismatch,
    DuplicateTransaction,
    SuspiciousTransaction,
    InvalidData,
}

impl AnomalyType {
    pub const ALL: [AnomalyType; 10] = [
        Self::SystemOnly,
        Self::ExternalOnly,
        Self::AmountMismatch,
        Self::DateMismatch,
        Self::StatusMismatch,
        Self::PaymentMethodMismatch,
        Self::CustomerInfoMismatch,
        Self::DuplicateTransaction,
        Self::SuspiciousTransaction,
        Self::InvalidData,
    ];
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SystemOnly => write!(f, "system_only"),
            Self::ExternalOnly => write!(f, "external_only"),
            Self::AmountMismatch => write!(f, "amount_mismatch"),
            Self::DateMismatch => write!(f, "date_mismatch"),
            Self::StatusMismatch => write!(f, "status_mismatch"),
            Self::PaymentMethodMismatch => write!(f, "payment_method_mismatch"),
            Self::CustomerInfoMismatch => write!(f, "customer_info_mismatch"),
            Self::DuplicateTransaction => write!(f, "duplicate_transaction"),
            Self::SuspiciousTransaction => write!(f, "suspicious_transaction"),
            Self::InvalidData => write!(f, "invalid_data"),
        }
    }
}

/// Ordered LOW < MEDIUM < HIGH < CRITICAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AnomalySeverity {
    pub const ALL: [AnomalySeverity; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];
}

impl fmt::Display for AnomalySeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Resolution workflow state. The detector only ever writes `Open`; the
/// other states are set by whoever resolves the anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyStatus {
    Open,
    InProgress,
    Resolved,
    Dismissed,
}

impl AnomalyStatus {
    pub const ALL: [AnomalyStatus; 4] = [Self::Open, Self::InProgress, Self::Resolved, Self::Dismissed];

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Dismissed)
    }
}

/// Type-specific context attached to an anomaly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum AnomalyDetail {
    SystemOnly {
        order_no: String,
    },
    ExternalOnly {
        order_no: String,
    },
    AmountMismatch {
        order_no: String,
        /// `None` when the external amount is zero.
        percentage_difference: Option<f64>,
    },
    DateMismatch {
        order_no: String,
        system_date: NaiveDate,
        external_date: NaiveDate,
    },
    StatusMismatch {
        order_no: String,
        system_status: String,
        external_status: String,
    },
    PaymentMethodMismatch {
        order_no: String,
        system_method: String,
        external_method: String,
    },
    CustomerInfoMismatch {
        order_no: String,
        system_customer: String,
        external_customer: String,
    },
    DuplicateTransaction {
        order_no: String,
        side: Side,
        /// 1-based position within the duplicate group (always >= 2).
        occurrence: usize,
        group_size: usize,
        duplicate_key: String,
    },
    SuspiciousTransaction {
        order_no: String,
        side: Side,
        mean: f64,
        std_dev: f64,
        threshold: f64,
    },
    InvalidData {
        side: Side,
        record_id: Option<String>,
        missing_fields: Vec<String>,
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Anomaly record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationAnomaly {
    pub id: String,
    pub batch_id: String,
    pub reconciliation_id: String,
    #[serde(rename = "type")]
    pub anomaly_type: AnomalyType,
    pub severity: AnomalySeverity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_transaction: Option<TransactionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_transaction: Option<TransactionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_difference: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_difference_days: Option<i64>,
    pub detected_at: DateTime<Utc>,
    pub status: AnomalyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handled_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handling_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handling_result: Option<String>,
    pub metadata: AnomalyDetail,
}

impl ReconciliationAnomaly {
    /// Order number from the embedded snapshots, system side first.
    pub fn order_no(&self) -> Option<&str> {
        self.system_transaction
            .as_ref()
            .or(self.external_transaction.as_ref())
            .map(|t| t.order_no.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyStatistics {
    pub total_anomalies: usize,
    pub by_type: BTreeMap<AnomalyType, usize>,
    pub by_severity: BTreeMap<AnomalySeverity, usize>,
    pub by_status: BTreeMap<AnomalyStatus, usize>,
    /// Sum of `|amountDifference|` over anomalies that carry one.
    pub total_amount_mismatch: Money,
    pub total_transactions_with_anomalies: usize,
    /// Anomalies per 100 input records.
    pub anomaly_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyDetectionResult {
    pub anomalies: Vec<ReconciliationAnomaly>,
    pub statistics: AnomalyStatistics,
    pub config: AnomalyDetectionConfig,
    pub detected_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementItem {
    pub id: String,
    pub source_type: String,
    pub source_id: String,
    pub source_no: String,
    pub amount: Money,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A customer or supplier period statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationStatement {
    pub id: String,
    pub statement_no: String,
    /// `customer` or `supplier`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_end: Option<NaiveDate>,
    pub total_amount: Money,
    /// Tax rate as a fraction (0.13 = 13%). Needed for finance/tax checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<f64>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub items: Vec<StatementItem>,
}

impl ReconciliationStatement {
    pub fn items_total(&self) -> Money {
        self.items.iter().map(|i| i.amount).sum()
    }
}

// ---------------------------------------------------------------------------
// Cross-table validation results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossValidationType {
    OrderFinance,
    InvoiceReceipt,
    ReconciliationLedger,
    FinanceTax,
    InventoryFinance,
    Other,
}

impl fmt::Display for CrossValidationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrderFinance => write!(f, "order_finance"),
            Self::InvoiceReceipt => write!(f, "invoice_receipt"),
            Self::ReconciliationLedger => write!(f, "reconciliation_ledger"),
            Self::FinanceTax => write!(f, "finance_tax"),
            Self::InventoryFinance => write!(f, "inventory_finance"),
            Self::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    Invalid,
    Warning,
    NotApplicable,
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::Invalid => write!(f, "invalid"),
            Self::Warning => write!(f, "warning"),
            Self::NotApplicable => write!(f, "not_applicable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemSide {
    Source,
    Target,
}

/// One side of a two-sided validation breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationItem {
    pub id: String,
    pub source: ItemSide,
    pub description: String,
    pub amount: Money,
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ValidationDetail {
    Compared {
        statement_id: String,
        statement_no: String,
    },
    Tax {
        statement_id: String,
        statement_no: String,
        tax_rate: f64,
    },
    Failed {
        statement_id: String,
        statement_no: String,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossValidationResult {
    pub id: String,
    #[serde(rename = "type")]
    pub validation_type: CrossValidationType,
    pub name: String,
    pub status: ValidationStatus,
    pub message: String,
    pub source_table: String,
    pub target_table: String,
    pub source_amount: Money,
    pub target_amount: Money,
    /// `sourceAmount - targetAmount`.
    pub difference: Money,
    pub percentage_difference: f64,
    pub tolerance: Money,
    pub within_tolerance: bool,
    pub metadata: ValidationDetail,
    pub validated_at: DateTime<Utc>,
    pub statement_id: String,
    pub statement_no: String,
    #[serde(default)]
    pub items: Vec<ValidationItem>,
}

/// Output of one validator batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossValidationBatch {
    /// Completed results, statement order then pair declaration order.
    pub results: Vec<CrossValidationResult>,
    pub cancelled: bool,
    /// Units never started because the batch was cancelled.
    pub skipped_units: usize,
}
