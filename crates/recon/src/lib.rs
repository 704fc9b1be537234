//! `ledgerline-recon`: transaction anomaly detection and cross-table
//! validation for financial reconciliation.
//!
//! Pure engine crate: receives pre-loaded records, returns classified
//! results. The only I/O is the comparison fetch the cross-table validator
//! delegates to a caller-supplied [`ComparisonProvider`].

pub mod classify;
pub mod clock;
pub mod config;
pub mod crossval;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod matcher;
pub mod model;
pub mod money;
pub mod provider;
pub mod report;
pub mod screen;
pub mod stats;

pub use clock::{Clock, FixedClock, IdGenerator, SequentialIds, SystemClock, UuidIds};
pub use config::{AnomalyDetectionConfig, CrossValidationConfig, ReconConfig};
pub use crossval::{cancel_token, CancelToken, CrossValidator};
pub use engine::AnomalyDetector;
pub use error::ReconError;
pub use model::{
    AnomalyDetectionResult, AnomalySeverity, AnomalyType, CrossValidationBatch,
    CrossValidationResult, RawTransaction, ReconciliationAnomaly, ReconciliationStatement,
    TransactionRecord, ValidationStatus,
};
pub use money::Money;
pub use provider::{ComparisonProvider, SourceTable, StaticProvider, TablePair};
pub use report::{difference_stats, generate_report, status_label, suggestion, ValidationReport};
pub use stats::{anomaly_report, anomaly_status_label, severity_label, type_label, AnomalyReport};
