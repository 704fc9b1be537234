use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::money::Money;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub detection: AnomalyDetectionConfig,
    #[serde(default)]
    pub cross_validation: CrossValidationConfig,
}

// ---------------------------------------------------------------------------
// Anomaly detection
// ---------------------------------------------------------------------------

/// Tolerances and switches for the transaction matcher.
///
/// An amount difference is a mismatch only when it exceeds BOTH the absolute
/// tolerance and the percentage tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnomalyDetectionConfig {
    pub amount_tolerance: Money,
    pub amount_tolerance_percentage: f64,
    pub date_tolerance_days: u32,
    pub detect_duplicates: bool,
    pub detect_suspicious: bool,
    /// Z-score multiplier for the suspicious-amount screen
    /// (flag when `amount > mean + threshold * stddev`).
    pub suspicious_threshold: f64,
}

impl Default for AnomalyDetectionConfig {
    fn default() -> Self {
        Self {
            amount_tolerance: Money::from_cents(1),
            amount_tolerance_percentage: 0.5,
            date_tolerance_days: 1,
            detect_duplicates: true,
            detect_suspicious: true,
            suspicious_threshold: 3.0,
        }
    }
}

impl AnomalyDetectionConfig {
    pub fn validate(&self) -> Result<(), ReconError> {
        if self.amount_tolerance < Money::ZERO {
            return Err(ReconError::ConfigValidation(format!(
                "amountTolerance must be >= 0, got {}",
                self.amount_tolerance
            )));
        }
        if !self.amount_tolerance_percentage.is_finite() || self.amount_tolerance_percentage < 0.0 {
            return Err(ReconError::ConfigValidation(format!(
                "amountTolerancePercentage must be a finite value >= 0, got {}",
                self.amount_tolerance_percentage
            )));
        }
        if !self.suspicious_threshold.is_finite() || self.suspicious_threshold < 0.0 {
            return Err(ReconError::ConfigValidation(format!(
                "suspiciousThreshold must be a finite value >= 0, got {}",
                self.suspicious_threshold
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Cross-table validation
// ---------------------------------------------------------------------------

/// Table-pair switches and scheduling limits for the cross-table validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CrossValidationConfig {
    pub tolerance: Money,
    pub enable_order_finance_validation: bool,
    pub enable_invoice_receipt_validation: bool,
    pub enable_reconciliation_ledger_validation: bool,
    pub enable_finance_tax_validation: bool,
    pub enable_inventory_finance_validation: bool,
    /// Upper bound on (statement x pair) units evaluated in parallel.
    pub batch_concurrency: usize,
    /// Timeout for a single comparison fetch, in milliseconds.
    pub fetch_timeout_ms: u64,
    /// Rate for the finance/tax check when a statement carries none.
    pub default_tax_rate: f64,
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        Self {
            tolerance: Money::from_cents(1),
            enable_order_finance_validation: true,
            enable_invoice_receipt_validation: true,
            enable_reconciliation_ledger_validation: true,
            enable_finance_tax_validation: false,
            enable_inventory_finance_validation: false,
            batch_concurrency: 5,
            fetch_timeout_ms: 5_000,
            default_tax_rate: 0.13,
        }
    }
}

impl CrossValidationConfig {
    /// Config with every table pair switched on.
    pub fn all_pairs() -> Self {
        Self {
            enable_finance_tax_validation: true,
            enable_inventory_finance_validation: true,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.tolerance < Money::ZERO {
            return Err(ReconError::ConfigValidation(format!(
                "tolerance must be >= 0, got {}",
                self.tolerance
            )));
        }
        if self.batch_concurrency == 0 {
            return Err(ReconError::ConfigValidation(
                "batchConcurrency must be at least 1".into(),
            ));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(ReconError::ConfigValidation(
                "fetchTimeoutMs must be at least 1".into(),
            ));
        }
        if !self.default_tax_rate.is_finite() || !(0.0..=1.0).contains(&self.default_tax_rate) {
            return Err(ReconError::ConfigValidation(format!(
                "defaultTaxRate must be between 0 and 1, got {}",
                self.default_tax_rate
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        self.detection.validate()?;
        self.cross_validation.validate()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
name = "Monthly AR"

[detection]
amountTolerance = "0.05"
amountTolerancePercentage = 1.0
dateToleranceDays = 3
detectDuplicates = true
detectSuspicious = false
suspiciousThreshold = 2.5

[cross_validation]
tolerance = 1.00
enableFinanceTaxValidation = true
batchConcurrency = 8
fetchTimeoutMs = 250
defaultTaxRate = 0.06
"#;

    #[test]
    fn parse_full() {
        let config = ReconConfig::from_toml(FULL).unwrap();
        assert_eq!(config.name, "Monthly AR");
        assert_eq!(config.detection.amount_tolerance, Money::from_cents(5));
        assert_eq!(config.detection.date_tolerance_days, 3);
        assert!(!config.detection.detect_suspicious);
        assert_eq!(config.detection.suspicious_threshold, 2.5);

        let cv = &config.cross_validation;
        assert_eq!(cv.tolerance, Money::from_major(1));
        assert!(cv.enable_finance_tax_validation);
        // Unspecified flags keep their defaults
        assert!(cv.enable_order_finance_validation);
        assert!(!cv.enable_inventory_finance_validation);
        assert_eq!(cv.batch_concurrency, 8);
        assert_eq!(cv.fetch_timeout_ms, 250);
        assert_eq!(cv.default_tax_rate, 0.06);
    }

    #[test]
    fn empty_document_uses_explicit_defaults() {
        let config = ReconConfig::from_toml("").unwrap();
        assert_eq!(config.detection, AnomalyDetectionConfig::default());
        assert_eq!(config.cross_validation, CrossValidationConfig::default());
        assert_eq!(config.detection.amount_tolerance, Money::from_cents(1));
        assert_eq!(config.detection.amount_tolerance_percentage, 0.5);
        assert_eq!(config.detection.date_tolerance_days, 1);
        assert_eq!(config.detection.suspicious_threshold, 3.0);
        assert_eq!(config.cross_validation.batch_concurrency, 5);
        assert_eq!(config.cross_validation.default_tax_rate, 0.13);
    }

    #[test]
    fn reject_tax_rate_out_of_range() {
        let err = ReconConfig::from_toml("[cross_validation]\ndefaultTaxRate = 13.0\n").unwrap_err();
        assert!(err.to_string().contains("defaultTaxRate"));
    }

    #[test]
    fn reject_zero_concurrency() {
        let err = ReconConfig::from_toml("[cross_validation]\nbatchConcurrency = 0\n").unwrap_err();
        assert!(err.to_string().contains("batchConcurrency"));
    }

    #[test]
    fn reject_negative_tolerance() {
        let err = ReconConfig::from_toml("[detection]\namountTolerance = \"-0.01\"\n").unwrap_err();
        assert!(err.to_string().contains("amountTolerance"));
    }

    #[test]
    fn reject_negative_percentage() {
        let err =
            ReconConfig::from_toml("[detection]\namountTolerancePercentage = -1.0\n").unwrap_err();
        assert!(matches!(err, ReconError::ConfigValidation(_)));
    }

    #[test]
    fn reject_bad_types() {
        let err = ReconConfig::from_toml("[detection]\ndetectDuplicates = \"yes\"\n").unwrap_err();
        assert!(matches!(err, ReconError::ConfigParse(_)));
    }
}
