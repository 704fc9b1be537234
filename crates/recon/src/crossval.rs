//! Cross-table validator: for each statement and each enabled table pair,
//! compare the source-side aggregate with the target-side aggregate.
//!
//! Units of work are `(statement, pair)`. They run on a pool of at most
//! `batchConcurrency` scoped threads; each provider fetch runs on its own
//! helper thread so a hung provider costs one unit, not a worker. Results are
//! reassembled in statement order, then pair declaration order.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::clock::{Clock, IdGenerator, SystemClock, UuidIds};
use crate::config::CrossValidationConfig;
use crate::error::ReconError;
use crate::model::{
    CrossValidationBatch, CrossValidationResult, ItemSide, ReconciliationStatement,
    ValidationDetail, ValidationItem, ValidationStatus,
};
use crate::money::Money;
use crate::provider::{ComparisonProvider, SourceTable, TablePair};

/// Cancel token for a validation batch.
/// Set to true to stop starting new units.
pub type CancelToken = Arc<AtomicBool>;

pub fn cancel_token() -> CancelToken {
    Arc::new(AtomicBool::new(false))
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    pub difference: Money,
    pub percentage_difference: f64,
    pub within_tolerance: bool,
    pub status: ValidationStatus,
}

/// Classify `source - target` against an absolute tolerance.
///
/// Out-of-tolerance differences under 1% of the source are warnings. A zero
/// source has a 0% difference, so it can only ever be valid or a warning.
pub fn compare_amounts(source: Money, target: Money, tolerance: Money) -> Comparison {
    let difference = source - target;
    let percentage_difference = difference.percent_of(source).unwrap_or(0.0);
    let within_tolerance = difference.abs() <= tolerance;

    let status = if within_tolerance {
        ValidationStatus::Valid
    } else if percentage_difference.abs() < 1.0 {
        ValidationStatus::Warning
    } else {
        ValidationStatus::Invalid
    };

    Comparison {
        difference,
        percentage_difference,
        within_tolerance,
        status,
    }
}

fn status_message(pair: TablePair, c: &Comparison) -> String {
    match c.status {
        ValidationStatus::Valid => format!(
            "{} check passed: difference {} is within tolerance",
            pair.name(),
            c.difference
        ),
        ValidationStatus::Warning => format!(
            "{} check warning: difference {} ({:.2}%) slightly exceeds tolerance",
            pair.name(),
            c.difference,
            c.percentage_difference
        ),
        _ => format!(
            "{} check failed: difference {} ({:.2}%) exceeds tolerance",
            pair.name(),
            c.difference,
            c.percentage_difference
        ),
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

pub struct CrossValidator {
    config: CrossValidationConfig,
    provider: Arc<dyn ComparisonProvider>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl CrossValidator {
    pub fn new(config: CrossValidationConfig, provider: Arc<dyn ComparisonProvider>) -> Self {
        Self {
            config,
            provider,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidIds),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(&self) -> &CrossValidationConfig {
        &self.config
    }

    /// Pairs switched on by the config, in declaration order.
    pub fn enabled_pairs(&self) -> Vec<TablePair> {
        TablePair::ALL
            .into_iter()
            .filter(|p| p.enabled(&self.config))
            .collect()
    }

    /// Validate every enabled pair for every statement.
    ///
    /// Never fails: provider errors and timeouts become `not_applicable`
    /// results. Once `cancel` is set no further unit is started; finished
    /// results are kept and the rest are counted in `skipped_units`.
    pub fn validate(
        &self,
        statements: &[ReconciliationStatement],
        cancel: &CancelToken,
    ) -> CrossValidationBatch {
        let pairs = self.enabled_pairs();
        let total = statements.len() * pairs.len();
        let workers = self.config.batch_concurrency.max(1).min(total);

        log::debug!(
            "cross-validating {} statements x {} pairs on {} workers",
            statements.len(),
            pairs.len(),
            workers
        );

        let mut slots: Vec<Option<CrossValidationResult>> = vec![None; total];

        if total > 0 {
            let next = AtomicUsize::new(0);
            let (tx, rx) = mpsc::channel::<(usize, CrossValidationResult)>();

            thread::scope(|scope| {
                for _ in 0..workers {
                    let tx = tx.clone();
                    let next = &next;
                    let pairs = &pairs;
                    scope.spawn(move || loop {
                        if cancel.load(Ordering::SeqCst) {
                            break;
                        }
                        let unit = next.fetch_add(1, Ordering::SeqCst);
                        if unit >= total {
                            break;
                        }
                        let statement = &statements[unit / pairs.len()];
                        let pair = pairs[unit % pairs.len()];
                        if tx.send((unit, self.validate_pair(statement, pair))).is_err() {
                            break;
                        }
                    });
                }
            });
            drop(tx);

            for (unit, result) in rx {
                slots[unit] = Some(result);
            }
        }

        let results: Vec<CrossValidationResult> = slots.into_iter().flatten().collect();
        let skipped_units = total - results.len();
        let cancelled = cancel.load(Ordering::SeqCst);

        if cancelled {
            log::warn!(
                "cross-validation cancelled: {} of {} units completed, {} skipped",
                results.len(),
                total,
                skipped_units
            );
        }
        log::debug!("cross-validation finished with {} results", results.len());

        CrossValidationBatch {
            results,
            cancelled,
            skipped_units,
        }
    }

    /// Evaluate one table pair for one statement, in the calling thread.
    pub fn validate_pair(
        &self,
        statement: &ReconciliationStatement,
        pair: TablePair,
    ) -> CrossValidationResult {
        match self.compare(statement, pair) {
            Ok(result) => result,
            Err(err) => {
                log::warn!(
                    "{pair} not applicable for statement {}: {err}",
                    statement.statement_no
                );
                self.not_applicable(statement, pair, &err)
            }
        }
    }

    fn compare(
        &self,
        statement: &ReconciliationStatement,
        pair: TablePair,
    ) -> Result<CrossValidationResult, ReconError> {
        let (source_amount, source_description, metadata) = match pair {
            TablePair::FinanceTax => {
                let rate = statement.tax_rate.unwrap_or(self.config.default_tax_rate);
                let expected = statement.total_amount.scale(rate).ok_or_else(|| {
                    ReconError::AmountParse {
                        value: format!("{} x {rate}", statement.total_amount),
                    }
                })?;
                (
                    expected,
                    format!("{} ({:.2}%)", pair.source_description(), rate * 100.0),
                    ValidationDetail::Tax {
                        statement_id: statement.id.clone(),
                        statement_no: statement.statement_no.clone(),
                        tax_rate: rate,
                    },
                )
            }
            _ => {
                let amount = if pair.fetches_source() {
                    self.fetch(statement, pair, pair.source_table())?
                } else {
                    statement.total_amount
                };
                (
                    amount,
                    pair.source_description().to_string(),
                    ValidationDetail::Compared {
                        statement_id: statement.id.clone(),
                        statement_no: statement.statement_no.clone(),
                    },
                )
            }
        };

        let target_amount = self.fetch(statement, pair, pair.target_table())?;
        let comparison = compare_amounts(source_amount, target_amount, self.config.tolerance);

        let items = vec![
            ValidationItem {
                id: self.ids.next_id("item"),
                source: ItemSide::Source,
                description: source_description,
                amount: source_amount,
                table: pair.source_table().to_string(),
            },
            ValidationItem {
                id: self.ids.next_id("item"),
                source: ItemSide::Target,
                description: pair.target_description().to_string(),
                amount: target_amount,
                table: pair.target_table().to_string(),
            },
        ];

        Ok(CrossValidationResult {
            id: self.ids.next_id("validation"),
            validation_type: pair.validation_type(),
            name: pair.name().to_string(),
            status: comparison.status,
            message: status_message(pair, &comparison),
            source_table: pair.source_table().to_string(),
            target_table: pair.target_table().to_string(),
            source_amount,
            target_amount,
            difference: comparison.difference,
            percentage_difference: comparison.percentage_difference,
            tolerance: self.config.tolerance,
            within_tolerance: comparison.within_tolerance,
            metadata,
            validated_at: self.clock.now(),
            statement_id: statement.id.clone(),
            statement_no: statement.statement_no.clone(),
            items,
        })
    }

    fn not_applicable(
        &self,
        statement: &ReconciliationStatement,
        pair: TablePair,
        err: &ReconError,
    ) -> CrossValidationResult {
        let error = err.to_string();
        CrossValidationResult {
            id: self.ids.next_id("validation"),
            validation_type: pair.validation_type(),
            name: pair.name().to_string(),
            status: ValidationStatus::NotApplicable,
            message: format!("validation failed: {error}"),
            source_table: pair.source_table().to_string(),
            target_table: pair.target_table().to_string(),
            source_amount: Money::ZERO,
            target_amount: Money::ZERO,
            difference: Money::ZERO,
            percentage_difference: 0.0,
            tolerance: self.config.tolerance,
            within_tolerance: false,
            metadata: ValidationDetail::Failed {
                statement_id: statement.id.clone(),
                statement_no: statement.statement_no.clone(),
                error,
            },
            validated_at: self.clock.now(),
            statement_id: statement.id.clone(),
            statement_no: statement.statement_no.clone(),
            items: Vec::new(),
        }
    }

    /// Run one provider call on a helper thread and wait at most
    /// `fetchTimeoutMs` for it. A timed-out call is abandoned, not joined.
    fn fetch(
        &self,
        statement: &ReconciliationStatement,
        pair: TablePair,
        table: SourceTable,
    ) -> Result<Money, ReconError> {
        let (tx, rx) = mpsc::channel();
        let provider = Arc::clone(&self.provider);
        let snapshot = statement.clone();

        thread::Builder::new()
            .name(format!("recon-fetch-{table}"))
            .spawn(move || {
                let _ = tx.send(provider.fetch_amount(pair, table, &snapshot));
            })
            .map_err(|e| ReconError::Io(e.to_string()))?;

        let millis = self.config.fetch_timeout_ms;
        match rx.recv_timeout(Duration::from_millis(millis)) {
            Ok(Ok(amount)) => Ok(amount),
            Ok(Err(message)) => Err(ReconError::Provider {
                pair: pair.to_string(),
                message,
            }),
            Err(RecvTimeoutError::Timeout) => Err(ReconError::Timeout {
                pair: pair.to_string(),
                millis,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(ReconError::Provider {
                pair: pair.to_string(),
                message: format!("{table} fetch ended without a result"),
            }),
        }
    }
}
