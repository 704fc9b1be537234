//! Table pairs checked by the cross-table validator and the data-provider
//! seam that supplies their comparison amounts.

use std::collections::HashMap;
use std::fmt;

use crate::config::CrossValidationConfig;
use crate::model::{CrossValidationType, ReconciliationStatement};
use crate::money::Money;

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceTable {
    Orders,
    FinanceRecords,
    Invoices,
    Receipts,
    ReconciliationStatements,
    GeneralLedger,
    TaxRecords,
    Inventory,
}

impl SourceTable {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::FinanceRecords => "finance_records",
            Self::Invoices => "invoices",
            Self::Receipts => "receipts",
            Self::ReconciliationStatements => "reconciliation_statements",
            Self::GeneralLedger => "general_ledger",
            Self::TaxRecords => "tax_records",
            Self::Inventory => "inventory",
        }
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Table pairs
// ---------------------------------------------------------------------------

/// Two tables expected to reconcile in aggregate for a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TablePair {
    OrderFinance,
    InvoiceReceipt,
    ReconciliationLedger,
    FinanceTax,
    InventoryFinance,
}

impl TablePair {
    /// Declaration order, which is also result order within a statement.
    pub const ALL: [TablePair; 5] = [
        Self::OrderFinance,
        Self::InvoiceReceipt,
        Self::ReconciliationLedger,
        Self::FinanceTax,
        Self::InventoryFinance,
    ];

    pub fn validation_type(self) -> CrossValidationType {
        match self {
            Self::OrderFinance => CrossValidationType::OrderFinance,
            Self::InvoiceReceipt => CrossValidationType::InvoiceReceipt,
            Self::ReconciliationLedger => CrossValidationType::ReconciliationLedger,
            Self::FinanceTax => CrossValidationType::FinanceTax,
            Self::InventoryFinance => CrossValidationType::InventoryFinance,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::OrderFinance => "orders vs finance records",
            Self::InvoiceReceipt => "invoices vs receipts",
            Self::ReconciliationLedger => "reconciliation statements vs general ledger",
            Self::FinanceTax => "finance records vs tax records",
            Self::InventoryFinance => "inventory vs finance records",
        }
    }

    pub fn source_table(self) -> SourceTable {
        match self {
            Self::OrderFinance => SourceTable::Orders,
            Self::InvoiceReceipt => SourceTable::Invoices,
            Self::ReconciliationLedger => SourceTable::ReconciliationStatements,
            Self::FinanceTax => SourceTable::FinanceRecords,
            Self::InventoryFinance => SourceTable::Inventory,
        }
    }

    pub fn target_table(self) -> SourceTable {
        match self {
            Self::OrderFinance => SourceTable::FinanceRecords,
            Self::InvoiceReceipt => SourceTable::Receipts,
            Self::ReconciliationLedger => SourceTable::GeneralLedger,
            Self::FinanceTax => SourceTable::TaxRecords,
            Self::InventoryFinance => SourceTable::FinanceRecords,
        }
    }

    /// Whether the source amount comes from the provider rather than the
    /// statement itself.
    pub fn fetches_source(self) -> bool {
        matches!(self, Self::InventoryFinance)
    }

    pub fn source_description(self) -> &'static str {
        match self {
            Self::OrderFinance => "order total",
            Self::InvoiceReceipt => "invoice total",
            Self::ReconciliationLedger => "statement total",
            Self::FinanceTax => "expected tax on finance records",
            Self::InventoryFinance => "inventory value",
        }
    }

    pub fn target_description(self) -> &'static str {
        match self {
            Self::OrderFinance => "finance record total",
            Self::InvoiceReceipt => "receipt total",
            Self::ReconciliationLedger => "general ledger balance",
            Self::FinanceTax => "tax record total",
            Self::InventoryFinance => "inventory value in finance records",
        }
    }

    pub fn enabled(self, config: &CrossValidationConfig) -> bool {
        match self {
            Self::OrderFinance => config.enable_order_finance_validation,
            Self::InvoiceReceipt => config.enable_invoice_receipt_validation,
            Self::ReconciliationLedger => config.enable_reconciliation_ledger_validation,
            Self::FinanceTax => config.enable_finance_tax_validation,
            Self::InventoryFinance => config.enable_inventory_finance_validation,
        }
    }
}

impl fmt::Display for TablePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.validation_type())
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Supplies the aggregate amount a table holds for a statement.
///
/// Called from worker threads, possibly several at once. A call may block;
/// the validator bounds it with `fetchTimeoutMs`. Errors are plain messages
/// and end up verbatim in the `not_applicable` result.
///
/// Implementations must return eventually. A timed-out call keeps running on
/// its helper thread, which holds a statement clone and the provider until
/// the call finishes, so a provider that never returns leaks one thread per
/// fetch.
pub trait ComparisonProvider: Send + Sync {
    fn fetch_amount(
        &self,
        pair: TablePair,
        table: SourceTable,
        statement: &ReconciliationStatement,
    ) -> Result<Money, String>;
}

/// In-memory provider keyed by `(pair, table, statement id)`.
#[derive(Debug, Default, Clone)]
pub struct StaticProvider {
    amounts: HashMap<(TablePair, SourceTable, String), Result<Money, String>>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_amount(
        mut self,
        pair: TablePair,
        table: SourceTable,
        statement_id: &str,
        amount: Money,
    ) -> Self {
        self.amounts
            .insert((pair, table, statement_id.to_string()), Ok(amount));
        self
    }

    pub fn with_failure(
        mut self,
        pair: TablePair,
        table: SourceTable,
        statement_id: &str,
        message: &str,
    ) -> Self {
        self.amounts.insert(
            (pair, table, statement_id.to_string()),
            Err(message.to_string()),
        );
        self
    }
}

impl ComparisonProvider for StaticProvider {
    fn fetch_amount(
        &self,
        pair: TablePair,
        table: SourceTable,
        statement: &ReconciliationStatement,
    ) -> Result<Money, String> {
        self.amounts
            .get(&(pair, table, statement.id.clone()))
            .cloned()
            .unwrap_or_else(|| {
                Err(format!(
                    "no {table} amount for statement {}",
                    statement.statement_no
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(id: &str) -> ReconciliationStatement {
        ReconciliationStatement {
            id: id.into(),
            statement_no: format!("ST-{id}"),
            kind: "customer".into(),
            target_id: None,
            target_name: None,
            period_start: None,
            period_end: None,
            total_amount: Money::from_major(100),
            tax_rate: None,
            status: "draft".into(),
            items: Vec::new(),
        }
    }

    #[test]
    fn pair_tables() {
        assert_eq!(TablePair::OrderFinance.source_table().as_str(), "orders");
        assert_eq!(TablePair::OrderFinance.target_table().as_str(), "finance_records");
        assert_eq!(
            TablePair::ReconciliationLedger.source_table().as_str(),
            "reconciliation_statements"
        );
        assert_eq!(TablePair::FinanceTax.target_table().as_str(), "tax_records");
        assert_eq!(TablePair::InventoryFinance.to_string(), "inventory_finance");
        assert!(TablePair::InventoryFinance.fetches_source());
        assert!(!TablePair::OrderFinance.fetches_source());
    }

    #[test]
    fn default_config_enables_first_three_pairs() {
        let config = CrossValidationConfig::default();
        let enabled: Vec<TablePair> = TablePair::ALL
            .into_iter()
            .filter(|p| p.enabled(&config))
            .collect();
        assert_eq!(
            enabled,
            vec![
                TablePair::OrderFinance,
                TablePair::InvoiceReceipt,
                TablePair::ReconciliationLedger
            ]
        );
        let all = CrossValidationConfig::all_pairs();
        assert!(TablePair::ALL.iter().all(|p| p.enabled(&all)));
    }

    #[test]
    fn static_provider_lookup() {
        let provider = StaticProvider::new()
            .with_amount(TablePair::OrderFinance, SourceTable::FinanceRecords, "s1", Money::from_major(99))
            .with_failure(TablePair::FinanceTax, SourceTable::TaxRecords, "s1", "tax service down");
        let s1 = statement("s1");

        assert_eq!(
            provider.fetch_amount(TablePair::OrderFinance, SourceTable::FinanceRecords, &s1),
            Ok(Money::from_major(99))
        );
        assert_eq!(
            provider.fetch_amount(TablePair::FinanceTax, SourceTable::TaxRecords, &s1),
            Err("tax service down".to_string())
        );
        let missing = provider
            .fetch_amount(TablePair::OrderFinance, SourceTable::FinanceRecords, &statement("s2"))
            .unwrap_err();
        assert!(missing.contains("ST-s2"));
    }
}
