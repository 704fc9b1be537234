use std::collections::HashMap;

use crate::model::TransactionRecord;

/// Lookup tables over one side's records. The last record seen for an
/// order number (or id) owns it; repeats are left to the duplicate screen.
#[derive(Debug)]
pub struct TransactionIndex<'a> {
    by_order_no: HashMap<&'a str, &'a TransactionRecord>,
    by_id: HashMap<&'a str, &'a TransactionRecord>,
}

impl<'a> TransactionIndex<'a> {
    pub fn build(records: &'a [TransactionRecord]) -> Self {
        let mut by_order_no = HashMap::with_capacity(records.len());
        let mut by_id = HashMap::with_capacity(records.len());
        for r in records {
            by_order_no.insert(r.order_no.as_str(), r);
            by_id.insert(r.id.as_str(), r);
        }
        Self { by_order_no, by_id }
    }

    pub fn by_order_no(&self, order_no: &str) -> Option<&'a TransactionRecord> {
        self.by_order_no.get(order_no).copied()
    }

    pub fn by_id(&self, id: &str) -> Option<&'a TransactionRecord> {
        self.by_id.get(id).copied()
    }

    pub fn contains_order_no(&self, order_no: &str) -> bool {
        self.by_order_no.contains_key(order_no)
    }

    pub fn distinct_orders(&self) -> usize {
        self.by_order_no.len()
    }
}

/// A system and an external record sharing an order number.
#[derive(Debug, Clone, Copy)]
pub struct MatchedPair<'a> {
    pub system: &'a TransactionRecord,
    pub external: &'a TransactionRecord,
}

#[derive(Debug, Default)]
pub struct PairMatchOutput<'a> {
    pub matched: Vec<MatchedPair<'a>>,
    pub system_only: Vec<&'a TransactionRecord>,
    pub external_only: Vec<&'a TransactionRecord>,
}

/// Join the two sides on order number. Every output list follows input order.
pub fn match_by_order_no<'a>(
    system: &'a [TransactionRecord],
    external: &'a [TransactionRecord],
) -> PairMatchOutput<'a> {
    let system_index = TransactionIndex::build(system);
    let external_index = TransactionIndex::build(external);

    let mut out = PairMatchOutput::default();

    for sys in system {
        match external_index.by_order_no(&sys.order_no) {
            Some(ext) => out.matched.push(MatchedPair { system: sys, external: ext }),
            None => out.system_only.push(sys),
        }
    }

    for ext in external {
        if !system_index.contains_order_no(&ext.order_no) {
            out.external_only.push(ext);
        }
    }

    out
}
