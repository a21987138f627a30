use crate::syntax::BinaryOpcode;

/// Whether an operand is itself a binary operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    Leaf,
    /// The operand is a binary operation with this opcode, so it may be the
    /// result of another record in the same chain.
    ChainLink(BinaryOpcode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operand {
    /// Original source text at match time.
    pub text: String,
    pub kind: OperandKind,
    /// Id of the record producing this operand, once resolved.
    pub resolved_to: Option<String>,
}

impl Operand {
    pub fn leaf(text: impl Into<String>) -> Self {
        Operand {
            text: text.into(),
            kind: OperandKind::Leaf,
            resolved_to: None,
        }
    }

    pub fn chain_link(text: impl Into<String>, op: BinaryOpcode) -> Self {
        Operand {
            text: text.into(),
            kind: OperandKind::ChainLink(op),
            resolved_to: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_to.is_some()
    }

    /// Text as reported: the producing record's id when resolved.
    pub fn display(&self) -> &str {
        self.resolved_to.as_deref().unwrap_or(&self.text)
    }

    pub(crate) fn resolve_to(&mut self, id: &str) {
        self.resolved_to = Some(id.to_string());
    }
}

/// One applied edit, as written to the provenance report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub id: String,
    pub line: u32,
    pub lhs: Option<Operand>,
    pub opcode: Option<BinaryOpcode>,
    pub rhs: Option<Operand>,
    /// Variable receiving the mutated expression.
    pub result: Option<String>,
}

impl MutationRecord {
    /// A record without operands, e.g. for a rewritten loop bound.
    pub fn bare(id: impl Into<String>, line: u32) -> Self {
        MutationRecord {
            id: id.into(),
            line,
            lhs: None,
            opcode: None,
            rhs: None,
            result: None,
        }
    }

    pub fn binary(id: impl Into<String>, line: u32, lhs: Operand, opcode: BinaryOpcode, rhs: Operand) -> Self {
        MutationRecord {
            id: id.into(),
            line,
            lhs: Some(lhs),
            opcode: Some(opcode),
            rhs: Some(rhs),
            result: None,
        }
    }

    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.lhs.iter().chain(self.rhs.iter())
    }
}

/// Ordered records a mutator produced within the current unit, plus the
/// serial counter its ids are drawn from.
///
/// Records only enter through a committed [`LedgerTxn`], so a failed
/// `mutate` call leaves neither records nor holes in the numbering.
#[derive(Debug, Default)]
pub struct Ledger {
    records: Vec<MutationRecord>,
    next_serial: u32,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[MutationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn next_serial(&self) -> u32 {
        self.next_serial
    }

    pub fn begin(&mut self) -> LedgerTxn<'_> {
        let next = self.next_serial;
        LedgerTxn {
            ledger: self,
            next,
            pending: Vec::new(),
        }
    }

    /// Removes every record, keeping the serial counter.
    pub fn drain(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }
}

/// Id reservations and records of one `mutate` call.
pub struct LedgerTxn<'a> {
    ledger: &'a mut Ledger,
    next: u32,
    pending: Vec<MutationRecord>,
}

impl LedgerTxn<'_> {
    pub fn reserve(&mut self, prefix: &str) -> String {
        let id = format!("{prefix}{}", self.next);
        self.next += 1;
        id
    }

    pub fn push(&mut self, record: MutationRecord) {
        self.pending.push(record);
    }

    pub fn last_mut(&mut self) -> Option<&mut MutationRecord> {
        self.pending.last_mut()
    }

    pub fn pending(&self) -> &[MutationRecord] {
        &self.pending
    }

    pub fn commit(self) {
        self.ledger.records.extend(self.pending);
        self.ledger.next_serial = self.next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn committed_ids_are_contiguous() {
        let mut ledger = Ledger::new();
        let mut txn = ledger.begin();
        let a = txn.reserve("nab_");
        let b = txn.reserve("nab_");
        txn.push(MutationRecord::bare(a, 1));
        txn.push(MutationRecord::bare(b, 1));
        txn.commit();

        let mut txn = ledger.begin();
        let c = txn.reserve("nab_");
        txn.push(MutationRecord::bare(c, 2));
        txn.commit();

        let ids: Vec<_> = ledger.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["nab_0", "nab_1", "nab_2"]);
        assert_eq!(ledger.next_serial(), 3);
    }

    #[test]
    fn dropped_transaction_leaves_no_trace() {
        let mut ledger = Ledger::new();
        {
            let mut txn = ledger.begin();
            let id = txn.reserve("base_");
            txn.push(MutationRecord::bare(id, 4));
        }
        assert!(ledger.is_empty());
        assert_eq!(ledger.next_serial(), 0);
        let mut txn = ledger.begin();
        assert_eq!(txn.reserve("base_"), "base_0");
    }

    #[test]
    fn drain_keeps_the_counter() {
        let mut ledger = Ledger::new();
        let mut txn = ledger.begin();
        let id = txn.reserve("nab_");
        txn.push(MutationRecord::bare(id, 1));
        txn.commit();
        assert_eq!(ledger.drain().len(), 1);
        assert!(ledger.is_empty());
        assert_eq!(ledger.next_serial(), 1);
    }
}
