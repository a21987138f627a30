//! Post-pass linking ledger records into a dependency graph.
//!
//! Operands are recorded as raw source text. Two best-effort sweeps replace
//! that text with the id of the record that produced it:
//!
//! 1. *operation folding*: a chain-linked operand such as `a + b` is the
//!    result of an earlier record whose own operands `a` and `b` appear in it,
//!    in order, around that record's operator;
//! 2. *definition folding*: a plain identifier operand is the result of the
//!    nearest earlier record that assigned that variable.
//!
//! Both sweeps are textual heuristics. Repeated sub-expressions inside one
//! chain can be linked to the wrong record; a miss keeps the literal text.
//! Matching always reads the original operand text, so resolving twice gives
//! the same ledger.

use tracing::trace;

use crate::mutators::ledger::{MutationRecord, Operand, OperandKind};
use crate::syntax::BinaryOpcode;

pub fn resolve(records: Vec<MutationRecord>) -> Vec<MutationRecord> {
    let snapshot = records.clone();
    let mut out = records;
    fold_operations(&snapshot, &mut out);
    fold_definitions(&snapshot, &mut out);
    out
}

fn operands_mut(record: &mut MutationRecord) -> impl Iterator<Item = &mut Operand> {
    record.lhs.iter_mut().chain(record.rhs.iter_mut())
}

fn fold_operations(snapshot: &[MutationRecord], out: &mut [MutationRecord]) {
    for (i, record) in out.iter_mut().enumerate() {
        for operand in operands_mut(record) {
            if operand.is_resolved() {
                continue;
            }
            let OperandKind::ChainLink(op) = operand.kind else {
                continue;
            };
            // nearest earlier record first: the outermost candidate inside a
            // chain is the one built last
            let producer = snapshot[..i]
                .iter()
                .rev()
                .find(|candidate| produces(candidate, &operand.text, op));
            if let Some(producer) = producer {
                trace!(operand = %operand.text, id = %producer.id, "operand is operation");
                operand.resolve_to(&producer.id);
            }
        }
    }
}

fn produces(candidate: &MutationRecord, text: &str, op: BinaryOpcode) -> bool {
    if candidate.opcode != Some(op) {
        return false;
    }
    match (&candidate.lhs, &candidate.rhs) {
        (Some(lhs), Some(rhs)) => contains_in_order(text, &lhs.text, op.symbol(), &rhs.text),
        _ => false,
    }
}

/// `first`, then `symbol`, then `second`, as substrings of `haystack`.
fn contains_in_order(haystack: &str, first: &str, symbol: &str, second: &str) -> bool {
    if first.is_empty() || second.is_empty() {
        return false;
    }
    let Some(p1) = haystack.find(first) else {
        return false;
    };
    let after = p1 + first.len();
    let Some(p2) = haystack[after..].find(second).map(|p| p + after) else {
        return false;
    };
    haystack[after..p2].contains(symbol)
}

fn is_identifier(text: &str) -> bool {
    syn::parse_str::<syn::Ident>(text).is_ok()
}

fn fold_definitions(snapshot: &[MutationRecord], out: &mut [MutationRecord]) {
    for i in (0..out.len()).rev() {
        for operand in operands_mut(&mut out[i]) {
            if operand.is_resolved() || operand.kind != OperandKind::Leaf || !is_identifier(&operand.text) {
                continue;
            }
            let definition = snapshot[..i]
                .iter()
                .rev()
                .find(|candidate| candidate.result.as_deref() == Some(operand.text.as_str()));
            if let Some(definition) = definition {
                trace!(operand = %operand.text, id = %definition.id, "operand is result");
                operand.resolve_to(&definition.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(id: &str, lhs: Operand, rhs: Operand) -> MutationRecord {
        MutationRecord::binary(id, 1, lhs, BinaryOpcode::Add, rhs)
    }

    fn display(record: &MutationRecord) -> (&str, &str) {
        (
            record.lhs.as_ref().unwrap().display(),
            record.rhs.as_ref().unwrap().display(),
        )
    }

    #[test]
    fn chain_operand_resolves_to_inner_record() {
        let mut outer = add(
            "nab_1",
            Operand::chain_link("a + b", BinaryOpcode::Add),
            Operand::leaf("c"),
        );
        outer.result = Some("z".into());
        let records = vec![add("nab_0", Operand::leaf("a"), Operand::leaf("b")), outer];

        let resolved = resolve(records);
        assert_eq!(display(&resolved[0]), ("a", "b"));
        assert_eq!(display(&resolved[1]), ("nab_0", "c"));
        assert_eq!(resolved[1].result.as_deref(), Some("z"));
    }

    #[test]
    fn longer_chain_links_to_nearest_producer() {
        let records = vec![
            add("nab_0", Operand::leaf("a"), Operand::leaf("b")),
            add("nab_1", Operand::chain_link("a + b", BinaryOpcode::Add), Operand::leaf("c")),
            add("nab_2", Operand::chain_link("a + b + c", BinaryOpcode::Add), Operand::leaf("d")),
        ];
        let resolved = resolve(records);
        assert_eq!(display(&resolved[1]).0, "nab_0");
        assert_eq!(display(&resolved[2]).0, "nab_1");
    }

    #[test]
    fn opcode_must_match() {
        let records = vec![
            add("nab_0", Operand::leaf("a"), Operand::leaf("b")),
            add("nab_1", Operand::chain_link("a * b", BinaryOpcode::Mul), Operand::leaf("c")),
        ];
        let resolved = resolve(records);
        assert_eq!(display(&resolved[1]).0, "a * b");
    }

    #[test]
    fn identifier_operand_links_to_earlier_result() {
        let mut first = add("nab_0", Operand::leaf("a"), Operand::leaf("b"));
        first.result = Some("t".into());
        let records = vec![
            first,
            add("nab_1", Operand::leaf("t"), Operand::leaf("1")),
            // a later definition of `t` must not be picked
            {
                let mut r = add("nab_2", Operand::leaf("x"), Operand::leaf("y"));
                r.result = Some("t".into());
                r
            },
        ];
        let resolved = resolve(records);
        assert_eq!(display(&resolved[1]), ("nab_0", "1"));
        assert_eq!(display(&resolved[2]), ("x", "y"));
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut r1 = add("nab_1", Operand::chain_link("a + b", BinaryOpcode::Add), Operand::leaf("c"));
        r1.result = Some("z".into());
        let records = vec![
            add("nab_0", Operand::leaf("a"), Operand::leaf("b")),
            r1,
            add("nab_2", Operand::leaf("z"), Operand::chain_link("p - q", BinaryOpcode::Sub)),
        ];
        let once = resolve(records);
        let twice = resolve(once.clone());
        assert_eq!(once, twice);
        assert_eq!(display(&once[2]), ("nab_1", "p - q"));
    }

    #[test]
    fn bare_records_pass_through() {
        let records = vec![MutationRecord::bare("base_0", 3)];
        assert_eq!(resolve(records.clone()), records);
    }
}
