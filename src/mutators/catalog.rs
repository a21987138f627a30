// =========================================================================
// STRATEGY CATALOG: the concrete approximate-computing mutators
// =========================================================================
use super::chain::{BinaryChainMutator, ChainEdit};
use super::nested_bounds::NestedBoundsMutator;
use crate::report::ReportLayout;
use crate::syntax::BinaryOpcode;

pub const ADDITIVE: &[BinaryOpcode] = &[BinaryOpcode::Add, BinaryOpcode::Sub];
pub const ARITHMETIC: &[BinaryOpcode] = &[
    BinaryOpcode::Add,
    BinaryOpcode::Sub,
    BinaryOpcode::Mul,
    BinaryOpcode::Div,
];

/// Report shared by the AxDCT mutators.
pub const AXDCT_REPORT: &str = "axdct_report";

fn inexact_adder(edit: &ChainEdit<'_>) -> String {
    format!(
        "inexact_adder({}, {}, {}, {}, InAx1)",
        edit.id,
        edit.lhs,
        edit.rhs,
        edit.op == BinaryOpcode::Sub
    )
}

fn truncating_adder(edit: &ChainEdit<'_>) -> String {
    format!(
        "trunc_adder({}, {}, {}, {})",
        edit.id,
        edit.lhs,
        edit.rhs,
        edit.op == BinaryOpcode::Sub
    )
}

fn truncated_operands(edit: &ChainEdit<'_>) -> String {
    format!(
        "truncate::ax_integer({id}, {}) {} truncate::ax_integer({id}, {})",
        edit.lhs,
        edit.op,
        edit.rhs,
        id = edit.id
    )
}

// 1. InAx1: inexact adder cell on +/- chains
pub fn inax1() -> BinaryChainMutator {
    BinaryChainMutator::new(
        "inax1",
        "Replaces exact integer sums with the InAx1 inexact adder",
        ADDITIVE,
        inexact_adder,
    )
}

// 2. Truncating adder on +/- chains
pub fn trunc_adder() -> BinaryChainMutator {
    BinaryChainMutator::new(
        "trunc_adder",
        "Replaces exact sums with an inexact sum based on truncation",
        ADDITIVE,
        truncating_adder,
    )
}

// 3. Operand truncation on + - * /
pub fn truncate_int() -> BinaryChainMutator {
    BinaryChainMutator::new(
        "truncate_int",
        "Truncates the integer operands of arithmetic operations",
        ARITHMETIC,
        truncated_operands,
    )
    .with_layout(ReportLayout::OperandsWithOpcode)
}

// 4. Loop nests
pub fn loop_breaker() -> NestedBoundsMutator {
    NestedBoundsMutator::new(
        "loop_breaker",
        "Bounds a loop nest by a global base, inner loop up to base minus the outer bound",
    )
}

pub fn axdct_loop() -> NestedBoundsMutator {
    NestedBoundsMutator::new(
        "axdct_loop",
        "Restricts a DCT loop nest to its low-frequency triangle",
    )
    .with_report_name(AXDCT_REPORT)
}

pub fn axdct_adder() -> BinaryChainMutator {
    trunc_adder().with_report_name(AXDCT_REPORT)
}
