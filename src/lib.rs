//! Source mutation engine for approximate computing.
//!
//! Mutators match syntax-tree shapes in a Rust source file and rewrite them
//! with approximate equivalents (inexact adders, truncated operands, bounded
//! loop nests). Every edit is logged in a [`mutators::Ledger`]; when a mutant is
//! written, the ledger is linked into a dependency graph by [`provenance`] and
//! appended to a per-strategy CSV report by [`report`].

pub mod config;
pub mod driver;
pub mod error;
pub mod mutators;
pub mod operator;
pub mod provenance;
pub mod report;
pub mod rewrite;
pub mod syntax;

pub use driver::{generate_mutant, run_operator, GenerateOptions, MutationPlan, Selection, SourceUnit};
pub use operator::{MutationOperator, OperatorRegistry};
