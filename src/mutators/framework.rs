use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, trace, trace_span};

use super::ledger::{Ledger, MutationRecord};
use crate::error::{MutateError, ReportError, RewriteError};
use crate::provenance;
use crate::report::{self, ReportLayout};
use crate::rewrite::RewriteBuffer;
use crate::syntax::{NodeId, SyntaxTree};

/// Named sub-nodes captured by a coarse match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binding {
    primary: Option<NodeId>,
    nodes: BTreeMap<&'static str, NodeId>,
}

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, id: NodeId) -> Self {
        self.primary.get_or_insert(id);
        self.nodes.insert(name, id);
        self
    }

    /// The node bound first, i.e. the matched site itself.
    pub fn primary(&self) -> Option<NodeId> {
        self.primary
    }

    pub fn get(&self, name: &'static str) -> Option<NodeId> {
        self.nodes.get(name).copied()
    }

    pub fn require(&self, mutator: &str, name: &'static str) -> Result<NodeId, MutateError> {
        self.get(name)
            .ok_or_else(|| MutateError::missing_binding(mutator, name))
    }
}

/// Inserts a global declaration ahead of the declaration anchor of `func`,
/// or at the start of the unit when the match has no enclosing function.
/// Declarations inserted at the same anchor keep their insertion order.
pub fn insert_global_declaration(
    tree: &SyntaxTree,
    rw: &mut RewriteBuffer,
    func: Option<NodeId>,
    declaration: &str,
) -> Result<(), RewriteError> {
    let anchor = func.map_or(tree.root(), |f| tree.decl_anchor(f));
    let start = tree.range(anchor).start;
    let text = tree.text();
    let line_start = text[..start].rfind('\n').map_or(0, |p| p + 1);
    let prefix = &text[line_start..start];
    let indent = if prefix.chars().all(char::is_whitespace) { prefix } else { "" };

    let mut insertion = String::new();
    for line in declaration.lines() {
        insertion.push_str(line);
        insertion.push('\n');
        insertion.push_str(indent);
    }
    rw.insert_after(start, insertion)
}

// Standard Mutator Interface
pub trait Mutator {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// File stem of the provenance report, shared by mutators that write to
    /// the same artifact.
    fn report_name(&self) -> &str;

    fn report_layout(&self) -> ReportLayout {
        ReportLayout::Operands
    }

    // Step 1: structural shape, once per unit
    fn coarse_match(&self, tree: &SyntaxTree) -> Vec<Binding>;

    // Step 2: precise filter per candidate; must not mutate anything
    fn fine_match(&self, _tree: &SyntaxTree, _binding: &Binding) -> bool {
        true
    }

    // Step 3: rewrite one accepted binding and record it
    fn mutate(
        &self,
        tree: &SyntaxTree,
        binding: &Binding,
        rw: &mut RewriteBuffer,
        ledger: &mut Ledger,
    ) -> Result<(), MutateError>;

    /// Candidates surviving both match phases, in tree order.
    fn collect(&self, tree: &SyntaxTree) -> Vec<Binding> {
        let candidates = self.coarse_match(tree);
        let total = candidates.len();
        let accepted: Vec<Binding> = candidates
            .into_iter()
            .filter(|b| self.fine_match(tree, b))
            .collect();
        debug!(mutator = self.name(), total, accepted = accepted.len(), "collected matches");
        accepted
    }

    /// Applies every accepted match.
    fn run(&self, tree: &SyntaxTree, rw: &mut RewriteBuffer, ledger: &mut Ledger) -> Result<usize, MutateError> {
        self.run_selected(tree, rw, ledger, None)
    }

    /// Like `run()`, but optionally applies only the `selected` accepted
    /// match. `selected` indexes the `collect()` order; bindings are applied
    /// innermost first so enclosing rewrites read the nested ones back.
    /// A binding whose site an earlier edit already replaced is skipped.
    /// Returns the number of bindings mutated.
    fn run_selected(
        &self,
        tree: &SyntaxTree,
        rw: &mut RewriteBuffer,
        ledger: &mut Ledger,
        selected: Option<usize>,
    ) -> Result<usize, MutateError> {
        let bindings = self.collect(tree);
        let mut order: Vec<usize> = (0..bindings.len())
            .filter(|&index| selected.map_or(true, |s| s == index))
            .collect();
        order.sort_by_key(|&index| {
            let depth = bindings[index].primary().map_or(0, |n| tree.ancestors(n).count());
            (std::cmp::Reverse(depth), index)
        });

        let mut applied = 0;
        for index in order {
            let binding = &bindings[index];
            if let Some(site) = binding.primary() {
                if rw.is_rewritten(tree.range(site)) {
                    debug!(mutator = self.name(), index, line = tree.line_of(site), "site already rewritten");
                    continue;
                }
            }
            let _span = trace_span!("mutate", mutator = self.name(), index).entered();
            self.mutate(tree, binding, rw, ledger)?;
            applied += 1;
        }
        trace!(mutator = self.name(), applied, "run finished");
        Ok(applied)
    }

    /// Drains the ledger and links its records by provenance. Leaves the
    /// ledger empty.
    fn finalize(&self, ledger: &mut Ledger) -> Vec<MutationRecord> {
        provenance::resolve(ledger.drain())
    }

    fn write_report(&self, dir: &Path, records: &[MutationRecord]) -> Result<(), ReportError> {
        report::append(dir, self.report_name(), self.report_layout(), records)
    }

    /// Finalize hook: called once per materialized mutant, after all edits
    /// and before the mutant source is written.
    fn on_mutant_created(&self, ledger: &mut Ledger, dir: &Path) -> Result<(), ReportError> {
        let records = self.finalize(ledger);
        self.write_report(dir, &records)
    }
}
