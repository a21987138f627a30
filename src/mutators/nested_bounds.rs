// =========================================================================
// NESTED BOUNDS: shrink a loop nest to a triangular iteration space
// =========================================================================
//
// The outer loop bound becomes a fresh global `base_K`, the first loop in its
// body runs up to `base_K - N` where `N` is the outer loop's original bound.
//
//   for i in 0..n {            for i in 0..base_0 {
//       for j in 0..m {   =>       for j in 0..base_0 - n {

use tracing::trace;

use super::framework::{insert_global_declaration, Binding, Mutator};
use super::ledger::{Ledger, MutationRecord};
use crate::error::MutateError;
use crate::rewrite::RewriteBuffer;
use crate::syntax::{NodeId, NodeKind, SyntaxTree};

pub const ID_PREFIX: &str = "base_";
pub const DEFAULT_BASE: u32 = 8;

pub struct NestedBoundsMutator {
    name: String,
    description: String,
    report_name: String,
    base: u32,
}

impl NestedBoundsMutator {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        NestedBoundsMutator {
            report_name: format!("{name}_report"),
            name,
            description: description.into(),
            base: DEFAULT_BASE,
        }
    }

    pub fn with_report_name(mut self, report_name: impl Into<String>) -> Self {
        self.report_name = report_name.into();
        self
    }

    pub fn with_base(mut self, base: u32) -> Self {
        self.base = base;
        self
    }

    fn declaration(&self, id: &str) -> String {
        format!(
            "#[allow(non_upper_case_globals)]\nstatic {id}: usize = {};",
            self.base
        )
    }

    fn is_atom(tree: &SyntaxTree, id: NodeId) -> bool {
        matches!(
            tree.kind(id),
            NodeKind::Path { .. }
                | NodeKind::Lit { .. }
                | NodeKind::Paren
                | NodeKind::Call
                | NodeKind::MethodCall
                | NodeKind::Index
                | NodeKind::Macro
        )
    }

    fn precondition(&self, tree: &SyntaxTree, node: NodeId, reason: &str) -> MutateError {
        MutateError::precondition(&self.name, tree.line_of(node), reason)
    }
}

impl Mutator for NestedBoundsMutator {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn report_name(&self) -> &str {
        &self.report_name
    }

    fn coarse_match(&self, tree: &SyntaxTree) -> Vec<Binding> {
        let needs_fn = matches!(tree.kind(tree.root()), NodeKind::File);
        tree.ids()
            .filter(|&id| matches!(tree.kind(id), NodeKind::ForLoop | NodeKind::While))
            .filter(|&id| !tree.has_ancestor(id, NodeKind::is_loop))
            .filter_map(|id| {
                let func = tree.enclosing_fn(id);
                if needs_fn && func.is_none() {
                    return None;
                }
                let binding = Binding::new().with("loop", id);
                Some(match func {
                    Some(f) => binding.with("function", f),
                    None => binding,
                })
            })
            .collect()
    }

    // A counted loop whose body holds another counted loop.
    fn fine_match(&self, tree: &SyntaxTree, binding: &Binding) -> bool {
        let Some(outer) = binding.get("loop") else {
            return false;
        };
        let inner = tree.loop_body(outer).and_then(|body| tree.nested_loop(body));
        let accepted = match inner {
            Some(inner) => tree.loop_bound(outer).is_some() && tree.loop_bound(inner).is_some(),
            None => false,
        };
        if !accepted {
            trace!(mutator = %self.name, line = tree.line_of(outer), "loop nest rejected");
        }
        accepted
    }

    fn mutate(
        &self,
        tree: &SyntaxTree,
        binding: &Binding,
        rw: &mut RewriteBuffer,
        ledger: &mut Ledger,
    ) -> Result<(), MutateError> {
        let outer = binding.require(&self.name, "loop")?;
        let func = binding.get("function");
        let line = tree.line_of(outer);

        let outer_bound = tree
            .loop_bound(outer)
            .ok_or_else(|| self.precondition(tree, outer, "outer loop has no `a..N` or `i < N` bound"))?;
        let body = tree
            .loop_body(outer)
            .ok_or_else(|| self.precondition(tree, outer, "loop has no body"))?;
        let inner = tree
            .nested_loop(body)
            .ok_or_else(|| self.precondition(tree, outer, "no nested loop in the loop body"))?;
        let inner_bound = tree
            .loop_bound(inner)
            .ok_or_else(|| self.precondition(tree, inner, "nested loop has no `a..N` or `i < N` bound"))?;

        let rewrite_err = |e| MutateError::rewrite(&self.name, line, e);
        let mut txn = ledger.begin();
        let id = txn.reserve(ID_PREFIX);
        insert_global_declaration(tree, rw, func, &self.declaration(&id)).map_err(rewrite_err)?;

        let bound_text = tree.source_text(outer_bound);
        let bound = if Self::is_atom(tree, outer_bound) {
            bound_text.to_string()
        } else {
            format!("({bound_text})")
        };
        rw.replace(tree.range(outer_bound), id.as_str()).map_err(rewrite_err)?;
        rw.replace(tree.range(inner_bound), format!("{id} - {bound}"))
            .map_err(rewrite_err)?;
        trace!(mutator = %self.name, %id, line, bound = bound_text, "loop nest bounded");

        txn.push(MutationRecord::bare(id, line));
        txn.commit();
        Ok(())
    }
}
