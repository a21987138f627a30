// =========================================================================
// BINARY CHAIN: approximate arithmetic over chains of one operator family
// =========================================================================
//
// A match is the innermost link of a chain such as `a + b - c`. Mutating it
// replaces that link with a template call, then walks up the parent index and
// replaces every enclosing link of the same family, reading the operands back
// from the rewrite buffer so inner replacements nest inside outer ones.
// A chain of `k` links yields `k` records.

use tracing::{debug, trace, warn};

use super::framework::{insert_global_declaration, Binding, Mutator};
use super::ledger::{Ledger, MutationRecord, Operand};
use crate::error::MutateError;
use crate::report::ReportLayout;
use crate::rewrite::RewriteBuffer;
use crate::syntax::{AncestorShape, BinaryOpcode, LiteralKind, NodeId, NodeKind, SyntaxTree};

pub const ID_PREFIX: &str = "nab_";

/// Inputs of one link replacement. Operand texts are already rewritten.
#[derive(Debug, Clone, Copy)]
pub struct ChainEdit<'a> {
    pub id: &'a str,
    pub op: BinaryOpcode,
    pub lhs: &'a str,
    pub rhs: &'a str,
}

pub type ChainTemplate = fn(&ChainEdit<'_>) -> String;

/// Declaration emitted for every reserved id.
pub type DeclarationTemplate = fn(&str) -> String;

pub fn int_parameter(id: &str) -> String {
    format!("#[allow(non_upper_case_globals)]\nstatic {id}: i32 = 0;")
}

enum Step {
    Continue(NodeId),
    Stop(Option<String>),
}

pub struct BinaryChainMutator {
    name: String,
    description: String,
    report_name: String,
    layout: ReportLayout,
    family: &'static [BinaryOpcode],
    template: ChainTemplate,
    declaration: DeclarationTemplate,
}

impl BinaryChainMutator {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        family: &'static [BinaryOpcode],
        template: ChainTemplate,
    ) -> Self {
        let name = name.into();
        BinaryChainMutator {
            report_name: format!("{name}_report"),
            name,
            description: description.into(),
            layout: ReportLayout::Operands,
            family,
            template,
            declaration: int_parameter,
        }
    }

    pub fn with_report_name(mut self, report_name: impl Into<String>) -> Self {
        self.report_name = report_name.into();
        self
    }

    pub fn with_layout(mut self, layout: ReportLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_declaration(mut self, declaration: DeclarationTemplate) -> Self {
        self.declaration = declaration;
        self
    }

    fn in_family(&self, op: BinaryOpcode) -> bool {
        self.family.contains(&op)
    }

    fn family_op(&self, tree: &SyntaxTree, id: NodeId) -> Option<BinaryOpcode> {
        tree.kind(id).binary_op().filter(|&op| self.in_family(op))
    }

    fn operands(tree: &SyntaxTree, id: NodeId) -> Option<(NodeId, NodeId)> {
        match tree.children(id) {
            [lhs, rhs] => Some((*lhs, *rhs)),
            _ => None,
        }
    }

    fn operand_record(tree: &SyntaxTree, id: NodeId) -> Operand {
        let text = tree.source_text(id);
        match tree.kind(tree.skip_parens_and_casts(id)).binary_op() {
            Some(op) => Operand::chain_link(text, op),
            None => Operand::leaf(text),
        }
    }

    fn acceptable_operand(&self, tree: &SyntaxTree, id: NodeId) -> bool {
        if tree.source_text(id).trim().is_empty() {
            return false;
        }
        match tree.kind(tree.skip_parens_and_casts(id)) {
            // not the innermost link
            NodeKind::Binary { op } => !self.in_family(*op),
            NodeKind::Lit {
                literal: LiteralKind::Float | LiteralKind::Str,
            } => false,
            _ => true,
        }
    }

    /// Whether the walk may climb from `child` into `parent`. When the left
    /// operand is reached while the right one is still a chain, the right
    /// chain's own walk rewrites `parent` later.
    fn right_chain_pending(&self, tree: &SyntaxTree, parent: NodeId, child: NodeId) -> bool {
        match Self::operands(tree, parent) {
            Some((lhs, rhs)) if lhs == child => self
                .family_op(tree, tree.skip_parens_and_casts(rhs))
                .is_some(),
            _ => false,
        }
    }

    fn next_link(&self, tree: &SyntaxTree, node: NodeId) -> Step {
        let mut current = node;
        loop {
            match tree.parent_shape(current) {
                AncestorShape::ParenWrapper(wrapper) | AncestorShape::CastWrapper(wrapper) => current = wrapper,
                AncestorShape::BinaryLink { node: parent, op } if self.in_family(op) => {
                    if self.right_chain_pending(tree, parent, current) {
                        debug!(mutator = %self.name, line = tree.line_of(parent), "right operand chain pending");
                        return Step::Stop(None);
                    }
                    return Step::Continue(parent);
                }
                AncestorShape::BinaryLink { node: parent, op } => {
                    warn!(
                        mutator = %self.name,
                        line = tree.line_of(parent),
                        %op,
                        "chain-walk stopped at operator of another family"
                    );
                    return Step::Stop(None);
                }
                AncestorShape::Assignment { target, .. } => return Step::Stop(target),
                AncestorShape::Declaration { binding, .. } => return Step::Stop(binding),
                AncestorShape::Top => return Step::Stop(None),
                AncestorShape::Other { node: parent, kind } => {
                    warn!(
                        mutator = %self.name,
                        line = tree.line_of(parent),
                        kind,
                        "chain-walk stopped at unexpected ancestor"
                    );
                    return Step::Stop(None);
                }
            }
        }
    }
}

impl Mutator for BinaryChainMutator {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn report_name(&self) -> &str {
        &self.report_name
    }

    fn report_layout(&self) -> ReportLayout {
        self.layout
    }

    fn coarse_match(&self, tree: &SyntaxTree) -> Vec<Binding> {
        let needs_fn = matches!(tree.kind(tree.root()), NodeKind::File);
        tree.ids()
            .filter_map(|id| {
                self.family_op(tree, id)?;
                let excluded = tree.has_ancestor(id, |k| {
                    matches!(
                        k,
                        NodeKind::Call | NodeKind::MethodCall | NodeKind::Index | NodeKind::Macro
                    )
                });
                if excluded {
                    return None;
                }
                let func = tree.enclosing_fn(id);
                if needs_fn && func.is_none() {
                    return None;
                }
                let (lhs, rhs) = Self::operands(tree, id)?;
                let binding = Binding::new().with("op", id).with("lhs", lhs).with("rhs", rhs);
                Some(match func {
                    Some(f) => binding.with("function", f),
                    None => binding,
                })
            })
            .collect()
    }

    fn fine_match(&self, tree: &SyntaxTree, binding: &Binding) -> bool {
        let (Some(lhs), Some(rhs)) = (binding.get("lhs"), binding.get("rhs")) else {
            return false;
        };
        let accepted = self.acceptable_operand(tree, lhs) && self.acceptable_operand(tree, rhs);
        if !accepted {
            trace!(mutator = %self.name, text = tree.source_text(lhs), "candidate rejected");
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
        let mut node = binding.require(&self.name, "op")?;
        let func = binding.get("function");
        let mut txn = ledger.begin();

        loop {
            let line = tree.line_of(node);
            let rewrite_err = |e| MutateError::rewrite(&self.name, line, e);
            let (Some(op), Some((lhs, rhs))) = (self.family_op(tree, node), Self::operands(tree, node)) else {
                return Err(MutateError::precondition(
                    &self.name,
                    line,
                    format!("`{}` is not a binary operation of this family", tree.source_text(node)),
                ));
            };

            let id = txn.reserve(ID_PREFIX);
            insert_global_declaration(tree, rw, func, &(self.declaration)(&id)).map_err(rewrite_err)?;

            let lhs_text = rw.rewritten_text(tree.range(lhs)).map_err(rewrite_err)?;
            let rhs_text = rw.rewritten_text(tree.range(rhs)).map_err(rewrite_err)?;
            let replacement = (self.template)(&ChainEdit {
                id: &id,
                op,
                lhs: &lhs_text,
                rhs: &rhs_text,
            });
            rw.replace(tree.range(node), replacement).map_err(rewrite_err)?;
            trace!(mutator = %self.name, %id, line, "link replaced");

            txn.push(MutationRecord::binary(
                id,
                line,
                Self::operand_record(tree, lhs),
                op,
                Self::operand_record(tree, rhs),
            ));

            match self.next_link(tree, node) {
                Step::Continue(parent) => node = parent,
                Step::Stop(result) => {
                    if let (Some(result), Some(last)) = (result, txn.last_mut()) {
                        last.result = Some(result);
                    }
                    break;
                }
            }
        }

        txn.commit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutators::ledger::OperandKind;

    const ADDITIVE: &[BinaryOpcode] = &[BinaryOpcode::Add, BinaryOpcode::Sub];

    fn ax(edit: &ChainEdit<'_>) -> String {
        format!("ax({}, {}, {})", edit.id, edit.lhs, edit.rhs)
    }

    fn plain_decl(id: &str) -> String {
        format!("static {id}: i32 = 0;")
    }

    fn mutator() -> BinaryChainMutator {
        BinaryChainMutator::new("ax", "test adder", ADDITIVE, ax).with_declaration(plain_decl)
    }

    fn run(src: &str) -> (String, Ledger) {
        let tree = SyntaxTree::parse_file(src).unwrap();
        let mut rw = RewriteBuffer::new(tree.text());
        let mut ledger = Ledger::new();
        mutator().run(&tree, &mut rw, &mut ledger).unwrap();
        (rw.render(), ledger)
    }

    #[test]
    fn assignment_chain_yields_two_records() {
        let (out, ledger) = run("fn f() { z = a + b + c; }");
        assert_eq!(
            out,
            "static nab_0: i32 = 0;\nstatic nab_1: i32 = 0;\nfn f() { z = ax(nab_1, ax(nab_0, a, b), c); }"
        );
        let records = ledger.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "nab_0");
        assert_eq!(records[0].lhs.as_ref().unwrap().text, "a");
        assert_eq!(records[0].result, None);
        let second = &records[1];
        assert_eq!(second.id, "nab_1");
        assert_eq!(second.lhs.as_ref().unwrap().text, "a + b");
        assert_eq!(
            second.lhs.as_ref().unwrap().kind,
            OperandKind::ChainLink(BinaryOpcode::Add)
        );
        assert_eq!(second.rhs.as_ref().unwrap().text, "c");
        assert_eq!(second.result.as_deref(), Some("z"));
    }

    #[test]
    fn chain_of_k_links_yields_k_records() {
        let (out, ledger) = run("fn f() {\n    let s = a + b - c + d;\n}\n");
        let ids: Vec<_> = ledger.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["nab_0", "nab_1", "nab_2"]);
        assert_eq!(ledger.records()[2].opcode, Some(BinaryOpcode::Add));
        assert_eq!(ledger.records()[1].opcode, Some(BinaryOpcode::Sub));
        assert_eq!(ledger.records()[2].result.as_deref(), Some("s"));
        assert!(out.contains("let s = ax(nab_2, ax(nab_1, ax(nab_0, a, b), c), d);"));
    }

    #[test]
    fn declarations_follow_method_anchor_indentation() {
        let src = "mod m {\n    struct S;\n    impl S {\n        fn g(&self) { x += a - b; }\n    }\n}\n";
        let (out, ledger) = run(src);
        assert!(out.contains("    static nab_0: i32 = 0;\n    impl S {"));
        assert_eq!(ledger.records()[0].result.as_deref(), Some("x"));
    }

    #[test]
    fn walk_reaching_the_top_of_the_unit_has_no_result() {
        let tree = SyntaxTree::parse_expr("(a + b) + c").unwrap();
        let mut rw = RewriteBuffer::new(tree.text());
        let mut ledger = Ledger::new();
        let applied = mutator().run(&tree, &mut rw, &mut ledger).unwrap();
        assert_eq!(applied, 1);
        assert_eq!(ledger.len(), 2);
        assert!(ledger.records().iter().all(|r| r.result.is_none()));
        assert!(rw.render().ends_with("ax(nab_1, (ax(nab_0, a, b)), c)"));
    }

    #[test]
    fn both_sides_of_a_tree_are_rewritten_once() {
        let (out, ledger) = run("fn f() { z = (a + b) + (c - d); }");
        assert!(out.ends_with("z = ax(nab_2, (ax(nab_0, a, b)), (ax(nab_1, c, d))); }"));
        let records = ledger.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].result, None);
        assert_eq!(records[2].result.as_deref(), Some("z"));
    }

    #[test]
    fn fine_match_keeps_innermost_integer_links() {
        let tree = SyntaxTree::parse_file(
            "fn f() { x = a + 1.5; y = a + b + c; w = s + \"t\"; v = g(a + b); }",
        )
        .unwrap();
        let accepted = mutator().collect(&tree);
        assert_eq!(accepted.len(), 1);
        let op = accepted[0].get("op").unwrap();
        assert_eq!(tree.source_text(op), "a + b");
    }

    #[test]
    fn other_family_parent_stops_the_walk() {
        let (out, ledger) = run("fn f() { if a + b < c { } }");
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.records()[0].result, None);
        assert!(out.contains("if ax(nab_0, a, b) < c"));
    }

    #[test]
    fn chain_under_another_family_is_rewritten_before_its_enclosing_chain() {
        let (out, ledger) = run("fn f() { z = (a + b) * c + d; }");
        assert!(out.ends_with("z = ax(nab_1, (ax(nab_0, a, b)) * c, d); }"));
        let records = ledger.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].result, None);
        assert_eq!(records[1].lhs.as_ref().unwrap().text, "(a + b) * c");
        assert_eq!(records[1].result.as_deref(), Some("z"));
    }

    #[test]
    fn walk_climbs_through_casts() {
        let (out, ledger) = run("fn f() { z = (a + b) as i32 + c; }");
        assert!(out.ends_with("z = ax(nab_1, (ax(nab_0, a, b)) as i32, c); }"));
        let second = &ledger.records()[1];
        assert_eq!(
            second.lhs.as_ref().unwrap().kind,
            OperandKind::ChainLink(BinaryOpcode::Add)
        );
        assert_eq!(second.result.as_deref(), Some("z"));
    }

    #[test]
    fn sites_inside_an_earlier_replacement_are_skipped() {
        let tree = SyntaxTree::parse_file("fn f() { for i in 0..n - 1 {} }").unwrap();
        let mut rw = RewriteBuffer::new(tree.text());
        let bound = tree.text().find("n - 1").unwrap();
        rw.replace(bound..bound + 5, "base_0").unwrap();
        let mut ledger = Ledger::new();
        let applied = mutator().run(&tree, &mut rw, &mut ledger).unwrap();
        assert_eq!(applied, 0);
        assert!(ledger.is_empty());
        assert_eq!(ledger.next_serial(), 0);
        assert_eq!(rw.render(), "fn f() { for i in 0..base_0 {} }");
    }

    #[test]
    fn items_outside_functions_are_not_matched() {
        let tree = SyntaxTree::parse_file("const N: i32 = 1 + 2;").unwrap();
        assert!(mutator().collect(&tree).is_empty());
    }
}
