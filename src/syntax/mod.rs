//! Read-only arena snapshot of a parsed compilation unit.
//!
//! The mutation engine never touches `syn` types directly: it navigates this
//! arena (pre-order node list with parent indices) and asks the rewrite buffer
//! for text. One tree is built per unit and per mutant, then dropped.

mod builder;
mod line_index;

use std::fmt;
use std::ops::Range;

use syn::BinOp;

use crate::error::FrontEndError;

pub use line_index::LineIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Binary operator of an expression node, without the compound-assign flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOpcode {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    BitXor,
    BitAnd,
    BitOr,
    Shl,
    Shr,
    Eq,
    Lt,
    Le,
    Ne,
    Ge,
    Gt,
}

impl BinaryOpcode {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOpcode::Add => "+",
            BinaryOpcode::Sub => "-",
            BinaryOpcode::Mul => "*",
            BinaryOpcode::Div => "/",
            BinaryOpcode::Rem => "%",
            BinaryOpcode::And => "&&",
            BinaryOpcode::Or => "||",
            BinaryOpcode::BitXor => "^",
            BinaryOpcode::BitAnd => "&",
            BinaryOpcode::BitOr => "|",
            BinaryOpcode::Shl => "<<",
            BinaryOpcode::Shr => ">>",
            BinaryOpcode::Eq => "==",
            BinaryOpcode::Lt => "<",
            BinaryOpcode::Le => "<=",
            BinaryOpcode::Ne => "!=",
            BinaryOpcode::Ge => ">=",
            BinaryOpcode::Gt => ">",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        const ALL: [BinaryOpcode; 18] = [
            BinaryOpcode::Add,
            BinaryOpcode::Sub,
            BinaryOpcode::Mul,
            BinaryOpcode::Div,
            BinaryOpcode::Rem,
            BinaryOpcode::And,
            BinaryOpcode::Or,
            BinaryOpcode::BitXor,
            BinaryOpcode::BitAnd,
            BinaryOpcode::BitOr,
            BinaryOpcode::Shl,
            BinaryOpcode::Shr,
            BinaryOpcode::Eq,
            BinaryOpcode::Lt,
            BinaryOpcode::Le,
            BinaryOpcode::Ne,
            BinaryOpcode::Ge,
            BinaryOpcode::Gt,
        ];
        ALL.into_iter().find(|op| op.symbol() == symbol)
    }

    /// Splits a `syn` operator into its opcode and whether it is a compound
    /// assignment (`+=`, `<<=`, ...).
    pub fn from_bin_op(op: &BinOp) -> Option<(Self, bool)> {
        let pair = match op {
            BinOp::Add(_) => (BinaryOpcode::Add, false),
            BinOp::Sub(_) => (BinaryOpcode::Sub, false),
            BinOp::Mul(_) => (BinaryOpcode::Mul, false),
            BinOp::Div(_) => (BinaryOpcode::Div, false),
            BinOp::Rem(_) => (BinaryOpcode::Rem, false),
            BinOp::And(_) => (BinaryOpcode::And, false),
            BinOp::Or(_) => (BinaryOpcode::Or, false),
            BinOp::BitXor(_) => (BinaryOpcode::BitXor, false),
            BinOp::BitAnd(_) => (BinaryOpcode::BitAnd, false),
            BinOp::BitOr(_) => (BinaryOpcode::BitOr, false),
            BinOp::Shl(_) => (BinaryOpcode::Shl, false),
            BinOp::Shr(_) => (BinaryOpcode::Shr, false),
            BinOp::Eq(_) => (BinaryOpcode::Eq, false),
            BinOp::Lt(_) => (BinaryOpcode::Lt, false),
            BinOp::Le(_) => (BinaryOpcode::Le, false),
            BinOp::Ne(_) => (BinaryOpcode::Ne, false),
            BinOp::Ge(_) => (BinaryOpcode::Ge, false),
            BinOp::Gt(_) => (BinaryOpcode::Gt, false),
            BinOp::AddAssign(_) => (BinaryOpcode::Add, true),
            BinOp::SubAssign(_) => (BinaryOpcode::Sub, true),
            BinOp::MulAssign(_) => (BinaryOpcode::Mul, true),
            BinOp::DivAssign(_) => (BinaryOpcode::Div, true),
            BinOp::RemAssign(_) => (BinaryOpcode::Rem, true),
            BinOp::BitXorAssign(_) => (BinaryOpcode::BitXor, true),
            BinOp::BitAndAssign(_) => (BinaryOpcode::BitAnd, true),
            BinOp::BitOrAssign(_) => (BinaryOpcode::BitOr, true),
            BinOp::ShlAssign(_) => (BinaryOpcode::Shl, true),
            BinOp::ShrAssign(_) => (BinaryOpcode::Shr, true),
            _ => return None,
        };
        Some(pair)
    }
}

impl fmt::Display for BinaryOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Int,
    Float,
    Str,
    Other,
}

/// Structural kind tag of an arena node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Mod,
    Fn { name: String },
    Impl,
    Trait,
    OtherItem,
    Block,
    /// `let` statement; `binding` is set for a plain identifier pattern.
    Local { binding: Option<String> },
    /// Children: `[lhs, rhs]`.
    Binary { op: BinaryOpcode },
    /// Plain or compound assignment. Children: `[target, value]`.
    Assign {
        target: Option<String>,
        compound: Option<BinaryOpcode>,
    },
    Paren,
    Cast,
    Call,
    MethodCall,
    Index,
    Macro,
    /// Children: `[iterable, body]`.
    ForLoop,
    /// Children: `[condition, body]`.
    While,
    Loop,
    /// Children: the present bounds, start first.
    Range { has_start: bool, has_end: bool },
    /// Nested `{ ... }` used as an expression; child is its `Block`.
    BlockExpr,
    Path { ident: Option<String> },
    Lit { literal: LiteralKind },
    OtherExpr,
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::File => "File",
            NodeKind::Mod => "Mod",
            NodeKind::Fn { .. } => "Fn",
            NodeKind::Impl => "Impl",
            NodeKind::Trait => "Trait",
            NodeKind::OtherItem => "Item",
            NodeKind::Block => "Block",
            NodeKind::Local { .. } => "Local",
            NodeKind::Binary { .. } => "Binary",
            NodeKind::Assign { .. } => "Assign",
            NodeKind::Paren => "Paren",
            NodeKind::Cast => "Cast",
            NodeKind::Call => "Call",
            NodeKind::MethodCall => "MethodCall",
            NodeKind::Index => "Index",
            NodeKind::Macro => "Macro",
            NodeKind::ForLoop => "ForLoop",
            NodeKind::While => "While",
            NodeKind::Loop => "Loop",
            NodeKind::Range { .. } => "Range",
            NodeKind::BlockExpr => "BlockExpr",
            NodeKind::Path { .. } => "Path",
            NodeKind::Lit { .. } => "Lit",
            NodeKind::OtherExpr => "Expr",
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, NodeKind::ForLoop | NodeKind::While | NodeKind::Loop)
    }

    pub fn binary_op(&self) -> Option<BinaryOpcode> {
        match self {
            NodeKind::Binary { op } => Some(*op),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub range: Range<usize>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Shape of the nearest ancestor as seen by the chain-walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AncestorShape {
    /// The node is the root of the unit.
    Top,
    BinaryLink { node: NodeId, op: BinaryOpcode },
    ParenWrapper(NodeId),
    /// An `as` cast around the node.
    CastWrapper(NodeId),
    Declaration { node: NodeId, binding: Option<String> },
    Assignment { node: NodeId, target: Option<String> },
    Other { node: NodeId, kind: &'static str },
}

#[derive(Debug, Clone)]
pub struct SyntaxTree {
    text: String,
    lines: LineIndex,
    nodes: Vec<Node>,
}

impl SyntaxTree {
    /// Parses a whole source file. A leading byte-order mark is dropped.
    pub fn parse_file(source: &str) -> Result<Self, FrontEndError> {
        let text = source.strip_prefix('\u{feff}').unwrap_or(source).to_string();
        let file = syn::parse_file(&text).map_err(|e| FrontEndError::parse(&e))?;
        Ok(builder::TreeBuilder::new(text).build_file(&file))
    }

    /// Parses a lone expression as the unit; the expression node is the root.
    pub fn parse_expr(source: &str) -> Result<Self, FrontEndError> {
        let expr: syn::Expr = syn::parse_str(source).map_err(|e| FrontEndError::parse(&e))?;
        Ok(builder::TreeBuilder::new(source.to_string()).build_expr(&expr))
    }

    pub(crate) fn from_parts(text: String, lines: LineIndex, nodes: Vec<Node>) -> Self {
        SyntaxTree { text, lines, nodes }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn range(&self, id: NodeId) -> Range<usize> {
        self.nodes[id.0].range.clone()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// All node ids in tree (pre-)order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.parent(id),
        }
    }

    pub fn has_ancestor(&self, id: NodeId, pred: impl Fn(&NodeKind) -> bool) -> bool {
        self.ancestors(id).any(|a| pred(self.kind(a)))
    }

    /// Original source text of a node.
    pub fn source_text(&self, id: NodeId) -> &str {
        &self.text[self.range(id)]
    }

    pub fn line_of(&self, id: NodeId) -> u32 {
        self.lines.line_of(self.nodes[id.0].range.start)
    }

    pub fn line_of_offset(&self, offset: usize) -> u32 {
        self.lines.line_of(offset)
    }

    pub fn enclosing_fn(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id)
            .find(|&a| matches!(self.kind(a), NodeKind::Fn { .. }))
    }

    /// Where global declarations for code inside `func` are inserted: before
    /// the function itself, or before the enclosing `impl`/`trait` block for
    /// methods, which cannot host item declarations next to them.
    pub fn decl_anchor(&self, func: NodeId) -> NodeId {
        match self.parent(func) {
            Some(p) if matches!(self.kind(p), NodeKind::Impl | NodeKind::Trait) => p,
            _ => func,
        }
    }

    /// Strips parentheses and casts around an expression.
    pub fn skip_parens_and_casts(&self, mut id: NodeId) -> NodeId {
        while matches!(self.kind(id), NodeKind::Paren | NodeKind::Cast) {
            match self.children(id).first() {
                Some(&inner) => id = inner,
                None => break,
            }
        }
        id
    }

    /// Classifies the immediate parent of `id`.
    pub fn parent_shape(&self, id: NodeId) -> AncestorShape {
        let Some(parent) = self.parent(id) else {
            return AncestorShape::Top;
        };
        match self.kind(parent) {
            NodeKind::Binary { op } => AncestorShape::BinaryLink {
                node: parent,
                op: *op,
            },
            NodeKind::Paren => AncestorShape::ParenWrapper(parent),
            NodeKind::Cast => AncestorShape::CastWrapper(parent),
            NodeKind::Assign { target, .. } => {
                // only the value side of an assignment produces a result
                if self.children(parent).first() == Some(&id) {
                    AncestorShape::Other {
                        node: parent,
                        kind: "AssignTarget",
                    }
                } else {
                    AncestorShape::Assignment {
                        node: parent,
                        target: target.clone(),
                    }
                }
            }
            NodeKind::Local { binding } => AncestorShape::Declaration {
                node: parent,
                binding: binding.clone(),
            },
            NodeKind::Fn { .. } | NodeKind::OtherItem => AncestorShape::Declaration {
                node: parent,
                binding: None,
            },
            other => AncestorShape::Other {
                node: parent,
                kind: other.label(),
            },
        }
    }

    /// The loop body block of a `for`/`while`/`loop` node.
    pub fn loop_body(&self, id: NodeId) -> Option<NodeId> {
        match self.kind(id) {
            NodeKind::ForLoop | NodeKind::While => self.children(id).get(1).copied(),
            NodeKind::Loop => self.children(id).first().copied(),
            _ => None,
        }
    }

    /// The bound expression of a loop test: the end of `a..N` in a `for`, or
    /// the right side of `i < N` in a `while`.
    pub fn loop_bound(&self, id: NodeId) -> Option<NodeId> {
        let head = *self.children(id).first()?;
        let head = self.skip_parens_and_casts(head);
        match (self.kind(id), self.kind(head)) {
            (NodeKind::ForLoop, NodeKind::Range { has_end: true, .. }) => {
                self.children(head).last().copied()
            }
            (NodeKind::While, NodeKind::Binary { op }) if matches!(op, BinaryOpcode::Lt | BinaryOpcode::Le) => {
                self.children(head).get(1).copied()
            }
            _ => None,
        }
    }

    /// Unwraps blocks holding a single statement.
    pub fn ignore_containers(&self, mut id: NodeId) -> NodeId {
        loop {
            match self.kind(id) {
                NodeKind::Block | NodeKind::BlockExpr if self.children(id).len() == 1 => {
                    id = self.children(id)[0];
                }
                _ => return id,
            }
        }
    }

    /// First loop directly inside a loop body, looking through single
    /// statement blocks.
    pub fn nested_loop(&self, body: NodeId) -> Option<NodeId> {
        let body = self.ignore_containers(body);
        if self.kind(body).is_loop() {
            return Some(body);
        }
        if !matches!(self.kind(body), NodeKind::Block | NodeKind::BlockExpr) {
            return None;
        }
        self.children(body)
            .iter()
            .map(|&stmt| self.ignore_containers(stmt))
            .find(|&stmt| self.kind(stmt).is_loop())
    }
}

pub struct Ancestors<'a> {
    tree: &'a SyntaxTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(tree: &SyntaxTree, pred: impl Fn(&NodeKind) -> bool) -> Vec<NodeId> {
        tree.ids().filter(|&id| pred(tree.kind(id))).collect()
    }

    #[test]
    fn binary_chain_is_nested_left_associative() {
        let tree = SyntaxTree::parse_file("fn f() { z = a + b + c; }").unwrap();
        let adds = find(&tree, |k| matches!(k, NodeKind::Binary { op: BinaryOpcode::Add }));
        assert_eq!(adds.len(), 2);
        // pre-order: the outer node comes first
        assert_eq!(tree.source_text(adds[0]), "a + b + c");
        assert_eq!(tree.source_text(adds[1]), "a + b");
        assert_eq!(tree.parent(adds[1]), Some(adds[0]));
        assert_eq!(
            tree.parent_shape(adds[0]),
            AncestorShape::Assignment {
                node: tree.parent(adds[0]).unwrap(),
                target: Some("z".to_string()),
            }
        );
    }

    #[test]
    fn lines_and_anchor_follow_the_source() {
        let src = "struct S;\nimpl S {\n    fn m(&self) -> i32 {\n        1 + 2\n    }\n}\n";
        let tree = SyntaxTree::parse_file(src).unwrap();
        let add = find(&tree, |k| matches!(k, NodeKind::Binary { .. }))[0];
        assert_eq!(tree.line_of(add), 4);
        let func = tree.enclosing_fn(add).unwrap();
        assert_eq!(tree.line_of(func), 3);
        let anchor = tree.decl_anchor(func);
        assert_eq!(tree.kind(anchor), &NodeKind::Impl);
        assert_eq!(tree.line_of(anchor), 2);
    }

    #[test]
    fn nested_loops_expose_bounds() {
        let src = "fn f(n: usize, m: usize) {\n    for i in 0..n {\n        for j in 0..m {\n            g(i, j);\n        }\n    }\n}\n";
        let tree = SyntaxTree::parse_file(src).unwrap();
        let loops = find(&tree, NodeKind::is_loop);
        assert_eq!(loops.len(), 2);
        let outer = loops[0];
        assert_eq!(tree.source_text(tree.loop_bound(outer).unwrap()), "n");
        let inner = tree.nested_loop(tree.loop_body(outer).unwrap()).unwrap();
        assert_eq!(inner, loops[1]);
        assert_eq!(tree.source_text(tree.loop_bound(inner).unwrap()), "m");
    }

    #[test]
    fn while_bound_is_the_right_operand() {
        let tree = SyntaxTree::parse_file("fn f() { while i < N { i += 1; } }").unwrap();
        let w = find(&tree, |k| matches!(k, NodeKind::While))[0];
        assert_eq!(tree.source_text(tree.loop_bound(w).unwrap()), "N");
    }

    #[test]
    fn expression_unit_root_has_no_parent() {
        let tree = SyntaxTree::parse_expr("a + b").unwrap();
        assert_eq!(tree.parent_shape(tree.root()), AncestorShape::Top);
    }

    #[test]
    fn parse_errors_are_reported() {
        assert!(SyntaxTree::parse_file("fn {").is_err());
    }
}
