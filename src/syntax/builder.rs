use std::ops::Range;

use proc_macro2::Span;
use syn::spanned::Spanned;
use syn::visit::{self, Visit};
use syn::{Expr, ImplItemFn, Item, Lit, Local, Pat, StmtMacro, TraitItemFn};

use super::{BinaryOpcode, LineIndex, LiteralKind, Node, NodeId, NodeKind, SyntaxTree};

/// Flattens a `syn` tree into the pre-order arena.
///
/// Only the expression shapes the matchers care about get dedicated kinds;
/// everything else is kept as `OtherExpr`/`OtherItem` so ancestor queries
/// still see a node there.
pub(super) struct TreeBuilder {
    text: String,
    lines: LineIndex,
    nodes: Vec<Node>,
    stack: Vec<NodeId>,
}

impl TreeBuilder {
    pub(super) fn new(text: String) -> Self {
        let lines = LineIndex::new(&text);
        TreeBuilder {
            text,
            lines,
            nodes: Vec::new(),
            stack: Vec::new(),
        }
    }

    pub(super) fn build_file(mut self, file: &syn::File) -> SyntaxTree {
        let whole = 0..self.text.len();
        self.open(NodeKind::File, whole);
        for item in &file.items {
            self.visit_item(item);
        }
        self.close();
        self.finish()
    }

    pub(super) fn build_expr(mut self, expr: &Expr) -> SyntaxTree {
        self.visit_expr(expr);
        self.finish()
    }

    fn finish(self) -> SyntaxTree {
        SyntaxTree::from_parts(self.text, self.lines, self.nodes)
    }

    fn span_range(&self, span: Span) -> Range<usize> {
        let start = self.lines.offset(&self.text, span.start());
        let end = self.lines.offset(&self.text, span.end());
        start..end.max(start)
    }

    fn open(&mut self, kind: NodeKind, range: Range<usize>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent = self.stack.last().copied();
        self.nodes.push(Node {
            kind,
            range,
            parent,
            children: Vec::new(),
        });
        if let Some(p) = parent {
            self.nodes[p.0].children.push(id);
        }
        self.stack.push(id);
        id
    }

    fn close(&mut self) {
        self.stack.pop();
    }

    fn with_node(&mut self, kind: NodeKind, span: Span, body: impl FnOnce(&mut Self)) {
        let range = self.span_range(span);
        self.open(kind, range);
        body(self);
        self.close();
    }
}

fn simple_ident(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Path(p) if p.qself.is_none() => p.path.get_ident().map(|id| id.to_string()),
        _ => None,
    }
}

fn pattern_ident(pat: &Pat) -> Option<String> {
    match pat {
        Pat::Ident(pi) => Some(pi.ident.to_string()),
        Pat::Type(pt) => pattern_ident(&pt.pat),
        _ => None,
    }
}

fn literal_kind(lit: &Lit) -> LiteralKind {
    match lit {
        Lit::Int(_) => LiteralKind::Int,
        Lit::Float(_) => LiteralKind::Float,
        Lit::Str(_) | Lit::ByteStr(_) | Lit::CStr(_) => LiteralKind::Str,
        _ => LiteralKind::Other,
    }
}

impl<'ast> Visit<'ast> for TreeBuilder {
    // Doc comments and attribute arguments never hold mutation sites.
    fn visit_attribute(&mut self, _: &'ast syn::Attribute) {}

    fn visit_item(&mut self, i: &'ast Item) {
        let kind = match i {
            Item::Fn(f) => NodeKind::Fn {
                name: f.sig.ident.to_string(),
            },
            Item::Impl(_) => NodeKind::Impl,
            Item::Trait(_) => NodeKind::Trait,
            Item::Mod(_) => NodeKind::Mod,
            _ => NodeKind::OtherItem,
        };
        self.with_node(kind, i.span(), |t| visit::visit_item(t, i));
    }

    fn visit_impl_item_fn(&mut self, i: &'ast ImplItemFn) {
        let kind = NodeKind::Fn {
            name: i.sig.ident.to_string(),
        };
        self.with_node(kind, i.span(), |t| visit::visit_impl_item_fn(t, i));
    }

    fn visit_trait_item_fn(&mut self, i: &'ast TraitItemFn) {
        let kind = NodeKind::Fn {
            name: i.sig.ident.to_string(),
        };
        self.with_node(kind, i.span(), |t| visit::visit_trait_item_fn(t, i));
    }

    fn visit_block(&mut self, i: &'ast syn::Block) {
        self.with_node(NodeKind::Block, i.span(), |t| visit::visit_block(t, i));
    }

    fn visit_local(&mut self, i: &'ast Local) {
        let kind = NodeKind::Local {
            binding: pattern_ident(&i.pat),
        };
        self.with_node(kind, i.span(), |t| {
            if let Some(init) = &i.init {
                t.visit_expr(&init.expr);
                if let Some((_, diverge)) = &init.diverge {
                    t.visit_expr(diverge);
                }
            }
        });
    }

    fn visit_stmt_macro(&mut self, i: &'ast StmtMacro) {
        self.with_node(NodeKind::Macro, i.span(), |_| {});
    }

    fn visit_expr(&mut self, e: &'ast Expr) {
        let span = e.span();
        match e {
            Expr::Binary(b) => {
                let kind = match BinaryOpcode::from_bin_op(&b.op) {
                    Some((op, false)) => NodeKind::Binary { op },
                    Some((op, true)) => NodeKind::Assign {
                        target: simple_ident(&b.left),
                        compound: Some(op),
                    },
                    None => NodeKind::OtherExpr,
                };
                self.with_node(kind, span, |t| {
                    t.visit_expr(&b.left);
                    t.visit_expr(&b.right);
                });
            }
            Expr::Assign(a) => {
                let kind = NodeKind::Assign {
                    target: simple_ident(&a.left),
                    compound: None,
                };
                self.with_node(kind, span, |t| {
                    t.visit_expr(&a.left);
                    t.visit_expr(&a.right);
                });
            }
            Expr::Paren(p) => self.with_node(NodeKind::Paren, span, |t| t.visit_expr(&p.expr)),
            Expr::Cast(c) => self.with_node(NodeKind::Cast, span, |t| t.visit_expr(&c.expr)),
            Expr::Call(c) => self.with_node(NodeKind::Call, span, |t| visit::visit_expr_call(t, c)),
            Expr::MethodCall(m) => {
                self.with_node(NodeKind::MethodCall, span, |t| visit::visit_expr_method_call(t, m))
            }
            Expr::Index(x) => self.with_node(NodeKind::Index, span, |t| visit::visit_expr_index(t, x)),
            Expr::Macro(_) => self.with_node(NodeKind::Macro, span, |_| {}),
            Expr::ForLoop(f) => self.with_node(NodeKind::ForLoop, span, |t| {
                t.visit_expr(&f.expr);
                t.visit_block(&f.body);
            }),
            Expr::While(w) => self.with_node(NodeKind::While, span, |t| {
                t.visit_expr(&w.cond);
                t.visit_block(&w.body);
            }),
            Expr::Loop(l) => self.with_node(NodeKind::Loop, span, |t| t.visit_block(&l.body)),
            Expr::Range(r) => {
                let kind = NodeKind::Range {
                    has_start: r.start.is_some(),
                    has_end: r.end.is_some(),
                };
                self.with_node(kind, span, |t| {
                    if let Some(start) = &r.start {
                        t.visit_expr(start);
                    }
                    if let Some(end) = &r.end {
                        t.visit_expr(end);
                    }
                });
            }
            Expr::Block(b) => self.with_node(NodeKind::BlockExpr, span, |t| t.visit_block(&b.block)),
            Expr::Path(_) => {
                let kind = NodeKind::Path {
                    ident: simple_ident(e),
                };
                self.with_node(kind, span, |_| {});
            }
            Expr::Lit(l) => {
                let kind = NodeKind::Lit {
                    literal: literal_kind(&l.lit),
                };
                self.with_node(kind, span, |_| {});
            }
            _ => self.with_node(NodeKind::OtherExpr, span, |t| visit::visit_expr(t, e)),
        }
    }
}
