//! Touched-variable analysis.
//!
//! Computes the set of declarations a subtree may write. Loops havoc this
//! set before their body runs, and branch merges reconcile it afterwards.
//! Internal calls are followed into the callee (cycle-guarded), since the
//! callee's writes become part of the caller once the call is inlined.

use std::collections::BTreeSet;

use accord_ast::{CallKind, DeclId, Expr, ExprKind, Stmt, UnitIndex};

pub struct VariableUsage<'a> {
    index: &'a UnitIndex<'a>,
}

impl<'a> VariableUsage<'a> {
    pub fn new(index: &'a UnitIndex<'a>) -> Self {
        Self { index }
    }

    pub fn touched_in_stmt(&self, stmt: &Stmt) -> BTreeSet<DeclId> {
        let mut touched = BTreeSet::new();
        let mut visiting = BTreeSet::new();
        self.stmt(stmt, &mut touched, &mut visiting);
        touched
    }

    pub fn touched_in_expr(&self, expr: &Expr) -> BTreeSet<DeclId> {
        let mut touched = BTreeSet::new();
        let mut visiting = BTreeSet::new();
        self.expr(expr, &mut touched, &mut visiting);
        touched
    }

    fn stmt(&self, stmt: &Stmt, out: &mut BTreeSet<DeclId>, visiting: &mut BTreeSet<DeclId>) {
        match stmt {
            Stmt::Block(b) => {
                for s in &b.stmts {
                    self.stmt(s, out, visiting);
                }
            }
            Stmt::VarDecl(d) => {
                out.extend(d.declarations.iter().copied());
                if let Some(init) = &d.initial {
                    self.expr(init, out, visiting);
                }
            }
            Stmt::Expr(e) => self.expr(&e.expr, out, visiting),
            Stmt::If(n) => {
                self.expr(&n.cond, out, visiting);
                self.stmt(&n.then_branch, out, visiting);
                if let Some(e) = &n.else_branch {
                    self.stmt(e, out, visiting);
                }
            }
            Stmt::While(n) => {
                self.expr(&n.cond, out, visiting);
                self.stmt(&n.body, out, visiting);
            }
            Stmt::For(n) => {
                if let Some(init) = &n.init {
                    self.stmt(init, out, visiting);
                }
                if let Some(cond) = &n.cond {
                    self.expr(cond, out, visiting);
                }
                if let Some(update) = &n.update {
                    self.expr(update, out, visiting);
                }
                self.stmt(&n.body, out, visiting);
            }
            Stmt::Return(n) => {
                if let Some(e) = &n.expr {
                    self.expr(e, out, visiting);
                }
            }
            Stmt::Unsupported(_) => {}
        }
    }

    fn expr(&self, expr: &Expr, out: &mut BTreeSet<DeclId>, visiting: &mut BTreeSet<DeclId>) {
        match &expr.kind {
            ExprKind::BoolLiteral(_) | ExprKind::NumberLiteral(_) | ExprKind::Identifier { .. } => {}
            ExprKind::Tuple(parts) => {
                for p in parts {
                    self.expr(p, out, visiting);
                }
            }
            ExprKind::Unary { op, operand, .. } => {
                if matches!(op, accord_ast::UnaryOp::Inc | accord_ast::UnaryOp::Dec) {
                    self.lvalue(operand, out);
                }
                self.expr(operand, out, visiting);
            }
            ExprKind::Binary { left, right, .. } => {
                self.expr(left, out, visiting);
                self.expr(right, out, visiting);
            }
            ExprKind::Assignment { lhs, rhs, .. } => {
                self.lvalue(lhs, out);
                // Index expressions on the left are reads.
                if let ExprKind::IndexAccess { index, .. } = &lhs.kind {
                    self.expr(index, out, visiting);
                }
                self.expr(rhs, out, visiting);
            }
            ExprKind::IndexAccess { base, index } => {
                self.expr(base, out, visiting);
                self.expr(index, out, visiting);
            }
            ExprKind::MemberAccess { base, .. } => self.expr(base, out, visiting),
            ExprKind::Call { callee, args, kind } => {
                for a in args {
                    self.expr(a, out, visiting);
                }
                if *kind == CallKind::Internal {
                    self.follow_call(callee, out, visiting);
                }
            }
        }
    }

    /// The declaration an lvalue ultimately writes.
    fn lvalue(&self, expr: &Expr, out: &mut BTreeSet<DeclId>) {
        match &expr.kind {
            ExprKind::Identifier { decl: Some(d), .. } => {
                out.insert(*d);
            }
            ExprKind::IndexAccess { base, .. } => self.lvalue(base, out),
            ExprKind::Tuple(parts) if parts.len() == 1 => self.lvalue(&parts[0], out),
            _ => {}
        }
    }

    fn follow_call(
        &self,
        callee: &Expr,
        out: &mut BTreeSet<DeclId>,
        visiting: &mut BTreeSet<DeclId>,
    ) {
        let decl = match &callee.kind {
            ExprKind::Identifier { decl, .. } => *decl,
            ExprKind::MemberAccess { decl, base, .. } => {
                self.expr(base, out, visiting);
                *decl
            }
            ExprKind::Tuple(parts) if parts.len() == 1 => {
                return self.follow_call(&parts[0], out, visiting);
            }
            _ => None,
        };
        let Some(id) = decl else { return };
        let Some(function) = self.index.function(id) else { return };
        if !visiting.insert(id) {
            // Recursive cycle; the call itself is diagnosed elsewhere.
            return;
        }
        if let Some(body) = &function.body {
            for s in &body.stmts {
                self.stmt(s, out, visiting);
            }
        }
        visiting.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accord_ast::{
        span, AssignOp, Block, ContractDef, ExprStmt, FunctionDef, SourceUnit, TypeDesc, VarDecl,
        VarKind,
    };

    fn ident(id: u32, name: &str, decl: DeclId) -> Expr {
        Expr::new(
            id,
            span(0, 0),
            TypeDesc::uint(256),
            ExprKind::Identifier { name: name.into(), decl: Some(decl) },
        )
    }

    fn assign(id: u32, lhs: Expr, rhs: Expr) -> Stmt {
        Stmt::Expr(ExprStmt {
            span: span(0, 0),
            expr: Expr::new(
                id,
                span(0, 0),
                TypeDesc::uint(256),
                ExprKind::Assignment { op: AssignOp::Assign, lhs: Box::new(lhs), rhs: Box::new(rhs) },
            ),
        })
    }

    fn unit_with_body(stmts: Vec<Stmt>) -> SourceUnit {
        SourceUnit {
            smt_checker_enabled: true,
            contracts: vec![ContractDef {
                span: span(0, 0),
                name: "C".into(),
                state_vars: vec![],
                functions: vec![FunctionDef {
                    span: span(0, 0),
                    id: 100,
                    name: "f".into(),
                    params: vec![],
                    returns: vec![],
                    locals: vec![],
                    body: Some(Block { span: span(0, 0), stmts }),
                    is_constructor: false,
                    has_modifiers: false,
                }],
            }],
        }
    }

    #[test]
    fn assignment_targets_are_touched_and_reads_are_not() {
        let unit = unit_with_body(vec![assign(1, ident(2, "x", 7), ident(3, "y", 8))]);
        let index = UnitIndex::build(&unit);
        let usage = VariableUsage::new(&index);
        let body = &unit.contracts[0].functions[0].body.as_ref().unwrap().stmts[0];
        let touched = usage.touched_in_stmt(body);
        assert!(touched.contains(&7));
        assert!(!touched.contains(&8));
    }

    #[test]
    fn index_assignment_touches_the_base_mapping() {
        let m = Expr::new(
            1,
            span(0, 0),
            TypeDesc::Mapping {
                key: Box::new(TypeDesc::uint(256)),
                value: Box::new(TypeDesc::uint(256)),
            },
            ExprKind::Identifier { name: "m".into(), decl: Some(5) },
        );
        let lhs = Expr::new(
            2,
            span(0, 0),
            TypeDesc::uint(256),
            ExprKind::IndexAccess { base: Box::new(m), index: Box::new(ident(3, "k", 6)) },
        );
        let unit = unit_with_body(vec![assign(4, lhs, ident(5, "v", 9))]);
        let index = UnitIndex::build(&unit);
        let usage = VariableUsage::new(&index);
        let body = &unit.contracts[0].functions[0].body.as_ref().unwrap().stmts[0];
        let touched = usage.touched_in_stmt(body);
        assert!(touched.contains(&5));
        assert!(!touched.contains(&6), "index expression is a read");
    }

    #[test]
    fn internal_calls_contribute_callee_writes() {
        // g writes state 50; f calls g.
        let g_body = vec![assign(1, ident(2, "s", 50), ident(3, "x", 51))];
        let mut unit = unit_with_body(vec![]);
        unit.contracts[0].state_vars.push(VarDecl {
            span: span(0, 0),
            id: 50,
            name: "s".into(),
            ty: TypeDesc::uint(256),
            kind: VarKind::State,
        });
        unit.contracts[0].functions.push(FunctionDef {
            span: span(0, 0),
            id: 200,
            name: "g".into(),
            params: vec![],
            returns: vec![],
            locals: vec![],
            body: Some(Block { span: span(0, 0), stmts: g_body }),
            is_constructor: false,
            has_modifiers: false,
        });
        let call = Stmt::Expr(ExprStmt {
            span: span(0, 0),
            expr: Expr::new(
                10,
                span(0, 0),
                TypeDesc::uint(256),
                ExprKind::Call {
                    callee: Box::new(Expr::new(
                        11,
                        span(0, 0),
                        TypeDesc::Function { params: vec![], returns: vec![] },
                        ExprKind::Identifier { name: "g".into(), decl: Some(200) },
                    )),
                    args: vec![],
                    kind: CallKind::Internal,
                },
            ),
        });
        let index = UnitIndex::build(&unit);
        let usage = VariableUsage::new(&index);
        let touched = usage.touched_in_stmt(&call);
        assert!(touched.contains(&50));
    }

    #[test]
    fn recursive_calls_terminate() {
        // f calls itself; analysis must not loop.
        let call = Stmt::Expr(ExprStmt {
            span: span(0, 0),
            expr: Expr::new(
                1,
                span(0, 0),
                TypeDesc::uint(256),
                ExprKind::Call {
                    callee: Box::new(Expr::new(
                        2,
                        span(0, 0),
                        TypeDesc::Function { params: vec![], returns: vec![] },
                        ExprKind::Identifier { name: "f".into(), decl: Some(100) },
                    )),
                    args: vec![],
                    kind: CallKind::Internal,
                },
            ),
        });
        let unit = unit_with_body(vec![call.clone()]);
        let index = UnitIndex::build(&unit);
        let usage = VariableUsage::new(&index);
        let touched = usage.touched_in_stmt(&call);
        assert!(touched.is_empty());
    }
}
