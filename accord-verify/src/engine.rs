//! The symbolic assertion checker.
//!
//! Walks each function of a unit, translating expressions into solver terms
//! over SSA-versioned symbolic variables. Guards accumulate on a
//! path-condition stack; branches are merged with `ite` over snapshots of
//! the variable versions; loops conservatively havoc whatever they may
//! write. At every safety check the engine opens a solver scope, asserts the
//! failure condition under the current path, and reports a counterexample
//! model when the solver finds one.

use std::collections::{BTreeMap, BTreeSet};

use accord_ast::{
    span, AssignOp, BinaryOp, Block, CallKind, DeclId, Expr, ExprKind, ForStmt, FunctionDef,
    IfStmt, NodeId, ReturnStmt, SourceText, SourceUnit, Span, Stmt, TypeDesc, UnaryOp, UnitIndex,
    VarDecl, VarDeclStmt, VarKind, WhileStmt,
};
use accord_smt::{
    range_constraints, zero_value, CheckResult, Portfolio, SmtExpr, SmtSolver, SmtSort,
    SolverConfig, SymbolicVar,
};
use num_bigint::BigInt;
use tracing::debug;

use crate::format::format_number_readable;
use crate::report::{Note, Reporter, Warning};
use crate::usage::VariableUsage;

const CONFLICTING_ANSWERS: &str =
    "At least two SMT solvers provided conflicting answers. Results might not be sound.";
const SOLVER_ERROR: &str = "Error trying to invoke SMT solver.";
const LOOP_NOTE: &str = "Note that some information is erased after the execution of loops.\n\
     You can re-introduce information using require().";
const ARRAY_NOTE: &str = "Note that array aliasing is not supported, therefore all mapping \
     information is erased after a mapping local variable/parameter is assigned.\n\
     You can re-introduce information using require().";
const RESPONSES_IGNORED: &str = "SMT-LIB2 query responses were supplied, but this build invokes \
     an SMT solver directly. The responses will be ignored. Build without the z3 feature to \
     replay SMT-LIB2 responses.";

#[derive(Clone, Copy, Debug)]
pub struct CheckerConfig {
    /// Per-query solver timeout in milliseconds.
    pub timeout_ms: u32,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

/// Analyze a unit with the default solver backends: the live solver when one
/// is compiled in, otherwise SMT-LIB2 replay from `smtlib2_responses`.
pub fn analyze(
    unit: &SourceUnit,
    source: Option<&SourceText>,
    config: &CheckerConfig,
    smtlib2_responses: BTreeMap<String, String>,
) -> Vec<Warning> {
    let mut reporter = Reporter::default();
    if Portfolio::has_live_solver() && !smtlib2_responses.is_empty() {
        reporter.warning(span(0, 0), RESPONSES_IGNORED);
    }
    let solver_config = SolverConfig { timeout_ms: config.timeout_ms };
    let portfolio = Portfolio::default_backends(smtlib2_responses, &solver_config);
    run(unit, source, portfolio, reporter)
}

/// Analyze a unit against a caller-supplied portfolio.
pub fn analyze_with_portfolio(
    unit: &SourceUnit,
    source: Option<&SourceText>,
    portfolio: Portfolio,
) -> Vec<Warning> {
    run(unit, source, portfolio, Reporter::default())
}

fn run(
    unit: &SourceUnit,
    source: Option<&SourceText>,
    portfolio: Portfolio,
    mut reporter: Reporter,
) -> Vec<Warning> {
    let index = UnitIndex::build(unit);
    let mut checker = SmtChecker::new(&index, portfolio, &mut reporter, source);
    checker.analyze(unit);
    drop(checker);
    reporter.into_warnings()
}

type VariableIndices = BTreeMap<DeclId, u32>;

struct UninterpretedTerm {
    node: NodeId,
    span: Span,
    ty: TypeDesc,
}

pub struct SmtChecker<'a> {
    index: &'a UnitIndex<'a>,
    usage: VariableUsage<'a>,
    solver: Portfolio,
    reporter: &'a mut Reporter,
    source: Option<&'a SourceText>,

    /// Program variables (state and local), keyed by declaration.
    variables: BTreeMap<DeclId, SymbolicVar>,
    /// Translated expression nodes.
    expressions: BTreeMap<NodeId, SymbolicVar>,
    /// Language-level magic values, keyed by display name.
    globals: BTreeMap<String, SymbolicVar>,
    /// Nodes modelled by uninterpreted applications or array reads; shown in
    /// counterexample models.
    uninterpreted: Vec<UninterpretedTerm>,

    path_conditions: Vec<SmtExpr>,
    function_path: Vec<DeclId>,
    loop_executed: bool,
    array_assigned: bool,
}

impl<'a> SmtChecker<'a> {
    pub fn new(
        index: &'a UnitIndex<'a>,
        solver: Portfolio,
        reporter: &'a mut Reporter,
        source: Option<&'a SourceText>,
    ) -> Self {
        Self {
            index,
            usage: VariableUsage::new(index),
            solver,
            reporter,
            source,
            variables: BTreeMap::new(),
            expressions: BTreeMap::new(),
            globals: BTreeMap::new(),
            uninterpreted: Vec::new(),
            path_conditions: Vec::new(),
            function_path: Vec::new(),
            loop_executed: false,
            array_assigned: false,
        }
    }

    pub fn analyze(&mut self, unit: &'a SourceUnit) {
        if !unit.smt_checker_enabled {
            return;
        }
        for contract in &unit.contracts {
            for state_var in &contract.state_vars {
                self.create_variable(state_var);
            }
            for function in &contract.functions {
                if function.body.is_some() {
                    self.visit_function_definition(function);
                }
            }
            // State variables live for one contract traversal.
            self.variables.clear();
        }
    }

    // ── Functions ─────────────────────────────────────────────────

    fn visit_function_definition(&mut self, function: &'a FunctionDef) {
        if function.is_constructor || function.has_modifiers {
            self.reporter.warning(
                function.span,
                "Assertion checker does not yet support constructors and functions with modifiers.",
            );
        }
        self.function_path.push(function.id);
        if self.is_root_function() {
            debug!(function = %function.name, "analyzing function");
            self.solver.reset();
            self.path_conditions.clear();
            self.expressions.clear();
            self.globals.clear();
            self.uninterpreted.clear();
            self.redeclare_state_variables();
            self.reset_state_variables();
            self.initialize_local_variables(function);
            self.loop_executed = false;
            self.array_assigned = false;
        }
        if let Some(body) = &function.body {
            self.visit_block(body);
        }
        // Inlined frames keep their variables so the return value survives;
        // only the root exit drops locals.
        if self.is_root_function() {
            self.remove_local_variables();
        }
        self.function_path.pop();
    }

    fn is_root_function(&self) -> bool {
        self.function_path.len() == 1
    }

    fn initialize_local_variables(&mut self, function: &FunctionDef) {
        for local in &function.locals {
            if self.create_variable(local) {
                self.set_zero_value(local.id);
            }
        }
        for param in &function.params {
            if self.create_variable(param) {
                self.set_unknown_value(param.id);
            }
        }
        for ret in &function.returns {
            if self.create_variable(ret) {
                self.set_zero_value(ret.id);
            }
        }
    }

    fn initialize_function_call_parameters(
        &mut self,
        function: &FunctionDef,
        call_args: &[SmtExpr],
    ) {
        assert_eq!(
            function.params.len(),
            call_args.len(),
            "argument count is supposed to match the signature after type checking"
        );
        for (param, arg) in function.params.iter().zip(call_args) {
            if self.create_variable(param) {
                let fresh = self.new_value(param.id);
                self.add_assertion(SmtExpr::eq(arg.clone(), fresh));
                if matches!(param.ty, TypeDesc::Mapping { .. }) {
                    self.array_assigned = true;
                }
            }
        }
        for local in &function.locals {
            if self.create_variable(local) {
                self.new_value(local.id);
                self.set_zero_value(local.id);
            }
        }
        for ret in &function.returns {
            if self.create_variable(ret) {
                self.new_value(ret.id);
                self.set_zero_value(ret.id);
            }
        }
    }

    fn remove_local_variables(&mut self) {
        let index = self.index;
        self.variables
            .retain(|id, _| index.var(*id).is_some_and(|d| d.kind == VarKind::State));
    }

    /// After a solver reset nothing is declared; re-introduce the surviving
    /// state variables at their current version.
    fn redeclare_state_variables(&mut self) {
        let entries: Vec<(String, SmtSort)> = self
            .variables
            .values()
            .map(|v| (v.current_name(), v.sort().clone()))
            .collect();
        for (name, sort) in entries {
            self.solver.declare_var(&name, &sort);
        }
    }

    /// Havoc all state variables: a transaction may start from any state.
    fn reset_state_variables(&mut self) {
        let state_vars: Vec<DeclId> = self
            .variables
            .keys()
            .copied()
            .filter(|id| self.index.var(*id).is_some_and(|d| d.kind == VarKind::State))
            .collect();
        for id in state_vars {
            self.new_value(id);
            self.set_unknown_value(id);
        }
    }

    /// Havoc the given variables: bump each version and re-assert only the
    /// type's range constraints.
    fn reset_variables(&mut self, touched: &BTreeSet<DeclId>) {
        for id in touched {
            if self.variables.contains_key(id) {
                self.new_value(*id);
                self.set_unknown_value(*id);
            }
        }
    }

    // ── Statements ────────────────────────────────────────────────

    fn visit_block(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.visit_statement(stmt);
        }
    }

    fn visit_statement(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(b) => self.visit_block(b),
            Stmt::VarDecl(d) => self.visit_variable_declaration(d),
            Stmt::Expr(e) => self.visit_expression(&e.expr),
            Stmt::If(n) => self.visit_if(n),
            Stmt::While(n) => self.visit_while(n),
            Stmt::For(n) => self.visit_for(n),
            Stmt::Return(n) => self.visit_return(n),
            Stmt::Unsupported(u) => self.reporter.warning(
                u.span,
                "Assertion checker does not yet support this statement.",
            ),
        }
    }

    fn visit_variable_declaration(&mut self, stmt: &VarDeclStmt) {
        if let Some(initial) = &stmt.initial {
            self.visit_expression(initial);
        }
        if stmt.declarations.len() != 1 {
            self.reporter.warning(
                stmt.span,
                "Assertion checker does not yet support such variable declarations.",
            );
        } else if self.variables.contains_key(&stmt.declarations[0]) {
            if let Some(initial) = &stmt.initial {
                let value = self.expr(initial);
                self.assign_to_decl(stmt.declarations[0], value, stmt.span);
            }
        } else {
            self.reporter.warning(
                stmt.span,
                "Assertion checker does not yet implement such variable declarations.",
            );
        }
    }

    fn visit_if(&mut self, stmt: &IfStmt) {
        self.visit_expression(&stmt.cond);
        // Inlined calls have specific input values; constant conditions are
        // only meaningful at the root.
        if self.is_root_function() {
            self.check_boolean_not_constant(&stmt.cond, "Condition is always $VALUE.");
        }
        let condition = self.expr(&stmt.cond);

        let indices_end_true = self.visit_branch(&stmt.then_branch, Some(condition.clone()));
        let mut touched = self.usage.touched_in_stmt(&stmt.then_branch);
        let indices_end_false = if let Some(else_branch) = &stmt.else_branch {
            touched.extend(self.usage.touched_in_stmt(else_branch));
            self.visit_branch(else_branch, Some(!condition.clone()))
        } else {
            self.copy_variable_indices()
        };

        self.merge_variables(&touched, &condition, &indices_end_true, &indices_end_false);
    }

    // Loops are treated as two branches: one havocs the touched variables
    // and runs the body once, the other skips the loop with the pre-loop
    // knowledge intact. The two are merged on the loop condition evaluated
    // over the pre-loop state.
    fn visit_while(&mut self, stmt: &WhileStmt) {
        let indices_before_loop = self.copy_variable_indices();
        let mut touched = self.usage.touched_in_stmt(&stmt.body);
        touched.extend(self.usage.touched_in_expr(&stmt.cond));
        self.reset_variables(&touched);

        let indices_after_loop = if stmt.is_do_while {
            let indices = self.visit_branch(&stmt.body, None);
            // Assertions generated in the body are not preserved into the
            // condition here; the body may have reassigned what they mention.
            self.visit_expression(&stmt.cond);
            if self.is_root_function() {
                self.check_boolean_not_constant(
                    &stmt.cond,
                    "Do-while loop condition is always $VALUE.",
                );
            }
            indices
        } else {
            self.visit_expression(&stmt.cond);
            if self.is_root_function() {
                self.check_boolean_not_constant(
                    &stmt.cond,
                    "While loop condition is always $VALUE.",
                );
            }
            let condition = self.expr(&stmt.cond);
            self.visit_branch(&stmt.body, Some(condition))
        };

        // Execution resumes from before the loop; re-evaluate the condition
        // there unless the body already ran once (do-while).
        self.reset_variable_indices(&indices_before_loop);
        if !stmt.is_do_while {
            self.visit_expression(&stmt.cond);
        }
        let condition = self.expr(&stmt.cond);
        let current = self.copy_variable_indices();
        self.merge_variables(&touched, &condition, &indices_after_loop, &current);

        self.loop_executed = true;
    }

    fn visit_for(&mut self, stmt: &ForStmt) {
        if let Some(init) = &stmt.init {
            self.visit_statement(init);
        }

        let indices_before_loop = self.copy_variable_indices();

        // The init statement runs exactly once and is not havocked.
        let mut touched = self.usage.touched_in_stmt(&stmt.body);
        if let Some(cond) = &stmt.cond {
            touched.extend(self.usage.touched_in_expr(cond));
        }
        if let Some(update) = &stmt.update {
            touched.extend(self.usage.touched_in_expr(update));
        }
        self.reset_variables(&touched);

        if let Some(cond) = &stmt.cond {
            self.visit_expression(cond);
            if self.is_root_function() {
                self.check_boolean_not_constant(cond, "For loop condition is always $VALUE.");
            }
        }

        self.solver.push();
        if let Some(cond) = &stmt.cond {
            let condition = self.expr(cond);
            self.solver.add(&condition);
        }
        self.visit_statement(&stmt.body);
        if let Some(update) = &stmt.update {
            self.visit_expression(update);
        }
        self.solver.pop();

        let indices_after_loop = self.copy_variable_indices();
        self.reset_variable_indices(&indices_before_loop);
        if let Some(cond) = &stmt.cond {
            self.visit_expression(cond);
        }
        let for_condition = match &stmt.cond {
            Some(cond) => self.expr(cond),
            None => SmtExpr::True,
        };
        let current = self.copy_variable_indices();
        self.merge_variables(&touched, &for_condition, &indices_after_loop, &current);

        self.loop_executed = true;
    }

    fn visit_return(&mut self, stmt: &ReturnStmt) {
        let Some(expr) = &stmt.expr else { return };
        self.visit_expression(expr);
        if !self.expressions.contains_key(&expr.id) {
            return;
        }
        let function_id = *self
            .function_path
            .last()
            .expect("return statement outside of a function");
        let function = self
            .index
            .function(function_id)
            .expect("the current function is supposed to be known");
        if function.returns.len() > 1 {
            self.reporter.warning(
                stmt.span,
                "Assertion checker does not yet support more than one return value.",
            );
        } else if let Some(ret) = function.returns.first() {
            let value = self.expr(expr);
            let fresh = self.new_value(ret.id);
            self.add_assertion(SmtExpr::eq(value, fresh));
        }
    }

    fn visit_branch(&mut self, stmt: &Stmt, condition: Option<SmtExpr>) -> VariableIndices {
        let indices_before = self.copy_variable_indices();
        if let Some(c) = &condition {
            self.push_path_condition(c.clone());
        }
        self.visit_statement(stmt);
        if condition.is_some() {
            self.pop_path_condition();
        }
        let indices_after = self.copy_variable_indices();
        self.reset_variable_indices(&indices_before);
        indices_after
    }

    fn merge_variables(
        &mut self,
        touched: &BTreeSet<DeclId>,
        condition: &SmtExpr,
        indices_end_true: &VariableIndices,
        indices_end_false: &VariableIndices,
    ) {
        for id in touched {
            // Variables that materialize inside one branch (locals of an
            // inlined call) have no version on the other side; their frame
            // is gone, so there is nothing to merge.
            let (true_index, false_index) =
                match (indices_end_true.get(id), indices_end_false.get(id)) {
                    (Some(t), Some(f)) => (*t, *f),
                    _ => continue,
                };
            if true_index == false_index || !self.variables.contains_key(id) {
                continue;
            }
            let true_value = self.value_at(*id, true_index);
            let false_value = self.value_at(*id, false_index);
            let fresh = self.new_value(*id);
            self.add_assertion(SmtExpr::eq(
                fresh,
                SmtExpr::ite(condition.clone(), true_value, false_value),
            ));
        }
    }

    fn copy_variable_indices(&self) -> VariableIndices {
        self.variables.iter().map(|(id, v)| (*id, v.index())).collect()
    }

    fn reset_variable_indices(&mut self, indices: &VariableIndices) {
        for (id, index) in indices {
            self.variables
                .get_mut(id)
                .expect("snapshot variable is supposed to be known")
                .set_index(*index);
        }
    }

    // ── Expressions ───────────────────────────────────────────────

    fn visit_expression(&mut self, e: &Expr) {
        match &e.kind {
            ExprKind::BoolLiteral(b) => self.define_expr(e, SmtExpr::from(*b)),
            ExprKind::NumberLiteral(n) => {
                if matches!(e.ty, TypeDesc::Integer { .. } | TypeDesc::Address) {
                    self.define_expr(e, SmtExpr::from(n.clone()));
                } else {
                    self.reporter.warning(
                        e.span,
                        format!(
                            "Assertion checker does not yet support the type of this literal ({}).",
                            e.ty
                        ),
                    );
                }
            }
            ExprKind::Identifier { name, decl } => self.visit_identifier(e, name, *decl),
            ExprKind::Tuple(parts) => {
                for part in parts {
                    self.visit_expression(part);
                }
                if parts.len() != 1 || !parts[0].ty.is_supported() {
                    self.reporter.warning(
                        e.span,
                        "Assertion checker does not yet implement tuples and inline arrays.",
                    );
                } else {
                    let inner = self.expr(&parts[0]);
                    self.define_expr(e, inner);
                }
            }
            ExprKind::Unary { op, prefix, operand } => self.visit_unary(e, *op, *prefix, operand),
            ExprKind::Binary { op, left, right } => self.visit_binary(e, *op, left, right),
            ExprKind::Assignment { op, lhs, rhs } => self.visit_assignment(e, *op, lhs, rhs),
            ExprKind::IndexAccess { base, index } => self.visit_index_access(e, base, index),
            ExprKind::MemberAccess { base, member, .. } => {
                self.visit_member_access(e, base, member)
            }
            ExprKind::Call { .. } => self.visit_function_call(e),
        }
    }

    fn visit_identifier(&mut self, e: &Expr, name: &str, decl: Option<DeclId>) {
        if matches!(e.ty, TypeDesc::Function { .. }) {
            self.visit_function_identifier(e, name);
        } else if e.ty.is_supported() {
            if let Some(id) = decl {
                let value = self.current_value(id);
                self.define_expr(e, value);
            } else if name == "now" {
                self.define_global_variable(name, e, false);
            } else {
                self.reporter.warning(
                    e.span,
                    "Assertion checker does not yet support the type of this variable.",
                );
            }
        }
        // Identifiers of unsupported types stay untranslated; operators on
        // them report the construct themselves.
    }

    fn visit_function_identifier(&mut self, e: &Expr, name: &str) {
        if let TypeDesc::Function { returns, .. } = &e.ty {
            if returns.len() > 1 {
                self.reporter.warning(
                    e.span,
                    "Assertion checker does not yet support functions with more than one return parameter.",
                );
            }
        }
        let key = format!("{}_{}", name, e.ty);
        self.define_global_function(&key, e);
    }

    fn visit_unary(&mut self, e: &Expr, op: UnaryOp, prefix: bool, operand: &Expr) {
        match op {
            UnaryOp::Not => {
                self.visit_expression(operand);
                assert!(
                    matches!(e.ty, TypeDesc::Bool),
                    "logical negation is supposed to be boolean"
                );
                let inner = self.expr(operand);
                self.define_expr(e, !inner);
            }
            UnaryOp::Neg => {
                self.visit_expression(operand);
                let inner = self.expr(operand);
                let value = SmtExpr::from(0) - inner;
                self.define_expr(e, value.clone());
                if matches!(e.ty, TypeDesc::Integer { .. }) {
                    let ty = e.ty.clone();
                    self.check_under_overflow(&value, &ty, e.span);
                }
            }
            UnaryOp::Inc | UnaryOp::Dec => {
                if let ExprKind::Identifier { decl: Some(id), .. } = &operand.kind {
                    if self.variables.contains_key(id) {
                        let inner = self.current_value(*id);
                        let new_value = if op == UnaryOp::Inc {
                            inner.clone() + 1
                        } else {
                            inner.clone() - 1
                        };
                        self.assign_to_decl(*id, new_value.clone(), e.span);
                        self.define_expr(e, if prefix { new_value } else { inner });
                    } else {
                        self.reporter.warning(
                            e.span,
                            "Assertion checker does not yet implement such assignments.",
                        );
                    }
                } else {
                    self.reporter.warning(
                        e.span,
                        "Assertion checker does not yet implement such increments / decrements.",
                    );
                }
            }
        }
    }

    fn visit_binary(&mut self, e: &Expr, op: BinaryOp, left: &Expr, right: &Expr) {
        self.visit_expression(left);
        self.visit_expression(right);
        if op.is_arithmetic() {
            self.arithmetic_operation(e, op, left, right);
        } else if op.is_comparison() {
            self.compare_operation(e, op, left, right);
        } else {
            self.boolean_operation(e, op, left, right);
        }
    }

    fn arithmetic_operation(&mut self, e: &Expr, op: BinaryOp, left: &Expr, right: &Expr) {
        let common_type = e.ty.clone();
        if !matches!(common_type, TypeDesc::Integer { .. }) {
            self.reporter.warning(
                e.span,
                "Assertion checker does not yet implement this operator on non-integer types.",
            );
            return;
        }
        let l = self.expr(left);
        let r = self.expr(right);
        let value = match op {
            BinaryOp::Add => l + r.clone(),
            BinaryOp::Sub => l - r.clone(),
            BinaryOp::Mul => l * r.clone(),
            BinaryOp::Div => self.division(l, r.clone(), &common_type),
            _ => unreachable!("arithmetic dispatch"),
        };

        if op == BinaryOp::Div {
            self.check_condition(
                SmtExpr::eq(r.clone(), SmtExpr::from(0)),
                e.span,
                "Division by zero",
                Some(("<result>", r.clone())),
            );
            self.add_assertion(SmtExpr::neq(r, SmtExpr::from(0)));
        }

        self.check_under_overflow(&value, &common_type, e.span);
        self.define_expr(e, value);
    }

    /// Solver integer division rounds toward negative infinity; the language
    /// rounds toward zero. Emulate by case analysis on the operand signs.
    fn division(&self, left: SmtExpr, right: SmtExpr, ty: &TypeDesc) -> SmtExpr {
        let zero = || SmtExpr::from(0);
        if matches!(ty, TypeDesc::Integer { signed: true, .. }) {
            SmtExpr::ite(
                left.clone().ge(0),
                SmtExpr::ite(
                    right.clone().ge(0),
                    left.clone() / right.clone(),
                    zero() - (left.clone() / (zero() - right.clone())),
                ),
                SmtExpr::ite(
                    right.clone().ge(0),
                    zero() - ((zero() - left.clone()) / right.clone()),
                    (zero() - left) / (zero() - right),
                ),
            )
        } else {
            left / right
        }
    }

    fn compare_operation(&mut self, e: &Expr, op: BinaryOp, left: &Expr, right: &Expr) {
        let common_type = left.ty.clone();
        if !common_type.is_supported() {
            self.reporter.warning(
                e.span,
                format!(
                    "Assertion checker does not yet implement the type {} for comparisons",
                    common_type
                ),
            );
            return;
        }
        let l = self.expr(left);
        let r = self.expr(right);
        let value = if matches!(common_type, TypeDesc::Integer { .. } | TypeDesc::Address) {
            match op {
                BinaryOp::Eq => SmtExpr::eq(l, r),
                BinaryOp::Ne => SmtExpr::neq(l, r),
                BinaryOp::Lt => l.lt(r),
                BinaryOp::Le => l.le(r),
                BinaryOp::Gt => l.gt(r),
                BinaryOp::Ge => l.ge(r),
                _ => unreachable!("comparison dispatch"),
            }
        } else {
            // Bool only admits equality.
            match op {
                BinaryOp::Eq => SmtExpr::eq(l, r),
                BinaryOp::Ne => SmtExpr::neq(l, r),
                other => panic!("operator {other:?} is not supposed to reach boolean operands"),
            }
        };
        self.define_expr(e, value);
    }

    fn boolean_operation(&mut self, e: &Expr, op: BinaryOp, left: &Expr, right: &Expr) {
        if !matches!(left.ty, TypeDesc::Bool) {
            self.reporter.warning(
                e.span,
                format!(
                    "Assertion checker does not yet implement the type {} for boolean operations",
                    left.ty
                ),
            );
            return;
        }
        let l = self.expr(left);
        let r = self.expr(right);
        let value = match op {
            BinaryOp::And => SmtExpr::and(l, r),
            BinaryOp::Or => SmtExpr::or(l, r),
            other => panic!("operator {other:?} is not a boolean connective"),
        };
        self.define_expr(e, value);
    }

    fn visit_assignment(&mut self, e: &Expr, op: AssignOp, lhs: &Expr, rhs: &Expr) {
        // The left side of an index assignment is still evaluated as a read
        // so its index expression and current contents are available.
        if matches!(lhs.kind, ExprKind::IndexAccess { .. }) {
            self.visit_expression(lhs);
        }
        self.visit_expression(rhs);

        if op != AssignOp::Assign {
            self.reporter.warning(
                e.span,
                "Assertion checker does not yet implement compound assignment.",
            );
        } else if !e.ty.is_supported() {
            self.reporter.warning(
                e.span,
                format!("Assertion checker does not yet implement type {}", e.ty),
            );
        } else {
            match &lhs.kind {
                ExprKind::Identifier { decl: Some(id), .. } => {
                    assert!(
                        self.variables.contains_key(id),
                        "assigned variable is supposed to be known"
                    );
                    let value = self.expr(rhs);
                    self.assign_to_decl(*id, value.clone(), e.span);
                    self.define_expr(e, value);
                }
                ExprKind::IndexAccess { .. } => {
                    self.array_index_assignment(lhs, rhs);
                    let value = self.expr(rhs);
                    self.define_expr(e, value);
                }
                _ => self.reporter.warning(
                    e.span,
                    "Assertion checker does not yet implement such assignments.",
                ),
            }
        }
    }

    fn assign_to_decl(&mut self, id: DeclId, value: SmtExpr, location: Span) {
        let ty = self
            .index
            .var(id)
            .expect("assigned declaration is supposed to be known")
            .ty
            .clone();
        match &ty {
            TypeDesc::Integer { .. } => self.check_under_overflow(&value, &ty, location),
            TypeDesc::Address => {
                self.check_under_overflow(&value, &TypeDesc::Address, location)
            }
            TypeDesc::Mapping { .. } => self.array_assignment(),
            _ => {}
        }
        let fresh = self.new_value(id);
        self.add_assertion(SmtExpr::eq(fresh, value));
    }

    /// Assigning a mapping aliases it with an unknown set of other mappings;
    /// forget everything known about all of them.
    fn array_assignment(&mut self) {
        self.array_assigned = true;
        let mappings: Vec<DeclId> = self
            .variables
            .iter()
            .filter(|(_, v)| matches!(v.ty(), TypeDesc::Mapping { .. }))
            .map(|(id, _)| *id)
            .collect();
        for id in mappings {
            self.new_value(id);
        }
    }

    fn array_index_assignment(&mut self, lhs: &Expr, rhs: &Expr) {
        let ExprKind::IndexAccess { base, index } = &lhs.kind else {
            unreachable!("index assignment dispatch")
        };
        match &base.kind {
            ExprKind::Identifier { decl: Some(id), .. } => {
                assert!(
                    self.variables.contains_key(id),
                    "indexed variable is supposed to be known"
                );
                let array = self.current_value(*id);
                let index_value = self.expr(index);
                let rhs_value = self.expr(rhs);
                let stored = SmtExpr::store(array, index_value, rhs_value);
                let fresh = self.new_value(*id);
                self.add_assertion(SmtExpr::eq(fresh, stored));
            }
            ExprKind::IndexAccess { .. } => self.reporter.warning(
                base.span,
                "Assertion checker does not yet implement assignments to multi-dimensional mappings or arrays.",
            ),
            _ => self.reporter.warning(
                lhs.span,
                "Assertion checker does not yet implement this expression.",
            ),
        }
    }

    fn visit_index_access(&mut self, e: &Expr, base: &Expr, index: &Expr) {
        self.visit_expression(base);
        self.visit_expression(index);

        let array = match &base.kind {
            ExprKind::Identifier { decl: Some(id), .. } => {
                assert!(
                    self.variables.contains_key(id),
                    "indexed variable is supposed to be known"
                );
                self.current_value(*id)
            }
            ExprKind::IndexAccess { .. } => match self.expressions.get(&base.id) {
                Some(inner) => inner.current(),
                None => {
                    self.reporter.warning(
                        e.span,
                        "Assertion checker does not yet implement this expression.",
                    );
                    return;
                }
            },
            _ => {
                self.reporter.warning(
                    e.span,
                    "Assertion checker does not yet implement this expression.",
                );
                return;
            }
        };

        let index_value = self.expr(index);
        self.define_expr(e, SmtExpr::select(array, index_value));
        let read = self.expr(e);
        self.set_symbolic_unknown(&read, &e.ty);
        self.record_uninterpreted(e);
    }

    fn visit_member_access(&mut self, e: &Expr, base: &Expr, member: &str) {
        if matches!(e.ty, TypeDesc::Function { .. }) {
            // Bound call target; translate the receiver, the call handles
            // the rest.
            self.visit_expression(base);
            return;
        }
        if matches!(base.ty, TypeDesc::Magic) {
            if let ExprKind::Identifier { name, .. } = &base.kind {
                let key = format!("{name}.{member}");
                self.define_global_variable(&key, e, false);
            } else {
                self.reporter.warning(
                    e.span,
                    "Assertion checker does not yet support this expression.",
                );
            }
        } else {
            self.reporter.warning(
                e.span,
                "Assertion checker does not yet support this expression.",
            );
        }
    }

    // ── Calls ─────────────────────────────────────────────────────

    fn visit_function_call(&mut self, e: &Expr) {
        let ExprKind::Call { callee, args, kind } = &e.kind else {
            unreachable!("call dispatch")
        };
        self.visit_expression(callee);
        for arg in args {
            self.visit_expression(arg);
        }
        match kind {
            CallKind::Assert => self.visit_assert(e, args),
            CallKind::Require => self.visit_require(args),
            CallKind::GasLeft => self.visit_gas_left(e),
            CallKind::Internal => self.inline_function_call(e, callee, args),
            k if k.is_abstracted() => self.abstract_function_call(e, callee, args),
            _ => self.reporter.warning(
                e.span,
                "Assertion checker does not yet implement this type of function call.",
            ),
        }
    }

    fn visit_assert(&mut self, e: &Expr, args: &[Expr]) {
        assert!(
            args.len() == 1 && matches!(args[0].ty, TypeDesc::Bool),
            "assert is supposed to take one boolean condition"
        );
        let condition = self.expr(&args[0]);
        self.check_condition(!condition.clone(), e.span, "Assertion violation", None);
        self.add_path_implied_expression(condition);
    }

    fn visit_require(&mut self, args: &[Expr]) {
        assert!(
            args.len() == 1 && matches!(args[0].ty, TypeDesc::Bool),
            "require is supposed to take one boolean condition"
        );
        if self.is_root_function() {
            self.check_boolean_not_constant(&args[0], "Condition is always $VALUE.");
        }
        let condition = self.expr(&args[0]);
        self.add_path_implied_expression(condition);
    }

    fn visit_gas_left(&mut self, e: &Expr) {
        let name = "gasleft()";
        // Gas strictly decreases within one transaction, so the value gets a
        // fresh version at every call site.
        self.define_global_variable(name, e, true);
        let (index, current, ty) = {
            let var = self.globals.get(name).expect("gasleft() was just defined");
            (var.index(), var.current(), var.ty().clone())
        };
        self.set_symbolic_unknown(&current, &ty);
        if index > 0 {
            let previous = self.globals.get(name).expect("gasleft() exists").at(index - 1);
            self.add_assertion(current.le(previous));
        }
    }

    fn inline_function_call(&mut self, e: &Expr, callee: &Expr, args: &[Expr]) {
        let callee = unwrap_tuple(callee);
        let (function_id, receiver) = match &callee.kind {
            ExprKind::Identifier { decl: Some(id), .. } => (*id, None),
            ExprKind::MemberAccess { decl: Some(id), base, .. } => (*id, Some(base.as_ref())),
            _ => {
                self.reporter.warning(
                    e.span,
                    "Assertion checker does not yet implement this type of function call.",
                );
                return;
            }
        };
        let Some(function) = self.index.function(function_id) else {
            self.reporter.warning(
                e.span,
                "Assertion checker does not yet implement this type of function call.",
            );
            return;
        };

        if self.function_path.contains(&function_id) {
            self.reporter.warning_with(
                e.span,
                "Assertion checker does not support recursive function calls.",
                vec![Note::at(function.span, "Starting from function:")],
            );
        } else if function.body.is_some() {
            let mut call_args = Vec::with_capacity(args.len() + 1);
            if let Some(receiver) = receiver {
                call_args.push(self.expr(receiver));
            }
            for arg in args {
                call_args.push(self.expr(arg));
            }
            self.initialize_function_call_parameters(function, &call_args);
            self.visit_function_definition(function);
            if function.returns.len() > 1 {
                self.reporter.warning(
                    e.span,
                    "Assertion checker does not yet support calls to functions that return more than one value.",
                );
            } else if let Some(ret) = function.returns.first() {
                let value = self.current_value(ret.id);
                self.define_expr(e, value);
            }
        } else {
            self.reporter.warning(
                e.span,
                "Assertion checker does not support calls to functions without implementation.",
            );
        }
    }

    /// Hashes and friends have no arithmetic model; an uninterpreted symbol
    /// gives equal results for equal arguments and promises nothing else.
    fn abstract_function_call(&mut self, e: &Expr, callee: &Expr, args: &[Expr]) {
        let Some(key) = function_key(callee) else {
            self.reporter.warning(
                e.span,
                "Assertion checker does not yet implement this type of function call.",
            );
            return;
        };
        let Some(function_var) = self.globals.get(&key) else {
            panic!("abstracted callee {key} is supposed to have been declared");
        };
        let symbol = function_var.current_name();
        let codomain = match function_var.sort() {
            SmtSort::Function { codomain, .. } => (**codomain).clone(),
            other => panic!("abstracted callee has non-function sort {other}"),
        };
        let mut arg_terms = Vec::with_capacity(args.len());
        for arg in args {
            arg_terms.push(self.expr(arg));
        }
        let application = SmtExpr::apply(symbol, arg_terms, codomain);
        self.define_expr(e, application);
        self.record_uninterpreted(e);
        let value = self.expr(e);
        let ty = e.ty.clone();
        self.set_symbolic_unknown(&value, &ty);
    }

    fn record_uninterpreted(&mut self, e: &Expr) {
        if self.uninterpreted.iter().all(|u| u.node != e.id) {
            self.uninterpreted.push(UninterpretedTerm {
                node: e.id,
                span: e.span,
                ty: e.ty.clone(),
            });
        }
    }

    // ── Globals ───────────────────────────────────────────────────

    fn define_global_variable(&mut self, name: &str, e: &Expr, increase_index: bool) {
        if !self.globals.contains_key(name) {
            let var = SymbolicVar::new(name, e.ty.clone());
            let unsupported = var.is_unsupported();
            let (term, ty) = (var.current(), var.ty().clone());
            self.solver.declare_var(&var.current_name(), var.sort());
            self.globals.insert(name.to_string(), var);
            self.set_symbolic_unknown(&term, &ty);
            if unsupported {
                self.reporter.warning(
                    e.span,
                    "Assertion checker does not yet support this global variable.",
                );
            }
        } else if increase_index {
            let (name_after, sort) = {
                let var = self.globals.get_mut(name).expect("global exists");
                var.bump();
                (var.current_name(), var.sort().clone())
            };
            self.solver.declare_var(&name_after, &sort);
        }
        // Most globals stay fixed throughout a transaction, so the index is
        // left alone by default.
        if e.ty.is_supported() {
            let current = self.globals.get(name).expect("global exists").current();
            self.define_expr(e, current);
        }
    }

    fn define_global_function(&mut self, key: &str, e: &Expr) {
        if !self.globals.contains_key(key) {
            let var = SymbolicVar::new(key, e.ty.clone());
            self.solver.declare_var(&var.current_name(), var.sort());
            let unsupported = var.is_unsupported();
            self.globals.insert(key.to_string(), var);
            if unsupported {
                self.reporter.warning(
                    e.span,
                    "Assertion checker does not yet support the type of this function.",
                );
            }
        }
    }

    // ── Symbolic values ───────────────────────────────────────────

    /// Allocate the symbolic variable backing a declaration. Returns false
    /// when the declaration's type cannot be modelled; the placeholder still
    /// exists so later reads do not trip internal assertions.
    fn create_variable(&mut self, decl: &VarDecl) -> bool {
        if self.variables.contains_key(&decl.id) {
            // Repeated calls to the same function share the declaration.
            return true;
        }
        let var = SymbolicVar::new(format!("{}_{}", decl.name, decl.id), decl.ty.clone());
        self.solver.declare_var(&var.current_name(), var.sort());
        let unsupported = var.is_unsupported();
        self.variables.insert(decl.id, var);
        if unsupported {
            self.reporter.warning(
                decl.span,
                "Assertion checker does not yet support the type of this variable.",
            );
            return false;
        }
        true
    }

    fn current_value(&self, id: DeclId) -> SmtExpr {
        self.variables
            .get(&id)
            .expect("variable is supposed to be known here")
            .current()
    }

    fn value_at(&self, id: DeclId, index: u32) -> SmtExpr {
        self.variables
            .get(&id)
            .expect("variable is supposed to be known here")
            .at(index)
    }

    fn new_value(&mut self, id: DeclId) -> SmtExpr {
        let (term, name, sort) = {
            let var = self
                .variables
                .get_mut(&id)
                .expect("variable is supposed to be known here");
            let term = var.bump();
            (term, var.current_name(), var.sort().clone())
        };
        self.solver.declare_var(&name, &sort);
        term
    }

    fn set_zero_value(&mut self, id: DeclId) {
        let (ty, current) = {
            let var = &self.variables[&id];
            (var.ty().clone(), var.current())
        };
        if let Some(zero) = zero_value(&ty) {
            self.add_assertion(SmtExpr::eq(current, zero));
        }
    }

    fn set_unknown_value(&mut self, id: DeclId) {
        let (ty, current) = {
            let var = &self.variables[&id];
            (var.ty().clone(), var.current())
        };
        self.set_symbolic_unknown(&current, &ty);
    }

    fn set_symbolic_unknown(&mut self, term: &SmtExpr, ty: &TypeDesc) {
        for constraint in range_constraints(ty, term) {
            self.add_assertion(constraint);
        }
    }

    fn create_expr(&mut self, e: &Expr) {
        if let Some(var) = self.expressions.get_mut(&e.id) {
            var.bump();
            let (name, sort) = (var.current_name(), var.sort().clone());
            self.solver.declare_var(&name, &sort);
        } else {
            let var = SymbolicVar::new(format!("expr_{}", e.id), e.ty.clone());
            self.solver.declare_var(&var.current_name(), var.sort());
            let unsupported = var.is_unsupported();
            self.expressions.insert(e.id, var);
            if unsupported {
                self.reporter.warning(
                    e.span,
                    "Assertion checker does not yet implement this type.",
                );
            }
        }
    }

    fn define_expr(&mut self, e: &Expr, value: SmtExpr) {
        self.create_expr(e);
        assert!(
            e.ty.is_supported(),
            "equality applied to a type that is not fully supported"
        );
        let current = self.expressions[&e.id].current();
        self.add_assertion(SmtExpr::eq(current, value));
    }

    fn expr(&mut self, e: &Expr) -> SmtExpr {
        if !self.expressions.contains_key(&e.id) {
            self.reporter.warning(
                e.span,
                "Internal error: Expression undefined for SMT solver.",
            );
            self.create_expr(e);
        }
        self.expressions[&e.id].current()
    }

    fn add_assertion(&mut self, assertion: SmtExpr) {
        self.solver.add(&assertion);
    }

    // ── Path conditions ───────────────────────────────────────────

    fn push_path_condition(&mut self, condition: SmtExpr) {
        let conjoined = SmtExpr::and(self.current_path_conditions(), condition);
        self.path_conditions.push(conjoined);
    }

    fn pop_path_condition(&mut self) {
        assert!(!self.path_conditions.is_empty(), "cannot pop path condition, empty");
        self.path_conditions.pop();
    }

    fn current_path_conditions(&self) -> SmtExpr {
        match self.path_conditions.last() {
            Some(top) => top.clone(),
            None => SmtExpr::True,
        }
    }

    fn add_path_conjoined_expression(&mut self, e: SmtExpr) {
        let conjoined = SmtExpr::and(self.current_path_conditions(), e);
        self.add_assertion(conjoined);
    }

    fn add_path_implied_expression(&mut self, e: SmtExpr) {
        let implied = SmtExpr::implies(self.current_path_conditions(), e);
        self.add_assertion(implied);
    }

    // ── Safety checks ─────────────────────────────────────────────

    fn check_under_overflow(&mut self, value: &SmtExpr, ty: &TypeDesc, location: Span) {
        let Some((min, max)) = ty.integer_range() else { return };
        self.check_condition(
            value.clone().lt(SmtExpr::from(min.clone())),
            location,
            &format!(
                "Underflow (resulting value less than {})",
                format_number_readable(&min)
            ),
            Some(("<result>", value.clone())),
        );
        self.check_condition(
            value.clone().gt(SmtExpr::from(max.clone())),
            location,
            &format!(
                "Overflow (resulting value larger than {})",
                format_number_readable(&max)
            ),
            Some(("<result>", value.clone())),
        );
    }

    fn check_condition(
        &mut self,
        condition: SmtExpr,
        location: Span,
        description: &str,
        additional_value: Option<(&str, SmtExpr)>,
    ) {
        self.solver.push();
        self.add_path_conjoined_expression(condition);

        let mut expressions_to_evaluate: Vec<SmtExpr> = Vec::new();
        let mut expression_names: Vec<String> = Vec::new();
        if !self.function_path.is_empty() {
            if let Some((name, value)) = &additional_value {
                expressions_to_evaluate.push(value.clone());
                expression_names.push((*name).to_string());
            }
            for (id, var) in &self.variables {
                if var.ty().is_value_type() {
                    expressions_to_evaluate.push(var.current());
                    let name = self
                        .index
                        .var(*id)
                        .expect("model variable is supposed to be known")
                        .name
                        .clone();
                    expression_names.push(name);
                }
            }
            for (name, var) in &self.globals {
                if var.ty().is_value_type()
                    && !matches!(var.sort(), SmtSort::Function { .. })
                {
                    expressions_to_evaluate.push(var.current());
                    expression_names.push(name.clone());
                }
            }
            for term in &self.uninterpreted {
                if term.ty.is_value_type() {
                    if let Some(var) = self.expressions.get(&term.node) {
                        expressions_to_evaluate.push(var.current());
                        expression_names.push(match self.source {
                            Some(source) => source.at(term.span).to_string(),
                            None => "<expression>".to_string(),
                        });
                    }
                }
            }
        }

        let (result, values) =
            self.check_satisfiable_and_generate_model(&expressions_to_evaluate);

        let mut havoc_notes = Vec::new();
        if self.loop_executed {
            havoc_notes.push(Note::new(LOOP_NOTE));
        }
        if self.array_assigned {
            havoc_notes.push(Note::new(ARRAY_NOTE));
        }

        match result {
            CheckResult::Satisfiable => {
                let message = format!("{description} happens here");
                if !self.function_path.is_empty() {
                    let mut sorted_model: BTreeMap<String, String> = BTreeMap::new();
                    for (i, value) in values.iter().enumerate() {
                        // A value echoing the queried symbol means the solver
                        // left it unconstrained.
                        let own_name = expressions_to_evaluate[i].symbol_name();
                        if own_name != Some(value.as_str()) {
                            sorted_model.insert(expression_names[i].clone(), value.clone());
                        }
                    }
                    let mut model_message = String::from("  for:\n");
                    for (name, value) in &sorted_model {
                        model_message.push_str(&format!("  {name} = {value}\n"));
                    }
                    let mut secondary = vec![Note::new(model_message)];
                    secondary.extend(havoc_notes);
                    self.reporter.warning_with(location, message, secondary);
                } else {
                    self.reporter
                        .warning_with(location, format!("{message}."), havoc_notes);
                }
            }
            CheckResult::Unsatisfiable => {}
            CheckResult::Unknown => {
                self.reporter.warning_with(
                    location,
                    format!("{description} might happen here."),
                    havoc_notes,
                );
            }
            CheckResult::Conflicting => {
                self.reporter.warning(location, CONFLICTING_ANSWERS);
            }
            CheckResult::Error => {
                self.reporter.warning(location, SOLVER_ERROR);
            }
        }
        self.solver.pop();
    }

    fn check_boolean_not_constant(&mut self, condition: &Expr, description: &str) {
        // Literal conditions are spelled out; there is nothing to report.
        if matches!(condition.kind, ExprKind::BoolLiteral(_)) {
            return;
        }
        let condition_term = self.expr(condition);

        self.solver.push();
        self.add_path_conjoined_expression(condition_term.clone());
        let positive_result = self.check_satisfiable();
        self.solver.pop();

        self.solver.push();
        self.add_path_conjoined_expression(!condition_term);
        let negated_result = self.check_satisfiable();
        self.solver.pop();

        use CheckResult::*;
        match (positive_result, negated_result) {
            (Error, _) | (_, Error) => {
                self.reporter.warning(condition.span, SOLVER_ERROR);
            }
            (Conflicting, _) | (_, Conflicting) => {
                self.reporter.warning(condition.span, CONFLICTING_ANSWERS);
            }
            (Satisfiable, Satisfiable) => {
                // A genuine branch; nothing to report.
            }
            (Unknown, _) | (_, Unknown) => {
                // Cannot conclude anything.
            }
            (Unsatisfiable, Unsatisfiable) => {
                self.reporter.warning(condition.span, "Condition unreachable.");
            }
            (Satisfiable, Unsatisfiable) => {
                self.reporter
                    .warning(condition.span, description.replace("$VALUE", "true"));
            }
            (Unsatisfiable, Satisfiable) => {
                self.reporter
                    .warning(condition.span, description.replace("$VALUE", "false"));
            }
        }
    }

    fn check_satisfiable(&mut self) -> CheckResult {
        self.check_satisfiable_and_generate_model(&[]).0
    }

    fn check_satisfiable_and_generate_model(
        &mut self,
        expressions_to_evaluate: &[SmtExpr],
    ) -> (CheckResult, Vec<String>) {
        let (result, mut values) = self.solver.check(expressions_to_evaluate);
        for value in &mut values {
            // Re-format parseable integers readably; anything else is shown
            // as the solver produced it.
            if let Ok(parsed) = value.parse::<BigInt>() {
                *value = format_number_readable(&parsed);
            }
        }
        (result, values)
    }
}

fn unwrap_tuple(e: &Expr) -> &Expr {
    match &e.kind {
        ExprKind::Tuple(parts) if parts.len() == 1 => unwrap_tuple(&parts[0]),
        _ => e,
    }
}

fn function_key(callee: &Expr) -> Option<String> {
    match &callee.kind {
        ExprKind::Identifier { name, .. } => Some(format!("{}_{}", name, callee.ty)),
        ExprKind::Tuple(parts) if parts.len() == 1 => function_key(&parts[0]),
        _ => None,
    }
}
