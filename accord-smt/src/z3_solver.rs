//! Live Z3 backend.
//!
//! The context is leaked so a solver session can be kept warm without
//! self-referential structs; acceptable for a process-lifetime checker.

use std::collections::HashMap;

use tracing::debug;
use z3::ast::{Array, Ast, Bool, Dynamic, Int};
use z3::{Config, Context, FuncDecl, Params, SatResult, Solver, Sort};

use crate::expr::{SmtExpr, SmtOp, SmtSort};
use crate::solver::{normalize_model_value, CheckResult, SmtSolver, SolverConfig};

pub struct Z3Solver {
    ctx: &'static Context,
    solver: Solver<'static>,
    funcs: HashMap<String, FuncDecl<'static>>,
}

impl Z3Solver {
    pub fn new(config: &SolverConfig) -> Self {
        let mut cfg = Config::new();
        cfg.set_model_generation(true);
        let ctx: &'static Context = Box::leak(Box::new(Context::new(&cfg)));
        let solver = Solver::new(ctx);

        let mut params = Params::new(ctx);
        params.set_u32("timeout", config.timeout_ms);
        // Fixed seeds keep runs reproducible.
        params.set_u32("smt.random_seed", 0);
        params.set_u32("sat.random_seed", 0);
        solver.set_params(&params);

        Self { ctx, solver, funcs: HashMap::new() }
    }

    fn z3_sort(&self, sort: &SmtSort) -> Sort<'static> {
        match sort {
            SmtSort::Bool => Sort::bool(self.ctx),
            SmtSort::Int => Sort::int(self.ctx),
            SmtSort::Array(key, value) => {
                Sort::array(self.ctx, &self.z3_sort(key), &self.z3_sort(value))
            }
            SmtSort::Function { codomain, .. } => self.z3_sort(codomain),
        }
    }

    fn func_decl(&mut self, name: &str, args: &[SmtExpr], sort: &SmtSort) -> &FuncDecl<'static> {
        if !self.funcs.contains_key(name) {
            let domain: Vec<Sort> = args.iter().map(|a| self.z3_sort(&a.sort())).collect();
            let domain_refs: Vec<&Sort> = domain.iter().collect();
            let range = self.z3_sort(sort);
            let decl = FuncDecl::new(self.ctx, name.to_string(), &domain_refs, &range);
            self.funcs.insert(name.to_string(), decl);
        }
        &self.funcs[name]
    }

    fn tr_dynamic(&mut self, e: &SmtExpr) -> Dynamic<'static> {
        match e.sort() {
            SmtSort::Bool => Dynamic::from_ast(&self.tr_bool(e)),
            SmtSort::Int => Dynamic::from_ast(&self.tr_int(e)),
            SmtSort::Array(..) => Dynamic::from_ast(&self.tr_array(e)),
            SmtSort::Function { .. } => {
                panic!("function-sorted term used as a value: {e}")
            }
        }
    }

    fn tr_int(&mut self, e: &SmtExpr) -> Int<'static> {
        match e {
            SmtExpr::Numeral(n) => {
                Int::from_str(self.ctx, &n.to_string()).expect("integer numeral")
            }
            SmtExpr::Var { name, .. } => Int::new_const(self.ctx, name.as_str()),
            SmtExpr::Uf { name, args, sort } => {
                let translated: Vec<Dynamic> =
                    args.iter().map(|a| self.tr_dynamic(a)).collect();
                let arg_refs: Vec<&dyn Ast> =
                    translated.iter().map(|a| a as &dyn Ast).collect();
                let decl = self.func_decl(name, args, sort);
                decl.apply(&arg_refs).as_int().expect("integer application")
            }
            SmtExpr::App { op, args } => match op {
                SmtOp::Add => {
                    let (l, r) = (self.tr_int(&args[0]), self.tr_int(&args[1]));
                    Int::add(self.ctx, &[&l, &r])
                }
                SmtOp::Sub => {
                    let (l, r) = (self.tr_int(&args[0]), self.tr_int(&args[1]));
                    Int::sub(self.ctx, &[&l, &r])
                }
                SmtOp::Mul => {
                    let (l, r) = (self.tr_int(&args[0]), self.tr_int(&args[1]));
                    Int::mul(self.ctx, &[&l, &r])
                }
                SmtOp::Div => {
                    let (l, r) = (self.tr_int(&args[0]), self.tr_int(&args[1]));
                    l.div(&r)
                }
                SmtOp::Ite => {
                    let cond = self.tr_bool(&args[0]);
                    let (t, f) = (self.tr_int(&args[1]), self.tr_int(&args[2]));
                    cond.ite(&t, &f)
                }
                SmtOp::Select => {
                    let array = self.tr_array(&args[0]);
                    let index = self.tr_dynamic(&args[1]);
                    array.select(&index).as_int().expect("integer select")
                }
                other => panic!("operator {other:?} does not produce an integer"),
            },
            other => panic!("term {other} is not integer-sorted"),
        }
    }

    fn tr_bool(&mut self, e: &SmtExpr) -> Bool<'static> {
        match e {
            SmtExpr::True => Bool::from_bool(self.ctx, true),
            SmtExpr::False => Bool::from_bool(self.ctx, false),
            SmtExpr::Var { name, .. } => Bool::new_const(self.ctx, name.as_str()),
            SmtExpr::Uf { name, args, sort } => {
                let translated: Vec<Dynamic> =
                    args.iter().map(|a| self.tr_dynamic(a)).collect();
                let arg_refs: Vec<&dyn Ast> =
                    translated.iter().map(|a| a as &dyn Ast).collect();
                let decl = self.func_decl(name, args, sort);
                decl.apply(&arg_refs).as_bool().expect("boolean application")
            }
            SmtExpr::App { op, args } => match op {
                SmtOp::Not => self.tr_bool(&args[0]).not(),
                SmtOp::And => {
                    let (l, r) = (self.tr_bool(&args[0]), self.tr_bool(&args[1]));
                    Bool::and(self.ctx, &[&l, &r])
                }
                SmtOp::Or => {
                    let (l, r) = (self.tr_bool(&args[0]), self.tr_bool(&args[1]));
                    Bool::or(self.ctx, &[&l, &r])
                }
                SmtOp::Implies => {
                    let (l, r) = (self.tr_bool(&args[0]), self.tr_bool(&args[1]));
                    l.implies(&r)
                }
                SmtOp::Eq => {
                    let (l, r) = (self.tr_dynamic(&args[0]), self.tr_dynamic(&args[1]));
                    l._eq(&r)
                }
                SmtOp::Lt => self.tr_int(&args[0]).lt(&self.tr_int(&args[1])),
                SmtOp::Le => self.tr_int(&args[0]).le(&self.tr_int(&args[1])),
                SmtOp::Gt => self.tr_int(&args[0]).gt(&self.tr_int(&args[1])),
                SmtOp::Ge => self.tr_int(&args[0]).ge(&self.tr_int(&args[1])),
                SmtOp::Ite => {
                    let cond = self.tr_bool(&args[0]);
                    let (t, f) = (self.tr_bool(&args[1]), self.tr_bool(&args[2]));
                    cond.ite(&t, &f)
                }
                SmtOp::Select => {
                    let array = self.tr_array(&args[0]);
                    let index = self.tr_dynamic(&args[1]);
                    array.select(&index).as_bool().expect("boolean select")
                }
                other => panic!("operator {other:?} does not produce a boolean"),
            },
            other => panic!("term {other} is not boolean-sorted"),
        }
    }

    fn tr_array(&mut self, e: &SmtExpr) -> Array<'static> {
        match e {
            SmtExpr::Var { name, sort: SmtSort::Array(key, value) } => {
                let (key, value) = (self.z3_sort(key), self.z3_sort(value));
                Array::new_const(self.ctx, name.as_str(), &key, &value)
            }
            SmtExpr::ConstArray { sort: SmtSort::Array(key, _), element } => {
                let key = self.z3_sort(key);
                let element = self.tr_dynamic(element);
                Array::const_array(self.ctx, &key, &element)
            }
            SmtExpr::App { op: SmtOp::Store, args } => {
                let array = self.tr_array(&args[0]);
                let index = self.tr_dynamic(&args[1]);
                let value = self.tr_dynamic(&args[2]);
                array.store(&index, &value)
            }
            SmtExpr::App { op: SmtOp::Ite, args } => {
                let cond = self.tr_bool(&args[0]);
                let (t, f) = (self.tr_array(&args[1]), self.tr_array(&args[2]));
                cond.ite(&t, &f)
            }
            other => panic!("term {other} is not array-sorted"),
        }
    }
}

impl SmtSolver for Z3Solver {
    fn push(&mut self) {
        self.solver.push();
    }

    fn pop(&mut self) {
        self.solver.pop(1);
    }

    fn declare_var(&mut self, name: &str, sort: &SmtSort) {
        // Constants materialize on first use; only function symbols need a
        // stable declaration.
        if let SmtSort::Function { .. } = sort {
            if !self.funcs.contains_key(name) {
                let SmtSort::Function { domain, codomain } = sort else {
                    unreachable!()
                };
                let sorts: Vec<Sort> = domain.iter().map(|d| self.z3_sort(d)).collect();
                let domain_refs: Vec<&Sort> = sorts.iter().collect();
                let range = self.z3_sort(codomain);
                let decl = FuncDecl::new(self.ctx, name.to_string(), &domain_refs, &range);
                self.funcs.insert(name.to_string(), decl);
            }
        }
    }

    fn add(&mut self, assertion: &SmtExpr) {
        let translated = self.tr_bool(assertion);
        self.solver.assert(&translated);
    }

    fn check(&mut self, eval: &[SmtExpr]) -> (CheckResult, Vec<String>) {
        match self.solver.check() {
            SatResult::Sat => {
                let Some(model) = self.solver.get_model() else {
                    return (CheckResult::Error, Vec::new());
                };
                let values = eval
                    .iter()
                    .map(|term| {
                        let translated = self.tr_dynamic(term);
                        model
                            .eval(&translated, true)
                            .map(|v| normalize_model_value(&v.to_string()))
                            .unwrap_or_default()
                    })
                    .collect();
                (CheckResult::Satisfiable, values)
            }
            SatResult::Unsat => (CheckResult::Unsatisfiable, Vec::new()),
            SatResult::Unknown => {
                debug!("z3 returned unknown");
                (CheckResult::Unknown, Vec::new())
            }
        }
    }

    fn reset(&mut self) {
        self.solver.reset();
        self.funcs.clear();
    }
}
