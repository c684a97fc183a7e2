//! Solver-independent terms.
//!
//! Terms are plain trees rendered to SMT-LIB2 by `Display`; backends
//! translate them into their native representation. Arithmetic uses the
//! unbounded integer theory, so overflow checks are explicit range queries
//! rather than bit-vector wraparound.

use num_bigint::BigInt;

/// A solver sort.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SmtSort {
    Bool,
    Int,
    Array(Box<SmtSort>, Box<SmtSort>),
    Function {
        domain: Vec<SmtSort>,
        codomain: Box<SmtSort>,
    },
}

impl std::fmt::Display for SmtSort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SmtSort::Bool => write!(f, "Bool"),
            SmtSort::Int => write!(f, "Int"),
            SmtSort::Array(key, value) => write!(f, "(Array {key} {value})"),
            // Function sorts only appear in declarations, which print the
            // domain separately.
            SmtSort::Function { codomain, .. } => write!(f, "{codomain}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SmtOp {
    Not,
    And,
    Or,
    Implies,
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Ite,
    Select,
    Store,
}

impl SmtOp {
    fn token(&self) -> &'static str {
        match self {
            SmtOp::Not => "not",
            SmtOp::And => "and",
            SmtOp::Or => "or",
            SmtOp::Implies => "=>",
            SmtOp::Eq => "=",
            SmtOp::Lt => "<",
            SmtOp::Le => "<=",
            SmtOp::Gt => ">",
            SmtOp::Ge => ">=",
            SmtOp::Add => "+",
            SmtOp::Sub => "-",
            SmtOp::Mul => "*",
            SmtOp::Div => "div",
            SmtOp::Ite => "ite",
            SmtOp::Select => "select",
            SmtOp::Store => "store",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SmtExpr {
    True,
    False,
    Numeral(BigInt),
    Var {
        name: String,
        sort: SmtSort,
    },
    App {
        op: SmtOp,
        args: Vec<SmtExpr>,
    },
    /// Application of an uninterpreted function symbol.
    Uf {
        name: String,
        args: Vec<SmtExpr>,
        sort: SmtSort,
    },
    /// A constant array, used for empty mapping defaults.
    ConstArray {
        sort: SmtSort,
        element: Box<SmtExpr>,
    },
}

impl SmtExpr {
    pub fn var(name: impl Into<String>, sort: SmtSort) -> Self {
        SmtExpr::Var { name: name.into(), sort }
    }

    pub fn eq(left: impl Into<SmtExpr>, right: impl Into<SmtExpr>) -> Self {
        SmtExpr::App { op: SmtOp::Eq, args: vec![left.into(), right.into()] }
    }

    pub fn neq(left: impl Into<SmtExpr>, right: impl Into<SmtExpr>) -> Self {
        !SmtExpr::eq(left, right)
    }

    pub fn and(left: impl Into<SmtExpr>, right: impl Into<SmtExpr>) -> Self {
        SmtExpr::App { op: SmtOp::And, args: vec![left.into(), right.into()] }
    }

    pub fn or(left: impl Into<SmtExpr>, right: impl Into<SmtExpr>) -> Self {
        SmtExpr::App { op: SmtOp::Or, args: vec![left.into(), right.into()] }
    }

    pub fn implies(premise: impl Into<SmtExpr>, conclusion: impl Into<SmtExpr>) -> Self {
        SmtExpr::App { op: SmtOp::Implies, args: vec![premise.into(), conclusion.into()] }
    }

    pub fn ite(cond: SmtExpr, then_value: SmtExpr, else_value: SmtExpr) -> Self {
        SmtExpr::App { op: SmtOp::Ite, args: vec![cond, then_value, else_value] }
    }

    pub fn select(array: SmtExpr, index: SmtExpr) -> Self {
        SmtExpr::App { op: SmtOp::Select, args: vec![array, index] }
    }

    pub fn store(array: SmtExpr, index: SmtExpr, value: SmtExpr) -> Self {
        SmtExpr::App { op: SmtOp::Store, args: vec![array, index, value] }
    }

    pub fn apply(name: impl Into<String>, args: Vec<SmtExpr>, sort: SmtSort) -> Self {
        SmtExpr::Uf { name: name.into(), args, sort }
    }

    pub fn lt(self, rhs: impl Into<SmtExpr>) -> Self {
        SmtExpr::App { op: SmtOp::Lt, args: vec![self, rhs.into()] }
    }

    pub fn le(self, rhs: impl Into<SmtExpr>) -> Self {
        SmtExpr::App { op: SmtOp::Le, args: vec![self, rhs.into()] }
    }

    pub fn gt(self, rhs: impl Into<SmtExpr>) -> Self {
        SmtExpr::App { op: SmtOp::Gt, args: vec![self, rhs.into()] }
    }

    pub fn ge(self, rhs: impl Into<SmtExpr>) -> Self {
        SmtExpr::App { op: SmtOp::Ge, args: vec![self, rhs.into()] }
    }

    /// The sort of this term. Panics on ill-sorted trees, which indicate a
    /// checker bug rather than bad user input.
    pub fn sort(&self) -> SmtSort {
        match self {
            SmtExpr::True | SmtExpr::False => SmtSort::Bool,
            SmtExpr::Numeral(_) => SmtSort::Int,
            SmtExpr::Var { sort, .. } => sort.clone(),
            SmtExpr::Uf { sort, .. } => sort.clone(),
            SmtExpr::ConstArray { sort, .. } => sort.clone(),
            SmtExpr::App { op, args } => match op {
                SmtOp::Not
                | SmtOp::And
                | SmtOp::Or
                | SmtOp::Implies
                | SmtOp::Eq
                | SmtOp::Lt
                | SmtOp::Le
                | SmtOp::Gt
                | SmtOp::Ge => SmtSort::Bool,
                SmtOp::Add | SmtOp::Sub | SmtOp::Mul | SmtOp::Div => SmtSort::Int,
                SmtOp::Ite => args[1].sort(),
                SmtOp::Select => match args[0].sort() {
                    SmtSort::Array(_, value) => *value,
                    other => panic!("select applied to non-array sort {other}"),
                },
                SmtOp::Store => args[0].sort(),
            },
        }
    }

    /// The symbol a solver would echo for an unconstrained query entry.
    pub fn symbol_name(&self) -> Option<&str> {
        match self {
            SmtExpr::Var { name, .. } => Some(name),
            SmtExpr::Uf { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl From<bool> for SmtExpr {
    fn from(b: bool) -> Self {
        if b {
            SmtExpr::True
        } else {
            SmtExpr::False
        }
    }
}

impl From<BigInt> for SmtExpr {
    fn from(value: BigInt) -> Self {
        SmtExpr::Numeral(value)
    }
}

impl From<i64> for SmtExpr {
    fn from(value: i64) -> Self {
        SmtExpr::Numeral(BigInt::from(value))
    }
}

impl From<i32> for SmtExpr {
    fn from(value: i32) -> Self {
        SmtExpr::Numeral(BigInt::from(value))
    }
}

impl std::ops::Add for SmtExpr {
    type Output = SmtExpr;
    fn add(self, rhs: SmtExpr) -> SmtExpr {
        SmtExpr::App { op: SmtOp::Add, args: vec![self, rhs] }
    }
}

impl std::ops::Add<i64> for SmtExpr {
    type Output = SmtExpr;
    fn add(self, rhs: i64) -> SmtExpr {
        self + SmtExpr::from(rhs)
    }
}

impl std::ops::Sub for SmtExpr {
    type Output = SmtExpr;
    fn sub(self, rhs: SmtExpr) -> SmtExpr {
        SmtExpr::App { op: SmtOp::Sub, args: vec![self, rhs] }
    }
}

impl std::ops::Sub<i64> for SmtExpr {
    type Output = SmtExpr;
    fn sub(self, rhs: i64) -> SmtExpr {
        self - SmtExpr::from(rhs)
    }
}

impl std::ops::Mul for SmtExpr {
    type Output = SmtExpr;
    fn mul(self, rhs: SmtExpr) -> SmtExpr {
        SmtExpr::App { op: SmtOp::Mul, args: vec![self, rhs] }
    }
}

impl std::ops::Div for SmtExpr {
    type Output = SmtExpr;
    fn div(self, rhs: SmtExpr) -> SmtExpr {
        SmtExpr::App { op: SmtOp::Div, args: vec![self, rhs] }
    }
}

impl std::ops::Not for SmtExpr {
    type Output = SmtExpr;
    fn not(self) -> SmtExpr {
        SmtExpr::App { op: SmtOp::Not, args: vec![self] }
    }
}

/// Quote a symbol for SMT-LIB2 when it contains characters outside the
/// simple-symbol alphabet (e.g. `gasleft()`).
pub fn quoted_symbol(name: &str) -> String {
    let simple = !name.is_empty()
        && name.chars().all(|c| {
            c.is_ascii_alphanumeric() || "~!@$%^&*_-+=<>.?/".contains(c)
        })
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if simple {
        name.to_string()
    } else {
        format!("|{name}|")
    }
}

impl std::fmt::Display for SmtExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SmtExpr::True => write!(f, "true"),
            SmtExpr::False => write!(f, "false"),
            SmtExpr::Numeral(n) => {
                if n.sign() == num_bigint::Sign::Minus {
                    write!(f, "(- {})", n.magnitude())
                } else {
                    write!(f, "{n}")
                }
            }
            SmtExpr::Var { name, .. } => write!(f, "{}", quoted_symbol(name)),
            SmtExpr::App { op, args } => {
                write!(f, "({}", op.token())?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                write!(f, ")")
            }
            SmtExpr::Uf { name, args, .. } => {
                write!(f, "({}", quoted_symbol(name))?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                write!(f, ")")
            }
            SmtExpr::ConstArray { sort, element } => {
                write!(f, "((as const {sort}) {element})")
            }
        }
    }
}
