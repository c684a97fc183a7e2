#![forbid(unsafe_code)]

//! The annotated AST consumed by the assertion checker.
//!
//! The front end (parser, resolver, type checker) is a separate component;
//! everything here is already name-resolved and type-annotated: expressions
//! carry their resolved type, identifiers carry their referenced declaration,
//! and function calls carry a call kind.

use std::collections::BTreeMap;

use miette::SourceSpan;
use num_bigint::BigInt;
use num_traits::One;

pub type Span = SourceSpan;

pub fn span(start: usize, len: usize) -> Span {
    SourceSpan::new(start.into(), len)
}

/// Identity of an AST expression or statement node, unique within a unit.
pub type NodeId = u32;

/// Identity of a declaration (variable or function), unique within a unit.
pub type DeclId = u32;

// ─── Types ─────────────────────────────────────────────────────────

/// A resolved semantic type, as annotated by the type checker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeDesc {
    Bool,
    Integer { bits: u16, signed: bool },
    /// Account address; ranges like a 160-bit unsigned integer.
    Address,
    Mapping { key: Box<TypeDesc>, value: Box<TypeDesc> },
    Function { params: Vec<TypeDesc>, returns: Vec<TypeDesc> },
    /// The type of calls that produce no value.
    Unit,
    /// The type of magic namespace bases such as `block` and `msg`.
    Magic,
    /// A type the front end resolved but the checker cannot model.
    Unsupported(String),
}

impl TypeDesc {
    pub fn uint(bits: u16) -> Self {
        TypeDesc::Integer { bits, signed: false }
    }

    pub fn int(bits: u16) -> Self {
        TypeDesc::Integer { bits, signed: true }
    }

    /// Whether values of this type fit in a single solver term.
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            TypeDesc::Bool | TypeDesc::Integer { .. } | TypeDesc::Address
        )
    }

    pub fn is_supported(&self) -> bool {
        match self {
            TypeDesc::Bool | TypeDesc::Integer { .. } | TypeDesc::Address => true,
            TypeDesc::Mapping { key, value } => key.is_supported() && value.is_supported(),
            TypeDesc::Function { .. }
            | TypeDesc::Unit
            | TypeDesc::Magic
            | TypeDesc::Unsupported(_) => false,
        }
    }

    /// The integer range `[min, max]` for numeric types.
    pub fn integer_range(&self) -> Option<(BigInt, BigInt)> {
        match self {
            TypeDesc::Integer { bits, signed: false } => {
                let max = (BigInt::one() << *bits as usize) - 1;
                Some((BigInt::from(0), max))
            }
            TypeDesc::Integer { bits, signed: true } => {
                let half = BigInt::one() << (*bits as usize - 1);
                Some((-half.clone(), half - 1))
            }
            TypeDesc::Address => TypeDesc::uint(160).integer_range(),
            _ => None,
        }
    }

    pub fn min_value(&self) -> Option<BigInt> {
        self.integer_range().map(|(lo, _)| lo)
    }

    pub fn max_value(&self) -> Option<BigInt> {
        self.integer_range().map(|(_, hi)| hi)
    }
}

impl std::fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeDesc::Bool => write!(f, "bool"),
            TypeDesc::Integer { bits, signed: false } => write!(f, "uint{bits}"),
            TypeDesc::Integer { bits, signed: true } => write!(f, "int{bits}"),
            TypeDesc::Address => write!(f, "address"),
            TypeDesc::Mapping { key, value } => write!(f, "mapping({key} => {value})"),
            TypeDesc::Function { params, returns } => {
                write!(f, "function (")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")?;
                if !returns.is_empty() {
                    write!(f, " returns (")?;
                    for (i, r) in returns.iter().enumerate() {
                        if i > 0 {
                            write!(f, ",")?;
                        }
                        write!(f, "{r}")?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
            TypeDesc::Unit => write!(f, "()"),
            TypeDesc::Magic => write!(f, "magic"),
            TypeDesc::Unsupported(name) => write!(f, "{name}"),
        }
    }
}

// ─── Declarations ──────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarKind {
    State,
    Param,
    Local,
    Return,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarDecl {
    pub span: Span,
    pub id: DeclId,
    pub name: String,
    pub ty: TypeDesc,
    pub kind: VarKind,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub span: Span,
    pub id: DeclId,
    pub name: String,
    pub params: Vec<VarDecl>,
    pub returns: Vec<VarDecl>,
    /// Every variable declared anywhere in the body, pre-collected by the
    /// resolver.
    pub locals: Vec<VarDecl>,
    /// `None` for functions without an implementation.
    pub body: Option<Block>,
    pub is_constructor: bool,
    pub has_modifiers: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContractDef {
    pub span: Span,
    pub name: String,
    pub state_vars: Vec<VarDecl>,
    pub functions: Vec<FunctionDef>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SourceUnit {
    /// Set when the unit opts into the experimental checker.
    pub smt_checker_enabled: bool,
    pub contracts: Vec<ContractDef>,
}

// ─── Expressions ───────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Inc,
    Dec,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,

    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    And,
    Or,
}

impl BinaryOp {
    pub fn is_arithmetic(&self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
}

/// How the type checker classified a function call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    Assert,
    Require,
    GasLeft,
    Internal,
    Keccak256,
    EcRecover,
    Sha256,
    Ripemd160,
    BlockHash,
    AddMod,
    MulMod,
    Other,
}

impl CallKind {
    /// Built-ins the checker abstracts with uninterpreted functions.
    pub fn is_abstracted(&self) -> bool {
        matches!(
            self,
            CallKind::Keccak256
                | CallKind::EcRecover
                | CallKind::Sha256
                | CallKind::Ripemd160
                | CallKind::BlockHash
                | CallKind::AddMod
                | CallKind::MulMod
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub ty: TypeDesc,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(id: NodeId, span: Span, ty: TypeDesc, kind: ExprKind) -> Self {
        Self { id, span, ty, kind }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    BoolLiteral(bool),
    NumberLiteral(BigInt),
    /// `decl` is `None` only for magic names such as `now`.
    Identifier {
        name: String,
        decl: Option<DeclId>,
    },
    Tuple(Vec<Expr>),
    Unary {
        op: UnaryOp,
        prefix: bool,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assignment {
        op: AssignOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    IndexAccess {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    /// `decl` references the member's declaration when it has one
    /// (bound functions); magic accesses such as `block.number` have none.
    MemberAccess {
        base: Box<Expr>,
        member: String,
        decl: Option<DeclId>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        kind: CallKind,
    },
}

// ─── Statements ────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub span: Span,
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Block(Block),
    VarDecl(VarDeclStmt),
    Expr(ExprStmt),
    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    Return(ReturnStmt),
    /// A construct the front end cannot lower for the checker.
    Unsupported(UnsupportedStmt),
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarDeclStmt {
    pub span: Span,
    /// Declarations introduced by this statement; more than one for
    /// destructuring forms.
    pub declarations: Vec<DeclId>,
    pub initial: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExprStmt {
    pub span: Span,
    pub expr: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IfStmt {
    pub span: Span,
    pub cond: Expr,
    pub then_branch: Box<Stmt>,
    pub else_branch: Option<Box<Stmt>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WhileStmt {
    pub span: Span,
    pub cond: Expr,
    pub body: Box<Stmt>,
    pub is_do_while: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForStmt {
    pub span: Span,
    pub init: Option<Box<Stmt>>,
    pub cond: Option<Expr>,
    pub update: Option<Expr>,
    pub body: Box<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReturnStmt {
    pub span: Span,
    pub expr: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnsupportedStmt {
    pub span: Span,
    pub description: String,
}

// ─── Unit index ────────────────────────────────────────────────────

/// Declaration tables for one unit, built by a single pre-pass.
pub struct UnitIndex<'a> {
    vars: BTreeMap<DeclId, &'a VarDecl>,
    functions: BTreeMap<DeclId, &'a FunctionDef>,
}

impl<'a> UnitIndex<'a> {
    pub fn build(unit: &'a SourceUnit) -> Self {
        let mut vars = BTreeMap::new();
        let mut functions = BTreeMap::new();
        for contract in &unit.contracts {
            for v in &contract.state_vars {
                vars.insert(v.id, v);
            }
            for f in &contract.functions {
                functions.insert(f.id, f);
                for v in f.params.iter().chain(&f.returns).chain(&f.locals) {
                    vars.insert(v.id, v);
                }
            }
        }
        Self { vars, functions }
    }

    pub fn var(&self, id: DeclId) -> Option<&'a VarDecl> {
        self.vars.get(&id).copied()
    }

    pub fn function(&self, id: DeclId) -> Option<&'a FunctionDef> {
        self.functions.get(&id).copied()
    }
}

// ─── Source text ───────────────────────────────────────────────────

/// Access to the original source for pretty-printing model entries.
pub struct SourceText {
    text: String,
}

impl SourceText {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The source slice a span covers, clamped to the text bounds.
    pub fn at(&self, span: Span) -> &str {
        let start = span.offset().min(self.text.len());
        let end = (span.offset() + span.len()).min(self.text.len());
        &self.text[start..end]
    }
}
