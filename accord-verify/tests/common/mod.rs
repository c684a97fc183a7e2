#![allow(dead_code)]

//! Hand-built annotated ASTs for the checker tests, standing in for the
//! front end.

use std::cell::Cell;

use accord_ast::{
    span, AssignOp, BinaryOp, Block, CallKind, ContractDef, DeclId, Expr, ExprKind, ExprStmt,
    FunctionDef, IfStmt, NodeId, SourceUnit, Stmt, TypeDesc, VarDecl, VarDeclStmt, VarKind,
    WhileStmt,
};
use num_bigint::BigInt;

pub struct Builder {
    next: Cell<NodeId>,
}

impl Builder {
    pub fn new() -> Self {
        Self { next: Cell::new(1) }
    }

    fn id(&self) -> NodeId {
        let v = self.next.get();
        self.next.set(v + 1);
        v
    }

    pub fn e(&self, ty: TypeDesc, kind: ExprKind) -> Expr {
        Expr::new(self.id(), span(0, 0), ty, kind)
    }

    pub fn num(&self, value: i64, ty: TypeDesc) -> Expr {
        self.e(ty, ExprKind::NumberLiteral(BigInt::from(value)))
    }

    pub fn boolean(&self, value: bool) -> Expr {
        self.e(TypeDesc::Bool, ExprKind::BoolLiteral(value))
    }

    pub fn var(&self, name: &str, decl: DeclId, ty: TypeDesc) -> Expr {
        self.e(ty, ExprKind::Identifier { name: name.into(), decl: Some(decl) })
    }

    pub fn bin(&self, op: BinaryOp, ty: TypeDesc, left: Expr, right: Expr) -> Expr {
        self.e(ty, ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) })
    }

    pub fn cmp(&self, op: BinaryOp, left: Expr, right: Expr) -> Expr {
        self.bin(op, TypeDesc::Bool, left, right)
    }

    pub fn index(&self, ty: TypeDesc, base: Expr, index: Expr) -> Expr {
        self.e(ty, ExprKind::IndexAccess { base: Box::new(base), index: Box::new(index) })
    }

    pub fn assign(&self, lhs: Expr, rhs: Expr) -> Stmt {
        let ty = lhs.ty.clone();
        let e = self.e(
            ty,
            ExprKind::Assignment { op: AssignOp::Assign, lhs: Box::new(lhs), rhs: Box::new(rhs) },
        );
        self.stmt(e)
    }

    pub fn stmt(&self, e: Expr) -> Stmt {
        Stmt::Expr(ExprStmt { span: span(0, 0), expr: e })
    }

    pub fn block(&self, stmts: Vec<Stmt>) -> Stmt {
        Stmt::Block(Block { span: span(0, 0), stmts })
    }

    pub fn if_stmt(&self, cond: Expr, then_stmts: Vec<Stmt>) -> Stmt {
        Stmt::If(IfStmt {
            span: span(0, 0),
            cond,
            then_branch: Box::new(self.block(then_stmts)),
            else_branch: None,
        })
    }

    pub fn while_stmt(&self, cond: Expr, body: Vec<Stmt>) -> Stmt {
        Stmt::While(WhileStmt {
            span: span(0, 0),
            cond,
            body: Box::new(self.block(body)),
            is_do_while: false,
        })
    }

    pub fn var_decl_stmt(&self, declaration: DeclId, initial: Expr) -> Stmt {
        Stmt::VarDecl(VarDeclStmt {
            span: span(0, 0),
            declarations: vec![declaration],
            initial: Some(initial),
        })
    }

    pub fn assert_stmt(&self, cond: Expr) -> Stmt {
        let callee = self.e(
            TypeDesc::Function { params: vec![TypeDesc::Bool], returns: vec![] },
            ExprKind::Identifier { name: "assert".into(), decl: None },
        );
        self.stmt(self.e(
            TypeDesc::Unit,
            ExprKind::Call { callee: Box::new(callee), args: vec![cond], kind: CallKind::Assert },
        ))
    }

    pub fn require_stmt(&self, cond: Expr) -> Stmt {
        let callee = self.e(
            TypeDesc::Function { params: vec![TypeDesc::Bool], returns: vec![] },
            ExprKind::Identifier { name: "require".into(), decl: None },
        );
        self.stmt(self.e(
            TypeDesc::Unit,
            ExprKind::Call { callee: Box::new(callee), args: vec![cond], kind: CallKind::Require },
        ))
    }
}

pub fn decl(id: DeclId, name: &str, ty: TypeDesc, kind: VarKind) -> VarDecl {
    VarDecl { span: span(0, 0), id, name: name.into(), ty, kind }
}

pub fn function(
    id: DeclId,
    name: &str,
    params: Vec<VarDecl>,
    returns: Vec<VarDecl>,
    locals: Vec<VarDecl>,
    stmts: Vec<Stmt>,
) -> FunctionDef {
    FunctionDef {
        span: span(0, 0),
        id,
        name: name.into(),
        params,
        returns,
        locals,
        body: Some(Block { span: span(0, 0), stmts }),
        is_constructor: false,
        has_modifiers: false,
    }
}

pub fn unit(state_vars: Vec<VarDecl>, functions: Vec<FunctionDef>) -> SourceUnit {
    SourceUnit {
        smt_checker_enabled: true,
        contracts: vec![ContractDef { span: span(0, 0), name: "C".into(), state_vars, functions }],
    }
}

pub fn uint256() -> TypeDesc {
    TypeDesc::uint(256)
}

pub fn uint_mapping() -> TypeDesc {
    TypeDesc::Mapping { key: Box::new(uint256()), value: Box::new(uint256()) }
}

/// `function f(uint256 x) public { assert(x + 1 > x); }`
pub fn increment_overflow_unit() -> SourceUnit {
    let b = Builder::new();
    let x = || b.var("x", 1, uint256());
    let sum = b.bin(BinaryOp::Add, uint256(), x(), b.num(1, uint256()));
    let body = vec![b.assert_stmt(b.cmp(BinaryOp::Gt, sum, x()))];
    unit(
        vec![],
        vec![function(100, "f", vec![decl(1, "x", uint256(), VarKind::Param)], vec![], vec![], body)],
    )
}

/// `function f(int8 x) public { int8 y = x / -1; }`
pub fn signed_division_overflow_unit() -> SourceUnit {
    let b = Builder::new();
    let int8 = TypeDesc::int(8);
    let quotient = b.bin(
        BinaryOp::Div,
        int8.clone(),
        b.var("x", 1, int8.clone()),
        b.num(-1, int8.clone()),
    );
    let body = vec![b.var_decl_stmt(7, quotient)];
    unit(
        vec![],
        vec![function(
            100,
            "f",
            vec![decl(1, "x", int8.clone(), VarKind::Param)],
            vec![],
            vec![decl(7, "y", int8, VarKind::Local)],
            body,
        )],
    )
}

/// `function f(uint256 a, uint256 b) public { uint256 c = a / b; }`
pub fn division_by_zero_unit() -> SourceUnit {
    let b = Builder::new();
    let quotient = b.bin(
        BinaryOp::Div,
        uint256(),
        b.var("a", 1, uint256()),
        b.var("b", 2, uint256()),
    );
    let body = vec![b.var_decl_stmt(7, quotient)];
    unit(
        vec![],
        vec![function(
            100,
            "f",
            vec![
                decl(1, "a", uint256(), VarKind::Param),
                decl(2, "b", uint256(), VarKind::Param),
            ],
            vec![],
            vec![decl(7, "c", uint256(), VarKind::Local)],
            body,
        )],
    )
}

/// `function f(uint256 x) public { if (x > 0) { assert(x > 0); } }`
pub fn guarded_assert_unit() -> SourceUnit {
    let b = Builder::new();
    let x = || b.var("x", 1, uint256());
    let body = vec![b.if_stmt(
        b.cmp(BinaryOp::Gt, x(), b.num(0, uint256())),
        vec![b.assert_stmt(b.cmp(BinaryOp::Gt, x(), b.num(0, uint256())))],
    )];
    unit(
        vec![],
        vec![function(100, "f", vec![decl(1, "x", uint256(), VarKind::Param)], vec![], vec![], body)],
    )
}

/// `function f() public { while (true) { } assert(false); }`
pub fn loop_then_failing_assert_unit() -> SourceUnit {
    let b = Builder::new();
    let body = vec![
        b.while_stmt(b.boolean(true), vec![]),
        b.assert_stmt(b.boolean(false)),
    ];
    unit(vec![], vec![function(100, "f", vec![], vec![], vec![], body)])
}

/// `function f(uint256 x) public { require(x < 10); assert(x < 100); }`
pub fn require_bounds_assert_unit() -> SourceUnit {
    let b = Builder::new();
    let x = || b.var("x", 1, uint256());
    let body = vec![
        b.require_stmt(b.cmp(BinaryOp::Lt, x(), b.num(10, uint256()))),
        b.assert_stmt(b.cmp(BinaryOp::Lt, x(), b.num(100, uint256()))),
    ];
    unit(
        vec![],
        vec![function(100, "f", vec![decl(1, "x", uint256(), VarKind::Param)], vec![], vec![], body)],
    )
}

/// `function f() public { if (1 < 2) { } }`
pub fn trivially_true_condition_unit() -> SourceUnit {
    let b = Builder::new();
    let body = vec![b.if_stmt(
        b.cmp(BinaryOp::Lt, b.num(1, uint256()), b.num(2, uint256())),
        vec![],
    )];
    unit(vec![], vec![function(100, "f", vec![], vec![], vec![], body)])
}

/// ```text
/// mapping(uint256 => uint256) m;
/// function f(uint256 k, uint256 v) public { m[k] = v; assert(m[k] == v); }
/// ```
pub fn mapping_roundtrip_unit() -> SourceUnit {
    let b = Builder::new();
    let m = || b.var("m", 1, uint_mapping());
    let k = || b.var("k", 2, uint256());
    let v = || b.var("v", 3, uint256());
    let body = vec![
        b.assign(b.index(uint256(), m(), k()), v()),
        b.assert_stmt(b.cmp(BinaryOp::Eq, b.index(uint256(), m(), k()), v())),
    ];
    unit(
        vec![decl(1, "m", uint_mapping(), VarKind::State)],
        vec![function(
            100,
            "f",
            vec![
                decl(2, "k", uint256(), VarKind::Param),
                decl(3, "v", uint256(), VarKind::Param),
            ],
            vec![],
            vec![],
            body,
        )],
    )
}
