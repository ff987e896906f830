//! ============================================================
//!                     Declaration Tree
//! ============================================================
//! The read-only view of a type-checked program that the backend consumes.
//!  - Every function and aggregate (class/struct) is a Declaration
//!  - Declarations form the nesting tree through their lexical parent
//!  - Every local, parameter and field is a Variable with a stable id
//!  - Function bodies are fully resolved: references name ids, never strings
//!
//! The backend never mutates this tree. Everything it learns about a declaration
//! (captures, frame layouts, allocation decisions) lives in side tables keyed by DeclId.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================
// Stable IDs
// ============================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeclId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarId(pub u32);

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decl#{}", self.0)
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var#{}", self.0)
    }
}

// ============================================================
// Tree
// ============================================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclTree {
    /// Indexed by DeclId
    pub declarations: Vec<Declaration>,

    /// Indexed by VarId
    pub variables: Vec<Variable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub id: DeclId,
    pub name: String,

    /// Innermost enclosing function or aggregate. None at top level.
    pub parent: Option<DeclId>,

    /// Every variable this declaration directly declares, in declaration order.
    /// Functions list parameters before locals. Aggregates list their fields.
    pub locals: Vec<VarId>,

    /// Immediately nested declarations, in declaration order.
    pub children: Vec<DeclId>,

    pub kind: DeclKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeclKind {
    Function(FunctionDecl),
    Aggregate(AggregateDecl),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub params: Vec<VarId>,
    pub return_type: ValueType,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateDecl {
    pub aggregate_kind: AggregateKind,
    pub fields: Vec<VarId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateKind {
    Class,
    Struct,
}

// ============================================================
// Variables and Types
// ============================================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub id: VarId,
    pub name: String,
    pub ty: ValueType,
    pub owner: DeclId,
    pub kind: VarKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    Param,
    Local,
    Field,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Unit,
    Int,
    Bool,

    /// Pointer to an instance of the aggregate declaration
    Instance(DeclId),

    /// A function value: the target function paired with its context
    Function {
        params: Vec<ValueType>,
        ret: Box<ValueType>,
    },
}

impl ValueType {
    pub fn is_unit(&self) -> bool {
        matches!(self, ValueType::Unit)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Unit => write!(f, "Unit"),
            ValueType::Int => write!(f, "Int"),
            ValueType::Bool => write!(f, "Bool"),
            ValueType::Instance(id) => write!(f, "Instance({})", id),
            ValueType::Function { params, ret } => {
                write!(f, "fn(")?;
                for (index, param) in params.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ") -> {}", ret)
            }
        }
    }
}

// ============================================================
// Statements
// ============================================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// Declares and initialises a local of the enclosing function
    Let { var: VarId, value: Expr },

    Assign { target: Place, value: Expr },

    /// Expression evaluated only for side effects
    Expr(Expr),

    If {
        condition: Expr,
        then_block: Vec<Stmt>,
        else_block: Vec<Stmt>,
    },

    While { condition: Expr, body: Vec<Stmt> },

    Return(Option<Expr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Place {
    Var(VarId),
    Field { base: Box<Expr>, field: VarId },
}

// ============================================================
// Expressions
// ============================================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Int(i64),
    Bool(bool),

    /// A local or parameter of any enclosing function,
    /// or a field of an enclosing aggregate (implicit `this`)
    Var(VarId),

    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    /// Direct call of a top-level or nested function
    Call { function: DeclId, args: Vec<Expr> },

    /// Call of a method with an explicit receiver
    MethodCall {
        receiver: Box<Expr>,
        method: DeclId,
        args: Vec<Expr>,
    },

    /// Construct an aggregate instance. One initializer per field, in field order.
    New { aggregate: DeclId, args: Vec<Expr> },

    FieldGet { base: Box<Expr>, field: VarId },

    /// The enclosing instance of the given aggregate
    This { aggregate: DeclId },

    /// A function value that keeps the context the function was named in
    FunctionRef(DeclId),

    CallValue { callee: Box<Expr>, args: Vec<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}

// Small constructors so trees can be written by hand in tests and tools
impl Expr {
    pub fn var(var: VarId) -> Expr {
        Expr::Var(var)
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Add, lhs, rhs)
    }

    pub fn call(function: DeclId, args: Vec<Expr>) -> Expr {
        Expr::Call { function, args }
    }

    pub fn method_call(receiver: Expr, method: DeclId, args: Vec<Expr>) -> Expr {
        Expr::MethodCall {
            receiver: Box::new(receiver),
            method,
            args,
        }
    }

    pub fn new_instance(aggregate: DeclId, args: Vec<Expr>) -> Expr {
        Expr::New { aggregate, args }
    }

    pub fn field(base: Expr, field: VarId) -> Expr {
        Expr::FieldGet {
            base: Box::new(base),
            field,
        }
    }

    pub fn call_value(callee: Expr, args: Vec<Expr>) -> Expr {
        Expr::CallValue {
            callee: Box::new(callee),
            args,
        }
    }
}

impl Stmt {
    pub fn assign(var: VarId, value: Expr) -> Stmt {
        Stmt::Assign {
            target: Place::Var(var),
            value,
        }
    }

    pub fn ret(value: Expr) -> Stmt {
        Stmt::Return(Some(value))
    }
}
