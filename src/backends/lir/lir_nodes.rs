//! LIR Nodes
//!
//! A small, structured, register-based IR. Each instruction that produces something writes
//! a fresh `ValueId`; values are scoped to their function and never reassigned.
//! Mutable state lives in locals or in memory reached through struct slots.
//!
//! Every struct type in a module is a context carrier: a function frame or an aggregate
//! instance. Slots are uniformly sized, so a struct is fully described by its slot types.

use crate::compiler_frontend::declarations::decl_nodes::DeclId;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LirLocalId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LirFunctionId(pub u32);

/// Index of a frame or instance struct in `LirModule::structs`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameTypeId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

impl fmt::Display for LirLocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

impl fmt::Display for LirFunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn{}", self.0)
    }
}

impl fmt::Display for FrameTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LirType {
    /// Integers and booleans
    I64,

    /// Frame pointers, instance pointers and slot addresses
    Ptr,

    /// A function value paired with its context
    Closure,
}

impl fmt::Display for LirType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LirType::I64 => write!(f, "i64"),
            LirType::Ptr => write!(f, "ptr"),
            LirType::Closure => write!(f, "closure"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocKind {
    /// Released when the allocating activation returns
    Stack,
    Heap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LirBinOp {
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
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LirUnaryOp {
    Neg,

    /// 1 if the operand is zero, otherwise 0
    Eqz,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClosureSignature {
    pub params: Vec<LirType>,
    pub ret: Option<LirType>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LirInst {
    Const {
        dest: ValueId,
        value: i64,
    },
    NullPtr {
        dest: ValueId,
    },
    Binary {
        dest: ValueId,
        op: LirBinOp,
        lhs: ValueId,
        rhs: ValueId,
    },
    Unary {
        dest: ValueId,
        op: LirUnaryOp,
        operand: ValueId,
    },
    LocalGet {
        dest: ValueId,
        local: LirLocalId,
    },
    LocalSet {
        local: LirLocalId,
        value: ValueId,
    },
    Alloc {
        dest: ValueId,
        struct_type: FrameTypeId,
        kind: AllocKind,
    },
    FieldAddr {
        dest: ValueId,
        base: ValueId,
        struct_type: FrameTypeId,
        slot: u32,
    },
    Load {
        dest: ValueId,
        addr: ValueId,
        ty: LirType,
    },
    Store {
        addr: ValueId,
        value: ValueId,
        ty: LirType,
    },

    /// The callee's hidden context argument, when it takes one, is `args[0]`
    Call {
        dest: Option<ValueId>,
        function: LirFunctionId,
        args: Vec<ValueId>,
    },
    MakeClosure {
        dest: ValueId,
        function: LirFunctionId,
        context: ValueId,
    },
    CallClosure {
        dest: Option<ValueId>,
        closure: ValueId,
        args: Vec<ValueId>,
        signature: ClosureSignature,
    },
    If {
        condition: ValueId,
        then_body: Vec<LirInst>,
        else_body: Vec<LirInst>,
    },

    /// Runs `header`, leaves the loop when `condition` is zero, otherwise runs `body` and repeats
    Loop {
        header: Vec<LirInst>,
        condition: ValueId,
        body: Vec<LirInst>,
    },
    Return {
        value: Option<ValueId>,
    },
    Unreachable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LirStructType {
    pub id: FrameTypeId,
    pub name: String,
    pub owner: DeclId,
    pub slots: Vec<LirType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LirFunction {
    pub id: LirFunctionId,

    /// Qualified declaration path, e.g. `outer.inc`
    pub name: String,
    pub decl: DeclId,

    /// Takes a hidden context pointer as local 0
    pub has_context: bool,
    pub params: Vec<LirType>,
    pub ret: Option<LirType>,

    /// Context, then params, then body locals
    pub locals: Vec<LirType>,

    /// Indexed by ValueId
    pub value_types: Vec<LirType>,
    pub body: Vec<LirInst>,
}

impl LirFunction {
    pub fn context_local(&self) -> Option<LirLocalId> {
        self.has_context.then_some(LirLocalId(0))
    }

    pub fn param_local(&self, index: usize) -> LirLocalId {
        LirLocalId(index as u32 + self.has_context as u32)
    }

    /// Parameter types as seen by a caller, context included
    pub fn call_params(&self) -> Vec<LirType> {
        let mut params = Vec::with_capacity(self.params.len() + 1);
        if self.has_context {
            params.push(LirType::Ptr);
        }
        params.extend(self.params.iter().copied());
        params
    }

    pub fn value_type(&self, value: ValueId) -> Option<LirType> {
        self.value_types.get(value.0 as usize).copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LirModule {
    /// Indexed by FrameTypeId
    pub structs: Vec<LirStructType>,

    /// Indexed by LirFunctionId
    pub functions: Vec<LirFunction>,
}

impl LirModule {
    pub fn function(&self, id: LirFunctionId) -> Option<&LirFunction> {
        self.functions.get(id.0 as usize)
    }

    pub fn struct_type(&self, id: FrameTypeId) -> Option<&LirStructType> {
        self.structs.get(id.0 as usize)
    }

    pub fn find_function(&self, name: &str) -> Option<&LirFunction> {
        self.functions.iter().find(|function| function.name == name)
    }
}
