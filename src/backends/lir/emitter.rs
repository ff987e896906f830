//! Instruction emission.
//!
//! `InstructionEmitter` is the narrow surface the nested-context core emits through:
//! allocation, slot addressing, typed memory access, null contexts and calls.
//! `LirFunctionBuilder` is the LIR implementation and adds everything body lowering needs
//! on top (locals, arithmetic, closures, structured control flow).

use crate::backends::lir::lir_nodes::{
    AllocKind, ClosureSignature, FrameTypeId, LirBinOp, LirFunction, LirFunctionId, LirInst,
    LirLocalId, LirType, LirUnaryOp, ValueId,
};
use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError;
use crate::compiler_frontend::declarations::decl_nodes::DeclId;
use crate::return_compiler_error;

pub trait InstructionEmitter {
    fn const_int(&mut self, value: i64) -> ValueId;

    /// The context argument passed when no carrier exists
    fn null_context(&mut self) -> ValueId;

    fn alloc(&mut self, struct_type: FrameTypeId, kind: AllocKind) -> ValueId;

    fn field_addr(&mut self, base: ValueId, struct_type: FrameTypeId, slot: u32) -> ValueId;

    fn load(&mut self, addr: ValueId, ty: LirType) -> ValueId;

    fn store(&mut self, addr: ValueId, value: ValueId, ty: LirType);

    fn call(
        &mut self,
        function: LirFunctionId,
        args: Vec<ValueId>,
        ret: Option<LirType>,
    ) -> Option<ValueId>;
}

#[derive(Debug)]
pub struct LirFunctionBuilder {
    function: LirFunction,

    // Innermost block last. The function body is always blocks[0].
    blocks: Vec<Vec<LirInst>>,
}

impl LirFunctionBuilder {
    pub fn new(
        id: LirFunctionId,
        name: String,
        decl: DeclId,
        has_context: bool,
        params: Vec<LirType>,
        ret: Option<LirType>,
    ) -> Self {
        let mut locals = Vec::with_capacity(params.len() + 1);
        if has_context {
            locals.push(LirType::Ptr);
        }
        locals.extend(params.iter().copied());

        LirFunctionBuilder {
            function: LirFunction {
                id,
                name,
                decl,
                has_context,
                params,
                ret,
                locals,
                value_types: Vec::new(),
                body: Vec::new(),
            },
            blocks: vec![Vec::new()],
        }
    }

    pub fn function(&self) -> &LirFunction {
        &self.function
    }

    pub fn fresh_value(&mut self, ty: LirType) -> ValueId {
        let id = ValueId(self.function.value_types.len() as u32);
        self.function.value_types.push(ty);
        id
    }

    pub fn value_type(&self, value: ValueId) -> Option<LirType> {
        self.function.value_type(value)
    }

    pub fn push(&mut self, inst: LirInst) {
        if let Some(block) = self.blocks.last_mut() {
            block.push(inst);
        }
    }

    // ------------------------------------------------------------------
    // Locals
    // ------------------------------------------------------------------
    pub fn add_local(&mut self, ty: LirType) -> LirLocalId {
        let id = LirLocalId(self.function.locals.len() as u32);
        self.function.locals.push(ty);
        id
    }

    pub fn context_local(&self) -> Option<LirLocalId> {
        self.function.context_local()
    }

    pub fn param_local(&self, index: usize) -> LirLocalId {
        self.function.param_local(index)
    }

    pub fn local_get(&mut self, local: LirLocalId) -> Result<ValueId, CompilerError> {
        let Some(ty) = self.function.locals.get(local.0 as usize).copied() else {
            return_compiler_error!("Read of undeclared LIR local {}", local);
        };
        let dest = self.fresh_value(ty);
        self.push(LirInst::LocalGet { dest, local });
        Ok(dest)
    }

    pub fn local_set(&mut self, local: LirLocalId, value: ValueId) {
        self.push(LirInst::LocalSet { local, value });
    }

    // ------------------------------------------------------------------
    // Arithmetic and closures
    // ------------------------------------------------------------------
    pub fn binary(&mut self, op: LirBinOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let dest = self.fresh_value(LirType::I64);
        self.push(LirInst::Binary { dest, op, lhs, rhs });
        dest
    }

    pub fn unary(&mut self, op: LirUnaryOp, operand: ValueId) -> ValueId {
        let dest = self.fresh_value(LirType::I64);
        self.push(LirInst::Unary { dest, op, operand });
        dest
    }

    pub fn make_closure(&mut self, function: LirFunctionId, context: ValueId) -> ValueId {
        let dest = self.fresh_value(LirType::Closure);
        self.push(LirInst::MakeClosure {
            dest,
            function,
            context,
        });
        dest
    }

    pub fn call_closure(
        &mut self,
        closure: ValueId,
        args: Vec<ValueId>,
        signature: ClosureSignature,
    ) -> Option<ValueId> {
        let dest = signature.ret.map(|ty| self.fresh_value(ty));
        self.push(LirInst::CallClosure {
            dest,
            closure,
            args,
            signature,
        });
        dest
    }

    // ------------------------------------------------------------------
    // Control flow
    // ------------------------------------------------------------------
    pub fn begin_block(&mut self) {
        self.blocks.push(Vec::new());
    }

    pub fn end_block(&mut self) -> Result<Vec<LirInst>, CompilerError> {
        if self.blocks.len() < 2 {
            return_compiler_error!(
                "Unbalanced block in LIR function '{}'",
                self.function.name
            );
        }
        Ok(self.blocks.pop().unwrap_or_default())
    }

    pub fn emit_if(&mut self, condition: ValueId, then_body: Vec<LirInst>, else_body: Vec<LirInst>) {
        self.push(LirInst::If {
            condition,
            then_body,
            else_body,
        });
    }

    pub fn emit_loop(&mut self, header: Vec<LirInst>, condition: ValueId, body: Vec<LirInst>) {
        self.push(LirInst::Loop {
            header,
            condition,
            body,
        });
    }

    pub fn ret(&mut self, value: Option<ValueId>) {
        self.push(LirInst::Return { value });
    }

    pub fn unreachable(&mut self) {
        self.push(LirInst::Unreachable);
    }

    pub fn finish(mut self) -> Result<LirFunction, CompilerError> {
        if self.blocks.len() != 1 {
            return_compiler_error!(
                "LIR function '{}' finished with {} open blocks",
                self.function.name,
                self.blocks.len() - 1
            );
        }

        self.function.body = self.blocks.pop().unwrap_or_default();
        Ok(self.function)
    }
}

impl InstructionEmitter for LirFunctionBuilder {
    fn const_int(&mut self, value: i64) -> ValueId {
        let dest = self.fresh_value(LirType::I64);
        self.push(LirInst::Const { dest, value });
        dest
    }

    fn null_context(&mut self) -> ValueId {
        let dest = self.fresh_value(LirType::Ptr);
        self.push(LirInst::NullPtr { dest });
        dest
    }

    fn alloc(&mut self, struct_type: FrameTypeId, kind: AllocKind) -> ValueId {
        let dest = self.fresh_value(LirType::Ptr);
        self.push(LirInst::Alloc {
            dest,
            struct_type,
            kind,
        });
        dest
    }

    fn field_addr(&mut self, base: ValueId, struct_type: FrameTypeId, slot: u32) -> ValueId {
        let dest = self.fresh_value(LirType::Ptr);
        self.push(LirInst::FieldAddr {
            dest,
            base,
            struct_type,
            slot,
        });
        dest
    }

    fn load(&mut self, addr: ValueId, ty: LirType) -> ValueId {
        let dest = self.fresh_value(ty);
        self.push(LirInst::Load { dest, addr, ty });
        dest
    }

    fn store(&mut self, addr: ValueId, value: ValueId, ty: LirType) {
        self.push(LirInst::Store { addr, value, ty });
    }

    fn call(
        &mut self,
        function: LirFunctionId,
        args: Vec<ValueId>,
        ret: Option<LirType>,
    ) -> Option<ValueId> {
        let dest = ret.map(|ty| self.fresh_value(ty));
        self.push(LirInst::Call {
            dest,
            function,
            args,
        });
        dest
    }
}
