//! WASM Codegen Encoder
//!
//! Lowers a `LirModule` to a validated Wasm binary.
//!
//! Function index 0 is the bump allocator; LIR function `fnN` becomes Wasm function `N + 1`.
//! LIR locals keep their index, so the hidden context is Wasm local 0 whenever a function
//! takes one. Every `ValueId` gets its own Wasm local after the LIR locals.
//!
//! Closures are heap pairs of {LIR function id, context}. Calls through a closure compare
//! the stored id against every function whose address is taken with a matching signature,
//! so no table is needed.

use crate::backends::lir::lir_nodes::{
    AllocKind, ClosureSignature, LirBinOp, LirFunction, LirFunctionId, LirInst, LirModule,
    LirType, LirUnaryOp, ValueId,
};
use crate::backends::wasm::memory::{
    CLOSURE_CONTEXT_OFFSET, CLOSURE_FUNCTION_OFFSET, CLOSURE_SIZE, MemoryConfig, MemoryIndices,
    MemoryManager, SLOT_SIZE, emit_heap_alloc, emit_restore_stack, emit_save_stack,
    emit_stack_alloc, i32_mem, i64_mem, slot_offset,
};
use crate::backends::wasm::module_builder::WasmModuleBuilder;
use crate::backends::wasm::validator::validate_wasm;
use crate::codegen_log;
use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError;
use wasm_encoder::{BlockType, ExportKind, Function, Instruction, ValType};

/// Allocator functions that come before the LIR functions
const INTERNAL_FUNCTIONS: u32 = 1;

pub fn encode_wasm(lir: &LirModule) -> Result<Vec<u8>, CompilerError> {
    let mut module_builder = WasmModuleBuilder::new();
    let memory = MemoryManager::new(MemoryConfig::default()).setup_memory(&mut module_builder)?;

    if module_builder.function_count() != INTERNAL_FUNCTIONS {
        return Err(CompilerError::wasm_generation(
            "Allocator must be the only function declared before the program",
        ));
    }

    for function in &lir.functions {
        let params: Vec<ValType> = function.call_params().iter().map(|ty| val_type(*ty)).collect();
        let results: Vec<ValType> = function.ret.iter().map(|ty| val_type(*ty)).collect();
        let type_index = module_builder.add_function_type(params, results);
        module_builder.declare_function(type_index);
    }

    let closure_targets = collect_closure_targets(lir);

    for function in &lir.functions {
        let encoder = FunctionEncoder::new(lir, function, &memory, &closure_targets);
        let body = encoder.encode()?;
        module_builder.add_function_body(&body)?;

        // Only top-level functions can be called from the host
        if !function.has_context {
            module_builder.add_export(&function.name, ExportKind::Func, wasm_index(function.id))?;
        }
    }

    let bytes = module_builder.finish()?;
    codegen_log!("Encoded Wasm module: ", Green #bytes.len(), " bytes");

    validate_wasm(&bytes)?;
    Ok(bytes)
}

pub fn wasm_index(function: LirFunctionId) -> u32 {
    function.0 + INTERNAL_FUNCTIONS
}

fn val_type(ty: LirType) -> ValType {
    match ty {
        LirType::I64 => ValType::I64,
        LirType::Ptr | LirType::Closure => ValType::I32,
    }
}

/// Functions whose address is taken somewhere in the module, in id order.
fn collect_closure_targets(lir: &LirModule) -> Vec<LirFunctionId> {
    let mut targets = Vec::new();
    for function in &lir.functions {
        walk_instructions(&function.body, &mut |inst| {
            if let LirInst::MakeClosure { function, .. } = inst {
                targets.push(*function);
            }
        });
    }
    targets.sort();
    targets.dedup();
    targets
}

fn walk_instructions(body: &[LirInst], visit: &mut impl FnMut(&LirInst)) {
    for inst in body {
        visit(inst);
        match inst {
            LirInst::If {
                then_body,
                else_body,
                ..
            } => {
                walk_instructions(then_body, visit);
                walk_instructions(else_body, visit);
            }
            LirInst::Loop { header, body, .. } => {
                walk_instructions(header, visit);
                walk_instructions(body, visit);
            }
            _ => {}
        }
    }
}

struct FunctionEncoder<'a> {
    module: &'a LirModule,
    function: &'a LirFunction,
    memory: &'a MemoryIndices,
    closure_targets: &'a [LirFunctionId],
    wasm: Function,

    /// Wasm local of `ValueId(0)`
    value_base: u32,

    /// Holds the stack pointer on entry when the function allocates frames on the stack
    saved_stack: Option<u32>,
}

impl<'a> FunctionEncoder<'a> {
    fn new(
        module: &'a LirModule,
        function: &'a LirFunction,
        memory: &'a MemoryIndices,
        closure_targets: &'a [LirFunctionId],
    ) -> Self {
        let param_count = function.call_params().len();
        let mut declared: Vec<(u32, ValType)> = function
            .locals
            .iter()
            .skip(param_count)
            .map(|ty| (1, val_type(*ty)))
            .collect();
        declared.extend(function.value_types.iter().map(|ty| (1, val_type(*ty))));

        let value_base = function.locals.len() as u32;
        let mut saved_stack = None;
        if allocates_on_stack(&function.body) {
            saved_stack = Some(value_base + function.value_types.len() as u32);
            declared.push((1, ValType::I32));
        }

        FunctionEncoder {
            module,
            function,
            memory,
            closure_targets,
            wasm: Function::new(declared),
            value_base,
            saved_stack,
        }
    }

    fn encode(mut self) -> Result<Function, CompilerError> {
        if self.function.locals.len() < self.function.call_params().len() {
            return Err(self.error("has fewer locals than parameters"));
        }

        if let Some(saved) = self.saved_stack {
            emit_save_stack(&mut self.wasm, self.memory, saved);
        }

        let function = self.function;
        self.encode_block(&function.body)?;
        self.wasm.instruction(&Instruction::End);
        Ok(self.wasm)
    }

    fn value(&self, value: ValueId) -> u32 {
        self.value_base + value.0
    }

    fn get(&mut self, value: ValueId) {
        let local = self.value(value);
        self.wasm.instruction(&Instruction::LocalGet(local));
    }

    fn set(&mut self, value: ValueId) {
        let local = self.value(value);
        self.wasm.instruction(&Instruction::LocalSet(local));
    }

    fn encode_block(&mut self, body: &[LirInst]) -> Result<(), CompilerError> {
        for inst in body {
            self.encode_inst(inst)?;
        }
        Ok(())
    }

    fn encode_inst(&mut self, inst: &LirInst) -> Result<(), CompilerError> {
        match inst {
            LirInst::Const { dest, value } => {
                self.wasm.instruction(&Instruction::I64Const(*value));
                self.set(*dest);
            }

            LirInst::NullPtr { dest } => {
                self.wasm.instruction(&Instruction::I32Const(0));
                self.set(*dest);
            }

            LirInst::Binary { dest, op, lhs, rhs } => {
                self.get(*lhs);
                self.get(*rhs);
                self.encode_bin_op(*op);
                self.set(*dest);
            }

            LirInst::Unary { dest, op, operand } => {
                match op {
                    LirUnaryOp::Neg => {
                        self.wasm.instruction(&Instruction::I64Const(0));
                        self.get(*operand);
                        self.wasm.instruction(&Instruction::I64Sub);
                    }
                    LirUnaryOp::Eqz => {
                        self.get(*operand);
                        self.wasm.instruction(&Instruction::I64Eqz);
                        self.wasm.instruction(&Instruction::I64ExtendI32U);
                    }
                }
                self.set(*dest);
            }

            LirInst::LocalGet { dest, local } => {
                self.wasm.instruction(&Instruction::LocalGet(local.0));
                self.set(*dest);
            }

            LirInst::LocalSet { local, value } => {
                self.get(*value);
                self.wasm.instruction(&Instruction::LocalSet(local.0));
            }

            LirInst::Alloc {
                dest,
                struct_type,
                kind,
            } => {
                let Some(layout) = self.module.struct_type(*struct_type) else {
                    return Err(self.error(&format!("allocates unknown struct {struct_type}")));
                };
                let size = layout.slots.len() as u32 * SLOT_SIZE;
                match kind {
                    AllocKind::Heap => emit_heap_alloc(&mut self.wasm, self.memory, size),
                    AllocKind::Stack => emit_stack_alloc(&mut self.wasm, self.memory, size),
                }
                self.set(*dest);
            }

            LirInst::FieldAddr {
                dest, base, slot, ..
            } => {
                self.get(*base);
                self.wasm.instruction(&Instruction::I32Const(slot_offset(*slot) as i32));
                self.wasm.instruction(&Instruction::I32Add);
                self.set(*dest);
            }

            LirInst::Load { dest, addr, ty } => {
                self.get(*addr);
                match ty {
                    LirType::I64 => self.wasm.instruction(&Instruction::I64Load(i64_mem(0))),
                    LirType::Ptr | LirType::Closure => {
                        self.wasm.instruction(&Instruction::I32Load(i32_mem(0)))
                    }
                };
                self.set(*dest);
            }

            LirInst::Store { addr, value, ty } => {
                self.get(*addr);
                self.get(*value);
                match ty {
                    LirType::I64 => self.wasm.instruction(&Instruction::I64Store(i64_mem(0))),
                    LirType::Ptr | LirType::Closure => {
                        self.wasm.instruction(&Instruction::I32Store(i32_mem(0)))
                    }
                };
            }

            LirInst::Call {
                dest,
                function,
                args,
            } => {
                let Some(callee) = self.module.function(*function) else {
                    return Err(self.error(&format!("calls unknown function {function}")));
                };
                for arg in args {
                    self.get(*arg);
                }
                self.wasm.instruction(&Instruction::Call(wasm_index(*function)));
                self.finish_call(*dest, callee.ret.is_some());
            }

            LirInst::MakeClosure {
                dest,
                function,
                context,
            } => {
                emit_heap_alloc(&mut self.wasm, self.memory, CLOSURE_SIZE);
                self.set(*dest);

                self.get(*dest);
                self.wasm.instruction(&Instruction::I32Const(function.0 as i32));
                self.wasm
                    .instruction(&Instruction::I32Store(i32_mem(CLOSURE_FUNCTION_OFFSET)));

                self.get(*dest);
                self.get(*context);
                self.wasm
                    .instruction(&Instruction::I32Store(i32_mem(CLOSURE_CONTEXT_OFFSET)));
            }

            LirInst::CallClosure {
                dest,
                closure,
                args,
                signature,
            } => self.encode_closure_call(*dest, *closure, args, signature),

            LirInst::If {
                condition,
                then_body,
                else_body,
            } => {
                self.get(*condition);
                self.wasm.instruction(&Instruction::I64Const(0));
                self.wasm.instruction(&Instruction::I64Ne);
                self.wasm.instruction(&Instruction::If(BlockType::Empty));
                self.encode_block(then_body)?;
                if !else_body.is_empty() {
                    self.wasm.instruction(&Instruction::Else);
                    self.encode_block(else_body)?;
                }
                self.wasm.instruction(&Instruction::End);
            }

            LirInst::Loop {
                header,
                condition,
                body,
            } => {
                self.wasm.instruction(&Instruction::Block(BlockType::Empty));
                self.wasm.instruction(&Instruction::Loop(BlockType::Empty));
                self.encode_block(header)?;
                self.get(*condition);
                self.wasm.instruction(&Instruction::I64Eqz);
                self.wasm.instruction(&Instruction::BrIf(1));
                self.encode_block(body)?;
                self.wasm.instruction(&Instruction::Br(0));
                self.wasm.instruction(&Instruction::End);
                self.wasm.instruction(&Instruction::End);
            }

            LirInst::Return { value } => {
                if let Some(saved) = self.saved_stack {
                    emit_restore_stack(&mut self.wasm, self.memory, saved);
                }
                if let Some(value) = value {
                    self.get(*value);
                }
                self.wasm.instruction(&Instruction::Return);
            }

            LirInst::Unreachable => {
                self.wasm.instruction(&Instruction::Unreachable);
            }
        }

        Ok(())
    }

    fn encode_bin_op(&mut self, op: LirBinOp) {
        let (instruction, compares) = match op {
            LirBinOp::Add => (Instruction::I64Add, false),
            LirBinOp::Sub => (Instruction::I64Sub, false),
            LirBinOp::Mul => (Instruction::I64Mul, false),
            LirBinOp::Div => (Instruction::I64DivS, false),
            LirBinOp::Rem => (Instruction::I64RemS, false),
            LirBinOp::Eq => (Instruction::I64Eq, true),
            LirBinOp::Ne => (Instruction::I64Ne, true),
            LirBinOp::Lt => (Instruction::I64LtS, true),
            LirBinOp::Le => (Instruction::I64LeS, true),
            LirBinOp::Gt => (Instruction::I64GtS, true),
            LirBinOp::Ge => (Instruction::I64GeS, true),
        };
        self.wasm.instruction(&instruction);

        // Comparisons leave an i32
        if compares {
            self.wasm.instruction(&Instruction::I64ExtendI32U);
        }
    }

    fn finish_call(&mut self, dest: Option<ValueId>, returns: bool) {
        match (dest, returns) {
            (Some(dest), true) => self.set(dest),
            (None, true) => {
                self.wasm.instruction(&Instruction::Drop);
            }
            _ => {}
        }
    }

    /// ```text
    /// block
    ///   (closure.fn == k) if  [closure.ctx] args  call k  br 1  end
    ///   ...
    ///   unreachable
    /// end
    /// ```
    fn encode_closure_call(
        &mut self,
        dest: Option<ValueId>,
        closure: ValueId,
        args: &[ValueId],
        signature: &ClosureSignature,
    ) {
        let module = self.module;
        let candidates: Vec<&LirFunction> = self
            .closure_targets
            .iter()
            .filter_map(|id| module.function(*id))
            .filter(|target| target.params == signature.params && target.ret == signature.ret)
            .collect();

        codegen_log!(
            "Closure call in ", Bright {self.function.name.as_str()}, " dispatches over ",
            Green #candidates.len(), " targets"
        );

        self.wasm.instruction(&Instruction::Block(BlockType::Empty));
        for target in candidates {
            self.get(closure);
            self.wasm
                .instruction(&Instruction::I32Load(i32_mem(CLOSURE_FUNCTION_OFFSET)));
            self.wasm.instruction(&Instruction::I32Const(target.id.0 as i32));
            self.wasm.instruction(&Instruction::I32Eq);
            self.wasm.instruction(&Instruction::If(BlockType::Empty));

            if target.has_context {
                self.get(closure);
                self.wasm
                    .instruction(&Instruction::I32Load(i32_mem(CLOSURE_CONTEXT_OFFSET)));
            }
            for arg in args {
                self.get(*arg);
            }
            self.wasm.instruction(&Instruction::Call(wasm_index(target.id)));
            self.finish_call(dest, target.ret.is_some());
            self.wasm.instruction(&Instruction::Br(1));

            self.wasm.instruction(&Instruction::End);
        }
        self.wasm.instruction(&Instruction::Unreachable);
        self.wasm.instruction(&Instruction::End);
    }

    fn error(&self, msg: &str) -> CompilerError {
        CompilerError::wasm_generation(format!("'{}' {}", self.function.name, msg))
            .with_declaration(self.function.decl)
            .with_declaration_path(self.function.name.clone())
    }
}

fn allocates_on_stack(body: &[LirInst]) -> bool {
    let mut found = false;
    walk_instructions(body, &mut |inst| {
        if let LirInst::Alloc {
            kind: AllocKind::Stack,
            ..
        } = inst
        {
            found = true;
        }
    });
    found
}
