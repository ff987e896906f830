//! LIR Interpreter
//!
//! Executes lowered modules directly so generated context chains can be checked end to end
//! without a Wasm runtime. Stack frames are released when their activation returns and
//! any later access is reported as a dangling frame. A step budget bounds every run.
//!
//! Activations live on an explicit stack and every activation keeps its own stack of open
//! blocks, so guest recursion never recurses in Rust and the call depth limit is an ordinary
//! `Runtime` error.

use crate::backends::lir::lir_nodes::{
    AllocKind, LirBinOp, LirFunction, LirFunctionId, LirInst, LirModule, LirType, LirUnaryOp,
    ValueId,
};
use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError;
use crate::runtime::object_store::{ObjectId, ObjectStore, StoreStats, Value};

pub const DEFAULT_MAX_STEPS: u64 = 10_000_000;
pub const MAX_CALL_DEPTH: usize = 10_000;

pub struct Interpreter<'a> {
    module: &'a LirModule,
    store: ObjectStore,
    steps: u64,
    max_steps: u64,
}

struct Activation<'a> {
    function: &'a LirFunction,
    values: Vec<Option<Value>>,
    locals: Vec<Option<Value>>,
    stack_objects: Vec<ObjectId>,
    blocks: Vec<Block<'a>>,

    /// Where the caller keeps the returned value
    result_dest: Option<ValueId>,
}

struct Block<'a> {
    body: &'a [LirInst],
    next: usize,
    kind: BlockKind<'a>,
}

#[derive(Clone, Copy)]
struct LoopParts<'a> {
    header: &'a [LirInst],
    condition: ValueId,
    body: &'a [LirInst],
}

#[derive(Clone, Copy)]
enum BlockKind<'a> {
    Straight,
    LoopHeader(LoopParts<'a>),
    LoopBody(LoopParts<'a>),
}

impl<'a> Block<'a> {
    fn new(body: &'a [LirInst], kind: BlockKind<'a>) -> Self {
        Block { body, next: 0, kind }
    }
}

enum Step {
    Next,
    Call {
        function: LirFunctionId,
        args: Vec<Value>,
        dest: Option<ValueId>,
    },
    Return(Option<Value>),
}

impl<'a> Interpreter<'a> {
    pub fn new(module: &'a LirModule, max_steps: u64) -> Self {
        Interpreter {
            module,
            store: ObjectStore::default(),
            steps: 0,
            max_steps,
        }
    }

    /// Calls a top-level function with integer arguments.
    pub fn call_by_name(&mut self, name: &str, args: &[i64]) -> Result<Option<Value>, CompilerError> {
        let Some(function) = self.module.find_function(name) else {
            return Err(CompilerError::runtime_error(format!(
                "No function named '{name}' in the module"
            )));
        };

        if function.has_context {
            return Err(CompilerError::runtime_error(format!(
                "'{name}' is nested and needs a context, only top-level functions can be entry points"
            )));
        }

        if function.params.len() != args.len()
            || function.params.iter().any(|ty| *ty != LirType::I64)
        {
            return Err(CompilerError::runtime_error(format!(
                "'{}' takes {} parameters, entry points can only be given integers",
                name,
                function.params.len()
            )));
        }

        let args = args.iter().map(|value| Value::Int(*value)).collect();
        self.call(function.id, args)
    }

    pub fn call(
        &mut self,
        function_id: LirFunctionId,
        args: Vec<Value>,
    ) -> Result<Option<Value>, CompilerError> {
        let mut stack = vec![self.activate(function_id, args, None)?];
        let result = self.run(&mut stack);

        // Only left over when the run failed
        while let Some(activation) = stack.pop() {
            self.release(activation);
        }

        result
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn activate(
        &self,
        function_id: LirFunctionId,
        args: Vec<Value>,
        result_dest: Option<ValueId>,
    ) -> Result<Activation<'a>, CompilerError> {
        let module = self.module;
        let Some(function) = module.function(function_id) else {
            return Err(CompilerError::runtime_error(format!(
                "Call of unknown function {function_id}"
            )));
        };

        let expected = function.params.len() + function.has_context as usize;
        if args.len() != expected {
            return Err(CompilerError::runtime_error(format!(
                "'{}' expects {} arguments but got {}",
                function.name,
                expected,
                args.len()
            )));
        }

        let mut activation = Activation {
            function,
            values: vec![None; function.value_types.len()],
            locals: vec![None; function.locals.len()],
            stack_objects: Vec::new(),
            blocks: vec![Block::new(&function.body, BlockKind::Straight)],
            result_dest,
        };
        for (index, arg) in args.into_iter().enumerate() {
            activation.locals[index] = Some(arg);
        }

        Ok(activation)
    }

    fn release(&mut self, activation: Activation<'a>) {
        for object in activation.stack_objects {
            self.store.release(object);
        }
    }

    fn run(&mut self, stack: &mut Vec<Activation<'a>>) -> Result<Option<Value>, CompilerError> {
        loop {
            let Some(activation) = stack.last_mut() else {
                return Err(CompilerError::runtime_error("Returned past the entry point"));
            };

            let Some((body, index)) = activation.blocks.last().map(|block| (block.body, block.next))
            else {
                return Err(CompilerError::runtime_error(format!(
                    "'{}' ran off the end of its body",
                    activation.function.name
                )));
            };

            let Some(inst) = body.get(index) else {
                close_block(activation)?;
                continue;
            };
            if let Some(block) = activation.blocks.last_mut() {
                block.next += 1;
            }

            match self.step(activation, inst)? {
                Step::Next => {}

                Step::Call {
                    function,
                    args,
                    dest,
                } => {
                    if stack.len() >= MAX_CALL_DEPTH {
                        let caller = stack.last().map_or("", |caller| caller.function.name.as_str());
                        return Err(CompilerError::runtime_error(format!(
                            "Call depth exceeded {MAX_CALL_DEPTH} in '{caller}'"
                        )));
                    }
                    let callee = self.activate(function, args, dest)?;
                    stack.push(callee);
                }

                Step::Return(value) => {
                    let Some(finished) = stack.pop() else {
                        return Err(CompilerError::runtime_error("Returned past the entry point"));
                    };
                    let dest = finished.result_dest;
                    self.release(finished);

                    match stack.last_mut() {
                        None => return Ok(value),
                        Some(caller) => {
                            if let (Some(dest), Some(value)) = (dest, value) {
                                set(caller, dest, value);
                            }
                        }
                    }
                }
            }
        }
    }

    fn step(&mut self, activation: &mut Activation<'a>, inst: &'a LirInst) -> Result<Step, CompilerError> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(CompilerError::runtime_error(format!(
                "Step budget of {} exhausted in '{}'",
                self.max_steps, activation.function.name
            )));
        }

        let function = activation.function;
        match inst {
            LirInst::Const { dest, value } => set(activation, *dest, Value::Int(*value)),
            LirInst::NullPtr { dest } => set(activation, *dest, Value::Null),

            LirInst::Binary { dest, op, lhs, rhs } => {
                let lhs = get(activation, *lhs)?.as_int()?;
                let rhs = get(activation, *rhs)?.as_int()?;
                let result = eval_binary(*op, lhs, rhs)?;
                set(activation, *dest, Value::Int(result));
            }

            LirInst::Unary { dest, op, operand } => {
                let operand = get(activation, *operand)?.as_int()?;
                let result = match op {
                    LirUnaryOp::Neg => operand.wrapping_neg(),
                    LirUnaryOp::Eqz => (operand == 0) as i64,
                };
                set(activation, *dest, Value::Int(result));
            }

            LirInst::LocalGet { dest, local } => {
                let Some(Some(value)) = activation.locals.get(local.0 as usize).copied() else {
                    return Err(CompilerError::runtime_error(format!(
                        "Read of unset local {} in '{}'",
                        local, function.name
                    )));
                };
                set(activation, *dest, value);
            }

            LirInst::LocalSet { local, value } => {
                let value = get(activation, *value)?;
                match activation.locals.get_mut(local.0 as usize) {
                    Some(slot) => *slot = Some(value),
                    None => {
                        return Err(CompilerError::runtime_error(format!(
                            "Write to undeclared local {} in '{}'",
                            local, function.name
                        )));
                    }
                }
            }

            LirInst::Alloc {
                dest,
                struct_type,
                kind,
            } => {
                let Some(layout) = self.module.struct_type(*struct_type) else {
                    return Err(CompilerError::runtime_error(format!(
                        "Allocation of unknown struct {struct_type}"
                    )));
                };
                let object = self.store.allocate(*struct_type, *kind, layout.slots.len());
                if *kind == AllocKind::Stack {
                    activation.stack_objects.push(object);
                }
                set(activation, *dest, Value::Object(object));
            }

            LirInst::FieldAddr {
                dest,
                base,
                struct_type,
                slot,
            } => {
                let object = match get(activation, *base)? {
                    Value::Object(object) => object,
                    Value::Null => {
                        return Err(CompilerError::runtime_error(format!(
                            "Null context dereferenced in '{}'",
                            function.name
                        )));
                    }
                    other => {
                        return Err(CompilerError::runtime_error(format!(
                            "Field address of non-object {other} in '{}'",
                            function.name
                        )));
                    }
                };

                let actual = self.store.get(object)?.struct_type;
                if actual != *struct_type {
                    return Err(CompilerError::runtime_error(format!(
                        "object#{} is a {} but was addressed as a {}",
                        object.0, actual, struct_type
                    )));
                }
                set(activation, *dest, Value::SlotAddr { object, slot: *slot });
            }

            LirInst::Load { dest, addr, .. } => {
                let (object, slot) = slot_addr(get(activation, *addr)?)?;
                let value = self.store.read_slot(object, slot)?;
                set(activation, *dest, value);
            }

            LirInst::Store { addr, value, .. } => {
                let (object, slot) = slot_addr(get(activation, *addr)?)?;
                let value = get(activation, *value)?;
                self.store.write_slot(object, slot, value)?;
            }

            LirInst::Call {
                dest,
                function: callee,
                args,
            } => {
                let args = args
                    .iter()
                    .map(|arg| get(activation, *arg))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(Step::Call {
                    function: *callee,
                    args,
                    dest: *dest,
                });
            }

            LirInst::MakeClosure {
                dest,
                function: target,
                context,
            } => {
                let context = match get(activation, *context)? {
                    Value::Null => None,
                    Value::Object(object) => Some(object),
                    other => {
                        return Err(CompilerError::runtime_error(format!(
                            "Closure context must be a pointer, found {other}"
                        )));
                    }
                };
                set(
                    activation,
                    *dest,
                    Value::Closure {
                        function: *target,
                        context,
                    },
                );
            }

            LirInst::CallClosure {
                dest,
                closure,
                args,
                ..
            } => {
                let Value::Closure {
                    function: target,
                    context,
                } = get(activation, *closure)?
                else {
                    return Err(CompilerError::runtime_error(
                        "Called a value that is not a closure",
                    ));
                };

                let takes_context = self
                    .module
                    .function(target)
                    .is_some_and(|target| target.has_context);

                let mut call_args = Vec::with_capacity(args.len() + 1);
                if takes_context {
                    call_args.push(context.map_or(Value::Null, Value::Object));
                }
                for arg in args {
                    call_args.push(get(activation, *arg)?);
                }

                return Ok(Step::Call {
                    function: target,
                    args: call_args,
                    dest: *dest,
                });
            }

            LirInst::If {
                condition,
                then_body,
                else_body,
            } => {
                let body = if get(activation, *condition)?.as_int()? != 0 {
                    then_body
                } else {
                    else_body
                };
                activation.blocks.push(Block::new(body, BlockKind::Straight));
            }

            LirInst::Loop {
                header,
                condition,
                body,
            } => {
                let parts = LoopParts {
                    header,
                    condition: *condition,
                    body,
                };
                activation
                    .blocks
                    .push(Block::new(header, BlockKind::LoopHeader(parts)));
            }

            LirInst::Return { value } => {
                let value = match value {
                    Some(value) => Some(get(activation, *value)?),
                    None => None,
                };
                return Ok(Step::Return(value));
            }

            LirInst::Unreachable => {
                return Err(CompilerError::runtime_error(format!(
                    "'{}' reached the end of its body without returning a value",
                    function.name
                )));
            }
        }

        Ok(Step::Next)
    }
}

/// Pops a finished block. A finished loop header checks the condition, a finished loop
/// body goes back to the header.
fn close_block(activation: &mut Activation<'_>) -> Result<(), CompilerError> {
    let Some(block) = activation.blocks.pop() else {
        return Ok(());
    };

    match block.kind {
        BlockKind::Straight => {}
        BlockKind::LoopHeader(parts) => {
            if get(activation, parts.condition)?.as_int()? != 0 {
                activation
                    .blocks
                    .push(Block::new(parts.body, BlockKind::LoopBody(parts)));
            }
        }
        BlockKind::LoopBody(parts) => {
            activation
                .blocks
                .push(Block::new(parts.header, BlockKind::LoopHeader(parts)));
        }
    }
    Ok(())
}

fn get(activation: &Activation<'_>, value: ValueId) -> Result<Value, CompilerError> {
    match activation.values.get(value.0 as usize) {
        Some(Some(value)) => Ok(*value),
        _ => Err(CompilerError::runtime_error(format!(
            "Use of undefined value {value}"
        ))),
    }
}

fn set(activation: &mut Activation<'_>, dest: ValueId, value: Value) {
    if let Some(slot) = activation.values.get_mut(dest.0 as usize) {
        *slot = Some(value);
    }
}

fn slot_addr(value: Value) -> Result<(ObjectId, u32), CompilerError> {
    match value {
        Value::SlotAddr { object, slot } => Ok((object, slot)),
        other => Err(CompilerError::runtime_error(format!(
            "Expected a slot address, found {other}"
        ))),
    }
}

fn eval_binary(op: LirBinOp, lhs: i64, rhs: i64) -> Result<i64, CompilerError> {
    let result = match op {
        LirBinOp::Add => lhs.wrapping_add(rhs),
        LirBinOp::Sub => lhs.wrapping_sub(rhs),
        LirBinOp::Mul => lhs.wrapping_mul(rhs),
        LirBinOp::Div | LirBinOp::Rem if rhs == 0 => {
            return Err(CompilerError::runtime_error("Division by zero"));
        }
        LirBinOp::Div => lhs.wrapping_div(rhs),
        LirBinOp::Rem => lhs.wrapping_rem(rhs),
        LirBinOp::Eq => (lhs == rhs) as i64,
        LirBinOp::Ne => (lhs != rhs) as i64,
        LirBinOp::Lt => (lhs < rhs) as i64,
        LirBinOp::Le => (lhs <= rhs) as i64,
        LirBinOp::Gt => (lhs > rhs) as i64,
        LirBinOp::Ge => (lhs >= rhs) as i64,
    };
    Ok(result)
}
