//! Expression Lowering
//!
//! Cross-scope reads, calls of nested functions, constructions and function values all
//! go through the nested context: the resolver finds variables, the threader supplies
//! hidden context arguments and the materializer builds instances.

use crate::backends::lir::context::LoweringContext;
use crate::backends::lir::emitter::{InstructionEmitter, LirFunctionBuilder};
use crate::backends::lir::lir_nodes::{LirBinOp, LirType, LirUnaryOp, ValueId};
use crate::backends::nested_context::resolver::VariableAddress;
use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError;
use crate::compiler_frontend::declarations::decl_nodes::{BinOp, DeclId, Expr, UnaryOp, VarId};

impl LoweringContext<'_> {
    /// Lowers an expression that must produce a value.
    pub fn lower_value(
        &mut self,
        builder: &mut LirFunctionBuilder,
        expr: &Expr,
    ) -> Result<ValueId, CompilerError> {
        match self.lower_expr(builder, expr)? {
            Some(value) => Ok(value),
            None => Err(self.lowering_error("A Unit expression was used as a value")),
        }
    }

    /// Lowers an expression. Calls of Unit functions produce no value.
    pub fn lower_expr(
        &mut self,
        builder: &mut LirFunctionBuilder,
        expr: &Expr,
    ) -> Result<Option<ValueId>, CompilerError> {
        let tree = self.nested.tree;

        let value = match expr {
            Expr::Int(value) => builder.const_int(*value),
            Expr::Bool(value) => builder.const_int(*value as i64),
            Expr::Var(var) => self.read_variable(builder, *var)?,

            Expr::Binary { op, lhs, rhs } => match op {
                BinOp::And => self.lower_short_circuit(builder, lhs, rhs, true)?,
                BinOp::Or => self.lower_short_circuit(builder, lhs, rhs, false)?,
                _ => {
                    let lhs = self.lower_value(builder, lhs)?;
                    let rhs = self.lower_value(builder, rhs)?;
                    builder.binary(lower_bin_op(*op)?, lhs, rhs)
                }
            },

            Expr::Unary { op, operand } => {
                let operand = self.lower_value(builder, operand)?;
                let op = match op {
                    UnaryOp::Neg => LirUnaryOp::Neg,
                    UnaryOp::Not => LirUnaryOp::Eqz,
                };
                builder.unary(op, operand)
            }

            Expr::Call { function, args } => {
                let context = self.function_context()?;
                let mut lowered = Vec::with_capacity(args.len() + 1);
                if let Some(hidden) = self.nested.call_context(builder, &context, *function)? {
                    lowered.push(hidden);
                }
                for arg in args {
                    lowered.push(self.lower_value(builder, arg)?);
                }
                return self.emit_call(builder, *function, lowered);
            }

            Expr::MethodCall {
                receiver,
                method,
                args,
            } => {
                let mut lowered = Vec::with_capacity(args.len() + 1);
                lowered.push(self.lower_value(builder, receiver)?);
                for arg in args {
                    lowered.push(self.lower_value(builder, arg)?);
                }
                return self.emit_call(builder, *method, lowered);
            }

            Expr::New { aggregate, args } => {
                let mut fields = Vec::with_capacity(args.len());
                for arg in args {
                    fields.push(self.lower_value(builder, arg)?);
                }
                let context = self.function_context()?;
                let outer = self
                    .nested
                    .construction_context(builder, &context, *aggregate)?;
                self.nested
                    .materialize_instance(builder, *aggregate, outer, &fields)?
            }

            Expr::FieldGet { base, field } => {
                let base = self.lower_value(builder, base)?;
                let (addr, ty) = self.field_address(builder, base, *field)?;
                builder.load(addr, ty)
            }

            Expr::This { aggregate } => {
                let context = self.function_context()?;
                self.nested
                    .emit_context_pointer(builder, &context, *aggregate)?
            }

            Expr::FunctionRef(function) => {
                let context = self.function_context()?;
                let closure_context = self.nested.closure_context(builder, &context, *function)?;
                let target = self.function_index(*function)?;
                builder.make_closure(target, closure_context)
            }

            Expr::CallValue { callee, args } => {
                let signature = Self::closure_signature(&tree.expr_type(callee)?)?;
                let closure = self.lower_value(builder, callee)?;
                let mut lowered = Vec::with_capacity(args.len());
                for arg in args {
                    lowered.push(self.lower_value(builder, arg)?);
                }
                return Ok(builder.call_closure(closure, lowered, signature));
            }
        };

        Ok(Some(value))
    }

    fn emit_call(
        &mut self,
        builder: &mut LirFunctionBuilder,
        function: DeclId,
        args: Vec<ValueId>,
    ) -> Result<Option<ValueId>, CompilerError> {
        let target = self.function_index(function)?;
        let ret = Self::return_type(&self.nested.tree.function(function)?.return_type)?;
        Ok(builder.call(target, args, ret))
    }

    /// `a and b` only evaluates `b` when `a` holds, `a or b` only when it does not.
    fn lower_short_circuit(
        &mut self,
        builder: &mut LirFunctionBuilder,
        lhs: &Expr,
        rhs: &Expr,
        is_and: bool,
    ) -> Result<ValueId, CompilerError> {
        let result = builder.add_local(LirType::I64);
        let condition = self.lower_value(builder, lhs)?;

        builder.begin_block();
        if is_and {
            let rhs = self.lower_value(builder, rhs)?;
            builder.local_set(result, rhs);
        } else {
            let one = builder.const_int(1);
            builder.local_set(result, one);
        }
        let then_body = builder.end_block()?;

        builder.begin_block();
        if is_and {
            let zero = builder.const_int(0);
            builder.local_set(result, zero);
        } else {
            let rhs = self.lower_value(builder, rhs)?;
            builder.local_set(result, rhs);
        }
        let else_body = builder.end_block()?;

        builder.emit_if(condition, then_body, else_body);
        builder.local_get(result)
    }

    pub fn read_variable(
        &mut self,
        builder: &mut LirFunctionBuilder,
        var: VarId,
    ) -> Result<ValueId, CompilerError> {
        let context = self.function_context()?;
        match self.nested.emit_variable_address(builder, &context, var)? {
            VariableAddress::Local(var) => {
                let local = self.local_of(var)?;
                builder.local_get(local)
            }
            VariableAddress::Slot { addr, ty } => Ok(builder.load(addr, ty)),
        }
    }

    pub fn write_variable(
        &mut self,
        builder: &mut LirFunctionBuilder,
        var: VarId,
        value: ValueId,
    ) -> Result<(), CompilerError> {
        let context = self.function_context()?;
        match self.nested.emit_variable_address(builder, &context, var)? {
            VariableAddress::Local(var) => {
                let local = self.local_of(var)?;
                builder.local_set(local, value);
            }
            VariableAddress::Slot { addr, ty } => builder.store(addr, value, ty),
        }
        Ok(())
    }

    /// Address and slot type of a field of an explicit instance.
    pub fn field_address(
        &mut self,
        builder: &mut LirFunctionBuilder,
        base: ValueId,
        field: VarId,
    ) -> Result<(ValueId, LirType), CompilerError> {
        let var = self.nested.tree.variable(field)?;
        let layout = self.nested.layouts.require(var.owner)?;
        let Some(slot) = layout.slot_of(field) else {
            return Err(self.lowering_error(format!(
                "Field '{}' has no slot in {}",
                var.name, layout.name
            )));
        };
        let ty = layout.slots[slot as usize].ty;
        Ok((builder.field_addr(base, layout.type_id, slot), ty))
    }
}

fn lower_bin_op(op: BinOp) -> Result<LirBinOp, CompilerError> {
    let op = match op {
        BinOp::Add => LirBinOp::Add,
        BinOp::Sub => LirBinOp::Sub,
        BinOp::Mul => LirBinOp::Mul,
        BinOp::Div => LirBinOp::Div,
        BinOp::Rem => LirBinOp::Rem,
        BinOp::Eq => LirBinOp::Eq,
        BinOp::Ne => LirBinOp::Ne,
        BinOp::Lt => LirBinOp::Lt,
        BinOp::Le => LirBinOp::Le,
        BinOp::Gt => LirBinOp::Gt,
        BinOp::Ge => LirBinOp::Ge,
        BinOp::And | BinOp::Or => {
            return Err(CompilerError::compiler_error(
                "Logical operators are lowered as control flow",
            ));
        }
    };
    Ok(op)
}
