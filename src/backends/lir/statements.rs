use crate::backends::lir::context::LoweringContext;
use crate::backends::lir::emitter::{InstructionEmitter, LirFunctionBuilder};
use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError;
use crate::compiler_frontend::declarations::decl_nodes::{Place, Stmt};

impl LoweringContext<'_> {
    pub fn lower_block(
        &mut self,
        builder: &mut LirFunctionBuilder,
        block: &[Stmt],
    ) -> Result<(), CompilerError> {
        for stmt in block {
            self.lower_stmt(builder, stmt)?;
        }
        Ok(())
    }

    pub fn lower_stmt(
        &mut self,
        builder: &mut LirFunctionBuilder,
        stmt: &Stmt,
    ) -> Result<(), CompilerError> {
        match stmt {
            // Captured locals are written straight into their frame slot
            Stmt::Let { var, value } => {
                let value = self.lower_value(builder, value)?;
                self.write_variable(builder, *var, value)
            }

            Stmt::Assign { target, value } => match target {
                Place::Var(var) => {
                    let value = self.lower_value(builder, value)?;
                    self.write_variable(builder, *var, value)
                }
                Place::Field { base, field } => {
                    let base = self.lower_value(builder, base)?;
                    let value = self.lower_value(builder, value)?;
                    let (addr, ty) = self.field_address(builder, base, *field)?;
                    builder.store(addr, value, ty);
                    Ok(())
                }
            },

            Stmt::Expr(expr) => {
                self.lower_expr(builder, expr)?;
                Ok(())
            }

            Stmt::If {
                condition,
                then_block,
                else_block,
            } => {
                let condition = self.lower_value(builder, condition)?;

                builder.begin_block();
                self.lower_block(builder, then_block)?;
                let then_body = builder.end_block()?;

                builder.begin_block();
                self.lower_block(builder, else_block)?;
                let else_body = builder.end_block()?;

                builder.emit_if(condition, then_body, else_body);
                Ok(())
            }

            Stmt::While { condition, body } => {
                builder.begin_block();
                let condition = self.lower_value(builder, condition)?;
                let header = builder.end_block()?;

                builder.begin_block();
                self.lower_block(builder, body)?;
                let body = builder.end_block()?;

                builder.emit_loop(header, condition, body);
                Ok(())
            }

            Stmt::Return(value) => {
                let value = match value {
                    Some(value) => Some(self.lower_value(builder, value)?),
                    None => None,
                };
                builder.ret(value);
                Ok(())
            }
        }
    }
}
