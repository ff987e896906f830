//! Textual LIR dump for debugging, `--show-lir` and `.lir` outputs.

use crate::backends::lir::lir_nodes::{
    AllocKind, LirBinOp, LirFunction, LirInst, LirModule, LirStructType, LirUnaryOp, ValueId,
};
use std::fmt::{Display, Formatter, Result as FmtResult, Write as _};

impl Display for LirModule {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for struct_type in &self.structs {
            writeln!(f, "{struct_type}")?;
        }
        if !self.structs.is_empty() {
            writeln!(f)?;
        }
        for function in &self.functions {
            writeln!(f, "{function}")?;
        }
        Ok(())
    }
}

impl Display for LirStructType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "struct {} {} {{", self.id, self.name)?;
        for (index, slot) in self.slots.iter().enumerate() {
            if index > 0 {
                write!(f, ",")?;
            }
            write!(f, " {slot}")?;
        }
        write!(f, " }}")
    }
}

impl Display for LirFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "fn {} {}(", self.id, self.name)?;
        let mut first = true;
        if self.has_context {
            write!(f, "ctx: ptr")?;
            first = false;
        }
        for param in &self.params {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
            first = false;
        }
        write!(f, ")")?;
        if let Some(ret) = self.ret {
            write!(f, " -> {ret}")?;
        }
        writeln!(f, " {{")?;

        let mut out = String::new();
        write_block(&mut out, &self.body, 1)?;
        f.write_str(&out)?;
        writeln!(f, "}}")
    }
}

fn write_block(out: &mut String, body: &[LirInst], depth: usize) -> FmtResult {
    for inst in body {
        write_inst(out, inst, depth)?;
    }
    Ok(())
}

fn write_inst(out: &mut String, inst: &LirInst, depth: usize) -> FmtResult {
    let indent = "    ".repeat(depth);
    match inst {
        LirInst::Const { dest, value } => writeln!(out, "{indent}{dest} = const {value}"),
        LirInst::NullPtr { dest } => writeln!(out, "{indent}{dest} = null"),
        LirInst::Binary { dest, op, lhs, rhs } => {
            writeln!(out, "{indent}{dest} = {} {lhs}, {rhs}", bin_op_name(*op))
        }
        LirInst::Unary { dest, op, operand } => {
            let name = match op {
                LirUnaryOp::Neg => "neg",
                LirUnaryOp::Eqz => "eqz",
            };
            writeln!(out, "{indent}{dest} = {name} {operand}")
        }
        LirInst::LocalGet { dest, local } => writeln!(out, "{indent}{dest} = get {local}"),
        LirInst::LocalSet { local, value } => writeln!(out, "{indent}set {local}, {value}"),
        LirInst::Alloc {
            dest,
            struct_type,
            kind,
        } => {
            let kind = match kind {
                AllocKind::Stack => "stack",
                AllocKind::Heap => "heap",
            };
            writeln!(out, "{indent}{dest} = alloc.{kind} {struct_type}")
        }
        LirInst::FieldAddr {
            dest,
            base,
            struct_type,
            slot,
        } => writeln!(out, "{indent}{dest} = addr {base}, {struct_type}.{slot}"),
        LirInst::Load { dest, addr, ty } => writeln!(out, "{indent}{dest} = load.{ty} {addr}"),
        LirInst::Store { addr, value, ty } => writeln!(out, "{indent}store.{ty} {addr}, {value}"),
        LirInst::Call {
            dest,
            function,
            args,
        } => writeln!(
            out,
            "{indent}{}call {function}({})",
            dest_prefix(*dest),
            value_list(args)
        ),
        LirInst::MakeClosure {
            dest,
            function,
            context,
        } => writeln!(out, "{indent}{dest} = closure {function}, {context}"),
        LirInst::CallClosure {
            dest,
            closure,
            args,
            ..
        } => writeln!(
            out,
            "{indent}{}call_closure {closure}({})",
            dest_prefix(*dest),
            value_list(args)
        ),
        LirInst::If {
            condition,
            then_body,
            else_body,
        } => {
            writeln!(out, "{indent}if {condition} {{")?;
            write_block(out, then_body, depth + 1)?;
            if !else_body.is_empty() {
                writeln!(out, "{indent}}} else {{")?;
                write_block(out, else_body, depth + 1)?;
            }
            writeln!(out, "{indent}}}")
        }
        LirInst::Loop {
            header,
            condition,
            body,
        } => {
            writeln!(out, "{indent}loop {{")?;
            write_block(out, header, depth + 1)?;
            writeln!(out, "{indent}    break_unless {condition}")?;
            write_block(out, body, depth + 1)?;
            writeln!(out, "{indent}}}")
        }
        LirInst::Return { value } => match value {
            Some(value) => writeln!(out, "{indent}return {value}"),
            None => writeln!(out, "{indent}return"),
        },
        LirInst::Unreachable => writeln!(out, "{indent}unreachable"),
    }
}

fn dest_prefix(dest: Option<ValueId>) -> String {
    match dest {
        Some(dest) => format!("{dest} = "),
        None => String::new(),
    }
}

fn value_list(values: &[ValueId]) -> String {
    values
        .iter()
        .map(ValueId::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn bin_op_name(op: LirBinOp) -> &'static str {
    match op {
        LirBinOp::Add => "add",
        LirBinOp::Sub => "sub",
        LirBinOp::Mul => "mul",
        LirBinOp::Div => "div",
        LirBinOp::Rem => "rem",
        LirBinOp::Eq => "eq",
        LirBinOp::Ne => "ne",
        LirBinOp::Lt => "lt",
        LirBinOp::Le => "le",
        LirBinOp::Gt => "gt",
        LirBinOp::Ge => "ge",
    }
}
