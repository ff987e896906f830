//! Indented dump of the nesting tree, used by `thicket layouts` and in test failures.

use crate::compiler_frontend::declarations::decl_nodes::{DeclId, DeclKind, DeclTree, VarKind};
use std::fmt::{Display, Formatter, Result as FmtResult};

impl Display for DeclTree {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for root in self.roots() {
            self.fmt_decl(f, root, 0)?;
        }
        Ok(())
    }
}

impl DeclTree {
    fn fmt_decl(&self, f: &mut Formatter<'_>, id: DeclId, depth: usize) -> FmtResult {
        let Some(decl) = self.get_decl(id) else {
            return writeln!(f, "{}<missing {}>", "  ".repeat(depth), id);
        };

        let indent = "  ".repeat(depth);
        match &decl.kind {
            DeclKind::Function(function) => {
                writeln!(f, "{indent}fn {} -> {}  [{}]", decl.name, function.return_type, id)?
            }
            DeclKind::Aggregate(aggregate) => writeln!(
                f,
                "{indent}{:?} {}  [{}]",
                aggregate.aggregate_kind, decl.name, id
            )?,
        }

        for var_id in &decl.locals {
            let Some(var) = self.variables.get(var_id.0 as usize) else {
                continue;
            };
            let kind = match var.kind {
                VarKind::Param => "param",
                VarKind::Local => "let",
                VarKind::Field => "field",
            };
            writeln!(f, "{indent}  {kind} {}: {}", var.name, var.ty)?;
        }

        for child in &decl.children {
            self.fmt_decl(f, *child, depth + 1)?;
        }

        Ok(())
    }
}
