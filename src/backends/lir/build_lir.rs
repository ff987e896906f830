//! Main Lowering Entry Point
//!
//! Turns a declaration tree, together with its nested-context side tables,
//! into a complete LIR module.

use crate::backends::lir::context::LoweringContext;
use crate::backends::lir::lir_nodes::LirModule;
use crate::backends::nested_context::NestedContext;
use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerMessages;

/// Lowers every function of the unit, methods included.
///
/// First pass registers all functions so calls can name callees declared later.
/// Second pass lowers bodies, collecting errors instead of stopping at the first one.
pub fn lower_to_lir(nested: &NestedContext<'_>) -> Result<LirModule, CompilerMessages> {
    let tree = nested.tree;
    let mut ctx = LoweringContext::new(nested);
    let order = tree.preorder();

    // First pass: register all functions
    for decl in &order {
        if tree.is_function(*decl) {
            ctx.register_function(*decl);
        }
    }

    // Second pass: lower all bodies
    let mut functions = Vec::with_capacity(ctx.function_indices.len());
    let mut errors = Vec::new();
    for decl in &order {
        if !tree.is_function(*decl) {
            continue;
        }
        match ctx.lower_function_def(*decl) {
            Ok(function) => functions.push(function),
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(LirModule {
            structs: nested.layouts.struct_types(),
            functions,
        })
    } else {
        Err(CompilerMessages { errors })
    }
}
