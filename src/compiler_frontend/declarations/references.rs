//! Symbol references made by a function body.
//!
//! Capture analysis only needs two facts about a body: which variables it names
//! and which enclosing declarations it needs a context pointer for.

use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError;
use crate::compiler_frontend::declarations::decl_nodes::{
    DeclId, DeclTree, Expr, Place, Stmt, VarId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolReference {
    /// A local, parameter or implicit-`this` field named directly
    Variable(VarId),

    /// The body needs the context pointer of this declaration:
    /// the parent of a nested callee or nested aggregate, or the aggregate behind `This`
    Context(DeclId),
}

/// References in body order. Duplicates are kept; analysis is idempotent over them.
pub fn collect_references(
    tree: &DeclTree,
    function: DeclId,
) -> Result<Vec<SymbolReference>, CompilerError> {
    let body = &tree.function(function)?.body;
    let mut collector = ReferenceCollector {
        tree,
        references: Vec::new(),
    };

    for stmt in body {
        collector.stmt(stmt);
    }

    Ok(collector.references)
}

struct ReferenceCollector<'a> {
    tree: &'a DeclTree,
    references: Vec<SymbolReference>,
}

impl ReferenceCollector<'_> {
    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let { var, value } => {
                self.expr(value);
                self.references.push(SymbolReference::Variable(*var));
            }
            Stmt::Assign { target, value } => {
                match target {
                    Place::Var(var) => self.references.push(SymbolReference::Variable(*var)),
                    Place::Field { base, .. } => self.expr(base),
                }
                self.expr(value);
            }
            Stmt::Expr(expr) => self.expr(expr),
            Stmt::If {
                condition,
                then_block,
                else_block,
            } => {
                self.expr(condition);
                then_block.iter().for_each(|s| self.stmt(s));
                else_block.iter().for_each(|s| self.stmt(s));
            }
            Stmt::While { condition, body } => {
                self.expr(condition);
                body.iter().for_each(|s| self.stmt(s));
            }
            Stmt::Return(value) => {
                if let Some(value) = value {
                    self.expr(value);
                }
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Int(_) | Expr::Bool(_) => {}
            Expr::Var(var) => self.references.push(SymbolReference::Variable(*var)),
            Expr::Binary { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            Expr::Unary { operand, .. } => self.expr(operand),
            Expr::Call { function, args } => {
                self.nested_parent(*function);
                args.iter().for_each(|a| self.expr(a));
            }

            // The receiver supplies the context, nothing enclosing is needed
            Expr::MethodCall { receiver, args, .. } => {
                self.expr(receiver);
                args.iter().for_each(|a| self.expr(a));
            }
            Expr::New { aggregate, args } => {
                self.nested_parent(*aggregate);
                args.iter().for_each(|a| self.expr(a));
            }
            Expr::FieldGet { base, .. } => self.expr(base),
            Expr::This { aggregate } => self.references.push(SymbolReference::Context(*aggregate)),
            Expr::FunctionRef(function) => self.nested_parent(*function),
            Expr::CallValue { callee, args } => {
                self.expr(callee);
                args.iter().for_each(|a| self.expr(a));
            }
        }
    }

    fn nested_parent(&mut self, decl: DeclId) {
        if let Some(parent) = self.tree.parent(decl) {
            self.references.push(SymbolReference::Context(parent));
        }
    }
}
