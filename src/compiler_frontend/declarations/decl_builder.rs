//! Incremental construction of a `DeclTree`.
//!
//! The builder keeps ids dense and parent/child lists in sync. Misuse (a parameter on an
//! aggregate, a body on an aggregate) is recorded and reported by `finish`, together with
//! anything `DeclTree::validate` rejects.

use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError;
use crate::compiler_frontend::declarations::decl_nodes::{
    AggregateDecl, AggregateKind, DeclId, DeclKind, DeclTree, Declaration, FunctionDecl, Stmt,
    ValueType, VarId, VarKind, Variable,
};

#[derive(Debug, Default)]
pub struct DeclTreeBuilder {
    tree: DeclTree,
    errors: Vec<CompilerError>,
}

impl DeclTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A free function when `parent` is None, a nested function inside a function,
    /// or a method when `parent` is an aggregate.
    pub fn function(
        &mut self,
        name: &str,
        parent: Option<DeclId>,
        return_type: ValueType,
    ) -> DeclId {
        self.push_decl(
            name,
            parent,
            DeclKind::Function(FunctionDecl {
                params: Vec::new(),
                return_type,
                body: Vec::new(),
            }),
        )
    }

    pub fn method(&mut self, name: &str, aggregate: DeclId, return_type: ValueType) -> DeclId {
        if !self.tree.is_aggregate(aggregate) {
            self.errors.push(CompilerError::program_error(format!(
                "Method '{}' must be declared inside an aggregate",
                name
            )));
        }
        self.function(name, Some(aggregate), return_type)
    }

    pub fn aggregate(
        &mut self,
        name: &str,
        parent: Option<DeclId>,
        aggregate_kind: AggregateKind,
    ) -> DeclId {
        self.push_decl(
            name,
            parent,
            DeclKind::Aggregate(AggregateDecl {
                aggregate_kind,
                fields: Vec::new(),
            }),
        )
    }

    pub fn param(&mut self, function: DeclId, name: &str, ty: ValueType) -> VarId {
        let id = self.push_var(function, name, ty, VarKind::Param);

        let has_locals = self.tree.get_decl(function).is_some_and(|decl| {
            decl.locals
                .iter()
                .any(|var| self.tree.variables[var.0 as usize].kind == VarKind::Local)
        });
        if has_locals {
            self.errors.push(CompilerError::program_error(format!(
                "Parameter '{}' declared after a local of '{}'",
                name,
                self.tree.qualified_name(function)
            )));
        }

        match self.tree.declarations.get_mut(function.0 as usize) {
            Some(Declaration {
                kind: DeclKind::Function(decl),
                ..
            }) => decl.params.push(id),
            _ => self.errors.push(CompilerError::program_error(format!(
                "Parameter '{}' must belong to a function, not {}",
                name, function
            ))),
        }

        id
    }

    pub fn local(&mut self, function: DeclId, name: &str, ty: ValueType) -> VarId {
        if !self.tree.is_function(function) {
            self.errors.push(CompilerError::program_error(format!(
                "Local '{}' must belong to a function, not {}",
                name, function
            )));
        }
        self.push_var(function, name, ty, VarKind::Local)
    }

    pub fn field(&mut self, aggregate: DeclId, name: &str, ty: ValueType) -> VarId {
        let id = self.push_var(aggregate, name, ty, VarKind::Field);

        match self.tree.declarations.get_mut(aggregate.0 as usize) {
            Some(Declaration {
                kind: DeclKind::Aggregate(decl),
                ..
            }) => decl.fields.push(id),
            _ => self.errors.push(CompilerError::program_error(format!(
                "Field '{}' must belong to an aggregate, not {}",
                name, aggregate
            ))),
        }

        id
    }

    pub fn set_body(&mut self, function: DeclId, body: Vec<Stmt>) {
        match self.tree.declarations.get_mut(function.0 as usize) {
            Some(Declaration {
                kind: DeclKind::Function(decl),
                ..
            }) => decl.body = body,
            _ => self.errors.push(CompilerError::program_error(format!(
                "Only functions have bodies, {} is not one",
                function
            ))),
        }
    }

    /// Read access while the tree is still being built
    pub fn tree(&self) -> &DeclTree {
        &self.tree
    }

    pub fn finish(self) -> Result<DeclTree, CompilerError> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }

        self.tree.validate()?;
        Ok(self.tree)
    }

    fn push_decl(&mut self, name: &str, parent: Option<DeclId>, kind: DeclKind) -> DeclId {
        let id = DeclId(self.tree.declarations.len() as u32);

        if let Some(parent_id) = parent {
            match self.tree.declarations.get_mut(parent_id.0 as usize) {
                Some(parent_decl) => parent_decl.children.push(id),
                None => self.errors.push(CompilerError::program_error(format!(
                    "'{}' is nested in unknown {}",
                    name, parent_id
                ))),
            }
        }

        self.tree.declarations.push(Declaration {
            id,
            name: name.to_owned(),
            parent,
            locals: Vec::new(),
            children: Vec::new(),
            kind,
        });

        id
    }

    fn push_var(&mut self, owner: DeclId, name: &str, ty: ValueType, kind: VarKind) -> VarId {
        let id = VarId(self.tree.variables.len() as u32);

        match self.tree.declarations.get_mut(owner.0 as usize) {
            Some(decl) => decl.locals.push(id),
            None => self.errors.push(CompilerError::program_error(format!(
                "'{}' is declared by unknown {}",
                name, owner
            ))),
        }

        self.tree.variables.push(Variable {
            id,
            name: name.to_owned(),
            ty,
            owner,
            kind,
        });

        id
    }
}
