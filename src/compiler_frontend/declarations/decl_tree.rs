//! Queries and validation over the declaration tree.
//!
//! Everything downstream assumes a validated tree, so `validate` is strict about
//! id ranges, parent/child agreement and variable ownership. The typing helper
//! (`expr_type`) trusts the frontend's type check and only recovers result types.

use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError;
use crate::compiler_frontend::declarations::decl_nodes::{
    AggregateDecl, BinOp, DeclId, DeclKind, DeclTree, Declaration, Expr, FunctionDecl, Place,
    Stmt, UnaryOp, ValueType, VarId, VarKind, Variable,
};
use crate::{return_compiler_error, return_program_error};
use rustc_hash::FxHashSet;

impl DeclTree {
    pub fn get_decl(&self, id: DeclId) -> Option<&Declaration> {
        self.declarations.get(id.0 as usize)
    }

    pub fn decl(&self, id: DeclId) -> Result<&Declaration, CompilerError> {
        match self.get_decl(id) {
            Some(decl) => Ok(decl),
            None => return_compiler_error!("Declaration {} is not part of the nesting tree", id),
        }
    }

    pub fn variable(&self, id: VarId) -> Result<&Variable, CompilerError> {
        match self.variables.get(id.0 as usize) {
            Some(var) => Ok(var),
            None => return_compiler_error!("Variable {} is not part of the nesting tree", id),
        }
    }

    pub fn function(&self, id: DeclId) -> Result<&FunctionDecl, CompilerError> {
        match &self.decl(id)?.kind {
            DeclKind::Function(function) => Ok(function),
            DeclKind::Aggregate(_) => {
                return_compiler_error!("Expected '{}' to be a function", self.qualified_name(id))
            }
        }
    }

    pub fn aggregate(&self, id: DeclId) -> Result<&AggregateDecl, CompilerError> {
        match &self.decl(id)?.kind {
            DeclKind::Aggregate(aggregate) => Ok(aggregate),
            DeclKind::Function(_) => {
                return_compiler_error!("Expected '{}' to be an aggregate", self.qualified_name(id))
            }
        }
    }

    pub fn is_function(&self, id: DeclId) -> bool {
        matches!(
            self.get_decl(id).map(|decl| &decl.kind),
            Some(DeclKind::Function(_))
        )
    }

    pub fn is_aggregate(&self, id: DeclId) -> bool {
        matches!(
            self.get_decl(id).map(|decl| &decl.kind),
            Some(DeclKind::Aggregate(_))
        )
    }

    pub fn parent(&self, id: DeclId) -> Option<DeclId> {
        self.get_decl(id).and_then(|decl| decl.parent)
    }

    /// A method is a function declared directly inside an aggregate.
    /// Its hidden context argument is the receiver instance.
    pub fn is_method(&self, id: DeclId) -> bool {
        self.is_function(id)
            && self
                .parent(id)
                .is_some_and(|parent| self.is_aggregate(parent))
    }

    /// Proper ancestors, innermost first.
    pub fn ancestors(&self, id: DeclId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.parent(id),
            remaining: self.declarations.len(),
        }
    }

    pub fn is_ancestor_or_self(&self, ancestor: DeclId, id: DeclId) -> bool {
        ancestor == id || self.ancestors(id).any(|a| a == ancestor)
    }

    pub fn depth(&self, id: DeclId) -> usize {
        self.ancestors(id).count()
    }

    pub fn roots(&self) -> impl Iterator<Item = DeclId> + '_ {
        self.declarations
            .iter()
            .filter(|decl| decl.parent.is_none())
            .map(|decl| decl.id)
    }

    /// Roots in id order, children in declaration order.
    /// Every deterministic pass over the tree walks it in this order.
    pub fn preorder(&self) -> Vec<DeclId> {
        let mut order = Vec::with_capacity(self.declarations.len());
        let mut stack: Vec<DeclId> = self.roots().collect();
        stack.reverse();

        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(decl) = self.get_decl(id) {
                stack.extend(decl.children.iter().rev().copied());
            }
        }

        order
    }

    pub fn qualified_name(&self, id: DeclId) -> String {
        let Some(decl) = self.get_decl(id) else {
            return format!("<{}>", id);
        };

        let mut parts: Vec<&str> = self
            .ancestors(id)
            .filter_map(|a| self.get_decl(a).map(|d| d.name.as_str()))
            .collect();
        parts.reverse();
        parts.push(&decl.name);
        parts.join(".")
    }

    pub fn find_by_path(&self, path: &str) -> Option<DeclId> {
        self.declarations
            .iter()
            .map(|decl| decl.id)
            .find(|id| self.qualified_name(*id) == path)
    }

    pub fn variable_name(&self, id: VarId) -> String {
        match self.variables.get(id.0 as usize) {
            Some(var) => format!("{}.{}", self.qualified_name(var.owner), var.name),
            None => format!("<{}>", id),
        }
    }

    // ========================================================================
    // Typing
    // ========================================================================

    /// Recovers the result type of an already type-checked expression.
    pub fn expr_type(&self, expr: &Expr) -> Result<ValueType, CompilerError> {
        let ty = match expr {
            Expr::Int(_) => ValueType::Int,
            Expr::Bool(_) => ValueType::Bool,
            Expr::Var(var) => self.variable(*var)?.ty.clone(),
            Expr::Binary { op, .. } => {
                if op.is_comparison() || matches!(op, BinOp::And | BinOp::Or) {
                    ValueType::Bool
                } else {
                    ValueType::Int
                }
            }
            Expr::Unary { op, .. } => match op {
                UnaryOp::Neg => ValueType::Int,
                UnaryOp::Not => ValueType::Bool,
            },
            Expr::Call { function, .. } => self.function(*function)?.return_type.clone(),
            Expr::MethodCall { method, .. } => self.function(*method)?.return_type.clone(),
            Expr::New { aggregate, .. } => ValueType::Instance(*aggregate),
            Expr::FieldGet { field, .. } => self.variable(*field)?.ty.clone(),
            Expr::This { aggregate } => ValueType::Instance(*aggregate),
            Expr::FunctionRef(function) => self.function_value_type(*function)?,
            Expr::CallValue { callee, .. } => match self.expr_type(callee)? {
                ValueType::Function { ret, .. } => *ret,
                other => {
                    return_compiler_error!("Called a value of type {} as a function", other)
                }
            },
        };

        Ok(ty)
    }

    pub fn function_value_type(&self, function: DeclId) -> Result<ValueType, CompilerError> {
        let decl = self.function(function)?;
        let mut params = Vec::with_capacity(decl.params.len());
        for param in &decl.params {
            params.push(self.variable(*param)?.ty.clone());
        }

        Ok(ValueType::Function {
            params,
            ret: Box::new(decl.return_type.clone()),
        })
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Checks the structural invariants the backend relies on.
    /// Violations mean the tree handed over is malformed, not that the backend is wrong.
    pub fn validate(&self) -> Result<(), CompilerError> {
        for (index, decl) in self.declarations.iter().enumerate() {
            if decl.id.0 as usize != index {
                return_program_error!(
                    "Declaration '{}' is stored at index {} but has id {}",
                    decl.name,
                    index,
                    decl.id
                );
            }
        }

        for (index, var) in self.variables.iter().enumerate() {
            if var.id.0 as usize != index {
                return_program_error!(
                    "Variable '{}' is stored at index {} but has id {}",
                    var.name,
                    index,
                    var.id
                );
            }
            if self.get_decl(var.owner).is_none() {
                return_program_error!("Variable '{}' is owned by unknown {}", var.name, var.owner);
            }
            if var.ty.is_unit() {
                return_program_error!("Variable '{}' cannot have the Unit type", var.name);
            }
            self.validate_type(&var.ty, &var.name)?;
        }

        for decl in &self.declarations {
            self.validate_nesting(decl)?;
            self.validate_locals(decl)?;
        }

        let mut seen_vars = FxHashSet::default();
        for decl in &self.declarations {
            for var in &decl.locals {
                if !seen_vars.insert(*var) {
                    return_program_error!(
                        "Variable '{}' is declared by more than one declaration",
                        self.variable_name(*var)
                    );
                }
            }
        }
        if seen_vars.len() != self.variables.len() {
            return_program_error!("Some variables are not declared by any declaration");
        }

        for decl in &self.declarations {
            if let DeclKind::Function(function) = &decl.kind {
                self.validate_type(&function.return_type, &decl.name)?;
                self.validate_block(decl.id, &function.body)?;
            }
        }

        Ok(())
    }

    fn validate_nesting(&self, decl: &Declaration) -> Result<(), CompilerError> {
        if let Some(parent) = decl.parent {
            let Some(parent_decl) = self.get_decl(parent) else {
                return_program_error!("'{}' has unknown parent {}", decl.name, parent);
            };
            if !parent_decl.children.contains(&decl.id) {
                return_program_error!(
                    "'{}' names '{}' as its parent but is not one of its children",
                    decl.name,
                    parent_decl.name
                );
            }
        }

        for child in &decl.children {
            match self.get_decl(*child) {
                Some(child_decl) if child_decl.parent == Some(decl.id) => {}
                Some(child_decl) => {
                    return_program_error!(
                        "'{}' lists '{}' as a child, but the child has a different parent",
                        decl.name,
                        child_decl.name
                    )
                }
                None => return_program_error!("'{}' has unknown child {}", decl.name, child),
            }
        }

        // Walk up at most once per declaration to reject parent cycles
        let mut steps = 0;
        let mut current = decl.parent;
        while let Some(id) = current {
            steps += 1;
            if steps > self.declarations.len() {
                return_program_error!("'{}' is part of a nesting cycle", decl.name);
            }
            current = self.get_decl(id).and_then(|d| d.parent);
        }

        Ok(())
    }

    fn validate_locals(&self, decl: &Declaration) -> Result<(), CompilerError> {
        for var_id in &decl.locals {
            let Some(var) = self.variables.get(var_id.0 as usize) else {
                return_program_error!("'{}' declares unknown {}", decl.name, var_id);
            };
            if var.owner != decl.id {
                return_program_error!(
                    "'{}' declares '{}', which is owned by another declaration",
                    decl.name,
                    var.name
                );
            }
        }

        match &decl.kind {
            DeclKind::Function(function) => {
                if decl.locals.len() < function.params.len()
                    || decl.locals[..function.params.len()] != function.params[..]
                {
                    return_program_error!(
                        "Parameters of '{}' must be declared before its locals, in order",
                        decl.name
                    );
                }
                for var_id in &decl.locals {
                    let var = self.variable(*var_id)?;
                    let expected_param = function.params.contains(var_id);
                    match (var.kind, expected_param) {
                        (VarKind::Param, true) | (VarKind::Local, false) => {}
                        _ => return_program_error!(
                            "'{}' in function '{}' has the wrong variable kind",
                            var.name,
                            decl.name
                        ),
                    }
                }
            }
            DeclKind::Aggregate(aggregate) => {
                if aggregate.fields != decl.locals {
                    return_program_error!(
                        "Fields of aggregate '{}' do not match its declared variables",
                        decl.name
                    );
                }
                for var_id in &decl.locals {
                    if self.variable(*var_id)?.kind != VarKind::Field {
                        return_program_error!(
                            "Aggregate '{}' can only declare fields",
                            decl.name
                        );
                    }
                }
            }
        }

        Ok(())
    }

    fn validate_type(&self, ty: &ValueType, context: &str) -> Result<(), CompilerError> {
        match ty {
            ValueType::Instance(aggregate) if !self.is_aggregate(*aggregate) => {
                return_program_error!(
                    "'{}' uses {} as an instance type, but it is not an aggregate",
                    context,
                    aggregate
                )
            }
            ValueType::Function { params, ret } => {
                for param in params {
                    self.validate_type(param, context)?;
                }
                self.validate_type(ret, context)
            }
            _ => Ok(()),
        }
    }

    fn validate_block(&self, function: DeclId, block: &[Stmt]) -> Result<(), CompilerError> {
        for stmt in block {
            self.validate_stmt(function, stmt)?;
        }
        Ok(())
    }

    fn validate_stmt(&self, function: DeclId, stmt: &Stmt) -> Result<(), CompilerError> {
        match stmt {
            Stmt::Let { var, value } => {
                let Some(variable) = self.variables.get(var.0 as usize) else {
                    return_program_error!("Let binds unknown {}", var);
                };
                if variable.owner != function || variable.kind != VarKind::Local {
                    return_program_error!(
                        "'{}' can only be bound by a let in the function that declares it",
                        variable.name
                    );
                }
                self.validate_expr(value)
            }
            Stmt::Assign { target, value } => {
                match target {
                    Place::Var(var) => self.validate_var(*var)?,
                    Place::Field { base, field } => {
                        self.validate_expr(base)?;
                        self.validate_field(*field)?;
                    }
                }
                self.validate_expr(value)
            }
            Stmt::Expr(expr) => self.validate_expr(expr),
            Stmt::If {
                condition,
                then_block,
                else_block,
            } => {
                self.validate_expr(condition)?;
                self.validate_block(function, then_block)?;
                self.validate_block(function, else_block)
            }
            Stmt::While { condition, body } => {
                self.validate_expr(condition)?;
                self.validate_block(function, body)
            }
            Stmt::Return(value) => match value {
                Some(value) => self.validate_expr(value),
                None => Ok(()),
            },
        }
    }

    fn validate_var(&self, var: VarId) -> Result<(), CompilerError> {
        if self.variables.get(var.0 as usize).is_none() {
            return_program_error!("Reference to unknown {}", var);
        }
        Ok(())
    }

    fn validate_field(&self, field: VarId) -> Result<(), CompilerError> {
        match self.variables.get(field.0 as usize) {
            Some(var) if var.kind == VarKind::Field => Ok(()),
            Some(var) => return_program_error!("'{}' is not a field", var.name),
            None => return_program_error!("Reference to unknown field {}", field),
        }
    }

    fn validate_callable(
        &self,
        function: DeclId,
        args: &[Expr],
        expect_method: bool,
    ) -> Result<(), CompilerError> {
        let Some(FunctionDecl { params, .. }) = self.get_decl(function).and_then(|d| match &d.kind
        {
            DeclKind::Function(f) => Some(f),
            DeclKind::Aggregate(_) => None,
        }) else {
            return_program_error!("Call target {} is not a function", function);
        };

        if self.is_method(function) != expect_method {
            if expect_method {
                return_program_error!(
                    "'{}' is not a method and cannot be called with a receiver",
                    self.qualified_name(function)
                );
            }
            return_program_error!(
                "Method '{}' needs a receiver",
                self.qualified_name(function)
            );
        }

        if params.len() != args.len() {
            return_program_error!(
                "'{}' takes {} arguments but {} were given",
                self.qualified_name(function),
                params.len(),
                args.len()
            );
        }

        for arg in args {
            self.validate_expr(arg)?;
        }
        Ok(())
    }

    fn validate_expr(&self, expr: &Expr) -> Result<(), CompilerError> {
        match expr {
            Expr::Int(_) | Expr::Bool(_) => Ok(()),
            Expr::Var(var) => self.validate_var(*var),
            Expr::Binary { lhs, rhs, .. } => {
                self.validate_expr(lhs)?;
                self.validate_expr(rhs)
            }
            Expr::Unary { operand, .. } => self.validate_expr(operand),
            Expr::Call { function, args } => self.validate_callable(*function, args, false),
            Expr::MethodCall {
                receiver,
                method,
                args,
            } => {
                self.validate_expr(receiver)?;
                self.validate_callable(*method, args, true)
            }
            Expr::New { aggregate, args } => {
                let Some(DeclKind::Aggregate(decl)) = self.get_decl(*aggregate).map(|d| &d.kind)
                else {
                    return_program_error!("Cannot construct {}, it is not an aggregate", aggregate);
                };
                if decl.fields.len() != args.len() {
                    return_program_error!(
                        "'{}' has {} fields but {} initializers were given",
                        self.qualified_name(*aggregate),
                        decl.fields.len(),
                        args.len()
                    );
                }
                for arg in args {
                    self.validate_expr(arg)?;
                }
                Ok(())
            }
            Expr::FieldGet { base, field } => {
                self.validate_expr(base)?;
                self.validate_field(*field)
            }
            Expr::This { aggregate } => {
                if !self.is_aggregate(*aggregate) {
                    return_program_error!("'this' of {} which is not an aggregate", aggregate);
                }
                Ok(())
            }
            Expr::FunctionRef(function) => {
                if !self.is_function(*function) || self.is_method(*function) {
                    return_program_error!(
                        "Only free or nested functions can be used as values, not {}",
                        function
                    );
                }
                Ok(())
            }
            Expr::CallValue { callee, args } => {
                self.validate_expr(callee)?;
                for arg in args {
                    self.validate_expr(arg)?;
                }
                Ok(())
            }
        }
    }
}

pub struct Ancestors<'a> {
    tree: &'a DeclTree,
    next: Option<DeclId>,

    // Bounds the walk even on a malformed tree
    remaining: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = DeclId;

    fn next(&mut self) -> Option<DeclId> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}
