//! Context threading.
//!
//! Decides the hidden context argument for calls, constructions and function values.
//!
//! Calling convention:
//! - top-level functions take no context
//! - nested functions always take one: the nearest carrier at or above their parent, or null
//! - methods take their receiver
//!
//! An aggregate constructed with an `outer` slot gets the nearest carrier at or above its
//! parent. A function value carries exactly what a direct call would have passed.

use crate::backends::lir::emitter::InstructionEmitter;
use crate::backends::lir::lir_nodes::ValueId;
use crate::backends::nested_context::resolver::ContextChain;
use crate::backends::nested_context::{FunctionContext, NestedContext};
use crate::compiler_frontend::compiler_messages::compiler_errors::{
    CompilerError, ErrorMetaDataKey,
};
use crate::compiler_frontend::declarations::decl_nodes::DeclId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextArgument {
    /// The callee takes no context
    None,
    Null,
    Chain(ContextChain),

    /// The explicit receiver of a method call
    Receiver,
}

impl NestedContext<'_> {
    pub fn plan_call_context(
        &self,
        use_site: DeclId,
        callee: DeclId,
    ) -> Result<ContextArgument, CompilerError> {
        let tree = self.tree;
        tree.function(callee)?;

        let Some(parent) = tree.parent(callee) else {
            return Ok(ContextArgument::None);
        };

        if tree.is_aggregate(parent) {
            return Ok(ContextArgument::Receiver);
        }

        self.plan_for_parent(use_site, parent)
    }

    pub fn plan_construction_context(
        &self,
        use_site: DeclId,
        aggregate: DeclId,
    ) -> Result<ContextArgument, CompilerError> {
        let layout = self.layouts.require(aggregate)?;
        if layout.outer_slot.is_none() {
            return Ok(ContextArgument::None);
        }

        match self.tree.parent(aggregate) {
            Some(parent) => self.plan_for_parent(use_site, parent),
            None => Ok(ContextArgument::Null),
        }
    }

    fn plan_for_parent(
        &self,
        use_site: DeclId,
        parent: DeclId,
    ) -> Result<ContextArgument, CompilerError> {
        match self.analysis.nearest_carrier(self.tree, parent) {
            Some(carrier) => Ok(ContextArgument::Chain(self.chain_to(use_site, carrier)?)),
            None => Ok(ContextArgument::Null),
        }
    }

    /// The hidden argument for a direct call, or None for top-level callees.
    pub fn call_context(
        &self,
        emitter: &mut impl InstructionEmitter,
        function: &FunctionContext,
        callee: DeclId,
    ) -> Result<Option<ValueId>, CompilerError> {
        match self.plan_call_context(function.decl, callee)? {
            ContextArgument::Receiver => Err(CompilerError::compiler_error(format!(
                "Method '{}' was called without a receiver",
                self.tree.qualified_name(callee)
            ))
            .with_declaration(function.decl)
            .with_metadata(ErrorMetaDataKey::CompilationStage, "context threading")),
            argument => self.emit_argument(emitter, function, argument),
        }
    }

    /// The `outer` pointer for a construction, or None when instances carry no link.
    pub fn construction_context(
        &self,
        emitter: &mut impl InstructionEmitter,
        function: &FunctionContext,
        aggregate: DeclId,
    ) -> Result<Option<ValueId>, CompilerError> {
        let argument = self.plan_construction_context(function.decl, aggregate)?;
        self.emit_argument(emitter, function, argument)
    }

    /// The context paired with `target` in a function value.
    pub fn closure_context(
        &self,
        emitter: &mut impl InstructionEmitter,
        function: &FunctionContext,
        target: DeclId,
    ) -> Result<ValueId, CompilerError> {
        match self.plan_call_context(function.decl, target)? {
            ContextArgument::None => Ok(emitter.null_context()),
            ContextArgument::Receiver => Err(CompilerError::compiler_error(format!(
                "Method '{}' cannot be used as a function value",
                self.tree.qualified_name(target)
            ))
            .with_declaration(function.decl)),
            argument => Ok(self
                .emit_argument(emitter, function, argument)?
                .unwrap_or_else(|| emitter.null_context())),
        }
    }

    fn emit_argument(
        &self,
        emitter: &mut impl InstructionEmitter,
        function: &FunctionContext,
        argument: ContextArgument,
    ) -> Result<Option<ValueId>, CompilerError> {
        match argument {
            ContextArgument::None => Ok(None),
            ContextArgument::Null => Ok(Some(emitter.null_context())),
            ContextArgument::Chain(chain) => Ok(Some(self.emit_chain(emitter, function, &chain)?)),
            ContextArgument::Receiver => Err(CompilerError::compiler_error(
                "A receiver context cannot be synthesized from the static chain",
            )
            .with_declaration(function.decl)),
        }
    }
}
