//! Variable and context resolution.
//!
//! The walk from a use site to a target carrier depends only on the nesting tree and the
//! capture analysis. Functions without frames are invisible to it.
//!
//! Starting point:
//! - the use site's own frame, when it has one (the first hop is its `parent` link)
//! - otherwise the incoming context argument, which already points at the nearest
//!   carrier above the use site
//!
//! From there every carrier on the way, except the target, contributes one link
//! dereference: `parent` for frames, `outer` for instances.

use crate::backends::lir::emitter::InstructionEmitter;
use crate::backends::lir::lir_nodes::{FrameTypeId, LirType, ValueId};
use crate::backends::nested_context::{FunctionContext, NestedContext};
use crate::compiler_frontend::compiler_messages::compiler_errors::{
    CompilerError, ErrorMetaDataKey,
};
use crate::compiler_frontend::declarations::decl_nodes::{DeclId, VarId, VarKind};
use crate::{codegen_log, return_compiler_error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStart {
    OwnFrame,
    Incoming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopKind {
    Parent,
    Outer,
}

/// One pointer load: read the link slot of the carrier `through`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextHop {
    pub through: DeclId,
    pub kind: HopKind,
    pub struct_type: FrameTypeId,
    pub slot: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextChain {
    pub use_site: DeclId,
    pub target: DeclId,
    pub start: ChainStart,

    /// Carriers strictly above the use site, up to and including the target
    pub carriers: Vec<DeclId>,
    pub hops: Vec<ContextHop>,
}

impl ContextChain {
    pub fn hop_count(&self) -> usize {
        self.carriers.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableResolution {
    /// An ordinary local of the use site
    Local(VarId),

    /// A slot in a carrier reached through `chain`
    Slot {
        chain: ContextChain,
        struct_type: FrameTypeId,
        slot: u32,
        ty: LirType,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableAddress {
    Local(VarId),
    Slot { addr: ValueId, ty: LirType },
}

impl NestedContext<'_> {
    /// Computes, without emitting anything, how `use_site` reaches the carrier `target`.
    pub fn chain_to(&self, use_site: DeclId, target: DeclId) -> Result<ContextChain, CompilerError> {
        let tree = self.tree;

        if !self.analysis.is_carrier(tree, target) {
            return Err(self.resolution_error(
                use_site,
                format!(
                    "'{}' carries no context and cannot be the end of a chain",
                    tree.qualified_name(target)
                ),
            ));
        }

        let own_frame = self.analysis.is_frame_needed(use_site);

        if target == use_site {
            if !own_frame {
                return Err(self.resolution_error(
                    use_site,
                    "A use site without its own frame cannot point at itself",
                ));
            }
            return Ok(ContextChain {
                use_site,
                target,
                start: ChainStart::OwnFrame,
                carriers: Vec::new(),
                hops: Vec::new(),
            });
        }

        let mut carriers = Vec::new();
        let mut found = false;
        for decl in tree.ancestors(use_site) {
            if !self.analysis.is_carrier(tree, decl) {
                continue;
            }
            carriers.push(decl);
            if decl == target {
                found = true;
                break;
            }
        }

        if !found {
            return Err(self.resolution_error(
                use_site,
                format!(
                    "'{}' is not an enclosing scope of the use site",
                    tree.qualified_name(target)
                ),
            ));
        }

        let mut hops = Vec::with_capacity(carriers.len());
        let start = if own_frame {
            hops.push(self.link_hop(use_site)?);
            ChainStart::OwnFrame
        } else {
            if tree.parent(use_site).is_none() {
                return Err(self.resolution_error(
                    use_site,
                    "A top-level function has no incoming context to start from",
                ));
            }
            ChainStart::Incoming
        };

        for carrier in &carriers[..carriers.len() - 1] {
            hops.push(self.link_hop(*carrier)?);
        }

        Ok(ContextChain {
            use_site,
            target,
            start,
            carriers,
            hops,
        })
    }

    fn link_hop(&self, through: DeclId) -> Result<ContextHop, CompilerError> {
        let layout = self.layouts.require(through)?;

        let hop = match (layout.parent_slot, layout.outer_slot) {
            (Some(slot), _) => ContextHop {
                through,
                kind: HopKind::Parent,
                struct_type: layout.type_id,
                slot,
            },
            (None, Some(slot)) => ContextHop {
                through,
                kind: HopKind::Outer,
                struct_type: layout.type_id,
                slot,
            },
            (None, None) => {
                return Err(self.resolution_error(
                    through,
                    format!("'{}' has no link slot to walk through", layout.name),
                ));
            }
        };

        Ok(hop)
    }

    /// Where a variable lives as seen from `use_site`.
    pub fn resolve_variable(
        &self,
        use_site: DeclId,
        var_id: VarId,
    ) -> Result<VariableResolution, CompilerError> {
        let tree = self.tree;
        let var = tree.variable(var_id)?;
        let owner = var.owner;

        let captured = self.analysis.is_captured(var_id);
        if owner == use_site && !captured {
            return Ok(VariableResolution::Local(var_id));
        }

        if var.kind != VarKind::Field && !captured {
            return Err(self
                .resolution_error(
                    use_site,
                    format!(
                        "'{}' belongs to an enclosing function but was never marked captured",
                        var.name
                    ),
                )
                .with_metadata(ErrorMetaDataKey::Variable, tree.variable_name(var_id)));
        }

        let chain = self.chain_to(use_site, owner)?;
        let layout = self.layouts.require(owner)?;
        let Some(slot) = layout.slot_of(var_id) else {
            return_compiler_error!("'{}' has no slot in {}", var.name, layout.name);
        };
        let Some(ty) = layout.slot_type(slot) else {
            return_compiler_error!("Slot {} is out of range in {}", slot, layout.name);
        };

        Ok(VariableResolution::Slot {
            chain,
            struct_type: layout.type_id,
            slot,
            ty,
        })
    }

    /// Emits the pointer loads of a chain and returns the target carrier's pointer.
    pub fn emit_chain(
        &self,
        emitter: &mut impl InstructionEmitter,
        function: &FunctionContext,
        chain: &ContextChain,
    ) -> Result<ValueId, CompilerError> {
        let mut pointer = match chain.start {
            ChainStart::OwnFrame => function.frame,
            ChainStart::Incoming => function.incoming,
        }
        .ok_or_else(|| {
            self.resolution_error(
                function.decl,
                format!("Chain starts from {:?}, which this activation lacks", chain.start),
            )
        })?;

        for hop in &chain.hops {
            let addr = emitter.field_addr(pointer, hop.struct_type, hop.slot);
            pointer = emitter.load(addr, LirType::Ptr);
        }

        codegen_log!(
            "Chain ", {self.tree.qualified_name(chain.use_site)}, " -> ",
            {self.tree.qualified_name(chain.target)}, " (", {chain.hop_count()}, " hops)"
        );

        Ok(pointer)
    }

    /// Emits the pointer to carrier `target` at the current use site.
    pub fn emit_context_pointer(
        &self,
        emitter: &mut impl InstructionEmitter,
        function: &FunctionContext,
        target: DeclId,
    ) -> Result<ValueId, CompilerError> {
        let chain = self.chain_to(function.decl, target)?;
        self.emit_chain(emitter, function, &chain)
    }

    /// Emits the address of a variable, or names the local that holds it.
    pub fn emit_variable_address(
        &self,
        emitter: &mut impl InstructionEmitter,
        function: &FunctionContext,
        var: VarId,
    ) -> Result<VariableAddress, CompilerError> {
        match self.resolve_variable(function.decl, var)? {
            VariableResolution::Local(var) => Ok(VariableAddress::Local(var)),
            VariableResolution::Slot {
                chain,
                struct_type,
                slot,
                ty,
            } => {
                let carrier = self.emit_chain(emitter, function, &chain)?;
                let addr = emitter.field_addr(carrier, struct_type, slot);
                Ok(VariableAddress::Slot { addr, ty })
            }
        }
    }

    fn resolution_error(&self, use_site: DeclId, msg: impl Into<String>) -> CompilerError {
        CompilerError::compiler_error(msg)
            .with_declaration(use_site)
            .with_declaration_path(self.tree.qualified_name(use_site))
            .with_metadata(ErrorMetaDataKey::CompilationStage, "context resolution")
    }
}
