//! Frame and instance materialization.

use crate::backends::lir::emitter::InstructionEmitter;
use crate::backends::lir::lir_nodes::{AllocKind, LirType, ValueId};
use crate::backends::nested_context::frame_layout::SlotKind;
use crate::backends::nested_context::{FunctionContext, NestedContext};
use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError;
use crate::compiler_frontend::declarations::decl_nodes::{DeclId, VarId};
use crate::{codegen_log, return_compiler_error};

impl NestedContext<'_> {
    /// Function prologue.
    ///
    /// For a function with a frame: allocates it, links `parent` to the incoming context
    /// and moves captured parameters into their slots. `params` pairs each parameter with
    /// the value it arrived in. Non-captured parameters are left alone.
    ///
    /// The incoming context already is the nearest carrier above the function,
    /// so linking `parent` needs no pointer walk.
    pub fn enter_function(
        &self,
        emitter: &mut impl InstructionEmitter,
        decl: DeclId,
        incoming: Option<ValueId>,
        params: &[(VarId, ValueId)],
    ) -> Result<FunctionContext, CompilerError> {
        if !self.analysis.is_frame_needed(decl) {
            return Ok(FunctionContext {
                decl,
                frame: None,
                incoming,
            });
        }

        let layout = self.layouts.require(decl)?;
        let Some(kind) = self.allocation.frame_allocation(decl) else {
            return_compiler_error!("No allocation decision for {}", layout.name);
        };

        codegen_log!("Materializing ", {layout.name.as_str()}, " on the ", #kind);
        let frame = emitter.alloc(layout.type_id, kind);

        if let Some(parent_slot) = layout.parent_slot {
            let Some(parent) = incoming else {
                return_compiler_error!(
                    "'{}' has a parent link but received no context",
                    self.tree.qualified_name(decl)
                );
            };
            let addr = emitter.field_addr(frame, layout.type_id, parent_slot);
            emitter.store(addr, parent, LirType::Ptr);
        }

        for (var, value) in params {
            if !self.analysis.is_captured(*var) {
                continue;
            }
            let Some(slot) = layout.slot_of(*var) else {
                return_compiler_error!(
                    "Captured parameter {} has no slot in {}",
                    self.tree.variable_name(*var),
                    layout.name
                );
            };
            let ty = layout.slots[slot as usize].ty;
            let addr = emitter.field_addr(frame, layout.type_id, slot);
            emitter.store(addr, *value, ty);
        }

        Ok(FunctionContext {
            decl,
            frame: Some(frame),
            incoming,
        })
    }

    /// Allocates an aggregate instance, links `outer` and stores the field initializers.
    pub fn materialize_instance(
        &self,
        emitter: &mut impl InstructionEmitter,
        aggregate: DeclId,
        outer: Option<ValueId>,
        fields: &[ValueId],
    ) -> Result<ValueId, CompilerError> {
        let layout = self.layouts.require(aggregate)?;

        let field_slots: Vec<u32> = layout
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot.kind, SlotKind::Field(_)))
            .map(|(index, _)| index as u32)
            .collect();

        if field_slots.len() != fields.len() {
            return_compiler_error!(
                "{} has {} fields but {} initializers were lowered",
                layout.name,
                field_slots.len(),
                fields.len()
            );
        }

        let instance = emitter.alloc(layout.type_id, AllocKind::Heap);

        match (layout.outer_slot, outer) {
            (Some(slot), Some(outer)) => {
                let addr = emitter.field_addr(instance, layout.type_id, slot);
                emitter.store(addr, outer, LirType::Ptr);
            }
            (None, None) => {}
            (Some(_), None) => {
                return_compiler_error!("{} needs an outer link but none was threaded", layout.name)
            }
            (None, Some(_)) => {
                return_compiler_error!("{} has no outer slot for the threaded link", layout.name)
            }
        }

        for (slot, value) in field_slots.into_iter().zip(fields) {
            let ty = layout.slots[slot as usize].ty;
            let addr = emitter.field_addr(instance, layout.type_id, slot);
            emitter.store(addr, *value, ty);
        }

        Ok(instance)
    }
}
