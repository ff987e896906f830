//! Frame Layouts
//!
//! Synthesizes one struct type per context carrier:
//! - frame-needed function: captured variables in declaration order, then `parent`
//!   (absent for top-level functions)
//! - aggregate: fields in declaration order, then `outer` when capture analysis asks for it
//!
//! Type ids are handed out in tree pre-order, so identical trees always produce
//! identical layouts. Identity is per declaration, structurally equal siblings still get
//! distinct types.

use crate::backends::lir::lir_nodes::{FrameTypeId, LirStructType, LirType};
use crate::backends::nested_context::capture_analysis::CaptureAnalysis;
use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError;
use crate::compiler_frontend::declarations::decl_nodes::{
    DeclId, DeclKind, DeclTree, ValueType, VarId,
};
use crate::{layout_log, return_compiler_error};
use rustc_hash::FxHashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Captured(VarId),
    Field(VarId),
    Parent,
    Outer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSlot {
    pub kind: SlotKind,
    pub name: String,
    pub ty: LirType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    pub owner: DeclId,
    pub type_id: FrameTypeId,

    /// `frame.<path>` for function frames, `inst.<path>` for aggregate instances
    pub name: String,
    pub slots: Vec<FrameSlot>,
    pub parent_slot: Option<u32>,
    pub outer_slot: Option<u32>,
}

impl FrameLayout {
    pub fn slot_of(&self, var: VarId) -> Option<u32> {
        self.slots
            .iter()
            .position(|slot| match slot.kind {
                SlotKind::Captured(id) | SlotKind::Field(id) => id == var,
                SlotKind::Parent | SlotKind::Outer => false,
            })
            .map(|index| index as u32)
    }

    pub fn slot_type(&self, slot: u32) -> Option<LirType> {
        self.slots.get(slot as usize).map(|s| s.ty)
    }

    /// The enclosing link of this carrier: `parent` for frames, `outer` for instances
    pub fn link_slot(&self) -> Option<u32> {
        self.parent_slot.or(self.outer_slot)
    }

    pub fn to_struct_type(&self) -> LirStructType {
        LirStructType {
            id: self.type_id,
            name: self.name.clone(),
            owner: self.owner,
            slots: self.slots.iter().map(|slot| slot.ty).collect(),
        }
    }
}

impl Display for FrameLayout {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "{} {} {{", self.type_id, self.name)?;
        for (index, slot) in self.slots.iter().enumerate() {
            writeln!(f, "  [{index}] {}: {}", slot.name, slot.ty)?;
        }
        write!(f, "}}")
    }
}

/// Maps a source type to the storage type of a slot or local.
pub fn storage_type(ty: &ValueType) -> Result<LirType, CompilerError> {
    match ty {
        ValueType::Int | ValueType::Bool => Ok(LirType::I64),
        ValueType::Instance(_) => Ok(LirType::Ptr),
        ValueType::Function { .. } => Ok(LirType::Closure),
        ValueType::Unit => return_compiler_error!("Unit values have no storage"),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameLayouts {
    /// Indexed by FrameTypeId
    layouts: Vec<FrameLayout>,
    by_owner: FxHashMap<DeclId, FrameTypeId>,
}

impl FrameLayouts {
    pub fn build(tree: &DeclTree, analysis: &CaptureAnalysis) -> Result<Self, CompilerError> {
        let mut layouts = FrameLayouts::default();

        for decl_id in tree.preorder() {
            let decl = tree.decl(decl_id)?;
            let Some(summary) = analysis.summary(decl_id) else {
                return_compiler_error!("No capture summary for '{}'", tree.qualified_name(decl_id));
            };

            let type_id = FrameTypeId(layouts.layouts.len() as u32);
            let path = tree.qualified_name(decl_id);
            let mut slots = Vec::new();
            let mut parent_slot = None;
            let mut outer_slot = None;

            let name = match &decl.kind {
                DeclKind::Function(_) => {
                    if !summary.frame_needed {
                        continue;
                    }

                    for var_id in &summary.captured {
                        let var = tree.variable(*var_id)?;
                        slots.push(FrameSlot {
                            kind: SlotKind::Captured(*var_id),
                            name: var.name.clone(),
                            ty: storage_type(&var.ty)?,
                        });
                    }

                    if decl.parent.is_some() {
                        parent_slot = Some(slots.len() as u32);
                        slots.push(FrameSlot {
                            kind: SlotKind::Parent,
                            name: String::from("parent"),
                            ty: LirType::Ptr,
                        });
                    }

                    format!("frame.{path}")
                }

                DeclKind::Aggregate(aggregate) => {
                    for var_id in &aggregate.fields {
                        let var = tree.variable(*var_id)?;
                        slots.push(FrameSlot {
                            kind: SlotKind::Field(*var_id),
                            name: var.name.clone(),
                            ty: storage_type(&var.ty)?,
                        });
                    }

                    if summary.needs_outer {
                        outer_slot = Some(slots.len() as u32);
                        slots.push(FrameSlot {
                            kind: SlotKind::Outer,
                            name: String::from("outer"),
                            ty: LirType::Ptr,
                        });
                    }

                    format!("inst.{path}")
                }
            };

            let layout = FrameLayout {
                owner: decl_id,
                type_id,
                name,
                slots,
                parent_slot,
                outer_slot,
            };

            layout_log!(layout);

            layouts.by_owner.insert(decl_id, type_id);
            layouts.layouts.push(layout);
        }

        Ok(layouts)
    }

    pub fn layout_of(&self, owner: DeclId) -> Option<&FrameLayout> {
        self.by_owner
            .get(&owner)
            .and_then(|id| self.layouts.get(id.0 as usize))
    }

    /// Like `layout_of`, but a missing layout is a backend bug.
    pub fn require(&self, owner: DeclId) -> Result<&FrameLayout, CompilerError> {
        match self.layout_of(owner) {
            Some(layout) => Ok(layout),
            None => return_compiler_error!("No context layout exists for {}", owner),
        }
    }

    pub fn get(&self, type_id: FrameTypeId) -> Option<&FrameLayout> {
        self.layouts.get(type_id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameLayout> {
        self.layouts.iter()
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    pub fn struct_types(&self) -> Vec<LirStructType> {
        self.layouts.iter().map(FrameLayout::to_struct_type).collect()
    }
}

impl Display for FrameLayouts {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for layout in &self.layouts {
            writeln!(f, "{layout}")?;
        }
        Ok(())
    }
}
