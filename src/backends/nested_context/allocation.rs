//! Frame allocation planning.
//!
//! A frame can live on the stack only if nothing created during the activation can keep a
//! pointer into it after the activation returns. The only things that can are function
//! values and instances with an `outer` link, so a frame goes to the heap when its owner's
//! subtree creates either of them for a declaration nested below the owner.
//! Aggregate instances are values and always live on the heap.

use crate::backends::lir::lir_nodes::AllocKind;
use crate::backends::nested_context::frame_layout::FrameLayouts;
use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError;
use crate::compiler_frontend::declarations::decl_nodes::{DeclId, DeclTree, Expr, Place, Stmt};
use crate::analysis_log;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameAllocation {
    AlwaysHeap,
    #[default]
    EscapeAnalysis,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationPlan {
    frames: FxHashMap<DeclId, AllocKind>,
}

impl AllocationPlan {
    pub fn build(
        tree: &DeclTree,
        layouts: &FrameLayouts,
        policy: FrameAllocation,
    ) -> Result<Self, CompilerError> {
        let mut plan = AllocationPlan::default();

        for layout in layouts.iter() {
            if !tree.is_function(layout.owner) {
                continue;
            }

            let kind = match policy {
                FrameAllocation::AlwaysHeap => AllocKind::Heap,
                FrameAllocation::EscapeAnalysis => {
                    if frame_escapes(tree, layouts, layout.owner)? {
                        AllocKind::Heap
                    } else {
                        AllocKind::Stack
                    }
                }
            };

            analysis_log!("Frame of ", {tree.qualified_name(layout.owner)}, " -> ", #kind);
            plan.frames.insert(layout.owner, kind);
        }

        Ok(plan)
    }

    /// None when the function has no frame
    pub fn frame_allocation(&self, function: DeclId) -> Option<AllocKind> {
        self.frames.get(&function).copied()
    }

    pub fn heap_frames(&self) -> usize {
        self.frames
            .values()
            .filter(|kind| **kind == AllocKind::Heap)
            .count()
    }
}

fn frame_escapes(
    tree: &DeclTree,
    layouts: &FrameLayouts,
    owner: DeclId,
) -> Result<bool, CompilerError> {
    let mut pending = vec![owner];

    while let Some(decl_id) = pending.pop() {
        let decl = tree.decl(decl_id)?;
        pending.extend(decl.children.iter().copied());

        if !tree.is_function(decl_id) {
            continue;
        }

        let mut scan = EscapeScan {
            tree,
            layouts,
            owner,
            escapes: false,
        };
        for stmt in &tree.function(decl_id)?.body {
            scan.stmt(stmt);
        }
        if scan.escapes {
            return Ok(true);
        }
    }

    Ok(false)
}

struct EscapeScan<'a> {
    tree: &'a DeclTree,
    layouts: &'a FrameLayouts,
    owner: DeclId,
    escapes: bool,
}

impl EscapeScan<'_> {
    fn nested_below_owner(&self, decl: DeclId) -> bool {
        decl != self.owner && self.tree.is_ancestor_or_self(self.owner, decl)
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let { value, .. } | Stmt::Expr(value) => self.expr(value),
            Stmt::Assign { target, value } => {
                if let Place::Field { base, .. } = target {
                    self.expr(base);
                }
                self.expr(value);
            }
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
            Expr::Int(_) | Expr::Bool(_) | Expr::Var(_) | Expr::This { .. } => {}
            Expr::FunctionRef(function) => {
                if self.nested_below_owner(*function) {
                    self.escapes = true;
                }
            }
            Expr::New { aggregate, args } => {
                let has_outer = self
                    .layouts
                    .layout_of(*aggregate)
                    .is_some_and(|layout| layout.outer_slot.is_some());
                if has_outer && self.nested_below_owner(*aggregate) {
                    self.escapes = true;
                }
                args.iter().for_each(|a| self.expr(a));
            }
            Expr::Binary { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            Expr::Unary { operand, .. } => self.expr(operand),
            Expr::Call { args, .. } => args.iter().for_each(|a| self.expr(a)),
            Expr::MethodCall { receiver, args, .. } | Expr::CallValue { callee: receiver, args } => {
                self.expr(receiver);
                args.iter().for_each(|a| self.expr(a));
            }
            Expr::FieldGet { base, .. } => self.expr(base),
        }
    }
}
