//! # Nested Context Lowering
//!
//! Makes variables of enclosing functions reachable from nested functions and nested
//! aggregates through an explicit static chain of context carriers.
//!
//! A *carrier* is either a function frame (only functions that own captured variables
//! get one) or an aggregate instance. Every carrier links to the nearest carrier above it:
//! frames through `parent`, instances through `outer`.
//!
//! ## Phases
//!
//! 1. `capture_analysis` - which variables are captured, which functions need frames,
//!    which aggregates need `outer`
//! 2. `frame_layout` - one struct type per carrier, numbered in tree pre-order
//! 3. `allocation` - heap or stack for each frame
//! 4. `materializer` / `threader` / `resolver` - used by body lowering while it emits code
//!
//! All three phases finish before any body is lowered, and none of them mutate the tree.

pub mod allocation;
pub mod capture_analysis;
pub mod frame_layout;
pub mod materializer;
pub mod resolver;
pub mod threader;

#[cfg(test)]
mod tests;

use crate::backends::lir::lir_nodes::ValueId;
use crate::backends::nested_context::allocation::{AllocationPlan, FrameAllocation};
use crate::backends::nested_context::capture_analysis::CaptureAnalysis;
use crate::backends::nested_context::frame_layout::FrameLayouts;
use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError;
use crate::compiler_frontend::declarations::decl_nodes::{DeclId, DeclTree};
use crate::timer_log;
use std::time::Instant;

/// Side tables describing the static chain of one compilation unit.
#[derive(Debug)]
pub struct NestedContext<'a> {
    pub tree: &'a DeclTree,
    pub analysis: CaptureAnalysis,
    pub layouts: FrameLayouts,
    pub allocation: AllocationPlan,
}

impl<'a> NestedContext<'a> {
    pub fn build(tree: &'a DeclTree, policy: FrameAllocation) -> Result<Self, CompilerError> {
        let time = Instant::now();
        let analysis = CaptureAnalysis::analyze(tree)?;
        timer_log!(time, "Capture analysis completed in: ");

        let time = Instant::now();
        let layouts = FrameLayouts::build(tree, &analysis)?;
        timer_log!(time, "Frame layouts built in: ");

        let allocation = AllocationPlan::build(tree, &layouts, policy)?;

        Ok(NestedContext {
            tree,
            analysis,
            layouts,
            allocation,
        })
    }
}

/// What the code of one function activation can see of the static chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionContext {
    pub decl: DeclId,

    /// This activation's own frame, when the function needs one
    pub frame: Option<ValueId>,

    /// The hidden context argument: the nearest carrier above the function
    /// (the receiver for methods), or null. None for top-level functions.
    pub incoming: Option<ValueId>,
}
