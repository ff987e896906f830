#![cfg(test)]

use crate::backends::lir::lir_nodes::AllocKind;
use crate::backends::nested_context::NestedContext;
use crate::backends::nested_context::allocation::FrameAllocation;
use crate::compiler_frontend::declarations::tests::test_trees::{
    closures_tree, counter_tree, decl, deep_instance_tree, instance_tree, loop_tree,
    siblings_tree,
};

#[test]
fn frames_used_only_by_direct_calls_stay_on_the_stack() {
    let tree = siblings_tree();
    let nested = NestedContext::build(&tree, FrameAllocation::EscapeAnalysis).unwrap();

    for path in ["pair", "pair.left", "pair.right"] {
        assert_eq!(
            nested.allocation.frame_allocation(decl(&tree, path)),
            Some(AllocKind::Stack),
            "{path}"
        );
    }
    assert_eq!(nested.allocation.heap_frames(), 0);

    let counter = counter_tree();
    let nested = NestedContext::build(&counter, FrameAllocation::EscapeAnalysis).unwrap();
    assert_eq!(
        nested.allocation.frame_allocation(decl(&counter, "outer")),
        Some(AllocKind::Stack)
    );

    let loops = loop_tree();
    let nested = NestedContext::build(&loops, FrameAllocation::EscapeAnalysis).unwrap();
    assert_eq!(
        nested.allocation.frame_allocation(decl(&loops, "sum_to")),
        Some(AllocKind::Stack)
    );
}

#[test]
fn returned_function_values_move_frames_to_the_heap() {
    let tree = closures_tree();
    let nested = NestedContext::build(&tree, FrameAllocation::EscapeAnalysis).unwrap();

    assert_eq!(
        nested.allocation.frame_allocation(decl(&tree, "make_adder")),
        Some(AllocKind::Heap)
    );
    assert_eq!(
        nested.allocation.frame_allocation(decl(&tree, "counter")),
        Some(AllocKind::Heap)
    );
    assert_eq!(nested.allocation.frame_allocation(decl(&tree, "apply")), None);
    assert_eq!(nested.allocation.heap_frames(), 2);
}

#[test]
fn linked_instances_move_enclosing_frames_to_the_heap() {
    let tree = instance_tree();
    let nested = NestedContext::build(&tree, FrameAllocation::EscapeAnalysis).unwrap();
    assert_eq!(
        nested.allocation.frame_allocation(decl(&tree, "f")),
        Some(AllocKind::Heap)
    );

    // The instance is created inside h, but it also reaches g through h's parent link
    let deep = deep_instance_tree();
    let nested = NestedContext::build(&deep, FrameAllocation::EscapeAnalysis).unwrap();
    assert_eq!(
        nested.allocation.frame_allocation(decl(&deep, "g")),
        Some(AllocKind::Heap)
    );
    assert_eq!(
        nested.allocation.frame_allocation(decl(&deep, "g.h")),
        Some(AllocKind::Heap)
    );
}

#[test]
fn always_heap_overrides_escape_analysis() {
    let tree = siblings_tree();
    let nested = NestedContext::build(&tree, FrameAllocation::AlwaysHeap).unwrap();

    assert_eq!(nested.allocation.heap_frames(), 3);
    assert_eq!(
        nested.allocation.frame_allocation(decl(&tree, "pair.left")),
        Some(AllocKind::Heap)
    );
}

#[test]
fn aggregates_have_no_frame_allocation() {
    let tree = instance_tree();
    let nested = NestedContext::build(&tree, FrameAllocation::AlwaysHeap).unwrap();

    assert_eq!(
        nested.allocation.frame_allocation(decl(&tree, "f.Counter")),
        None
    );
    assert_eq!(nested.allocation.heap_frames(), 1);
}

#[test]
fn frame_allocation_parses_from_snake_case() {
    let parsed: FrameAllocation = serde_json::from_str("\"always_heap\"").unwrap();
    assert_eq!(parsed, FrameAllocation::AlwaysHeap);
    assert_eq!(FrameAllocation::default(), FrameAllocation::EscapeAnalysis);
}
