#![cfg(test)]

use crate::backends::lir::lir_nodes::{FrameTypeId, LirType};
use crate::backends::nested_context::NestedContext;
use crate::backends::nested_context::allocation::FrameAllocation;
use crate::backends::nested_context::frame_layout::{SlotKind, storage_type};
use crate::compiler_frontend::compiler_messages::compiler_errors::ErrorType;
use crate::compiler_frontend::declarations::decl_builder::DeclTreeBuilder;
use crate::compiler_frontend::declarations::decl_nodes::{AggregateKind, ValueType};
use crate::compiler_frontend::declarations::tests::test_trees::{
    counter_tree, decl, deep_instance_tree, instance_tree, siblings_tree, skip_tree, var,
};

fn slot_names(nested: &NestedContext<'_>, path: &str) -> Vec<String> {
    nested
        .layouts
        .layout_of(decl(nested.tree, path))
        .unwrap_or_else(|| panic!("no layout for '{path}'"))
        .slots
        .iter()
        .map(|slot| slot.name.clone())
        .collect()
}

#[test]
fn frames_hold_captured_variables_then_the_parent_link() {
    let tree = siblings_tree();
    let nested = NestedContext::build(&tree, FrameAllocation::EscapeAnalysis).unwrap();

    assert_eq!(nested.layouts.len(), 3);
    assert_eq!(slot_names(&nested, "pair"), vec!["p", "q"]);
    assert_eq!(slot_names(&nested, "pair.left"), vec!["k", "parent"]);
    assert_eq!(slot_names(&nested, "pair.right"), vec!["k", "parent"]);

    let pair = nested.layouts.layout_of(decl(&tree, "pair")).unwrap();
    assert_eq!(pair.parent_slot, None);
    assert_eq!(pair.slot_of(var(&tree, "pair.q")), Some(1));

    let left = nested.layouts.layout_of(decl(&tree, "pair.left")).unwrap();
    assert_eq!(left.parent_slot, Some(1));
    assert_eq!(left.link_slot(), Some(1));
    assert_eq!(left.slots[1].kind, SlotKind::Parent);
    assert_eq!(left.slot_type(1), Some(LirType::Ptr));
    assert_eq!(left.slot_type(2), None);
}

#[test]
fn structurally_equal_siblings_get_distinct_types() {
    let tree = siblings_tree();
    let nested = NestedContext::build(&tree, FrameAllocation::EscapeAnalysis).unwrap();

    let left = nested.layouts.layout_of(decl(&tree, "pair.left")).unwrap();
    let right = nested.layouts.layout_of(decl(&tree, "pair.right")).unwrap();

    assert_eq!(left.type_id, FrameTypeId(1));
    assert_eq!(right.type_id, FrameTypeId(2));
    assert_eq!(left.name, "frame.pair.left");
    assert_eq!(right.name, "frame.pair.right");
    assert_eq!(
        left.to_struct_type().slots,
        right.to_struct_type().slots
    );
}

#[test]
fn functions_without_captures_get_no_layout() {
    let tree = skip_tree();
    let nested = NestedContext::build(&tree, FrameAllocation::EscapeAnalysis).unwrap();

    assert!(nested.layouts.layout_of(decl(&tree, "outer.middle")).is_none());
    assert!(nested.layouts.layout_of(decl(&tree, "outer.middle.inner")).is_none());
    assert_eq!(nested.layouts.len(), 1);

    let error = nested
        .layouts
        .require(decl(&tree, "outer.middle"))
        .expect_err("middle has no frame");
    assert_eq!(error.error_type, ErrorType::Compiler);
}

#[test]
fn instances_hold_fields_then_the_outer_link() {
    let tree = instance_tree();
    let nested = NestedContext::build(&tree, FrameAllocation::EscapeAnalysis).unwrap();

    let counter = nested.layouts.layout_of(decl(&tree, "f.Counter")).unwrap();
    assert_eq!(counter.name, "inst.f.Counter");
    assert_eq!(counter.type_id, FrameTypeId(1));
    assert_eq!(slot_names(&nested, "f.Counter"), vec!["step", "outer"]);
    assert_eq!(counter.outer_slot, Some(1));
    assert_eq!(counter.parent_slot, None);
    assert_eq!(counter.slot_of(var(&tree, "f.Counter.step")), Some(0));
    assert_eq!(
        counter.slots[0].kind,
        SlotKind::Field(var(&tree, "f.Counter.step"))
    );
}

#[test]
fn type_ids_follow_tree_preorder() {
    let tree = deep_instance_tree();
    let nested = NestedContext::build(&tree, FrameAllocation::EscapeAnalysis).unwrap();

    let names: Vec<&str> = nested.layouts.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["frame.g", "frame.g.h", "inst.g.h.Adder"]);
    assert_eq!(slot_names(&nested, "g.h.Adder"), vec!["outer"]);

    for (index, layout) in nested.layouts.iter().enumerate() {
        assert_eq!(layout.type_id, FrameTypeId(index as u32));
        assert_eq!(nested.layouts.get(layout.type_id), Some(layout));
    }
}

#[test]
fn aggregates_always_get_a_layout() {
    let mut builder = DeclTreeBuilder::new();
    let point = builder.aggregate("Point", None, AggregateKind::Struct);
    builder.field(point, "x", ValueType::Int);
    builder.field(point, "visible", ValueType::Bool);
    let tree = builder.finish().unwrap();

    let nested = NestedContext::build(&tree, FrameAllocation::EscapeAnalysis).unwrap();
    let layout = nested.layouts.require(point).unwrap();

    assert_eq!(layout.name, "inst.Point");
    assert_eq!(layout.outer_slot, None);
    assert_eq!(layout.link_slot(), None);
    assert_eq!(layout.to_struct_type().slots, vec![LirType::I64, LirType::I64]);
}

#[test]
fn layouts_display_one_slot_per_line() {
    let tree = counter_tree();
    let nested = NestedContext::build(&tree, FrameAllocation::EscapeAnalysis).unwrap();

    assert_eq!(
        nested.layouts.to_string(),
        "T0 frame.outer {\n  [0] a: i64\n}\n"
    );
}

#[test]
fn storage_types_cover_every_value_type() {
    let tree = instance_tree();
    let counter = decl(&tree, "f.Counter");

    assert_eq!(storage_type(&ValueType::Bool).unwrap(), LirType::I64);
    assert_eq!(storage_type(&ValueType::Instance(counter)).unwrap(), LirType::Ptr);
    assert_eq!(
        storage_type(&ValueType::Function {
            params: vec![],
            ret: Box::new(ValueType::Int),
        })
        .unwrap(),
        LirType::Closure
    );

    let error = storage_type(&ValueType::Unit).expect_err("Unit has no storage");
    assert_eq!(error.error_type, ErrorType::Compiler);
}
