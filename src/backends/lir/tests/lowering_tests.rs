#![cfg(test)]

use crate::backends::lir::build_lir::lower_to_lir;
use crate::backends::lir::lir_nodes::{
    LirFunctionId, LirInst, LirLocalId, LirModule, LirType, ValueId,
};
use crate::backends::nested_context::NestedContext;
use crate::backends::nested_context::allocation::FrameAllocation;
use crate::backends::nested_context::frame_layout::FrameLayouts;
use crate::compiler_frontend::compiler_messages::compiler_errors::ErrorType;
use crate::compiler_frontend::declarations::decl_nodes::DeclTree;
use crate::compiler_frontend::declarations::tests::test_trees::{
    all_trees, closures_tree, counter_tree, instance_tree, loop_tree, skip_tree,
};

fn lower(tree: &DeclTree, policy: FrameAllocation) -> LirModule {
    let nested = NestedContext::build(tree, policy).expect("nested context should build");
    match lower_to_lir(&nested) {
        Ok(module) => module,
        Err(messages) => panic!("lowering failed: {:?}", messages.errors),
    }
}

fn function_text(module: &LirModule, name: &str) -> String {
    module
        .find_function(name)
        .unwrap_or_else(|| panic!("no LIR function named '{name}'"))
        .to_string()
}

#[test]
fn captured_locals_live_in_a_stack_frame() {
    let module = lower(&counter_tree(), FrameAllocation::EscapeAnalysis);

    assert_eq!(module.structs.len(), 1);
    assert_eq!(module.structs[0].to_string(), "struct T0 frame.outer { i64 }");

    assert_eq!(
        function_text(&module, "outer"),
        "fn fn0 outer() -> i64 {
    %0 = alloc.stack T0
    %1 = const 5
    %2 = addr %0, T0.0
    store.i64 %2, %1
    %3 = call fn1(%0)
    %4 = call fn1(%0)
    %5 = addr %0, T0.0
    %6 = load.i64 %5
    return %6
    unreachable
}
"
    );

    assert_eq!(
        function_text(&module, "outer.inc"),
        "fn fn1 outer.inc(ctx: ptr) -> i64 {
    %0 = get $0
    %1 = addr %0, T0.0
    %2 = load.i64 %1
    %3 = const 1
    %4 = add %2, %3
    %5 = addr %0, T0.0
    store.i64 %5, %4
    %6 = addr %0, T0.0
    %7 = load.i64 %6
    return %7
    unreachable
}
"
    );
}

#[test]
fn frameless_functions_forward_their_incoming_context() {
    let module = lower(&skip_tree(), FrameAllocation::EscapeAnalysis);
    let middle = module.find_function("outer.middle").unwrap();

    assert!(middle.has_context);
    assert_eq!(
        middle.body[..2],
        [
            LirInst::LocalGet {
                dest: ValueId(0),
                local: LirLocalId(0),
            },
            LirInst::Call {
                dest: Some(ValueId(1)),
                function: LirFunctionId(2),
                args: vec![ValueId(0)],
            },
        ]
    );
}

#[test]
fn methods_read_enclosing_variables_through_outer() {
    let module = lower(&instance_tree(), FrameAllocation::EscapeAnalysis);

    let text = module.to_string();
    assert!(text.contains("struct T0 frame.f { i64 }"));
    assert!(text.contains("struct T1 inst.f.Counter { i64, ptr }"));

    assert_eq!(
        function_text(&module, "f"),
        "fn fn0 f(i64) -> i64 {
    %0 = get $0
    %1 = alloc.heap T0
    %2 = addr %1, T0.0
    store.i64 %2, %0
    %3 = const 5
    %4 = alloc.heap T1
    %5 = addr %4, T1.1
    store.ptr %5, %1
    %6 = addr %4, T1.0
    store.i64 %6, %3
    set $1, %4
    %7 = get $1
    %8 = call fn1(%7)
    return %8
    unreachable
}
"
    );

    assert_eq!(
        function_text(&module, "f.Counter.bump"),
        "fn fn1 f.Counter.bump(ctx: ptr) -> i64 {
    %0 = get $0
    %1 = addr %0, T1.1
    %2 = load.ptr %1
    %3 = addr %2, T0.0
    %4 = load.i64 %3
    %5 = addr %0, T1.0
    %6 = load.i64 %5
    %7 = add %4, %6
    return %7
    unreachable
}
"
    );
}

#[test]
fn function_values_pair_code_with_a_heap_frame() {
    let module = lower(&closures_tree(), FrameAllocation::EscapeAnalysis);

    assert_eq!(
        function_text(&module, "make_adder"),
        "fn fn0 make_adder(i64) -> closure {
    %0 = get $0
    %1 = alloc.heap T0
    %2 = addr %1, T0.0
    store.i64 %2, %0
    %3 = closure fn1, %1
    return %3
    unreachable
}
"
    );

    let apply = function_text(&module, "apply");
    assert!(apply.contains("%1 = call fn0(%0)"));
    assert!(apply.contains("%4 = call_closure %2(%3)"));
}

#[test]
fn functions_are_numbered_in_preorder() {
    let module = lower(&closures_tree(), FrameAllocation::EscapeAnalysis);
    let names: Vec<&str> = module.functions.iter().map(|f| f.name.as_str()).collect();

    assert_eq!(
        names,
        vec!["make_adder", "make_adder.add", "counter", "counter.next", "apply", "tick_three"]
    );
    for (index, function) in module.functions.iter().enumerate() {
        assert_eq!(function.id, LirFunctionId(index as u32));
        assert_eq!(module.function(function.id), Some(function));
        assert_eq!(function.has_context, function.name.contains('.'));
    }

    let next = module.find_function("counter.next").unwrap();
    assert_eq!(next.call_params(), vec![LirType::Ptr]);
    assert_eq!(next.context_local().map(|local| local.0), Some(0));
}

#[test]
fn loops_and_short_circuits_lower_to_structured_control_flow() {
    let module = lower(&loop_tree(), FrameAllocation::EscapeAnalysis);

    let sum_to = function_text(&module, "sum_to");
    assert!(sum_to.contains("loop {"));
    assert!(sum_to.contains("break_unless"));

    let add_i = module.find_function("sum_to.add_i").unwrap();
    assert_eq!(add_i.ret, None);
    assert_eq!(add_i.body.last(), Some(&LirInst::Return { value: None }));

    let both = module.find_function("both_positive").unwrap();
    assert_eq!(both.ret, Some(LirType::I64));
    assert!(both.to_string().contains("if %"));
    assert_eq!(both.body.last(), Some(&LirInst::Unreachable));
}

#[test]
fn always_heap_changes_only_the_allocation_kind() {
    let stack = lower(&counter_tree(), FrameAllocation::EscapeAnalysis).to_string();
    let heap = lower(&counter_tree(), FrameAllocation::AlwaysHeap).to_string();

    assert_eq!(stack.replace("alloc.stack", "alloc.heap"), heap);
}

#[test]
fn every_fixture_lowers_with_one_struct_per_layout() {
    for (name, tree) in all_trees() {
        let nested = NestedContext::build(&tree, FrameAllocation::EscapeAnalysis).unwrap();
        let module = lower_to_lir(&nested).unwrap_or_else(|m| panic!("{name}: {:?}", m.errors));

        assert_eq!(module.structs.len(), nested.layouts.len(), "{name}");
        let functions = tree.preorder().into_iter().filter(|d| tree.is_function(*d)).count();
        assert_eq!(module.functions.len(), functions, "{name}");
    }
}

#[test]
fn every_failing_function_reports_its_own_error() {
    let tree = counter_tree();
    let mut nested = NestedContext::build(&tree, FrameAllocation::EscapeAnalysis)
        .expect("nested context should build");
    nested.layouts = FrameLayouts::default();

    // outer cannot build its frame and inc cannot find the slot of a
    let messages = lower_to_lir(&nested).expect_err("frames without layouts");
    assert_eq!(messages.errors.len(), 2);
    assert!(
        messages
            .errors
            .iter()
            .all(|error| error.error_type == ErrorType::Compiler)
    );
}
