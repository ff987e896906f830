#![cfg(test)]

use crate::backends::lir::build_lir::lower_to_lir;
use crate::backends::lir::lir_nodes::{LirFunctionId, LirModule};
use crate::backends::nested_context::NestedContext;
use crate::backends::nested_context::allocation::FrameAllocation;
use crate::backends::wasm::encode::{encode_wasm, wasm_index};
use crate::backends::wasm::module_builder::WasmModuleBuilder;
use crate::backends::wasm::validator::{summarize_module, validate_wasm};
use crate::compiler_frontend::compiler_messages::compiler_errors::ErrorType;
use crate::compiler_frontend::declarations::decl_nodes::DeclTree;
use crate::compiler_frontend::declarations::tests::test_trees::{
    all_trees, closures_tree, instance_tree, random_tree, tree_shapes,
};
use proptest::prelude::*;
use wasm_encoder::{ExportKind, Function, Instruction, ValType};

fn lower(tree: &DeclTree, policy: FrameAllocation) -> LirModule {
    let nested = NestedContext::build(tree, policy).expect("nested context should build");
    lower_to_lir(&nested).unwrap_or_else(|messages| panic!("{:?}", messages.errors))
}

#[test]
fn every_fixture_encodes_to_a_valid_module() {
    for (name, tree) in all_trees() {
        for policy in [FrameAllocation::EscapeAnalysis, FrameAllocation::AlwaysHeap] {
            let module = lower(&tree, policy);
            let bytes = encode_wasm(&module).unwrap_or_else(|e| panic!("{name}: {}", e.msg));
            validate_wasm(&bytes).unwrap_or_else(|e| panic!("{name}: {}", e.msg));
        }
    }
}

#[test]
fn only_top_level_functions_are_exported() {
    let module = lower(&closures_tree(), FrameAllocation::EscapeAnalysis);
    let summary = summarize_module(&encode_wasm(&module).unwrap()).unwrap();

    assert_eq!(summary.function_count, module.functions.len() as u32 + 1);
    assert_eq!(
        summary.function_exports,
        vec!["make_adder", "counter", "apply", "tick_three"]
    );
    assert_eq!(summary.memory_exports, vec!["memory"]);
}

#[test]
fn methods_take_their_receiver_and_stay_internal() {
    let module = lower(&instance_tree(), FrameAllocation::EscapeAnalysis);
    let summary = summarize_module(&encode_wasm(&module).unwrap()).unwrap();

    assert_eq!(summary.function_exports, vec!["f"]);
    assert_eq!(summary.function_count, 3);
}

#[test]
fn the_allocator_comes_first() {
    assert_eq!(wasm_index(LirFunctionId(0)), 1);
    assert_eq!(wasm_index(LirFunctionId(4)), 5);
}

#[test]
fn identical_signatures_share_one_type() {
    let mut builder = WasmModuleBuilder::new();
    let first = builder.add_function_type(vec![ValType::I32, ValType::I64], vec![ValType::I64]);
    let other = builder.add_function_type(vec![ValType::I64], vec![]);
    let again = builder.add_function_type(vec![ValType::I32, ValType::I64], vec![ValType::I64]);

    assert_eq!(first, again);
    assert_ne!(first, other);
}

#[test]
fn duplicate_exports_are_rejected() {
    let mut builder = WasmModuleBuilder::new();
    let ty = builder.add_function_type(vec![], vec![]);
    let index = builder.declare_function(ty);
    builder.add_export("main", ExportKind::Func, index).unwrap();

    let error = builder
        .add_export("main", ExportKind::Func, index)
        .expect_err("main is already exported");
    assert_eq!(error.error_type, ErrorType::WasmGeneration);
    assert!(error.msg.contains("defined twice"));
}

#[test]
fn declared_functions_need_bodies() {
    let mut builder = WasmModuleBuilder::new();
    let ty = builder.add_function_type(vec![], vec![]);
    builder.declare_function(ty);
    builder.declare_function(ty);

    let mut body = Function::new(vec![]);
    body.instruction(&Instruction::End);
    builder.add_function_body(&body).unwrap();

    let error = builder.finish().expect_err("one body is missing");
    assert!(error.msg.contains("1 declared functions have no body"));
}

#[test]
fn garbage_fails_validation() {
    let error = validate_wasm(b"\0asm\x01\0\0\0\x7f").expect_err("not a module");
    assert_eq!(error.error_type, ErrorType::WasmGeneration);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn generated_trees_encode_to_valid_modules(shape in tree_shapes()) {
        let tree = random_tree(&shape);
        let module = lower(&tree, FrameAllocation::EscapeAnalysis);

        let bytes = encode_wasm(&module).unwrap();
        let summary = summarize_module(&bytes).unwrap();
        prop_assert_eq!(summary.function_count, module.functions.len() as u32 + 1);
        prop_assert_eq!(summary.function_exports.len(), tree.roots().count());
    }
}
