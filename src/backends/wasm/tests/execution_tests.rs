#![cfg(test)]

use crate::backends::nested_context::allocation::FrameAllocation;
use crate::build_system::core_build::compile_unit;
use crate::compiler_frontend::declarations::decl_builder::DeclTreeBuilder;
use crate::compiler_frontend::declarations::decl_nodes::{
    AggregateKind, BinOp, DeclTree, Expr, Stmt, ValueType,
};
use crate::compiler_frontend::declarations::tests::test_trees::{
    closures_tree, counter_tree, deep_instance_tree, echo_tree, instance_tree, loop_tree,
    random_tree, siblings_tree, skip_tree, tree_shapes,
};
use crate::projects::settings::Config;
use crate::runtime::interpreter::{DEFAULT_MAX_STEPS, Interpreter};
use crate::runtime::object_store::Value as RuntimeValue;
use proptest::prelude::*;
use wasmer::{Instance, Module, Store, Value, imports};

const PAGE_BYTES: u64 = 64 * 1024;

fn config_for(policy: FrameAllocation) -> Config {
    Config {
        frame_allocation: policy,
        emit_wasm: true,
        ..Config::default()
    }
}

/// One instantiated module. Calls share its linear memory and globals.
struct WasmRun {
    store: Store,
    instance: Instance,
}

impl WasmRun {
    fn new(tree: &DeclTree, policy: FrameAllocation) -> Self {
        let unit = match compile_unit(tree, &config_for(policy)) {
            Ok(unit) => unit,
            Err(messages) => panic!("compilation failed: {:?}", messages.errors),
        };
        let bytes = unit.wasm.expect("emit_wasm is set");

        let mut store = Store::default();
        let module = Module::new(&store, &bytes).expect("encoded module should compile");
        let instance = Instance::new(&mut store, &module, &imports! {})
            .expect("module has no imports to satisfy");

        WasmRun { store, instance }
    }

    fn call(&mut self, name: &str, args: &[i64]) -> Box<[Value]> {
        let function = self
            .instance
            .exports
            .get_function(name)
            .unwrap_or_else(|e| panic!("no exported function '{name}': {e}"));
        let args: Vec<Value> = args.iter().map(|value| Value::I64(*value)).collect();
        function
            .call(&mut self.store, &args)
            .unwrap_or_else(|e| panic!("'{name}' trapped: {e}"))
    }

    fn call_int(&mut self, name: &str, args: &[i64]) -> i64 {
        match self.call(name, args).first() {
            Some(Value::I64(value)) => *value,
            other => panic!("'{name}' returned {other:?}"),
        }
    }

    fn memory_bytes(&self) -> u64 {
        self.instance
            .exports
            .get_memory("memory")
            .expect("memory is exported")
            .view(&self.store)
            .data_size()
    }
}

fn interpret(tree: &DeclTree, policy: FrameAllocation, name: &str, args: &[i64]) -> i64 {
    let unit = match compile_unit(tree, &config_for(policy)) {
        Ok(unit) => unit,
        Err(messages) => panic!("compilation failed: {:?}", messages.errors),
    };
    let mut interpreter = Interpreter::new(&unit.lir, DEFAULT_MAX_STEPS);
    match interpreter.call_by_name(name, args) {
        Ok(Some(RuntimeValue::Int(value))) => value,
        other => panic!("'{name}' interpreted to {other:?}"),
    }
}

#[test]
fn counter_runs_to_seven() {
    for policy in [FrameAllocation::EscapeAnalysis, FrameAllocation::AlwaysHeap] {
        let mut run = WasmRun::new(&counter_tree(), policy);
        assert_eq!(run.call_int("outer", &[]), 7, "{policy:?}");
    }
}

#[test]
fn compiled_fixtures_agree_with_the_interpreter() {
    let cases: Vec<(DeclTree, &str, Vec<i64>, i64)> = vec![
        (skip_tree(), "outer", vec![], 42),
        (siblings_tree(), "pair", vec![10, 20], 11022),
        (instance_tree(), "f", vec![3], 8),
        (deep_instance_tree(), "g", vec![40], 42),
        (echo_tree(), "echo", vec![9], 9),
        (closures_tree(), "apply", vec![], 15),
        (closures_tree(), "tick_three", vec![], 3),
        (loop_tree(), "sum_to", vec![4], 10),
        (loop_tree(), "both_positive", vec![1, 2], 1),
        (loop_tree(), "both_positive", vec![1, -2], 0),
    ];

    for (tree, name, args, expected) in cases {
        for policy in [FrameAllocation::EscapeAnalysis, FrameAllocation::AlwaysHeap] {
            let mut run = WasmRun::new(&tree, policy);
            assert_eq!(run.call_int(name, &args), expected, "{name} {policy:?}");
            assert_eq!(
                interpret(&tree, policy, name, &args),
                expected,
                "{name} {policy:?}"
            );
        }
    }
}

#[test]
fn stack_frames_are_popped_on_every_return() {
    // Three 16 byte frames per call. Without the restore the frame stack runs out
    // after about 1300 calls.
    let mut run = WasmRun::new(&siblings_tree(), FrameAllocation::EscapeAnalysis);
    for p in 0..5_000 {
        assert_eq!(run.call_int("pair", &[p, 1]), (p + 1) * 1000 + 3);
    }
}

/// ```text
/// struct Point { x: Int, y: Int }
/// fn churn(n: Int) -> Int {
///     let total = 0
///     let i = 0
///     let p = Point(0, 0)
///     while i < n { p = Point(i, 1); total = total + p.x + p.y; i = i + 1 }
///     return total
/// }
/// ```
fn churn_tree() -> DeclTree {
    let mut builder = DeclTreeBuilder::new();
    let point = builder.aggregate("Point", None, AggregateKind::Struct);
    let x = builder.field(point, "x", ValueType::Int);
    let y = builder.field(point, "y", ValueType::Int);

    let churn = builder.function("churn", None, ValueType::Int);
    let n = builder.param(churn, "n", ValueType::Int);
    let total = builder.local(churn, "total", ValueType::Int);
    let i = builder.local(churn, "i", ValueType::Int);
    let p = builder.local(churn, "p", ValueType::Instance(point));

    builder.set_body(
        churn,
        vec![
            Stmt::Let {
                var: total,
                value: Expr::Int(0),
            },
            Stmt::Let {
                var: i,
                value: Expr::Int(0),
            },
            Stmt::Let {
                var: p,
                value: Expr::new_instance(point, vec![Expr::Int(0), Expr::Int(0)]),
            },
            Stmt::While {
                condition: Expr::binary(BinOp::Lt, Expr::var(i), Expr::var(n)),
                body: vec![
                    Stmt::assign(
                        p,
                        Expr::new_instance(point, vec![Expr::var(i), Expr::Int(1)]),
                    ),
                    Stmt::assign(
                        total,
                        Expr::add(
                            Expr::var(total),
                            Expr::add(Expr::field(Expr::var(p), x), Expr::field(Expr::var(p), y)),
                        ),
                    ),
                    Stmt::assign(i, Expr::add(Expr::var(i), Expr::Int(1))),
                ],
            },
            Stmt::ret(Expr::var(total)),
        ],
    );
    builder.finish().expect("churn tree should validate")
}

#[test]
fn the_heap_grows_memory_when_it_runs_out() {
    let mut run = WasmRun::new(&churn_tree(), FrameAllocation::EscapeAnalysis);
    assert_eq!(run.memory_bytes(), 2 * PAGE_BYTES);

    // 10k instances of 16 bytes do not fit in the 64 KiB left above the heap start
    let n = 10_000;
    assert_eq!(run.call_int("churn", &[n]), n * (n - 1) / 2 + n);
    assert!(run.memory_bytes() > 2 * PAGE_BYTES);
}

#[test]
fn closures_keep_their_heap_frame_between_host_calls() {
    let mut run = WasmRun::new(&closures_tree(), FrameAllocation::EscapeAnalysis);
    for _ in 0..3 {
        assert_eq!(run.call_int("tick_three", &[]), 3);
        assert_eq!(run.call_int("apply", &[]), 15);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn generated_trees_run_without_trapping(shape in tree_shapes()) {
        let tree = random_tree(&shape);

        for policy in [FrameAllocation::EscapeAnalysis, FrameAllocation::AlwaysHeap] {
            let mut run = WasmRun::new(&tree, policy);
            for root in tree.roots() {
                let name = tree.qualified_name(root);
                let params = tree.function(root).unwrap().params.len();

                // Twice, so a leaked frame from the first call would show up in the second
                prop_assert!(run.call(&name, &vec![3; params]).is_empty());
                prop_assert!(run.call(&name, &vec![3; params]).is_empty());
            }
        }
    }
}
